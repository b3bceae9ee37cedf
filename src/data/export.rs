use super::aggregate::{aggregate, AggregateResult, GroupKey, ValueKey};
use super::filter::FilteredView;
use super::model::{Dataset, COLUMNS};

pub const CSV_MIME: &str = "text/csv";

/// Row limit of the filtered extract.
pub const EXTRACT_ROWS: usize = 500;

/// A ready-to-save CSV download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub mime: &'static str,
    pub data: Vec<u8>,
}

impl Download {
    fn csv(file_name: &str, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            mime: CSV_MIME,
            data,
        }
    }
}

fn finish(writer: csv::Writer<Vec<u8>>) -> csv::Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Two-column table: group key and summed value.
///
/// Values use Rust's shortest round-trip float formatting, so parsing the
/// file back gives identical numbers.
pub fn aggregate_csv(result: &AggregateResult, file_name: &str) -> csv::Result<Download> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([result.key_name.as_str(), result.value_name.as_str()])?;
    for (key, value) in &result.groups {
        wtr.write_record([key.clone(), value.to_string()])?;
    }
    Ok(Download::csv(file_name, finish(wtr)?))
}

/// `Category.csv`: Sales per Category.
pub fn category_csv(view: &FilteredView<'_>) -> csv::Result<Download> {
    let result = aggregate(view, GroupKey::Category, ValueKey::Sales);
    aggregate_csv(&result, "Category.csv")
}

/// `Region.csv`: Sales per Region.
pub fn region_csv(view: &FilteredView<'_>) -> csv::Result<Download> {
    let result = aggregate(view, GroupKey::Region, ValueKey::Sales);
    aggregate_csv(&result, "Region.csv")
}

/// Column indices of the extract: every second column starting at the second.
pub fn extract_columns() -> impl Iterator<Item = usize> {
    (1..COLUMNS.len()).step_by(2)
}

/// `FilteredData.csv`: the first [`EXTRACT_ROWS`] rows of the view, every
/// second column starting at Region.
pub fn filtered_extract_csv(view: &FilteredView<'_>) -> csv::Result<Download> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(extract_columns().map(|c| COLUMNS[c]))?;
    for rec in view.records().take(EXTRACT_ROWS) {
        wtr.write_record(extract_columns().map(|c| rec.cell(c)))?;
    }
    Ok(Download::csv("FilteredData.csv", finish(wtr)?))
}

/// `Data.csv`: every record of the unfiltered dataset, all columns.
pub fn dataset_csv(dataset: &Dataset) -> csv::Result<Download> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    if dataset.is_empty() {
        wtr.write_record(COLUMNS)?;
    }
    for rec in dataset.records() {
        wtr.serialize(rec)?;
    }
    Ok(Download::csv("Data.csv", finish(wtr)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{apply_filters, FilterCriteria};
    use crate::data::model::tests::{date, record};
    use crate::data::model::Record;

    fn dataset() -> Dataset {
        Dataset::from_records(vec![
            record("2021-01-05", "East", "Furniture", 100.1),
            record("2021-02-10", "West", "Technology", 0.1 + 0.2),
            record("2021-03-15", "East", "Furniture", 1e-7),
        ])
    }

    fn parse_pairs(data: &[u8]) -> (Vec<String>, Vec<(String, f64)>) {
        let mut rdr = csv::Reader::from_reader(data);
        let headers = rdr.headers().unwrap().iter().map(String::from).collect();
        let rows = rdr
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r[0].to_string(), r[1].parse::<f64>().unwrap())
            })
            .collect();
        (headers, rows)
    }

    #[test]
    fn test_category_csv_round_trip() {
        let ds = dataset();
        let view = FilteredView::all(&ds);
        let download = category_csv(&view).unwrap();
        assert_eq!(download.file_name, "Category.csv");
        assert_eq!(download.mime, "text/csv");

        let (headers, rows) = parse_pairs(&download.data);
        assert_eq!(headers, vec!["Category", "Sales"]);
        let expected = aggregate(&view, GroupKey::Category, ValueKey::Sales);
        assert_eq!(rows, expected.groups);
    }

    #[test]
    fn test_region_csv_respects_filters() {
        let ds = dataset();
        let mut criteria = FilterCriteria::new(date("2021-01-01"), date("2021-02-28"));
        criteria.regions = ["West".to_string()].into_iter().collect();
        let view = apply_filters(&ds, &criteria);
        let download = region_csv(&view).unwrap();
        let (_, rows) = parse_pairs(&download.data);
        assert_eq!(rows, vec![("West".to_string(), 0.1 + 0.2)]);
    }

    #[test]
    fn test_empty_aggregate_csv_has_header_only() {
        let ds = dataset();
        let criteria = FilterCriteria::new(date("2022-01-01"), date("2021-01-01"));
        let view = apply_filters(&ds, &criteria);
        let download = category_csv(&view).unwrap();
        assert_eq!(String::from_utf8(download.data).unwrap(), "Category,Sales\n");
    }

    #[test]
    fn test_extract_columns_and_row_limit() {
        let records: Vec<Record> = (0..600)
            .map(|i| record("2021-01-05", "East", "Furniture", i as f64))
            .collect();
        let ds = Dataset::from_records(records);
        let download = filtered_extract_csv(&FilteredView::all(&ds)).unwrap();

        let mut rdr = csv::Reader::from_reader(download.data.as_slice());
        let headers: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["Region", "City", "Sub-Category", "Sales", "Quantity"]);
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), EXTRACT_ROWS);
        assert_eq!(&rows[499][3], "499");
    }

    #[test]
    fn test_dataset_csv_reparses_to_records() {
        let ds = dataset();
        let download = dataset_csv(&ds).unwrap();
        assert_eq!(download.file_name, "Data.csv");
        let mut rdr = csv::Reader::from_reader(download.data.as_slice());
        let back: Vec<Record> = rdr.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(back, ds.records());
    }

    #[test]
    fn test_empty_dataset_csv_has_header_only() {
        let download = dataset_csv(&Dataset::default()).unwrap();
        assert_eq!(
            String::from_utf8(download.data).unwrap(),
            "Order Date,Region,State,City,Category,Sub-Category,Segment,Sales,Profit,Quantity\n"
        );
    }
}
