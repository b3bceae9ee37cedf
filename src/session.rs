use chrono::NaiveDate;

use crate::data::filter::{apply_filters, FilterCriteria, FilteredView};
use crate::data::loader::{self, LoadSource};
use crate::data::model::Dataset;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Which geography multi-select a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geography {
    Region,
    State,
    City,
}

/// Everything one user session owns, independent of rendering.
#[derive(Debug, Default)]
pub struct Session {
    /// Loaded dataset (None until a load succeeds).
    dataset: Option<Dataset>,

    /// Current date range and geography selections.
    criteria: FilterCriteria,

    /// Indices of records passing the current criteria (cached).
    visible_indices: Vec<usize>,

    /// Status / error message for the user.
    pub status_message: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `source` and install the result.  On failure the session
    /// keeps no dataset and the error is recorded in `status_message`.
    pub fn load(&mut self, source: &LoadSource) -> Result<()> {
        match loader::load(source) {
            Ok(report) => {
                log::info!(
                    "Loaded {} records from {}",
                    report.dataset.len(),
                    source.name()
                );
                self.set_dataset(report.dataset);
                if report.skipped > 0 {
                    self.status_message = Some(format!("Skipped {} malformed row(s)", report.skipped));
                }
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load {}: {e}", source.name());
                self.dataset = None;
                self.visible_indices.clear();
                self.status_message = Some(format!("Error: {e}"));
                Err(e)
            }
        }
    }

    /// Ingest a dataset and reset the criteria to its full date range.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        self.criteria = FilterCriteria::for_dataset(&dataset);
        self.visible_indices = (0..dataset.len()).collect();
        self.dataset = Some(dataset);
        self.status_message = None;
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Current filtered view, or `None` before a dataset is loaded.
    pub fn view(&self) -> Option<FilteredView<'_>> {
        self.dataset()
            .map(|ds| FilteredView::from_indices(ds, self.visible_indices.clone()))
    }

    /// Recompute `visible_indices` after a criteria change.
    pub fn refilter(&mut self) {
        if let Some(ds) = &self.dataset {
            self.visible_indices = apply_filters(ds, &self.criteria).indices().to_vec();
            log::debug!(
                "Filter kept {} of {} records",
                self.visible_indices.len(),
                ds.len()
            );
        }
    }

    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) {
        self.criteria.date_start = start;
        self.criteria.date_end = end;
        self.refilter();
    }

    /// Add a value to one of the geography selections.
    pub fn select(&mut self, geography: Geography, value: &str) {
        let selected = match geography {
            Geography::Region => &mut self.criteria.regions,
            Geography::State => &mut self.criteria.states,
            Geography::City => &mut self.criteria.cities,
        };
        if selected.insert(value.to_string()) {
            self.refilter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::{date, record};

    fn session() -> Session {
        let mut s = Session::new();
        s.set_dataset(Dataset::from_records(vec![
            record("2021-01-05", "East", "Furniture", 100.0),
            record("2021-02-10", "West", "Technology", 200.0),
            record("2021-03-15", "East", "Office Supplies", 300.0),
        ]));
        s
    }

    #[test]
    fn test_set_dataset_defaults_to_bounds() {
        let s = session();
        assert_eq!(s.criteria().date_start, date("2021-01-05"));
        assert_eq!(s.criteria().date_end, date("2021-03-15"));
        assert_eq!(s.view().unwrap().len(), 3);
    }

    #[test]
    fn test_date_range_refilters() {
        let mut s = session();
        s.set_date_range(date("2021-01-01"), date("2021-02-28"));
        let total: f64 = s.view().unwrap().records().map(|r| r.sales).sum();
        assert_eq!(total, 300.0);
    }

    #[test]
    fn test_select_widens_within_column() {
        let mut s = session();
        s.select(Geography::Region, "East");
        assert_eq!(s.view().unwrap().indices(), &[0, 2]);
        s.select(Geography::City, "East City");
        assert_eq!(s.view().unwrap().len(), 2);
        s.select(Geography::City, "West City");
        assert_eq!(s.view().unwrap().len(), 2);
        s.select(Geography::Region, "West");
        assert_eq!(s.view().unwrap().len(), 3);
        s.select(Geography::Region, "West");
        assert_eq!(s.criteria().regions.len(), 2);
    }

    #[test]
    fn test_inverted_range_empties_view() {
        let mut s = session();
        s.select(Geography::State, "West State");
        s.set_date_range(date("2021-03-01"), date("2021-01-01"));
        assert!(s.view().unwrap().is_empty());

        // A fresh dataset resets every selection.
        let ds = s.dataset().unwrap().clone();
        s.set_dataset(ds);
        assert_eq!(s.criteria(), &FilterCriteria::new(date("2021-01-05"), date("2021-03-15")));
    }

    #[test]
    fn test_failed_load_leaves_no_dataset() {
        let mut s = session();
        let source = LoadSource::Upload {
            name: "report.docx".to_string(),
            bytes: Vec::new(),
        };
        assert!(s.load(&source).is_err());
        assert!(s.dataset().is_none());
        assert!(s.view().is_none());
        assert!(s.status_message.as_deref().unwrap_or("").starts_with("Error:"));
    }

    #[test]
    fn test_load_upload() {
        let mut s = Session::new();
        let csv = "Order Date,Region,State,City,Category,Sub-Category,Segment,Sales,Profit,Quantity\n\
                   2021-01-05,East,Ohio,Akron,Technology,Phones,Consumer,100,10,1\n\
                   bad,East,Ohio,Akron,Technology,Phones,Consumer,100,10,1\n";
        let source = LoadSource::Upload {
            name: "upload.csv".to_string(),
            bytes: csv.as_bytes().to_vec(),
        };
        s.load(&source).unwrap();
        assert_eq!(s.dataset().unwrap().len(), 1);
        assert_eq!(s.status_message.as_deref(), Some("Skipped 1 malformed row(s)"));
    }
}
