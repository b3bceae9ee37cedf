use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Float32Type, Float64Type, Int32Type, Int64Type, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};
use calamine::{Data, Reader};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{self, normalize_header, Dataset, Record};
use crate::error::{LoadError, Result};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Where a dataset comes from: an uploaded byte stream or the fallback file.
#[derive(Debug, Clone)]
pub enum LoadSource {
    /// Uploaded file contents; the format is taken from `name`'s extension.
    Upload { name: String, bytes: Vec<u8> },
    /// File on disk, used when nothing was uploaded.
    Path(PathBuf),
}

impl LoadSource {
    /// Display name used in log and status messages.
    pub fn name(&self) -> String {
        match self {
            LoadSource::Upload { name, .. } => name.clone(),
            LoadSource::Path(path) => path.display().to_string(),
        }
    }
}

/// A freshly loaded dataset plus the number of rows that were dropped.
#[derive(Debug)]
pub struct LoadReport {
    pub dataset: Dataset,
    pub skipped: usize,
}

/// Load a dataset.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` / `.tsv` – delimited text with a header row
/// * `.xlsx` / `.xlsm` / `.xls` / `.xlsb` / `.ods` – first worksheet
/// * `.json` – `[{ "Order Date": ..., "Region": ..., ... }, ...]`
/// * `.parquet` – one column per field
///
/// Rows that cannot be parsed are skipped and counted, never fatal.
pub fn load(source: &LoadSource) -> Result<LoadReport> {
    let report = match source {
        LoadSource::Upload { name, bytes } => load_bytes(name, bytes),
        LoadSource::Path(path) => load_file(path),
    }?;
    if report.skipped > 0 {
        log::warn!(
            "Skipped {} malformed row(s) while loading {}",
            report.skipped,
            source.name()
        );
    }
    Ok(report)
}

/// Load a dataset from a file on disk.
pub fn load_file(path: &Path) -> Result<LoadReport> {
    let name = path.to_string_lossy();
    match Format::from_name(&name)? {
        Format::Parquet => load_parquet(std::fs::File::open(path)?),
        _ => load_bytes(&name, &std::fs::read(path)?),
    }
}

/// Load a dataset from uploaded bytes; `name` supplies the extension.
pub fn load_bytes(name: &str, bytes: &[u8]) -> Result<LoadReport> {
    match Format::from_name(name)? {
        Format::Delimited { tab } => load_delimited(bytes, tab),
        Format::Spreadsheet => load_spreadsheet(bytes),
        Format::Json => load_json(bytes),
        Format::Parquet => {
            // The parquet reader wants a seekable file handle.
            let mut spool = tempfile::tempfile()?;
            spool.write_all(bytes)?;
            spool.seek(SeekFrom::Start(0))?;
            load_parquet(spool)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Delimited { tab: bool },
    Spreadsheet,
    Json,
    Parquet,
}

impl Format {
    fn from_name(name: &str) -> Result<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" | "txt" => Ok(Format::Delimited { tab: false }),
            "tsv" => Ok(Format::Delimited { tab: true }),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(Format::Spreadsheet),
            "json" => Ok(Format::Json),
            "parquet" | "pq" => Ok(Format::Parquet),
            other => Err(LoadError::UnsupportedFormat(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Cell conversion shared by every format
// ---------------------------------------------------------------------------

/// A single raw cell before it is interpreted as a record field.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

/// How a bare number in the date column should be read.
#[derive(Debug, Clone, Copy)]
enum NumericDate {
    /// Days since 1899-12-30 (spreadsheet serial).
    ExcelSerial,
    /// Milliseconds since the Unix epoch (pandas `to_json` default).
    EpochMillis,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parse an order date from text.  A time-of-day part is truncated.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
}

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_days(Days::new(serial.floor() as u64))
}

/// Parse a money/number field: `"1,234.56"`, `"$42"`, `"(10.00)"`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

/// Largest magnitude below which every integer is exact in an `f64` (2^53).
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl Cell {
    fn date(&self, numeric: NumericDate) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => parse_date(s),
            Cell::Number(n) => match numeric {
                NumericDate::ExcelSerial => excel_serial_to_date(*n),
                NumericDate::EpochMillis => {
                    DateTime::<Utc>::from_timestamp_millis(*n as i64).map(|dt| dt.date_naive())
                }
            },
            Cell::Empty => None,
        }
    }

    fn text(&self) -> String {
        match self {
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{n:.0}"),
            Cell::Number(n) => n.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::Empty => String::new(),
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Text(s) => parse_amount(s).filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// Whole numbers only.  Text is parsed as `i64` directly; floats must
    /// be integral and small enough to convert exactly.
    fn integer(&self) -> Option<i64> {
        if let Cell::Text(s) = self {
            if let Ok(n) = s.trim().replace(',', "").parse::<i64>() {
                return Some(n);
            }
        }
        let n = self.number()?;
        (n.fract() == 0.0 && n.abs() <= MAX_EXACT_INTEGER).then_some(n as i64)
    }
}

// ---------------------------------------------------------------------------
// Column lookup and row assembly
// ---------------------------------------------------------------------------

/// Positions of the required fields within a source row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    order_date: usize,
    region: usize,
    state: usize,
    city: usize,
    category: usize,
    sub_category: usize,
    segment: usize,
    sales: usize,
    profit: usize,
    quantity: usize,
}

impl Columns {
    fn resolve<S: AsRef<str>>(headers: &[S]) -> Result<Self> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();
        let find = |name: &str| {
            let wanted = normalize_header(name);
            normalized
                .iter()
                .position(|h| *h == wanted)
                .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
        };

        let order_date = find(model::ORDER_DATE).map_err(|_| LoadError::NoDateColumn)?;
        Ok(Columns {
            order_date,
            region: find(model::REGION)?,
            state: find(model::STATE)?,
            city: find(model::CITY)?,
            category: find(model::CATEGORY)?,
            sub_category: find(model::SUB_CATEGORY)?,
            segment: find(model::SEGMENT)?,
            sales: find(model::SALES)?,
            profit: find(model::PROFIT)?,
            quantity: find(model::QUANTITY)?,
        })
    }
}

/// Accumulates records row by row, counting what had to be dropped.
struct RowCollector {
    columns: Columns,
    numeric_dates: NumericDate,
    records: Vec<Record>,
    skipped: usize,
    dates_parsed: usize,
}

impl RowCollector {
    fn new(columns: Columns, numeric_dates: NumericDate) -> Self {
        Self {
            columns,
            numeric_dates,
            records: Vec::new(),
            skipped: 0,
            dates_parsed: 0,
        }
    }

    fn skip(&mut self) {
        self.skipped += 1;
    }

    fn push(&mut self, row: &[Cell]) {
        match self.build(row) {
            Some(rec) => self.records.push(rec),
            None => self.skipped += 1,
        }
    }

    fn build(&mut self, row: &[Cell]) -> Option<Record> {
        let c = self.columns;
        let cell = |idx: usize| row.get(idx).unwrap_or(&Cell::Empty);

        let order_date = cell(c.order_date).date(self.numeric_dates)?;
        self.dates_parsed += 1;

        Some(Record {
            order_date,
            region: cell(c.region).text(),
            state: cell(c.state).text(),
            city: cell(c.city).text(),
            category: cell(c.category).text(),
            sub_category: cell(c.sub_category).text(),
            segment: cell(c.segment).text(),
            sales: cell(c.sales).number()?,
            profit: cell(c.profit).number()?,
            quantity: cell(c.quantity).integer()?,
        })
    }

    fn finish(self) -> Result<LoadReport> {
        let total = self.records.len() + self.skipped;
        if total > 0 && self.dates_parsed == 0 {
            return Err(LoadError::NoDateColumn);
        }
        Ok(LoadReport {
            dataset: Dataset::from_records(self.records),
            skipped: self.skipped,
        })
    }
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

/// Decode as UTF-8, falling back to ISO-8859-1 (one byte → one char).
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn sniff_tab(text: &str) -> bool {
    let header = text.lines().next().unwrap_or("");
    header.contains('\t') && !header.contains(',')
}

/// Header row with column names, one record per line.
/// Short or unparseable lines are skipped.
fn load_delimited(bytes: &[u8], tab: bool) -> Result<LoadReport> {
    let text = decode_text(bytes);
    let delimiter = if tab || sniff_tab(&text) { b'\t' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let columns = Columns::resolve(&headers)?;
    let mut collector = RowCollector::new(columns, NumericDate::ExcelSerial);

    for result in reader.records() {
        let Ok(record) = result else {
            collector.skip();
            continue;
        };
        let row: Vec<Cell> = record
            .iter()
            .map(|v| {
                if v.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(v.to_string())
                }
            })
            .collect();
        collector.push(&row);
    }

    collector.finish()
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

fn spreadsheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(Cell::Date)
            .unwrap_or(Cell::Empty),
    }
}

/// First worksheet, first row is the header.
fn load_spreadsheet(bytes: &[u8]) -> Result<LoadReport> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| LoadError::Parse(format!("Failed to open workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::Parse("Workbook has no worksheets".to_string()))?
        .map_err(|e| LoadError::Parse(format!("Failed to read worksheet: {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|r| r.iter().map(|d| spreadsheet_cell(d).text()).collect())
        .unwrap_or_default();
    let columns = Columns::resolve(&headers)?;
    let mut collector = RowCollector::new(columns, NumericDate::ExcelSerial);

    for row in rows {
        let cells: Vec<Cell> = row.iter().map(spreadsheet_cell).collect();
        if cells.iter().all(|c| *c == Cell::Empty) {
            continue;
        }
        collector.push(&cells);
    }

    collector.finish()
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn json_cell(val: Option<&JsonValue>) -> Cell {
    match val {
        None | Some(JsonValue::Null) => Cell::Empty,
        Some(JsonValue::String(s)) => Cell::Text(s.clone()),
        Some(JsonValue::Number(n)) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
        Some(JsonValue::Bool(b)) => Cell::Text(b.to_string()),
        Some(other) => Cell::Text(other.to_string()),
    }
}

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Order Date": "2021-01-05", "Region": "East", ..., "Sales": 100.0 },
///   ...
/// ]
/// ```
///
/// Numeric dates are epoch milliseconds. Non-object rows are skipped.
fn load_json(bytes: &[u8]) -> Result<LoadReport> {
    let root: JsonValue = serde_json::from_slice(bytes)
        .map_err(|e| LoadError::Parse(format!("Invalid JSON: {e}")))?;
    let rows = root
        .as_array()
        .ok_or_else(|| LoadError::Parse("Expected top-level JSON array".to_string()))?;

    let mut headers: Vec<String> = Vec::new();
    for obj in rows.iter().filter_map(|r| r.as_object()) {
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    let columns = Columns::resolve(&headers)?;
    let mut collector = RowCollector::new(columns, NumericDate::EpochMillis);

    for row in rows {
        let Some(obj) = row.as_object() else {
            collector.skip();
            continue;
        };
        let cells: Vec<Cell> = headers.iter().map(|h| json_cell(obj.get(h))).collect();
        collector.push(&cells);
    }

    collector.finish()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one column per field.
///
/// Dates may be `Date32`, `Date64`, any `Timestamp` unit or text.  Text
/// may be plain, view-backed (Polars) or dictionary-encoded (pandas
/// categoricals).
fn load_parquet(file: std::fs::File) -> Result<LoadReport> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| LoadError::Parse(format!("Reading parquet metadata: {e}")))?;
    for field in builder.schema().fields() {
        if !readable(field.data_type()) {
            log::warn!(
                "Parquet column '{}' has unsupported type {}; its cells read as empty",
                field.name(),
                field.data_type()
            );
        }
    }
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let columns = Columns::resolve(&headers)?;
    let reader = builder
        .build()
        .map_err(|e| LoadError::Parse(format!("Building parquet reader: {e}")))?;

    let mut collector = RowCollector::new(columns, NumericDate::ExcelSerial);

    for batch_result in reader {
        let batch =
            batch_result.map_err(|e| LoadError::Parse(format!("Reading record batch: {e}")))?;
        let columns = batch
            .columns()
            .iter()
            .map(plain_column)
            .collect::<Result<Vec<_>>>()?;
        for row in 0..batch.num_rows() {
            let cells: Vec<Cell> = columns.iter().map(|col| arrow_cell(col, row)).collect();
            collector.push(&cells);
        }
    }

    collector.finish()
}

/// Whether [`arrow_cell`] understands a column of this type, after
/// [`plain_column`] decoding.
fn readable(data_type: &DataType) -> bool {
    match data_type {
        DataType::Dictionary(_, values) => readable(values),
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Utf8View
        | DataType::Float64
        | DataType::Float32
        | DataType::Int64
        | DataType::Int32
        | DataType::Date32
        | DataType::Date64
        | DataType::Timestamp(_, _) => true,
        _ => false,
    }
}

/// Decode dictionary-encoded and view-backed columns to their plain type.
fn plain_column(col: &ArrayRef) -> Result<ArrayRef> {
    let target = match col.data_type() {
        DataType::Dictionary(_, values) => values.as_ref().clone(),
        DataType::Utf8View => DataType::Utf8,
        _ => return Ok(col.clone()),
    };
    let decoded = cast(col, &target)
        .map_err(|e| LoadError::Parse(format!("Decoding parquet column: {e}")))?;
    plain_column(&decoded)
}

/// Extract a single cell from an Arrow column at a given row.
fn arrow_cell(col: &ArrayRef, row: usize) -> Cell {
    if col.is_null(row) {
        return Cell::Empty;
    }
    let date = |d: Option<NaiveDate>| d.map(Cell::Date).unwrap_or(Cell::Empty);
    let datetime = |dt: Option<NaiveDateTime>| date(dt.map(|v| v.date()));

    match col.data_type() {
        DataType::Utf8 => Cell::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Cell::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Float64 => Cell::Number(col.as_primitive::<Float64Type>().value(row)),
        DataType::Float32 => Cell::Number(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Int64 => Cell::Number(col.as_primitive::<Int64Type>().value(row) as f64),
        DataType::Int32 => Cell::Number(col.as_primitive::<Int32Type>().value(row) as f64),
        DataType::Date32 => date(col.as_primitive::<Date32Type>().value_as_date(row)),
        DataType::Date64 => date(col.as_primitive::<Date64Type>().value_as_date(row)),
        DataType::Timestamp(unit, _) => match unit {
            TimeUnit::Second => {
                datetime(col.as_primitive::<TimestampSecondType>().value_as_datetime(row))
            }
            TimeUnit::Millisecond => {
                datetime(col.as_primitive::<TimestampMillisecondType>().value_as_datetime(row))
            }
            TimeUnit::Microsecond => {
                datetime(col.as_primitive::<TimestampMicrosecondType>().value_as_datetime(row))
            }
            TimeUnit::Nanosecond => {
                datetime(col.as_primitive::<TimestampNanosecondType>().value_as_datetime(row))
            }
        },
        _ => Cell::Empty,
    }
}
