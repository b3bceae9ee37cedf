use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

pub const ORDER_DATE: &str = "Order Date";
pub const REGION: &str = "Region";
pub const STATE: &str = "State";
pub const CITY: &str = "City";
pub const CATEGORY: &str = "Category";
pub const SUB_CATEGORY: &str = "Sub-Category";
pub const SEGMENT: &str = "Segment";
pub const SALES: &str = "Sales";
pub const PROFIT: &str = "Profit";
pub const QUANTITY: &str = "Quantity";

/// Column order of a [`Record`] when written out as a table.
pub const COLUMNS: [&str; 10] = [
    ORDER_DATE,
    REGION,
    STATE,
    CITY,
    CATEGORY,
    SUB_CATEGORY,
    SEGMENT,
    SALES,
    PROFIT,
    QUANTITY,
];

/// Normalise a header for lookup: lower-case, without spaces, `-` or `_`.
///
/// `"Order Date"`, `"order_date"` and `"OrderDate"` all map to `"orderdate"`.
pub fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_' | '\u{feff}'))
        .flat_map(char::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// Record – one sales transaction
// ---------------------------------------------------------------------------

/// One sales transaction (one row of the source sheet).
///
/// Serde names match the Superstore headers so a `Record` can be written
/// straight through a `csv::Writer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Order Date")]
    pub order_date: NaiveDate,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Sub-Category")]
    pub sub_category: String,
    #[serde(rename = "Segment")]
    pub segment: String,
    #[serde(rename = "Sales")]
    pub sales: f64,
    #[serde(rename = "Profit")]
    pub profit: f64,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
}

impl Record {
    /// Render the cell at `column` (an index into [`COLUMNS`]) as text.
    pub fn cell(&self, column: usize) -> String {
        match column {
            0 => self.order_date.format("%Y-%m-%d").to_string(),
            1 => self.region.clone(),
            2 => self.state.clone(),
            3 => self.city.clone(),
            4 => self.category.clone(),
            5 => self.sub_category.clone(),
            6 => self.segment.clone(),
            7 => self.sales.to_string(),
            8 => self.profit.to_string(),
            9 => self.quantity.to_string(),
            _ => String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// MonthPeriod – calendar month of an order date
// ---------------------------------------------------------------------------

/// A calendar month, ordered chronologically and displayed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
}

impl MonthPeriod {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded collection
// ---------------------------------------------------------------------------

/// The full parsed dataset with the geography option lists pre-computed.
///
/// Immutable once built: every downstream view borrows it.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
    regions: BTreeSet<String>,
    states: BTreeSet<String>,
    cities: BTreeSet<String>,
}

impl Dataset {
    /// Build the option indices from the loaded records.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut regions = BTreeSet::new();
        let mut states = BTreeSet::new();
        let mut cities = BTreeSet::new();

        for rec in &records {
            regions.insert(rec.region.clone());
            states.insert(rec.state.clone());
            cities.insert(rec.city.clone());
        }
        Dataset {
            records,
            regions,
            states,
            cities,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Sorted unique Region values.
    pub fn regions(&self) -> &BTreeSet<String> {
        &self.regions
    }

    /// Sorted unique State values.
    pub fn states(&self) -> &BTreeSet<String> {
        &self.states
    }

    /// Sorted unique City values.
    pub fn cities(&self) -> &BTreeSet<String> {
        &self.cities
    }

    /// Earliest and latest order date, or `None` for an empty dataset.
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.records.iter().map(|r| r.order_date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
