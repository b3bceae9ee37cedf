use std::collections::{BTreeMap, HashMap};

use super::filter::FilteredView;
use super::model::{self, Dataset, MonthPeriod, Record};

// ---------------------------------------------------------------------------
// Grouping and value keys
// ---------------------------------------------------------------------------

/// Text column a view can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Category,
    SubCategory,
    Region,
    State,
    City,
    Segment,
}

impl GroupKey {
    /// Header name used in tables and CSV output.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Category => model::CATEGORY,
            Self::SubCategory => model::SUB_CATEGORY,
            Self::Region => model::REGION,
            Self::State => model::STATE,
            Self::City => model::CITY,
            Self::Segment => model::SEGMENT,
        }
    }

    pub fn value<'r>(&self, rec: &'r Record) -> &'r str {
        match self {
            Self::Category => &rec.category,
            Self::SubCategory => &rec.sub_category,
            Self::Region => &rec.region,
            Self::State => &rec.state,
            Self::City => &rec.city,
            Self::Segment => &rec.segment,
        }
    }
}

/// Numeric column that gets summed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueKey {
    #[default]
    Sales,
    Profit,
    Quantity,
}

impl ValueKey {
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Sales => model::SALES,
            Self::Profit => model::PROFIT,
            Self::Quantity => model::QUANTITY,
        }
    }

    pub fn value(&self, rec: &Record) -> f64 {
        match self {
            Self::Sales => rec.sales,
            Self::Profit => rec.profit,
            Self::Quantity => rec.quantity as f64,
        }
    }
}

// ---------------------------------------------------------------------------
// AggregateResult
// ---------------------------------------------------------------------------

/// Grouped-and-summed projection of a view.
///
/// Groups appear in order of first occurrence in the view.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub key_name: String,
    pub value_name: String,
    pub groups: Vec<(String, f64)>,
}

impl AggregateResult {
    pub fn total(&self) -> f64 {
        self.groups.iter().map(|(_, v)| v).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Sum `value` per distinct `key`, keeping first-occurrence order.
pub fn aggregate(view: &FilteredView<'_>, key: GroupKey, value: ValueKey) -> AggregateResult {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, f64)> = Vec::new();

    for rec in view.records() {
        let k = key.value(rec);
        let slot = *slots.entry(k).or_insert_with(|| {
            groups.push((k.to_string(), 0.0));
            groups.len() - 1
        });
        groups[slot].1 += value.value(rec);
    }

    AggregateResult {
        key_name: key.column_name().to_string(),
        value_name: value.column_name().to_string(),
        groups,
    }
}

/// Sales per calendar month, oldest first.  Months with no orders are absent.
pub fn aggregate_by_month(view: &FilteredView<'_>) -> Vec<(MonthPeriod, f64)> {
    let mut by_month: BTreeMap<MonthPeriod, f64> = BTreeMap::new();
    for rec in view.records() {
        *by_month.entry(MonthPeriod::of(rec.order_date)).or_default() += rec.sales;
    }
    by_month.into_iter().collect()
}

/// Hierarchical sums along `path` (e.g. Region → Category → Sub-Category).
///
/// Each entry is the full key path of a leaf with its summed value; leaves
/// keep first-occurrence order.
pub fn aggregate_path(
    view: &FilteredView<'_>,
    path: &[GroupKey],
    value: ValueKey,
) -> Vec<(Vec<String>, f64)> {
    let mut slots: HashMap<Vec<&str>, usize> = HashMap::new();
    let mut leaves: Vec<(Vec<String>, f64)> = Vec::new();

    for rec in view.records() {
        let keys: Vec<&str> = path.iter().map(|k| k.value(rec)).collect();
        let slot = match slots.get(&keys) {
            Some(&slot) => slot,
            None => {
                leaves.push((keys.iter().map(|k| k.to_string()).collect(), 0.0));
                slots.insert(keys, leaves.len() - 1);
                leaves.len() - 1
            }
        };
        leaves[slot].1 += value.value(rec);
    }
    leaves
}

// ---------------------------------------------------------------------------
// Totals and sample rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub orders: usize,
    pub sales: f64,
    pub profit: f64,
    pub quantity: i64,
}

/// Headline figures for a view.  The quantity total saturates rather than
/// overflowing.
pub fn totals(view: &FilteredView<'_>) -> Totals {
    view.records().fold(Totals::default(), |acc, rec| Totals {
        orders: acc.orders + 1,
        sales: acc.sales + rec.sales,
        profit: acc.profit + rec.profit,
        quantity: acc.quantity.saturating_add(rec.quantity),
    })
}

/// Columns shown in the unfiltered summary table.
pub const SAMPLE_COLUMNS: [&str; 7] = [
    model::REGION,
    model::STATE,
    model::CITY,
    model::CATEGORY,
    model::SALES,
    model::PROFIT,
    model::QUANTITY,
];

const SAMPLE_ROWS: usize = 5;

/// First rows of the whole dataset projected onto [`SAMPLE_COLUMNS`].
pub fn sample_rows(dataset: &Dataset) -> Vec<[String; 7]> {
    dataset
        .records()
        .iter()
        .take(SAMPLE_ROWS)
        .map(|r| {
            [
                r.region.clone(),
                r.state.clone(),
                r.city.clone(),
                r.category.clone(),
                r.sales.to_string(),
                r.profit.to_string(),
                r.quantity.to_string(),
            ]
        })
        .collect()
}
