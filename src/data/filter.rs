use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::model::{Dataset, Record};

// ---------------------------------------------------------------------------
// Filter predicate: date range plus geography selections
// ---------------------------------------------------------------------------

/// User-selected narrowing predicates.
///
/// Date bounds are inclusive. An empty geography set means "no restriction"
/// for that column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub regions: BTreeSet<String>,
    pub states: BTreeSet<String>,
    pub cities: BTreeSet<String>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self::new(NaiveDate::MIN, NaiveDate::MAX)
    }
}

impl FilterCriteria {
    pub fn new(date_start: NaiveDate, date_end: NaiveDate) -> Self {
        Self {
            date_start,
            date_end,
            regions: BTreeSet::new(),
            states: BTreeSet::new(),
            cities: BTreeSet::new(),
        }
    }

    /// Criteria spanning the whole dataset with no geography restriction.
    /// Falls back to an unbounded range for an empty dataset.
    pub fn for_dataset(dataset: &Dataset) -> Self {
        match dataset.bounds() {
            Some((start, end)) => Self::new(start, end),
            None => Self::default(),
        }
    }

    /// Whether a single record passes every active predicate.
    pub fn matches(&self, rec: &Record) -> bool {
        fn allowed(selected: &BTreeSet<String>, value: &str) -> bool {
            selected.is_empty() || selected.contains(value)
        }

        rec.order_date >= self.date_start
            && rec.order_date <= self.date_end
            && allowed(&self.regions, &rec.region)
            && allowed(&self.states, &rec.state)
            && allowed(&self.cities, &rec.city)
    }
}

// ---------------------------------------------------------------------------
// FilteredView – indices into the dataset
// ---------------------------------------------------------------------------

/// The records of a [`Dataset`] that satisfy a [`FilterCriteria`].
///
/// Holds indices rather than copies, so a view is always a subsequence of
/// the dataset, in the same order.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    /// A view containing every record.
    pub fn all(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            indices: (0..dataset.len()).collect(),
        }
    }

    /// Rebuild a view from previously computed indices.
    pub fn from_indices(dataset: &'a Dataset, indices: Vec<usize>) -> Self {
        Self { dataset, indices }
    }

    /// Narrow this view further.
    pub fn apply(&self, criteria: &FilterCriteria) -> FilteredView<'a> {
        let records = self.dataset.records();
        let indices = self
            .indices
            .iter()
            .copied()
            .filter(|&i| criteria.matches(&records[i]))
            .collect();
        FilteredView {
            dataset: self.dataset,
            indices,
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let records = self.dataset.records();
        self.indices.iter().map(move |&i| &records[i])
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Return the records that pass all active filters, in dataset order.
///
/// A record passes when its order date lies in `[date_start, date_end]` and,
/// for each of region / state / city, the selection is empty or contains the
/// record's value. `date_start > date_end` yields an empty view.
pub fn apply_filters<'a>(dataset: &'a Dataset, criteria: &FilterCriteria) -> FilteredView<'a> {
    FilteredView::all(dataset).apply(criteria)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::{date, record};

    fn three_months() -> Dataset {
        Dataset::from_records(vec![
            record("2021-01-05", "East", "Furniture", 100.0),
            record("2021-02-10", "West", "Technology", 200.0),
            record("2021-03-15", "East", "Office Supplies", 300.0),
        ])
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let ds = three_months();
        let criteria = FilterCriteria::new(date("2021-01-01"), date("2021-02-28"));
        let view = apply_filters(&ds, &criteria);
        assert_eq!(view.len(), 2);
        let total: f64 = view.records().map(|r| r.sales).sum();
        assert_eq!(total, 300.0);

        let exact = FilterCriteria::new(date("2021-01-05"), date("2021-01-05"));
        assert_eq!(apply_filters(&ds, &exact).indices(), &[0]);
    }

    #[test]
    fn test_region_filter() {
        let ds = three_months();
        let mut criteria = FilterCriteria::for_dataset(&ds);
        criteria.regions = set(&["East"]);
        let view = apply_filters(&ds, &criteria);
        assert_eq!(view.len(), 2);
        assert!(view.records().all(|r| r.region == "East"));
    }

    #[test]
    fn test_state_and_city_filters_combine() {
        let ds = three_months();
        let mut criteria = FilterCriteria::for_dataset(&ds);
        criteria.states = set(&["East State", "West State"]);
        criteria.cities = set(&["West City"]);
        let view = apply_filters(&ds, &criteria);
        assert_eq!(view.indices(), &[1]);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let ds = three_months();
        let criteria = FilterCriteria::new(date("2021-03-01"), date("2021-01-01"));
        assert!(apply_filters(&ds, &criteria).is_empty());
    }

    #[test]
    fn test_unknown_selection_is_empty() {
        let ds = three_months();
        let mut criteria = FilterCriteria::for_dataset(&ds);
        criteria.regions = set(&["North"]);
        assert!(apply_filters(&ds, &criteria).is_empty());
    }

    #[test]
    fn test_view_is_ordered_subset() {
        let ds = three_months();
        let mut criteria = FilterCriteria::new(date("2021-01-01"), date("2021-12-31"));
        criteria.regions = set(&["East"]);
        let view = apply_filters(&ds, &criteria);
        assert!(view.indices().windows(2).all(|w| w[0] < w[1]));
        for rec in view.records() {
            assert!(ds.records().contains(rec));
        }
    }

    #[test]
    fn test_idempotent() {
        let ds = three_months();
        let mut criteria = FilterCriteria::new(date("2021-01-01"), date("2021-02-28"));
        criteria.regions = set(&["East", "West"]);
        let once = apply_filters(&ds, &criteria);
        let twice = once.apply(&criteria);
        assert_eq!(once.indices(), twice.indices());
    }

    #[test]
    fn test_widening_never_shrinks() {
        let ds = three_months();
        let mut narrow = FilterCriteria::for_dataset(&ds);
        narrow.regions = set(&["West"]);
        let mut wide = narrow.clone();
        wide.regions.insert("East".to_string());

        let small = apply_filters(&ds, &narrow);
        let large = apply_filters(&ds, &wide);
        assert!(small.indices().iter().all(|i| large.indices().contains(i)));
        assert!(large.len() >= small.len());

        // Clearing a selection removes the restriction entirely.
        wide.regions.clear();
        assert_eq!(apply_filters(&ds, &wide).len(), ds.len());
    }

    fn assert_widening_keeps(ds: &Dataset, narrow: &FilterCriteria, wide: &FilterCriteria) {
        let small = apply_filters(ds, narrow);
        let large = apply_filters(ds, wide);
        assert_eq!(small.indices(), &[1]);
        assert!(small.indices().iter().all(|i| large.indices().contains(i)));
        assert_eq!(large.len(), 3);
    }

    #[test]
    fn test_widening_state_or_city_never_shrinks() {
        let ds = three_months();

        let mut narrow = FilterCriteria::for_dataset(&ds);
        narrow.states = set(&["West State"]);
        let mut wide = narrow.clone();
        wide.states.insert("East State".to_string());
        assert_widening_keeps(&ds, &narrow, &wide);

        let mut narrow = FilterCriteria::for_dataset(&ds);
        narrow.cities = set(&["West City"]);
        let mut wide = narrow.clone();
        wide.cities.insert("East City".to_string());
        assert_widening_keeps(&ds, &narrow, &wide);
    }

    #[test]
    fn test_empty_dataset_default_criteria() {
        let ds = Dataset::default();
        let criteria = FilterCriteria::for_dataset(&ds);
        assert_eq!(criteria, FilterCriteria::default());
        assert!(apply_filters(&ds, &criteria).is_empty());
    }
}
