use comfy_table::{Cell, CellAlignment, Table};

use crate::data::aggregate::{
    aggregate, aggregate_by_month, aggregate_path, sample_rows, totals, AggregateResult, GroupKey,
    ValueKey, SAMPLE_COLUMNS,
};
use crate::data::filter::FilteredView;
use crate::data::model::{Dataset, MonthPeriod};

/// Format a float as a dollar amount with thousands separators: $1,234.56
pub fn money(val: f64) -> String {
    let negative = val < 0.0;
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative && cents != "0.00" {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

fn amount_cell(val: f64) -> Cell {
    Cell::new(money(val)).set_alignment(CellAlignment::Right)
}

pub fn format_aggregate(result: &AggregateResult) -> String {
    let mut table = Table::new();
    table.set_header(vec![result.key_name.as_str(), result.value_name.as_str()]);
    for (key, value) in &result.groups {
        table.add_row(vec![Cell::new(key), amount_cell(*value)]);
    }
    if !result.is_empty() {
        table.add_row(vec![Cell::new("Total"), amount_cell(result.total())]);
    }
    table.to_string()
}

pub fn format_months(months: &[(MonthPeriod, f64)]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Month", "Sales"]);
    for (month, value) in months {
        table.add_row(vec![Cell::new(month), amount_cell(*value)]);
    }
    table.to_string()
}

pub fn format_sample(dataset: &Dataset) -> String {
    let mut table = Table::new();
    table.set_header(SAMPLE_COLUMNS.to_vec());
    for row in sample_rows(dataset) {
        table.add_row(row.to_vec());
    }
    table.to_string()
}

/// Region → Category → Sub-Category sales.
pub fn format_hierarchy(view: &FilteredView<'_>) -> String {
    let path = [GroupKey::Region, GroupKey::Category, GroupKey::SubCategory];
    let mut leaves = aggregate_path(view, &path, ValueKey::Sales);
    leaves.sort_by(|a, b| a.0.cmp(&b.0));

    let mut table = Table::new();
    table.set_header(path.iter().map(|k| k.column_name()).chain(["Sales"]));
    for (keys, value) in leaves {
        let mut row: Vec<Cell> = keys.into_iter().map(Cell::new).collect();
        row.push(amount_cell(value));
        table.add_row(row);
    }
    table.to_string()
}

/// Totals plus the category, region, segment, monthly and sample tables.
pub fn format_summary(view: &FilteredView<'_>) -> String {
    let t = totals(view);
    let mut out = format!(
        "Orders: {}  Sales: {}  Profit: {}  Quantity: {}\n",
        t.orders,
        money(t.sales),
        money(t.profit),
        t.quantity
    );

    let sections = [
        ("Category wise Sales", GroupKey::Category),
        ("Region wise Sales", GroupKey::Region),
        ("Segment wise Sales", GroupKey::Segment),
    ];
    for (title, key) in sections {
        out.push_str(&format!("\n{title}\n"));
        out.push_str(&format_aggregate(&aggregate(view, key, ValueKey::Sales)));
        out.push('\n');
    }

    out.push_str("\nTime Series Analysis\n");
    out.push_str(&format_months(&aggregate_by_month(view)));
    out.push('\n');

    out.push_str("\nSummary Table\n");
    out.push_str(&format_sample(view.dataset()));
    out.push('\n');
    out
}
