use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Days, NaiveDate};
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }
}

// (region, state, city)
const PLACES: &[(&str, &str, &str)] = &[
    ("East", "New York", "New York City"),
    ("East", "Pennsylvania", "Philadelphia"),
    ("East", "Ohio", "Columbus"),
    ("West", "California", "Los Angeles"),
    ("West", "California", "San Francisco"),
    ("West", "Washington", "Seattle"),
    ("Central", "Texas", "Houston"),
    ("Central", "Illinois", "Chicago"),
    ("South", "Florida", "Miami"),
    ("South", "Kentucky", "Henderson"),
];

// (category, sub-category, base price)
const PRODUCTS: &[(&str, &str, f64)] = &[
    ("Furniture", "Bookcases", 260.0),
    ("Furniture", "Chairs", 230.0),
    ("Furniture", "Tables", 320.0),
    ("Office Supplies", "Labels", 14.0),
    ("Office Supplies", "Binders", 22.0),
    ("Office Supplies", "Paper", 18.0),
    ("Technology", "Phones", 370.0),
    ("Technology", "Accessories", 95.0),
    ("Technology", "Copiers", 1200.0),
];

const SEGMENTS: &[&str] = &["Consumer", "Corporate", "Home Office"];

struct Row {
    order_date: NaiveDate,
    place: (&'static str, &'static str, &'static str),
    product: (&'static str, &'static str, f64),
    segment: &'static str,
    sales: f64,
    profit: f64,
    quantity: i64,
}

fn generate(rng: &mut SimpleRng, count: usize) -> Result<Vec<Row>> {
    let start = NaiveDate::from_ymd_opt(2014, 1, 1).context("invalid start date")?;
    let mut rows = Vec::with_capacity(count);
    for _ in 0..count {
        let order_date = start
            .checked_add_days(Days::new(rng.next_u64() % (4 * 365)))
            .context("date out of range")?;
        let place = *rng.pick(PLACES);
        let product = *rng.pick(PRODUCTS);
        let segment = *rng.pick(SEGMENTS);
        let quantity = 1 + (rng.next_u64() % 9) as i64;
        let discount = (rng.next_f64() * 0.4 * 100.0).round() / 100.0;
        let sales = (product.2 * quantity as f64 * (1.0 - discount) * 100.0).round() / 100.0;
        let margin = 0.3 - discount - 0.1 * rng.next_f64();
        let profit = (sales * margin * 10000.0).round() / 10000.0;

        rows.push(Row {
            order_date,
            place,
            product,
            segment,
            sales,
            profit,
            quantity,
        });
    }
    Ok(rows)
}

/// Superstore-style export: `m/d/Y` dates, row id first.
fn write_csv(rows: &[Row], path: &str) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("creating {path}"))?;
    wtr.write_record([
        "Row ID",
        "Order Date",
        "Segment",
        "City",
        "State",
        "Region",
        "Category",
        "Sub-Category",
        "Sales",
        "Quantity",
        "Profit",
    ])?;
    for (i, r) in rows.iter().enumerate() {
        wtr.write_record([
            (i + 1).to_string(),
            r.order_date.format("%-m/%-d/%Y").to_string(),
            r.segment.to_string(),
            r.place.2.to_string(),
            r.place.1.to_string(),
            r.place.0.to_string(),
            r.product.0.to_string(),
            r.product.1.to_string(),
            r.sales.to_string(),
            r.quantity.to_string(),
            r.profit.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_parquet(rows: &[Row], path: &str) -> Result<()> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).context("invalid epoch")?;
    let text = |f: fn(&Row) -> &str| StringArray::from(rows.iter().map(f).collect::<Vec<_>>());

    let schema = Arc::new(Schema::new(vec![
        Field::new("Order Date", DataType::Date32, false),
        Field::new("Region", DataType::Utf8, false),
        Field::new("State", DataType::Utf8, false),
        Field::new("City", DataType::Utf8, false),
        Field::new("Category", DataType::Utf8, false),
        Field::new("Sub-Category", DataType::Utf8, false),
        Field::new("Segment", DataType::Utf8, false),
        Field::new("Sales", DataType::Float64, false),
        Field::new("Profit", DataType::Float64, false),
        Field::new("Quantity", DataType::Int64, false),
    ]));

    let days: Vec<i32> = rows
        .iter()
        .map(|r| (r.order_date - epoch).num_days() as i32)
        .collect();

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Date32Array::from(days)),
            Arc::new(text(|r| r.place.0)),
            Arc::new(text(|r| r.place.1)),
            Arc::new(text(|r| r.place.2)),
            Arc::new(text(|r| r.product.0)),
            Arc::new(text(|r| r.product.1)),
            Arc::new(text(|r| r.segment)),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.sales).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.profit).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.quantity).collect::<Vec<_>>())),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let rows = generate(&mut rng, 2000)?;

    let csv_path = "Sample - Superstore.csv";
    let parquet_path = "sample_data.parquet";
    write_csv(&rows, csv_path)?;
    write_parquet(&rows, parquet_path)?;

    println!("Wrote {} orders to {csv_path} and {parquet_path}", rows.len());
    Ok(())
}
