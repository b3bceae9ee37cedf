/// Data layer: core types, loading, filtering, aggregation and export.
///
/// Architecture:
/// ```text
///  upload bytes / fallback path (.csv .txt .xlsx .xls .json .parquet)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse rows → Dataset (bad rows skipped)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  Vec<Record>, region/state/city options, bounds
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  FilterCriteria → FilteredView (indices)
///   └──────────┘
///        │
///        ├──────────────┐
///        ▼              ▼
///   ┌───────────┐  ┌──────────┐
///   │ aggregate  │  │  export   │  CSV downloads
///   └───────────┘  └──────────┘
/// ```

pub mod aggregate;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
