use thiserror::Error;

/// Failure to establish a [`Dataset`](crate::data::model::Dataset).
///
/// Individual bad rows never surface here; they are skipped and counted.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("No parseable 'Order Date' column")]
    NoDateColumn,

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse file: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, LoadError>;
