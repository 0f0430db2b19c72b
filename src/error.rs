//! Error types for the downloader.
//!
//! All fallible operations in the core pipeline return [`Result<T>`], an
//! alias for `std::result::Result<T, DownloadError>`. Validation errors are
//! raised before any I/O; a resolution miss is a first-class outcome so the
//! batch layer can decide per-instrument behavior instead of unwinding.

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DownloadError>;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// A request field failed validation before any I/O was attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No tier of the lookup matched.
    #[error("no scrip master entry for {0}")]
    ScripNotFound(String),

    /// At least one name in a batch failed to resolve; nothing was fetched.
    #[error("could not resolve scrip names: {}", .0.join(", "))]
    ResolutionFailed(Vec<String>),

    #[error("invalid date range: from {from} is after to {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    /// The remote returned a failure signal, or an intraday fetch yielded
    /// no data across every sub-range.
    #[error("historical data fetch failed: {0}")]
    FetchFailed(String),

    #[error("login failed: {0}")]
    LoginFailed(String),

    /// A structured error response from the brokerage API.
    #[error("broker API error: {0}")]
    Api(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scrip store error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
