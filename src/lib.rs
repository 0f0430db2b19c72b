//! Historical market data downloader
//!
//! Downloads OHLCV bars from a brokerage data API, keeps a SQLite index
//! over the scrip master reference table for name resolution, and persists
//! results as CSV files keyed by request parameters so repeated runs skip
//! work already done.

pub mod auth;
pub mod batch;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod scrip_store;
pub mod types;
pub mod window;

pub use config::Config;
pub use error::{DownloadError, Result};
pub use types::*;
