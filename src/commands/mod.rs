//! Subcommand implementations

pub mod download;
pub mod refresh;
pub mod resolve;

use anyhow::{Context, Result};
use chrono::NaiveDate;

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", s))
}
