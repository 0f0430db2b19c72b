//! File-based cache for downloaded bar series.
//!
//! The cache key is the output path itself, derived deterministically from
//! the request parameters. Existence of the file is the sole hit signal;
//! content is never inspected, trading staleness risk for zero redundant
//! remote calls. That trade-off is deliberate and documented.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::types::{Bar, Exchange, ExchangeSegment, Interval};

/// Deterministic cache path for one (scrip, exchange, segment, interval,
/// range) tuple. Injective as long as scrip codes are distinct.
pub fn bar_file_path(
    data_dir: &Path,
    scrip_code: i64,
    exchange: Exchange,
    segment: ExchangeSegment,
    interval: Interval,
    from: chrono::NaiveDate,
    to: chrono::NaiveDate,
) -> PathBuf {
    data_dir.join(scrip_code.to_string()).join(format!(
        "{}_{}_{}_{}_{}_to_{}.csv",
        scrip_code,
        exchange.name(),
        segment.name(),
        interval.as_str(),
        from,
        to
    ))
}

/// Pure existence check.
pub fn is_cached(path: &Path) -> bool {
    path.exists()
}

/// Create all missing parent directories of `path`.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            info!("Directory {} does not exist. Creating it", parent.display());
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write a bar series to `path` as CSV.
///
/// Daily bars get their timestamp truncated to the calendar date; intraday
/// bars keep the full timestamp.
pub fn write_bars(path: &Path, bars: &[Bar], interval: Interval) -> Result<()> {
    ensure_parent_dir(path)?;

    let mut file = File::create(path)?;
    writeln!(file, "Datetime,Open,High,Low,Close,Volume")?;
    for bar in bars {
        let datetime = if interval.is_intraday() {
            bar.datetime.format("%Y-%m-%dT%H:%M:%S").to_string()
        } else {
            bar.datetime.date().to_string()
        };
        writeln!(
            file,
            "{},{},{},{},{},{}",
            datetime, bar.open, bar.high, bar.low, bar.close, bar.volume
        )?;
    }

    info!("Saved {} rows to {}", bars.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn bar(s: &str) -> Bar {
        Bar {
            datetime: NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap(),
            open: 100.0,
            high: 105.0,
            low: 95.0,
            close: 102.5,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_path_is_deterministic_and_keyed_on_all_fields() {
        let dir = PathBuf::from("data");
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

        let path = bar_file_path(
            &dir,
            2885,
            Exchange::Nse,
            ExchangeSegment::Cash,
            Interval::Day,
            from,
            to,
        );
        assert_eq!(
            path,
            PathBuf::from("data/2885/2885_NSE_Cash_1d_2024-01-01_to_2024-02-01.csv")
        );

        let other = bar_file_path(
            &dir,
            2885,
            Exchange::Nse,
            ExchangeSegment::Cash,
            Interval::Min5,
            from,
            to,
        );
        assert_ne!(path, other);
    }

    #[test]
    fn test_write_creates_parent_dirs_and_truncates_daily_timestamps() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("2885").join("out.csv");

        let bars = vec![bar("2024-01-02T00:00:00")];
        write_bars(&path, &bars, Interval::Day).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "Datetime,Open,High,Low,Close,Volume");
        assert_eq!(lines.next().unwrap(), "2024-01-02,100,105,95,102.5,1000");
    }

    #[test]
    fn test_write_keeps_intraday_timestamps() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.csv");

        write_bars(&path, &[bar("2024-01-02T09:15:00")], Interval::Min15).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("2024-01-02T09:15:00,"));
    }

    #[test]
    fn test_is_cached_reflects_existence() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("f.csv");
        assert!(!is_cached(&path));
        std::fs::write(&path, "x").unwrap();
        assert!(is_cached(&path));
    }
}
