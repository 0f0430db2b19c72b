//! Date-range splitting for chunked intraday fetches.
//!
//! The brokerage API caps intraday requests at 180 days per call, so longer
//! ranges are walked in consecutive sub-ranges.

use chrono::{Duration, NaiveDate};

use crate::error::{DownloadError, Result};

/// Maximum span of a single intraday request, in days.
pub const MAX_WINDOW_DAYS: i64 = 180;

/// Split `[from, to]` into consecutive, non-overlapping sub-ranges that
/// cover the full range inclusively, each spanning at most `max_days`.
/// The day after each sub-range's end becomes the next sub-range's start.
///
/// `from == to` yields a single degenerate span.
pub fn split_range(
    from: NaiveDate,
    to: NaiveDate,
    max_days: i64,
) -> Result<Vec<(NaiveDate, NaiveDate)>> {
    if from > to {
        return Err(DownloadError::InvalidRange { from, to });
    }
    if max_days <= 0 {
        return Err(DownloadError::InvalidArgument(format!(
            "window span must be positive, got {} days",
            max_days
        )));
    }

    let span = Duration::days(max_days);
    let mut windows = Vec::new();
    let mut current = from;
    loop {
        let end = (current + span).min(to);
        windows.push((current, end));
        if end >= to {
            break;
        }
        current = end + Duration::days(1);
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_short_range_is_a_single_window() {
        let windows = split_range(date(2024, 1, 1), date(2024, 3, 1), MAX_WINDOW_DAYS).unwrap();
        assert_eq!(windows, vec![(date(2024, 1, 1), date(2024, 3, 1))]);
    }

    #[test]
    fn test_long_range_splits_at_day_180() {
        let windows = split_range(date(2024, 1, 1), date(2024, 8, 1), MAX_WINDOW_DAYS).unwrap();
        assert_eq!(
            windows,
            vec![
                (date(2024, 1, 1), date(2024, 6, 29)),
                (date(2024, 6, 30), date(2024, 8, 1)),
            ]
        );
    }

    #[test]
    fn test_windows_are_contiguous_and_cover_range() {
        let from = date(2020, 1, 1);
        let to = date(2023, 7, 15);
        let windows = split_range(from, to, MAX_WINDOW_DAYS).unwrap();

        assert_eq!(windows.first().unwrap().0, from);
        assert_eq!(windows.last().unwrap().1, to);
        for (sub_from, sub_to) in &windows {
            assert!(sub_from <= sub_to);
            assert!((*sub_to - *sub_from).num_days() <= MAX_WINDOW_DAYS);
        }
        for pair in windows.windows(2) {
            assert_eq!(pair[1].0, pair[0].1 + Duration::days(1));
        }
    }

    #[test]
    fn test_same_day_range_yields_one_span() {
        let windows = split_range(date(2024, 5, 6), date(2024, 5, 6), MAX_WINDOW_DAYS).unwrap();
        assert_eq!(windows, vec![(date(2024, 5, 6), date(2024, 5, 6))]);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let result = split_range(date(2024, 2, 1), date(2024, 1, 1), MAX_WINDOW_DAYS);
        assert!(matches!(result, Err(DownloadError::InvalidRange { .. })));
    }

    #[test]
    fn test_tiny_max_span() {
        let windows = split_range(date(2024, 1, 1), date(2024, 1, 5), 1).unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], (date(2024, 1, 1), date(2024, 1, 2)));
        assert_eq!(windows[2], (date(2024, 1, 5), date(2024, 1, 5)));
    }
}
