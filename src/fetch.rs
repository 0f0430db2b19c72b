//! Historical data fetch orchestration.
//!
//! One instrument at a time: check the cache, hit the remote (single call
//! for daily, chunked for intraday), write the result. Modeled after the
//! remote API's contract that an empty table is a valid answer while a
//! missing table is not.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration as StdDuration;
use tracing::info;

use crate::cache;
use crate::client::BrokerClient;
use crate::error::{DownloadError, Result};
use crate::types::{Exchange, ExchangeSegment, Interval, ResolvedScrip};
use crate::window::{self, MAX_WINDOW_DAYS};

/// Pause between consecutive chunked requests.
const REQUEST_DELAY_MS: u64 = 500;

/// What a single-instrument fetch ended up doing.
#[derive(Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Output file already exists; the remote was never contacted.
    Cached,
    /// Daily fetch came back empty — a valid terminal outcome, no file
    /// written.
    NoData,
    Written { path: PathBuf, rows: usize },
}

pub struct HistoricalFetcher<'a> {
    client: &'a dyn BrokerClient,
    data_dir: PathBuf,
    request_delay: StdDuration,
}

impl<'a> HistoricalFetcher<'a> {
    pub fn new(client: &'a dyn BrokerClient, data_dir: impl AsRef<Path>) -> Self {
        Self {
            client,
            data_dir: data_dir.as_ref().to_path_buf(),
            request_delay: StdDuration::from_millis(REQUEST_DELAY_MS),
        }
    }

    pub fn with_request_delay(mut self, delay: StdDuration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Fetch one instrument's bars for the requested range, honoring the
    /// file cache. Exchange, segment and interval arrive already validated
    /// by construction.
    pub fn fetch_one(
        &self,
        scrip: &ResolvedScrip,
        exchange: Exchange,
        segment: ExchangeSegment,
        interval: Interval,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<FetchOutcome> {
        let path = cache::bar_file_path(
            &self.data_dir,
            scrip.code,
            exchange,
            segment,
            interval,
            from,
            to,
        );
        if cache::is_cached(&path) {
            info!(
                "Data already exists for {} at {}, skipping download",
                scrip.name,
                path.display()
            );
            return Ok(FetchOutcome::Cached);
        }

        info!(
            "Fetching data for {} (scrip {}) on {} {} for {} interval from {} to {}",
            scrip.name,
            scrip.code,
            exchange.name(),
            segment.name(),
            interval,
            from,
            to
        );

        if interval.is_intraday() {
            self.fetch_intraday(scrip, exchange, segment, interval, from, to, &path)
        } else {
            self.fetch_daily(scrip, exchange, segment, from, to, &path)
        }
    }

    /// Daily granularity: one call for the whole range, no chunking
    /// fallback. An empty table is a market-closure-style non-event.
    fn fetch_daily(
        &self,
        scrip: &ResolvedScrip,
        exchange: Exchange,
        segment: ExchangeSegment,
        from: NaiveDate,
        to: NaiveDate,
        path: &Path,
    ) -> Result<FetchOutcome> {
        let bars = self
            .client
            .historical_bars(exchange, segment, scrip.code, Interval::Day, from, to)?
            .ok_or_else(|| {
                DownloadError::FetchFailed(format!(
                    "no response table for {} ({} {}) from {} to {}",
                    scrip.name,
                    exchange.name(),
                    segment.name(),
                    from,
                    to
                ))
            })?;

        if bars.is_empty() {
            info!("No data found for {} from {} to {}", scrip.name, from, to);
            return Ok(FetchOutcome::NoData);
        }

        cache::write_bars(path, &bars, Interval::Day)?;
        Ok(FetchOutcome::Written {
            path: path.to_path_buf(),
            rows: bars.len(),
        })
    }

    /// Sub-day granularity: walk the range in windows of at most
    /// [`MAX_WINDOW_DAYS`], sequentially. Empty windows are skipped; a
    /// missing table aborts the instrument; all windows empty means the
    /// instrument/segment combination is likely wrong and is an error.
    #[allow(clippy::too_many_arguments)]
    fn fetch_intraday(
        &self,
        scrip: &ResolvedScrip,
        exchange: Exchange,
        segment: ExchangeSegment,
        interval: Interval,
        from: NaiveDate,
        to: NaiveDate,
        path: &Path,
    ) -> Result<FetchOutcome> {
        let windows = window::split_range(from, to, MAX_WINDOW_DAYS)?;
        if windows.len() > 1 {
            info!(
                "Range {} to {} exceeds {} days, downloading in {} chunks",
                from,
                to,
                MAX_WINDOW_DAYS,
                windows.len()
            );
        }

        let mut bars = Vec::new();
        for (i, (sub_from, sub_to)) in windows.iter().enumerate() {
            if i > 0 {
                sleep(self.request_delay);
            }
            let chunk = self
                .client
                .historical_bars(exchange, segment, scrip.code, interval, *sub_from, *sub_to)?
                .ok_or_else(|| {
                    DownloadError::FetchFailed(format!(
                        "no response table for {} ({} {}) from {} to {}",
                        scrip.name,
                        exchange.name(),
                        segment.name(),
                        sub_from,
                        sub_to
                    ))
                })?;

            if chunk.is_empty() {
                info!(
                    "No data found for {} from {} to {}",
                    scrip.name, sub_from, sub_to
                );
                continue;
            }
            // Windows come back in splitter order, so plain concatenation
            // keeps the series chronological.
            bars.extend(chunk);
        }

        if bars.is_empty() {
            return Err(DownloadError::FetchFailed(format!(
                "no data across the whole range {} to {} for {}",
                from, to, scrip.name
            )));
        }

        cache::write_bars(path, &bars, interval)?;
        Ok(FetchOutcome::Written {
            path: path.to_path_buf(),
            rows: bars.len(),
        })
    }
}
