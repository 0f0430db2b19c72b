//! Batch orchestration across a list of requested instruments.
//!
//! Resolution is all-or-nothing: a single unresolved name aborts the batch
//! before any remote call, because a silent subset-success is worse for a
//! trading pipeline than a loud total failure.

use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::client::BrokerClient;
use crate::error::{DownloadError, Result};
use crate::fetch::{FetchOutcome, HistoricalFetcher};
use crate::scrip_store::ScripStore;
use crate::types::{FetchRequest, ResolvedScrip};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Keep going after a per-instrument fetch failure. Off by default;
    /// the first hard failure halts the batch.
    pub continue_on_error: bool,
}

/// Bookkeeping for one batch run.
#[derive(Debug)]
pub struct BatchReport {
    pub resolved: Vec<ResolvedScrip>,
    pub outcomes: Vec<(String, FetchOutcome)>,
    /// Per-instrument failures skipped under `continue_on_error`.
    pub failures: Vec<(String, DownloadError)>,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FetchOutcome::Written { .. }))
            .count()
    }

    pub fn cached(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FetchOutcome::Cached))
            .count()
    }
}

/// Resolve every requested name, then fetch each instrument sequentially.
pub fn run(
    client: &dyn BrokerClient,
    store: &ScripStore,
    data_dir: &Path,
    request: &FetchRequest,
    options: &BatchOptions,
) -> Result<BatchReport> {
    request.validate()?;

    let resolved = resolve_all(store, &request.names)?;
    info!(
        "Resolved {} instruments for {} {} {} from {} to {}",
        resolved.len(),
        request.exchange.name(),
        request.segment.name(),
        request.interval,
        request.from,
        request.to
    );

    let fetcher = HistoricalFetcher::new(client, data_dir);
    let mut outcomes = Vec::with_capacity(resolved.len());
    let mut failures = Vec::new();

    for scrip in &resolved {
        let result = fetcher.fetch_one(
            scrip,
            request.exchange,
            request.segment,
            request.interval,
            request.from,
            request.to,
        );
        match result {
            // A cache hit moves on to the next instrument like any other
            // outcome; it must never short-circuit the rest of the batch.
            Ok(outcome) => outcomes.push((scrip.name.clone(), outcome)),
            Err(e) if options.continue_on_error => {
                warn!("Fetch failed for {}: {}", scrip.name, e);
                failures.push((scrip.name.clone(), e));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(BatchReport {
        resolved,
        outcomes,
        failures,
    })
}

/// Resolve all names in input order, or fail with the full list of misses.
fn resolve_all(store: &ScripStore, names: &[String]) -> Result<Vec<ResolvedScrip>> {
    let mut resolved = Vec::with_capacity(names.len());
    let mut unresolved = Vec::new();

    for name in names {
        match store.resolve_by_name(name) {
            Ok(resolution) => {
                if resolution.partial {
                    warn!(
                        "'{}' resolved to scrip {} via substring match only; verify the instrument",
                        name, resolution.code
                    );
                }
                resolved.push(ResolvedScrip {
                    name: name.clone(),
                    code: resolution.code,
                    partial: resolution.partial,
                });
            }
            Err(DownloadError::ScripNotFound(_)) => unresolved.push(name.clone()),
            Err(e) => return Err(e),
        }
    }

    if !unresolved.is_empty() {
        return Err(DownloadError::ResolutionFailed(unresolved));
    }

    // Two distinct names landing on one code is almost certainly a partial
    // match gone wrong; flag it loudly.
    let mut first_by_code: HashMap<i64, &str> = HashMap::new();
    for scrip in &resolved {
        if let Some(first) = first_by_code.insert(scrip.code, &scrip.name) {
            warn!(
                "'{}' and '{}' resolved to the same scrip code {}",
                first, scrip.name, scrip.code
            );
        }
    }

    Ok(resolved)
}
