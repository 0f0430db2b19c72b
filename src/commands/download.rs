//! Download command implementation

use anyhow::Result;
use tracing::{error, info};

use scrip_downloader::auth::Credentials;
use scrip_downloader::batch::{self, BatchOptions};
use scrip_downloader::client::FivePaisaClient;
use scrip_downloader::scrip_store::{self, ScripStore};
use scrip_downloader::types::FetchRequest;
use scrip_downloader::Config;

use super::parse_date;

#[allow(clippy::too_many_arguments)]
pub fn run(
    config_path: Option<String>,
    names: String,
    exchange: String,
    segment: String,
    interval: String,
    from: String,
    to: String,
    continue_on_error: bool,
) -> Result<()> {
    let config = Config::load(config_path.as_deref())?;

    // Validate the whole request up front, before touching credentials,
    // the network, or the scrip master.
    let request = FetchRequest {
        exchange: exchange.parse()?,
        segment: segment.parse()?,
        names: names
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        interval: interval.parse()?,
        from: parse_date(&from)?,
        to: parse_date(&to)?,
    };
    request.validate()?;

    let credentials = Credentials::from_env()?;
    let mut client = FivePaisaClient::new(credentials, &config);
    client.connect()?;

    let store = ScripStore::new(config.scrip_master_db());
    scrip_store::ensure_scrip_master(&client, &config.scrip_master_csv(), &store, false)?;

    let options = BatchOptions {
        continue_on_error: continue_on_error || config.continue_on_error,
    };
    let report = batch::run(&client, &store, &config.data_dir, &request, &options)?;

    let written = report.written();
    let cached = report.cached();
    info!(
        "Batch complete: {} downloaded, {} cached, {} with no data",
        written,
        cached,
        report.outcomes.len() - written - cached
    );

    if !report.failures.is_empty() {
        for (name, e) in &report.failures {
            error!("{}: {}", name, e);
        }
        anyhow::bail!(
            "{} of {} instruments failed",
            report.failures.len(),
            report.resolved.len()
        );
    }
    Ok(())
}
