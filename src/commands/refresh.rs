//! Refresh command: force a scrip master update regardless of staleness

use anyhow::Result;
use tracing::info;

use scrip_downloader::auth::Credentials;
use scrip_downloader::client::FivePaisaClient;
use scrip_downloader::scrip_store::{self, ScripStore};
use scrip_downloader::Config;

pub fn run(config_path: Option<String>) -> Result<()> {
    let config = Config::load(config_path.as_deref())?;

    // The scrip master endpoint is public; no session needed.
    let credentials = Credentials::from_env()?;
    let client = FivePaisaClient::new(credentials, &config);

    let store = ScripStore::new(config.scrip_master_db());
    let rows = scrip_store::ensure_scrip_master(&client, &config.scrip_master_csv(), &store, true)?;

    info!("Scrip master refreshed: {} instruments indexed", rows);
    Ok(())
}
