//! Resolve command: look up a single scrip name against the local master

use anyhow::Result;

use scrip_downloader::scrip_store::ScripStore;
use scrip_downloader::Config;

pub fn run(config_path: Option<String>, name: String) -> Result<()> {
    let config = Config::load(config_path.as_deref())?;
    let store = ScripStore::new(config.scrip_master_db());

    if !store.db_path().exists() {
        anyhow::bail!(
            "scrip master database not found at {}; run the refresh or download command first",
            store.db_path().display()
        );
    }

    let resolution = store.resolve_by_name(&name)?;
    let info = store.resolve_by_code(resolution.code)?;

    println!("Scrip code: {}", resolution.code);
    println!("Name:       {}", info.name);
    println!("Full name:  {}", info.full_name);
    println!("Exchange:   {}", info.exchange);
    if resolution.partial {
        println!("Warning:    substring match only, verify this is the intended instrument");
    }
    Ok(())
}
