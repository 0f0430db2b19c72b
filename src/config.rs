//! Configuration management
//!
//! Handles loading and parsing of the JSON configuration file. API
//! credentials never live in the config file; they come from the
//! environment (see [`crate::auth::Credentials`]).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_BASE_URL: &str = "https://openapi.5paisa.com/VendorsAPI/Service1.svc";
const DEFAULT_SCRIP_MASTER_URL: &str =
    "https://images.5paisa.com/website/scripmaster-csv-format.csv";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory for downloaded bar files and the scrip master.
    pub data_dir: PathBuf,
    /// Brokerage API base URL.
    pub base_url: String,
    /// Source of the scrip master reference table.
    pub scrip_master_url: String,
    /// Keep going after a per-instrument fetch failure instead of halting
    /// the batch. Failures are still collected and reported.
    pub continue_on_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            base_url: DEFAULT_BASE_URL.to_string(),
            scrip_master_url: DEFAULT_SCRIP_MASTER_URL.to_string(),
            continue_on_error: false,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        serde_json::from_str(&contents).context("Failed to parse config JSON")
    }

    /// Load from a file when one is given, defaults otherwise.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn scrip_master_csv(&self) -> PathBuf {
        self.data_dir.join("scrip_master.csv")
    }

    pub fn scrip_master_db(&self) -> PathBuf {
        self.data_dir.join("scrip_master.db")
    }
}
