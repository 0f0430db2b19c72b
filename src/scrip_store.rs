//! Scrip master reference store.
//!
//! SQLite-backed lookup index over the brokerage's instrument table.
//! The table is replaced wholesale on each refresh (at most weekly) and is
//! read-only from the perspective of the fetch pipeline. Connections are
//! opened per logical operation; the pipeline is single-threaded so there
//! is no handle sharing to manage.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::client::BrokerClient;
use crate::error::{DownloadError, Result};
use crate::types::{Exchange, ScripRecord};

/// Staleness threshold for the scrip master source file.
pub const SCRIP_MASTER_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Outcome of a name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub code: i64,
    /// True when the match came from a substring tier rather than an exact
    /// one. Callers surface this as a warning.
    pub partial: bool,
}

/// Reverse lookup result.
#[derive(Debug, Clone)]
pub struct ScripInfo {
    pub name: String,
    pub full_name: String,
    pub exchange: Exchange,
}

pub struct ScripStore {
    db_path: PathBuf,
}

impl ScripStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection and make sure the schema exists.
    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS scrip_master (
                Exch TEXT,
                ExchType TEXT,
                ScripCode INTEGER PRIMARY KEY,
                Name TEXT,
                Expiry TEXT,
                StrikeRate REAL,
                FullName TEXT
            )",
            [],
        )?;
        Ok(conn)
    }

    /// Replace the stored instrument table entirely. Idempotent; creates
    /// the schema first if no prior table exists.
    pub fn refresh(&self, records: &[ScripRecord]) -> Result<usize> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM scrip_master", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO scrip_master
                 (Exch, ExchType, ScripCode, Name, Expiry, StrikeRate, FullName)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.exch.code(),
                    record.exch_type,
                    record.scrip_code,
                    record.name,
                    record.expiry,
                    record.strike_rate,
                    record.full_name,
                ])?;
            }
        }
        tx.commit()?;

        info!("Scrip master stored to DB successfully ({} rows)", records.len());
        Ok(records.len())
    }

    /// Resolve a display name to a scrip code.
    ///
    /// Four tiers, first match wins: NSE exact, BSE exact, NSE substring,
    /// BSE substring. Exact matches are case-insensitive; substring matches
    /// take the first row in the store's natural order and are flagged as
    /// partial. A miss is a first-class `ScripNotFound`, not a fault.
    pub fn resolve_by_name(&self, name: &str) -> Result<Resolution> {
        const TIERS: &[(&str, bool)] = &[
            (
                "SELECT ScripCode FROM scrip_master
                 WHERE Exch = 'N' AND Name = ?1 COLLATE NOCASE LIMIT 1",
                false,
            ),
            (
                "SELECT ScripCode FROM scrip_master
                 WHERE Exch = 'B' AND Name = ?1 COLLATE NOCASE LIMIT 1",
                false,
            ),
            (
                "SELECT ScripCode FROM scrip_master
                 WHERE Exch = 'N' AND Name LIKE '%' || ?1 || '%'
                 ORDER BY rowid LIMIT 1",
                true,
            ),
            (
                "SELECT ScripCode FROM scrip_master
                 WHERE Exch = 'B' AND Name LIKE '%' || ?1 || '%'
                 ORDER BY rowid LIMIT 1",
                true,
            ),
        ];

        let conn = self.open()?;
        for (sql, partial) in TIERS {
            let code: Option<i64> = conn
                .prepare(sql)?
                .query_row(params![name], |row| row.get(0))
                .optional()?;
            if let Some(code) = code {
                debug!(
                    "Resolved '{}' to scrip {}{}",
                    name,
                    code,
                    if *partial { " (partial match)" } else { "" }
                );
                return Ok(Resolution {
                    code,
                    partial: *partial,
                });
            }
        }
        Err(DownloadError::ScripNotFound(format!("name '{}'", name)))
    }

    /// Reverse lookup of a scrip code.
    pub fn resolve_by_code(&self, code: i64) -> Result<ScripInfo> {
        let conn = self.open()?;
        let row = conn
            .prepare("SELECT Name, FullName, Exch FROM scrip_master WHERE ScripCode = ?1")?
            .query_row(params![code], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            });

        match row {
            Ok((name, full_name, exch)) => Ok(ScripInfo {
                name,
                full_name,
                exchange: exch.parse()?,
            }),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(DownloadError::ScripNotFound(format!("code {}", code)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Scrip master refresh pipeline
// =============================================================================

/// Make sure the scrip master CSV and the SQLite index are up to date.
///
/// The CSV is re-downloaded when missing, older than
/// [`SCRIP_MASTER_MAX_AGE`], or when `force` is set; the SQLite table is
/// reloaded from the CSV either way so the index always mirrors the file.
pub fn ensure_scrip_master(
    client: &dyn BrokerClient,
    csv_path: &Path,
    store: &ScripStore,
    force: bool,
) -> Result<usize> {
    crate::cache::ensure_parent_dir(csv_path)?;

    if force || is_stale(csv_path, SCRIP_MASTER_MAX_AGE) {
        if !force && csv_path.exists() {
            info!(
                "{} is older than 7 days. Updating...",
                csv_path.display()
            );
        }
        let records = client.scrip_master()?;
        if records.is_empty() {
            return Err(DownloadError::Api(
                "scrip master download returned no rows".to_string(),
            ));
        }
        write_scrip_master_csv(csv_path, &records)?;
        info!("{} has been updated", csv_path.display());
    } else {
        info!("{} is up to date", csv_path.display());
    }

    let records = read_scrip_master_csv(csv_path)?;
    store.refresh(&records)
}

fn is_stale(path: &Path, max_age: Duration) -> bool {
    let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(_) => return true,
    };
    match modified.elapsed() {
        Ok(age) => age > max_age,
        // Clock skew puts mtime in the future; treat as fresh
        Err(_) => false,
    }
}

fn write_scrip_master_csv(path: &Path, records: &[ScripRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_scrip_master_csv(path: &Path) -> Result<Vec<ScripRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(exch: Exchange, code: i64, name: &str, full_name: &str) -> ScripRecord {
        ScripRecord {
            exch,
            exch_type: "C".to_string(),
            scrip_code: code,
            name: name.to_string(),
            expiry: None,
            strike_rate: None,
            full_name: full_name.to_string(),
        }
    }

    fn seeded_store(tmp: &tempfile::TempDir) -> ScripStore {
        let store = ScripStore::new(tmp.path().join("scrip_master.db"));
        store
            .refresh(&[
                record(Exchange::Nse, 2885, "RELIANCE", "Reliance Industries"),
                record(Exchange::Nse, 11536, "TCS", "Tata Consultancy Services"),
                record(Exchange::Nse, 14977, "POWERGRID", "Power Grid Corporation"),
                record(Exchange::Bse, 500325, "RELIANCE-B", "Reliance Industries"),
                record(Exchange::Bse, 532540, "TCSLTD", "Tata Consultancy Services"),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_exact_nse_match_wins_without_partial_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(&tmp);

        let resolution = store.resolve_by_name("RELIANCE").unwrap();
        assert_eq!(resolution.code, 2885);
        assert!(!resolution.partial);
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(&tmp);

        let resolution = store.resolve_by_name("reliance").unwrap();
        assert_eq!(resolution.code, 2885);
        assert!(!resolution.partial);
    }

    #[test]
    fn test_exact_beats_substring_on_same_exchange() {
        // "TCS" matches NSE "TCS" exactly and NSE/BSE names by substring;
        // the exact tier must win.
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(&tmp);

        let resolution = store.resolve_by_name("TCS").unwrap();
        assert_eq!(resolution.code, 11536);
        assert!(!resolution.partial);
    }

    #[test]
    fn test_nse_substring_beats_bse_exact_tiers_order() {
        // "POWER" has no exact match anywhere; NSE substring tier wins and
        // is flagged partial.
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(&tmp);

        let resolution = store.resolve_by_name("POWER").unwrap();
        assert_eq!(resolution.code, 14977);
        assert!(resolution.partial);
    }

    #[test]
    fn test_bse_substring_is_last_resort() {
        // "TCSL" only appears within the BSE name "TCSLTD"
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(&tmp);

        let resolution = store.resolve_by_name("TCSL").unwrap();
        assert_eq!(resolution.code, 532540);
        assert!(resolution.partial);
    }

    #[test]
    fn test_miss_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(&tmp);

        assert!(matches!(
            store.resolve_by_name("NOSUCHSCRIP123"),
            Err(DownloadError::ScripNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(&tmp);

        let resolution = store.resolve_by_name("RELIANCE").unwrap();
        let info = store.resolve_by_code(resolution.code).unwrap();
        assert!(info.name.contains("RELIANCE") || info.full_name.contains("RELIANCE"));
        assert_eq!(info.exchange, Exchange::Nse);
    }

    #[test]
    fn test_refresh_replaces_wholesale() {
        let tmp = tempfile::tempdir().unwrap();
        let store = seeded_store(&tmp);

        store
            .refresh(&[record(Exchange::Nse, 1, "ONLYONE", "Only One Ltd")])
            .unwrap();

        assert!(store.resolve_by_name("RELIANCE").is_err());
        assert_eq!(store.resolve_by_name("ONLYONE").unwrap().code, 1);
    }

    #[test]
    fn test_refresh_on_missing_db_creates_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScripStore::new(tmp.path().join("nested").join("fresh.db"));
        store
            .refresh(&[record(Exchange::Nse, 7, "ABC", "ABC Ltd")])
            .unwrap();
        assert_eq!(store.resolve_by_name("ABC").unwrap().code, 7);
    }

    #[test]
    fn test_scrip_master_csv_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scrip_master.csv");
        let records = vec![
            record(Exchange::Nse, 2885, "RELIANCE", "Reliance Industries"),
            record(Exchange::Ncdex, 9001, "GUARGUM", "Guar Gum"),
        ];

        write_scrip_master_csv(&path, &records).unwrap();
        let loaded = read_scrip_master_csv(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].scrip_code, 2885);
        assert_eq!(loaded[1].exch, Exchange::Ncdex);
    }
}
