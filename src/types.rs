//! Core data types used across the download pipeline

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{DownloadError, Result};

// =============================================================================
// Exchange / Segment / Interval
// =============================================================================

/// Exchange identifier.
///
/// The brokerage API keys exchanges by a single letter; note that `n` is
/// NCDEX while `N` is NSE, so parsing is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exchange {
    Nse,
    Bse,
    Mcx,
    Ncdex,
}

impl Exchange {
    /// Wire code used by the brokerage API and the scrip master table.
    pub fn code(self) -> &'static str {
        match self {
            Self::Nse => "N",
            Self::Bse => "B",
            Self::Mcx => "M",
            Self::Ncdex => "n",
        }
    }

    /// Human-readable name, also used in cache file paths.
    pub fn name(self) -> &'static str {
        match self {
            Self::Nse => "NSE",
            Self::Bse => "BSE",
            Self::Mcx => "MCX",
            Self::Ncdex => "NCDEX",
        }
    }
}

impl FromStr for Exchange {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "N" | "NSE" => Ok(Self::Nse),
            "B" | "BSE" => Ok(Self::Bse),
            "M" | "MCX" => Ok(Self::Mcx),
            "n" | "NCDEX" => Ok(Self::Ncdex),
            other => Err(DownloadError::InvalidArgument(format!(
                "invalid exchange '{}', expected one of ['N', 'B', 'M', 'n']",
                other
            ))),
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// The scrip master CSV carries the single-letter wire code.
impl Serialize for Exchange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Exchange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Exchange segment (sub-market classification).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeSegment {
    Cash,
    Derivatives,
    CurrencyDerivatives,
    NcdexCommodity,
    NseBseCommodity,
}

impl ExchangeSegment {
    pub fn code(self) -> &'static str {
        match self {
            Self::Cash => "c",
            Self::Derivatives => "d",
            Self::CurrencyDerivatives => "u",
            Self::NcdexCommodity => "x",
            Self::NseBseCommodity => "y",
        }
    }

    /// Name used in cache file paths.
    pub fn name(self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::Derivatives => "Derivatives",
            Self::CurrencyDerivatives => "Currency_Derivatives",
            Self::NcdexCommodity => "NCDEX_Commodity",
            Self::NseBseCommodity => "NSE_BSE_Commodity",
        }
    }
}

impl FromStr for ExchangeSegment {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "c" | "Cash" => Ok(Self::Cash),
            "d" | "Derivatives" => Ok(Self::Derivatives),
            "u" | "Currency_Derivatives" => Ok(Self::CurrencyDerivatives),
            "x" | "NCDEX_Commodity" => Ok(Self::NcdexCommodity),
            "y" | "NSE_BSE_Commodity" => Ok(Self::NseBseCommodity),
            other => Err(DownloadError::InvalidArgument(format!(
                "invalid exchange segment '{}', expected one of ['c', 'd', 'u', 'x', 'y']",
                other
            ))),
        }
    }
}

impl fmt::Display for ExchangeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Bar granularity. Sub-day intervals are fetched in chunks of at most
/// 180 days per request; daily is fetched in a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Min1,
    Min5,
    Min10,
    Min15,
    Min30,
    Min60,
    Day,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min5 => "5m",
            Self::Min10 => "10m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Min60 => "60m",
            Self::Day => "1d",
        }
    }

    pub fn is_intraday(self) -> bool {
        !matches!(self, Self::Day)
    }
}

impl FromStr for Interval {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1m" => Ok(Self::Min1),
            "5m" => Ok(Self::Min5),
            "10m" => Ok(Self::Min10),
            "15m" => Ok(Self::Min15),
            "30m" => Ok(Self::Min30),
            "60m" => Ok(Self::Min60),
            "1d" => Ok(Self::Day),
            other => Err(DownloadError::InvalidArgument(format!(
                "invalid interval '{}', expected one of ['1m', '5m', '10m', '15m', '30m', '60m', '1d']",
                other
            ))),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Scrip master records
// =============================================================================

/// One row of the scrip master reference table.
///
/// Replaced wholesale on each refresh; the fetch pipeline only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScripRecord {
    pub exch: Exchange,
    pub exch_type: String,
    pub scrip_code: i64,
    pub name: String,
    pub expiry: Option<String>,
    pub strike_rate: Option<f64>,
    pub full_name: String,
}

/// A name resolved against the scrip master, in input order.
///
/// `partial` marks a substring-only match, which carries a materially higher
/// risk of pointing at the wrong instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScrip {
    pub name: String,
    pub code: i64,
    pub partial: bool,
}

// =============================================================================
// Bars
// =============================================================================

/// OHLCV bar as returned by the brokerage API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub datetime: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

// =============================================================================
// Fetch request
// =============================================================================

/// A validated batch download request. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub exchange: Exchange,
    pub segment: ExchangeSegment,
    pub names: Vec<String>,
    pub interval: Interval,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl FetchRequest {
    /// Validate the request before any I/O is attempted.
    pub fn validate(&self) -> Result<()> {
        if self.names.is_empty() {
            return Err(DownloadError::InvalidArgument(
                "at least one scrip name is required".to_string(),
            ));
        }
        if self.names.iter().any(|n| n.trim().is_empty()) {
            return Err(DownloadError::InvalidArgument(
                "scrip names must not be blank".to_string(),
            ));
        }
        if self.from >= self.to {
            return Err(DownloadError::InvalidArgument(format!(
                "from date {} must be before to date {}",
                self.from, self.to
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_codes_are_case_sensitive() {
        assert_eq!("N".parse::<Exchange>().unwrap(), Exchange::Nse);
        assert_eq!("n".parse::<Exchange>().unwrap(), Exchange::Ncdex);
    }

    #[test]
    fn test_exchange_rejects_unknown_code() {
        assert!(matches!(
            "X".parse::<Exchange>(),
            Err(DownloadError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_segment_round_trip() {
        for code in ["c", "d", "u", "x", "y"] {
            let segment: ExchangeSegment = code.parse().unwrap();
            assert_eq!(segment.code(), code);
        }
    }

    #[test]
    fn test_interval_rejects_unsupported_granularity() {
        // "2h" is a valid granularity on other venues but not here
        assert!(matches!(
            "2h".parse::<Interval>(),
            Err(DownloadError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_interval_intraday_flag() {
        assert!("1m".parse::<Interval>().unwrap().is_intraday());
        assert!("60m".parse::<Interval>().unwrap().is_intraday());
        assert!(!"1d".parse::<Interval>().unwrap().is_intraday());
    }

    #[test]
    fn test_request_rejects_empty_names() {
        let request = FetchRequest {
            exchange: Exchange::Nse,
            segment: ExchangeSegment::Cash,
            names: vec![],
            interval: Interval::Day,
            from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        };
        assert!(matches!(
            request.validate(),
            Err(DownloadError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_request_rejects_inverted_dates() {
        let request = FetchRequest {
            exchange: Exchange::Nse,
            segment: ExchangeSegment::Cash,
            names: vec!["RELIANCE".to_string()],
            interval: Interval::Day,
            from: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_scrip_record_csv_round_trip() {
        let header = "Exch,ExchType,ScripCode,Name,Expiry,StrikeRate,FullName";
        let row = "N,C,2885,RELIANCE,,,Reliance Industries";
        let csv_data = format!("{}\n{}\n", header, row);
        let mut reader = csv::Reader::from_reader(csv_data.as_bytes());
        let record: ScripRecord = reader.deserialize().next().unwrap().unwrap();

        assert_eq!(record.exch, Exchange::Nse);
        assert_eq!(record.scrip_code, 2885);
        assert_eq!(record.name, "RELIANCE");
        assert!(record.strike_rate.is_none());
        assert_eq!(record.full_name, "Reliance Industries");
    }
}
