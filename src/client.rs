//! Brokerage API client.
//!
//! The fetch pipeline only ever sees the [`BrokerClient`] trait; the
//! concrete HTTP implementation lives behind it so tests can substitute an
//! in-memory broker. All calls are blocking and sequential, which is what
//! the remote API's session and rate constraints want.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::thread::sleep;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

use crate::auth::Credentials;
use crate::config::Config;
use crate::error::{DownloadError, Result};
use crate::types::{Bar, Exchange, ExchangeSegment, Interval, ScripRecord};

const HTTP_TIMEOUT_SECS: u64 = 30;
const LOGIN_RETRY_DELAY: StdDuration = StdDuration::from_secs(30);

/// What the pipeline needs from the brokerage.
///
/// `historical_bars` returns `Ok(None)` when the API answered without a
/// data table — a failure signal distinct from an empty series, which is a
/// valid "no data" outcome.
pub trait BrokerClient {
    fn scrip_master(&self) -> Result<Vec<ScripRecord>>;

    fn historical_bars(
        &self,
        exchange: Exchange,
        segment: ExchangeSegment,
        scrip_code: i64,
        interval: Interval,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<Vec<Bar>>>;
}

/// Blocking HTTP client for the 5paisa-style vendor API.
pub struct FivePaisaClient {
    http: reqwest::blocking::Client,
    base_url: String,
    scrip_master_url: String,
    credentials: Credentials,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "AccessToken")]
    access_token: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    status: Option<String>,
    candles: Option<Vec<CandleRow>>,
}

/// One candle as the API ships it: `[datetime, open, high, low, close, volume]`.
#[derive(Debug, Deserialize)]
struct CandleRow(String, f64, f64, f64, f64, f64);

impl FivePaisaClient {
    pub fn new(credentials: Credentials, config: &Config) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(StdDuration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: config.base_url.clone(),
            scrip_master_url: config.scrip_master_url.clone(),
            credentials,
            access_token: None,
        }
    }

    /// Log in with a fresh TOTP. Retries exactly once after a fixed delay,
    /// then surfaces the failure as fatal.
    pub fn connect(&mut self) -> Result<()> {
        info!("Connecting to 5paisa...");
        for attempt in 0..2 {
            match self.login_once() {
                Ok(token) => {
                    self.access_token = Some(token);
                    info!("Logged in to 5paisa successfully");
                    return Ok(());
                }
                Err(e) if attempt == 0 => {
                    warn!("Login failed, retrying in 30 seconds... Error: {}", e);
                    sleep(LOGIN_RETRY_DELAY);
                }
                Err(e) => {
                    return Err(DownloadError::LoginFailed(format!(
                        "could not log in after retry, verify your credentials: {}",
                        e
                    )));
                }
            }
        }
        unreachable!("login loop always returns")
    }

    fn login_once(&self) -> Result<String> {
        let totp = self.credentials.generate_totp()?;
        let url = format!("{}/TOTPLogin", self.base_url);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .header("UserKey", self.credentials.user_key.as_str())
            .json(&serde_json::json!({
                "ClientCode": self.credentials.client_id,
                "TOTP": totp,
                "PIN": self.credentials.app_pin,
            }))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Api(format!("login returned HTTP {}", status)));
        }

        let body: LoginResponse = response.json()?;
        match body.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(DownloadError::LoginFailed(
                body.message
                    .unwrap_or_else(|| "login response carried no access token".to_string()),
            )),
        }
    }

    fn token(&self) -> Result<&str> {
        self.access_token.as_deref().ok_or_else(|| {
            DownloadError::InvalidArgument("not connected, call connect() first".to_string())
        })
    }
}

impl BrokerClient for FivePaisaClient {
    fn scrip_master(&self) -> Result<Vec<ScripRecord>> {
        info!("Downloading scrip master from {}", self.scrip_master_url);
        let response = self.http.get(&self.scrip_master_url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Api(format!(
                "scrip master download returned HTTP {}",
                status
            )));
        }

        let body = response.text()?;
        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        info!("Downloaded {} scrip master rows", records.len());
        Ok(records)
    }

    fn historical_bars(
        &self,
        exchange: Exchange,
        segment: ExchangeSegment,
        scrip_code: i64,
        interval: Interval,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<Vec<Bar>>> {
        let token = self.token()?;
        let url = format!(
            "{}/historical/{}/{}/{}/{}?from={}&end={}",
            self.base_url,
            exchange.code(),
            segment.code(),
            scrip_code,
            interval.as_str(),
            from,
            to
        );
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Api(format!(
                "historical data request returned HTTP {}",
                status
            )));
        }

        parse_bars(&response.text()?)
    }
}

/// Parse a historical-data response body into bars.
///
/// A body without a candle table maps to `Ok(None)`; an explicit empty
/// table maps to `Ok(Some(vec![]))`.
fn parse_bars(body: &str) -> Result<Option<Vec<Bar>>> {
    let response: HistoricalResponse =
        serde_json::from_str(body).map_err(|e| DownloadError::Api(format!(
            "malformed historical data response: {}",
            e
        )))?;

    if let Some(status) = &response.status {
        if status != "success" {
            return Ok(None);
        }
    }
    let rows = match response.candles {
        Some(rows) => rows,
        None => return Ok(None),
    };

    let mut bars = Vec::with_capacity(rows.len());
    for row in rows {
        let datetime = parse_datetime(&row.0).ok_or_else(|| {
            DownloadError::Api(format!("unparseable candle timestamp '{}'", row.0))
        })?;
        bars.push(Bar {
            datetime,
            open: row.1,
            high: row.2,
            low: row.3,
            close: row.4,
            volume: row.5,
        });
    }
    Ok(Some(bars))
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            // Daily candles sometimes arrive date-only
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
