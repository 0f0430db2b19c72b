//! Credential loading and TOTP generation for the brokerage login.
//!
//! Credentials come from the environment (a `.env` file is loaded at
//! startup). The login flow needs a fresh RFC 6238 time-based one-time
//! password generated from a base32 shared secret.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{DownloadError, Result};

type HmacSha1 = Hmac<Sha1>;

/// TOTP time step in seconds.
const TOTP_STEP_SECS: u64 = 30;
const TOTP_DIGITS: u32 = 6;

/// Brokerage API credentials.
///
/// The vendor key material identifies the registered application; the
/// client id, PIN and TOTP secret authenticate the user session.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub app_name: String,
    pub user_id: String,
    pub app_source: String,
    pub password: String,
    pub user_key: String,
    pub encryption_key: String,
    pub client_id: String,
    pub app_pin: String,
    totp_secret: String,
}

impl Credentials {
    /// Load credentials from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            app_name: require_env("APP_NAME")?,
            user_id: require_env("USER_ID")?,
            app_source: require_env("APP_SOURCE")?,
            password: require_env("PASSWORD")?,
            user_key: require_env("USER_KEY")?,
            encryption_key: require_env("ENCRYPTION_KEY")?,
            client_id: require_env("CLIENT_ID")?,
            app_pin: require_env("APP_PIN")?,
            totp_secret: require_env("TOTP_SECRET")?,
        })
    }

    /// Generate the current one-time password for this account.
    pub fn generate_totp(&self) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| DownloadError::InvalidArgument(format!("system clock error: {}", e)))?;
        totp_at(&self.totp_secret, now.as_secs())
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| {
        DownloadError::InvalidArgument(format!("missing environment variable {}", name))
    })
}

/// Compute the TOTP code for a unix timestamp.
pub fn totp_at(secret_base32: &str, unix_secs: u64) -> Result<String> {
    let key = decode_base32(secret_base32).ok_or_else(|| {
        DownloadError::InvalidArgument("TOTP secret is not valid base32".to_string())
    })?;
    Ok(hotp(&key, unix_secs / TOTP_STEP_SECS))
}

/// RFC 4226 HOTP with dynamic truncation.
fn hotp(key: &[u8], counter: u64) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    format!("{:01$}", binary % 10u32.pow(TOTP_DIGITS), TOTP_DIGITS as usize)
}

/// RFC 4648 base32 decoding. Padding, whitespace and case are tolerated
/// since authenticator secrets are pasted by hand.
fn decode_base32(s: &str) -> Option<Vec<u8>> {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

    let mut bits: u64 = 0;
    let mut bit_count: u32 = 0;
    let mut out = Vec::with_capacity(s.len() * 5 / 8);

    for c in s.bytes() {
        if c == b'=' || c.is_ascii_whitespace() {
            continue;
        }
        let value = ALPHABET
            .iter()
            .position(|&a| a == c.to_ascii_uppercase())? as u64;
        bits = (bits << 5) | value;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            out.push((bits >> bit_count) as u8);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Shared secret from the RFC 4226 / RFC 6238 test vectors
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn test_base32_decodes_rfc_secret() {
        assert_eq!(
            decode_base32(RFC_SECRET).unwrap(),
            b"12345678901234567890".to_vec()
        );
    }

    #[test]
    fn test_base32_tolerates_padding_case_and_whitespace() {
        assert_eq!(decode_base32("MZXW6YTB").unwrap(), b"fooba".to_vec());
        assert_eq!(decode_base32("mzxw6ytb").unwrap(), b"fooba".to_vec());
        assert_eq!(decode_base32("MZXW 6YTB ====").unwrap(), b"fooba".to_vec());
    }

    #[test]
    fn test_base32_rejects_invalid_characters() {
        assert!(decode_base32("MZXW6YT1").is_none());
    }

    #[test]
    fn test_hotp_rfc4226_vectors() {
        let key = b"12345678901234567890";
        assert_eq!(hotp(key, 0), "755224");
        assert_eq!(hotp(key, 1), "287082");
        assert_eq!(hotp(key, 2), "359152");
        assert_eq!(hotp(key, 9), "520489");
    }

    #[test]
    fn test_totp_rfc6238_vectors() {
        // T = 59 falls in step 1; T = 1111111109 in step 37037036
        assert_eq!(totp_at(RFC_SECRET, 59).unwrap(), "287082");
        assert_eq!(totp_at(RFC_SECRET, 1111111109).unwrap(), "081804");
    }

    #[test]
    fn test_totp_rejects_bad_secret() {
        assert!(totp_at("not base32 at all!!!", 59).is_err());
    }
}
