//! HMAC request signing and ISO-8601 time utilities shared by every
//! per-venue adapter.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over `msg`, hex-encoded. Used by venues whose signature
/// header is lowercase hex.
pub fn hmac_sha256_hex(secret: &str, msg: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(msg.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// HMAC-SHA256 over `msg`, base64-encoded. OKX-style.
pub fn hmac_sha256_base64(secret: &str, msg: &str) -> String {
    use base64::Engine;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(msg.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Current UTC time as `%Y-%m-%dT%H:%M:%S.sssZ`, the wire shape OKX expects.
pub fn iso8601_now() -> String {
    to_iso8601_ms(Utc::now().timestamp_millis())
}

/// Render an epoch-millisecond timestamp as `%Y-%m-%dT%H:%M:%S.sssZ`.
pub fn to_iso8601_ms(ms: i64) -> String {
    let dt = Utc
        .timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 UTC timestamp back into epoch milliseconds.
pub fn from_iso8601(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}

/// Abstracts "now" so the signer and the grid engine can be driven
/// deterministically in tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock fixed to a constant value, for deterministic signing tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha256_base64_matches_okx_fixture() {
        // S6: known pre-hash string + secret -> known base64 signature, byte-for-byte.
        let prehash = "2024-01-01T00:00:00.000ZPOST/api/v5/trade/order{\"instId\":\"BTC-USDT\"}";
        let secret = "test-secret";
        let sig = hmac_sha256_base64(secret, prehash);
        assert_eq!(sig, "9KBSVQFNvWFtWsGPHr/laudonfdA131c4B+y6jaF8A0=");
        // Deterministic: re-signing the identical input reproduces the identical signature.
        assert_eq!(sig, hmac_sha256_base64(secret, prehash));
    }

    #[test]
    fn signing_is_deterministic_across_calls() {
        let a = hmac_sha256_hex("secret", "timestampMETHOD/path{}");
        let b = hmac_sha256_hex("secret", "timestampMETHOD/path{}");
        assert_eq!(a, b);
    }

    #[test]
    fn iso8601_round_trips_through_epoch_millis() {
        let ms = 1_700_000_000_123;
        let s = to_iso8601_ms(ms);
        assert_eq!(from_iso8601(&s), Some(ms));
    }

    #[test]
    fn fixed_clock_is_constant() {
        let clock = FixedClock(42);
        assert_eq!(clock.now_ms(), 42);
        assert_eq!(clock.now_ms(), 42);
    }
}
