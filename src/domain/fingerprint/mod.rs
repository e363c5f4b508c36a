//! Browser fingerprint token
//!
//! The storefront snapshots a handful of browser attributes at checkout and
//! ships them as base64 over the UTF-8 bytes of a JSON object. The token is
//! stored verbatim on the order; correlation compares tokens byte-for-byte and
//! the admin detail view decodes them for display.

use base64::{
    alphabet,
    engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD},
    engine::DecodePaddingMode,
    Engine,
};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accepts tokens with or without trailing `=` padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Attributes captured client-side. Missing, `null` or mistyped attributes
/// default to `""` / `0`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FingerprintPayload {
    #[serde(deserialize_with = "lenient")]
    pub user_agent: String,
    #[serde(deserialize_with = "lenient")]
    pub language: String,
    /// Accepted locales, comma-joined.
    #[serde(deserialize_with = "lenient")]
    pub languages: String,
    #[serde(deserialize_with = "lenient")]
    pub platform: String,
    /// `"<width>x<height>"`
    #[serde(deserialize_with = "lenient")]
    pub screen_resolution: String,
    #[serde(deserialize_with = "lenient")]
    pub screen_color_depth: u32,
    #[serde(deserialize_with = "lenient")]
    pub timezone: String,
    #[serde(deserialize_with = "lenient")]
    pub timezone_offset: i32,
    #[serde(deserialize_with = "lenient")]
    pub hardware_concurrency: u32,
    /// Approximate device memory in GB.
    #[serde(deserialize_with = "lenient")]
    pub device_memory: f64,
}

/// Reads any JSON value and falls back to the default when it does not fit `T`.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

impl FingerprintPayload {
    pub fn encode(&self) -> FingerprintToken {
        // Serializing a struct of primitives cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        FingerprintToken(STANDARD.encode(json.as_bytes()))
    }

    pub fn language_list(&self) -> Vec<&str> {
        self.languages.split(',').map(str::trim).filter(|l| !l.is_empty()).collect()
    }

    /// Labelled values in capture order, for the admin detail view.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("User Agent", self.user_agent.clone()),
            ("Language", self.language.clone()),
            ("Languages", self.language_list().join(", ")),
            ("Platform", self.platform.clone()),
            ("Screen Resolution", self.screen_resolution.clone()),
            ("Screen Color Depth", self.screen_color_depth.to_string()),
            ("Timezone", self.timezone.clone()),
            ("Timezone Offset", self.timezone_offset.to_string()),
            ("Hardware Concurrency", self.hardware_concurrency.to_string()),
            ("Device Memory", self.device_memory.to_string()),
        ]
    }
}

/// Opaque base64 token as stored on an order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintToken(String);

impl FingerprintToken {
    pub fn new(raw: impl Into<String>) -> Self { Self(raw.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn decode(&self) -> Result<FingerprintPayload, DecodeError> { decode(&self.0) }

    /// Like [`decode`](Self::decode) but logs and swallows the failure.
    pub fn decode_lossy(&self) -> Option<FingerprintPayload> {
        match self.decode() {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(error = %e, "failed to decode fingerprint token");
                None
            }
        }
    }
}

impl fmt::Display for FingerprintToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<String> for FingerprintToken {
    fn from(raw: String) -> Self { Self(raw) }
}

pub fn encode(payload: &FingerprintPayload) -> FingerprintToken { payload.encode() }

/// Inverse of [`encode`]. Never panics on arbitrary input.
pub fn decode(token: &str) -> Result<FingerprintPayload, DecodeError> {
    let bytes = LENIENT.decode(token.trim()).map_err(|e| DecodeError::Base64(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| DecodeError::Utf8(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| DecodeError::Json(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError { Base64(String), Utf8(String), Json(String) }
impl std::error::Error for DecodeError {}
impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64(e) => write!(f, "fingerprint is not valid base64: {e}"),
            Self::Utf8(e) => write!(f, "fingerprint is not valid UTF-8: {e}"),
            Self::Json(e) => write!(f, "fingerprint is not a valid attribute object: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desktop() -> FingerprintPayload {
        FingerprintPayload {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36".into(),
            language: "en-US".into(),
            languages: "en-US,en".into(),
            platform: "Linux x86_64".into(),
            screen_resolution: "1920x1080".into(),
            screen_color_depth: 24,
            timezone: "Africa/Cairo".into(),
            timezone_offset: -120,
            hardware_concurrency: 8,
            device_memory: 8.0,
        }
    }

    #[test]
    fn test_round_trip() {
        let arabic = FingerprintPayload {
            language: "ar-EG".into(),
            languages: "ar-EG,ar,en".into(),
            timezone: "توقيت القاهرة".into(),
            device_memory: 0.5,
            ..desktop()
        };
        for payload in [desktop(), arabic, FingerprintPayload::default()] {
            let token = encode(&payload);
            assert_eq!(decode(token.as_str()).unwrap(), payload);
            assert_eq!(token.decode().unwrap(), payload);
        }
    }

    #[test]
    fn test_token_is_printable_base64() {
        let token = FingerprintPayload { timezone: "آسيا/دبي".into(), ..desktop() }.encode();
        assert!(!token.is_empty());
        assert!(token.as_str().chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')));
    }

    #[test]
    fn test_decodes_storefront_token() {
        // btoa(unescape(encodeURIComponent(JSON.stringify({...}))))
        let json = r#"{"userAgent":"UA","language":"ar","languages":"ar,en","platform":"iPhone","screenResolution":"390x844","screenColorDepth":24,"timezone":"Africa/Cairo","timezoneOffset":-120,"hardwareConcurrency":6,"deviceMemory":0}"#;
        let token = STANDARD.encode(json);
        let payload = decode(&token).unwrap();
        assert_eq!(payload.platform, "iPhone");
        assert_eq!(payload.timezone_offset, -120);
        assert_eq!(payload.language_list(), vec!["ar", "en"]);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let token = STANDARD.encode(r#"{"platform":"Win32","extra":true}"#);
        let payload = decode(&token).unwrap();
        assert_eq!(payload.platform, "Win32");
        assert_eq!(payload.user_agent, "");
        assert_eq!(payload.hardware_concurrency, 0);
    }

    #[test]
    fn test_null_and_mistyped_fields_take_defaults() {
        let token = STANDARD.encode(r#"{"platform":"MacIntel","timezone":null,"hardwareConcurrency":"eight","deviceMemory":null,"screenColorDepth":30}"#);
        let payload = decode(&token).unwrap();
        assert_eq!(payload.platform, "MacIntel");
        assert_eq!(payload.timezone, "");
        assert_eq!(payload.hardware_concurrency, 0);
        assert_eq!(payload.device_memory, 0.0);
        assert_eq!(payload.screen_color_depth, 30);
    }

    #[test]
    fn test_decodes_unpadded_token() {
        let padded = STANDARD.encode(r#"{"platform":"Win32"}"#);
        assert!(padded.ends_with('='));
        let payload = decode(padded.trim_end_matches('=')).unwrap();
        assert_eq!(payload.platform, "Win32");
    }

    #[test]
    fn test_decode_is_total() {
        assert!(matches!(decode("not base64 !!"), Err(DecodeError::Base64(_))));
        assert!(matches!(decode(&STANDARD.encode([0xff, 0xfe, 0x00])), Err(DecodeError::Utf8(_))));
        assert!(matches!(decode(&STANDARD.encode("hello")), Err(DecodeError::Json(_))));
        assert!(matches!(decode(&STANDARD.encode("[1,2]")), Err(DecodeError::Json(_))));
        assert!(decode("").is_err());
        assert!(FingerprintToken::new("%%%").decode_lossy().is_none());
    }

    #[test]
    fn test_entries_order() {
        let labels: Vec<_> = desktop().entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(labels.first(), Some(&"User Agent"));
        assert_eq!(labels.len(), 10);
        let languages = desktop().entries().into_iter().find(|(k, _)| *k == "Languages").map(|(_, v)| v);
        assert_eq!(languages.as_deref(), Some("en-US, en"));
    }
}
