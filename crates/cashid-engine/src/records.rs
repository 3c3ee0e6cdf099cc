//! Cache records and key derivation.
//!
//! Every pending challenge lives in the request cache under a nonce-derived
//! key; successful validations additionally persist the raw response and the
//! confirmation under their own prefixes.

use cashid_core::{CashIdError, CashIdResult, Timestamp};
use serde::{Deserialize, Serialize};

/// Storage key prefix for pending challenge records.
pub const REQUEST_KEY_PREFIX: &str = "cashid_request_";

/// Storage key prefix for validated response payloads.
pub const RESPONSE_KEY_PREFIX: &str = "cashid_response_";

/// Storage key prefix for confirmation payloads.
pub const CONFIRMATION_KEY_PREFIX: &str = "cashid_confirmation_";

pub fn request_key(nonce: &str) -> String {
    format!("{}{}", REQUEST_KEY_PREFIX, nonce)
}

pub fn response_key(nonce: &str) -> String {
    format!("{}{}", RESPONSE_KEY_PREFIX, nonce)
}

pub fn confirmation_key(nonce: &str) -> String {
    format!("{}{}", CONFIRMATION_KEY_PREFIX, nonce)
}

// ---------------------------------------------------------------------------
// PendingRequestRecord — the lifecycle record of one issued challenge
// ---------------------------------------------------------------------------

/// Created at issuance with `available = true`; atomically overwritten with
/// `available = false` when the response consuming it validates. Never
/// deleted by the engine — cache TTL/eviction retires it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequestRecord {
    pub available: bool,
    pub request: String,
    pub expires: Timestamp,
}

impl PendingRequestRecord {
    pub fn issued(request: impl Into<String>, expires: Timestamp) -> Self {
        Self {
            available: true,
            request: request.into(),
            expires,
        }
    }

    /// The same record, flipped unavailable. Used as the CAS target when a
    /// validation consumes the nonce.
    pub fn consumed(&self) -> Self {
        Self {
            available: false,
            request: self.request.clone(),
            expires: self.expires,
        }
    }
}

pub fn record_to_bytes(record: &PendingRequestRecord) -> CashIdResult<Vec<u8>> {
    serde_json::to_vec(record)
        .map_err(|e| CashIdError::Encoding(format!("request record encode failed: {}", e)))
}

pub fn record_from_bytes(bytes: &[u8]) -> CashIdResult<PendingRequestRecord> {
    serde_json::from_slice(bytes)
        .map_err(|e| CashIdError::Encoding(format!("request record decode failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_derivation() {
        assert_eq!(request_key("123456789"), "cashid_request_123456789");
        assert_eq!(response_key("123456789"), "cashid_response_123456789");
        assert_eq!(
            confirmation_key("123456789"),
            "cashid_confirmation_123456789"
        );
    }

    #[test]
    fn test_record_roundtrip() {
        let record = PendingRequestRecord::issued(
            "cashid:d.example/x.php?x=123456789",
            Timestamp::from_seconds(1_700_000_900),
        );
        let bytes = record_to_bytes(&record).unwrap();
        let restored = record_from_bytes(&bytes).unwrap();
        assert_eq!(restored, record);
        assert!(restored.available);
    }

    #[test]
    fn test_consumed_preserves_request_and_expiry() {
        let record = PendingRequestRecord::issued("uri", Timestamp::from_seconds(100));
        let consumed = record.consumed();
        assert!(!consumed.available);
        assert_eq!(consumed.request, record.request);
        assert_eq!(consumed.expires, record.expires);
    }

    #[test]
    fn test_record_decode_failure_reported() {
        let result = record_from_bytes(b"not json");
        assert!(matches!(result, Err(CashIdError::Encoding(_))));
    }
}
