use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Timestamp — canonical time representation (whole seconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
}

impl Timestamp {
    pub fn now() -> Self {
        Self {
            seconds_since_epoch: chrono::Utc::now().timestamp().max(0) as u64,
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
        }
    }

    pub fn as_secs(&self) -> u64 {
        self.seconds_since_epoch
    }

    pub fn add_secs(self, seconds: u64) -> Self {
        Self {
            seconds_since_epoch: self.seconds_since_epoch.saturating_add(seconds),
        }
    }

    pub fn saturating_sub_secs(self, seconds: u64) -> Self {
        Self {
            seconds_since_epoch: self.seconds_since_epoch.saturating_sub(seconds),
        }
    }

    pub fn to_rfc3339(&self) -> String {
        chrono::DateTime::from_timestamp(self.seconds_since_epoch as i64, 0)
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seconds_since_epoch)
    }
}

// ---------------------------------------------------------------------------
// StatusCode — the closed protocol status taxonomy
//
// Wire-stable integer codes grouped by phase: 1xx malformed/invalid challenge,
// 2xx malformed/invalid client response, 3xx service-side failures.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum StatusCode {
    Successful = 0,
    RequestBroken = 100,
    RequestMissingScheme = 111,
    RequestMissingDomain = 112,
    RequestMissingNonce = 113,
    RequestMalformedScheme = 121,
    RequestMalformedDomain = 122,
    RequestInvalidDomain = 131,
    RequestInvalidNonce = 132,
    RequestAltered = 141,
    RequestExpired = 142,
    RequestConsumed = 143,
    ResponseBroken = 200,
    ResponseMissingRequest = 211,
    ResponseMissingAddress = 212,
    ResponseMissingSignature = 213,
    ResponseMissingMetadata = 214,
    ResponseMalformedAddress = 221,
    ResponseMalformedSignature = 222,
    ResponseMalformedMetadata = 223,
    ResponseInvalidMethod = 231,
    ResponseInvalidAddress = 232,
    ResponseInvalidSignature = 233,
    ResponseInvalidMetadata = 234,
    ServiceBroken = 300,
    ServiceAddressDenied = 311,
    ServiceAddressRevoked = 312,
    ServiceActionDenied = 321,
    ServiceActionUnavailable = 322,
    ServiceActionNotImplemented = 323,
    ServiceInternalError = 331,
}

impl StatusCode {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Successful)
    }
}

impl From<StatusCode> for u16 {
    fn from(status: StatusCode) -> u16 {
        status as u16
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        use StatusCode::*;
        let status = match code {
            0 => Successful,
            100 => RequestBroken,
            111 => RequestMissingScheme,
            112 => RequestMissingDomain,
            113 => RequestMissingNonce,
            121 => RequestMalformedScheme,
            122 => RequestMalformedDomain,
            131 => RequestInvalidDomain,
            132 => RequestInvalidNonce,
            141 => RequestAltered,
            142 => RequestExpired,
            143 => RequestConsumed,
            200 => ResponseBroken,
            211 => ResponseMissingRequest,
            212 => ResponseMissingAddress,
            213 => ResponseMissingSignature,
            214 => ResponseMissingMetadata,
            221 => ResponseMalformedAddress,
            222 => ResponseMalformedSignature,
            223 => ResponseMalformedMetadata,
            231 => ResponseInvalidMethod,
            232 => ResponseInvalidAddress,
            233 => ResponseInvalidSignature,
            234 => ResponseInvalidMetadata,
            300 => ServiceBroken,
            311 => ServiceAddressDenied,
            312 => ServiceAddressRevoked,
            321 => ServiceActionDenied,
            322 => ServiceActionUnavailable,
            323 => ServiceActionNotImplemented,
            331 => ServiceInternalError,
            other => return Err(format!("unknown status code {}", other)),
        };
        Ok(status)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use StatusCode::*;
        let name = match self {
            Successful => "successful",
            RequestBroken => "request_broken",
            RequestMissingScheme => "request_missing_scheme",
            RequestMissingDomain => "request_missing_domain",
            RequestMissingNonce => "request_missing_nonce",
            RequestMalformedScheme => "request_malformed_scheme",
            RequestMalformedDomain => "request_malformed_domain",
            RequestInvalidDomain => "request_invalid_domain",
            RequestInvalidNonce => "request_invalid_nonce",
            RequestAltered => "request_altered",
            RequestExpired => "request_expired",
            RequestConsumed => "request_consumed",
            ResponseBroken => "response_broken",
            ResponseMissingRequest => "response_missing_request",
            ResponseMissingAddress => "response_missing_address",
            ResponseMissingSignature => "response_missing_signature",
            ResponseMissingMetadata => "response_missing_metadata",
            ResponseMalformedAddress => "response_malformed_address",
            ResponseMalformedSignature => "response_malformed_signature",
            ResponseMalformedMetadata => "response_malformed_metadata",
            ResponseInvalidMethod => "response_invalid_method",
            ResponseInvalidAddress => "response_invalid_address",
            ResponseInvalidSignature => "response_invalid_signature",
            ResponseInvalidMetadata => "response_invalid_metadata",
            ServiceBroken => "service_broken",
            ServiceAddressDenied => "service_address_denied",
            ServiceAddressRevoked => "service_address_revoked",
            ServiceActionDenied => "service_action_denied",
            ServiceActionUnavailable => "service_action_unavailable",
            ServiceActionNotImplemented => "service_action_not_implemented",
            ServiceInternalError => "service_internal_error",
        };
        write!(f, "{}", name)
    }
}

// ---------------------------------------------------------------------------
// StatusConfirmation — the engine's single unit of outcome reporting
// ---------------------------------------------------------------------------

/// A status code plus human-readable message, serialized as the response body
/// of a confirmation: `{"status": 0, "message": ""}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfirmation {
    pub status: StatusCode,
    pub message: String,
}

impl StatusConfirmation {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn successful() -> Self {
        Self {
            status: StatusCode::Successful,
            message: String::new(),
        }
    }
}
