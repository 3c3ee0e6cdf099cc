//! Response validation state machine and status confirmation emitter.
//!
//! `validate_request` runs the ordered pipeline over an untrusted response
//! payload: structural checks, domain and scheme checks, nonce lifecycle
//! enforcement, tamper detection, signature delegation, metadata negotiation,
//! persistence and consumption. The first rejection short-circuits, records
//! the confirmation and returns the failure; a payload either reaches the
//! end or is permanently rejected. There is no retry.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use cashid_core::{
    Clock, Notary, RequestCache, StatusCode, StatusConfirmation, SystemClock,
};

use crate::api::{is_user_action, parse_request, SCHEME};
use crate::config::CashIdConfig;
use crate::error::ValidationFailure;
use crate::records::{
    confirmation_key, record_from_bytes, record_to_bytes, request_key, response_key,
};

/// How far in the past a user-initiated timestamp nonce may lie: 15 hours.
/// Asymmetric with the forward drift by protocol design.
pub const DEFAULT_USER_ACTION_PAST_WINDOW_SECS: u64 = 60 * 60 * 15;

/// Forward clock-drift allowance for user-initiated timestamp nonces.
pub const DEFAULT_CLOCK_DRIFT_SECS: u64 = 60;

/// The success-path return value: the client response enriched with the
/// challenge's action and data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthenticatedResponse {
    pub request: String,
    pub address: String,
    pub signature: String,
    pub metadata: BTreeMap<String, Value>,
    pub action: String,
    pub data: String,
}

pub struct ResponseHandler {
    domain: String,
    notary: Arc<dyn Notary>,
    cache: Arc<dyn RequestCache>,
    clock: Arc<dyn Clock>,
    past_window_secs: u64,
    drift_secs: u64,
    confirmation: Option<StatusConfirmation>,
    response_committed: bool,
}

impl ResponseHandler {
    /// Handler with the built-in notary and a fresh in-memory cache.
    pub fn new(domain: impl Into<String>) -> Self {
        Self::with_capabilities(
            domain,
            Arc::new(crate::notary::DefaultNotary::new()),
            Arc::new(crate::cache::MemoryCache::new()),
        )
    }

    /// Handler over explicit capabilities. The cache must be the one the
    /// `RequestGenerator` issued challenges into.
    pub fn with_capabilities(
        domain: impl Into<String>,
        notary: Arc<dyn Notary>,
        cache: Arc<dyn RequestCache>,
    ) -> Self {
        Self {
            domain: domain.into(),
            notary,
            cache,
            clock: Arc::new(SystemClock),
            past_window_secs: DEFAULT_USER_ACTION_PAST_WINDOW_SECS,
            drift_secs: DEFAULT_CLOCK_DRIFT_SECS,
            confirmation: None,
            response_committed: false,
        }
    }

    pub fn from_config(
        config: &CashIdConfig,
        notary: Arc<dyn Notary>,
        cache: Arc<dyn RequestCache>,
    ) -> Self {
        let mut handler = Self::with_capabilities(config.domain.clone(), notary, cache);
        handler.past_window_secs = config.user_action_past_window_secs;
        handler.drift_secs = config.clock_drift_secs;
        handler
    }

    /// Substitutes the clock, e.g. with a fixed test clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The confirmation established by the last validate/invalidate call.
    pub fn confirmation(&self) -> Option<&StatusConfirmation> {
        self.confirmation.as_ref()
    }

    pub fn response_committed(&self) -> bool {
        self.response_committed
    }

    /// For transport adapters: records that the response boundary has been
    /// crossed outside of `confirm_request`.
    pub fn mark_response_committed(&mut self) {
        self.response_committed = true;
    }

    /// Overwrites the held confirmation with a caller-supplied status.
    ///
    /// Escape hatch for reporting protocol-external failures (e.g.
    /// transport-level problems) through the same confirmation channel.
    pub fn invalidate_request(&mut self, status: StatusCode, message: impl Into<String>) {
        self.confirmation = Some(StatusConfirmation::new(status, message));
    }

    /// Validates a raw response payload against the challenge it echoes.
    ///
    /// On success the pending record is consumed and the enriched response is
    /// returned; on rejection the failure's status and message become the
    /// current confirmation. Either way the confirmation is ready for
    /// `confirm_request`.
    pub fn validate_request(
        &mut self,
        raw_response: &str,
    ) -> Result<AuthenticatedResponse, ValidationFailure> {
        self.confirmation = Some(StatusConfirmation::successful());
        match self.run_pipeline(raw_response) {
            Ok(response) => {
                tracing::debug!(action = %response.action, "response validated");
                Ok(response)
            }
            Err(failure) => {
                tracing::warn!(
                    status = %failure.status,
                    code = failure.status.code(),
                    "response validation rejected"
                );
                self.confirmation = Some(failure.confirmation());
                Err(failure)
            }
        }
    }

    fn run_pipeline(&self, raw_response: &str) -> Result<AuthenticatedResponse, ValidationFailure> {
        // Structural: the payload must be JSON.
        let response: Value = serde_json::from_str(raw_response).map_err(|_| {
            ValidationFailure::new(
                StatusCode::ResponseBroken,
                "Response data is not a valid JSON object.",
            )
        })?;

        // Structural: required fields, in fixed order.
        let request = require_field(&response, "request", StatusCode::ResponseMissingRequest)?;
        let address = require_field(&response, "address", StatusCode::ResponseMissingAddress)?;
        let signature = require_field(&response, "signature", StatusCode::ResponseMissingSignature)?;

        // The echoed challenge URI.
        let parsed = parse_request(request);

        if parsed.scheme.as_deref() != Some(SCHEME) {
            return Err(ValidationFailure::new(
                StatusCode::RequestMalformedScheme,
                format!(
                    "Request scheme '{}' is invalid, should be 'cashid:'.",
                    parsed.scheme.as_deref().unwrap_or("")
                ),
            ));
        }

        if parsed.domain.as_deref() != Some(self.domain.as_str()) {
            return Err(ValidationFailure::new(
                StatusCode::RequestInvalidDomain,
                format!(
                    "Request domain '{}' is invalid, this service uses '{}'.",
                    parsed.domain.as_deref().unwrap_or(""),
                    self.domain
                ),
            ));
        }

        let Some(nonce) = parsed.parameters.nonce.clone() else {
            return Err(ValidationFailure::new(
                StatusCode::RequestMissingNonce,
                "Request parameter 'nonce' is missing.",
            ));
        };

        let user_initiated = parsed
            .parameters
            .action
            .as_deref()
            .is_some_and(is_user_action);
        let now = self.clock.now();

        // Nonce lifecycle. User-initiated requests carry a client timestamp
        // and have no stored record; everything else resolves against the
        // cache.
        let mut consumable: Option<(String, Vec<u8>)> = None;
        if user_initiated {
            let timestamp = nonce.parse::<i64>().unwrap_or(0);
            let recent = now.as_secs() as i64 - self.past_window_secs as i64;
            let current = now.as_secs() as i64 + self.drift_secs as i64;
            if timestamp < recent || timestamp > current {
                return Err(ValidationFailure::new(
                    StatusCode::RequestInvalidNonce,
                    "Request nonce for user initiated action is not a valid and recent timestamp.",
                ));
            }
        } else {
            let key = request_key(&nonce);
            let stored = self
                .cache
                .get(&key)
                .map_err(|_| ValidationFailure::internal(
                    "Internal server error, could not read request record.",
                ))?;
            let Some(bytes) = stored else {
                return Err(ValidationFailure::new(
                    StatusCode::RequestInvalidNonce,
                    "The request nonce was not issued by this service.",
                ));
            };
            let record = record_from_bytes(&bytes).map_err(|_| {
                ValidationFailure::internal(
                    "Internal server error, could not decode request record.",
                )
            })?;
            if !record.available {
                return Err(ValidationFailure::new(
                    StatusCode::RequestConsumed,
                    "The request nonce has already been consumed.",
                ));
            }
            if record.expires < now {
                return Err(ValidationFailure::new(
                    StatusCode::RequestExpired,
                    "The request has expired and is no longer available.",
                ));
            }
            // Tamper detection: exact string equality with the issued URI.
            if record.request != request {
                return Err(ValidationFailure::new(
                    StatusCode::RequestAltered,
                    "The response does not match the request parameters.",
                ));
            }
            consumable = Some((key, bytes));
        }

        // Signature delegation.
        let signature_valid = self
            .notary
            .check_signature(address, signature, request)
            .map_err(|_| {
                ValidationFailure::internal(
                    "Internal server error, could not complete signature verification.",
                )
            })?;
        if !signature_valid {
            return Err(ValidationFailure::new(
                StatusCode::ResponseInvalidSignature,
                "Signature verification failed.",
            ));
        }

        // Metadata negotiation, for server-issued challenges only.
        let metadata = response_metadata(&response);
        if !user_initiated {
            let mut missing: Vec<&str> = Vec::new();
            for field in parsed.parameters.required.field_names() {
                if !metadata.contains_key(field) {
                    missing.push(field);
                }
            }
            if !missing.is_empty() {
                return Err(ValidationFailure::new(
                    StatusCode::ResponseMissingMetadata,
                    format!(
                        "The required metadata field(s) '{}' was not provided.",
                        missing.join(", ")
                    ),
                ));
            }

            for (field, value) in &metadata {
                if !parsed.parameters.required.contains(field)
                    && !parsed.parameters.optional.contains(field)
                {
                    return Err(ValidationFailure::new(
                        StatusCode::ResponseInvalidMetadata,
                        format!("The metadata field '{}' was not part of the request.", field),
                    ));
                }
                if is_empty_value(value) {
                    return Err(ValidationFailure::new(
                        StatusCode::ResponseMalformedMetadata,
                        format!("The metadata field '{}' did not contain any value.", field),
                    ));
                }
            }
        }

        // Persist the outcome before consuming the nonce.
        self.store_outcome(&nonce, &response)?;

        // Consume the pending record: CAS against the exact bytes read above,
        // so concurrent validations of the same nonce cannot both succeed.
        if let Some((key, original_bytes)) = consumable {
            let record = record_from_bytes(&original_bytes).map_err(|_| {
                ValidationFailure::internal(
                    "Internal server error, could not decode request record.",
                )
            })?;
            let consumed_bytes = record_to_bytes(&record.consumed()).map_err(|_| {
                ValidationFailure::internal(
                    "Internal server error, could not encode request record.",
                )
            })?;
            let swapped = self
                .cache
                .compare_and_swap(&key, Some(&original_bytes), &consumed_bytes)
                .map_err(|_| {
                    ValidationFailure::internal(
                        "Internal server error, could not consume request record.",
                    )
                })?;
            if !swapped {
                // A concurrent validation won the race.
                return Err(ValidationFailure::new(
                    StatusCode::RequestConsumed,
                    "The request nonce has already been consumed.",
                ));
            }
        }

        Ok(AuthenticatedResponse {
            request: request.to_string(),
            address: address.to_string(),
            signature: signature.to_string(),
            metadata,
            action: parsed
                .parameters
                .action
                .clone()
                .unwrap_or_else(|| "auth".to_string()),
            data: parsed.parameters.data.clone().unwrap_or_default(),
        })
    }

    fn store_outcome(&self, nonce: &str, response: &Value) -> Result<(), ValidationFailure> {
        let response_bytes = serde_json::to_vec(response).map_err(|_| {
            ValidationFailure::internal("Internal server error, could not encode response object.")
        })?;
        let stored = self
            .cache
            .set(&response_key(nonce), &response_bytes, None)
            .unwrap_or(false);
        if !stored {
            return Err(ValidationFailure::internal(
                "Internal server error, could not store response object.",
            ));
        }

        let confirmation_bytes = serde_json::to_vec(&StatusConfirmation::successful())
            .map_err(|_| {
                ValidationFailure::internal(
                    "Internal server error, could not encode confirmation object.",
                )
            })?;
        let stored = self
            .cache
            .set(&confirmation_key(nonce), &confirmation_bytes, None)
            .unwrap_or(false);
        if !stored {
            return Err(ValidationFailure::internal(
                "Internal server error, could not store confirmation object.",
            ));
        }
        Ok(())
    }

    /// Serializes the current confirmation as the response body and marks the
    /// response boundary crossed.
    ///
    /// # Panics
    ///
    /// Panics if called before any `validate_request`/`invalidate_request`
    /// established a confirmation, or after the response boundary was already
    /// crossed. Both are programmer-usage errors, fatal by contract.
    pub fn confirm_request(&mut self) -> String {
        assert!(
            !self.response_committed,
            "confirm_request called after the response boundary was crossed; \
             the confirmation can no longer be transmitted"
        );
        let confirmation = self.confirmation.as_ref().expect(
            "confirm_request called before validate_request or invalidate_request; \
             there is no confirmation to transmit",
        );
        let body =
            serde_json::to_string(confirmation).expect("confirmation serializes to JSON");
        self.response_committed = true;
        body
    }
}

fn require_field<'a>(
    response: &'a Value,
    field: &str,
    status: StatusCode,
) -> Result<&'a str, ValidationFailure> {
    response
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ValidationFailure::new(
                status,
                format!("Response data is missing required '{}' property.", field),
            )
        })
}

fn response_metadata(response: &Value) -> BTreeMap<String, Value> {
    match response.get("metadata") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
