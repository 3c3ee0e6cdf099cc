//! CashID Protocol Engine
//!
//! Challenge-response authentication against Bitcoin Cash addresses: a
//! relying service issues a signed-URI challenge, the client signs it with
//! the key controlling an address, and the service verifies the signature
//! and enforces anti-replay and tamper-detection guarantees before
//! confirming identity.
//!
//! The engine is request-scoped and synchronous. All shared state lives in
//! the injected `RequestCache`; signature checking is delegated to the
//! injected `Notary`. Both default to built-in implementations (in-memory
//! cache, secp256k1 signed-message notary) when omitted.
//!
//! Key pieces:
//! - `api`: the protocol grammar — compact metadata encoding, challenge URI
//!   parsing and assembly
//! - `RequestGenerator`: nonce allocation and challenge issuance
//! - `ResponseHandler`: the ordered validation pipeline and the status
//!   confirmation emitter
//! - `StatusCode`: the closed, wire-stable status taxonomy

pub mod api;
pub mod cache;
pub mod cashaddr;
pub mod config;
pub mod error;
pub mod generator;
pub mod handler;
pub mod notary;
pub mod records;

// Re-export primary types and functions for convenience
pub use api::{
    build_request_uri, decode_request_metadata, encode_request_metadata, is_user_action,
    parse_request, MetadataRequest, MetadataSelection, ParsedRequest, RequestMetadata,
    RequestParameters, SCHEME, USER_ACTIONS,
};
pub use cache::MemoryCache;
pub use config::CashIdConfig;
pub use error::ValidationFailure;
pub use generator::{RandomNonceSource, RequestGenerator, DEFAULT_REQUEST_TTL_SECS};
pub use handler::{
    AuthenticatedResponse, ResponseHandler, DEFAULT_CLOCK_DRIFT_SECS,
    DEFAULT_USER_ACTION_PAST_WINDOW_SECS,
};
pub use notary::DefaultNotary;
pub use records::PendingRequestRecord;

pub use cashid_core::{
    CashIdError, CashIdResult, Clock, NonceSource, Notary, RequestCache, StatusCode,
    StatusConfirmation, SystemClock, Timestamp,
};
