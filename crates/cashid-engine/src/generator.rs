//! Challenge issuance.
//!
//! The `RequestGenerator` builds challenge URIs, allocates unique nonces and
//! persists the pending-request record through the cache capability. All
//! collaborators (cache, clock, nonce source) are explicit and injectable,
//! so issuance is deterministic under test.

use std::sync::Arc;

use rand::Rng;

use cashid_core::{CashIdError, CashIdResult, Clock, NonceSource, RequestCache, SystemClock};

use crate::api::{build_request_uri, encode_request_metadata, is_user_action, RequestMetadata};
use crate::config::CashIdConfig;
use crate::records::{record_to_bytes, request_key, PendingRequestRecord};

/// Default lifetime of a pending challenge: 15 minutes.
pub const DEFAULT_REQUEST_TTL_SECS: u64 = 60 * 15;

/// Uniformly random 9-digit nonces.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomNonceSource;

impl NonceSource for RandomNonceSource {
    fn next_nonce(&self) -> u64 {
        rand::thread_rng().gen_range(100_000_000..=999_999_999)
    }
}

pub struct RequestGenerator {
    domain: String,
    path: String,
    cache: Arc<dyn RequestCache>,
    clock: Arc<dyn Clock>,
    nonces: Arc<dyn NonceSource>,
    request_ttl_secs: u64,
}

impl RequestGenerator {
    /// Generator with the default in-memory cache and system clock.
    pub fn new(domain: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_cache(domain, path, Arc::new(crate::cache::MemoryCache::new()))
    }

    /// Generator over an explicit cache. The cache must be shared with the
    /// `ResponseHandler` that will validate the issued challenges.
    pub fn with_cache(
        domain: impl Into<String>,
        path: impl Into<String>,
        cache: Arc<dyn RequestCache>,
    ) -> Self {
        Self {
            domain: domain.into(),
            path: path.into(),
            cache,
            clock: Arc::new(SystemClock),
            nonces: Arc::new(RandomNonceSource),
            request_ttl_secs: DEFAULT_REQUEST_TTL_SECS,
        }
    }

    pub fn from_config(config: &CashIdConfig, cache: Arc<dyn RequestCache>) -> Self {
        let mut generator = Self::with_cache(config.domain.clone(), config.path.clone(), cache);
        generator.request_ttl_secs = config.request_ttl_secs;
        generator
    }

    /// Substitutes the clock, e.g. with a fixed test clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Substitutes the nonce source, e.g. with a scripted test sequence.
    pub fn with_nonce_source(mut self, nonces: Arc<dyn NonceSource>) -> Self {
        self.nonces = nonces;
        self
    }

    pub fn with_request_ttl(mut self, ttl_secs: u64) -> Self {
        self.request_ttl_secs = ttl_secs;
        self
    }

    /// Creates a challenge URI for `action` and persists its pending record.
    ///
    /// User-initiated actions (delete, logout, revoke, update) get a
    /// nonce-less URI and nothing is persisted: the client is expected to
    /// supply a recent wall-clock timestamp as its own freshness token.
    ///
    /// For all other actions a unique 9-digit nonce is allocated, retrying on
    /// collision against live records. The retry loop is unbounded; a
    /// saturated nonce keyspace is a documented open risk, not a handled
    /// failure mode.
    pub fn create_request(
        &self,
        action: &str,
        data: &str,
        metadata: &RequestMetadata,
    ) -> CashIdResult<String> {
        let nonce = if is_user_action(action) {
            None
        } else {
            Some(self.allocate_nonce()?)
        };

        let required = encode_request_metadata(&metadata.required);
        let optional = encode_request_metadata(&metadata.optional);
        let request_uri = build_request_uri(
            &self.domain,
            &self.path,
            action,
            data,
            &required,
            &optional,
            nonce,
        );

        if let Some(nonce) = nonce {
            let record = PendingRequestRecord::issued(
                request_uri.clone(),
                self.clock.now().add_secs(self.request_ttl_secs),
            );
            let stored = self.cache.set(
                &request_key(&nonce.to_string()),
                &record_to_bytes(&record)?,
                None,
            )?;
            if !stored {
                return Err(CashIdError::Cache(
                    "failed to store pending request record".into(),
                ));
            }
            tracing::debug!(nonce = %nonce, action = %action, "challenge issued");
        } else {
            tracing::debug!(action = %action, "user-initiated challenge issued without nonce");
        }

        Ok(request_uri)
    }

    fn allocate_nonce(&self) -> CashIdResult<u64> {
        let mut nonce = self.nonces.next_nonce();
        while self.cache.has(&request_key(&nonce.to_string()))? {
            tracing::debug!(nonce = %nonce, "nonce collision, regenerating");
            nonce = self.nonces.next_nonce();
        }
        Ok(nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MetadataSelection;
    use crate::cache::MemoryCache;
    use crate::records::record_from_bytes;
    use cashid_core::Timestamp;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedNonceSource {
        values: Mutex<VecDeque<u64>>,
    }

    impl ScriptedNonceSource {
        fn new(values: &[u64]) -> Self {
            Self {
                values: Mutex::new(values.iter().copied().collect()),
            }
        }
    }

    impl NonceSource for ScriptedNonceSource {
        fn next_nonce(&self) -> u64 {
            self.values
                .lock()
                .unwrap()
                .pop_front()
                .expect("nonce script exhausted")
        }
    }

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_seconds(self.0)
        }
    }

    struct RefusingCache;

    impl RequestCache for RefusingCache {
        fn get(&self, _key: &str) -> CashIdResult<Option<Vec<u8>>> {
            Ok(None)
        }
        fn set(&self, _key: &str, _value: &[u8], _ttl: Option<u64>) -> CashIdResult<bool> {
            Ok(false)
        }
        fn delete(&self, _key: &str) -> CashIdResult<bool> {
            Ok(false)
        }
        fn has(&self, _key: &str) -> CashIdResult<bool> {
            Ok(false)
        }
        fn compare_and_swap(
            &self,
            _key: &str,
            _expected: Option<&[u8]>,
            _new_value: &[u8],
        ) -> CashIdResult<bool> {
            Ok(false)
        }
    }

    fn demo_metadata() -> RequestMetadata {
        RequestMetadata {
            required: MetadataSelection {
                contact: vec!["social".into()],
                ..Default::default()
            },
            optional: MetadataSelection {
                position: vec!["streetname".into()],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_create_request_wire_format() {
        let generator = RequestGenerator::new("demo.cashid.info", "/api/parse.php")
            .with_nonce_source(Arc::new(ScriptedNonceSource::new(&[123456789])));
        let uri = generator
            .create_request("login", "15366-4133-6141-9638", &demo_metadata())
            .unwrap();
        assert_eq!(
            uri,
            "cashid:demo.cashid.info/api/parse.php?a=login&d=15366-4133-6141-9638&r=c3&o=p4&x=123456789"
        );
    }

    #[test]
    fn test_create_request_random_nonce_is_nine_digits() {
        let generator = RequestGenerator::new("demo.cashid.info", "/api/parse.php");
        let uri = generator
            .create_request("login", "", &RequestMetadata::default())
            .unwrap();
        let nonce = uri.rsplit("x=").next().unwrap();
        assert_eq!(nonce.len(), 9);
        assert!(nonce.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(nonce.chars().next(), Some('0'));
    }

    #[test]
    fn test_collision_retries_until_unused() {
        let cache = Arc::new(MemoryCache::new());
        let generator = RequestGenerator::with_cache("d.example", "/x.php", cache.clone())
            .with_nonce_source(Arc::new(ScriptedNonceSource::new(&[
                100000000, 100000000, 100000001,
            ])));

        let first = generator
            .create_request("", "", &RequestMetadata::default())
            .unwrap();
        let second = generator
            .create_request("", "", &RequestMetadata::default())
            .unwrap();

        assert!(first.ends_with("x=100000000"));
        assert!(second.ends_with("x=100000001"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_pending_record_contents() {
        let cache = Arc::new(MemoryCache::new());
        let generator = RequestGenerator::with_cache("d.example", "/x.php", cache.clone())
            .with_nonce_source(Arc::new(ScriptedNonceSource::new(&[555555555])))
            .with_clock(Arc::new(FixedClock(1_000_000)));

        let uri = generator
            .create_request("login", "", &RequestMetadata::default())
            .unwrap();

        let bytes = cache.get("cashid_request_555555555").unwrap().unwrap();
        let record = record_from_bytes(&bytes).unwrap();
        assert!(record.available);
        assert_eq!(record.request, uri);
        assert_eq!(record.expires, Timestamp::from_seconds(1_000_000 + 900));
    }

    #[test]
    fn test_user_initiated_skips_nonce_and_persistence() {
        let cache = Arc::new(MemoryCache::new());
        let generator = RequestGenerator::with_cache("d.example", "/x.php", cache.clone());

        for action in ["delete", "logout", "revoke", "update"] {
            let uri = generator
                .create_request(action, "", &RequestMetadata::default())
                .unwrap();
            assert!(!uri.contains("x="), "{} must not carry a nonce", uri);
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_failure_surfaces_error() {
        let generator =
            RequestGenerator::with_cache("d.example", "/x.php", Arc::new(RefusingCache));
        let result = generator.create_request("login", "", &RequestMetadata::default());
        assert!(matches!(result, Err(CashIdError::Cache(_))));
    }

    #[test]
    fn test_empty_action_and_data_omitted() {
        let generator = RequestGenerator::new("d.example", "/x.php")
            .with_nonce_source(Arc::new(ScriptedNonceSource::new(&[999999999])));
        let uri = generator
            .create_request("", "", &RequestMetadata::default())
            .unwrap();
        assert_eq!(uri, "cashid:d.example/x.php?x=999999999");
    }
}
