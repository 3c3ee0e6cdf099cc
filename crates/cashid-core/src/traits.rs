use crate::error::CashIdResult;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Notary — address-bound signature capability
// ---------------------------------------------------------------------------

pub trait Notary: Send + Sync {
    /// Returns true iff `signature` is a valid signature over `message`
    /// verifiable against the public `address`.
    ///
    /// A definitive "no" (malformed address, malformed signature, mismatching
    /// key) is `Ok(false)`; `Err` is reserved for environmental failures.
    fn check_signature(&self, address: &str, signature: &str, message: &str)
        -> CashIdResult<bool>;

    /// Produces a signature over `message` with the given key material.
    ///
    /// Used by test and client simulators, not by the validating service.
    fn sign_message(&self, key_material: &str, message: &str) -> CashIdResult<String>;
}

// ---------------------------------------------------------------------------
// RequestCache — the shared key-value store for pending requests
//
// The cache is the engine's single shared mutable resource. It must provide
// read-your-writes consistency per key; `compare_and_swap` is the atomic
// primitive the validator uses to consume a nonce exactly once under
// concurrent validation attempts.
// ---------------------------------------------------------------------------

pub trait RequestCache: Send + Sync {
    fn get(&self, key: &str) -> CashIdResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, optionally expiring after `ttl_secs`.
    /// Returns false when the backend declined the write.
    fn set(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> CashIdResult<bool>;

    fn delete(&self, key: &str) -> CashIdResult<bool>;

    fn has(&self, key: &str) -> CashIdResult<bool>;

    /// Atomically replaces the value under `key` with `new_value` iff the
    /// current value equals `expected` (`None` = key absent). Returns true
    /// when the swap happened.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> CashIdResult<bool>;
}

// ---------------------------------------------------------------------------
// Clock / NonceSource — injectable time and randomness
//
// Explicit collaborators instead of ambient globals, so generation and
// validation are deterministic under test.
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

pub trait NonceSource: Send + Sync {
    /// Yields a candidate nonce in the 9-digit range
    /// `100_000_000..=999_999_999`.
    fn next_nonce(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the capability traits are object-safe
    fn _assert_notary_object_safe(_: &dyn Notary) {}
    fn _assert_cache_object_safe(_: &dyn RequestCache) {}
    fn _assert_clock_object_safe(_: &dyn Clock) {}
    fn _assert_nonce_source_object_safe(_: &dyn NonceSource) {}

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let t = clock.now();
        assert!(t.as_secs() > 1_500_000_000);
    }
}
