//! Built-in notary: Bitcoin Cash signed-message verification.
//!
//! A signature is the base64 of a 65-byte compact recoverable ECDSA
//! signature over the double-SHA256 of the varint-framed
//! `"Bitcoin Signed Message:\n"` magic and message. Verification recovers
//! the public key from the signature, hashes it (HASH160) and compares the
//! result against the cashaddr payload; no key registry is involved.
//!
//! Malformed addresses and signatures are a definitive "no" (`Ok(false)`),
//! never an error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ripemd::Ripemd160;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use cashid_core::{CashIdError, CashIdResult, Notary};

use crate::cashaddr;

const MESSAGE_MAGIC: &[u8] = b"Bitcoin Signed Message:\n";

fn sha256d(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

fn push_varint(n: u64, out: &mut Vec<u8>) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// The digest Bitcoin wallets sign for ASCII-armored messages.
fn signed_message_digest(message: &str) -> [u8; 32] {
    let mut buf = Vec::with_capacity(MESSAGE_MAGIC.len() + message.len() + 10);
    push_varint(MESSAGE_MAGIC.len() as u64, &mut buf);
    buf.extend_from_slice(MESSAGE_MAGIC);
    push_varint(message.len() as u64, &mut buf);
    buf.extend_from_slice(message.as_bytes());
    sha256d(&buf)
}

pub struct DefaultNotary {
    secp: Secp256k1<All>,
}

impl DefaultNotary {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// The cashaddr controlled by a hex-encoded secret key. Pairs with
    /// `sign_message` in client and test simulators.
    pub fn address_for_secret_key(&self, key_material: &str) -> CashIdResult<String> {
        let secret = self.secret_key(key_material)?;
        let pubkey = PublicKey::from_secret_key(&self.secp, &secret);
        Ok(cashaddr::encode(
            cashaddr::DEFAULT_PREFIX,
            &hash160(&pubkey.serialize()),
        ))
    }

    fn secret_key(&self, key_material: &str) -> CashIdResult<SecretKey> {
        let mut bytes = hex::decode(key_material)
            .map_err(|_| CashIdError::Notary("key material is not valid hex".into()))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|_| CashIdError::Notary("key material is not a valid secret key".into()));
        bytes.zeroize();
        secret
    }
}

impl Default for DefaultNotary {
    fn default() -> Self {
        Self::new()
    }
}

impl Notary for DefaultNotary {
    fn check_signature(
        &self,
        address: &str,
        signature: &str,
        message: &str,
    ) -> CashIdResult<bool> {
        let Some(address_hash) = cashaddr::decode(address) else {
            return Ok(false);
        };
        let Ok(signature_bytes) = BASE64.decode(signature) else {
            return Ok(false);
        };
        if signature_bytes.len() != 65 {
            return Ok(false);
        }

        // Header flag: 27..=30 uncompressed key, 31..=34 compressed.
        let flag = signature_bytes[0];
        if !(27..=34).contains(&flag) {
            return Ok(false);
        }
        let compressed = flag >= 31;
        let Ok(recovery_id) = RecoveryId::from_i32(i32::from((flag - 27) & 3)) else {
            return Ok(false);
        };
        let Ok(recoverable) = RecoverableSignature::from_compact(&signature_bytes[1..], recovery_id)
        else {
            return Ok(false);
        };

        let digest = Message::from_digest(signed_message_digest(message));
        let Ok(pubkey) = self.secp.recover_ecdsa(&digest, &recoverable) else {
            return Ok(false);
        };

        let recovered_hash = if compressed {
            hash160(&pubkey.serialize())
        } else {
            hash160(&pubkey.serialize_uncompressed())
        };
        Ok(bool::from(recovered_hash[..].ct_eq(&address_hash[..])))
    }

    fn sign_message(&self, key_material: &str, message: &str) -> CashIdResult<String> {
        let secret = self.secret_key(key_material)?;
        let digest = Message::from_digest(signed_message_digest(message));
        let (recovery_id, compact) = self
            .secp
            .sign_ecdsa_recoverable(&digest, &secret)
            .serialize_compact();

        let mut out = Vec::with_capacity(65);
        // Compressed-key flag range, matching address_for_secret_key.
        out.push(31 + recovery_id.to_i32() as u8);
        out.extend_from_slice(&compact);
        Ok(BASE64.encode(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "1111111111111111111111111111111111111111111111111111111111111111";
    const OTHER_KEY: &str = "2222222222222222222222222222222222222222222222222222222222222222";

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let notary = DefaultNotary::new();
        let address = notary.address_for_secret_key(KEY).unwrap();
        let message = "cashid:demo.cashid.info/api/parse.php?a=login&x=123456789";

        let signature = notary.sign_message(KEY, message).unwrap();
        assert!(notary.check_signature(&address, &signature, message).unwrap());
    }

    #[test]
    fn test_tampered_message_fails() {
        let notary = DefaultNotary::new();
        let address = notary.address_for_secret_key(KEY).unwrap();
        let signature = notary.sign_message(KEY, "original").unwrap();
        assert!(!notary.check_signature(&address, &signature, "altered").unwrap());
    }

    #[test]
    fn test_wrong_address_fails() {
        let notary = DefaultNotary::new();
        let other_address = notary.address_for_secret_key(OTHER_KEY).unwrap();
        let signature = notary.sign_message(KEY, "message").unwrap();
        assert!(!notary
            .check_signature(&other_address, &signature, "message")
            .unwrap());
    }

    #[test]
    fn test_malformed_address_is_definitive_no() {
        let notary = DefaultNotary::new();
        let signature = notary.sign_message(KEY, "message").unwrap();
        assert!(!notary
            .check_signature("not-an-address", &signature, "message")
            .unwrap());
    }

    #[test]
    fn test_malformed_signature_is_definitive_no() {
        let notary = DefaultNotary::new();
        let address = notary.address_for_secret_key(KEY).unwrap();
        assert!(!notary
            .check_signature(&address, "@@not base64@@", "message")
            .unwrap());
        // Valid base64, wrong length.
        assert!(!notary
            .check_signature(&address, &BASE64.encode(b"short"), "message")
            .unwrap());
        // Valid length, out-of-range header flag.
        let mut bytes = vec![0u8; 65];
        bytes[0] = 99;
        assert!(!notary
            .check_signature(&address, &BASE64.encode(&bytes), "message")
            .unwrap());
    }

    #[test]
    fn test_invalid_key_material_errors() {
        let notary = DefaultNotary::new();
        assert!(notary.sign_message("zz-not-hex", "m").is_err());
        // All-zero is not a valid secp256k1 secret key.
        let zeros = "0".repeat(64);
        assert!(notary.sign_message(&zeros, "m").is_err());
    }

    #[test]
    fn test_address_derivation_is_deterministic() {
        let notary = DefaultNotary::new();
        let a1 = notary.address_for_secret_key(KEY).unwrap();
        let a2 = notary.address_for_secret_key(KEY).unwrap();
        assert_eq!(a1, a2);
        assert!(a1.starts_with("bitcoincash:q"));
        assert_ne!(a1, notary.address_for_secret_key(OTHER_KEY).unwrap());
    }

    #[test]
    fn test_signature_is_65_byte_compact() {
        let notary = DefaultNotary::new();
        let signature = notary.sign_message(KEY, "message").unwrap();
        let bytes = BASE64.decode(signature).unwrap();
        assert_eq!(bytes.len(), 65);
        assert!((31..=34).contains(&bytes[0]));
    }

    #[test]
    fn test_long_message_digest_framing() {
        // Messages over 252 bytes exercise the multi-byte varint path.
        let notary = DefaultNotary::new();
        let address = notary.address_for_secret_key(KEY).unwrap();
        let message = "x".repeat(300);
        let signature = notary.sign_message(KEY, &message).unwrap();
        assert!(notary.check_signature(&address, &signature, &message).unwrap());
    }
}
