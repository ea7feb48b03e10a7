// Key management and spend authorization signatures

use crate::error::NodeError;
use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

/// A secp256k1 key pair with its derived address.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    /// Hex of the 33-byte compressed public key.
    pub address: String,
}

impl KeyPair {
    /// Generate a fresh key pair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = secret_key.public_key(&secp);
        let address = address_from_pubkey(&public_key);
        Self {
            secret_key,
            public_key,
            address,
        }
    }

    /// Rebuild a key pair from a hex-encoded 32-byte secret key.
    pub fn from_secret_hex(hex_key: &str) -> Result<Self, NodeError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| NodeError::InvalidKey(format!("bad hex: {e}")))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| NodeError::InvalidKey(e.to_string()))?;
        let secp = Secp256k1::new();
        let public_key = secret_key.public_key(&secp);
        let address = address_from_pubkey(&public_key);
        Ok(Self {
            secret_key,
            public_key,
            address,
        })
    }

    /// Hex encoding of the secret key.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Sign a transaction id for use in a [`crate::core::TxIn`]. Produces the
    /// hex of the 64-byte compact signature followed by the recovery id byte.
    pub fn sign_input(&self, tx_id: &str) -> String {
        let secp = Secp256k1::new();
        let sig = secp.sign_ecdsa_recoverable(&digest_tx_id(tx_id), &self.secret_key);
        let (recovery_id, compact) = sig.serialize_compact();
        let mut bytes = compact.to_vec();
        bytes.push(recovery_id.to_i32() as u8);
        hex::encode(bytes)
    }
}

/// Address derivation: hex of the compressed public key.
pub fn address_from_pubkey(public_key: &PublicKey) -> String {
    hex::encode(public_key.serialize())
}

/// Recover the signer's address from a spend signature over `tx_id`.
/// Returns `None` for anything malformed; the caller treats that as an
/// authorization failure.
pub fn recover_address(tx_id: &str, signature_hex: &str) -> Option<String> {
    let bytes = hex::decode(signature_hex).ok()?;
    if bytes.len() != 65 {
        return None;
    }
    let recovery_id = RecoveryId::from_i32(bytes[64] as i32).ok()?;
    let sig = RecoverableSignature::from_compact(&bytes[..64], recovery_id).ok()?;
    let secp = Secp256k1::new();
    let public_key = secp.recover_ecdsa(&digest_tx_id(tx_id), &sig).ok()?;
    Some(address_from_pubkey(&public_key))
}

/// The message actually signed: SHA-256 of the transaction id's UTF-8 bytes.
fn digest_tx_id(tx_id: &str) -> Message {
    let digest: [u8; 32] = Sha256::digest(tx_id.as_bytes()).into();
    Message::from_digest(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_recover_roundtrip() {
        let kp = KeyPair::generate();
        let sig = kp.sign_input("some-tx-id");
        assert_eq!(sig.len(), 130); // 65 bytes hex
        assert_eq!(recover_address("some-tx-id", &sig), Some(kp.address));
    }

    #[test]
    fn recovery_of_wrong_message_gives_wrong_address() {
        let kp = KeyPair::generate();
        let sig = kp.sign_input("tx-a");
        // Recovery over a different message either fails or yields a
        // different key; both reject the spend.
        assert_ne!(recover_address("tx-b", &sig), Some(kp.address));
    }

    #[test]
    fn malformed_signatures_recover_nothing() {
        assert_eq!(recover_address("tx", "not-hex"), None);
        assert_eq!(recover_address("tx", "abcd"), None);
        assert_eq!(recover_address("tx", &"00".repeat(65)), None);
    }

    #[test]
    fn secret_hex_roundtrip() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_secret_hex(&kp.secret_hex()).unwrap();
        assert_eq!(kp.address, restored.address);
    }

    #[test]
    fn bad_secret_hex_is_rejected() {
        assert!(KeyPair::from_secret_hex("zz").is_err());
        assert!(KeyPair::from_secret_hex("abcd").is_err());
        // Zero is not a valid secp256k1 scalar.
        assert!(KeyPair::from_secret_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn address_is_compressed_pubkey_hex() {
        let kp = KeyPair::generate();
        assert_eq!(kp.address.len(), 66); // 33 bytes hex
    }
}
