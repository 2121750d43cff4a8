// crates/hypha-core/src/crypto.rs
//
// Signing helpers for authenticated oracle pushes.
//
// The metrics oracle signs the SHA-256 digest of a domain-separated payload
// with an ed25519 key. The engine only ever holds the oracle's public key.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::HyphaError;

/// Domain separator prepended to every signed oracle payload.
pub const ORACLE_DOMAIN: &[u8] = b"hypha/oracle-metrics/v1";

/// An ed25519 keypair held by the metrics oracle.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a keypair from its 32-byte secret.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Rebuild a keypair from a hex-encoded 32-byte secret.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, HyphaError> {
        let bytes = decode_32(secret_hex, "oracle secret key")?;
        Ok(Self::from_secret_bytes(&bytes))
    }

    /// Hex-encoded secret key.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Public key bytes (32 bytes).
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Hex-encoded public key, as it appears in daemon configuration.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Sign an oracle payload and return the hex-encoded 64-byte signature.
    pub fn sign_payload(&self, payload: &[u8]) -> String {
        let digest = payload_digest(payload);
        hex::encode(self.signing_key.sign(&digest).to_bytes())
    }
}

/// Compute the domain-separated SHA-256 digest that the oracle signs.
pub fn payload_digest(payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(ORACLE_DOMAIN);
    hasher.update(payload);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Parse a hex-encoded ed25519 public key.
pub fn parse_public_key_hex(public_hex: &str) -> Result<[u8; 32], HyphaError> {
    let bytes = decode_32(public_hex, "oracle public key")?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| HyphaError::Crypto(format!("Invalid oracle public key: {}", e)))?;
    Ok(bytes)
}

/// Verify a hex-encoded signature over an oracle payload.
///
/// # Errors
/// Returns `HyphaError::Crypto` for malformed keys or signatures, and
/// `HyphaError::Unauthorized` when the signature does not match.
pub fn verify_payload(
    public_key: &[u8; 32],
    payload: &[u8],
    signature_hex: &str,
) -> Result<(), HyphaError> {
    let verifying_key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| HyphaError::Crypto(format!("Invalid public key: {}", e)))?;

    let raw = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|e| HyphaError::Crypto(format!("Signature is not valid hex: {}", e)))?;
    let signature_array: [u8; 64] = raw
        .as_slice()
        .try_into()
        .map_err(|_| HyphaError::Crypto("Signature must be exactly 64 bytes".to_string()))?;
    let signature = Signature::from_bytes(&signature_array);

    verifying_key
        .verify(&payload_digest(payload), &signature)
        .map_err(|_| HyphaError::Unauthorized("Oracle signature does not verify".to_string()))
}

fn decode_32(value: &str, what: &str) -> Result<[u8; 32], HyphaError> {
    let raw = hex::decode(value.trim().trim_start_matches("0x"))
        .map_err(|e| HyphaError::Crypto(format!("{} is not valid hex: {}", what, e)))?;
    raw.as_slice()
        .try_into()
        .map_err(|_| HyphaError::Crypto(format!("{} must be exactly 32 bytes", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_payload() {
        let keypair = Keypair::generate();
        let payload = b"{\"node\":0,\"quality_score\":9000}";

        let signature = keypair.sign_payload(payload);
        assert!(verify_payload(&keypair.public_key_bytes(), payload, &signature).is_ok());
    }

    #[test]
    fn test_tampered_payload_is_unauthorized() {
        let keypair = Keypair::generate();
        let signature = keypair.sign_payload(b"score=9000");

        let err = verify_payload(&keypair.public_key_bytes(), b"score=9999", &signature)
            .unwrap_err();
        assert!(matches!(err, HyphaError::Unauthorized(_)));
    }

    #[test]
    fn test_wrong_key_is_unauthorized() {
        let oracle = Keypair::generate();
        let impostor = Keypair::generate();
        let signature = impostor.sign_payload(b"payload");

        let err = verify_payload(&oracle.public_key_bytes(), b"payload", &signature).unwrap_err();
        assert!(matches!(err, HyphaError::Unauthorized(_)));
    }

    #[test]
    fn test_short_signature_is_crypto_error() {
        let keypair = Keypair::generate();
        let err = verify_payload(&keypair.public_key_bytes(), b"payload", "abcd").unwrap_err();
        assert!(matches!(err, HyphaError::Crypto(_)));
    }

    #[test]
    fn test_secret_hex_round_trip() {
        let keypair = Keypair::generate();
        let restored = Keypair::from_secret_hex(&keypair.secret_hex()).unwrap();
        assert_eq!(restored.public_key_hex(), keypair.public_key_hex());
        assert_eq!(
            parse_public_key_hex(&keypair.public_key_hex()).unwrap(),
            keypair.public_key_bytes()
        );
    }

    #[test]
    fn test_digest_is_domain_separated() {
        let mut hasher = Sha256::new();
        hasher.update(b"payload");
        let plain: [u8; 32] = hasher.finalize().into();
        assert_ne!(payload_digest(b"payload"), plain);
    }
}
