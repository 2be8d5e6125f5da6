use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;
use std::str::FromStr;

/// Shared secp256k1 context; creating one is expensive.
static SECP256K1: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid message hash: {0}")]
    InvalidMessage(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Represents a wallet address (uncompressed secp256k1 public key, hex encoded)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Address(hex::encode(public_key.serialize_uncompressed()))
    }

    /// Converts the address to a public key. Both compressed and
    /// uncompressed encodings are accepted.
    pub fn to_public_key(&self) -> Result<PublicKey, CryptoError> {
        let bytes = hex::decode(&self.0).map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        PublicKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address(s.to_string());
        address.to_public_key()?;
        Ok(address)
    }
}

/// Represents a DER-encoded ECDSA signature, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(hex::encode(signature.serialize_der().to_vec()))
    }

    /// Converts the digital signature to a signature. High-S signatures
    /// produced by other signers are normalized so they verify.
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = hex::decode(&self.0).map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let mut signature =
            Signature::from_der(&bytes).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        signature.normalize_s();
        Ok(signature)
    }
}

impl fmt::Display for DigitalSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a wallet with a keypair
#[derive(Debug, Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    public_key: PublicKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_key(secret_key)
    }

    /// Creates a wallet from an existing secret key
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret_key = SecretKey::from_slice(secret_key_bytes)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self::from_key(secret_key))
    }

    /// Creates a wallet from a hex-encoded secret key
    pub fn from_secret_hex(secret_key_hex: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(secret_key_hex).map_err(|e| CryptoError::DecodingError(e.to_string()))?;
        Self::from_secret_key(&bytes)
    }

    fn from_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1, &secret_key);
        let address = Address::from_public_key(&public_key);

        Wallet {
            secret_key,
            public_key,
            address,
        }
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the wallet's public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Signs a hex-encoded 32-byte message hash
    pub fn sign(&self, message_hash: &str) -> Result<DigitalSignature, CryptoError> {
        let message = message_from_hex(message_hash)?;
        let signature = SECP256K1.sign_ecdsa(&message, &self.secret_key);
        Ok(DigitalSignature::from_signature(&signature))
    }

    /// Exports the wallet's secret key as bytes
    pub fn export_secret_key(&self) -> Vec<u8> {
        self.secret_key.secret_bytes().to_vec()
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

fn message_from_hex(message_hash: &str) -> Result<Message, CryptoError> {
    let digest =
        hex::decode(message_hash).map_err(|e| CryptoError::DecodingError(e.to_string()))?;

    Message::from_digest_slice(&digest).map_err(|e| CryptoError::InvalidMessage(e.to_string()))
}

/// Generates a fresh key pair, returned as `(public_key_hex, private_key_hex)`
pub fn generate_key_pair() -> (String, String) {
    let wallet = Wallet::new();
    (wallet.address.0.clone(), hex::encode(wallet.export_secret_key()))
}

/// Signs a hex-encoded message hash with a hex-encoded private key
pub fn sign_hash(private_key_hex: &str, message_hash: &str) -> Result<DigitalSignature, CryptoError> {
    Wallet::from_secret_hex(private_key_hex)?.sign(message_hash)
}

/// Verifies a signature against a message hash and the public key held in an address.
/// A well-formed signature that does not match yields `Ok(false)`.
pub fn verify_signature(
    message_hash: &str,
    signature: &DigitalSignature,
    address: &Address,
) -> Result<bool, CryptoError> {
    let public_key = address.to_public_key()?;
    let signature = signature.to_signature()?;
    let message = message_from_hex(message_hash)?;

    Ok(SECP256K1.verify_ecdsa(&message, &signature, &public_key).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn digest_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::new();
        // 0x04 prefix + 64 bytes of coordinates
        assert_eq!(wallet.address().0.len(), 130);
        assert!(wallet.address().0.starts_with("04"));
    }

    #[test]
    fn test_signing_and_verification() {
        let wallet = Wallet::new();
        let hash = digest_hex(b"Hello, world!");

        let signature = wallet.sign(&hash).unwrap();
        assert!(verify_signature(&hash, &signature, wallet.address()).unwrap());

        let wrong_hash = digest_hex(b"Wrong message");
        assert!(!verify_signature(&wrong_hash, &signature, wallet.address()).unwrap());
    }

    #[test]
    fn test_verification_with_other_key_fails() {
        let signer = Wallet::new();
        let other = Wallet::new();
        let hash = digest_hex(b"transfer");

        let signature = signer.sign(&hash).unwrap();
        assert!(!verify_signature(&hash, &signature, other.address()).unwrap());
    }

    #[test]
    fn test_key_pair_helpers_round_trip() {
        let (public_hex, private_hex) = generate_key_pair();
        let hash = digest_hex(b"payload");

        let signature = sign_hash(&private_hex, &hash).unwrap();
        assert!(verify_signature(&hash, &signature, &Address(public_hex.clone())).unwrap());

        let restored = Wallet::from_secret_hex(&private_hex).unwrap();
        assert_eq!(restored.address().0, public_hex);
    }

    #[test]
    fn test_compressed_address_is_accepted() {
        let wallet = Wallet::new();
        let compressed = Address(hex::encode(wallet.public_key().serialize()));
        let hash = digest_hex(b"compressed");

        let signature = wallet.sign(&hash).unwrap();
        assert!(verify_signature(&hash, &signature, &compressed).unwrap());
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        let wallet = Wallet::new();
        let hash = digest_hex(b"x");
        let signature = wallet.sign(&hash).unwrap();

        assert!(verify_signature(&hash, &DigitalSignature("zz".into()), wallet.address()).is_err());
        assert!(verify_signature(&hash, &signature, &Address("abcd".into())).is_err());
        assert!(verify_signature("abcd", &signature, wallet.address()).is_err());
        assert!("not-hex".parse::<Address>().is_err());
    }
}
