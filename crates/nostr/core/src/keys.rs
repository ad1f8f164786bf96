//! Keypair derivation from wallet secrets.
//!
//! A Nostr identity is derived from a wallet's WIF-encoded private key: the
//! secp256k1 secret is used unchanged as the Nostr secret key and the public
//! key is its x-only serialization.

use crate::nip19::{self, Nip19Error};
use bitcoin::PrivateKey;
use bitcoin::key::Secp256k1;
use bitcoin::secp256k1::SecretKey;
use thiserror::Error;

/// Errors that can occur while deriving keys.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("secret must be a non-empty string")]
    EmptySecret,

    #[error("invalid WIF: {0}")]
    InvalidWif(String),

    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
}

/// A Nostr keypair containing both private and public keys.
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    /// The 32-byte private key
    pub private_key: [u8; 32],
    /// The 32-byte x-only public key
    pub public_key: [u8; 32],
}

impl Keypair {
    /// Build a keypair from a raw 32-byte secret key.
    pub fn from_secret_key(private_key: [u8; 32]) -> Result<Self, KeyError> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&private_key)
            .map_err(|e| KeyError::InvalidSecretKey(e.to_string()))?;
        let (xonly, _parity) = sk.x_only_public_key(&secp);
        Ok(Self {
            private_key,
            public_key: xonly.serialize(),
        })
    }

    /// Get the public key as a hex string.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key)
    }

    /// Get the npub (bech32-encoded public key).
    pub fn npub(&self) -> Result<String, Nip19Error> {
        nip19::encode_npub(&self.public_key)
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key_hex())
            .field("private_key", &"[redacted]")
            .finish()
    }
}

/// Capability that turns a wallet secret into a signing keypair.
pub trait Signer: Send + Sync {
    fn derive_keypair(&self, secret: &str) -> Result<Keypair, KeyError>;
}

/// Derives keypairs from WIF-encoded private keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct WifSigner;

impl Signer for WifSigner {
    fn derive_keypair(&self, secret: &str) -> Result<Keypair, KeyError> {
        keypair_from_wif(secret)
    }
}

/// Decode a WIF private key into a Nostr keypair.
///
/// Mainnet (`5`, `K`, `L`) and testnet (`9`, `c`) prefixes are accepted; the
/// compression flag does not change the derived x-only public key.
pub fn keypair_from_wif(wif: &str) -> Result<Keypair, KeyError> {
    let wif = wif.trim();
    if wif.is_empty() {
        return Err(KeyError::EmptySecret);
    }

    let private_key = PrivateKey::from_wif(wif).map_err(|e| KeyError::InvalidWif(e.to_string()))?;
    Keypair::from_secret_key(private_key.inner.secret_bytes())
}
