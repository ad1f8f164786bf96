//! NIP-19: bech32-encoded entities.
//!
//! Only the bare 32-byte entities are supported: `note` (event ids) and
//! `npub` (public keys). TLV entities (`nevent`, `nprofile`, ...) are out of
//! scope for this crate.

use bech32::{Bech32, Hrp};
use thiserror::Error;

/// Human-readable part for event ids
pub const NOTE_HRP: &str = "note";

/// Human-readable part for public keys
pub const NPUB_HRP: &str = "npub";

/// Errors that can occur during NIP-19 operations.
#[derive(Debug, Error)]
pub enum Nip19Error {
    #[error("invalid hex identifier: {0}")]
    InvalidHex(String),

    #[error("bech32 encoding error: {0}")]
    Bech32Encode(String),

    #[error("bech32 decoding error: {0}")]
    Bech32Decode(String),

    #[error("invalid hrp: expected {expected}, got {got}")]
    InvalidHrp { expected: String, got: String },

    #[error("invalid payload length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Encode a hex event id as a `note1...` reference.
///
/// ```
/// let note = nostr::encode_note(
///     "2e4b14f5d54a4190c0101b87382db1ce5ef9ec5db39dc2265bac5bd9d91cded2",
/// )
/// .unwrap();
/// assert!(note.starts_with("note1"));
/// ```
pub fn encode_note(event_id: &str) -> Result<String, Nip19Error> {
    let bytes = parse_hex_32(event_id)?;
    encode_bech32(NOTE_HRP, &bytes)
}

/// Decode a `note1...` reference back into a lowercase hex event id.
pub fn decode_note(note: &str) -> Result<String, Nip19Error> {
    decode_bech32(NOTE_HRP, note).map(hex::encode)
}

/// Encode a 32-byte public key as an `npub1...` string.
pub fn encode_npub(public_key: &[u8; 32]) -> Result<String, Nip19Error> {
    encode_bech32(NPUB_HRP, public_key)
}

/// Decode an `npub1...` string into a 32-byte public key.
pub fn decode_npub(npub: &str) -> Result<[u8; 32], Nip19Error> {
    decode_bech32(NPUB_HRP, npub)
}

fn parse_hex_32(value: &str) -> Result<[u8; 32], Nip19Error> {
    if value.len() != 64 {
        return Err(Nip19Error::InvalidHex(format!(
            "expected 64 hex characters, got {}",
            value.len()
        )));
    }
    let bytes = hex::decode(value).map_err(|e| Nip19Error::InvalidHex(e.to_string()))?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn encode_bech32(hrp: &str, data: &[u8; 32]) -> Result<String, Nip19Error> {
    let hrp = Hrp::parse(hrp).map_err(|e| Nip19Error::Bech32Encode(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| Nip19Error::Bech32Encode(e.to_string()))
}

fn decode_bech32(expected_hrp: &str, encoded: &str) -> Result<[u8; 32], Nip19Error> {
    let expected =
        Hrp::parse(expected_hrp).map_err(|e| Nip19Error::Bech32Decode(e.to_string()))?;

    let (hrp, data) =
        bech32::decode(encoded).map_err(|e| Nip19Error::Bech32Decode(e.to_string()))?;

    if hrp != expected {
        return Err(Nip19Error::InvalidHrp {
            expected: expected_hrp.to_string(),
            got: hrp.to_string(),
        });
    }

    if data.len() != 32 {
        return Err(Nip19Error::InvalidLength(data.len()));
    }

    let mut result = [0u8; 32];
    result.copy_from_slice(&data);
    Ok(result)
}
