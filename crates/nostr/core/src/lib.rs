//! Nostr protocol primitives for topic-scoped messaging.
//!
//! This crate provides:
//! - NIP-01: Event structure, serialization, Schnorr signing and verification
//! - NIP-19: bech32 `note` and `npub` references
//! - Keypair derivation from WIF-encoded wallet secrets

mod keys;
mod nip01;
mod nip19;

// NIP-01: Basic protocol
pub use nip01::{
    Event, EventTemplate, Nip01Error, UnsignedEvent, finalize_event, generate_secret_key,
    get_event_hash, get_public_key, get_public_key_hex, serialize_event, unix_now,
    validate_event, validate_unsigned_event, verify_event,
};

// NIP-19: bech32-encoded entities
pub use nip19::{
    NOTE_HRP, NPUB_HRP, Nip19Error, decode_note, decode_npub, encode_note, encode_npub,
};

// Key derivation
pub use keys::{KeyError, Keypair, Signer, WifSigner, keypair_from_wif};
