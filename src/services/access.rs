//! Access gate — classifies a connection as privileged or ordinary.
//!
//! ARCHITECTURE
//! ============
//! One entry point, `classify`, with two internal branches evaluated in
//! order: a signed session credential (cookie value) and a legacy query
//! token. First match wins; anything malformed falls through to Ordinary.
//! Issuance and verification share the same PIN-derived HMAC key, so there
//! is no separate secret to rotate.
//!
//! TRADE-OFFS
//! ==========
//! The credential is `"{expiry_ms}.{hex hmac}"` rather than a token store:
//! stateless verification survives restarts with the same PIN, at the cost
//! of no server-side revocation before expiry (logout clears the cookie).

use std::fmt::Write;

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Credential lifetime: 8 hours from issuance.
pub const CREDENTIAL_TTL_MS: i64 = 8 * 60 * 60 * 1000;

const PIN_LEN: usize = 6;
const PIN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

// =============================================================================
// CONFIG
// =============================================================================

/// Server-held access secrets. Built once at startup from the PIN.
pub struct AccessConfig {
    /// HMAC key: SHA-256 of the PIN. The PIN itself is kept for login checks.
    signing_key: [u8; 32],
    pin: String,
    /// Legacy shared token granting the same privilege via `?token=`.
    /// `None` disables that path.
    legacy_token: Option<String>,
}

impl AccessConfig {
    #[must_use]
    pub fn new(pin: &str, legacy_token: Option<String>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(pin.as_bytes());
        Self { signing_key: hasher.finalize().into(), pin: pin.to_owned(), legacy_token }
    }

    /// Constant-time check of a submitted login PIN.
    #[must_use]
    pub fn verify_pin(&self, submitted: &str) -> bool {
        submitted.as_bytes().ct_eq(self.pin.as_bytes()).into()
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Outcome of classifying a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Privileged,
    Ordinary,
}

impl Access {
    #[must_use]
    pub fn is_privileged(self) -> bool {
        matches!(self, Access::Privileged)
    }
}

/// Classify a connection from its credential cookie and legacy query token.
///
/// Pure decision, evaluated once before a connection may register as a
/// privileged subscriber. Malformed inputs are treated as absent — the gate
/// fails open to `Ordinary`, never to `Privileged`.
#[must_use]
pub fn classify(config: &AccessConfig, credential: Option<&str>, legacy_token: Option<&str>, now_ms: i64) -> Access {
    if let Some(raw) = credential {
        if verify_credential(config, raw, now_ms) {
            return Access::Privileged;
        }
    }

    if let (Some(expected), Some(provided)) = (config.legacy_token.as_deref(), legacy_token) {
        if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            return Access::Privileged;
        }
    }

    Access::Ordinary
}

// =============================================================================
// CREDENTIAL
// =============================================================================

/// Issue a signed credential valid for [`CREDENTIAL_TTL_MS`] from `now_ms`.
#[must_use]
pub fn issue_credential(config: &AccessConfig, now_ms: i64) -> String {
    let expiry = now_ms + CREDENTIAL_TTL_MS;
    format!("{expiry}.{}", sign_expiry(config, expiry))
}

/// Verify a credential: expiry in the future and signature matching,
/// compared in constant time. Any parse failure is just `false`.
#[must_use]
pub fn verify_credential(config: &AccessConfig, raw: &str, now_ms: i64) -> bool {
    let Some((expiry_str, sig_hex)) = raw.split_once('.') else {
        return false;
    };
    let Ok(expiry) = expiry_str.parse::<i64>() else {
        return false;
    };
    if expiry <= now_ms {
        return false;
    }

    let expected = sign_expiry(config, expiry);
    sig_hex.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn sign_expiry(config: &AccessConfig, expiry_ms: i64) -> String {
    // new_from_slice only fails on invalid key lengths; 32 bytes is valid.
    let Ok(mut mac) = HmacSha256::new_from_slice(&config.signing_key) else {
        return String::new();
    };
    mac.update(expiry_ms.to_string().as_bytes());
    bytes_to_hex(&mac.finalize().into_bytes())
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

// =============================================================================
// PIN GENERATION
// =============================================================================

/// Generate a six-character PIN from an unambiguous alphabet.
#[must_use]
pub fn generate_pin() -> String {
    let mut rng = rand::rng();
    (0..PIN_LEN)
        .map(|_| {
            let idx = rng.random_range(0..PIN_ALPHABET.len());
            PIN_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
#[path = "access_test.rs"]
mod tests;
