//! Challenge-response credential scheme used by factories.
//!
//! A factory proves knowledge of its secret without sending it:
//!
//! ```text
//! password_hash = H(salt + secret)          stored server-side
//! crypt         = H(password_hash + nonce)  sent by the factory
//! ```
//!
//! The nonce is issued by the server and spent on first successful use. The
//! two-level layout is fixed by the wire protocol, but `H` is not: it is a
//! [`CredentialHasher`] chosen at configuration time. Every hasher must
//! produce exactly [`CRYPT_LENGTH`] lowercase hex characters.
//!
//! The plaintext secret is never stored. Note that `password_hash` is itself
//! credential-equivalent under this scheme, so the column holding it must be
//! treated like a secret.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use rand::Rng;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of the per-factory salt.
pub const SALT_LENGTH: usize = 4;

/// Length of a server-issued nonce (hex characters).
pub const NONCE_LENGTH: usize = 32;

/// Length of a factory-supplied credential (hex characters).
pub const CRYPT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Hash primitives
// ---------------------------------------------------------------------------

/// A digest primitive producing [`CRYPT_LENGTH`] lowercase hex characters.
pub trait CredentialHasher: Send + Sync + fmt::Debug {
    /// Short name used in configuration and logs.
    fn name(&self) -> &'static str;

    /// Digest `data` and return it as lowercase hex.
    fn digest_hex(&self, data: &[u8]) -> String;
}

/// MD5, as spoken by existing factory clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Hasher;

impl CredentialHasher for Md5Hasher {
    fn name(&self) -> &'static str {
        "md5"
    }

    fn digest_hex(&self, data: &[u8]) -> String {
        let hash = Md5::digest(data);
        format!("{hash:x}")
    }
}

/// SHA-256 truncated to 128 bits so the credential keeps its 32-character shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl CredentialHasher for Sha256Hasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn digest_hex(&self, data: &[u8]) -> String {
        let hash = Sha256::digest(data);
        hex::encode(&hash[..CRYPT_LENGTH / 2])
    }
}

/// Configured choice of [`CredentialHasher`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl HashAlgorithm {
    /// The hasher implementing this algorithm.
    pub fn hasher(self) -> &'static dyn CredentialHasher {
        match self {
            HashAlgorithm::Md5 => &Md5Hasher,
            HashAlgorithm::Sha256 => &Sha256Hasher,
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(format!("Unknown credential hash algorithm: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheme
// ---------------------------------------------------------------------------

/// Compute the stored password hash `H(salt + secret)`.
///
/// Only account provisioning calls this; the dispatcher never sees `secret`.
pub fn password_hash(hasher: &dyn CredentialHasher, salt: &str, secret: &str) -> String {
    hasher.digest_hex(format!("{salt}{secret}").as_bytes())
}

/// Compute the credential a legitimate factory would send for `nonce`.
pub fn expected_crypt(hasher: &dyn CredentialHasher, password_hash: &str, nonce: &str) -> String {
    hasher.digest_hex(format!("{password_hash}{nonce}").as_bytes())
}

/// Check a factory-supplied credential against a stored hash and nonce.
///
/// Hex case is ignored. The comparison does not short-circuit on the first
/// differing byte.
pub fn verify_crypt(
    hasher: &dyn CredentialHasher,
    password_hash: &str,
    nonce: &str,
    crypt: &str,
) -> bool {
    let expected = expected_crypt(hasher, password_hash, nonce);
    constant_time_eq(expected.as_bytes(), crypt.to_ascii_lowercase().as_bytes())
}

/// The challenge string handed to a factory: salt followed by nonce.
pub fn challenge(salt: &str, nonce: &str) -> String {
    format!("{salt}{nonce}")
}

/// Generate a fresh random nonce of [`NONCE_LENGTH`] hex characters.
pub fn generate_nonce() -> String {
    let bytes: [u8; NONCE_LENGTH / 2] = rand::rng().random();
    hex::encode(bytes)
}

/// Generate a random alphanumeric salt of [`SALT_LENGTH`] characters.
pub fn generate_salt() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
