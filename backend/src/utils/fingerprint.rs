//! Irreversible digests of tokens and client-binding values.
//!
//! A fingerprint is two-stage: SHA-512 collapses the input (signed tokens can
//! be long) into a 64-byte block, then Argon2id with a fresh random salt turns
//! that block into a PHC string that is safe to store. Verification recomputes
//! stage one and lets Argon2 compare in constant time.
//!
//! Ledger entries are looked up by equality, which a salted digest cannot
//! support, so they use [`token_digest`]: the stage-one hash alone, hex
//! encoded. Inputs there are high-entropy signed tokens.

use std::fmt;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use sha2::{Digest, Sha512};

#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("invalid fingerprint cost parameters: {0}")]
    Params(String),
    #[error("failed to compute fingerprint: {0}")]
    Hash(String),
    #[error("stored fingerprint is not a valid digest: {0}")]
    InvalidDigest(String),
}

#[derive(Debug, Clone)]
pub struct FingerprintHasher {
    params: Params,
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl FingerprintHasher {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, FingerprintError> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| FingerprintError::Params(e.to_string()))?;
        Ok(Self::new(params))
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn fingerprint(&self, value: &str) -> Result<String, FingerprintError> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2()
            .hash_password(&compress(value), &salt)
            .map_err(|e| FingerprintError::Hash(e.to_string()))?;

        Ok(digest.to_string())
    }

    /// Cost parameters are read from the stored digest, so fingerprints made
    /// under an older configuration still verify.
    pub fn verify(&self, value: &str, digest: &str) -> Result<bool, FingerprintError> {
        let parsed =
            PasswordHash::new(digest).map_err(|e| FingerprintError::InvalidDigest(e.to_string()))?;

        match self.argon2().verify_password(&compress(value), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(FingerprintError::Hash(e.to_string())),
        }
    }
}

fn compress(value: &str) -> Vec<u8> {
    Sha512::digest(value.as_bytes()).to_vec()
}

/// Deterministic lookup key of a token in the revocation ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenDigest(String);

impl TokenDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn token_digest(token: &str) -> TokenDigest {
    TokenDigest(hex::encode(compress(token)))
}
