use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Identity;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Wire claims of both token kinds.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub guid: Identity,
    /// Absent on tokens minted by something other than this codec.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TokenKind>,
    pub exp: i64, // expiration time
    pub iat: i64, // issued at
    pub jti: String,
}

/// Claims of a token whose signature, kind and expiry have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub identity: Identity,
    pub kind: TokenKind,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret unavailable or token could not be signed")]
    SigningError,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("expected a {expected} token")]
    KindMismatch { expected: &'static str },
    #[error("token has expired")]
    Expired,
    #[error("token claims are malformed")]
    MalformedClaims,
}

/// Mints and verifies HS512 access/refresh tokens with one shared secret.
///
/// The secret is injected at construction; the codec carries no other state
/// and is shared across requests.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    has_secret: bool,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            has_secret: !secret.is_empty(),
        }
    }

    pub fn mint(
        &self,
        identity: Identity,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        if !self.has_secret {
            return Err(TokenError::SigningError);
        }

        let now = Utc::now();
        let claims = Claims {
            guid: identity,
            kind: Some(kind),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding)
            .map_err(|_| TokenError::SigningError)
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<VerifiedToken, TokenError> {
        if !self.has_secret {
            return Err(TokenError::InvalidSignature);
        }

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        // jsonwebtoken checks the signature before it deserializes any claim.
        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::InvalidKeyFormat => TokenError::InvalidSignature,
                _ => TokenError::MalformedClaims,
            })?
            .claims;

        match claims.kind {
            Some(kind) if kind == expected => Ok(VerifiedToken {
                identity: claims.guid,
                kind,
                issued_at: claims.iat,
                expires_at: claims.exp,
            }),
            _ => Err(TokenError::KindMismatch {
                expected: expected.as_str(),
            }),
        }
    }
}
