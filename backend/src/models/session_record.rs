//! Persistent per-identity session state.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{Identity, SessionRecordId};

#[derive(Debug, Clone, FromRow)]
/// The single authoritative session row of an identity.
pub struct SessionRecord {
    /// Surrogate key, referenced by revocation entries.
    pub id: SessionRecordId,
    pub identity: Identity,
    /// Fingerprint of the refresh token that has not been consumed yet.
    pub refresh_fingerprint: String,
    /// Fingerprints of the client context captured at issuance or last rotation.
    pub user_agent_fingerprint: String,
    pub ip_fingerprint: String,
    /// Cleared by logout and never set again.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fingerprints written together on issuance and on every rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBindings {
    pub refresh_fingerprint: String,
    pub user_agent_fingerprint: String,
    pub ip_fingerprint: String,
}
