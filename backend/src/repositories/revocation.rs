//! Ledger of token digests that may no longer be used.
//!
//! Entries are keyed by the deterministic SHA-512 digest of the token string
//! so a presented token can be looked up by equality. The ledger only grows.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::repositories::transaction::{begin_transaction, finish_transaction};
use crate::types::SessionRecordId;
use crate::utils::fingerprint::TokenDigest;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("revocation ledger failure: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Inserted,
    /// The digest was already on the ledger. The entry is unchanged.
    AlreadyBlocked,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RevocationLedger: Send + Sync {
    async fn block(
        &self,
        record_id: SessionRecordId,
        digest: &TokenDigest,
    ) -> Result<BlockOutcome, LedgerError>;

    async fn is_blocked(&self, digest: &TokenDigest) -> Result<bool, LedgerError>;
}

#[derive(Clone)]
pub struct PgRevocationLedger {
    pool: PgPool,
}

impl PgRevocationLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationLedger for PgRevocationLedger {
    async fn block(
        &self,
        record_id: SessionRecordId,
        digest: &TokenDigest,
    ) -> Result<BlockOutcome, LedgerError> {
        let mut tx = begin_transaction(&self.pool).await?;
        let outcome = sqlx::query(
            "INSERT INTO revoked_tokens (session_record_id, token_digest) VALUES ($1, $2) \
             ON CONFLICT (session_record_id, token_digest) DO NOTHING",
        )
        .bind(record_id)
        .bind(digest.as_str())
        .execute(&mut *tx)
        .await
        .map(|done| {
            if done.rows_affected() == 0 {
                tracing::warn!(%record_id, "Token digest was already blocked");
                BlockOutcome::AlreadyBlocked
            } else {
                BlockOutcome::Inserted
            }
        })
        .map_err(LedgerError::from);
        finish_transaction(tx, outcome).await
    }

    async fn is_blocked(&self, digest: &TokenDigest) -> Result<bool, LedgerError> {
        let blocked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE token_digest = $1)",
        )
        .bind(digest.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(blocked)
    }
}
