//! Persistent session records, one per identity.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::session_record::{SessionBindings, SessionRecord};
use crate::repositories::transaction::{begin_transaction, finish_transaction};
use crate::types::{Identity, SessionRecordId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a session record already exists for this identity")]
    IdentityExists,
    #[error("session record not found")]
    NotFound,
    #[error("session store failure: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage for the fingerprints bound to each identity's current token pair.
///
/// Mutations are atomic: each one either commits fully or leaves the record
/// untouched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRecordRepository: Send + Sync {
    /// Insert a new active record. Fails with [`StoreError::IdentityExists`]
    /// when the identity already has one, active or not.
    async fn create(
        &self,
        identity: Identity,
        bindings: &SessionBindings,
    ) -> Result<SessionRecordId, StoreError>;

    async fn find_by_identity(&self, identity: Identity) -> Result<SessionRecord, StoreError>;

    /// Replace all three fingerprints of an existing record.
    async fn update_bindings(
        &self,
        identity: Identity,
        bindings: &SessionBindings,
    ) -> Result<(), StoreError>;

    /// Mark the record inactive. Deactivating an inactive record succeeds.
    async fn deactivate(&self, identity: Identity) -> Result<(), StoreError>;

    /// `false` when the record is inactive or missing.
    async fn is_active(&self, identity: Identity) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgSessionRecordRepository {
    pool: PgPool,
}

impl PgSessionRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

fn require_row(rows_affected: u64) -> Result<(), StoreError> {
    if rows_affected == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

#[async_trait]
impl SessionRecordRepository for PgSessionRecordRepository {
    async fn create(
        &self,
        identity: Identity,
        bindings: &SessionBindings,
    ) -> Result<SessionRecordId, StoreError> {
        let mut tx = begin_transaction(&self.pool).await?;
        let outcome = sqlx::query_scalar::<_, SessionRecordId>(
            "INSERT INTO session_records \
             (identity, refresh_fingerprint, user_agent_fingerprint, ip_fingerprint, is_active) \
             VALUES ($1, $2, $3, $4, TRUE) RETURNING id",
        )
        .bind(identity)
        .bind(&bindings.refresh_fingerprint)
        .bind(&bindings.user_agent_fingerprint)
        .bind(&bindings.ip_fingerprint)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::IdentityExists
            } else {
                StoreError::Database(err)
            }
        });
        finish_transaction(tx, outcome).await
    }

    async fn find_by_identity(&self, identity: Identity) -> Result<SessionRecord, StoreError> {
        sqlx::query_as::<_, SessionRecord>(
            "SELECT id, identity, refresh_fingerprint, user_agent_fingerprint, ip_fingerprint, \
             is_active, created_at, updated_at \
             FROM session_records WHERE identity = $1",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn update_bindings(
        &self,
        identity: Identity,
        bindings: &SessionBindings,
    ) -> Result<(), StoreError> {
        let mut tx = begin_transaction(&self.pool).await?;
        let outcome = sqlx::query(
            "UPDATE session_records \
             SET refresh_fingerprint = $2, user_agent_fingerprint = $3, ip_fingerprint = $4, \
                 updated_at = NOW() \
             WHERE identity = $1",
        )
        .bind(identity)
        .bind(&bindings.refresh_fingerprint)
        .bind(&bindings.user_agent_fingerprint)
        .bind(&bindings.ip_fingerprint)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)
        .and_then(|done| require_row(done.rows_affected()));
        finish_transaction(tx, outcome).await
    }

    async fn deactivate(&self, identity: Identity) -> Result<(), StoreError> {
        let mut tx = begin_transaction(&self.pool).await?;
        let outcome = sqlx::query(
            "UPDATE session_records SET is_active = FALSE, updated_at = NOW() WHERE identity = $1",
        )
        .bind(identity)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)
        .and_then(|done| require_row(done.rows_affected()));
        finish_transaction(tx, outcome).await
    }

    async fn is_active(&self, identity: Identity) -> Result<bool, StoreError> {
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT is_active FROM session_records WHERE identity = $1",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(active.unwrap_or(false))
    }
}
