//! Process-local stores with the same contract as the Postgres ones.
//!
//! Used to drive the session service and the HTTP router without a database.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::models::session_record::{SessionBindings, SessionRecord};
use crate::repositories::revocation::{BlockOutcome, LedgerError, RevocationLedger};
use crate::repositories::session_record::{SessionRecordRepository, StoreError};
use crate::types::{Identity, SessionRecordId};
use crate::utils::fingerprint::TokenDigest;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Records {
    next_id: i64,
    by_identity: HashMap<Identity, SessionRecord>,
}

#[derive(Default)]
pub struct InMemorySessionRecords {
    inner: Mutex<Records>,
}

impl InMemorySessionRecords {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRecordRepository for InMemorySessionRecords {
    async fn create(
        &self,
        identity: Identity,
        bindings: &SessionBindings,
    ) -> Result<SessionRecordId, StoreError> {
        let mut records = lock(&self.inner);
        if records.by_identity.contains_key(&identity) {
            return Err(StoreError::IdentityExists);
        }
        records.next_id += 1;
        let id = SessionRecordId::new(records.next_id);
        let now = Utc::now();
        records.by_identity.insert(
            identity,
            SessionRecord {
                id,
                identity,
                refresh_fingerprint: bindings.refresh_fingerprint.clone(),
                user_agent_fingerprint: bindings.user_agent_fingerprint.clone(),
                ip_fingerprint: bindings.ip_fingerprint.clone(),
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn find_by_identity(&self, identity: Identity) -> Result<SessionRecord, StoreError> {
        lock(&self.inner)
            .by_identity
            .get(&identity)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_bindings(
        &self,
        identity: Identity,
        bindings: &SessionBindings,
    ) -> Result<(), StoreError> {
        let mut records = lock(&self.inner);
        let record = records
            .by_identity
            .get_mut(&identity)
            .ok_or(StoreError::NotFound)?;
        record.refresh_fingerprint = bindings.refresh_fingerprint.clone();
        record.user_agent_fingerprint = bindings.user_agent_fingerprint.clone();
        record.ip_fingerprint = bindings.ip_fingerprint.clone();
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn deactivate(&self, identity: Identity) -> Result<(), StoreError> {
        let mut records = lock(&self.inner);
        let record = records
            .by_identity
            .get_mut(&identity)
            .ok_or(StoreError::NotFound)?;
        record.is_active = false;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn is_active(&self, identity: Identity) -> Result<bool, StoreError> {
        Ok(lock(&self.inner)
            .by_identity
            .get(&identity)
            .map(|record| record.is_active)
            .unwrap_or(false))
    }
}

#[derive(Default)]
pub struct InMemoryRevocationLedger {
    entries: Mutex<HashSet<(SessionRecordId, TokenDigest)>>,
}

impl InMemoryRevocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RevocationLedger for InMemoryRevocationLedger {
    async fn block(
        &self,
        record_id: SessionRecordId,
        digest: &TokenDigest,
    ) -> Result<BlockOutcome, LedgerError> {
        if lock(&self.entries).insert((record_id, digest.clone())) {
            Ok(BlockOutcome::Inserted)
        } else {
            tracing::warn!(%record_id, "Token digest was already blocked");
            Ok(BlockOutcome::AlreadyBlocked)
        }
    }

    async fn is_blocked(&self, digest: &TokenDigest) -> Result<bool, LedgerError> {
        Ok(lock(&self.entries)
            .iter()
            .any(|(_, blocked)| blocked == digest))
    }
}
