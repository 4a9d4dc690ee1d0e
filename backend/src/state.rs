use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    db::connection::DbPool,
    repositories::{PgRevocationLedger, PgSessionRecordRepository},
    services::{SessionService, TokenPolicy, WebhookNotifier},
    utils::{fingerprint::FingerprintHasher, jwt::TokenCodec},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(config: Config, sessions: Arc<SessionService>) -> Self {
        Self { config, sessions }
    }

    /// Wire the Postgres stores and the webhook notifier behind the session
    /// service.
    pub fn with_pool(config: Config, pool: DbPool) -> anyhow::Result<Self> {
        let notifier = WebhookNotifier::new(
            config.webhook_url.clone(),
            Duration::from_secs(config.webhook_timeout_seconds),
        )?;
        let sessions = SessionService::new(
            TokenCodec::new(&config.jwt_secret),
            fingerprint_hasher(&config)?,
            Arc::new(PgSessionRecordRepository::new(pool.clone())),
            Arc::new(PgRevocationLedger::new(pool)),
            Arc::new(notifier),
            TokenPolicy::from_config(&config),
        );
        Ok(Self::new(config, Arc::new(sessions)))
    }
}

pub fn fingerprint_hasher(config: &Config) -> anyhow::Result<FingerprintHasher> {
    match (config.fingerprint_memory_kib, config.fingerprint_iterations) {
        (None, None) => Ok(FingerprintHasher::default()),
        (memory, iterations) => Ok(FingerprintHasher::with_cost(
            memory.unwrap_or(argon2::Params::DEFAULT_M_COST),
            iterations.unwrap_or(argon2::Params::DEFAULT_T_COST),
        )?),
    }
}
