//! Session lifecycle: issue, validate, rotate and revoke token pairs.
//!
//! This is the only layer that turns component failures into client-facing
//! errors. Stores, the ledger and the codec return their own error types;
//! everything that is not the caller's fault becomes a 500 and is logged with
//! the operation and identity.

use std::sync::Arc;

use chrono::Duration;

use crate::config::Config;
use crate::error::AppError;
use crate::models::session_record::SessionBindings;
use crate::repositories::revocation::{BlockOutcome, RevocationLedger};
use crate::repositories::session_record::{SessionRecordRepository, StoreError};
use crate::services::anomaly_notifier::AnomalyNotifier;
use crate::types::Identity;
use crate::utils::fingerprint::{token_digest, FingerprintError, FingerprintHasher};
use crate::utils::jwt::{TokenCodec, TokenError, TokenKind, VerifiedToken};

#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Maximum distance between the `iat` of an access token and the
    /// refresh token it was issued with.
    pub pairing_tolerance: Duration,
}

impl TokenPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            access_ttl: config.access_token_ttl(),
            refresh_ttl: config.refresh_token_ttl(),
            pairing_tolerance: config.pairing_tolerance(),
        }
    }
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            access_ttl: Duration::hours(24),
            refresh_ttl: Duration::days(7),
            pairing_tolerance: Duration::seconds(60),
        }
    }
}

/// What the caller looks like on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub user_agent: Option<String>,
    pub ip: String,
}

#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionService {
    codec: TokenCodec,
    hasher: FingerprintHasher,
    records: Arc<dyn SessionRecordRepository>,
    ledger: Arc<dyn RevocationLedger>,
    notifier: Arc<dyn AnomalyNotifier>,
    policy: TokenPolicy,
}

fn dependency_error(
    operation: &'static str,
    identity: Option<Identity>,
    err: impl Into<anyhow::Error>,
) -> AppError {
    let err = err.into();
    match identity {
        Some(identity) => {
            tracing::error!(operation, %identity, error = %err, "Session dependency failed")
        }
        None => tracing::error!(operation, error = %err, "Session dependency failed"),
    }
    AppError::InternalServerError(err.context(operation))
}

fn rejected_token(operation: &'static str, err: TokenError) -> AppError {
    tracing::info!(operation, reason = %err, "Token rejected");
    AppError::unauthorized()
}

impl SessionService {
    pub fn new(
        codec: TokenCodec,
        hasher: FingerprintHasher,
        records: Arc<dyn SessionRecordRepository>,
        ledger: Arc<dyn RevocationLedger>,
        notifier: Arc<dyn AnomalyNotifier>,
        policy: TokenPolicy,
    ) -> Self {
        Self {
            codec,
            hasher,
            records,
            ledger,
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Create the identity's session and hand out its first token pair.
    pub async fn issue(
        &self,
        identity: Identity,
        client: &ClientContext,
    ) -> Result<IssuedTokens, AppError> {
        let user_agent = client
            .user_agent
            .as_deref()
            .filter(|ua| !ua.is_empty())
            .ok_or_else(|| AppError::BadRequest("User-Agent header is required".to_string()))?;

        let tokens = self.mint_pair("issue", identity)?;
        let bindings = self
            .bindings("issue", identity, &tokens.refresh_token, user_agent, &client.ip)
            .await?;

        match self.records.create(identity, &bindings).await {
            Ok(record_id) => {
                tracing::info!(%identity, %record_id, "Issued token pair");
                Ok(tokens)
            }
            Err(StoreError::IdentityExists) => {
                tracing::info!(%identity, "Issue rejected: identity already has a session");
                Err(AppError::BadRequest("GUID already exists".to_string()))
            }
            Err(err) => Err(dependency_error("issue", Some(identity), err)),
        }
    }

    /// Resolve a bearer access token to the identity it authenticates.
    pub async fn validate(&self, access_token: &str) -> Result<Identity, AppError> {
        let verified = self
            .codec
            .verify(access_token, TokenKind::Access)
            .map_err(|err| rejected_token("validate", err))?;
        let identity = verified.identity;

        let blocked = self
            .ledger
            .is_blocked(&token_digest(access_token))
            .await
            .map_err(|err| dependency_error("validate", Some(identity), err))?;
        if blocked {
            tracing::info!(%identity, "Access token is revoked");
            return Err(AppError::unauthorized());
        }

        let active = self
            .records
            .is_active(identity)
            .await
            .map_err(|err| dependency_error("validate", Some(identity), err))?;
        if !active {
            tracing::info!(%identity, "Session is not active");
            return Err(AppError::unauthorized());
        }

        Ok(identity)
    }

    /// Exchange a current access/refresh pair for a new one. The presented
    /// pair is revoked before the new pair exists.
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
        client: &ClientContext,
    ) -> Result<IssuedTokens, AppError> {
        let access_digest = token_digest(access_token);
        let refresh_digest = token_digest(refresh_token);

        for digest in [&access_digest, &refresh_digest] {
            let blocked = self
                .ledger
                .is_blocked(digest)
                .await
                .map_err(|err| dependency_error("refresh", None, err))?;
            if blocked {
                tracing::warn!("Refresh presented a revoked token");
                return Err(AppError::unauthorized());
            }
        }

        let access = self
            .codec
            .verify(access_token, TokenKind::Access)
            .map_err(|err| rejected_token("refresh", err))?;
        let refresh = self
            .codec
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|err| rejected_token("refresh", err))?;
        self.ensure_paired(&access, &refresh)?;
        let identity = access.identity;

        let record = match self.records.find_by_identity(identity).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                tracing::info!(%identity, "Refresh for an identity without a session");
                return Err(AppError::unauthorized());
            }
            Err(err) => return Err(dependency_error("refresh", Some(identity), err)),
        };
        if !record.is_active {
            tracing::info!(%identity, "Refresh for a logged out session");
            return Err(AppError::unauthorized());
        }

        if !self
            .matches("refresh", identity, refresh_token, &record.refresh_fingerprint)
            .await?
        {
            tracing::warn!(%identity, "Refresh token is not the current one for this session");
            return Err(AppError::unauthorized());
        }

        let user_agent = client.user_agent.as_deref().unwrap_or_default();
        if user_agent.is_empty()
            || !self
                .matches("refresh", identity, user_agent, &record.user_agent_fingerprint)
                .await?
        {
            tracing::warn!(%identity, "User-Agent differs from the one bound to the session");
            return Err(AppError::unauthorized());
        }

        if !self
            .matches("refresh", identity, &client.ip, &record.ip_fingerprint)
            .await?
        {
            tracing::warn!(%identity, ip = %client.ip, "Refresh from an unfamiliar IP");
            self.notifier.notify(&client.ip);
        }

        let outcome = self
            .ledger
            .block(record.id, &refresh_digest)
            .await
            .map_err(|err| dependency_error("refresh", Some(identity), err))?;
        if outcome == BlockOutcome::AlreadyBlocked {
            tracing::warn!(%identity, "Refresh token was consumed by a concurrent rotation");
            return Err(AppError::unauthorized());
        }
        self.ledger
            .block(record.id, &access_digest)
            .await
            .map_err(|err| dependency_error("refresh", Some(identity), err))?;

        let tokens = self.mint_pair("refresh", identity)?;
        let bindings = self
            .bindings("refresh", identity, &tokens.refresh_token, user_agent, &client.ip)
            .await?;
        self.records
            .update_bindings(identity, &bindings)
            .await
            .map_err(|err| dependency_error("refresh", Some(identity), err))?;

        tracing::info!(%identity, record_id = %record.id, "Rotated token pair");
        Ok(tokens)
    }

    /// Revoke the presented tokens and end the session for good.
    ///
    /// The refresh token is optional; when present it is only revoked if it
    /// belongs to the same identity.
    pub async fn logout(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), AppError> {
        let access = self
            .codec
            .verify(access_token, TokenKind::Access)
            .map_err(|err| rejected_token("logout", err))?;
        let identity = access.identity;
        let access_digest = token_digest(access_token);

        let blocked = self
            .ledger
            .is_blocked(&access_digest)
            .await
            .map_err(|err| dependency_error("logout", Some(identity), err))?;
        if blocked {
            tracing::info!(%identity, "Logout replayed with a revoked access token");
            return Err(AppError::unauthorized());
        }

        let record = match self.records.find_by_identity(identity).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                tracing::info!(%identity, "Logout for an identity without a session");
                return Err(AppError::unauthorized());
            }
            Err(err) => return Err(dependency_error("logout", Some(identity), err)),
        };

        self.ledger
            .block(record.id, &access_digest)
            .await
            .map_err(|err| dependency_error("logout", Some(identity), err))?;

        if let Some(refresh_token) = refresh_token {
            match self.codec.verify(refresh_token, TokenKind::Refresh) {
                Ok(refresh) if refresh.identity == identity => {
                    self.ledger
                        .block(record.id, &token_digest(refresh_token))
                        .await
                        .map_err(|err| dependency_error("logout", Some(identity), err))?;
                }
                _ => tracing::debug!(%identity, "Ignoring refresh cookie not owned by this session"),
            }
        }

        match self.records.deactivate(identity).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(AppError::unauthorized()),
            Err(err) => return Err(dependency_error("logout", Some(identity), err)),
        }

        tracing::info!(%identity, record_id = %record.id, "Logged out");
        Ok(())
    }

    fn ensure_paired(&self, access: &VerifiedToken, refresh: &VerifiedToken) -> Result<(), AppError> {
        if access.identity != refresh.identity {
            tracing::warn!(
                access_identity = %access.identity,
                refresh_identity = %refresh.identity,
                "Refresh pair belongs to different identities"
            );
            return Err(AppError::unauthorized());
        }

        let skew = (access.issued_at - refresh.issued_at).abs();
        if skew > self.policy.pairing_tolerance.num_seconds() {
            tracing::warn!(identity = %access.identity, skew, "Refresh pair was not issued together");
            return Err(AppError::unauthorized());
        }
        Ok(())
    }

    fn mint_pair(&self, operation: &'static str, identity: Identity) -> Result<IssuedTokens, AppError> {
        let access_token = self
            .codec
            .mint(identity, TokenKind::Access, self.policy.access_ttl)
            .map_err(|err| dependency_error(operation, Some(identity), err))?;
        let refresh_token = self
            .codec
            .mint(identity, TokenKind::Refresh, self.policy.refresh_ttl)
            .map_err(|err| dependency_error(operation, Some(identity), err))?;
        Ok(IssuedTokens {
            access_token,
            refresh_token,
        })
    }

    async fn bindings(
        &self,
        operation: &'static str,
        identity: Identity,
        refresh_token: &str,
        user_agent: &str,
        ip: &str,
    ) -> Result<SessionBindings, AppError> {
        let (refresh_token, user_agent, ip) =
            (refresh_token.to_owned(), user_agent.to_owned(), ip.to_owned());
        self.hash_blocking(operation, identity, move |hasher| {
            Ok(SessionBindings {
                refresh_fingerprint: hasher.fingerprint(&refresh_token)?,
                user_agent_fingerprint: hasher.fingerprint(&user_agent)?,
                ip_fingerprint: hasher.fingerprint(&ip)?,
            })
        })
        .await
    }

    async fn matches(
        &self,
        operation: &'static str,
        identity: Identity,
        value: &str,
        fingerprint: &str,
    ) -> Result<bool, AppError> {
        let (value, fingerprint) = (value.to_owned(), fingerprint.to_owned());
        self.hash_blocking(operation, identity, move |hasher| {
            hasher.verify(&value, &fingerprint)
        })
        .await
    }

    /// Argon2 is memory-hard; keep it off the async workers.
    async fn hash_blocking<T, F>(
        &self,
        operation: &'static str,
        identity: Identity,
        work: F,
    ) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&FingerprintHasher) -> Result<T, FingerprintError> + Send + 'static,
    {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || work(&hasher))
            .await
            .map_err(|err| dependency_error(operation, Some(identity), err))?
            .map_err(|err| dependency_error(operation, Some(identity), err))
    }
}
