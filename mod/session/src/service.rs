//! Session service — wires codec, cache, store, gateway, and validator
//! together behind the entry points callers use.
//!
//! Everything is constructor-injected; there is no module-level state, so
//! concurrent tests (and deployments) never cross-pollute.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use wicket_core::ServiceError;

use crate::cache::RevocationCache;
use crate::gateway::{GatewayError, IdentityGateway};
use crate::lifecycle;
use crate::model::{ClaimSet, RevocationEvent, RevocationMetadata, RevocationReason, SessionPayload, ValidatedPrincipal};
use crate::revocation::RevocationService;
use crate::seal::{SealError, SealedSessionCodec};
use crate::store::{RevocationBackend, StoreError};
use crate::validator::{CheckProfile, SessionValidator, ValidationError};

/// Configuration for the session engine.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Secret the cookie sealing key is derived from.
    pub seal_secret: String,

    /// Deployment environment tag sealed into (and checked against)
    /// every session.
    pub environment: String,

    /// Cookie name the sealed session travels in.
    pub cookie_name: String,

    /// Revocation cache TTL in seconds (default: 5 minutes).
    pub revocation_cache_ttl: u64,

    /// Codec-level ceiling on sealed-envelope age in days. Sits above
    /// the extended session lifetime.
    pub seal_max_age_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seal_secret: "wicket-dev-secret-change-me".to_string(),
            environment: "development".to_string(),
            cookie_name: "session".to_string(),
            revocation_cache_ttl: 300, // 5 min
            seal_max_age_days: 400,
        }
    }
}

/// Errors from session operations beyond validation itself.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Seal(#[from] SealError),
}

impl From<SessionError> for ServiceError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Validation(v) => v.into(),
            SessionError::Store(s) => ServiceError::Storage(s.to_string()),
            SessionError::Gateway(g) => ServiceError::Internal(g.to_string()),
            SessionError::Seal(s) => ServiceError::Unauthorized(s.to_string()),
        }
    }
}

/// Successful validation plus an optional restamped payload the caller
/// must re-seal into the cookie.
#[derive(Debug)]
pub struct Validated {
    pub principal: ValidatedPrincipal,
    pub refreshed: Option<SessionPayload>,
}

/// The session engine. Holds storage backends, the identity gateway, and
/// configuration.
pub struct SessionService {
    codec: SealedSessionCodec,
    validator: SessionValidator,
    revocation: Arc<RevocationService>,
    gateway: Arc<dyn IdentityGateway>,
    config: SessionConfig,
}

impl SessionService {
    pub fn new(
        backend: Arc<dyn RevocationBackend>,
        gateway: Arc<dyn IdentityGateway>,
        config: SessionConfig,
    ) -> Arc<Self> {
        let codec = SealedSessionCodec::new(&config.seal_secret, config.seal_max_age_days);
        let cache = RevocationCache::new(Duration::from_secs(config.revocation_cache_ttl));
        let revocation = Arc::new(RevocationService::new(backend, cache));
        let validator =
            SessionValidator::new(config.environment.clone(), revocation.clone(), gateway.clone());
        Arc::new(Self {
            codec,
            validator,
            revocation,
            gateway,
            config,
        })
    }

    pub fn codec(&self) -> &SealedSessionCodec {
        &self.codec
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The revocation service, also usable standalone.
    pub fn revocation(&self) -> &RevocationService {
        &self.revocation
    }

    // ── Entry points ────────────────────────────────────────────────

    /// Stages 1–2: existence and environment binding.
    pub async fn require_auth(
        &self,
        payload: Option<&SessionPayload>,
    ) -> Result<ValidatedPrincipal, ValidationError> {
        self.validator.validate(payload, CheckProfile::Auth).await
    }

    /// Stages 1–3, with the sliding-window refresh unless `refresh` is
    /// false (read-only callers).
    pub async fn require_auth_with_revocation_check(
        &self,
        payload: Option<&SessionPayload>,
        refresh: bool,
    ) -> Result<Validated, ValidationError> {
        self.validate_refreshing(payload, CheckProfile::AuthWithRevocation, refresh)
            .await
    }

    /// Stages 1–3 plus identity existence/enabled and the global
    /// tokens-valid-after check, with the sliding-window refresh.
    pub async fn require_auth_full(
        &self,
        payload: Option<&SessionPayload>,
        refresh: bool,
    ) -> Result<Validated, ValidationError> {
        self.validate_refreshing(payload, CheckProfile::Full, refresh)
            .await
    }

    /// Stages 1–3 plus the admin-claim cross-check.
    pub async fn require_admin(
        &self,
        payload: Option<&SessionPayload>,
    ) -> Result<ValidatedPrincipal, ValidationError> {
        self.validator.validate(payload, CheckProfile::Admin).await
    }

    async fn validate_refreshing(
        &self,
        payload: Option<&SessionPayload>,
        profile: CheckProfile,
        refresh: bool,
    ) -> Result<Validated, ValidationError> {
        let principal = self.validator.validate(payload, profile).await?;

        let mut refreshed = None;
        if refresh {
            if let Some(p) = payload {
                if lifecycle::should_refresh(p.created_at.as_deref()) {
                    let mut renewed = p.clone();
                    lifecycle::refresh(&mut renewed);
                    refreshed = Some(renewed);
                }
            }
        }

        Ok(Validated { principal, refreshed })
    }

    // ── Revocation operations ───────────────────────────────────────

    /// Revoke every session of the calling subject.
    pub async fn revoke_my_sessions(
        &self,
        principal: &ValidatedPrincipal,
        reason: RevocationReason,
    ) -> Result<RevocationEvent, SessionError> {
        self.revoke_subject(&principal.subject, reason, None).await
    }

    /// Revoke every session of another subject. The caller must have
    /// independently passed `require_admin`; targeting the caller's own
    /// subject is forbidden and performs no store mutation.
    pub async fn admin_revoke_sessions(
        &self,
        admin: &ValidatedPrincipal,
        target_subject: &str,
        reason: RevocationReason,
    ) -> Result<RevocationEvent, SessionError> {
        if target_subject == admin.subject {
            return Err(ValidationError::SelfRevocationForbidden.into());
        }
        let metadata = RevocationMetadata {
            device_id: None,
            actor_id: Some(admin.subject.clone()),
        };
        self.revoke_subject(target_subject, reason, Some(metadata)).await
    }

    /// Append the event and purge the cache, then bump the provider's
    /// tokens-valid-after so the global check backs up the event store.
    /// The event append comes first: it is the primary enforcement
    /// mechanism, and must be durable even if the provider call fails.
    async fn revoke_subject(
        &self,
        subject: &str,
        reason: RevocationReason,
        metadata: Option<RevocationMetadata>,
    ) -> Result<RevocationEvent, SessionError> {
        let event = self.revocation.revoke(subject, reason, metadata).await?;
        if let Err(e) = self.gateway.revoke_all_tokens(subject).await {
            tracing::error!("provider token revocation failed for subject {subject}: {e}");
            return Err(e.into());
        }
        Ok(event)
    }

    // ── Lifecycle operations ────────────────────────────────────────

    /// Explicit caller-invoked refresh, outside the automatic sliding
    /// window. Returns the restamped payload to re-seal.
    pub fn refresh_session_timestamp(&self, payload: &SessionPayload) -> SessionPayload {
        let mut renewed = payload.clone();
        lifecycle::refresh(&mut renewed);
        renewed
    }

    // ── Claim sync ──────────────────────────────────────────────────

    /// Overwrite the named provider-side claims for a subject (consent
    /// form, passkey flag, ...). Sessions pick the change up at next
    /// issuance; the admin cross-check sees it immediately.
    pub async fn set_claims(&self, subject: &str, claims: &ClaimSet) -> Result<(), SessionError> {
        self.gateway.set_claims(subject, claims).await?;
        Ok(())
    }
}
