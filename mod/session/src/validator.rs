//! Staged session validation pipeline.
//!
//! A fixed-order, non-retried sequence of checks; each passes or
//! short-circuits with a typed failure. Entry points differ only in which
//! stages run, expressed as a [`CheckProfile`] — profile data, not a
//! validator class per variant.

use std::sync::Arc;

use thiserror::Error;

use wicket_core::ServiceError;

use crate::gateway::{IdentityGateway, IdentityRecord};
use crate::model::{SessionPayload, ValidatedPrincipal};
use crate::revocation::RevocationService;

/// Terminal validation failure. Never auto-retried.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// No session, or a payload without a subject id.
    #[error("no session")]
    Unauthenticated,

    /// Session sealed in one deployment tier, replayed against another.
    #[error("session issued for environment '{issued}', running '{running}'")]
    EnvironmentMismatch { issued: String, running: String },

    /// Store- or provider-detected revocation.
    #[error("session has been revoked")]
    Revoked,

    /// Identity record missing or disabled.
    #[error("account is missing or disabled")]
    AccountUnavailable,

    /// Identity provider unreachable during a fail-closed check.
    #[error("identity could not be verified")]
    VerificationUnavailable,

    /// Admin-claim cross-check failed.
    #[error("admin privileges required")]
    AdminRequired,

    /// Admin targeted their own subject for revocation.
    #[error("admins cannot revoke their own sessions")]
    SelfRevocationForbidden,
}

impl ValidationError {
    /// Whether the client's cookie should be cleared: the session can
    /// never pass again, so there is no reason to keep presenting it.
    pub fn clears_session(&self) -> bool {
        matches!(
            self,
            ValidationError::Revoked | ValidationError::AccountUnavailable
        )
    }
}

impl From<ValidationError> for ServiceError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::AdminRequired | ValidationError::SelfRevocationForbidden => {
                ServiceError::PermissionDenied(e.to_string())
            }
            _ => ServiceError::Unauthorized(e.to_string()),
        }
    }
}

/// Which stages a validation pass runs.
///
/// Stages 1 (existence) and 2 (environment binding) always run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckProfile {
    /// Stages 1–2.
    Auth,
    /// Stages 1–3: adds the store-backed revocation check.
    AuthWithRevocation,
    /// Stages 1–3 plus identity existence/enabled and the global
    /// tokens-valid-after check.
    Full,
    /// Stages 1–3 plus the admin-claim cross-check.
    Admin,
}

impl CheckProfile {
    fn checks_revocation(self) -> bool {
        !matches!(self, CheckProfile::Auth)
    }

    fn checks_identity(self) -> bool {
        matches!(self, CheckProfile::Full)
    }

    fn checks_admin_claim(self) -> bool {
        matches!(self, CheckProfile::Admin)
    }
}

/// Runs the staged checks, producing a principal or a typed failure.
pub struct SessionValidator {
    environment: String,
    revocation: Arc<RevocationService>,
    gateway: Arc<dyn IdentityGateway>,
}

impl SessionValidator {
    pub fn new(
        environment: impl Into<String>,
        revocation: Arc<RevocationService>,
        gateway: Arc<dyn IdentityGateway>,
    ) -> Self {
        Self {
            environment: environment.into(),
            revocation,
            gateway,
        }
    }

    pub async fn validate(
        &self,
        payload: Option<&SessionPayload>,
        profile: CheckProfile,
    ) -> Result<ValidatedPrincipal, ValidationError> {
        // Stage 1: existence. A payload without a subject is no session.
        let payload = payload.ok_or(ValidationError::Unauthenticated)?;
        if payload.subject.trim().is_empty() {
            return Err(ValidationError::Unauthenticated);
        }

        // Stage 2: environment binding.
        if payload.environment != self.environment {
            return Err(ValidationError::EnvironmentMismatch {
                issued: payload.environment.clone(),
                running: self.environment.clone(),
            });
        }

        // Stage 3: store-backed revocation.
        if profile.checks_revocation()
            && self
                .revocation
                .is_revoked(&payload.subject, payload.created_at.as_deref())
                .await
        {
            return Err(ValidationError::Revoked);
        }

        if profile.checks_identity() {
            // Stage 4: identity existence / enabled. Fail closed on
            // provider errors — an account that no longer exists must
            // never be treated as authenticated, even during an outage.
            let record = self.fetch_record(&payload.subject).await?;
            let record = record.ok_or(ValidationError::AccountUnavailable)?;
            if !record.enabled {
                return Err(ValidationError::AccountUnavailable);
            }

            // Stage 5: global token-revocation time, against the record
            // already fetched. No created-at (legacy) or no
            // tokens-valid-after (never globally revoked) passes.
            if let (Some(created), Some(valid_after)) =
                (payload.created_at_time(), record.tokens_valid_after)
            {
                if created < valid_after {
                    return Err(ValidationError::Revoked);
                }
            }
        }

        // Stage 6: admin-claim cross-check. The cookie's admin claim is
        // re-verified against the provider record, since claims can be
        // revoked server-side after issuance.
        if profile.checks_admin_claim() {
            if !payload.claims.is_admin() {
                return Err(ValidationError::AdminRequired);
            }
            let record = self.fetch_record(&payload.subject).await?;
            match record {
                Some(r) if r.claims.is_admin() => {}
                _ => return Err(ValidationError::AdminRequired),
            }
        }

        Ok(ValidatedPrincipal::from_payload(payload))
    }

    async fn fetch_record(
        &self,
        subject: &str,
    ) -> Result<Option<IdentityRecord>, ValidationError> {
        self.gateway.get_record(subject).await.map_err(|e| {
            tracing::warn!("identity lookup failed for subject {subject}: {e}; failing closed");
            ValidationError::VerificationUnavailable
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{RevocationCache, DEFAULT_TTL};
    use crate::gateway::{MemoryIdentityGateway, UnavailableIdentityGateway};
    use crate::model::{claim, ClaimSet, RevocationReason};
    use crate::store::MemoryRevocationBackend;
    use chrono::{Duration, Utc};

    const ENV: &str = "production";

    fn validator_with(gateway: Arc<dyn IdentityGateway>) -> (SessionValidator, Arc<RevocationService>) {
        let backend = Arc::new(MemoryRevocationBackend::new());
        let revocation = Arc::new(RevocationService::new(
            backend,
            RevocationCache::new(DEFAULT_TTL),
        ));
        (
            SessionValidator::new(ENV, revocation.clone(), gateway),
            revocation,
        )
    }

    fn validator() -> (SessionValidator, Arc<RevocationService>, Arc<MemoryIdentityGateway>) {
        let gateway = Arc::new(MemoryIdentityGateway::new());
        let (v, r) = validator_with(gateway.clone());
        (v, r, gateway)
    }

    fn payload(subject: &str) -> SessionPayload {
        SessionPayload::new(subject, ENV)
    }

    const ALL_PROFILES: [CheckProfile; 4] = [
        CheckProfile::Auth,
        CheckProfile::AuthWithRevocation,
        CheckProfile::Full,
        CheckProfile::Admin,
    ];

    #[tokio::test]
    async fn missing_payload_is_unauthenticated_on_every_profile() {
        let (v, _, _) = validator();
        for profile in ALL_PROFILES {
            assert_eq!(
                v.validate(None, profile).await.unwrap_err(),
                ValidationError::Unauthenticated
            );
        }
    }

    #[tokio::test]
    async fn empty_subject_is_unauthenticated_on_every_profile() {
        let (v, _, _) = validator();
        let p = payload("  ");
        for profile in ALL_PROFILES {
            assert_eq!(
                v.validate(Some(&p), profile).await.unwrap_err(),
                ValidationError::Unauthenticated
            );
        }
    }

    #[tokio::test]
    async fn environment_mismatch_wins_regardless_of_other_checks() {
        let (v, revocation, gateway) = validator();

        // Subject is revoked AND missing from the provider, but the
        // environment check fires first.
        revocation
            .revoke("u1", RevocationReason::AdminAction, None)
            .await
            .unwrap();
        gateway.remove("u1");

        let mut p = payload("u1");
        p.environment = "staging".into();
        for profile in ALL_PROFILES {
            match v.validate(Some(&p), profile).await.unwrap_err() {
                ValidationError::EnvironmentMismatch { issued, running } => {
                    assert_eq!(issued, "staging");
                    assert_eq!(running, ENV);
                }
                other => panic!("expected EnvironmentMismatch, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn auth_profile_skips_revocation() {
        let (v, revocation, _) = validator();
        let p = payload("u1");
        revocation
            .revoke("u1", RevocationReason::UserRequest, None)
            .await
            .unwrap();

        // The event postdates the session, so with-revocation fails...
        assert_eq!(
            v.validate(Some(&p), CheckProfile::AuthWithRevocation).await.unwrap_err(),
            ValidationError::Revoked
        );
        // ...but the plain auth profile never consults the store.
        assert!(v.validate(Some(&p), CheckProfile::Auth).await.is_ok());
    }

    #[tokio::test]
    async fn revoked_session_fails_stage_three() {
        let (v, revocation, _) = validator();
        let p = payload("u1");
        revocation
            .revoke("u1", RevocationReason::PasskeyRemoved, None)
            .await
            .unwrap();

        let err = v
            .validate(Some(&p), CheckProfile::AuthWithRevocation)
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::Revoked);
        assert!(err.clears_session());
    }

    #[tokio::test]
    async fn full_profile_rejects_missing_account() {
        let (v, _, _) = validator();
        let p = payload("ghost");

        let err = v.validate(Some(&p), CheckProfile::Full).await.unwrap_err();
        assert_eq!(err, ValidationError::AccountUnavailable);
        assert!(err.clears_session());
    }

    #[tokio::test]
    async fn full_profile_rejects_disabled_account() {
        let (v, _, gateway) = validator();
        let mut record = IdentityRecord::enabled_with_claims(ClaimSet::new());
        record.enabled = false;
        gateway.insert("u1", record);

        let err = v.validate(Some(&payload("u1")), CheckProfile::Full).await.unwrap_err();
        assert_eq!(err, ValidationError::AccountUnavailable);
    }

    #[tokio::test]
    async fn full_profile_passes_enabled_account() {
        let (v, _, gateway) = validator();
        gateway.insert("u1", IdentityRecord::enabled_with_claims(ClaimSet::new()));

        let principal = v.validate(Some(&payload("u1")), CheckProfile::Full).await.unwrap();
        assert_eq!(principal.subject, "u1");
    }

    #[tokio::test]
    async fn provider_outage_fails_closed_on_full_profile() {
        let (v, _) = validator_with(Arc::new(UnavailableIdentityGateway));

        let err = v.validate(Some(&payload("u1")), CheckProfile::Full).await.unwrap_err();
        assert_eq!(err, ValidationError::VerificationUnavailable);
        assert!(!err.clears_session(), "outage does not burn the session");
    }

    #[tokio::test]
    async fn global_revocation_time_rejects_older_sessions() {
        let (v, _, gateway) = validator();
        let mut record = IdentityRecord::enabled_with_claims(ClaimSet::new());
        record.tokens_valid_after = Some(Utc::now() - Duration::hours(1));
        gateway.insert("u1", record);

        // Session created two hours ago, globally revoked one hour ago.
        let mut old = payload("u1");
        old.created_at = Some((Utc::now() - Duration::hours(2)).to_rfc3339());
        assert_eq!(
            v.validate(Some(&old), CheckProfile::Full).await.unwrap_err(),
            ValidationError::Revoked
        );

        // A session created after the cutoff passes.
        let fresh = payload("u1");
        assert!(v.validate(Some(&fresh), CheckProfile::Full).await.is_ok());
    }

    #[tokio::test]
    async fn global_revocation_time_passes_legacy_sessions() {
        let (v, _, gateway) = validator();
        let mut record = IdentityRecord::enabled_with_claims(ClaimSet::new());
        record.tokens_valid_after = Some(Utc::now());
        gateway.insert("u1", record);

        let mut legacy = payload("u1");
        legacy.created_at = None;
        assert!(v.validate(Some(&legacy), CheckProfile::Full).await.is_ok());
    }

    #[tokio::test]
    async fn admin_profile_requires_claim_in_cookie_and_record() {
        let (v, _, gateway) = validator();
        gateway.insert(
            "u1",
            IdentityRecord::enabled_with_claims(ClaimSet::new().with(claim::ADMIN, true)),
        );

        // Cookie without the claim never reaches the provider.
        assert_eq!(
            v.validate(Some(&payload("u1")), CheckProfile::Admin).await.unwrap_err(),
            ValidationError::AdminRequired
        );

        // Cookie claim present and provider agrees.
        let mut p = payload("u1");
        p.claims.set(claim::ADMIN, true);
        assert!(v.validate(Some(&p), CheckProfile::Admin).await.is_ok());
    }

    #[tokio::test]
    async fn admin_claim_revoked_server_side_is_rejected() {
        let (v, _, gateway) = validator();
        gateway.insert(
            "u1",
            IdentityRecord::enabled_with_claims(ClaimSet::new().with(claim::ADMIN, false)),
        );

        // The cookie still says admin; the record no longer does.
        let mut p = payload("u1");
        p.claims.set(claim::ADMIN, true);
        assert_eq!(
            v.validate(Some(&p), CheckProfile::Admin).await.unwrap_err(),
            ValidationError::AdminRequired
        );
    }

    #[tokio::test]
    async fn admin_check_with_missing_record_is_admin_required() {
        let (v, _, _) = validator();
        let mut p = payload("ghost");
        p.claims.set(claim::ADMIN, true);
        assert_eq!(
            v.validate(Some(&p), CheckProfile::Admin).await.unwrap_err(),
            ValidationError::AdminRequired
        );
    }

    #[tokio::test]
    async fn admin_check_fails_closed_on_provider_outage() {
        let (v, _) = validator_with(Arc::new(UnavailableIdentityGateway));
        let mut p = payload("u1");
        p.claims.set(claim::ADMIN, true);
        assert_eq!(
            v.validate(Some(&p), CheckProfile::Admin).await.unwrap_err(),
            ValidationError::VerificationUnavailable
        );
    }

    #[tokio::test]
    async fn principal_carries_payload_identity() {
        let (v, _, _) = validator();
        let mut p = payload("u1");
        p.email = Some("a@example.com".into());
        p.name = Some("Alice".into());
        p.claims.set(claim::PASSKEY_ENABLED, true);

        let principal = v.validate(Some(&p), CheckProfile::Auth).await.unwrap();
        assert_eq!(principal.subject, "u1");
        assert_eq!(principal.email.as_deref(), Some("a@example.com"));
        assert_eq!(principal.name.as_deref(), Some("Alice"));
        assert!(principal.claims.passkey_enabled());
    }
}
