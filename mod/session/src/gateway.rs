//! Identity provider boundary adapter.
//!
//! Provider errors are not masked here — each caller decides whether a
//! check fails open or closed.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ClaimSet;

/// Identity provider failure (network, auth, quota, ...).
#[derive(Debug, Error)]
#[error("identity provider error: {0}")]
pub struct GatewayError(pub String);

/// Per-subject record held by the identity provider. External, read-only
/// from the engine's point of view.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    /// Whether the account is enabled.
    pub enabled: bool,

    /// Sessions created strictly before this instant are globally
    /// revoked. None means the subject was never globally revoked.
    pub tokens_valid_after: Option<DateTime<Utc>>,

    /// Provider-side custom claims — the source of truth the cookie's
    /// claims are cross-checked against.
    pub claims: ClaimSet,
}

impl IdentityRecord {
    pub fn enabled_with_claims(claims: ClaimSet) -> Self {
        Self {
            enabled: true,
            tokens_valid_after: None,
            claims,
        }
    }
}

/// Adapter over the identity provider.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Fetch a subject's record. Ok(None) means the subject does not
    /// exist — distinct from a provider failure.
    async fn get_record(&self, subject: &str) -> Result<Option<IdentityRecord>, GatewayError>;

    /// Overwrite the named custom claims on the subject's record.
    async fn set_claims(&self, subject: &str, claims: &ClaimSet) -> Result<(), GatewayError>;

    /// Bump the subject's tokens-valid-after to now, globally revoking
    /// every previously issued credential.
    async fn revoke_all_tokens(&self, subject: &str) -> Result<(), GatewayError>;
}

/// In-memory gateway for development and tests.
#[derive(Default)]
pub struct MemoryIdentityGateway {
    records: RwLock<HashMap<String, IdentityRecord>>,
}

impl MemoryIdentityGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, subject: &str, record: IdentityRecord) {
        self.records.write().unwrap().insert(subject.to_string(), record);
    }

    pub fn remove(&self, subject: &str) {
        self.records.write().unwrap().remove(subject);
    }
}

#[async_trait]
impl IdentityGateway for MemoryIdentityGateway {
    async fn get_record(&self, subject: &str) -> Result<Option<IdentityRecord>, GatewayError> {
        Ok(self.records.read().unwrap().get(subject).cloned())
    }

    async fn set_claims(&self, subject: &str, claims: &ClaimSet) -> Result<(), GatewayError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(subject)
            .ok_or_else(|| GatewayError(format!("unknown subject {subject}")))?;
        record.claims.merge(claims);
        Ok(())
    }

    async fn revoke_all_tokens(&self, subject: &str) -> Result<(), GatewayError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(subject)
            .ok_or_else(|| GatewayError(format!("unknown subject {subject}")))?;
        record.tokens_valid_after = Some(Utc::now());
        Ok(())
    }
}

/// A gateway that always errors. Used for fail-closed policy tests.
pub struct UnavailableIdentityGateway;

#[async_trait]
impl IdentityGateway for UnavailableIdentityGateway {
    async fn get_record(&self, _subject: &str) -> Result<Option<IdentityRecord>, GatewayError> {
        Err(GatewayError("simulated outage".into()))
    }

    async fn set_claims(&self, _subject: &str, _claims: &ClaimSet) -> Result<(), GatewayError> {
        Err(GatewayError("simulated outage".into()))
    }

    async fn revoke_all_tokens(&self, _subject: &str) -> Result<(), GatewayError> {
        Err(GatewayError("simulated outage".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::claim;

    #[tokio::test]
    async fn missing_record_is_none_not_error() {
        let gw = MemoryIdentityGateway::new();
        assert!(gw.get_record("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_claims_merges_into_record() {
        let gw = MemoryIdentityGateway::new();
        gw.insert("u1", IdentityRecord::enabled_with_claims(ClaimSet::new()));

        gw.set_claims("u1", &ClaimSet::new().with(claim::ADMIN, true))
            .await
            .unwrap();

        let record = gw.get_record("u1").await.unwrap().unwrap();
        assert!(record.claims.is_admin());
    }

    #[tokio::test]
    async fn revoke_all_tokens_bumps_valid_after() {
        let gw = MemoryIdentityGateway::new();
        gw.insert("u1", IdentityRecord::enabled_with_claims(ClaimSet::new()));

        let before = Utc::now();
        gw.revoke_all_tokens("u1").await.unwrap();

        let record = gw.get_record("u1").await.unwrap().unwrap();
        assert!(record.tokens_valid_after.unwrap() >= before);
    }

    #[tokio::test]
    async fn ops_on_unknown_subject_error() {
        let gw = MemoryIdentityGateway::new();
        assert!(gw.revoke_all_tokens("ghost").await.is_err());
        assert!(gw.set_claims("ghost", &ClaimSet::new()).await.is_err());
    }
}
