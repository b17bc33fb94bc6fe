//! Revocation event persistence.
//!
//! [`RevocationBackend`] is the document-store seam: one equality +
//! inequality existence query and an append. [`RevocationStore`] layers
//! the failure policy on top — lookups fail open, appends propagate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use wicket_core::new_id;

use crate::model::{RevocationEvent, RevocationMetadata, RevocationReason};

/// Document store error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Document-store seam for the revocation-events collection.
///
/// The collection is keyed by auto-id with fields
/// `{subject, revoked_at, reason, metadata?}` and queried by subject
/// equality plus a `revoked_at` inequality.
#[async_trait]
pub trait RevocationBackend: Send + Sync {
    /// Whether any event exists for `subject` with `revoked_at` strictly
    /// after `since`. Limit-1 semantics: backends may stop at the first
    /// match.
    async fn find_after(&self, subject: &str, since: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Persist a new event. The collection is append-only.
    async fn append(&self, event: &RevocationEvent) -> Result<(), StoreError>;
}

/// Store adapter applying the per-operation failure policy.
pub struct RevocationStore {
    backend: Arc<dyn RevocationBackend>,
}

impl RevocationStore {
    pub fn new(backend: Arc<dyn RevocationBackend>) -> Self {
        Self { backend }
    }

    /// Existence query, failing OPEN on store errors.
    ///
    /// Revocation is rare and a false negative only delays enforcement;
    /// failing closed here would lock out every user during a transient
    /// store outage.
    pub async fn has_revocation_after(&self, subject: &str, since: DateTime<Utc>) -> bool {
        match self.backend.find_after(subject, since).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("revocation lookup failed for subject {subject}: {e}; failing open");
                false
            }
        }
    }

    /// Build and persist a new event stamped with the current time.
    /// Append failures propagate to the caller.
    pub async fn append(
        &self,
        subject: &str,
        reason: RevocationReason,
        metadata: Option<RevocationMetadata>,
    ) -> Result<RevocationEvent, StoreError> {
        let event = RevocationEvent {
            id: new_id(),
            subject: subject.to_string(),
            revoked_at: Utc::now(),
            reason,
            metadata,
        };
        self.backend.append(&event).await?;
        Ok(event)
    }
}

/// In-memory backend for development and tests.
///
/// Counts existence queries so tests can assert the cache absorbed
/// repeated lookups.
#[derive(Default)]
pub struct MemoryRevocationBackend {
    events: RwLock<Vec<RevocationEvent>>,
    queries: AtomicUsize,
}

impl MemoryRevocationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find_after` calls served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    /// Snapshot of all persisted events.
    pub fn events(&self) -> Vec<RevocationEvent> {
        self.events.read().unwrap().clone()
    }
}

#[async_trait]
impl RevocationBackend for MemoryRevocationBackend {
    async fn find_after(&self, subject: &str, since: DateTime<Utc>) -> Result<bool, StoreError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let events = self.events.read().unwrap();
        Ok(events
            .iter()
            .any(|e| e.subject == subject && e.revoked_at > since))
    }

    async fn append(&self, event: &RevocationEvent) -> Result<(), StoreError> {
        self.events.write().unwrap().push(event.clone());
        Ok(())
    }
}

/// A backend that always errors. Used for failure-policy tests.
#[derive(Default)]
pub struct FailingRevocationBackend {
    queries: AtomicUsize,
}

impl FailingRevocationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RevocationBackend for FailingRevocationBackend {
    async fn find_after(&self, _subject: &str, _since: DateTime<Utc>) -> Result<bool, StoreError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Err(StoreError::Unavailable("simulated outage".into()))
    }

    async fn append(&self, _event: &RevocationEvent) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("simulated outage".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn find_after_is_strict_inequality() {
        let backend = MemoryRevocationBackend::new();
        let at = Utc::now();
        backend
            .append(&RevocationEvent {
                id: new_id(),
                subject: "u1".into(),
                revoked_at: at,
                reason: RevocationReason::UserRequest,
                metadata: None,
            })
            .await
            .unwrap();

        assert!(backend.find_after("u1", at - Duration::seconds(1)).await.unwrap());
        assert!(!backend.find_after("u1", at).await.unwrap(), "since == revoked_at is not after");
        assert!(!backend.find_after("u1", at + Duration::seconds(1)).await.unwrap());
        assert!(!backend.find_after("u2", at - Duration::seconds(1)).await.unwrap());
    }

    #[tokio::test]
    async fn store_append_stamps_id_and_time() {
        let backend = Arc::new(MemoryRevocationBackend::new());
        let store = RevocationStore::new(backend.clone());

        let before = Utc::now();
        let event = store
            .append("u1", RevocationReason::AdminAction, None)
            .await
            .unwrap();

        assert!(!event.id.is_empty());
        assert!(event.revoked_at >= before);
        assert_eq!(backend.events().len(), 1);
    }

    #[tokio::test]
    async fn lookup_fails_open_on_store_error() {
        let store = RevocationStore::new(Arc::new(FailingRevocationBackend::new()));
        assert!(!store.has_revocation_after("u1", Utc::now()).await);
    }

    #[tokio::test]
    async fn append_propagates_store_error() {
        let store = RevocationStore::new(Arc::new(FailingRevocationBackend::new()));
        let result = store.append("u1", RevocationReason::UserRequest, None).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
