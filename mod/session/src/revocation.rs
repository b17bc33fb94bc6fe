//! Revocation service — cache-fronted revocation queries plus the
//! append-then-invalidate write path.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cache::RevocationCache;
use crate::model::{RevocationEvent, RevocationMetadata, RevocationReason};
use crate::store::{RevocationBackend, RevocationStore, StoreError};

/// Public API to revoke a subject's sessions and query revocation state.
/// Used inside the validation pipeline and standalone.
pub struct RevocationService {
    store: RevocationStore,
    cache: RevocationCache,
}

impl RevocationService {
    pub fn new(backend: Arc<dyn RevocationBackend>, cache: RevocationCache) -> Self {
        Self {
            store: RevocationStore::new(backend),
            cache,
        }
    }

    /// Whether a session with the given epoch (its created-at string) is
    /// revoked for `subject`.
    ///
    /// No epoch means a legacy session from before epoch stamping: those
    /// pass. Cache hits are served directly; misses query the store
    /// (failing open) and cache the result, true negatives included.
    pub async fn is_revoked(&self, subject: &str, session_epoch: Option<&str>) -> bool {
        let Some(epoch) = session_epoch else {
            return false;
        };

        if let Some(hit) = self.cache.get(subject, epoch) {
            return hit.revoked;
        }

        let since = match DateTime::parse_from_rfc3339(epoch) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!("unparsable session epoch for subject {subject}: {e}; failing open");
                return false;
            }
        };

        let revoked = self.store.has_revocation_after(subject, since).await;
        self.cache.put(subject, epoch, revoked);
        revoked
    }

    /// Append a revocation event, then purge the subject's cache entries.
    ///
    /// Invalidation happens only after the append is durable: once this
    /// returns Ok, no subsequent `is_revoked` for the subject can be
    /// served from an entry populated before the event. On append failure
    /// the error propagates and the cache is left untouched — existing
    /// entries still reflect the store.
    pub async fn revoke(
        &self,
        subject: &str,
        reason: RevocationReason,
        metadata: Option<RevocationMetadata>,
    ) -> Result<RevocationEvent, StoreError> {
        let event = self.store.append(subject, reason, metadata).await?;
        self.cache.invalidate_subject(subject);
        Ok(event)
    }
}
