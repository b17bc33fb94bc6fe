use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a subject's sessions were revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    PasskeyRemoved,
    CredentialChange,
    AdminAction,
    UserRequest,
}

impl RevocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationReason::PasskeyRemoved => "passkey_removed",
            RevocationReason::CredentialChange => "credential_change",
            RevocationReason::AdminAction => "admin_action",
            RevocationReason::UserRequest => "user_request",
        }
    }
}

impl std::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional context attached to a revocation event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevocationMetadata {
    /// Device the action originated from (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Subject that performed the action, when not the subject itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
}

/// A durable record asserting that sessions created before `revoked_at`
/// are no longer valid for `subject`. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationEvent {
    /// Event id (UUIDv4, no dashes).
    pub id: String,

    /// Subject whose sessions are revoked.
    pub subject: String,

    /// Sessions created strictly before this instant are revoked.
    pub revoked_at: DateTime<Utc>,

    /// Why the revocation happened.
    pub reason: RevocationReason,

    /// Optional context (device, acting admin).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RevocationMetadata>,
}
