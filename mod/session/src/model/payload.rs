use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wicket_core::now_rfc3339;

/// Well-known claim names.
///
/// The claim set is an open map; these are the keys the engine itself
/// interprets. Names are camelCase because they are a wire format shared
/// with the identity provider.
pub mod claim {
    pub const ADMIN: &str = "admin";
    pub const SIGNED_CONSENT_FORM: &str = "signedConsentForm";
    pub const PASSKEY_ENABLED: &str = "passkeyEnabled";
}

/// Open claim map attached to a session or identity record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeMap<String, serde_json::Value>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a claim value by name.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    /// Get a boolean claim. Missing or non-boolean claims read as false.
    pub fn get_bool(&self, name: &str) -> bool {
        self.0.get(name).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Set a claim value.
    pub fn set(&mut self, name: &str, value: impl Into<serde_json::Value>) {
        self.0.insert(name.to_string(), value.into());
    }

    /// Builder-style set, for constructing claim sets inline.
    pub fn with(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Merge another claim set into this one, overwriting existing keys.
    pub fn merge(&mut self, other: &ClaimSet) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn is_admin(&self) -> bool {
        self.get_bool(claim::ADMIN)
    }

    pub fn passkey_enabled(&self) -> bool {
        self.get_bool(claim::PASSKEY_ENABLED)
    }
}

/// The session state sealed into the cookie.
///
/// Owned by the client and untrusted until unsealed. A payload without a
/// subject id means "no session".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPayload {
    /// Subject (user) id.
    pub subject: String,

    /// Email at issuance (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name at issuance (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Claims copied from the identity record at issuance.
    #[serde(default)]
    pub claims: ClaimSet,

    /// Deployment environment this session was sealed in.
    pub environment: String,

    /// RFC 3339 timestamp of session creation. Doubles as the session
    /// epoch for revocation checks. None on sessions issued before
    /// creation stamping existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl SessionPayload {
    /// Create a fresh payload stamped with the current time.
    pub fn new(subject: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            name: None,
            claims: ClaimSet::new(),
            environment: environment.into(),
            created_at: Some(now_rfc3339()),
        }
    }

    /// Parse the creation timestamp. None if absent or unparsable.
    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Successful pipeline output. Constructed fresh per request.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedPrincipal {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub claims: ClaimSet,
}

impl ValidatedPrincipal {
    pub fn from_payload(payload: &SessionPayload) -> Self {
        Self {
            subject: payload.subject.clone(),
            email: payload.email.clone(),
            name: payload.name.clone(),
            claims: payload.claims.clone(),
        }
    }
}
