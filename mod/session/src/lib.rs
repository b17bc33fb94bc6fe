//! Session module — sealed-cookie validation and revocation in front of
//! privileged operations.
//!
//! # Components
//!
//! - **SealedSessionCodec** — encrypts the session payload into one
//!   opaque cookie string (AES-256-GCM, integrity-protected)
//! - **RevocationCache** — in-process TTL cache over revocation lookups
//! - **RevocationStore** — revocation events in the document store
//! - **IdentityGateway** — adapter over the identity provider
//! - **SessionValidator** — staged checks producing a principal or a
//!   typed failure
//! - **RevocationService** — revoke a subject's sessions, query state
//! - lifecycle — sliding-window refresh and expiry arithmetic
//!
//! # Usage
//!
//! ```ignore
//! use wicket_session::{SessionModule, SessionConfig};
//!
//! let module = SessionModule::new(backend, gateway, SessionConfig::default());
//! let router = module.routes(); // Mount under /session
//! ```

pub mod api;
pub mod cache;
pub mod gateway;
pub mod lifecycle;
pub mod model;
pub mod revocation;
pub mod seal;
pub mod service;
pub mod store;
pub mod validator;

use std::sync::Arc;

use axum::Router;

use wicket_core::Module;

pub use gateway::{GatewayError, IdentityGateway, IdentityRecord};
pub use model::{ClaimSet, RevocationEvent, RevocationMetadata, RevocationReason, SessionPayload, ValidatedPrincipal};
pub use revocation::RevocationService;
pub use seal::{SealError, SealedSessionCodec};
pub use service::{SessionConfig, SessionError, SessionService, Validated};
pub use store::{RevocationBackend, StoreError};
pub use validator::{CheckProfile, SessionValidator, ValidationError};

/// Session module implementing the Module trait.
///
/// Holds the SessionService and provides HTTP routes for the session
/// endpoints.
pub struct SessionModule {
    service: Arc<SessionService>,
}

impl SessionModule {
    /// Create a new SessionModule.
    pub fn new(
        backend: Arc<dyn store::RevocationBackend>,
        gateway: Arc<dyn gateway::IdentityGateway>,
        config: SessionConfig,
    ) -> Self {
        let service = SessionService::new(backend, gateway, config);
        Self { service }
    }

    /// Get a reference to the underlying SessionService.
    pub fn service(&self) -> &Arc<SessionService> {
        &self.service
    }
}

impl Module for SessionModule {
    fn name(&self) -> &str {
        "session"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}
