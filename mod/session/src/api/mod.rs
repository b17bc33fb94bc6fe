mod cookie;
mod session;

use std::sync::Arc;

use axum::Router;

use crate::service::SessionService;

pub use cookie::{clear_session_cookie, read_cookie, session_cookie};

/// Shared application state.
pub type AppState = Arc<SessionService>;

/// Build the session API router.
///
/// All routes are relative — the caller nests them under `/session`.
pub fn build_router(svc: Arc<SessionService>) -> Router {
    Router::new()
        .nest("/session", session::routes())
        .with_state(svc)
}
