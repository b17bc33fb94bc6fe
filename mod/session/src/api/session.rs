//! Session endpoints: current principal, explicit refresh, and the
//! self/admin revocation operations.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use wicket_core::ServiceError;

use crate::api::{cookie, AppState};
use crate::lifecycle;
use crate::model::{ClaimSet, RevocationReason, SessionPayload};
use crate::validator::ValidationError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/refresh", post(refresh))
        .route("/revoke", post(revoke))
        .route("/admin/revoke", post(admin_revoke))
        .route("/admin/claims", put(set_claims))
}

/// Read and unseal the session cookie. An unseal failure counts as "no
/// session" at this boundary — the typed distinction matters to the
/// codec's callers, not to an HTTP 401.
fn read_payload(svc: &AppState, headers: &HeaderMap) -> Option<SessionPayload> {
    let sealed = cookie::read_cookie(headers, &svc.config().cookie_name)?;
    match svc.codec().unseal(&sealed) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::debug!("cookie unseal failed: {e}");
            None
        }
    }
}

/// Failure response, clearing the cookie when the session can never pass
/// again.
fn failure(svc: &AppState, err: ValidationError) -> Response {
    let clear = err.clears_session();
    let mut resp = ServiceError::from(err).into_response();
    if clear {
        cookie::append_set_cookie(
            &mut resp,
            &cookie::clear_session_cookie(&svc.config().cookie_name),
        );
    }
    resp
}

/// Re-seal a restamped payload into a Set-Cookie on the response.
fn carry_refreshed(svc: &AppState, resp: &mut Response, refreshed: Option<SessionPayload>) {
    let Some(renewed) = refreshed else { return };
    match svc.codec().seal(&renewed) {
        Ok(sealed) => cookie::append_set_cookie(
            resp,
            &cookie::session_cookie(&svc.config().cookie_name, &sealed),
        ),
        // The previous cookie stays valid; the refresh just didn't land.
        Err(e) => tracing::error!("re-seal after refresh failed: {e}"),
    }
}

/// GET /session/me — the validated principal, full check profile, plus
/// expiry info so clients can warn before the absolute window closes.
async fn me(State(svc): State<AppState>, headers: HeaderMap) -> Response {
    let payload = read_payload(&svc, &headers);
    match svc.require_auth_full(payload.as_ref(), true).await {
        Ok(validated) => {
            let mut body = serde_json::json!({ "principal": validated.principal });
            let created = payload.as_ref().and_then(|p| p.created_at_time());
            if let Some(created) = created {
                let extended = validated.principal.claims.passkey_enabled();
                body["expires_at"] =
                    serde_json::json!(lifecycle::compute_expiry(created, extended).to_rfc3339());
                body["expiring_soon"] =
                    serde_json::json!(lifecycle::is_expiring_soon(created, extended));
            }
            let mut resp = (StatusCode::OK, Json(body)).into_response();
            carry_refreshed(&svc, &mut resp, validated.refreshed);
            resp
        }
        Err(err) => failure(&svc, err),
    }
}

/// POST /session/refresh — explicit restamp outside the sliding window.
async fn refresh(State(svc): State<AppState>, headers: HeaderMap) -> Response {
    let Some(payload) = read_payload(&svc, &headers) else {
        return failure(&svc, ValidationError::Unauthenticated);
    };
    match svc
        .require_auth_with_revocation_check(Some(&payload), false)
        .await
    {
        Ok(validated) => {
            let renewed = svc.refresh_session_timestamp(&payload);
            let mut resp =
                (StatusCode::OK, Json(serde_json::json!(validated.principal))).into_response();
            carry_refreshed(&svc, &mut resp, Some(renewed));
            resp
        }
        Err(err) => failure(&svc, err),
    }
}

#[derive(Debug, Deserialize)]
struct RevokeRequest {
    #[serde(default)]
    reason: Option<RevocationReason>,
}

/// POST /session/revoke — revoke every session of the calling subject.
/// The current session is among them, so the cookie is cleared.
async fn revoke(
    State(svc): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RevokeRequest>>,
) -> Response {
    let payload = read_payload(&svc, &headers);
    let principal = match svc
        .require_auth_with_revocation_check(payload.as_ref(), false)
        .await
    {
        Ok(validated) => validated.principal,
        Err(err) => return failure(&svc, err),
    };

    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or(RevocationReason::UserRequest);

    match svc.revoke_my_sessions(&principal, reason).await {
        Ok(event) => {
            let mut resp =
                (StatusCode::OK, Json(serde_json::json!(event))).into_response();
            cookie::append_set_cookie(
                &mut resp,
                &cookie::clear_session_cookie(&svc.config().cookie_name),
            );
            resp
        }
        Err(err) => ServiceError::from(err).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct AdminRevokeRequest {
    subject: String,
    #[serde(default)]
    reason: Option<RevocationReason>,
}

/// POST /session/admin/revoke — revoke another subject's sessions.
async fn admin_revoke(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AdminRevokeRequest>,
) -> Response {
    let payload = read_payload(&svc, &headers);
    let admin = match svc.require_admin(payload.as_ref()).await {
        Ok(principal) => principal,
        Err(err) => return failure(&svc, err),
    };

    let reason = body.reason.unwrap_or(RevocationReason::AdminAction);
    match svc.admin_revoke_sessions(&admin, &body.subject, reason).await {
        Ok(event) => (StatusCode::OK, Json(serde_json::json!(event))).into_response(),
        Err(err) => ServiceError::from(err).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct SetClaimsRequest {
    subject: String,
    claims: ClaimSet,
}

/// PUT /session/admin/claims — sync provider-side claims for a subject.
async fn set_claims(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SetClaimsRequest>,
) -> Response {
    let payload = read_payload(&svc, &headers);
    if let Err(err) = svc.require_admin(payload.as_ref()).await {
        return failure(&svc, err);
    }

    match svc.set_claims(&body.subject, &body.claims).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => ServiceError::from(err).into_response(),
    }
}
