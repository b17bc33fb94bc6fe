//! Session lifetime arithmetic: sliding-window refresh, absolute expiry,
//! and the expiring-soon warning window.
//!
//! Every predicate has an `_at(now)` variant so boundary behavior is
//! testable without a clock.

use chrono::{DateTime, Duration, Utc};

use wicket_core::now_rfc3339;

use crate::model::SessionPayload;

/// Sliding refresh window: sessions older than this get restamped.
pub const REFRESH_AFTER_DAYS: i64 = 30;

/// Absolute max age of a standard session.
pub const STANDARD_MAX_AGE_DAYS: i64 = 90;

/// Absolute max age of an extended (passkey-backed) session.
pub const EXTENDED_MAX_AGE_DAYS: i64 = 365;

/// Sessions expiring within this window count as expiring soon.
pub const EXPIRY_WARNING_DAYS: i64 = 7;

/// Whether the sliding window should restamp the session.
///
/// True iff the session is strictly older than 30 days — a session
/// exactly 30 days old does not refresh. Sessions with no or an
/// unparsable created-at refresh too, which stamps legacy sessions.
pub fn should_refresh(created_at: Option<&str>) -> bool {
    should_refresh_at(created_at, Utc::now())
}

pub fn should_refresh_at(created_at: Option<&str>, now: DateTime<Utc>) -> bool {
    let Some(created) = parse(created_at) else {
        return true;
    };
    now - created > Duration::days(REFRESH_AFTER_DAYS)
}

/// Rewrite created-at to now, restarting both the sliding-refresh window
/// and the absolute-expiry window.
pub fn refresh(payload: &mut SessionPayload) {
    payload.created_at = Some(now_rfc3339());
}

/// Absolute expiry for a session created at `created_at`.
pub fn compute_expiry(created_at: DateTime<Utc>, extended: bool) -> DateTime<Utc> {
    let max_age_days = if extended {
        EXTENDED_MAX_AGE_DAYS
    } else {
        STANDARD_MAX_AGE_DAYS
    };
    created_at + Duration::days(max_age_days)
}

/// Whether the session expires within the warning window.
///
/// True iff the expiry is in the future and at most 7 days away. An
/// already-expired session is not "expiring soon".
pub fn is_expiring_soon(created_at: DateTime<Utc>, extended: bool) -> bool {
    is_expiring_soon_at(created_at, extended, Utc::now())
}

pub fn is_expiring_soon_at(created_at: DateTime<Utc>, extended: bool, now: DateTime<Utc>) -> bool {
    let expiry = compute_expiry(created_at, extended);
    expiry > now && expiry - now <= Duration::days(EXPIRY_WARNING_DAYS)
}

fn parse(created_at: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(created_at?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
