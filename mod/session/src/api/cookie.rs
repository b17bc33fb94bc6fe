//! Session cookie parsing and construction on raw headers.

use axum::http::header::{HeaderMap, HeaderValue, SET_COOKIE};
use axum::http::header::COOKIE;
use axum::response::Response;

use crate::lifecycle::STANDARD_MAX_AGE_DAYS;

/// Extract the named cookie's value from the Cookie header.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';')
        .map(str::trim)
        .find_map(|pair| {
            pair.strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('='))
                .map(str::to_string)
        })
}

/// Set-Cookie value carrying a sealed session.
///
/// httpOnly so scripts never see it; SameSite=Lax so top-level
/// navigations still carry it; Max-Age is the standard session lifetime.
pub fn session_cookie(name: &str, sealed: &str) -> String {
    let max_age = STANDARD_MAX_AGE_DAYS * 86400;
    format!("{name}={sealed}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax")
}

/// Set-Cookie value that clears the session.
pub fn clear_session_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

/// Append a Set-Cookie header to a response. A sealed value is always a
/// valid header; anything else is a bug worth a log line, not a panic.
pub fn append_set_cookie(resp: &mut Response, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            resp.headers_mut().append(SET_COOKIE, v);
        }
        Err(e) => {
            tracing::error!("unrepresentable Set-Cookie value: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookie: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        h
    }

    #[test]
    fn reads_named_cookie_among_others() {
        let h = headers("theme=dark; session=abc123; lang=en");
        assert_eq!(read_cookie(&h, "session").as_deref(), Some("abc123"));
    }

    #[test]
    fn prefix_named_cookies_do_not_match() {
        let h = headers("sessionx=nope; session=yes");
        assert_eq!(read_cookie(&h, "session").as_deref(), Some("yes"));
    }

    #[test]
    fn missing_cookie_is_none() {
        let h = headers("theme=dark");
        assert_eq!(read_cookie(&h, "session"), None);
        assert_eq!(read_cookie(&HeaderMap::new(), "session"), None);
    }

    #[test]
    fn session_cookie_attributes() {
        let c = session_cookie("session", "sealed-blob");
        assert!(c.starts_with("session=sealed-blob; "));
        assert!(c.contains("HttpOnly"));
        assert!(c.contains("SameSite=Lax"));
        assert!(c.contains("Path=/"));
        assert!(c.contains(&format!("Max-Age={}", 90 * 86400)));
    }

    #[test]
    fn clear_cookie_zeroes_max_age() {
        let c = clear_session_cookie("session");
        assert!(c.starts_with("session=; "));
        assert!(c.contains("Max-Age=0"));
    }
}
