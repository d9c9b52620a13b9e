//! Per-request session context.

use crate::traits::lock::Lock;
use axum::http::{HeaderMap, HeaderValue, header};
use cookie::{Cookie, CookieJar};

/// Cookies and lock state for the request currently being handled
///
/// Stores read the incoming cookies from here and queue response cookies on
/// it. Once the inner service has produced a response, the queued changes
/// are emitted as `Set-Cookie` headers.
#[derive(Default)]
pub struct SessionRequest {
    jar: CookieJar,
    lock: Option<Box<dyn Lock>>,
}

impl SessionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the cookies sent with a request
    ///
    /// Malformed cookie pairs are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = CookieJar::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(value).flatten() {
                jar.add_original(cookie.into_owned());
            }
        }

        Self { jar, lock: None }
    }

    /// Add an incoming cookie
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.jar
            .add_original(Cookie::new(name.into(), value.into()));
        self
    }

    /// Current value of a cookie, including changes queued for the response
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.jar.get(name).map(|cookie| cookie.value())
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    pub fn jar_mut(&mut self) -> &mut CookieJar {
        &mut self.jar
    }

    /// Whether a refresh lock is held on behalf of this request
    pub fn holds_lock(&self) -> bool {
        self.lock.is_some()
    }

    pub(crate) fn hold_lock(&mut self, lock: Box<dyn Lock>) {
        self.lock = Some(lock);
    }

    pub(crate) fn take_lock(&mut self) -> Option<Box<dyn Lock>> {
        self.lock.take()
    }

    /// `Set-Cookie` values for every cookie changed during the request
    pub fn set_cookie_headers(&self) -> Vec<HeaderValue> {
        self.jar
            .delta()
            .filter_map(|cookie| match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(cookie = %cookie.name(), error = %e, "Dropping unencodable cookie");
                    None
                }
            })
            .collect()
    }

    /// Append the queued cookie changes to response headers
    pub fn write_set_cookies(&self, headers: &mut HeaderMap) {
        for value in self.set_cookie_headers() {
            headers.append(header::SET_COOKIE, value);
        }
    }
}
