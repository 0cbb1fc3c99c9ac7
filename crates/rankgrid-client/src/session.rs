//! Explicit session context shared by every request.
//!
//! A [`Session`] owns the cookie jar, the cached CSRF token and the login
//! record. It is created once, handed to [`crate::RankingClient`] as an
//! `Arc`, and read through immutable [`SessionSnapshot`]s when rendering.
//! [`StoredSession`] is the serialisable form a front end can persist between
//! runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
struct AuthRecord {
    authenticated: bool,
    email: Option<String>,
    logged_out_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct JarCookie {
    value: String,
    expires: Option<DateTime<Utc>>,
}

impl JarCookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_none_or(|at| at > now)
    }
}

/// Cookie jar, CSRF token and login state for one user of one service.
///
/// The jar is keyed by cookie name only: the client talks to a single
/// origin, so domain and path attributes are not tracked. Expiry is.
pub struct Session {
    cookies: Mutex<BTreeMap<String, JarCookie>>,
    csrf: tokio::sync::Mutex<Option<String>>,
    auth: Mutex<AuthRecord>,
    quiescence: Duration,
}

/// Read-only view of a [`Session`] at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub authenticated: bool,
    pub email: Option<String>,
    pub csrf_cached: bool,
    pub logged_out_at: Option<DateTime<Utc>>,
}

/// Persistable form of a [`Session`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    /// Expiry of the cookies that carry one; the rest last until logout.
    #[serde(default)]
    pub cookie_expires: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub logged_out_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .field("cookie_expires", &self.cookie_expires)
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "[redacted]"))
            .field("authenticated", &self.authenticated)
            .field("email", &self.email)
            .field("logged_out_at", &self.logged_out_at)
            .finish()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("snapshot", &self.snapshot())
            .field("quiescence", &self.quiescence)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    /// Empty, logged-out session. `quiescence` is how long auth re-checks
    /// stay suppressed after a logout.
    #[must_use]
    pub fn new(quiescence: Duration) -> Self {
        Self::restore(StoredSession::default(), quiescence)
    }

    #[must_use]
    pub fn restore(stored: StoredSession, quiescence: Duration) -> Self {
        let cookies = stored
            .cookies
            .into_iter()
            .map(|(name, value)| {
                let expires = stored.cookie_expires.get(&name).copied();
                (name, JarCookie { value, expires })
            })
            .collect();
        Self {
            cookies: Mutex::new(cookies),
            csrf: tokio::sync::Mutex::new(stored.csrf_token),
            auth: Mutex::new(AuthRecord {
                authenticated: stored.authenticated,
                email: stored.email,
                logged_out_at: stored.logged_out_at,
            }),
            quiescence,
        }
    }

    pub async fn export(&self) -> StoredSession {
        let csrf_token = self.csrf.lock().await.clone();
        let now = Utc::now();
        let mut cookies = BTreeMap::new();
        let mut cookie_expires = BTreeMap::new();
        for (name, cookie) in lock(&self.cookies).iter() {
            if !cookie.is_live(now) {
                continue;
            }
            if let Some(at) = cookie.expires {
                cookie_expires.insert(name.clone(), at);
            }
            cookies.insert(name.clone(), cookie.value.clone());
        }
        let auth = lock(&self.auth).clone();
        StoredSession {
            cookies,
            cookie_expires,
            csrf_token,
            authenticated: auth.authenticated,
            email: auth.email,
            logged_out_at: auth.logged_out_at,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let auth = lock(&self.auth).clone();
        // A held lock means a fetch is in flight, so nothing is cached yet.
        let csrf_cached = self.csrf.try_lock().is_ok_and(|token| token.is_some());
        SessionSnapshot {
            authenticated: auth.authenticated,
            email: auth.email,
            csrf_cached,
            logged_out_at: auth.logged_out_at,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        lock(&self.auth).authenticated
    }

    /// Whether an auth check may run at `now`.
    ///
    /// Returns `false` for the quiescence window after a logout so a stale
    /// check cannot flip the session back to logged in.
    #[must_use]
    pub fn should_check_auth(&self, now: DateTime<Utc>) -> bool {
        match lock(&self.auth).logged_out_at {
            None => true,
            Some(at) => (now - at)
                .to_std()
                .is_ok_and(|elapsed| elapsed >= self.quiescence),
        }
    }

    /// Drop cookies, the cached CSRF token and the login record, and start
    /// the post-logout quiescence window at `now`.
    pub async fn clear(&self, now: DateTime<Utc>) {
        *self.csrf.lock().await = None;
        lock(&self.cookies).clear();
        *lock(&self.auth) = AuthRecord {
            authenticated: false,
            email: None,
            logged_out_at: Some(now),
        };
    }

    pub(crate) fn mark_authenticated(&self, email: Option<String>) {
        let mut auth = lock(&self.auth);
        auth.authenticated = true;
        auth.email = email;
        auth.logged_out_at = None;
    }

    pub(crate) fn mark_unauthenticated(&self) {
        let mut auth = lock(&self.auth);
        auth.authenticated = false;
        auth.email = None;
    }

    pub(crate) fn csrf_slot(&self) -> &tokio::sync::Mutex<Option<String>> {
        &self.csrf
    }
}

/// One `Set-Cookie` header, reduced to what the jar keeps.
#[derive(Debug, PartialEq, Eq)]
struct SetCookie {
    name: String,
    value: String,
    expires: Option<DateTime<Utc>>,
}

/// Parse one `Set-Cookie` header received at `now`.
///
/// `Max-Age` takes precedence over `Expires`; a non-positive `Max-Age` or a
/// past `Expires` yields an expiry at or before `now`.
fn parse_set_cookie(raw: &str, now: DateTime<Utc>) -> Option<SetCookie> {
    let parsed = cookie::Cookie::parse(raw).ok()?;
    let name = parsed.name().trim();
    if name.is_empty() {
        return None;
    }
    let expires = match parsed.max_age() {
        Some(max_age) if max_age.whole_seconds() <= 0 => Some(now),
        Some(max_age) => TimeDelta::try_seconds(max_age.whole_seconds())
            .and_then(|delta| now.checked_add_signed(delta)),
        None => parsed
            .expires_datetime()
            .and_then(|at| DateTime::from_timestamp(at.unix_timestamp(), 0)),
    };
    Some(SetCookie {
        name: name.to_string(),
        value: parsed.value().trim_matches('"').to_string(),
        expires,
    })
}

impl CookieStore for Session {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, _url: &Url) {
        let now = Utc::now();
        let mut jar = lock(&self.cookies);
        for header in cookie_headers {
            let Some(SetCookie {
                name,
                value,
                expires,
            }) = header
                .to_str()
                .ok()
                .and_then(|raw| parse_set_cookie(raw, now))
            else {
                continue;
            };
            let cookie = JarCookie { value, expires };
            if cookie.value.is_empty() || !cookie.is_live(now) {
                tracing::debug!(cookie = %name, "cookie cleared by server");
                jar.remove(&name);
            } else {
                jar.insert(name, cookie);
            }
        }
    }

    fn cookies(&self, _url: &Url) -> Option<HeaderValue> {
        let now = Utc::now();
        let mut jar = lock(&self.cookies);
        jar.retain(|_, cookie| cookie.is_live(now));
        if jar.is_empty() {
            return None;
        }
        let header = jar
            .iter()
            .map(|(name, cookie)| format!("{name}={}", cookie.value))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&header).ok()
    }
}
