//! Account and dashboard endpoints.
//!
//! These are opaque collaborators: responses come back as loosely typed
//! JSON, and only the login state the [`crate::Session`] needs is read out
//! of them.

use chrono::Utc;
use serde_json::{json, Value};

use crate::client::RankingClient;
use crate::error::ClientError;
use crate::types::{AuthStatus, LoginRequest, SignupRequest};

const LOGIN_PATH: &str = "api/accounts/login/";
const LOGOUT_PATH: &str = "api/accounts/logout/";
const CHECK_AUTH_PATH: &str = "api/accounts/check-auth/";
const SIGNUP_PATH: &str = "api/accounts/signup/";
const PRICING_PATH: &str = "api/accounts/pricing/";
const DASHBOARD_PATH: &str = "api/dashboard/data/";

impl RankingClient {
    /// Log in with email and password, marking the session authenticated.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] with the service's message when the
    /// credentials are rejected.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthStatus, ClientError> {
        let status: AuthStatus = self
            .post_once(LOGIN_PATH, &LoginRequest { email, password })
            .await?;
        let email = status.email().unwrap_or(email).to_owned();
        tracing::info!(%email, "logged in");
        self.session().mark_authenticated(Some(email));
        // The service rotates the CSRF token on login.
        self.forget_csrf_token().await;
        Ok(status)
    }

    /// Log out on the service, then clear the local session.
    ///
    /// The local session is cleared even when the request fails: a stale
    /// cookie must not keep the user logged in locally.
    ///
    /// # Errors
    ///
    /// Returns the request error after the session has been cleared.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let outcome = self.post_once::<_, Value>(LOGOUT_PATH, &json!({})).await;
        self.session().clear(Utc::now()).await;
        match outcome {
            Ok(_) => {
                tracing::info!("logged out");
                Ok(())
            }
            // Already logged out server-side: the goal is reached.
            Err(ClientError::Unauthenticated(_)) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "logout request failed, local session cleared anyway");
                Err(e)
            }
        }
    }

    /// Ask the service whether the session is still logged in.
    ///
    /// Returns the local state without a request during the quiescence
    /// window after a logout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on failures other than a 401/403, which map
    /// to `Ok(false)`.
    pub async fn check_auth(&self) -> Result<bool, ClientError> {
        let session = self.session();
        if !session.should_check_auth(Utc::now()) {
            tracing::debug!("auth check suppressed after logout");
            return Ok(session.is_authenticated());
        }
        match self.get_json::<AuthStatus>(CHECK_AUTH_PATH, &[]).await {
            Ok(status) if status.authenticated => {
                session.mark_authenticated(status.email().map(str::to_owned));
                Ok(true)
            }
            Ok(_) | Err(ClientError::Unauthenticated(_)) => {
                session.mark_unauthenticated();
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Create an account on `pricing_plan`. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] with the service's message when the
    /// signup is rejected.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        pricing_plan: &str,
    ) -> Result<AuthStatus, ClientError> {
        let status: AuthStatus = self
            .post_once(
                SIGNUP_PATH,
                &SignupRequest {
                    email,
                    password,
                    pricing_plan,
                },
            )
            .await?;
        tracing::info!(%email, plan = pricing_plan, "account created");
        Ok(status)
    }

    /// Available plans, as `{"plans": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails after retries.
    pub async fn pricing(&self) -> Result<Value, ClientError> {
        self.get_json(PRICING_PATH, &[]).await
    }

    /// Dashboard data for the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unauthenticated`] when not logged in.
    pub async fn dashboard(&self) -> Result<Value, ClientError> {
        self.get_json(DASHBOARD_PATH, &[]).await
    }
}
