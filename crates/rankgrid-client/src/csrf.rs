use serde::Deserialize;

use crate::client::RankingClient;
use crate::error::ClientError;

#[derive(Debug, Deserialize)]
struct CsrfTokenResponse {
    #[serde(rename = "csrfToken")]
    csrf_token: String,
}

impl RankingClient {
    /// The session's anti-forgery token, fetched on first use.
    ///
    /// The slot stays locked for the duration of the fetch, so concurrent
    /// callers wait for one request instead of each sending their own.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::CsrfUnavailable`] if the token endpoint fails
    /// or answers with an empty token.
    pub(crate) async fn csrf_token(&self) -> Result<String, ClientError> {
        let mut slot = self.session().csrf_slot().lock().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }

        let response: CsrfTokenResponse = self
            .get_json("api/get-csrf-token/", &[])
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "CSRF token fetch failed");
                ClientError::CsrfUnavailable(e.to_string())
            })?;
        let token = response.csrf_token.trim().to_owned();
        if token.is_empty() {
            return Err(ClientError::CsrfUnavailable(
                "service returned an empty token".to_owned(),
            ));
        }

        tracing::debug!("CSRF token cached for session");
        *slot = Some(token.clone());
        Ok(token)
    }

    pub(crate) async fn forget_csrf_token(&self) {
        *self.session().csrf_slot().lock().await = None;
    }
}
