use std::sync::Arc;
use std::time::Duration;

use rankgrid_client::{ClientError, RankingClient, Session};
use rankgrid_core::AppConfig;

use crate::session_store;

/// Client plus the configuration it was built from, for one invocation.
pub(crate) struct Context {
    pub(crate) config: AppConfig,
    pub(crate) client: RankingClient,
}

impl Context {
    /// Restore the saved session and build a client around it.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file is unreadable or the client
    /// cannot be built.
    pub(crate) fn open(config: AppConfig) -> anyhow::Result<Self> {
        let stored = session_store::load(&config.session_path)?;
        let session = Arc::new(Session::restore(
            stored,
            Duration::from_millis(config.logout_quiescence_ms),
        ));
        let client = RankingClient::new(&config, session)
            .map_err(|e| anyhow::anyhow!("failed to build ranking client: {e}"))?;
        Ok(Self { config, client })
    }

    /// Save the session so the next invocation keeps the login and token.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be written.
    pub(crate) async fn persist(&self) -> anyhow::Result<()> {
        session_store::save(&self.config.session_path, self.client.session()).await
    }
}

/// Turn a client error into the message shown to the user. Auth failures
/// point at `login`, the command-line stand-in for the login page.
pub(crate) fn explain(err: ClientError) -> anyhow::Error {
    if err.is_auth() {
        anyhow::anyhow!("{err}; run `rankgrid login` first")
    } else {
        anyhow::Error::new(err)
    }
}
