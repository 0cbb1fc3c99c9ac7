//! Ranking checks and saved history.
//!
//! Submissions (`quick_check`, `grid_check`, `create_tasks`) are sent exactly
//! once: the service cannot tell a resubmission from a new job. Reads
//! (history, status, results, info) go through the retry policy.

use rankgrid_core::{
    CheckKind, HistoryEntry, HistoryResponse, RankForm, RankRequest, RankResult, TaskResults,
};
use serde_json::Value;

use crate::client::RankingClient;
use crate::error::ClientError;
use crate::types::{CreatedTasks, ResultsRequest, StatusRequest, StatusResponse};

const QUICK_CHECK_PATH: &str = "api/ranking/quick-check/";
const GRID_CHECK_PATH: &str = "api/ranking/grid-check/";
const CREATE_TASKS_PATH: &str = "api/ranking/create-tasks/";
const STATUS_PATH: &str = "api/ranking/status/";
const RESULTS_PATH: &str = "api/ranking/get-results/";
const HISTORY_PATH: &str = "api/ranking/history/";
const INFO_PATH: &str = "api/ranking/info/";

/// Shortest server-side wait the results endpoint accepts, in seconds.
const RESULTS_MAX_WAIT_SECS: u64 = 60;
/// Shortest provider poll interval the results endpoint accepts, in seconds.
const RESULTS_POLL_INTERVAL_SECS: u64 = 30;

impl RankingClient {
    /// Validate `form` and submit it as a `kind` check.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] without touching the network when
    /// the form is incomplete or out of range, otherwise whatever
    /// [`RankingClient::submit`] returns.
    pub async fn submit_form(
        &self,
        form: &RankForm,
        kind: CheckKind,
    ) -> Result<RankResult, ClientError> {
        let request = form.compose(kind)?;
        self.submit(&request).await
    }

    /// Send `request` to the endpoint matching its [`CheckKind`].
    ///
    /// # Errors
    ///
    /// - [`ClientError::CsrfUnavailable`] if no anti-forgery token could be
    ///   obtained; the check is not sent.
    /// - [`ClientError::Unauthenticated`] if the session is not logged in.
    /// - [`ClientError::Remote`] with the service's message on other failures.
    pub async fn submit(&self, request: &RankRequest) -> Result<RankResult, ClientError> {
        match request.kind {
            CheckKind::Quick => self.quick_check(request).await,
            CheckKind::Advanced => self.grid_check(request).await,
        }
    }

    /// `POST /api/ranking/quick-check/`: a 3x3 grid with a 5 km radius.
    ///
    /// # Errors
    ///
    /// See [`RankingClient::submit`].
    pub async fn quick_check(&self, request: &RankRequest) -> Result<RankResult, ClientError> {
        self.send_check(QUICK_CHECK_PATH, request).await
    }

    /// `POST /api/ranking/grid-check/` with the request's grid parameters.
    ///
    /// # Errors
    ///
    /// See [`RankingClient::submit`].
    pub async fn grid_check(&self, request: &RankRequest) -> Result<RankResult, ClientError> {
        self.send_check(GRID_CHECK_PATH, request).await
    }

    async fn send_check(&self, path: &str, request: &RankRequest) -> Result<RankResult, ClientError> {
        tracing::info!(
            kind = %request.kind,
            business = %request.business_name,
            grid_size = request.effective_grid_size(),
            radius_km = request.effective_radius_km(),
            "submitting ranking check"
        );
        let mut result: RankResult = self.post_once(path, request).await?;
        result.ensure_rank_map(request.target_domain.as_deref());

        let summary = result.summary();
        tracing::info!(
            business = %request.business_name,
            completed = summary.completed_count,
            failed = summary.failed_count,
            pending = summary.pending_count,
            "ranking check answered"
        );
        Ok(result)
    }

    /// The most recent saved grid for `business_name`, if any.
    ///
    /// Returns `Ok(None)` without a request when the session is not logged
    /// in or the name is blank.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the history request fails.
    pub async fn latest_history(
        &self,
        business_name: &str,
    ) -> Result<Option<HistoryEntry>, ClientError> {
        let name = business_name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        if !self.session().is_authenticated() {
            tracing::debug!("not logged in, skipping history fetch");
            return Ok(None);
        }
        let response: HistoryResponse = self
            .get_json(HISTORY_PATH, &[("business_name", name)])
            .await?;
        Ok(response.results.into_iter().next())
    }

    /// `POST /api/ranking/create-tasks/`: queue the grid without waiting for
    /// any result.
    ///
    /// # Errors
    ///
    /// See [`RankingClient::submit`].
    pub async fn create_tasks(&self, request: &RankRequest) -> Result<CreatedTasks, ClientError> {
        let created: CreatedTasks = self.post_once(CREATE_TASKS_PATH, request).await?;
        tracing::info!(
            business = %created.business_name,
            task_count = created.task_ids.len(),
            "ranking tasks created"
        );
        Ok(created)
    }

    /// `POST /api/ranking/status/`: per-status counts for `task_ids`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails after retries.
    pub async fn task_status(&self, task_ids: &[String]) -> Result<StatusResponse, ClientError> {
        self.post_idempotent(STATUS_PATH, &StatusRequest { task_ids })
            .await
    }

    /// `POST /api/ranking/get-results/`: completed, failed and pending
    /// payloads for `task_ids`.
    ///
    /// Asks for the shortest server-side wait the service allows, so the
    /// call returns a snapshot instead of blocking until every task settles.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails after retries.
    pub async fn fetch_results(&self, task_ids: &[String]) -> Result<TaskResults, ClientError> {
        let body = ResultsRequest {
            task_ids,
            max_wait_time: RESULTS_MAX_WAIT_SECS,
            poll_interval: RESULTS_POLL_INTERVAL_SECS,
        };
        self.post_idempotent(RESULTS_PATH, &body).await
    }

    /// `GET /api/ranking/info/`: service version, provider connectivity and
    /// endpoint list.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails after retries.
    pub async fn service_info(&self) -> Result<Value, ClientError> {
        self.get_json(INFO_PATH, &[]).await
    }
}

/// Outcome of telling a [`HistoryFeed`] the current business name.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryUpdate {
    /// Same name as the last fetch; nothing was requested.
    Unchanged,
    /// Not logged in, or the name is blank; nothing was requested.
    Skipped,
    Fetched(Option<HistoryEntry>),
}

/// Re-fetches saved history whenever the business name changes.
///
/// The history display is independent of the live result: the feed only
/// tracks which name it last fetched for.
#[derive(Debug, Default)]
pub struct HistoryFeed {
    last_name: Option<String>,
}

impl HistoryFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch history for `business_name` unless it was the last name fetched.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the history request fails. The name is not
    /// recorded, so the next call retries it.
    pub async fn on_business_name(
        &mut self,
        client: &RankingClient,
        business_name: &str,
    ) -> Result<HistoryUpdate, ClientError> {
        let name = business_name.trim();
        if self.last_name.as_deref() == Some(name) {
            return Ok(HistoryUpdate::Unchanged);
        }
        if name.is_empty() || !client.session().is_authenticated() {
            return Ok(HistoryUpdate::Skipped);
        }
        let entry = client.latest_history(name).await?;
        self.last_name = Some(name.to_owned());
        Ok(HistoryUpdate::Fetched(entry))
    }
}
