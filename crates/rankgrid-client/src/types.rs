//! Response types for the endpoints the client reads beyond the check
//! payloads in `rankgrid_core::result`.
//!
//! Account endpoints are opaque collaborators: only the fields the session
//! needs are typed, the rest is kept as raw JSON.

use rankgrid_core::{Coordinates, GridParameters};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Answer from `GET /api/accounts/check-auth/`, `login/` and `signup/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
}

impl AuthStatus {
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.user.as_ref()?.get("email")?.as_str()
    }
}

// ---------------------------------------------------------------------------
// Split workflow
// ---------------------------------------------------------------------------

/// `POST /api/ranking/create-tasks/`: tasks queued with the provider, no
/// results yet.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreatedTasks {
    #[serde(default)]
    pub task_ids: Vec<String>,
    /// Provider coordinate strings, aligned with `task_ids`.
    #[serde(default)]
    pub coordinates: Vec<String>,
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub center_coordinates: Coordinates,
    #[serde(default)]
    pub grid_parameters: GridParameters,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TaskStatusCounts {
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub unknown: u32,
    #[serde(default)]
    pub total: u32,
}

impl TaskStatusCounts {
    /// Nothing pending and nothing the provider could not account for.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.unknown == 0
    }
}

/// `POST /api/ranking/status/`: counts only, no payloads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub task_count: Option<u32>,
    #[serde(default)]
    pub task_status: Option<TaskStatusCounts>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    /// `true` when the service could not report on the tasks.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.status.eq_ignore_ascii_case("error")
    }
}

/// Body for `POST /api/ranking/status/`.
#[derive(Debug, Serialize)]
pub(crate) struct StatusRequest<'a> {
    pub task_ids: &'a [String],
}

/// Body for `POST /api/ranking/get-results/`. The service accepts
/// `max_wait_time` in 60..=3600 and `poll_interval` in 30..=600 seconds.
#[derive(Debug, Serialize)]
pub(crate) struct ResultsRequest<'a> {
    pub task_ids: &'a [String],
    pub max_wait_time: u64,
    pub poll_interval: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignupRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub pricing_plan: &'a str,
}
