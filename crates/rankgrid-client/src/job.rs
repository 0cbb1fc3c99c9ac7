//! Following a submitted check until it settles.
//!
//! The service answers a check with whatever snapshot it has. By default
//! that snapshot is final. [`JobTracker`] is the opt-in alternative: it keeps
//! asking the status endpoint until nothing is pending, then pulls the
//! results, giving up after the [`PollPolicy`] budget.

use std::time::Duration;

use rankgrid_core::{AppConfig, RankResult, TaskResults};

use crate::client::RankingClient;
use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Submitted,
    /// Tasks still pending; `attempt` status polls spent so far.
    Polling { attempt: u32 },
    Completed,
    Failed(String),
    TimedOut,
}

impl JobState {
    /// `true` for states no further poll can change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed(_) | JobState::TimedOut
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Idle => write!(f, "idle"),
            JobState::Submitted => write!(f, "submitted"),
            JobState::Polling { attempt } => write!(f, "polling (attempt {attempt})"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed(reason) => write!(f, "failed: {reason}"),
            JobState::TimedOut => write!(f, "timed out"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollPolicy {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            max_wait: Duration::from_secs(config.poll_max_wait_secs),
        }
    }

    /// Status polls allowed before giving up: `max_wait / interval`, at
    /// least one.
    #[must_use]
    pub fn max_polls(&self) -> u32 {
        if self.interval.is_zero() {
            return 1;
        }
        let polls = self.max_wait.as_millis() / self.interval.as_millis().max(1);
        u32::try_from(polls).unwrap_or(u32::MAX).max(1)
    }
}

/// State machine over one ranking job.
#[derive(Debug)]
pub struct JobTracker {
    state: JobState,
    policy: PollPolicy,
    attempts: u32,
    target_domain: Option<String>,
    result: Option<RankResult>,
}

impl JobTracker {
    #[must_use]
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            state: JobState::Idle,
            policy,
            attempts: 0,
            target_domain: None,
            result: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Latest snapshot of the job, if one has been observed.
    #[must_use]
    pub fn result(&self) -> Option<&RankResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn into_result(self) -> Option<RankResult> {
        self.result
    }

    /// Record that a check was sent. Ranks in later snapshots are computed
    /// for `target_domain`.
    pub fn submitted(&mut self, target_domain: Option<&str>) {
        self.state = JobState::Submitted;
        self.attempts = 0;
        self.target_domain = target_domain.map(str::to_owned);
        self.result = None;
    }

    /// Take in a snapshot and move to the state it implies.
    pub fn observe(&mut self, result: RankResult) -> &JobState {
        self.state = if result.is_failure() {
            JobState::Failed(
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "the service reported the job as failed".to_owned()),
            )
        } else if result.summary().is_settled() {
            JobState::Completed
        } else {
            JobState::Polling {
                attempt: self.attempts,
            }
        };
        self.result = Some(result);
        &self.state
    }

    /// One status poll. Pulls the results once the status endpoint reports
    /// nothing pending. Does nothing outside [`JobState::Polling`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if a status or results request fails. The
    /// state is left unchanged so the caller may poll again.
    pub async fn poll(&mut self, client: &RankingClient) -> Result<&JobState, ClientError> {
        if !matches!(self.state, JobState::Polling { .. }) {
            return Ok(&self.state);
        }
        let Some(task_ids) = self
            .result
            .as_ref()
            .map(|r| r.task_ids.clone())
            .filter(|ids| !ids.is_empty())
        else {
            self.state = JobState::Failed("the job has no task ids to poll".to_owned());
            return Ok(&self.state);
        };
        if self.attempts >= self.policy.max_polls() {
            self.state = JobState::TimedOut;
            return Ok(&self.state);
        }

        self.attempts += 1;
        let status = client.task_status(&task_ids).await?;
        // An error envelope says nothing about the tasks, so keep polling.
        let settled = !status.is_error()
            && status.task_status.is_none_or(|counts| counts.is_settled());
        tracing::debug!(
            attempt = self.attempts,
            max_polls = self.policy.max_polls(),
            settled,
            "polled job status"
        );

        if settled {
            let fetched = client.fetch_results(&task_ids).await?;
            self.merge(fetched);
        } else if self.attempts >= self.policy.max_polls() {
            tracing::warn!(attempts = self.attempts, "job still pending, giving up");
            self.state = JobState::TimedOut;
        } else {
            self.state = JobState::Polling {
                attempt: self.attempts,
            };
        }
        Ok(&self.state)
    }

    /// Poll at the policy interval until the job reaches a terminal state.
    ///
    /// # Errors
    ///
    /// Returns the first [`ClientError`] from [`JobTracker::poll`].
    pub async fn wait(&mut self, client: &RankingClient) -> Result<&JobState, ClientError> {
        while matches!(self.state, JobState::Polling { .. }) {
            tokio::time::sleep(self.policy.interval).await;
            self.poll(client).await?;
        }
        Ok(&self.state)
    }

    fn merge(&mut self, fetched: TaskResults) {
        let Some(mut result) = self.result.take() else {
            return;
        };
        // Counts now come from the fresh breakdown, not the first snapshot.
        result.summary = None;
        result.results = Some(fetched);
        let rebuilt = result.build_rank_map(self.target_domain.as_deref());
        if !rebuilt.is_empty() {
            result.rank_map = Some(rebuilt);
        }
        self.observe(result);
    }
}
