//! HTTP client for the local ranking grid service.
//!
//! [`RankingClient`] submits quick and advanced ranking checks, fetches
//! saved history, and talks to the account endpoints. Every request goes
//! through an explicit [`Session`] that owns the cookies, the lazily fetched
//! CSRF token, and the login state. [`JobTracker`] follows a submitted job
//! until it settles or the poll budget runs out.

pub mod accounts;
pub mod client;
mod csrf;
pub mod error;
pub mod job;
pub mod ranking;
pub(crate) mod retry;
pub mod session;
pub mod types;

pub use client::RankingClient;
pub use error::ClientError;
pub use job::{JobState, JobTracker, PollPolicy};
pub use ranking::{HistoryFeed, HistoryUpdate};
pub use session::{Session, SessionSnapshot, StoredSession};
pub use types::{AuthStatus, CreatedTasks, StatusResponse, TaskStatusCounts};
