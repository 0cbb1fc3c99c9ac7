use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root of the remote service, e.g. `https://app.example.com`.
    pub base_url: String,
    pub env: Environment,
    pub log_level: String,
    /// Ranking checks block server-side until the grid finishes, so this is
    /// much longer than a typical API timeout.
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub session_path: PathBuf,
    pub logout_quiescence_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub poll_interval_secs: u64,
    pub poll_max_wait_secs: u64,
}

