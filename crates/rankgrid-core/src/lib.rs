//! Domain types and configuration for the local ranking grid client.
//!
//! Nothing in this crate performs network I/O. [`RankForm`] turns raw
//! user-supplied fields into a [`RankRequest`]; [`RankResult`] and
//! [`HistoryEntry`] model what the remote service sends back.

pub mod app_config;
pub mod config;
pub mod grid;
pub mod request;
pub mod result;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use grid::{format_api_coordinate, grid_coordinates, GridPoint, DEFAULT_ZOOM};
pub use request::{
    CheckKind, Device, RankForm, RankRequest, ValidationError, QUICK_GRID_SIZE, QUICK_RADIUS_KM,
};
pub use result::{
    rank_for_domain, CellStatus, Coordinates, GridParameters, HistoryEntry, HistoryResponse,
    Metadata, RankCell, RankResult, Summary, TaskResults,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
