//! Job-status payloads returned by the ranking service.
//!
//! The service answers with whatever it has when the request returns: a
//! finished grid, a partly finished one, or an error envelope with only a few
//! fields. Every type here therefore deserialises leniently. Missing fields
//! take their defaults and unknown fields are ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::grid::DEFAULT_ZOOM;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum CellStatus {
    Completed,
    Failed,
    /// Also used for any status string the client does not recognise.
    #[default]
    Pending,
}

impl From<String> for CellStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "completed" => CellStatus::Completed,
            "failed" => CellStatus::Failed,
            _ => CellStatus::Pending,
        }
    }
}

impl std::fmt::Display for CellStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellStatus::Completed => write!(f, "completed"),
            CellStatus::Failed => write!(f, "failed"),
            CellStatus::Pending => write!(f, "pending"),
        }
    }
}

/// One grid cell: the rank the target domain reached at that point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankCell {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub status: CellStatus,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub zoom: Option<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GridParameters {
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub radius_km: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub total_tasks: Option<u32>,
    #[serde(default)]
    pub completed_count: u32,
    #[serde(default)]
    pub failed_count: u32,
    #[serde(default)]
    pub pending_count: u32,
    #[serde(default)]
    pub polls_performed: Option<u32>,
    #[serde(default)]
    pub elapsed_time_seconds: Option<f64>,
}

impl Summary {
    /// `true` once nothing is left pending.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.pending_count == 0
    }
}

/// Per-task breakdown: raw provider payloads keyed by task id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResults {
    #[serde(default)]
    pub completed: BTreeMap<String, Value>,
    #[serde(default)]
    pub failed: BTreeMap<String, Value>,
    #[serde(default)]
    pub pending: Vec<String>,
    #[serde(default)]
    pub summary: Summary,
}

impl TaskResults {
    /// Number of search results the provider returned for a completed task.
    #[must_use]
    pub fn completed_items_count(raw: &Value) -> Option<usize> {
        first_task_result(raw)
            .and_then(|r| {
                r.get("items")
                    .and_then(Value::as_array)
                    .map(Vec::len)
                    .or_else(|| {
                        r.get("items_count")
                            .and_then(Value::as_u64)
                            .and_then(|n| usize::try_from(n).ok())
                    })
            })
    }

    /// Provider status message for a failed task.
    #[must_use]
    pub fn failure_message(raw: &Value) -> Option<&str> {
        raw.get("tasks")
            .and_then(|t| t.get(0))
            .and_then(|t| t.get("status_message"))
            .or_else(|| raw.get("status_message"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub total_duration_seconds: f64,
    #[serde(default)]
    pub success: bool,
}

/// Snapshot of one ranking job as returned by quick-check or grid-check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankResult {
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub center_coordinates: Coordinates,
    #[serde(default)]
    pub grid_parameters: GridParameters,
    /// Provider coordinate strings (`"lat,lng,zoom"`), aligned with `task_ids`.
    #[serde(default)]
    pub grid_coordinates: Vec<String>,
    #[serde(default)]
    pub task_ids: Vec<String>,
    /// Top-level counts, when the service sends them outside `results`.
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(default)]
    pub results: Option<TaskResults>,
    #[serde(default)]
    pub rank_map: Option<Vec<RankCell>>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RankResult {
    /// Summary counts, from the service when it sent them, otherwise
    /// counted from the rank map.
    #[must_use]
    pub fn summary(&self) -> Summary {
        if let Some(summary) = &self.summary {
            return summary.clone();
        }
        if let Some(results) = &self.results {
            return results.summary.clone();
        }
        let mut summary = Summary::default();
        for cell in self.rank_map.iter().flatten() {
            match cell.status {
                CellStatus::Completed => summary.completed_count += 1,
                CellStatus::Failed => summary.failed_count += 1,
                CellStatus::Pending => summary.pending_count += 1,
            }
        }
        summary.total_tasks = self
            .rank_map
            .as_ref()
            .and_then(|m| u32::try_from(m.len()).ok());
        summary
    }

    /// `true` when the service reported the job itself as failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.metadata.as_ref().is_some_and(|m| !m.success)
    }

    /// Build the rank map client-side from task ids, coordinates and raw
    /// results, matching the order the service uses.
    ///
    /// Ranks are only computed when `target_domain` is given.
    #[must_use]
    pub fn build_rank_map(&self, target_domain: Option<&str>) -> Vec<RankCell> {
        let Some(results) = &self.results else {
            return Vec::new();
        };
        self.task_ids
            .iter()
            .enumerate()
            .map(|(index, task_id)| {
                let (lat, lng, zoom) = match self.grid_coordinates.get(index) {
                    Some(coord) => {
                        let (lat, lng, zoom) = parse_api_coordinate(coord);
                        (Some(lat), Some(lng), Some(zoom))
                    }
                    None => (None, None, None),
                };
                let (status, raw) = if let Some(raw) = results.completed.get(task_id) {
                    (CellStatus::Completed, Some(raw))
                } else if results.failed.contains_key(task_id) {
                    (CellStatus::Failed, None)
                } else {
                    (CellStatus::Pending, None)
                };
                let rank = match (raw, target_domain) {
                    (Some(raw), Some(domain)) => rank_for_domain(raw, domain),
                    _ => None,
                };
                RankCell {
                    index: Some(index),
                    task_id: task_id.clone(),
                    rank,
                    status,
                    lat,
                    lng,
                    zoom,
                }
            })
            .collect()
    }

    /// Fill in the rank map when the service left it out, or fill ranks it
    /// left empty for completed cells.
    pub fn ensure_rank_map(&mut self, target_domain: Option<&str>) {
        if self.rank_map.is_none() {
            let built = self.build_rank_map(target_domain);
            if !built.is_empty() {
                self.rank_map = Some(built);
            }
            return;
        }
        let (Some(domain), Some(results), Some(cells)) =
            (target_domain, &self.results, &mut self.rank_map)
        else {
            return;
        };
        for cell in cells.iter_mut() {
            if cell.rank.is_none() && cell.status == CellStatus::Completed {
                cell.rank = results
                    .completed
                    .get(&cell.task_id)
                    .and_then(|raw| rank_for_domain(raw, domain));
            }
        }
    }
}

/// A previously saved grid, as listed by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub job_id: i64,
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub center_coordinates: Coordinates,
    #[serde(default)]
    pub grid_parameters: GridParameters,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub target_domain: Option<String>,
    #[serde(default)]
    pub rank_map: Vec<RankCell>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub results: Vec<HistoryEntry>,
}

/// 1-based position of the first search result belonging to `target_domain`.
///
/// An item matches when its `domain` (or the host of its `url` or
/// `source_url`) contains the target, case-insensitively. A leading `www.`
/// on the target is ignored.
#[must_use]
pub fn rank_for_domain(raw: &Value, target_domain: &str) -> Option<u32> {
    let target = target_domain.trim().to_ascii_lowercase();
    let target = target.strip_prefix("www.").unwrap_or(&target);
    if target.is_empty() {
        return None;
    }
    let items = first_task_result(raw)?.get("items")?.as_array()?;
    items.iter().enumerate().find_map(|(idx, item)| {
        let domain = item
            .get("domain")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_ascii_lowercase)
            .or_else(|| host_of(item.get("url")))
            .or_else(|| host_of(item.get("source_url")))?;
        if domain.contains(target) {
            u32::try_from(idx + 1).ok()
        } else {
            None
        }
    })
}

fn first_task_result(raw: &Value) -> Option<&Value> {
    raw.get("tasks")?.get(0)?.get("result")?.get(0)
}

fn host_of(value: Option<&Value>) -> Option<String> {
    let url = reqwest::Url::parse(value?.as_str()?).ok()?;
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Parse `"lat,lng[,zoom]"`. Unparseable input falls back to the origin at
/// the default zoom, as the service does.
fn parse_api_coordinate(raw: &str) -> (f64, f64, u8) {
    let mut parts = raw.split(',').map(str::trim);
    let lat = parts.next().and_then(|p| p.parse::<f64>().ok());
    let lng = parts.next().and_then(|p| p.parse::<f64>().ok());
    match (lat, lng) {
        (Some(lat), Some(lng)) => {
            let zoom = parts
                .next()
                .and_then(|p| p.parse::<u8>().ok())
                .unwrap_or(DEFAULT_ZOOM);
            (lat, lng, zoom)
        }
        _ => (0.0, 0.0, DEFAULT_ZOOM),
    }
}

/// Accept RFC 3339 timestamps, and naive ISO timestamps taken to be UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
#[path = "result_test.rs"]
mod tests;
