//! Text rendering of ranking results, history and session state.
//!
//! Every function here is a pure function of the data passed in and returns
//! the rendered text; the command handlers decide where it is printed.

use std::fmt::Write as _;

use rankgrid_client::SessionSnapshot;
use rankgrid_core::{CellStatus, GridPoint, HistoryEntry, RankCell, RankResult, TaskResults};
use serde_json::Value;

/// Rank placeholder for cells with no rank.
const PLACEHOLDER: &str = "\u{2014}";
/// Largest grid side the service accepts; bigger values are display noise.
const MAX_GRID_SIDE: usize = 10;
const TASK_ID_CHARS: usize = 8;

fn status_label(cell: Option<&RankCell>) -> &'static str {
    match cell {
        Some(RankCell {
            status: CellStatus::Completed,
            rank: Some(_),
            ..
        }) => "ranked",
        Some(RankCell {
            status: CellStatus::Completed,
            ..
        }) => "completed",
        Some(RankCell {
            status: CellStatus::Failed,
            ..
        }) => "failed",
        Some(RankCell {
            status: CellStatus::Pending,
            ..
        })
        | None => "pending",
    }
}

fn rank_label(cell: Option<&RankCell>) -> String {
    cell.and_then(|c| c.rank)
        .map_or_else(|| PLACEHOLDER.to_string(), |r| format!("#{r}"))
}

/// Side length to lay the grid out with: the declared size, or the smallest
/// square that holds every cell when the size is missing.
fn grid_side(declared: u32, cell_count: usize) -> usize {
    let declared = usize::try_from(declared).unwrap_or(MAX_GRID_SIDE);
    let side = if declared > 0 {
        declared
    } else {
        (1..=MAX_GRID_SIDE)
            .find(|n| n * n >= cell_count)
            .unwrap_or(MAX_GRID_SIDE)
    };
    side.min(MAX_GRID_SIDE)
}

/// Lay `cells` out as a `side x side` square in sequence order.
///
/// Positions past the end of `cells` render as pending; cells past
/// `side * side` are not shown.
fn render_cells(declared_size: u32, cells: &[RankCell]) -> String {
    let side = grid_side(declared_size, cells.len());
    if side == 0 || (declared_size == 0 && cells.is_empty()) {
        return "no grid cells to display\n".to_string();
    }
    let mut out = String::new();
    for row in 0..side {
        let line = (0..side)
            .map(|col| {
                let cell = cells.get(row * side + col);
                format!("[{:^5}{:^11}]", rank_label(cell), status_label(cell))
            })
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "{line}");
    }
    out
}

/// The rank grid for a live result, sized by `grid_parameters.size`.
#[must_use]
pub fn render_rank_grid(result: &RankResult) -> String {
    let cells = result.rank_map.as_deref().unwrap_or_default();
    render_cells(result.grid_parameters.size, cells)
}

fn short_id(task_id: &str) -> String {
    task_id.chars().take(TASK_ID_CHARS).collect()
}

/// Completed, failed and pending tasks by truncated id.
#[must_use]
pub fn render_task_lists(results: &TaskResults) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Completed ({})", results.completed.len());
    for (id, raw) in &results.completed {
        match TaskResults::completed_items_count(raw) {
            Some(n) => {
                let _ = writeln!(out, "  {:<10}{n} items", short_id(id));
            }
            None => {
                let _ = writeln!(out, "  {}", short_id(id));
            }
        }
    }

    let _ = writeln!(out, "Failed ({})", results.failed.len());
    for (id, raw) in &results.failed {
        let message = TaskResults::failure_message(raw).unwrap_or(PLACEHOLDER);
        let _ = writeln!(out, "  {:<10}{message}", short_id(id));
    }

    let _ = writeln!(out, "Pending ({})", results.pending.len());
    for id in &results.pending {
        let _ = writeln!(out, "  {}", short_id(id));
    }
    out
}

/// Header block: business, grid parameters, counts and timing.
#[must_use]
pub fn render_summary(result: &RankResult) -> String {
    let summary = result.summary();
    let mut out = String::new();
    let name = if result.business_name.is_empty() {
        PLACEHOLDER
    } else {
        result.business_name.as_str()
    };
    let _ = writeln!(out, "Business: {name}");
    let _ = writeln!(
        out,
        "Center: {:.6}, {:.6}",
        result.center_coordinates.lat, result.center_coordinates.lng
    );
    let _ = writeln!(
        out,
        "Grid: {size}x{size}, {radius} km radius",
        size = result.grid_parameters.size,
        radius = result.grid_parameters.radius_km
    );
    let total = summary
        .total_tasks
        .map_or_else(|| PLACEHOLDER.to_string(), |n| n.to_string());
    let _ = writeln!(
        out,
        "Tasks: {total} total, {} completed, {} failed, {} pending",
        summary.completed_count, summary.failed_count, summary.pending_count
    );
    if let Some(metadata) = &result.metadata {
        let _ = writeln!(
            out,
            "Duration: {:.1}s ({})",
            metadata.total_duration_seconds,
            if metadata.success { "success" } else { "failed" }
        );
    }
    if let Some(error) = &result.error {
        let _ = writeln!(out, "Error: {error}");
    }
    out
}

/// The most recent saved grid, shown beneath the live result.
#[must_use]
pub fn render_history(entry: &HistoryEntry) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Last saved grid: {} (job {})",
        entry.created_at.format("%Y-%m-%d %H:%M UTC"),
        entry.job_id
    );
    let _ = writeln!(
        out,
        "Grid: {size}x{size}, {radius} km radius, target {target}",
        size = entry.grid_parameters.size,
        radius = entry.grid_parameters.radius_km,
        target = entry.target_domain.as_deref().unwrap_or(PLACEHOLDER)
    );
    out.push_str(&render_cells(entry.grid_parameters.size, &entry.rank_map));
    out
}

#[must_use]
pub fn render_session(snapshot: &SessionSnapshot) -> String {
    if snapshot.authenticated {
        let email = snapshot.email.as_deref().unwrap_or(PLACEHOLDER);
        return format!("Logged in as {email}\n");
    }
    match snapshot.logged_out_at {
        Some(at) => format!(
            "Not logged in (logged out {})\n",
            at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => "Not logged in\n".to_string(),
    }
}

/// Planned grid points as a table, in the order tasks would be created.
#[must_use]
pub fn render_preview(points: &[GridPoint], zoom: u8) -> String {
    let mut out = format!("{:<6}{:<14}{:<14}API COORDINATE\n", "CELL", "LAT", "LNG");
    for (idx, point) in points.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:<6}{:<14.6}{:<14.6}{}",
            idx + 1,
            point.lat,
            point.lng,
            rankgrid_core::format_api_coordinate(*point, zoom)
        );
    }
    out
}

/// `{"plans": [...]}` as a table.
#[must_use]
pub fn render_pricing(pricing: &Value) -> String {
    let plans = pricing
        .get("plans")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if plans.is_empty() {
        return "no plans available\n".to_string();
    }
    let field = |plan: &Value, key: &str| {
        plan.get(key)
            .and_then(Value::as_str)
            .unwrap_or(PLACEHOLDER)
            .to_string()
    };
    let mut out = format!("{:<12}{:<18}{:<14}FEATURES\n", "ID", "NAME", "PRICE");
    for plan in plans {
        let features = plan
            .get("features")
            .and_then(Value::as_array)
            .map(|f| {
                f.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<12}{:<18}{:<14}{features}",
            field(plan, "id"),
            field(plan, "name"),
            field(plan, "price")
        );
    }
    out
}

#[cfg(test)]
#[path = "present_test.rs"]
mod tests;
