//! `check` and `preview` command handlers.
//!
//! A check runs the submission and the history lookup side by side: the
//! history shown beneath the result is whatever was saved before this run.

use clap::{Args, Subcommand};
use rankgrid_client::{JobState, JobTracker, PollPolicy};
use rankgrid_core::{CheckKind, GridPoint, RankForm};

use crate::context::{explain, Context};
use crate::present;

/// Fields shared by quick and advanced checks.
///
/// Values are taken as text and validated together, so a blank field is
/// reported like any other invalid input.
#[derive(Debug, Clone, Args)]
pub struct LocationArgs {
    /// Business name as listed on the map
    #[arg(long = "name", default_value = "")]
    pub business_name: String,
    /// Business latitude in decimal degrees
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub lat: String,
    /// Business longitude in decimal degrees
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub lng: String,
    /// Domain to find in the results (e.g. pizzaplace.com)
    #[arg(long, default_value = "")]
    pub target_domain: String,
    /// Keep polling until every task settles instead of showing one snapshot
    #[arg(long)]
    pub wait: bool,
}

/// Sub-commands available under `check`.
#[derive(Debug, Subcommand)]
pub enum CheckCommands {
    /// 3x3 grid, 5 km radius
    Quick {
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Custom grid size, radius, language and device
    Grid {
        #[command(flatten)]
        location: LocationArgs,
        /// Grid side length (2-5, default 3)
        #[arg(long, default_value = "")]
        grid_size: String,
        /// Radius in km (0.1-50, default 5)
        #[arg(long, default_value = "")]
        radius: String,
        /// Search language code (default en)
        #[arg(long, default_value = "")]
        language: String,
        /// desktop, mobile or tablet (default desktop)
        #[arg(long, default_value = "")]
        device: String,
        /// Map zoom for each grid point (1-20, default 15)
        #[arg(long, default_value = "")]
        zoom: String,
    },
}

impl CheckCommands {
    fn into_form(self) -> (CheckKind, RankForm, bool) {
        match self {
            CheckCommands::Quick { location } => {
                let wait = location.wait;
                (CheckKind::Quick, location_form(location), wait)
            }
            CheckCommands::Grid {
                location,
                grid_size,
                radius,
                language,
                device,
                zoom,
            } => {
                let wait = location.wait;
                let form = RankForm {
                    grid_size,
                    radius_km: radius,
                    language_code: language,
                    device,
                    zoom,
                    ..location_form(location)
                };
                (CheckKind::Advanced, form, wait)
            }
        }
    }
}

fn location_form(location: LocationArgs) -> RankForm {
    RankForm {
        business_name: location.business_name,
        business_lat: location.lat,
        business_lng: location.lng,
        target_domain: location.target_domain,
        ..RankForm::default()
    }
}

/// Validate, submit and render one ranking check.
///
/// # Errors
///
/// Returns an error if the form is invalid (before any request is made),
/// the user is not logged in, or the service rejects the check.
pub(crate) async fn run_check(ctx: &Context, command: CheckCommands) -> anyhow::Result<()> {
    let (kind, form, wait) = command.into_form();
    let request = form
        .compose(kind)
        .map_err(|e| anyhow::anyhow!("invalid form: {e}"))?;

    let client = &ctx.client;
    let (submitted, history) = tokio::join!(
        client.submit(&request),
        client.latest_history(&request.business_name)
    );
    // Keep the CSRF token and cookie updates even when the check failed.
    ctx.persist().await?;
    let mut result = submitted.map_err(explain)?;

    if wait {
        let mut tracker = JobTracker::new(PollPolicy::from_config(&ctx.config));
        tracker.submitted(request.target_domain.as_deref());
        tracker.observe(result);
        if matches!(tracker.state(), JobState::Polling { .. }) {
            println!("waiting for pending tasks...");
        }
        let state = tracker.wait(client).await.map_err(explain)?.clone();
        if state == JobState::TimedOut {
            println!("gave up waiting; showing the latest snapshot");
        }
        result = tracker
            .into_result()
            .ok_or_else(|| anyhow::anyhow!("job tracker lost its snapshot"))?;
    }

    print!("{}", present::render_summary(&result));
    println!();
    print!("{}", present::render_rank_grid(&result));
    if let Some(results) = &result.results {
        println!();
        print!("{}", present::render_task_lists(results));
    }

    match history {
        Ok(Some(entry)) => {
            println!();
            print!("{}", present::render_history(&entry));
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "history fetch failed"),
    }
    Ok(())
}

/// Show the most recent saved grid for `business_name`.
///
/// # Errors
///
/// Returns an error if the history request fails.
pub(crate) async fn run_history(ctx: &Context, business_name: &str) -> anyhow::Result<()> {
    if !ctx.client.session().is_authenticated() {
        anyhow::bail!("history is only available when logged in; run `rankgrid login` first");
    }
    match ctx
        .client
        .latest_history(business_name)
        .await
        .map_err(explain)?
    {
        Some(entry) => print!("{}", present::render_history(&entry)),
        None => println!("no saved grids for \"{}\"", business_name.trim()),
    }
    Ok(())
}

/// Print the grid points a check would use, without contacting the service.
pub(crate) fn run_preview(lat: f64, lng: f64, grid_size: u8, radius_km: f64, zoom: u8) {
    let points = rankgrid_core::grid_coordinates(GridPoint { lat, lng }, grid_size, radius_km);
    print!("{}", present::render_preview(&points, zoom));
}
