use crate::automation::AutomationSession;
use crate::error::RunError;
use crate::poster::{PollPoster, PollReceipt};
use crate::schedule::{self, Resolution, ScheduleError};
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing to post; carries the reason.
    Skipped(Resolution),
    Posted(PollReceipt),
}

/// Resolve this week's practice from `practices` without touching the browser.
pub async fn preview(practices: &Path, now: NaiveDateTime) -> Result<Resolution, ScheduleError> {
    let events = schedule::load_practices(practices).await?;
    let resolution = schedule::resolve(&events, now);
    log_resolution(&resolution);
    Ok(resolution)
}

/// One scheduled invocation: resolve the practice, then post the poll if there is one.
pub async fn run_once<S: AutomationSession>(
    practices: &Path,
    poster: &mut PollPoster<S>,
    now: NaiveDateTime,
) -> Result<RunOutcome, RunError> {
    let resolution = preview(practices, now).await?;
    match resolution {
        Resolution::ThisWeek { ref label, .. } => {
            let receipt = poster.post_poll(label).await?;
            Ok(RunOutcome::Posted(receipt))
        }
        other => Ok(RunOutcome::Skipped(other)),
    }
}

fn log_resolution(resolution: &Resolution) {
    match resolution {
        Resolution::NoUpcoming => warn!("No upcoming practice found in list"),
        Resolution::NotThisWeek { next, week_end } => warn!(
            "Next practice ({}) is not this week (week ends {}), skipping poll",
            next, week_end
        ),
        Resolution::ThisWeek { label, .. } => info!("Next practice: {}", label),
    }
}
