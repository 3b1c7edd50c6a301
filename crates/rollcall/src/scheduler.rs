use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use croner::Cron;
use rollcall_core::AutomationSession;
use rollcall_core::poster::PollPoster;
use rollcall_core::runner::{self, RunOutcome};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Cron-driven trigger. Runs are awaited inline, so two runs from one
/// scheduler never overlap.
pub struct Scheduler {
    expression: String,
    cron: Cron,
}

impl Scheduler {
    pub fn new(expression: &str) -> anyhow::Result<Self> {
        let cron = expression
            .parse::<Cron>()
            .map_err(|e| anyhow::anyhow!("Invalid cron expression '{}': {}", expression, e))?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> anyhow::Result<DateTime<Tz>> {
        self.cron
            .find_next_occurrence(after, false)
            .map_err(|e| anyhow::anyhow!("No next occurrence for '{}': {}", self.expression, e))
    }

    /// Fire on every occurrence until `shutdown` is cancelled. Failed runs are
    /// logged and the loop continues. A run in progress is allowed to finish.
    pub async fn serve<S: AutomationSession>(
        &self,
        practices: &Path,
        poster: &mut PollPoster<S>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        info!("Scheduler started with '{}'", self.expression);
        loop {
            let now = Local::now();
            let next = self.next_after(&now)?;
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!("Next run at {}", next.format("%Y-%m-%d %H:%M:%S"));

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.cancelled() => {
                    info!("Shutting down scheduler");
                    return Ok(());
                }
            }

            if !run_scheduled(practices, poster, Local::now().naive_local(), &shutdown).await {
                return Ok(());
            }
        }
    }
}

/// One scheduled run. Returns false once shutdown was requested, including
/// while the run was in progress.
pub async fn run_scheduled<S: AutomationSession>(
    practices: &Path,
    poster: &mut PollPoster<S>,
    now: NaiveDateTime,
    shutdown: &CancellationToken,
) -> bool {
    info!("Running scheduled poll");
    report(runner::run_once(practices, poster, now).await);
    if shutdown.is_cancelled() {
        info!("Shutdown requested during run, stopping scheduler");
        return false;
    }
    true
}

/// Cancels the returned token on Ctrl-C, or SIGTERM on unix.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("Received Ctrl-C"),
                        _ = sigterm.recv() => info!("Received SIGTERM"),
                    }
                }
                Err(e) => {
                    warn!("SIGTERM handler unavailable: {}", e);
                    if ctrl_c.await.is_err() {
                        return;
                    }
                    info!("Received Ctrl-C");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if ctrl_c.await.is_err() {
                return;
            }
            info!("Received Ctrl-C");
        }

        trigger.cancel();
    });

    token
}

pub fn report(result: Result<RunOutcome, rollcall_core::RunError>) -> bool {
    match result {
        Ok(RunOutcome::Posted(receipt)) => {
            info!(
                "Posted poll '{}' (session {})",
                receipt.question,
                if receipt.reused_session {
                    "reused"
                } else {
                    "refreshed"
                }
            );
            true
        }
        Ok(RunOutcome::Skipped(_)) => true,
        Err(e) => {
            error!("Run failed: {}", e);
            false
        }
    }
}
