mod scheduler;

use chrono::Local;
use clap::{Parser, Subcommand};
use rollcall_core::config::ConfigLoader;
use rollcall_core::poster::{PollPoster, PosterConfig};
use rollcall_core::runner;
use rollcall_h::HeadlessSession;
use scheduler::Scheduler;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Weekly practice attendance poll poster")]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Config file (defaults to ./rollcall.yaml, then ~/.rollcall/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Launch browser in visible mode (not headless)
    #[arg(long, global = true)]
    visible: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// Post on the configured cron schedule until interrupted
    Serve,
    /// Run once now
    Once,
    /// Print what would be posted without opening a browser
    Preview,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ConfigLoader::load(args.config.as_deref()).await?;
    if args.visible {
        config.browser.headless = false;
    }

    match args.mode {
        Mode::Preview => {
            let resolution =
                runner::preview(&config.paths.practices, Local::now().naive_local()).await?;
            match resolution.label() {
                Some(label) => println!("{}", label),
                None => println!("Nothing to post this week"),
            }
        }
        Mode::Once => {
            let mut poster = PollPoster::new(
                HeadlessSession::new(config.browser.clone()),
                PosterConfig::from_config(&config)?,
            );
            let result =
                runner::run_once(&config.paths.practices, &mut poster, Local::now().naive_local())
                    .await;
            if !scheduler::report(result) {
                anyhow::bail!("poll run failed");
            }
        }
        Mode::Serve => {
            let scheduler = Scheduler::new(&config.schedule.cron)?;
            let mut poster = PollPoster::new(
                HeadlessSession::new(config.browser.clone()),
                PosterConfig::from_config(&config)?,
            );
            let shutdown = scheduler::install_signal_handler();
            scheduler
                .serve(&config.paths.practices, &mut poster, shutdown)
                .await?;
        }
    }

    Ok(())
}
