use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;

mod config;
mod error;
mod logfile;
mod model;
mod notice;
mod platform;
mod session;

use crate::{
    config::Config,
    logfile::ScanLogFile,
    notice::ConsoleNotifier,
    platform::{AuthorizationResponse, CapabilityAuthorizer, IwRadio},
    session::{ScanOutcome, ScanSession},
};

type Session = ScanSession<IwRadio, CapabilityAuthorizer, ConsoleNotifier>;

#[derive(Debug, Parser)]
#[command(name = "scanlog", version, about = "Scan for WiFi networks and log what was seen")]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wireless interface, overrides the config file
    #[arg(short, long)]
    interface: Option<String>,

    #[arg(long, default_value = "warn")]
    log_level: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one scan and append the results to the log
    Scan,
    /// Scan repeatedly until interrupted
    Watch {
        /// Seconds between scans
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
    /// Print the log file location
    Path,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = config::load_or_default(cli.config.as_deref())?;
    config.apply_env(|key| dotenvy::var(key).ok());
    if let Some(interface) = cli.interface {
        config.interface = interface;
    }

    let data_dir = config.data_dir(|key| dotenvy::var(key).ok())?;
    let log = ScanLogFile::in_dir(&data_dir);

    match cli.command {
        Command::Path => println!("{}", log.path().display()),
        Command::Scan => {
            let (mut session, mut responses) = open_session(&config, log);
            run_cycle(&mut session, &mut responses).await;
        }
        Command::Watch { interval } => {
            let (mut session, mut responses) = open_session(&config, log);
            watch(&mut session, &mut responses, Duration::from_secs(interval.max(1))).await?;
        }
    };

    Ok(())
}

fn open_session(
    config: &Config,
    log: ScanLogFile,
) -> (Session, mpsc::UnboundedReceiver<AuthorizationResponse>) {
    let radio = IwRadio::new(&config.interface).watch_events();
    let (authorizer, responses) = CapabilityAuthorizer::new();
    let session = ScanSession::new(radio, authorizer, ConsoleNotifier, log)
        .with_timeout(config.scan_timeout());

    if config.enable_radio {
        session.ensure_radio_enabled();
    }
    info!(interface = %config.interface, log = %session.log_file().path().display(), "session ready");

    (session, responses)
}

// every outcome has already been shown as a notice, nothing here is fatal
async fn run_cycle(
    session: &mut Session,
    responses: &mut mpsc::UnboundedReceiver<AuthorizationResponse>,
) -> Option<ScanOutcome> {
    match session.cycle(responses).await {
        Ok(outcome) => {
            info!(?outcome, "scan cycle finished");
            Some(outcome)
        }
        Err(e) => {
            warn!("scan cycle failed: {e}");
            None
        }
    }
}

async fn watch(
    session: &mut Session,
    responses: &mut mpsc::UnboundedReceiver<AuthorizationResponse>,
    interval: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_cycle(session, responses).await;
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("interrupted, stopping");
                return Ok(());
            }
        }
    }
}
