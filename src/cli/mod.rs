pub mod daemon_path;
pub mod output;
pub mod process;

use std::{
    io::{stdout, IsTerminal},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use output::{format_history, format_status};
use process::{ensure_daemon, stop_daemon, DaemonState, StopOutcome};
use tracing::{info, level_filters::LevelFilter};

use crate::{
    daemon::{
        lifecycle::{PidMarker, PRESENTATION_LOCK_FILE},
        serve,
    },
    report::{read_persisted, StatusReporter, StatusView, DEFAULT_HISTORY_DAYS},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "readtrack", version, long_about = None)]
#[command(about = "Tracks how long you read PDF documents every day", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {},
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(
        about = "Run a daemon directly in current console. Used for debugging and for supervisors that expect a foreground process"
    )]
    Serve {},
    #[command(about = "Show today's reading time")]
    Status {
        #[arg(long, help = "Print as json")]
        json: bool,
    },
    #[command(about = "Show reading time for each of the last days")]
    History {
        #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS)]
        days: u32,
        #[arg(long, help = "Print as json")]
        json: bool,
    },
    #[command(about = "Keep printing today's status whenever it changes")]
    Watch {
        #[arg(long, default_value_t = 5, help = "Seconds between refreshes")]
        interval: u64,
    },
}

fn resolve_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            Ok(std::path::absolute(dir)?)
        }
        None => create_application_default_path(),
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    let dir = resolve_dir(args.dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;

    match args.commands {
        Commands::Init {} => {
            match ensure_daemon(&dir)? {
                DaemonState::AlreadyRunning(pid) => println!("Daemon is already running ({pid})"),
                DaemonState::Started => println!("Daemon started"),
            }
            Ok(())
        }
        Commands::Stop {} => {
            match stop_daemon(&dir)? {
                StopOutcome::Stopped(pid) => println!("Stopped daemon {pid}"),
                StopOutcome::StaleMarkerRemoved => {
                    println!("Daemon wasn't running, removed stale marker")
                }
                StopOutcome::NotRunning => println!("Daemon isn't running"),
            }
            Ok(())
        }
        Commands::Serve {} => serve(dir).await,
        Commands::Status { json } => {
            let status = current_status(&dir).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", format_status(&status, stdout().is_terminal()));
            }
            Ok(())
        }
        Commands::History { days, json } => {
            let (config, snapshot) = read_persisted(&dir).await;
            let history =
                StatusReporter::new(&config, &snapshot).history(Local::now().date_naive(), days);
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                print!("{}", format_history(&history, stdout().is_terminal()));
            }
            Ok(())
        }
        Commands::Watch { interval } => watch(&dir, Duration::from_secs(interval.max(1))).await,
    }
}

async fn current_status(dir: &Path) -> StatusView {
    let (config, snapshot) = read_persisted(dir).await;
    StatusReporter::new(&config, &snapshot).status(Local::now().date_naive())
}

/// Presentation loop. Only one watcher per application directory may run at a time.
async fn watch(dir: &Path, interval: Duration) -> Result<()> {
    let marker = PidMarker::new(dir.join(PRESENTATION_LOCK_FILE));
    marker.reclaim()?;
    marker.claim()?;

    let result = watch_loop(dir, interval).await;
    marker.release()?;
    result
}

async fn watch_loop(dir: &Path, interval: Duration) -> Result<()> {
    if let DaemonState::Started = ensure_daemon(dir)? {
        info!("Started daemon for {dir:?}");
    }

    let colored = stdout().is_terminal();
    let mut last: Option<StatusView> = None;
    loop {
        let status = current_status(dir).await;
        if last.as_ref() != Some(&status) {
            print!("{}", format_status(&status, colored));
            println!();
            last = Some(status);
        }

        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(interval) => (),
        }
    }
    Ok(())
}
