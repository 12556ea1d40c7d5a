mod daemon;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use console::style;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::config::PollerConfig;
use crate::core::model::Event;
use crate::core::service::PollingService;
use crate::core::store::SqliteGateway;
use crate::core::terminal::{self, GuideSection, print_error, print_success, print_warn};
use crate::platform::{NativePlatform, Platform};

const RECENT_EVENTS: usize = 10;

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Polling")
        .command("run", "Poll in the foreground until Ctrl+C")
        .command("once", "Run one discovery pass and one tick per event")
        .print();

    GuideSection::new("Daemon")
        .command("start", "Start the background poller")
        .command("stop", "Stop the background poller")
        .command("status", "Show daemon state and recent events")
        .command("logs", "Follow real-time daemon logs")
        .print();

    GuideSection::new("Data")
        .command("show <event_id>", "Print a stored event as JSON")
        .command("replay <event_id>", "Re-commit archived payloads")
        .blank()
        .hint("scorekeeper replay 0022600123 --date 2026-10-19", "")
        .hint("scorekeeper once --log-file /tmp/once.log", "")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style(NativePlatform::binary_name()).green()
    );
}

/// `--log-file <path>` for foreground commands.
pub(crate) fn parse_log_file_flag(args: &[String], start: usize) -> Option<PathBuf> {
    let mut log_file = None;
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--log-file" => {
                if i + 1 < args.len() {
                    log_file = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    log_file
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReplayArgs {
    pub event_id: String,
    pub date: Option<NaiveDate>,
}

pub(crate) fn parse_replay_args(args: &[String], start: usize) -> Result<ReplayArgs> {
    let mut event_id = None;
    let mut date = None;
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--date" | "-d" => {
                let Some(raw) = args.get(i + 1) else {
                    bail!("--date requires a value (YYYY-MM-DD)");
                };
                date = Some(
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                        .with_context(|| format!("invalid --date '{}'", raw))?,
                );
                i += 2;
            }
            other if event_id.is_none() && !other.starts_with('-') => {
                event_id = Some(other.to_string());
                i += 1;
            }
            _ => i += 1,
        }
    }
    let Some(event_id) = event_id else {
        bail!("an event id is required");
    };
    Ok(ReplayArgs { event_id, date })
}

pub(crate) fn describe_event(event: &Event) -> String {
    let score = match (event.home_score, event.away_score) {
        (Some(home), Some(away)) => format!("{}-{}", home, away),
        (Some(home), None) => format!("{}-?", home),
        (None, Some(away)) => format!("?-{}", away),
        (None, None) => "-".to_string(),
    };
    let mut line = format!("{:<12} {}", event.status.as_str(), score);
    if let Some(period) = event.period {
        line.push_str(&format!("  P{}", period));
    }
    if let Some(clock) = event.clock.as_deref().filter(|c| !c.is_empty()) {
        line.push_str(&format!(" {}", clock));
    }
    line
}

async fn load_config(data_dir: &Path) -> Result<PollerConfig> {
    PollerConfig::load(data_dir)
        .await
        .with_context(|| format!("failed to load config from {}", data_dir.display()))
}

/// Resolves once on Ctrl+C or, on Unix, SIGTERM from `scorekeeper stop`.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn run_foreground(
    data_dir: &Path,
    log_file: Option<PathBuf>,
    suppress_stdout: bool,
) -> Result<()> {
    let config = load_config(data_dir).await?;
    crate::logging::init(&config.log_level, log_file.as_deref(), suppress_stdout)?;
    info!(
        "Starting scorekeeper poller (PID {}, data dir {})",
        std::process::id(),
        data_dir.display()
    );

    let service = PollingService::boot(data_dir, config).await?;
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });
    service.run(shutdown).await
}

async fn run_once(data_dir: &Path, log_file: Option<PathBuf>) -> Result<()> {
    let config = load_config(data_dir).await?;
    crate::logging::init(&config.log_level, log_file.as_deref(), false)?;

    let service = PollingService::boot(data_dir, config).await?;
    let summary = service.run_once().await?;

    GuideSection::new("Single Pass")
        .status("Listed", &summary.discovery.listed.to_string())
        .status(
            "Already completed",
            &summary.discovery.already_completed.to_string(),
        )
        .status("Committed", &summary.committed.to_string())
        .status("Completed", &summary.completed.to_string())
        .status("Failed", &summary.failed.to_string())
        .print();
    println!();
    if !summary.discovery.seeded {
        print_warn("Listing rows could not be seeded; see the log for details.");
    }
    Ok(())
}

async fn print_status(data_dir: &Path, pid_file: &Path) -> Result<()> {
    daemon::print_daemon_status(pid_file);

    let config = load_config(data_dir).await?;
    let db_path = config.database_path(data_dir);
    if !db_path.exists() {
        println!();
        return Ok(());
    }
    let gateway = SqliteGateway::new(&db_path).await?;
    let events = gateway.recent_events(RECENT_EVENTS).await?;
    let mut section = GuideSection::new("Recent Events");
    if events.is_empty() {
        section = section.text("No events stored yet.");
    }
    for event in &events {
        section = section.status(&event.external_id, &describe_event(event));
    }
    section.print();
    println!();
    Ok(())
}

async fn show_event(data_dir: &Path, event_id: &str) -> Result<()> {
    let config = load_config(data_dir).await?;
    let gateway = SqliteGateway::new(config.database_path(data_dir)).await?;
    match gateway.find_detail(event_id).await? {
        Some(detail) => println!("{}", serde_json::to_string_pretty(&detail)?),
        None => print_error(&format!("No stored event with id {}", event_id)),
    }
    Ok(())
}

async fn replay_event(data_dir: &Path, args: ReplayArgs) -> Result<()> {
    let config = load_config(data_dir).await?;
    crate::logging::init(&config.log_level, None, false)?;
    let date = args.date.unwrap_or_else(|| Utc::now().date_naive());

    let service = PollingService::boot(data_dir, config).await?;
    let event = service.replay(&args.event_id, date).await?;
    print_success(&format!(
        "Replayed {}: {}",
        event.external_id,
        describe_event(&event)
    ));
    Ok(())
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let data_dir = NativePlatform::data_dir();
    let run_dir = data_dir.join("run");
    let pid_file = run_dir.join(daemon::PID_FILE_NAME);

    let Some(cmd) = args.get(1) else {
        print_help();
        return Ok(());
    };

    match cmd.as_str() {
        "run" => {
            run_foreground(&data_dir, parse_log_file_flag(&args, 2), false).await?;
            terminal::print_goodbye();
            Ok(())
        }
        "daemon-run" => {
            // `start` points stdout at the same file; only panics should land there.
            let log_file = run_dir.join(daemon::LOG_FILE_NAME);
            let result = run_foreground(&data_dir, Some(log_file), true).await;
            std::fs::remove_file(&pid_file).ok();
            result
        }
        "once" => run_once(&data_dir, parse_log_file_flag(&args, 2)).await,
        "start" => daemon::daemon_start(&run_dir, &pid_file).await,
        "stop" => daemon::daemon_stop(&pid_file).await,
        "status" => print_status(&data_dir, &pid_file).await,
        "logs" => daemon::follow_logs(&run_dir, &pid_file).await,
        "show" => {
            let Some(event_id) = args.get(2) else {
                print_error("Usage: scorekeeper show <event_id>");
                return Ok(());
            };
            show_event(&data_dir, event_id).await
        }
        "replay" => {
            let parsed = match parse_replay_args(&args, 2) {
                Ok(parsed) => parsed,
                Err(e) => {
                    print_error(&format!("{}", e));
                    print_help();
                    return Ok(());
                }
            };
            replay_event(&data_dir, parsed).await
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command: {}", other));
            print_help();
            Ok(())
        }
    }
}
