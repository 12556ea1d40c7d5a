use anyhow::Result;
use console::style;
use std::path::Path;

use crate::core::terminal::{GuideSection, print_error, print_info, print_warn};
use crate::platform::{NativePlatform, Platform};

pub const PID_FILE_NAME: &str = "scorekeeper.pid";
pub const LOG_FILE_NAME: &str = "scorekeeper.log";

/// PID recorded by `start`, if the daemon is believed to be running.
pub fn running_pid(pid_file: &Path) -> Option<String> {
    let pid = std::fs::read_to_string(pid_file).ok()?;
    let pid = pid.trim();
    (!pid.is_empty()).then(|| pid.to_string())
}

pub async fn daemon_start(run_dir: &Path, pid_file: &Path) -> Result<()> {
    std::fs::create_dir_all(run_dir)?;
    NativePlatform::restrict_dir_permissions(run_dir);
    if running_pid(pid_file).is_some() {
        print_warn("Daemon is already running. Use 'scorekeeper stop' first.");
        return Ok(());
    }

    let log_path = run_dir.join(LOG_FILE_NAME);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    NativePlatform::restrict_file_permissions(&log_path);

    let exe = std::env::current_exe()?;
    let child = std::process::Command::new(exe)
        .arg("daemon-run")
        .stdin(std::process::Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()?;

    std::fs::write(pid_file, child.id().to_string())?;

    GuideSection::new("Poller Started")
        .status(
            "Status",
            &format!(
                "{} (PID {})",
                style("RUNNING").green().bold(),
                style(child.id()).dim()
            ),
        )
        .status("Log", &log_path.display().to_string())
        .blank()
        .info(&format!(
            "Run {} to follow it.",
            style("scorekeeper logs").cyan().bold()
        ))
        .print();
    println!();

    Ok(())
}

pub async fn daemon_stop(pid_file: &Path) -> Result<()> {
    let mut daemon_stopped = false;
    if pid_file.exists() {
        if let Some(pid) = running_pid(pid_file) {
            if let Err(e) = NativePlatform::kill_process(&pid) {
                print_warn(&format!("Could not signal PID {}: {}", pid, e));
            }
            GuideSection::new("Poller Stopped")
                .status(
                    "Status",
                    &format!(
                        "{} (was PID {})",
                        style("STOPPED").red().bold(),
                        style(&pid).dim()
                    ),
                )
                .print();
            daemon_stopped = true;
        }
        std::fs::remove_file(pid_file).ok();
    }

    if !daemon_stopped {
        print_info("Poller is not currently running.");
    }
    println!();
    Ok(())
}

pub fn print_daemon_status(pid_file: &Path) {
    match running_pid(pid_file) {
        Some(pid) => GuideSection::new("Poller Status")
            .status(
                "Daemon",
                &format!(
                    "{} (PID {})",
                    style("RUNNING").green().bold(),
                    style(pid).dim()
                ),
            )
            .print(),
        None => GuideSection::new("Poller Status")
            .status("Daemon", &style("STOPPED").red().bold().to_string())
            .blank()
            .info(&format!(
                "Run {} to start the daemon.",
                style("scorekeeper start").cyan().bold()
            ))
            .print(),
    }
}

pub async fn follow_logs(run_dir: &Path, pid_file: &Path) -> Result<()> {
    if running_pid(pid_file).is_some() {
        let log_file = run_dir.join(LOG_FILE_NAME);
        if log_file.exists() {
            GuideSection::new("Live Logs")
                .text(&format!(
                    "Following {} - press {} to stop.",
                    style(LOG_FILE_NAME).cyan(),
                    style("Ctrl+C").bold().yellow()
                ))
                .print();
            println!();
            let mut child = NativePlatform::tail_file(&log_file)?;
            let _ = child.wait()?;
        } else {
            print_error(&format!(
                "Log file not found at {}",
                style(log_file.display()).dim()
            ));
        }
    } else {
        GuideSection::new("Live Logs")
            .warn("Poller is not running.")
            .blank()
            .info(&format!(
                "Run {} to start it.",
                style("scorekeeper start").cyan().bold()
            ))
            .print();
        println!();
    }
    Ok(())
}
