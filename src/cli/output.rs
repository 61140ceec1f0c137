// Output formatting for the operator CLI

use crate::daemon::StopOutcome;
use colored::*;
use std::path::Path;

/// Print an error message to stderr
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), message);
}

/// Announce a launch; the launching process exits right after detaching
pub fn print_starting(pid_file: &Path) {
    println!(
        "{} (pid file: {})",
        "Starting dbcheck daemon".green().bold(),
        pid_file.display()
    );
}

/// Report what stop did
pub fn print_stopped(outcome: StopOutcome) {
    match outcome {
        StopOutcome::NotRunning => {
            println!("{}", "Daemon not running, nothing to stop".yellow());
        }
        StopOutcome::Stopped { pid } => {
            println!(
                "{}",
                format!("✓ Daemon {} stopped successfully", pid).green().bold()
            );
        }
    }
}

/// Print a health-check reply, green when it matches `up_token`
pub fn print_reply(reply: &str, up_token: &str) {
    if reply == up_token {
        println!("{}", reply.green().bold());
    } else {
        println!("{}", reply.red().bold());
    }
}
