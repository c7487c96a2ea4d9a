//! Console progress for convergence runs

use colored::Colorize;
use declarative::{ProgressCallback, TaskReport};

use crate::ui;

/// Prints one line per task plus its changes and restarts
pub struct ConsoleProgress {
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_task_start(&mut self, index: usize, total: usize, name: &str, description: &str) {
        if !self.quiet {
            ui::step(index, total, &format!("{} {}", name.bold(), description.dimmed()));
        }
    }

    fn on_change(&mut self, description: &str, dry_run: bool) {
        if self.quiet {
            return;
        }
        if dry_run {
            println!("    {} would {}", "~".yellow(), description);
        } else {
            println!("    {} {}", "→".cyan(), description);
        }
    }

    fn on_restart(&mut self, service: &str, dry_run: bool) {
        if self.quiet {
            return;
        }
        if dry_run {
            println!("    {} would restart {}", "~".yellow(), service);
        } else {
            println!("    {} restarting {}", "↻".cyan(), service);
        }
    }

    fn on_task_complete(&mut self, report: &TaskReport) {
        if !self.quiet && !report.changed {
            ui::dim("already in desired state");
        }
    }
}
