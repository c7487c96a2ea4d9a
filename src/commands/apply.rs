//! `apply` and `plan`: converge the host to the declaration

use anyhow::{Context as _, Result};
use colored::Colorize;
use declarative::{
    CommandRunner, ExecuteOptions, ExecuteSummary, Privilege, ResolvedTask, ResourceKind,
    execute_resolved,
};
use std::path::Path;
use std::time::Duration;

use crate::Context;
use crate::cli::RunArgs;
use crate::config;
use crate::progress::ConsoleProgress;
use crate::runner::SystemRunner;
use crate::sudo::{self, SudoContext};
use crate::ui;

pub fn run(ctx: &Context, config_path: &Path, dry_run: bool, args: &RunArgs) -> Result<()> {
    let declaration = config::load(config_path)?;
    let tasks = declaration
        .resolve()
        .with_context(|| format!("Invalid declaration {}", config_path.display()))?;

    if tasks.is_empty() {
        ui::info("No tasks declared - nothing to do");
        return Ok(());
    }

    let opts = ExecuteOptions {
        dry_run,
        privilege: sudo::privilege_for(args.no_sudo),
    };
    log::debug!("privilege for mutating commands: {:?}", opts.privilege);

    if !ctx.quiet {
        let title = if dry_run { "Plan" } else { "Apply" };
        ui::header(&format!("{title} {}", config_path.display()));
    }

    let _sudo = if needs_sudo(&tasks, &opts) {
        Some(SudoContext::acquire(
            "Converge system packages, files and services",
        )?)
    } else {
        None
    };

    let runner = SystemRunner::new(
        ctx.verbose > 0 && !ctx.quiet,
        args.timeout.map(Duration::from_secs),
    );

    converge(ctx, &tasks, &opts, &runner)?;
    Ok(())
}

/// Real runs elevate their changes; file probes are elevated even in a dry run
fn needs_sudo(tasks: &[ResolvedTask], opts: &ExecuteOptions) -> bool {
    opts.privilege == Privilege::Sudo
        && (!opts.dry_run
            || tasks
                .iter()
                .any(|t| t.resource.kind() == ResourceKind::File))
}

fn converge(
    ctx: &Context,
    tasks: &[ResolvedTask],
    opts: &ExecuteOptions,
    runner: &dyn CommandRunner,
) -> Result<ExecuteSummary> {
    let mut progress = ConsoleProgress::new(ctx.quiet);
    let summary = execute_resolved(tasks, opts, runner, &mut progress)?;

    if !ctx.quiet {
        print_summary(&summary, opts.dry_run);
    }
    Ok(summary)
}

fn print_summary(summary: &ExecuteSummary, dry_run: bool) {
    println!();
    if summary.is_converged() {
        ui::success("Already converged - nothing to change");
        return;
    }

    if dry_run {
        ui::info(&format!(
            "Dry run - {} would change, no changes made",
            ui::count(summary.changed, "task")
        ));
    } else {
        println!("{} {}", "✓".green().bold(), "Converged".bold());
    }
    ui::kv("changed", &summary.changed.to_string());
    ui::kv("unchanged", &summary.unchanged.to_string());
    ui::kv("restarts", &summary.restarts.to_string());
    ui::kv("commands", &summary.mutations.to_string());
}
