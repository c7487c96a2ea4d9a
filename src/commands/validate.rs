//! `validate`: decode and check the declaration without touching the host

use anyhow::{Context as _, Result};
use colored::Colorize;
use declarative::ResolvedTask;
use serde::Serialize;
use std::path::Path;

use crate::Context;
use crate::config;
use crate::ui;

/// One resolved task as printed by `validate --json`
#[derive(Debug, Serialize)]
struct TaskView<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    command: &'static str,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    restart: Option<&'a str>,
}

impl<'a> From<&'a ResolvedTask> for TaskView<'a> {
    fn from(task: &'a ResolvedTask) -> Self {
        Self {
            name: &task.name,
            kind: task.resource.kind().as_str(),
            command: task.resource.verb(),
            description: task.resource.description(),
            restart: task.restart.as_ref().map(|r| r.service.as_str()),
        }
    }
}

pub fn run(ctx: &Context, config_path: &Path, json: bool) -> Result<()> {
    let declaration = config::load(config_path)?;
    let tasks = declaration
        .resolve()
        .with_context(|| format!("Invalid declaration {}", config_path.display()))?;
    let views: Vec<TaskView> = tasks.iter().map(TaskView::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if ctx.quiet {
        return Ok(());
    }

    ui::header(&format!("Tasks in {}", config_path.display()));
    for (index, view) in views.iter().enumerate() {
        let restart = view
            .restart
            .map(|s| format!(" (restarts {s})"))
            .unwrap_or_default();
        println!(
            "  {:>3}. {} {}{}",
            index + 1,
            view.name.bold(),
            view.description.dimmed(),
            restart.cyan()
        );
    }
    println!();
    ui::success(&format!("{} valid", ui::count(views.len(), "task")));
    Ok(())
}
