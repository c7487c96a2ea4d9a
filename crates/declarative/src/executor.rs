//! Task dispatcher - validates a declaration, then converges it task by task
//!
//! Tasks run strictly in declaration order, one at a time. The first failure
//! is attributed to its task and aborts the run; effects of earlier tasks
//! stay applied.

use crate::command::CommandRunner;
use crate::context::{ApplyContext, NoProgress, ProgressCallback};
use crate::error::Result;
use crate::restart::maybe_restart;
use crate::types::{Declaration, ExecuteOptions, ExecuteSummary, ResolvedTask, TaskReport, TaskState};

/// Execute a declaration with the given options and callbacks
///
/// Every task is validated before the first one runs, so a malformed task
/// anywhere in the declaration leaves the system untouched.
///
/// # Arguments
/// * `declaration` - Tasks in execution order
/// * `opts` - Dry run and privilege settings
/// * `runner` - Executes probes and changes
/// * `progress` - Progress callback
pub fn execute(
    declaration: &Declaration,
    opts: &ExecuteOptions,
    runner: &dyn CommandRunner,
    progress: &mut dyn ProgressCallback,
) -> Result<ExecuteSummary> {
    let tasks = declaration.resolve()?;
    execute_resolved(&tasks, opts, runner, progress)
}

/// Execute already validated tasks
pub fn execute_resolved(
    tasks: &[ResolvedTask],
    opts: &ExecuteOptions,
    runner: &dyn CommandRunner,
    progress: &mut dyn ProgressCallback,
) -> Result<ExecuteSummary> {
    let mut states = vec![TaskState::Pending; tasks.len()];
    let mut summary = ExecuteSummary::default();
    let mut ctx = ApplyContext::new(runner, progress, opts.dry_run, opts.privilege);

    for (index, task) in tasks.iter().enumerate() {
        transition(&mut states, index, task, TaskState::Dispatched);
        ctx.progress
            .on_task_start(index + 1, tasks.len(), &task.name, &task.resource.description());

        match run_task(&mut ctx, task) {
            Ok(report) => {
                transition(&mut states, index, task, TaskState::Succeeded);
                ctx.progress.on_task_complete(&report);
                summary.add_report(report);
            }
            Err(e) => {
                transition(&mut states, index, task, TaskState::Failed);
                log::error!(
                    "aborting after task '{}'; {} task(s) not run",
                    task.name,
                    tasks.len() - index - 1
                );
                return Err(e.in_task(&task.name));
            }
        }
    }

    summary.mutations = ctx.mutations();
    Ok(summary)
}

fn run_task(ctx: &mut ApplyContext, task: &ResolvedTask) -> Result<TaskReport> {
    let changed = task.resource.apply(ctx)?;
    let restarted = maybe_restart(ctx, changed, task.restart.as_ref())?;

    Ok(TaskReport {
        name: task.name.clone(),
        state: TaskState::Succeeded,
        changed,
        restarted: restarted
            .then(|| task.restart.as_ref().map(|r| r.service.clone()))
            .flatten(),
    })
}

fn transition(states: &mut [TaskState], index: usize, task: &ResolvedTask, next: TaskState) {
    log::trace!("task '{}': {:?} -> {:?}", task.name, states[index], next);
    states[index] = next;
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress reporting.
pub fn execute_simple(
    declaration: &Declaration,
    opts: &ExecuteOptions,
    runner: &dyn CommandRunner,
) -> Result<ExecuteSummary> {
    execute(declaration, opts, runner, &mut NoProgress)
}
