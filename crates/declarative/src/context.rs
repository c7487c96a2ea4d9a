//! Apply context and provider traits
//!
//! These traits keep the crate free of any particular console UI or process
//! implementation: the caller supplies a [`CommandRunner`] and a
//! [`ProgressCallback`] and threads them through an [`ApplyContext`].

use crate::command::{CommandOutput, CommandRunner, Invocation, Privilege};
use crate::error::CommandError;
use crate::types::TaskReport;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during a run.
pub trait ProgressCallback {
    /// Called before a task is dispatched
    fn on_task_start(&mut self, index: usize, total: usize, name: &str, description: &str);

    /// Called when a gated change runs (or would run, in a dry run)
    fn on_change(&mut self, description: &str, dry_run: bool);

    /// Called when a bound service restart runs (or would run)
    fn on_restart(&mut self, service: &str, dry_run: bool);

    /// Called when a task finished successfully
    fn on_task_complete(&mut self, report: &TaskReport);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_task_start(&mut self, _index: usize, _total: usize, _name: &str, _description: &str) {}
    fn on_change(&mut self, _description: &str, _dry_run: bool) {}
    fn on_restart(&mut self, _service: &str, _dry_run: bool) {}
    fn on_task_complete(&mut self, _report: &TaskReport) {}
}

/// Context passed to resource apply operations
pub struct ApplyContext<'a> {
    /// Executes probes and changes
    pub runner: &'a dyn CommandRunner,
    /// Receives change and restart notices
    pub progress: &'a mut dyn ProgressCallback,
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
    /// Elevation applied to mutating commands and `inspect` probes
    pub privilege: Privilege,
    mutations: usize,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(
        runner: &'a dyn CommandRunner,
        progress: &'a mut dyn ProgressCallback,
        dry_run: bool,
        privilege: Privilege,
    ) -> Self {
        Self {
            runner,
            progress,
            dry_run,
            privilege,
            mutations: 0,
        }
    }

    /// Run a read-only state probe as the current user
    pub fn probe(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        log::debug!("probe: {invocation}");
        let output = self.runner.run(invocation)?;
        log::trace!(
            "probe {} -> success={} stdout={:?}",
            invocation.program,
            output.success,
            output.stdout_str().trim()
        );
        Ok(output)
    }

    /// Run a read-only probe with the configured privilege
    ///
    /// For state that only the elevated user can see, such as a file that
    /// is not readable by the invoking user.
    pub fn inspect(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        self.probe(&invocation.clone().privileged(self.privilege))
    }

    /// Run a mutating command with the configured privilege
    pub(crate) fn mutate(&mut self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let invocation = invocation.clone().privileged(self.privilege);
        log::info!("run: {invocation}");
        self.mutations += 1;
        self.runner.run_checked(&invocation)
    }

    /// Count a mutation that a dry run skipped
    pub(crate) fn record_skipped_mutation(&mut self) {
        self.mutations += 1;
    }

    /// Mutating commands issued so far (or skipped by a dry run)
    pub fn mutations(&self) -> usize {
        self.mutations
    }
}
