//! The idempotency gate
//!
//! A change runs only when its caller's state check says it must. The gate
//! trusts that condition, not the output of the change, to decide whether
//! anything changed.

use crate::command::Invocation;
use crate::context::ApplyContext;
use crate::error::{Error, Result};

/// A described sequence of mutating commands, run in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub description: String,
    pub steps: Vec<Invocation>,
}

impl ChangeSet {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, invocation: Invocation) -> Self {
        self.steps.push(invocation.live());
        self
    }
}

/// Run `change` only when `condition` holds; returns whether a change occurred.
///
/// In a dry run the change is reported and counted but nothing executes.
pub fn apply(ctx: &mut ApplyContext, condition: bool, change: &ChangeSet) -> Result<bool> {
    if !condition {
        log::debug!("up to date: {}", change.description);
        return Ok(false);
    }

    ctx.progress.on_change(&change.description, ctx.dry_run);

    if ctx.dry_run {
        for step in &change.steps {
            log::info!("dry run, skipping: {step}");
            ctx.record_skipped_mutation();
        }
        return Ok(true);
    }

    for step in &change.steps {
        ctx.mutate(step)
            .map_err(|source| Error::ChangesetExecution {
                description: change.description.clone(),
                source,
            })?;
    }

    Ok(true)
}
