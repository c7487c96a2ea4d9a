//! Restart coordination
//!
//! A restart binding fires only as a consequence of its own task changing
//! something. A failed restart aborts the run.

use crate::command::Invocation;
use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::types::RestartBinding;

/// Restart the bound service if the owning task changed; returns whether a
/// restart was issued (or, in a dry run, would have been).
pub fn maybe_restart(
    ctx: &mut ApplyContext,
    changed: bool,
    binding: Option<&RestartBinding>,
) -> Result<bool> {
    let Some(binding) = binding else {
        return Ok(false);
    };
    if !changed {
        log::debug!("no change, not restarting {}", binding.service);
        return Ok(false);
    }

    ctx.progress.on_restart(&binding.service, ctx.dry_run);

    if ctx.dry_run {
        ctx.record_skipped_mutation();
        return Ok(true);
    }

    let restart = Invocation::new("systemctl")
        .args(["restart", binding.service.as_str()])
        .live();
    ctx.mutate(&restart).map_err(|source| Error::Restart {
        service: binding.service.clone(),
        source,
    })?;

    Ok(true)
}
