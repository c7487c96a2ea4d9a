//! # Declarative
//!
//! Idempotent convergence of a host towards a declared state.
//!
//! A [`Declaration`] is an ordered list of tasks, each naming a package, a
//! file or a systemd service and the state it should be in. Every task
//! probes the live system first and only issues a change when the probe says
//! one is needed, so a second run over a converged host issues no mutating
//! command at all.
//!
//! ## Core Concepts
//!
//! - **Resource**: probe current state, decide, build the change command
//! - **ChangeSet / gate**: run a change only when its condition holds
//! - **RestartBinding**: restart a service only when its task changed something
//! - **Executor**: validate every task, then run them in order, fail-fast
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{Declaration, ExecuteOptions, execute_simple};
//!
//! let declaration: Declaration = serde_json::from_str(r#"{
//!     "tasks": [{
//!         "name": "nginx-pkg",
//!         "type": "package",
//!         "command": "install",
//!         "args": { "package": "nginx" },
//!         "restart": { "service": "nginx" }
//!     }]
//! }"#)?;
//!
//! let summary = execute_simple(&declaration, &ExecuteOptions::default(), &runner)?;
//! println!("{} changed, {} restarts", summary.changed, summary.restarts);
//! ```
//!
//! ## Provider Traits
//!
//! - [`CommandRunner`]: executes argv invocations (real processes, or a fake host in tests)
//! - [`ProgressCallback`]: receives task, change and restart notices

pub mod command;
pub mod context;
pub mod error;
pub mod executor;
pub mod file;
pub mod gate;
pub mod package;
pub mod resource;
pub mod restart;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types at crate root
pub use command::{CommandOutput, CommandRunner, Invocation, Privilege};
pub use context::{ApplyContext, NoProgress, ProgressCallback};
pub use error::{CommandError, Error, Result};
pub use executor::{execute, execute_resolved, execute_simple};
pub use file::{FileArgs, FileCommand, FileResource};
pub use gate::ChangeSet;
pub use package::{PackageArgs, PackageCommand, PackageResource};
pub use resource::{Resource, ResourceSpec};
pub use restart::maybe_restart;
pub use service::{ServiceArgs, ServiceCommand, ServiceResource};
pub use types::{
    Declaration, ExecuteOptions, ExecuteSummary, ResolvedTask, ResourceKind, RestartBinding,
    Task, TaskReport, TaskState, Verb,
};
