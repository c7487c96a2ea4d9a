//! Error types for declaration loading and convergence.
//!
//! Nothing in this crate recovers from an error locally. Handlers attach the
//! resource context, the executor attaches the task name, and the first
//! failure aborts the run.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::ResourceKind;

/// Failure of a single external command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started (missing binary, permissions, ...)
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        /// Rendered command line
        command: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully
    #[error("`{command}` failed with {}: {stderr}", describe_exit(.code))]
    Failed {
        /// Rendered command line
        command: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// The program was killed after exceeding the configured timeout
    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut {
        /// Rendered command line
        command: String,
        /// The limit that was exceeded
        timeout: Duration,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "termination by signal".to_string(),
    }
}

/// Errors raised while loading, validating or converging a declaration.
#[derive(Debug, Error)]
pub enum Error {
    /// Declaration file missing or malformed
    #[error("declaration {} is missing or malformed: {message}", .path.display())]
    ConfigLoad {
        /// Path that was read
        path: PathBuf,
        /// Reader or decoder message
        message: String,
    },

    /// `type` is not one of the known resource kinds
    #[error("unrecognised task type '{kind}'. Valid types: package, file, service")]
    UnrecognizedTaskType {
        /// The offending type tag
        kind: String,
    },

    /// `command` is not a verb of the resource kind
    #[error("unrecognised {resource} command '{command}'. Valid commands: {supported}")]
    UnrecognizedCommand {
        /// Resource kind the verb was checked against
        resource: ResourceKind,
        /// The offending verb
        command: String,
        /// Comma separated list of valid verbs
        supported: String,
    },

    /// A kind that requires a verb was declared without one
    #[error("{resource} task is missing a command. Valid commands: {supported}")]
    MissingCommand {
        /// Resource kind of the task
        resource: ResourceKind,
        /// Comma separated list of valid verbs
        supported: String,
    },

    /// `args` does not satisfy the schema of the resource kind
    #[error("invalid {resource} arguments: {message}")]
    InvalidArgs {
        /// Resource kind of the task
        resource: ResourceKind,
        /// What is missing or wrong
        message: String,
    },

    /// A state probe could not be executed at all
    #[error("could not probe {description}")]
    Probe {
        /// What was being probed
        description: String,
        /// Underlying command failure
        #[source]
        source: CommandError,
    },

    /// A gated change command failed
    #[error("changeset execution failed: {description}")]
    ChangesetExecution {
        /// The change that was attempted
        description: String,
        /// Underlying command failure
        #[source]
        source: CommandError,
    },

    /// A bound service restart failed
    #[error("restart of service '{service}' failed")]
    Restart {
        /// Service named by the restart binding
        service: String,
        /// Underlying command failure
        #[source]
        source: CommandError,
    },

    /// Any of the above, attributed to the task that raised it
    #[error("task '{name}' failed: {source}")]
    Task {
        /// Name of the failing task
        name: String,
        /// What went wrong
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attribute this error to a task.
    pub fn in_task(self, name: &str) -> Self {
        Self::Task {
            name: name.to_string(),
            source: Box::new(self),
        }
    }

    /// The error beneath any task attribution.
    pub fn root(&self) -> &Self {
        match self {
            Self::Task { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the task this error is attributed to, if any.
    pub fn task_name(&self) -> Option<&str> {
        match self {
            Self::Task { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Result type for convergence operations.
pub type Result<T> = std::result::Result<T, Error>;
