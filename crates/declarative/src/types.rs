//! Core types: declarations, resource kinds, verbs and run summaries

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::command::Privilege;
use crate::error::{Error, Result};
use crate::file::{FileArgs, FileCommand, FileResource};
use crate::package::{PackageArgs, PackageCommand, PackageResource};
use crate::resource::ResourceSpec;
use crate::service::{ServiceArgs, ServiceCommand, ServiceResource};

/// The closed set of resource kinds a task can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Package,
    File,
    Service,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::File => "file",
            Self::Service => "service",
        }
    }

    /// Verbs accepted by this kind, in documentation order
    pub fn supported_verbs(self) -> Vec<&'static str> {
        match self {
            Self::Package => PackageCommand::supported_verbs(),
            Self::File => FileCommand::supported_verbs(),
            Self::Service => ServiceCommand::supported_verbs(),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "package" => Ok(Self::Package),
            "file" => Ok(Self::File),
            "service" => Ok(Self::Service),
            other => Err(Error::UnrecognizedTaskType {
                kind: other.to_string(),
            }),
        }
    }
}

/// A verb of one resource kind
pub trait Verb: Copy + Sized + 'static {
    /// Kind this verb belongs to
    const KIND: ResourceKind;
    /// Every verb of the kind
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn supported_verbs() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.as_str()).collect()
    }

    /// Parse a declared verb, failing with `UnrecognizedCommand`
    fn parse(command: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == command)
            .ok_or_else(|| Error::UnrecognizedCommand {
                resource: Self::KIND,
                command: command.to_string(),
                supported: Self::supported_verbs().join(", "),
            })
    }

    /// Parse a verb that the kind requires
    fn parse_required(command: Option<&str>) -> Result<Self> {
        match command {
            Some(command) => Self::parse(command),
            None => Err(Error::MissingCommand {
                resource: Self::KIND,
                supported: Self::supported_verbs().join(", "),
            }),
        }
    }
}

/// A service to restart when the owning task changed something
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartBinding {
    pub service: String,
}

/// One task as written in the declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartBinding>,
}

/// An ordered list of tasks; order is execution order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub tasks: Vec<Task>,
}

/// A task whose kind, verb and arguments have been validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    pub name: String,
    pub resource: ResourceSpec,
    pub restart: Option<RestartBinding>,
}

impl Task {
    /// Validate the task into its typed form.
    ///
    /// Errors are not attributed to the task here; callers add the name.
    pub fn resolve(&self) -> Result<ResolvedTask> {
        let kind: ResourceKind = self.kind.parse()?;
        let command = self.command.as_deref();

        let resource = match kind {
            ResourceKind::Package => ResourceSpec::Package(PackageResource {
                command: PackageCommand::parse_required(command)?,
                args: decode_args::<PackageArgs>(kind, &self.args)?,
            }),
            ResourceKind::File => ResourceSpec::File(FileResource {
                command: command
                    .map(FileCommand::parse)
                    .transpose()?
                    .unwrap_or(FileCommand::Create),
                args: decode_args::<FileArgs>(kind, &self.args)?,
            }),
            ResourceKind::Service => ResourceSpec::Service(ServiceResource {
                command: ServiceCommand::parse_required(command)?,
                args: decode_args::<ServiceArgs>(kind, &self.args)?,
            }),
        };
        resource.validate()?;

        let restart = match (&resource, &self.restart) {
            (ResourceSpec::Service(_), Some(binding)) => {
                log::warn!(
                    "task '{}': service tasks do not trigger restarts, ignoring restart of '{}'",
                    self.name,
                    binding.service
                );
                None
            }
            (_, Some(binding)) if binding.service.trim().is_empty() => {
                return Err(Error::InvalidArgs {
                    resource: kind,
                    message: "restart.service must not be empty".to_string(),
                });
            }
            (_, restart) => restart.clone(),
        };

        Ok(ResolvedTask {
            name: self.name.clone(),
            resource,
            restart,
        })
    }
}

impl Declaration {
    /// Validate every task, attributing the first failure to its task.
    pub fn resolve(&self) -> Result<Vec<ResolvedTask>> {
        self.tasks
            .iter()
            .map(|task| task.resolve().map_err(|e| e.in_task(&task.name)))
            .collect()
    }
}

fn decode_args<T: DeserializeOwned>(kind: ResourceKind, args: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|e| Error::InvalidArgs {
        resource: kind,
        message: e.to_string(),
    })
}

/// Lifecycle of a task inside one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Dispatched,
    Succeeded,
    Failed,
}

/// What happened to one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub name: String,
    pub state: TaskState,
    pub changed: bool,
    /// Service restarted because of this task
    pub restarted: Option<String>,
}

/// Summary of a completed run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub changed: usize,
    pub unchanged: usize,
    pub restarts: usize,
    /// Mutating commands issued (or, in a dry run, that would be issued)
    pub mutations: usize,
    pub tasks: Vec<TaskReport>,
}

impl ExecuteSummary {
    /// Total number of tasks processed
    pub fn total(&self) -> usize {
        self.changed + self.unchanged
    }

    /// Whether the run left the system untouched
    pub fn is_converged(&self) -> bool {
        self.changed == 0
    }

    /// Add a finished task to the summary
    pub fn add_report(&mut self, report: TaskReport) {
        if report.changed {
            self.changed += 1;
        } else {
            self.unchanged += 1;
        }
        if report.restarted.is_some() {
            self.restarts += 1;
        }
        self.tasks.push(report);
    }
}

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Probe only; report changes without making them
    pub dry_run: bool,
    /// Elevation applied to mutating commands
    pub privilege: Privilege,
}
