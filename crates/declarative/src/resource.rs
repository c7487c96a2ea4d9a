//! Resource trait and the closed set of declared resources
//!
//! A resource knows how to read the live state it manages, whether that
//! state calls for a change, and which commands make the change. The
//! default [`Resource::apply`] strings these together through the gate.

use crate::context::ApplyContext;
use crate::error::Result;
use crate::file::FileResource;
use crate::gate::{self, ChangeSet};
use crate::package::PackageResource;
use crate::service::ServiceResource;
use crate::types::ResourceKind;

/// Core trait for check-then-apply resources
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, ChangeSet, Invocation, Resource, Result};
///
/// struct Marker { path: String }
///
/// impl Resource for Marker {
///     type State = bool;
///
///     fn description(&self) -> String {
///         format!("create {}", self.path)
///     }
///
///     fn current_state(&self, ctx: &ApplyContext) -> Result<bool> {
///         let probe = Invocation::new("test").args(["-e", &self.path]);
///         Ok(ctx.probe(&probe).is_ok_and(|o| o.success))
///     }
///
///     fn needs_apply(&self, exists: &bool) -> bool {
///         !exists
///     }
///
///     fn change_command(&self) -> ChangeSet {
///         ChangeSet::new(self.description()).step(Invocation::new("touch").arg(&self.path))
///     }
/// }
/// ```
pub trait Resource {
    /// What a probe of the live system yields
    type State;

    /// Human-readable description of the change this resource makes
    fn description(&self) -> String;

    /// Detect the current state of this resource
    fn current_state(&self, ctx: &ApplyContext) -> Result<Self::State>;

    /// Whether the observed state calls for the change
    fn needs_apply(&self, state: &Self::State) -> bool;

    /// Commands that converge the resource
    fn change_command(&self) -> ChangeSet;

    /// Probe, decide and apply through the gate; returns whether anything changed
    fn apply(&self, ctx: &mut ApplyContext) -> Result<bool> {
        let state = self.current_state(ctx)?;
        let condition = self.needs_apply(&state);
        gate::apply(ctx, condition, &self.change_command())
    }
}

/// A validated resource declaration, one variant per kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSpec {
    Package(PackageResource),
    File(FileResource),
    Service(ServiceResource),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Package(_) => ResourceKind::Package,
            Self::File(_) => ResourceKind::File,
            Self::Service(_) => ResourceKind::Service,
        }
    }

    /// Verb as declared, for display
    pub fn verb(&self) -> &'static str {
        use crate::types::Verb;

        match self {
            Self::Package(r) => r.command.as_str(),
            Self::File(r) => r.command.as_str(),
            Self::Service(r) => r.command.as_str(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Package(r) => r.description(),
            Self::File(r) => r.description(),
            Self::Service(r) => r.description(),
        }
    }

    /// Check argument constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Package(r) => r.args.validate(),
            Self::File(r) => r.args.validate(),
            Self::Service(r) => r.args.validate(),
        }
    }

    /// Converge this resource; returns whether anything changed
    pub fn apply(&self, ctx: &mut ApplyContext) -> Result<bool> {
        match self {
            Self::Package(r) => r.apply(ctx),
            Self::File(r) => r.apply(ctx),
            Self::Service(r) => r.apply(ctx),
        }
    }
}
