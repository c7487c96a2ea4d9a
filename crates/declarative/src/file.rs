//! File resource
//!
//! A file task is a fixed sequence of independent sub-operations, each with
//! its own probe and gate: existence, content, owner, group, perms. A removal
//! replaces the whole sequence. The task changed if any sub-operation did.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::command::Invocation;
use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::gate::ChangeSet;
use crate::resource::Resource;
use crate::types::{ResourceKind, Verb};

/// File verbs
///
/// `create` and `modify` run the same sequence; existence comes first, so
/// modifying a missing file creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCommand {
    Create,
    Modify,
    Delete,
}

impl Verb for FileCommand {
    const KIND: ResourceKind = ResourceKind::File;
    const ALL: &'static [Self] = &[Self::Create, Self::Modify, Self::Delete];

    fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for FileCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Characters allowed in an octal (`0644`) or symbolic (`u+x,g-w`) mode
const MODE_CHARS: &str = "01234567ugoarwxXst+-=,";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileArgs {
    /// File name inside `path`
    pub name: String,
    /// Directory holding the file
    pub path: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    /// Octal ("0644") or symbolic ("u+x") mode
    #[serde(default)]
    pub perms: Option<String>,
    #[serde(default)]
    pub remove: bool,
}

impl FileArgs {
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(Error::InvalidArgs {
                resource: ResourceKind::File,
                message: message.to_string(),
            })
        };

        if self.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        if self.name.contains('/') {
            return invalid("name must be a bare file name; put directories in path");
        }
        if self.path.trim().is_empty() {
            return invalid("path must not be empty");
        }
        for (field, value) in [
            ("owner", &self.owner),
            ("group", &self.group),
            ("perms", &self.perms),
        ] {
            if value.as_ref().is_some_and(|v| v.trim().is_empty()) {
                return invalid(&format!("{field} must not be empty when given"));
            }
        }
        // Values reach chown/chgrp/touch as operands and must not parse as options.
        for (field, value) in [
            ("path", Some(&self.path)),
            ("owner", self.owner.as_ref()),
            ("group", self.group.as_ref()),
        ] {
            if value.is_some_and(|v| v.starts_with('-')) {
                return invalid(&format!("{field} must not start with '-'"));
            }
        }
        if let Some(perms) = &self.perms
            && (perms.starts_with("--") || !perms.chars().all(|c| MODE_CHARS.contains(c)))
        {
            return invalid(&format!("perms '{perms}' is not an octal or symbolic mode"));
        }
        Ok(())
    }

    /// `path/name`
    pub fn target(&self) -> String {
        Path::new(&self.path).join(&self.name).display().to_string()
    }
}

/// A file whose existence, content and metadata are managed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResource {
    pub command: FileCommand,
    pub args: FileArgs,
}

impl FileResource {
    pub fn description(&self) -> String {
        if self.removes() {
            format!("delete file {}", self.args.target())
        } else {
            format!("{} file {}", self.command, self.args.target())
        }
    }

    /// Whether this task deletes the file instead of managing it
    pub fn removes(&self) -> bool {
        self.args.remove || self.command == FileCommand::Delete
    }

    /// Run the sub-operations in order; returns whether any of them changed.
    pub fn apply(&self, ctx: &mut ApplyContext) -> Result<bool> {
        let target = self.args.target();

        if self.removes() {
            return Removal { target: &target }.apply(ctx);
        }

        let created = Existence { target: &target }.apply(ctx)?;
        let mut changed = created;

        if let Some(content) = &self.args.content {
            changed |= Content {
                target: &target,
                content,
            }
            .apply(ctx)?;
        }
        if let Some(owner) = &self.args.owner {
            changed |= Ownership {
                target: &target,
                field: OwnershipField::Owner,
                desired: owner,
            }
            .apply(ctx)?;
        }
        if let Some(group) = &self.args.group {
            changed |= Ownership {
                target: &target,
                field: OwnershipField::Group,
                desired: group,
            }
            .apply(ctx)?;
        }
        if let Some(perms) = &self.args.perms {
            changed |= Mode {
                target: &target,
                desired: perms,
                created,
            }
            .apply(ctx)?;
        }

        Ok(changed)
    }
}

/// Whether `target` is a regular file, following symlinks
///
/// The path is tested literally; glob characters in the name carry no
/// meaning.
fn file_exists(ctx: &ApplyContext, target: &str) -> bool {
    let test = Invocation::new("test").args(["-f", target]);
    match ctx.inspect(&test) {
        Ok(output) => output.success,
        Err(e) => {
            log::debug!("existence probe for {target} failed: {e}");
            false
        }
    }
}

/// Read a single `stat` field; `None` when the file cannot be inspected
fn stat_field(ctx: &ApplyContext, format: &str, target: &str) -> Option<String> {
    let stat = Invocation::new("stat").args(["-c", format, target]);
    match ctx.inspect(&stat) {
        Ok(output) if output.success => Some(output.stdout_str().trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            log::debug!("stat {format} {target} failed: {e}");
            None
        }
    }
}

struct Existence<'a> {
    target: &'a str,
}

impl Resource for Existence<'_> {
    type State = bool;

    fn description(&self) -> String {
        format!("create {}", self.target)
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<bool> {
        Ok(file_exists(ctx, self.target))
    }

    fn needs_apply(&self, exists: &bool) -> bool {
        !exists
    }

    fn change_command(&self) -> ChangeSet {
        ChangeSet::new(self.description()).step(Invocation::new("touch").arg(self.target))
    }
}

struct Removal<'a> {
    target: &'a str,
}

impl Resource for Removal<'_> {
    type State = bool;

    fn description(&self) -> String {
        format!("delete {}", self.target)
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<bool> {
        Ok(file_exists(ctx, self.target))
    }

    fn needs_apply(&self, exists: &bool) -> bool {
        *exists
    }

    fn change_command(&self) -> ChangeSet {
        ChangeSet::new(self.description())
            .step(Invocation::new("rm").args(["-f", self.target]))
    }
}

/// Compares the bytes on disk with the desired content
struct Content<'a> {
    target: &'a str,
    content: &'a str,
}

impl Resource for Content<'_> {
    /// Current content, `None` when unreadable
    type State = Option<Vec<u8>>;

    fn description(&self) -> String {
        format!("write content of {}", self.target)
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<Option<Vec<u8>>> {
        let cat = Invocation::new("cat").arg(self.target);
        match ctx.inspect(&cat) {
            Ok(output) if output.success => Ok(Some(output.stdout)),
            Ok(_) => Ok(None),
            Err(e) => {
                log::debug!("reading {} failed: {e}", self.target);
                Ok(None)
            }
        }
    }

    fn needs_apply(&self, current: &Option<Vec<u8>>) -> bool {
        current.as_deref() != Some(self.content.as_bytes())
    }

    fn change_command(&self) -> ChangeSet {
        ChangeSet::new(self.description())
            .step(Invocation::new("tee").arg(self.target).stdin(self.content))
    }
}

#[derive(Clone, Copy)]
enum OwnershipField {
    Owner,
    Group,
}

struct Ownership<'a> {
    target: &'a str,
    field: OwnershipField,
    desired: &'a str,
}

impl Resource for Ownership<'_> {
    type State = Option<String>;

    fn description(&self) -> String {
        match self.field {
            OwnershipField::Owner => format!("set owner of {} to {}", self.target, self.desired),
            OwnershipField::Group => format!("set group of {} to {}", self.target, self.desired),
        }
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<Option<String>> {
        let format = match self.field {
            OwnershipField::Owner => "%U",
            OwnershipField::Group => "%G",
        };
        Ok(stat_field(ctx, format, self.target))
    }

    fn needs_apply(&self, current: &Option<String>) -> bool {
        current.as_deref() != Some(self.desired)
    }

    fn change_command(&self) -> ChangeSet {
        let tool = match self.field {
            OwnershipField::Owner => "chown",
            OwnershipField::Group => "chgrp",
        };
        ChangeSet::new(self.description())
            .step(Invocation::new(tool).args([self.desired, self.target]))
    }
}

/// Permission bits
///
/// Octal modes are compared against the live mode. Symbolic modes cannot be
/// compared without evaluating them, so they only apply to a file the
/// existence step just created.
struct Mode<'a> {
    target: &'a str,
    desired: &'a str,
    created: bool,
}

impl Mode<'_> {
    fn octal(&self) -> Option<String> {
        normalize_octal(self.desired)
    }
}

/// "0644" -> "644", "755" -> "755"; `None` for anything that is not octal
fn normalize_octal(mode: &str) -> Option<String> {
    let mode = mode.trim();
    if mode.is_empty() || mode.len() > 5 || !mode.chars().all(|c| ('0'..='7').contains(&c)) {
        return None;
    }
    let trimmed = mode.trim_start_matches('0');
    Some(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
}

impl Resource for Mode<'_> {
    /// Live mode in `stat %a` form, `None` when unknown or not probed
    type State = Option<String>;

    fn description(&self) -> String {
        format!("set mode of {} to {}", self.target, self.desired)
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<Option<String>> {
        if self.octal().is_none() {
            return Ok(None);
        }
        Ok(stat_field(ctx, "%a", self.target))
    }

    fn needs_apply(&self, current: &Option<String>) -> bool {
        match self.octal() {
            Some(desired) => current.as_deref().and_then(normalize_octal) != Some(desired),
            None => self.created,
        }
    }

    fn change_command(&self) -> ChangeSet {
        ChangeSet::new(self.description())
            .step(Invocation::new("chmod").args([self.desired, self.target]))
    }
}
