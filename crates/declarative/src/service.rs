//! systemd service resource

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::command::Invocation;
use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::gate::ChangeSet;
use crate::resource::Resource;
use crate::types::{ResourceKind, Verb};

/// Service lifecycle verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    Start,
    Restart,
    Stop,
}

impl Verb for ServiceCommand {
    const KIND: ResourceKind = ResourceKind::Service;
    const ALL: &'static [Self] = &[Self::Start, Self::Restart, Self::Stop];

    fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Restart => "restart",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for ServiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceArgs {
    /// systemd unit name
    pub service: String,
}

impl ServiceArgs {
    pub fn validate(&self) -> Result<()> {
        if self.service.trim().is_empty() {
            return Err(Error::InvalidArgs {
                resource: ResourceKind::Service,
                message: "service must not be empty".to_string(),
            });
        }
        if self.service.starts_with('-') || self.service.contains(char::is_whitespace) {
            return Err(Error::InvalidArgs {
                resource: ResourceKind::Service,
                message: format!("'{}' is not a unit name", self.service),
            });
        }
        Ok(())
    }
}

/// A lifecycle action on a systemd unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResource {
    pub command: ServiceCommand,
    pub args: ServiceArgs,
}

impl Resource for ServiceResource {
    /// Output of `systemctl is-enabled` ("enabled", "disabled", "masked", ...)
    type State = String;

    fn description(&self) -> String {
        format!("{} service {}", self.command, self.args.service)
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<String> {
        let query = Invocation::new("systemctl").args(["is-enabled", self.args.service.as_str()]);

        // is-enabled exits non-zero for anything but "enabled"; only a spawn
        // failure is an error here.
        let output = ctx.probe(&query).map_err(|source| Error::Probe {
            description: format!("enabled state of {}", self.args.service),
            source,
        })?;
        Ok(output.stdout_str().trim().to_string())
    }

    fn needs_apply(&self, state: &String) -> bool {
        match self.command {
            ServiceCommand::Start => state == "disabled",
            ServiceCommand::Restart | ServiceCommand::Stop => state == "enabled",
        }
    }

    fn change_command(&self) -> ChangeSet {
        ChangeSet::new(self.description()).step(
            Invocation::new("systemctl").args([self.command.as_str(), self.args.service.as_str()]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Privilege;
    use crate::context::NoProgress;
    use crate::testing::FakeHost;

    fn service(command: ServiceCommand, unit: &str) -> ServiceResource {
        ServiceResource {
            command,
            args: ServiceArgs {
                service: unit.to_string(),
            },
        }
    }

    fn apply(host: &FakeHost, resource: &ServiceResource) -> bool {
        let mut progress = NoProgress;
        let mut ctx = ApplyContext::new(host, &mut progress, false, Privilege::None);
        resource.apply(&mut ctx).unwrap()
    }

    #[test]
    fn test_stop_on_disabled_unit_issues_nothing() {
        let host = FakeHost::new().with_service("nginx", "disabled");

        assert!(!apply(&host, &service(ServiceCommand::Stop, "nginx")));
        assert!(host.mutations().is_empty());
    }

    #[test]
    fn test_stop_on_enabled_unit() {
        let host = FakeHost::new().with_service("nginx", "enabled");

        assert!(apply(&host, &service(ServiceCommand::Stop, "nginx")));
        assert_eq!(host.mutations(), vec!["systemctl stop nginx"]);
    }

    #[test]
    fn test_start_applies_when_disabled() {
        let host = FakeHost::new().with_service("nginx", "disabled");
        assert!(apply(&host, &service(ServiceCommand::Start, "nginx")));
        assert_eq!(host.mutations(), vec!["systemctl start nginx"]);

        let host = FakeHost::new().with_service("nginx", "enabled");
        assert!(!apply(&host, &service(ServiceCommand::Start, "nginx")));
    }

    #[test]
    fn test_restart_applies_when_enabled() {
        let host = FakeHost::new().with_service("nginx", "enabled");
        assert!(apply(&host, &service(ServiceCommand::Restart, "nginx")));
        assert_eq!(host.restarts("nginx"), 1);

        let host = FakeHost::new().with_service("nginx", "masked");
        assert!(!apply(&host, &service(ServiceCommand::Restart, "nginx")));
        assert_eq!(host.restarts("nginx"), 0);
    }

    #[test]
    fn test_unknown_unit_is_left_alone() {
        let host = FakeHost::new();

        assert!(!apply(&host, &service(ServiceCommand::Start, "ghost")));
        assert!(!apply(&host, &service(ServiceCommand::Stop, "ghost")));
        assert!(host.mutations().is_empty());
    }

    #[test]
    fn test_failed_action_is_changeset_error() {
        let host = FakeHost::new()
            .with_service("nginx", "enabled")
            .fail_on("systemctl stop");
        let mut progress = NoProgress;
        let mut ctx = ApplyContext::new(&host, &mut progress, false, Privilege::None);

        let err = service(ServiceCommand::Stop, "nginx")
            .apply(&mut ctx)
            .unwrap_err();
        assert!(matches!(err, Error::ChangesetExecution { .. }));
    }

    #[test]
    fn test_option_like_unit_is_invalid() {
        for unit in ["--all", "-H", "nginx php-fpm", " "] {
            let args = ServiceArgs {
                service: unit.into(),
            };
            assert!(
                matches!(args.validate(), Err(Error::InvalidArgs { .. })),
                "{unit}"
            );
        }
        let args = ServiceArgs {
            service: "php8.2-fpm.service".into(),
        };
        assert!(args.validate().is_ok());
    }
}
