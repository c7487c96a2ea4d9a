//! Debian package resource (dpkg/apt)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::command::Invocation;
use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::gate::ChangeSet;
use crate::resource::Resource;
use crate::types::{ResourceKind, Verb};

/// Package verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageCommand {
    Install,
    Upgrade,
    Remove,
}

impl Verb for PackageCommand {
    const KIND: ResourceKind = ResourceKind::Package;
    const ALL: &'static [Self] = &[Self::Install, Self::Upgrade, Self::Remove];

    fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for PackageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageArgs {
    /// Debian package name, optionally qualified with an architecture
    /// (`libc6:i386`). Version pins and release suffixes are rejected
    /// because the installed-state probe could never match them.
    pub package: String,
}

impl PackageArgs {
    pub fn validate(&self) -> Result<()> {
        if self.package.trim().is_empty() {
            return Err(Error::InvalidArgs {
                resource: ResourceKind::Package,
                message: "package must not be empty".to_string(),
            });
        }
        if !is_package_name(&self.package) {
            return Err(Error::InvalidArgs {
                resource: ResourceKind::Package,
                message: format!(
                    "'{}' is not a package name; version pins (=) and releases (/) are not supported",
                    self.package
                ),
            });
        }
        Ok(())
    }
}

/// `name[:arch]` following Debian policy: lowercase alphanumerics plus `+-.`,
/// starting with an alphanumeric
fn is_package_name(spec: &str) -> bool {
    let (name, arch) = match spec.split_once(':') {
        Some((name, arch)) => (name, Some(arch)),
        None => (spec, None),
    };
    let name_ok = name.len() >= 2
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+-.".contains(c));
    let arch_ok = arch.is_none_or(|a| {
        !a.is_empty()
            && a.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    });
    name_ok && arch_ok
}

/// A package that should be installed, upgraded or removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageResource {
    pub command: PackageCommand,
    pub args: PackageArgs,
}

const INSTALLED_STATUS: &str = "install ok installed";

impl Resource for PackageResource {
    /// Whether the package is installed
    type State = bool;

    fn description(&self) -> String {
        format!("{} package {}", self.command, self.args.package)
    }

    /// A failed query means "not installed", never an error.
    fn current_state(&self, ctx: &ApplyContext) -> Result<bool> {
        let query =
            Invocation::new("dpkg-query").args(["-W", "-f=${Status}", self.args.package.as_str()]);

        match ctx.probe(&query) {
            Ok(output) if output.success => Ok(output.stdout_str().contains(INSTALLED_STATUS)),
            Ok(_) => Ok(false),
            Err(e) => {
                log::debug!("package query for {} failed: {e}", self.args.package);
                Ok(false)
            }
        }
    }

    fn needs_apply(&self, installed: &bool) -> bool {
        match self.command {
            PackageCommand::Install | PackageCommand::Upgrade => !installed,
            PackageCommand::Remove => *installed,
        }
    }

    fn change_command(&self) -> ChangeSet {
        let apt = |args: &[&str]| {
            Invocation::new("apt-get")
                .args(args.iter().copied())
                .env("DEBIAN_FRONTEND", "noninteractive")
        };

        ChangeSet::new(self.description())
            .step(apt(&["update"]))
            .step(apt(&[self.command.as_str(), "-y", self.args.package.as_str()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Privilege;
    use crate::context::NoProgress;
    use crate::testing::FakeHost;

    fn package(command: PackageCommand, name: &str) -> PackageResource {
        PackageResource {
            command,
            args: PackageArgs {
                package: name.to_string(),
            },
        }
    }

    fn apply(host: &FakeHost, resource: &PackageResource) -> bool {
        let mut progress = NoProgress;
        let mut ctx = ApplyContext::new(host, &mut progress, false, Privilege::None);
        resource.apply(&mut ctx).unwrap()
    }

    #[test]
    fn test_install_when_absent() {
        let host = FakeHost::new();

        assert!(apply(&host, &package(PackageCommand::Install, "nginx")));
        assert!(host.has_package("nginx"));
        assert_eq!(
            host.mutations(),
            vec![
                "DEBIAN_FRONTEND=noninteractive apt-get update",
                "DEBIAN_FRONTEND=noninteractive apt-get install -y nginx",
            ]
        );
    }

    #[test]
    fn test_install_when_present_only_probes() {
        let host = FakeHost::new().with_package("nginx");

        assert!(!apply(&host, &package(PackageCommand::Install, "nginx")));
        assert_eq!(host.commands(), vec!["dpkg-query -W -f=${Status} nginx"]);
    }

    #[test]
    fn test_upgrade_applies_only_when_absent() {
        let host = FakeHost::new().with_package("curl");
        assert!(!apply(&host, &package(PackageCommand::Upgrade, "curl")));

        let host = FakeHost::new();
        assert!(apply(&host, &package(PackageCommand::Upgrade, "curl")));
        assert!(
            host.mutations()
                .last()
                .is_some_and(|c| c.ends_with("apt-get upgrade -y curl"))
        );
    }

    #[test]
    fn test_remove_when_present() {
        let host = FakeHost::new().with_package("telnet");

        assert!(apply(&host, &package(PackageCommand::Remove, "telnet")));
        assert!(!host.has_package("telnet"));
    }

    #[test]
    fn test_remove_when_absent_is_noop() {
        let host = FakeHost::new();

        assert!(!apply(&host, &package(PackageCommand::Remove, "telnet")));
        assert!(host.mutations().is_empty());
    }

    #[test]
    fn test_failed_query_counts_as_not_installed() {
        let host = FakeHost::new().with_package("nginx").fail_on("dpkg-query");

        assert!(apply(&host, &package(PackageCommand::Install, "nginx")));
        assert_eq!(host.mutations().len(), 2);
    }

    #[test]
    fn test_failed_install_is_changeset_error() {
        let host = FakeHost::new().fail_on("install -y");
        let mut progress = NoProgress;
        let mut ctx = ApplyContext::new(&host, &mut progress, false, Privilege::None);

        let err = package(PackageCommand::Install, "nginx")
            .apply(&mut ctx)
            .unwrap_err();
        assert!(matches!(err, Error::ChangesetExecution { .. }));
    }

    #[test]
    fn test_empty_package_is_invalid() {
        let args = PackageArgs {
            package: "  ".into(),
        };
        assert!(matches!(args.validate(), Err(Error::InvalidArgs { .. })));
    }

    #[test]
    fn test_version_pins_and_releases_are_rejected() {
        for spec in [
            "nginx=1.18.0-1",
            "nginx/bookworm-backports",
            "-oDpkg::Options::=--force-all",
            "Nginx",
            "nginx curl",
        ] {
            let args = PackageArgs {
                package: spec.into(),
            };
            assert!(
                matches!(args.validate(), Err(Error::InvalidArgs { .. })),
                "{spec}"
            );
        }
    }

    #[test]
    fn test_plain_and_arch_qualified_names_are_valid() {
        for spec in ["nginx", "libstdc++6", "php8.2-fpm", "libc6:i386"] {
            let args = PackageArgs {
                package: spec.into(),
            };
            assert!(args.validate().is_ok(), "{spec}");
        }
    }
}
