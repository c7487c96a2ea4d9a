//! Scoped sudo context
//!
//! Mutating commands, and the file probes that may need to see root-only
//! paths, are prefixed with `sudo` unless the process already runs as root.
//! The credential is validated once up front so a password prompt never
//! lands in the middle of a run.

use anyhow::{Context, Result, bail};
use declarative::Privilege;

use crate::runner;

/// Pick the elevation for mutating commands
pub fn privilege_for(no_sudo: bool) -> Privilege {
    choose_privilege(no_sudo, is_root())
}

fn choose_privilege(no_sudo: bool, root: bool) -> Privilege {
    if no_sudo || root {
        Privilege::None
    } else {
        Privilege::Sudo
    }
}

/// Whether the process runs with an effective uid of 0
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

/// Scoped sudo context - invalidates the credential cache on drop
pub struct SudoContext {
    _private: (),
}

impl SudoContext {
    /// Acquire sudo privileges with a reason shown to user
    pub fn acquire(reason: &str) -> Result<Self> {
        if !runner::command_exists("sudo") {
            bail!("sudo is not installed; run as root or pass --no-sudo");
        }

        eprintln!();
        eprintln!("  Sudo required: {reason}");
        eprintln!();

        // Will prompt for a password when nothing is cached
        let status = runner::run_interactive("sudo", &["-v"]).context("Failed to execute sudo")?;

        if !status.success() {
            bail!("Failed to acquire sudo privileges");
        }

        log::debug!("sudo credential validated");
        Ok(Self { _private: () })
    }
}

impl Drop for SudoContext {
    fn drop(&mut self) {
        let _ = std::process::Command::new("sudo").arg("-k").status();
        log::debug!("sudo credential released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_sudo_flag_wins() {
        assert_eq!(choose_privilege(true, false), Privilege::None);
        assert_eq!(choose_privilege(true, true), Privilege::None);
    }

    #[test]
    fn test_root_needs_no_elevation() {
        assert_eq!(choose_privilege(false, true), Privilege::None);
    }

    #[test]
    fn test_unprivileged_user_elevates() {
        assert_eq!(choose_privilege(false, false), Privilege::Sudo);
    }

    #[test]
    fn test_privilege_for_matches_euid() {
        let expected = if is_root() {
            Privilege::None
        } else {
            Privilege::Sudo
        };
        assert_eq!(privilege_for(false), expected);
    }
}
