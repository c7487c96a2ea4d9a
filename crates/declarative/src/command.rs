//! Argument-list command invocations and the runner abstraction
//!
//! Every probe and every change is expressed as an [`Invocation`]: a program
//! plus argv, never a shell string, so resource names and file content cannot
//! inject shell syntax.

use std::fmt;
use std::process::Output;

use crate::error::CommandError;

/// How mutating commands are elevated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Privilege {
    /// Run commands as the current user
    #[default]
    None,
    /// Prefix mutating commands with `sudo`
    Sudo,
}

/// A single external command: program, arguments, environment and stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<String>,
    /// Output may be echoed to the terminal while it is captured
    pub live: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            live: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }

    /// Wrap this invocation for the given privilege level.
    ///
    /// `sudo` resets the environment, so variables are forwarded through
    /// `env NAME=value` inside the elevated command.
    pub fn privileged(self, privilege: Privilege) -> Self {
        match privilege {
            Privilege::None => self,
            Privilege::Sudo => {
                let mut args = Vec::with_capacity(self.args.len() + self.env.len() + 2);
                if !self.env.is_empty() {
                    args.push("env".to_string());
                    args.extend(self.env.iter().map(|(k, v)| format!("{k}={v}")));
                }
                args.push(self.program);
                args.extend(self.args);
                Self {
                    program: "sudo".to_string(),
                    args,
                    env: Vec::new(),
                    stdin: self.stdin,
                    live: self.live,
                }
            }
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={} ", quote(value))?;
        }
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// Quote an argument for display only; invocations are never run through a shell.
fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:%+@,${}".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    pub code: Option<i32>,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

impl CommandOutput {
    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Blocking executor of external commands
///
/// Implementations only fail with [`CommandError::Spawn`] or
/// [`CommandError::TimedOut`] from `run`; a non-zero exit is reported through
/// [`CommandOutput::success`] so probes can read the output of commands that
/// signal state through their exit code (`systemctl is-enabled`).
pub trait CommandRunner {
    /// Run a command to completion and capture its output
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;

    /// Run a command and turn a non-zero exit into an error
    fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let output = self.run(invocation)?;
        if !output.success {
            return Err(CommandError::Failed {
                command: invocation.to_string(),
                code: output.code,
                stderr: output.stderr_str().trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Run a command and capture stdout
    fn capture(&self, invocation: &Invocation) -> Result<String, CommandError> {
        Ok(self.run_checked(invocation)?.stdout_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_only_when_needed() {
        let inv = Invocation::new("dpkg-query").args(["-W", "-f=${Status}", "nginx"]);
        assert_eq!(inv.to_string(), "dpkg-query -W -f=${Status} nginx");

        let inv = Invocation::new("touch").arg("/tmp/my file; rm -rf /");
        assert_eq!(inv.to_string(), "touch '/tmp/my file; rm -rf /'");
    }

    #[test]
    fn test_privileged_forwards_env() {
        let inv = Invocation::new("apt-get")
            .args(["install", "-y", "nginx"])
            .env("DEBIAN_FRONTEND", "noninteractive")
            .privileged(Privilege::Sudo);

        assert_eq!(inv.program, "sudo");
        assert_eq!(
            inv.args,
            vec!["env", "DEBIAN_FRONTEND=noninteractive", "apt-get", "install", "-y", "nginx"]
        );
        assert!(inv.env.is_empty());
    }

    #[test]
    fn test_privileged_keeps_stdin() {
        let inv = Invocation::new("tee")
            .arg("/etc/motd")
            .stdin("hello")
            .privileged(Privilege::Sudo);
        assert_eq!(inv.args, vec!["tee", "/etc/motd"]);
        assert_eq!(inv.stdin.as_deref(), Some("hello"));
    }

    #[test]
    fn test_no_privilege_is_identity() {
        let inv = Invocation::new("rm").args(["-f", "/tmp/x"]);
        assert_eq!(inv.clone().privileged(Privilege::None), inv);
    }
}
