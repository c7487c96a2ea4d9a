//! Process execution for the convergence engine

use anyhow::{Context, Result};
use declarative::{CommandError, CommandOutput, CommandRunner, Invocation};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs invocations as real child processes
///
/// Output is always captured. With `stream` set, output of invocations
/// marked live (changes and restarts) is also echoed as it arrives.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    pub stream: bool,
    pub timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(stream: bool, timeout: Option<Duration>) -> Self {
        Self { stream, timeout }
    }

    fn wait(&self, child: &mut Child, invocation: &Invocation) -> Result<ExitStatus, CommandError> {
        let spawn_error = |source| CommandError::Spawn {
            command: invocation.to_string(),
            source,
        };

        let Some(limit) = self.timeout else {
            return child.wait().map_err(spawn_error);
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(spawn_error)? {
                return Ok(status);
            }
            if started.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CommandError::TimedOut {
                    command: invocation.to_string(),
                    timeout: limit,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[derive(Clone, Copy)]
enum Echo {
    Off,
    Stdout,
    Stderr,
}

/// Drain a pipe on its own thread so neither pipe can fill up and block the child
fn drain<R: Read + Send + 'static>(pipe: Option<R>, echo: Echo) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut captured = Vec::new();
        let Some(pipe) = pipe else {
            return captured;
        };
        let mut reader = BufReader::new(pipe);
        let mut chunk = Vec::new();
        while let Ok(n) = reader.read_until(b'\n', &mut chunk) {
            if n == 0 {
                break;
            }
            let _ = match echo {
                Echo::Off => Ok(()),
                Echo::Stdout => io::stdout().write_all(&chunk),
                Echo::Stderr => io::stderr().write_all(&chunk),
            };
            captured.append(&mut chunk);
        }
        captured
    })
}

/// Write stdin on its own thread so a child that never reads it cannot block the timeout
fn feed(input: Option<String>, pipe: Option<ChildStdin>) -> Option<JoinHandle<io::Result<()>>> {
    let (input, mut pipe) = (input?, pipe?);
    Some(thread::spawn(move || {
        match pipe.write_all(input.as_bytes()) {
            // A child that exits without reading stdin is reported through its status.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            result => result,
        }
    }))
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let spawn_error = |source| CommandError::Spawn {
            command: invocation.to_string(),
            source,
        };

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let live = self.stream && invocation.live;
        let stdout = drain(child.stdout.take(), if live { Echo::Stdout } else { Echo::Off });
        let stderr = drain(child.stderr.take(), if live { Echo::Stderr } else { Echo::Off });

        let feeder = feed(invocation.stdin.clone(), child.stdin.take());

        let status = self.wait(&mut child, invocation)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        if let Some(feeder) = feeder
            && let Ok(Err(e)) = feeder.join()
        {
            return Err(spawn_error(e));
        }

        log::trace!("{} exited with {status}", invocation.program);
        Ok(CommandOutput {
            stdout,
            stderr,
            success: status.success(),
            code: status.code(),
        })
    }
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run a command and inherit stdio (shows output and prompts in real-time)
pub fn run_interactive(cmd: &str, args: &[&str]) -> Result<ExitStatus> {
    Command::new(cmd)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))
}
