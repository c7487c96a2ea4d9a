//! Simulated Debian/systemd host for tests
//!
//! `FakeHost` interprets the exact argv the handlers build, keeps a package
//! database, a flat file table and unit states, and records every command it
//! was asked to run.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use crate::command::{CommandOutput, CommandRunner, Invocation};
use crate::error::CommandError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeFile {
    pub content: String,
    pub owner: String,
    pub group: String,
    pub mode: String,
}

impl Default for FakeFile {
    fn default() -> Self {
        Self {
            content: String::new(),
            owner: "root".into(),
            group: "root".into(),
            mode: "644".into(),
        }
    }
}

#[derive(Default)]
struct HostState {
    packages: BTreeSet<String>,
    files: BTreeMap<String, FakeFile>,
    /// Files only visible to an elevated command
    protected: BTreeSet<String>,
    services: HashMap<String, String>,
    restarts: HashMap<String, usize>,
    commands: Vec<String>,
}

#[derive(Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
    fail_on: Vec<String>,
}

const PROBES: &[&str] = &["dpkg-query", "test", "cat", "stat"];

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(self, name: &str) -> Self {
        self.state.lock().unwrap().packages.insert(name.to_string());
        self
    }

    pub fn with_file(self, path: &str, file: FakeFile) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), file);
        self
    }

    /// A file that only `sudo` can inspect, like one under a 0700 directory
    pub fn with_protected_file(self, path: &str, file: FakeFile) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.files.insert(path.to_string(), file);
            state.protected.insert(path.to_string());
        }
        self
    }

    pub fn with_service(self, unit: &str, enabled_state: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .services
            .insert(unit.to_string(), enabled_state.to_string());
        self
    }

    /// Fail every command whose rendered form contains `pattern`
    pub fn fail_on(mut self, pattern: &str) -> Self {
        self.fail_on.push(pattern.to_string());
        self
    }

    /// Every command run so far, rendered
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Commands run so far that are not state probes
    pub fn mutations(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| !is_probe(c))
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().commands.clear();
    }

    pub fn file(&self, path: &str) -> Option<FakeFile> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.state.lock().unwrap().packages.contains(name)
    }

    pub fn restarts(&self, unit: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .restarts
            .get(unit)
            .copied()
            .unwrap_or(0)
    }
}

fn is_probe(rendered: &str) -> bool {
    let words = strip_elevation(rendered.split(' ').collect());
    match words.as_slice() {
        ["systemctl", "is-enabled", ..] => true,
        [program, ..] => PROBES.contains(program),
        [] => false,
    }
}

fn strip_elevation(mut words: Vec<&str>) -> Vec<&str> {
    if words.first() == Some(&"sudo") {
        words.remove(0);
    }
    if words.first() == Some(&"env") {
        words.remove(0);
        while words.first().is_some_and(|w| w.contains('=')) {
            words.remove(0);
        }
    }
    words
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
        success: true,
        code: Some(0),
    }
}

fn fail(stderr: &str) -> CommandOutput {
    CommandOutput {
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
        success: false,
        code: Some(1),
    }
}

impl HostState {
    fn execute(&mut self, words: &[&str], stdin: Option<&str>, elevated: bool) -> CommandOutput {
        if !elevated
            && let [program @ ("test" | "cat" | "stat"), .., path] = words
            && self.protected.contains(*path)
        {
            return fail(&format!("{program}: {path}: Permission denied"));
        }

        match words {
            ["dpkg-query", "-W", _, package] => {
                if self.packages.contains(*package) {
                    ok("install ok installed")
                } else {
                    fail(&format!("dpkg-query: no packages found matching {package}"))
                }
            }
            ["apt-get", "update"] => ok(""),
            ["apt-get", verb, "-y", package] => {
                match *verb {
                    "install" | "upgrade" => {
                        self.packages.insert((*package).to_string());
                    }
                    "remove" => {
                        self.packages.remove(*package);
                    }
                    _ => return fail("E: Invalid operation"),
                }
                ok("")
            }
            ["test", "-f", path] => {
                if self.files.contains_key(*path) {
                    ok("")
                } else {
                    fail("")
                }
            }
            ["touch", path] => {
                self.files.entry((*path).to_string()).or_default();
                ok("")
            }
            ["cat", path] => match self.files.get(*path) {
                Some(file) => ok(&file.content),
                None => fail("No such file or directory"),
            },
            ["tee", path] => {
                let content = stdin.unwrap_or_default().to_string();
                self.files.entry((*path).to_string()).or_default().content = content.clone();
                ok(&content)
            }
            ["stat", "-c", format, path] => match self.files.get(*path) {
                Some(file) => match *format {
                    "%U" => ok(&format!("{}\n", file.owner)),
                    "%G" => ok(&format!("{}\n", file.group)),
                    "%a" => ok(&format!("{}\n", file.mode)),
                    _ => fail("stat: unsupported format"),
                },
                None => fail("stat: cannot statx: No such file or directory"),
            },
            [tool @ ("chown" | "chgrp" | "chmod"), value, path] => {
                match self.files.get_mut(*path) {
                    Some(file) => {
                        let slot = match *tool {
                            "chown" => &mut file.owner,
                            "chgrp" => &mut file.group,
                            _ => &mut file.mode,
                        };
                        *slot = (*value).to_string();
                        ok("")
                    }
                    None => fail("No such file or directory"),
                }
            }
            ["rm", "-f", path] => {
                self.files.remove(*path);
                ok("")
            }
            ["systemctl", "is-enabled", unit] => {
                let state = self
                    .services
                    .get(*unit)
                    .cloned()
                    .unwrap_or_else(|| "not-found".to_string());
                CommandOutput {
                    success: state == "enabled",
                    code: Some(i32::from(state != "enabled")),
                    ..ok(&format!("{state}\n"))
                }
            }
            ["systemctl", "restart", unit] => {
                *self.restarts.entry((*unit).to_string()).or_default() += 1;
                ok("")
            }
            ["systemctl", "start" | "stop", _] => ok(""),
            _ => fail("command not simulated"),
        }
    }
}

impl CommandRunner for FakeHost {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let rendered = invocation.to_string();
        let mut state = self.state.lock().unwrap();
        state.commands.push(rendered.clone());

        if self.fail_on.iter().any(|p| rendered.contains(p.as_str())) {
            return Ok(fail("simulated failure"));
        }

        let words: Vec<&str> = std::iter::once(invocation.program.as_str())
            .chain(invocation.args.iter().map(String::as_str))
            .collect();
        let elevated = words.first() == Some(&"sudo");
        let words = strip_elevation(words);
        Ok(state.execute(&words, invocation.stdin.as_deref(), elevated))
    }
}
