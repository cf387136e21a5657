//! External command execution with hard per-call deadlines, plus one-shot
//! tool availability detection.
//!
//! Every external diagnostic the collector runs is read-only and bounded: a
//! command that has not exited by its deadline is killed and reported as
//! missing output, never as an error. Which tools exist on the host is
//! resolved once per collection run and carried in a [`Toolbox`], so probes
//! never block on spawn attempts for absent binaries.

use std::collections::BTreeSet;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Deadline applied to every external command invocation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one bounded command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Whether the process exited with status zero.
    pub ok: bool,
    /// Captured stdout; stderr is substituted when stdout is blank.
    pub text: String,
}

/// Check whether a command exists using `which`.
pub fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Run a command with a hard deadline.
///
/// Returns `None` on spawn failure or timeout. Stdout and stderr are drained
/// on reader threads while the exit status is polled; the pipes must stay
/// drained during the wait or a chatty child blocks on a full pipe and gets
/// killed as a false timeout.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Option<CommandOutput> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .ok()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || drain(stdout));
    let stderr_reader = std::thread::spawn(move || drain(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    log::debug!("command timed out after {timeout:?}: {program}");
                    return None;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_reader.join();
                let _ = stderr_reader.join();
                return None;
            }
        }
    };

    let stdout_text = stdout_reader.join().unwrap_or_default();
    let stderr_text = stderr_reader.join().unwrap_or_default();
    let text = if stdout_text.trim().is_empty() && !stderr_text.trim().is_empty() {
        stderr_text
    } else {
        stdout_text
    };
    Some(CommandOutput { ok: status.success(), text })
}

fn drain(pipe: Option<impl Read>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// The set of external commands available on the host, resolved once.
///
/// Probes go through the toolbox for every invocation, so pointing tests at
/// [`Toolbox::empty`] (or a curated [`Toolbox::with_available`]) turns all
/// command-backed fields into deterministic nulls.
#[derive(Debug, Clone)]
pub struct Toolbox {
    available: BTreeSet<String>,
    timeout: Duration,
}

impl Toolbox {
    /// Probe the current host for each of `names`.
    pub fn detect(names: &[&str]) -> Self {
        let available: BTreeSet<String> = names
            .iter()
            .filter(|name| command_exists(name))
            .map(|name| name.to_string())
            .collect();
        for name in names {
            if !available.contains(*name) {
                log::debug!("tool not found: {name}");
            }
        }
        Toolbox { available, timeout: COMMAND_TIMEOUT }
    }

    /// Toolbox with a fixed availability set, bypassing host detection.
    pub fn with_available<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Toolbox {
            available: names.into_iter().map(Into::into).collect(),
            timeout: COMMAND_TIMEOUT,
        }
    }

    /// Toolbox with no tools at all; every run returns `None`.
    pub fn empty() -> Self {
        Toolbox { available: BTreeSet::new(), timeout: COMMAND_TIMEOUT }
    }

    /// Replace the per-command deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether `name` was found at detection time.
    pub fn has(&self, name: &str) -> bool {
        self.available.contains(name)
    }

    /// Run an available tool, yielding output only on a zero exit status.
    pub fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let output = self.invoke(program, args)?;
        if output.ok { Some(output.text) } else { None }
    }

    /// Run an available tool, yielding output regardless of exit status.
    /// Some diagnostics (`tuned-adm active`, `docker info` without a daemon)
    /// report useful state through a non-zero exit.
    pub fn run_lenient(&self, program: &str, args: &[&str]) -> Option<String> {
        self.invoke(program, args).map(|output| output.text)
    }

    fn invoke(&self, program: &str, args: &[&str]) -> Option<CommandOutput> {
        if !self.has(program) {
            return None;
        }
        run_with_timeout(program, args, self.timeout)
    }
}
