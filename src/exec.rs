//! Planned external-tool invocations and their execution.
//!
//! Commands are planned as plain [`CommandSpec`] data so construction stays
//! unit-testable without spawning anything; execution is a separate step.

use anyhow::{Context, Result, bail};
use std::ffi::OsString;
use std::process::{Command, Output, Stdio};

/// One planned subprocess invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Human-readable rendering for status output.
    pub fn rendered(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().map(|arg| arg.to_string_lossy().into_owned()));
        parts.join(" ")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// Run a planned command, capturing output; fail with the tool's stderr when
/// it exits non-zero.
pub fn run_checked(spec: &CommandSpec) -> Result<Output> {
    let output = spec
        .command()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to execute {}", spec.rendered()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        bail!(
            "{} failed ({}):\n{}{}",
            spec.rendered(),
            output.status,
            stderr.trim_end(),
            if stdout.trim().is_empty() {
                String::new()
            } else {
                format!("\n{}", stdout.trim_end())
            }
        );
    }
    Ok(output)
}

/// Run a planned command, reporting only whether it succeeded.
///
/// Spawn failures still surface as errors; only a non-zero exit maps to
/// `Ok(false)`.
pub fn run_status(spec: &CommandSpec) -> Result<bool> {
    let output = spec
        .command()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to execute {}", spec.rendered()))?;
    Ok(output.status.success())
}

/// Run a planned command with inherited stdio (interactive tools like the
/// serial monitor).
pub fn run_interactive(spec: &CommandSpec) -> Result<()> {
    let status = spec
        .command()
        .status()
        .with_context(|| format!("failed to execute {}", spec.rendered()))?;
    if !status.success() {
        bail!("{} failed ({status})", spec.rendered());
    }
    Ok(())
}
