//! Check-command execution against staged output.

use crate::constants::{FILE_PLACEHOLDER, SHELL};
use crate::error::{Error, Result};
use log::debug;
use minijinja::{context, Environment};
use std::fmt;
use std::path::Path;
use std::process::{Command, Output};

/// External command that decides whether staged output may be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckCommand {
    /// Shell command template; `{{ src }}` expands to the staged file path.
    /// Runs through `/bin/sh -c` with stderr merged into stdout.
    Shell(String),
    /// Program followed by its arguments; every argument equal to `FILE`
    /// is replaced by the staged file path. Runs without a shell.
    Argv(Vec<String>),
}

impl fmt::Display for CheckCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckCommand::Shell(cmd) => write!(f, "{cmd}"),
            CheckCommand::Argv(argv) => write!(f, "{}", argv.join(" ")),
        }
    }
}

impl CheckCommand {
    /// Substitutes the staged path into the command.
    pub fn expand(&self, staged: &Path) -> Result<CheckCommand> {
        let src = staged.display().to_string();
        match self {
            CheckCommand::Shell(cmd) => Environment::new()
                .render_str(cmd, context! { src => src })
                .map(CheckCommand::Shell)
                .map_err(|e| Error::ConfigError(format!("invalid check command '{cmd}': {e}"))),
            CheckCommand::Argv(argv) => Ok(CheckCommand::Argv(
                argv.iter()
                    .map(|arg| if arg == FILE_PLACEHOLDER { src.clone() } else { arg.clone() })
                    .collect(),
            )),
        }
    }

    fn run(&self) -> Result<(Output, String)> {
        let output = match self {
            CheckCommand::Shell(cmd) => Command::new(SHELL).arg("-c").arg(format!("exec 2>&1\n{cmd}")).output(),
            CheckCommand::Argv(argv) => {
                let (program, args) = argv
                    .split_first()
                    .ok_or_else(|| Error::ConfigError("empty check command".to_string()))?;
                Command::new(program).args(args).output()
            }
        }
        .map_err(|e| Error::ConfigError(format!("cannot run check command `{self}`: {e}")))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok((output, combined))
    }
}

/// Runs `check` against the file at `staged`.
///
/// # Errors
/// * `Error::ValidationError` if the command exits non-zero, carrying its
///   status and captured output
/// * `Error::ConfigError` if the command cannot be expanded or started
pub fn validate(check: &CheckCommand, staged: &Path) -> Result<()> {
    let command = check.expand(staged)?;
    debug!("Running {}", command);

    let (output, combined) = command.run()?;
    if !output.status.success() {
        return Err(Error::ValidationError {
            command: command.to_string(),
            status: output.status,
            output: combined,
        });
    }

    debug!("{:?}", combined);
    Ok(())
}
