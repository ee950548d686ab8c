use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use tracing::info;

use crate::error::KiraError;

/// How a failing command is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunPolicy {
    /// Extra attempts after a nonzero exit.
    pub retries: u32,
    /// Log a final nonzero exit and carry on instead of failing.
    pub best_effort: bool,
}

impl RunPolicy {
    pub const fn strict() -> Self {
        Self {
            retries: 0,
            best_effort: false,
        }
    }

    pub const fn retrying(retries: u32) -> Self {
        Self {
            retries,
            best_effort: false,
        }
    }

    pub const fn best_effort() -> Self {
        Self {
            retries: 0,
            best_effort: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub trait CommandRunner {
    fn run(&self, argv: &[String], policy: RunPolicy) -> Result<CommandOutput, KiraError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, argv: &[String], policy: RunPolicy) -> Result<CommandOutput, KiraError> {
        (**self).run(argv, policy)
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    fn run(&self, argv: &[String], policy: RunPolicy) -> Result<CommandOutput, KiraError> {
        (**self).run(argv, policy)
    }
}

/// Runs commands as child processes, logging their output.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, argv: &[String], policy: RunPolicy) -> Result<CommandOutput, KiraError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| KiraError::Filesystem("empty command line".to_string()))?;
        let command_line = argv.join(" ");
        info!("Commands:");
        info!("{command_line}");

        if !program.contains('/') && find_in_path(program).is_none() {
            return Err(KiraError::MissingTool(program.clone()));
        }

        let mut remaining = policy.retries;
        loop {
            let output = Command::new(program).args(args).output().map_err(|err| {
                if err.kind() == io::ErrorKind::NotFound {
                    KiraError::MissingTool(program.clone())
                } else {
                    KiraError::Filesystem(format!("spawn {program}: {err}"))
                }
            })?;
            let result = CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(-1),
            };
            log_stream("Standard output of subprocess:", &result.stdout);
            log_stream("Standard error of subprocess:", &result.stderr);

            if result.success() {
                return Ok(result);
            }
            if remaining > 0 {
                info!(
                    "Exit code {}, retrying {remaining} more times",
                    result.exit_code
                );
                remaining -= 1;
                continue;
            }
            if policy.best_effort {
                info!(
                    "Exit code was {}, but we will continue anyway",
                    result.exit_code
                );
                return Ok(result);
            }
            return Err(KiraError::ExternalCommandFailed {
                command: command_line,
                code: result.exit_code,
            });
        }
    }
}

fn log_stream(header: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    info!("{header}");
    for line in text.lines() {
        info!("{line}");
    }
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

/// Builds an owned argv from string-like parts.
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}

#[cfg(all(test, unix))]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sh(script: &str) -> Vec<String> {
        argv(["sh", "-c", script])
    }

    #[test]
    fn captures_both_streams() {
        let runner = SystemCommandRunner::new();
        let output = runner
            .run(&sh("echo out; echo err 1>&2"), RunPolicy::strict())
            .unwrap();
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(output.success());
    }

    #[test]
    fn strict_failure_is_an_error() {
        let runner = SystemCommandRunner::new();
        let err = runner.run(&sh("exit 3"), RunPolicy::strict()).unwrap_err();
        assert_matches!(err, KiraError::ExternalCommandFailed { code: 3, .. });
    }

    #[test]
    fn best_effort_swallows_nonzero_exit() {
        let runner = SystemCommandRunner::new();
        let output = runner.run(&sh("exit 4"), RunPolicy::best_effort()).unwrap();
        assert_eq!(output.exit_code, 4);
    }

    #[test]
    fn retries_are_bounded() {
        let temp = tempfile::tempdir().unwrap();
        let counter = temp.path().join("attempts");
        let script = format!("echo x >> '{}'; exit 1", counter.display());
        let runner = SystemCommandRunner::new();
        let err = runner.run(&sh(&script), RunPolicy::retrying(2)).unwrap_err();
        assert_matches!(err, KiraError::ExternalCommandFailed { code: 1, .. });
        let attempts = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(attempts.lines().count(), 3);
    }

    #[test]
    fn missing_program_is_reported() {
        let runner = SystemCommandRunner::new();
        let err = runner
            .run(&argv(["definitely-not-a-real-tool-xyz"]), RunPolicy::strict())
            .unwrap_err();
        assert_matches!(err, KiraError::MissingTool(_));
    }
}
