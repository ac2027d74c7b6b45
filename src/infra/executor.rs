//! Command execution with output classification.
//!
//! Wraps a [`CommandRunner`], strips `\r` from both streams, picks the rule
//! table by the program name, and mirrors the output into the run log.

use anyhow::Result;

use crate::application::ports::{CommandRunner, LogSink, ToolRunner};
use crate::domain::classify::{self, Captured, RuleTable};
use crate::domain::error::{ToolError, TransportError};

/// Everything a finished command produced, plus its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub outcome: Result<(), TransportError>,
}

impl CommandResult {
    /// Stdout of a successful command.
    ///
    /// # Errors
    ///
    /// Returns the classified [`TransportError`].
    pub fn into_stdout(self) -> Result<String, TransportError> {
        self.outcome.map(|()| self.stdout)
    }
}

/// Names of the transport executables, used to pick a rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPrograms {
    pub usb_bridge: String,
    pub remote_command: String,
}

impl Default for TransportPrograms {
    fn default() -> Self {
        Self {
            usb_bridge: "adb".to_string(),
            remote_command: "rcmd".to_string(),
        }
    }
}

pub struct Executor<'a, R: CommandRunner> {
    runner: R,
    log: &'a dyn LogSink,
    programs: TransportPrograms,
    echo: bool,
}

impl<'a, R: CommandRunner> Executor<'a, R> {
    pub fn new(runner: R, log: &'a dyn LogSink, programs: TransportPrograms) -> Self {
        Self {
            runner,
            log,
            programs,
            echo: false,
        }
    }

    /// Log every command line before it runs (`--debug`).
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    #[must_use]
    pub fn log(&self) -> &'a dyn LogSink {
        self.log
    }

    fn table_for(&self, program: &str) -> &'static RuleTable {
        if program == self.programs.usb_bridge {
            classify::usb_bridge()
        } else if program == self.programs.remote_command {
            classify::remote_command()
        } else {
            classify::plain()
        }
    }

    /// Run `argv` to completion and classify the output.
    ///
    /// `silent` keeps both the command line and its output out of the log.
    ///
    /// # Errors
    ///
    /// Only a spawn or wait failure is an `Err`; a failing command is
    /// reported through [`CommandResult::outcome`].
    pub async fn run(&self, argv: &[String], silent: bool) -> Result<CommandResult> {
        let (raw, table) = self.spawn(argv, silent).await?;
        let command = argv.join(" ");
        let outcome = table.classify(&raw.captured(), &command);
        tracing::debug!(%command, code = raw.exit_code, ok = outcome.is_ok(), "classified");
        Ok(raw.into_result(outcome))
    }

    /// Run a transport command and return its stdout.
    ///
    /// # Errors
    ///
    /// Returns a spawn failure or the classified [`TransportError`].
    pub async fn check(&self, argv: &[String], silent: bool) -> Result<String> {
        Ok(self.run(argv, silent).await?.into_stdout()?)
    }

    async fn spawn(&self, argv: &[String], silent: bool) -> Result<(RawOutput, &'static RuleTable)> {
        let Some((program, args)) = argv.split_first() else {
            anyhow::bail!("empty command line");
        };
        if self.echo && !silent {
            self.log.info(&format!("executing {}", argv.join(" ")));
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.runner.run(program, &args).await?;
        let raw = RawOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: clean(&output.stdout),
            stderr: clean(&output.stderr),
        };
        if !silent {
            for stream in [&raw.stdout, &raw.stderr] {
                if !stream.trim().is_empty() {
                    self.log.info(stream.trim_end());
                }
            }
        }
        Ok((raw, self.table_for(program)))
    }
}

struct RawOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl RawOutput {
    fn captured(&self) -> Captured<'_> {
        Captured {
            code: self.exit_code,
            stdout: &self.stdout,
            stderr: &self.stderr,
        }
    }

    fn into_result(self, outcome: Result<(), TransportError>) -> CommandResult {
        CommandResult {
            exit_code: self.exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
            outcome,
        }
    }
}

fn clean(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace('\r', "")
}

impl<R: CommandRunner> ToolRunner for Executor<'_, R> {
    /// The tool's exit code is taken as-is; no output scanning.
    async fn run_tool(&self, argv: &[String]) -> Result<()> {
        let (raw, _) = self.spawn(argv, false).await?;
        if raw.exit_code == 0 {
            Ok(())
        } else {
            Err(ToolError::Failed {
                code: raw.exit_code,
                command: argv.join(" "),
            }
            .into())
        }
    }
}
