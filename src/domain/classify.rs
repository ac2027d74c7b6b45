//! Output classification rules for device transport commands.
//!
//! Both transports misreport their true exit status, so the verdict comes
//! from scanning captured text. Each table is a fixed-order list of
//! `(exit code, stream, pattern) → outcome` rules; the first match wins.
//! Pure and synchronous; nothing here spawns a process.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::TransportError;

// ── Patterns ─────────────────────────────────────────────────────────────────

/// Shell message when an executable is not on `PATH`.
pub const NOT_RECOGNIZED: &str = "is not recognized as an internal or external command";

pub const USB_DEVICE_NOT_FOUND: &str = "error: device not found";
pub const USB_STDOUT_FAILURES: &[&str] = &["not found", "error", "No such file or directory"];
pub const USB_STDERR_FAILURES: &[&str] = &["error"];

pub const REMOTE_UNREACHABLE: &str = "Could not connect to target machine";
pub const REMOTE_STDOUT_FAILURES: &[&str] = &[
    "Command was not run, error returned from target",
    "Invalid parameter",
    "File was not sent successfully",
    "File was not pushed, error returned from target",
    "File was not pulled, error returned from target",
];

pub const REMOTE_SCRIPT_FAILURES: &[&str] = &[
    NOT_RECOGNIZED,
    "The system cannot find the path specified",
    "Parameter format not correct",
];

// ── Rule model ───────────────────────────────────────────────────────────────

/// Which exit codes a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMatch {
    Any,
    Code(i32),
}

impl ExitMatch {
    fn matches(self, code: i32) -> bool {
        match self {
            Self::Any => true,
            Self::Code(c) => c == code,
        }
    }
}

/// Which captured stream a rule scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// What a matching rule concludes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// A specific transport error.
    Fail(TransportError),
    /// Treat the command as having exited with code 1.
    Downgrade,
}

/// One classification rule.
#[derive(Debug)]
pub struct Rule {
    pub exit: ExitMatch,
    pub stream: Stream,
    pub pattern: Regex,
    pub outcome: RuleOutcome,
}

impl Rule {
    // An escaped literal is always a valid pattern.
    #[allow(clippy::expect_used)]
    fn new(exit: ExitMatch, stream: Stream, pattern: &str, outcome: RuleOutcome) -> Self {
        Self {
            exit,
            stream,
            pattern: Regex::new(&format!("(?m){}", regex::escape(pattern)))
                .expect("valid pattern"),
            outcome,
        }
    }
}

/// Text captured from a finished command, `\r` already stripped.
#[derive(Debug, Clone, Copy)]
pub struct Captured<'a> {
    pub code: i32,
    pub stdout: &'a str,
    pub stderr: &'a str,
}

impl Captured<'_> {
    fn stream(&self, stream: Stream) -> &str {
        match stream {
            Stream::Stdout => self.stdout,
            Stream::Stderr => self.stderr,
        }
    }
}

/// Ordered rule table for one transport.
#[derive(Debug)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Evaluate the table. Returns the effective outcome after all rules and
    /// the generic non-zero check.
    ///
    /// # Errors
    ///
    /// Returns the [`TransportError`] the output maps to.
    pub fn classify(&self, captured: &Captured<'_>, command: &str) -> Result<(), TransportError> {
        let mut code = captured.code;
        if let Some(rule) = self.first_match(captured) {
            match &rule.outcome {
                RuleOutcome::Fail(err) => return Err(err.clone()),
                RuleOutcome::Downgrade => code = 1,
            }
        }
        generic_status(code, command)
    }

    /// First rule matching the captured output, if any.
    #[must_use]
    pub fn first_match(&self, captured: &Captured<'_>) -> Option<&Rule> {
        self.rules.iter().find(|rule| {
            rule.exit.matches(captured.code)
                && rule.pattern.is_match(captured.stream(rule.stream))
        })
    }

    /// `true` for a table without rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Non-zero exit is a generic failure carrying the command line.
///
/// # Errors
///
/// Returns [`TransportError::CommandFailed`] for any non-zero `code`.
pub fn generic_status(code: i32, command: &str) -> Result<(), TransportError> {
    if code == 0 {
        Ok(())
    } else {
        Err(TransportError::CommandFailed {
            code,
            command: command.to_string(),
        })
    }
}

// ── Tables ───────────────────────────────────────────────────────────────────

fn not_installed(tool: &str) -> RuleOutcome {
    RuleOutcome::Fail(TransportError::NotInstalled {
        tool: tool.to_string(),
    })
}

static USB_BRIDGE: LazyLock<RuleTable> = LazyLock::new(|| {
    let mut rules = vec![
        Rule::new(ExitMatch::Any, Stream::Stderr, NOT_RECOGNIZED, not_installed("ADB")),
        Rule::new(
            ExitMatch::Code(1),
            Stream::Stderr,
            USB_DEVICE_NOT_FOUND,
            RuleOutcome::Fail(TransportError::DeviceNotFound),
        ),
    ];
    rules.extend(
        USB_STDOUT_FAILURES
            .iter()
            .map(|p| Rule::new(ExitMatch::Code(0), Stream::Stdout, p, RuleOutcome::Downgrade)),
    );
    rules.extend(
        USB_STDERR_FAILURES
            .iter()
            .map(|p| Rule::new(ExitMatch::Code(0), Stream::Stderr, p, RuleOutcome::Downgrade)),
    );
    RuleTable { rules }
});

static REMOTE_COMMAND: LazyLock<RuleTable> = LazyLock::new(|| {
    let mut rules = vec![
        Rule::new(ExitMatch::Any, Stream::Stderr, NOT_RECOGNIZED, not_installed("RCmd")),
        Rule::new(
            ExitMatch::Code(0),
            Stream::Stdout,
            REMOTE_UNREACHABLE,
            RuleOutcome::Fail(TransportError::Unreachable),
        ),
    ];
    rules.extend(
        REMOTE_STDOUT_FAILURES
            .iter()
            .map(|p| Rule::new(ExitMatch::Code(0), Stream::Stdout, p, RuleOutcome::Downgrade)),
    );
    RuleTable { rules }
});

static REMOTE_SCRIPT: LazyLock<RuleTable> = LazyLock::new(|| RuleTable {
    rules: REMOTE_SCRIPT_FAILURES
        .iter()
        .map(|p| {
            Rule::new(
                ExitMatch::Any,
                Stream::Stderr,
                p,
                RuleOutcome::Fail(TransportError::RemoteScriptFailed),
            )
        })
        .collect(),
});

static PLAIN: LazyLock<RuleTable> = LazyLock::new(|| RuleTable { rules: Vec::new() });

/// Rules for the USB debug bridge executable.
#[must_use]
pub fn usb_bridge() -> &'static RuleTable {
    &USB_BRIDGE
}

/// Rules for the remote command executable.
#[must_use]
pub fn remote_command() -> &'static RuleTable {
    &REMOTE_COMMAND
}

/// Rules for the stderr text a remote capture script leaves behind.
#[must_use]
pub fn remote_script() -> &'static RuleTable {
    &REMOTE_SCRIPT
}

/// No heuristics: exit status only.
#[must_use]
pub fn plain() -> &'static RuleTable {
    &PLAIN
}

// ── Unit tests ───────────────────────────────────────────────────────────────
