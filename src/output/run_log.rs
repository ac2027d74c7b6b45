//! The run log: every progress line goes to the console and to
//! `calibration.txt`, which is renamed by outcome when the run ends.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::Local;
use owo_colors::OwoColorize as _;

use crate::application::ports::LogSink;
use crate::domain::plan::{LogNames, Verdict};
use crate::output::OutputContext;

const SUCCESS_BANNER: &[&str] = &[
    ".d88888b.  888    d8P",
    "d88P\" \"Y88b 888   d8P",
    "888     888 888  d8P",
    "888     888 888d88K",
    "888     888 8888888b",
    "888     888 888  Y88b",
    "Y88b. .d88P 888   Y88b",
    "\"Y88888P\"  888    Y88b",
];

const FAILURE_BANNER: &[&str] = &[
    "8888888888     d8888 8888888 888      8888888888 8888888b.",
    "888           d88888   888   888      888        888  \"Y88b",
    "888          d88P888   888   888      888        888    888",
    "8888888     d88P 888   888   888      8888888    888    888",
    "888        d88P  888   888   888      888        888    888",
    "888       d88P   888   888   888      888        888    888",
    "888      d8888888888   888   888      888        888  .d88P",
    "888     d88P     888 8888888 88888888 8888888888 8888888P\"",
];

/// Append-only log for one run.
pub struct RunLog {
    file: Mutex<BufWriter<File>>,
    names: LogNames,
    output: OutputContext,
}

impl RunLog {
    /// Create `calibration.txt` in the output directory, truncating any old one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn open(names: LogNames, output: OutputContext) -> Result<Self> {
        let working = names.working();
        let file = File::create(&working)
            .with_context(|| format!("cannot create log file {}", working.display()))?;
        let log = Self {
            file: Mutex::new(BufWriter::new(file)),
            names,
            output,
        };
        log.append(&format!(
            "calibrate {} started {}",
            env!("CARGO_PKG_VERSION"),
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        Ok(log)
    }

    fn append(&self, line: &str) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(file, "{line}") {
            tracing::warn!(error = %e, "failed to append to run log");
        }
    }

    /// Write the outcome banner and rename the log to its final name,
    /// replacing any earlier log of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be flushed or renamed.
    pub fn finish(self, verdict: &Verdict) -> Result<PathBuf> {
        let (banner, style) = if verdict.is_success() {
            (SUCCESS_BANNER, self.output.styles.success)
        } else {
            (FAILURE_BANNER, self.output.styles.error)
        };
        for line in banner {
            println!("{}", line.style(style));
            self.append(line);
        }

        let working = self.names.working();
        let dest = self.names.final_path(verdict.is_success());
        let mut file = self
            .file
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        file.flush()
            .with_context(|| format!("cannot flush {}", working.display()))?;
        drop(file);

        replace(&working, &dest)?;
        Ok(dest)
    }
}

fn replace(from: &Path, to: &Path) -> Result<()> {
    match std::fs::remove_file(to) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("cannot remove {}", to.display())),
    }
    std::fs::rename(from, to)
        .with_context(|| format!("cannot rename {} to {}", from.display(), to.display()))
}

impl LogSink for RunLog {
    fn info(&self, message: &str) {
        println!("{message}");
        self.append(message);
    }

    fn warn(&self, message: &str) {
        let line = format!("WARNING: {message}");
        println!("{}", line.style(self.output.styles.warning));
        self.append(&line);
    }

    fn error(&self, message: &str) {
        let line = format!("ERROR: {message}");
        println!("{}", line.style(self.output.styles.error));
        self.append(&line);
    }
}
