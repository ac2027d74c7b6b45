//! Run plan: every path a calibration run reads or writes, derived from the
//! command-line options, plus the external tool argument lists.
//!
//! Pure functions only: path arithmetic, no filesystem access.

use std::path::{Path, PathBuf};

use crate::domain::config::{
    CalibrationConfig, KEY_BLOB_RUN, KEY_FINAL_CAPTURE, KEY_FINAL_CAPTURE_DELTA_AB,
    KEY_FOCUS_POS, KEY_OUTPUT_BMP, KEY_OUTPUT_JPEG, KEY_PREVIEW_HEIGHT, KEY_PREVIEW_WIDTH,
    KEY_TRANSLATE_INPUT,
};
use crate::domain::error::UsageError;

/// Data directory on the device when running locally.
pub const LOCAL_DATA_DIR: &str = "/sdcard";

/// Working log name inside the output directory.
pub const WORKING_LOG_NAME: &str = "calibration.txt";

// ── Camera ───────────────────────────────────────────────────────────────────

/// Selected sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Camera {
    Rear,
    Front,
}

impl Camera {
    /// Map the `--camera` index (0 rear, 1 front).
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Rear),
            1 => Some(Self::Front),
            _ => None,
        }
    }

    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            Self::Rear => 0,
            Self::Front => 1,
        }
    }

    /// File name suffix: empty for the rear camera.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Rear => "",
            Self::Front => "_front",
        }
    }

    /// Name understood by the Windows capture script.
    #[must_use]
    pub fn script_name(self) -> &'static str {
        match self {
            Self::Rear => "back",
            Self::Front => "front",
        }
    }

    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Rear => "Selected rear camera.",
            Self::Front => "Selected front camera.",
        }
    }
}

// ── Options ──────────────────────────────────────────────────────────────────

/// Path-related command-line options.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions<'a> {
    pub camera: Option<Camera>,
    pub input: Option<&'a Path>,
    pub raw_text: Option<&'a Path>,
    pub params: Option<&'a Path>,
    pub output: Option<&'a Path>,
    pub local: bool,
    pub test_mode: bool,
}

/// Behaviour flags that shape the tool invocations.
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    pub debug: bool,
    pub log_time: bool,
    pub test_mode: bool,
    pub xtest: bool,
    pub preview: bool,
    pub af_file: Option<PathBuf>,
}

// ── Log naming ───────────────────────────────────────────────────────────────

/// Names for the working and final log files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogNames {
    pub dir: PathBuf,
    pub base: String,
    pub suffix: String,
}

impl LogNames {
    /// Path the log is written to while the run is in progress.
    #[must_use]
    pub fn working(&self) -> PathBuf {
        self.dir.join(WORKING_LOG_NAME)
    }

    /// Final log path for the given outcome.
    #[must_use]
    pub fn final_path(&self, success: bool) -> PathBuf {
        let outcome = if success { "_success" } else { "_fail" };
        self.dir
            .join(format!("{}{outcome}{}.txt", self.base, self.suffix))
    }
}

// ── Plan ─────────────────────────────────────────────────────────────────────

/// Every file a run touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationPlan {
    pub camera: Option<Camera>,
    pub local: bool,
    pub config_file: PathBuf,
    pub raw_input: PathBuf,
    pub raw_text: Option<PathBuf>,
    pub blob: PathBuf,
    pub output_dir: PathBuf,
    /// Stem of the raw input file.
    pub raw_base: String,
    /// Stem of the blob file.
    pub base: String,
    pub log: LogNames,
}

fn file_stem(path: &Path) -> Result<String, UsageError> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| UsageError::InvalidInputName(path.display().to_string()))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl CalibrationPlan {
    /// Derive the plan from command-line options.
    ///
    /// Local runs default every path under [`LOCAL_DATA_DIR`]; explicit
    /// options always win. Remote runs require `--input` and `--params`.
    ///
    /// # Errors
    ///
    /// Returns a [`UsageError`] for missing or contradictory options.
    pub fn derive(opts: &PlanOptions<'_>) -> Result<Self, UsageError> {
        let suffix = opts.camera.map_or("", Camera::suffix);
        let data_dir = Path::new(LOCAL_DATA_DIR);

        if opts.local && !opts.test_mode && opts.camera.is_none() {
            return Err(UsageError::MissingArgument {
                long: "camera",
                short: 'c',
            });
        }

        let config_file = match (opts.params, opts.local) {
            (Some(p), _) => p.to_path_buf(),
            (None, true) => data_dir.join(format!("calibrate_params{suffix}.cfg")),
            (None, false) => {
                return Err(UsageError::MissingArgument {
                    long: "params",
                    short: 'p',
                });
            }
        };

        let raw_input = match (opts.input, opts.local) {
            (Some(p), _) => p.to_path_buf(),
            (None, true) => data_dir.join(format!("white{suffix}.nvraw")),
            (None, false) => {
                return Err(UsageError::MissingArgument {
                    long: "input",
                    short: 'i',
                });
            }
        };
        let raw_base = file_stem(&raw_input)?;

        let is_nvraw = raw_input
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("nvraw"));
        if is_nvraw && opts.raw_text.is_some() {
            return Err(UsageError::RawTextWithNvraw);
        }

        let blob = match (opts.output, opts.local) {
            (Some(p), _) => p.to_path_buf(),
            (None, true) => data_dir.join(format!("factory{suffix}.bin")),
            (None, false) => parent_dir(&raw_input).join(format!("{raw_base}.bin")),
        };
        let base = file_stem(&blob)?;
        let output_dir = parent_dir(&blob);

        let log = if opts.local {
            LogNames {
                dir: output_dir.clone(),
                base: "calibrate".to_string(),
                suffix: suffix.to_string(),
            }
        } else {
            LogNames {
                dir: output_dir.clone(),
                base: format!("{base}_calibrate"),
                suffix: String::new(),
            }
        };

        Ok(Self {
            camera: opts.camera,
            local: opts.local,
            config_file,
            raw_input,
            raw_text: opts.raw_text.map(Path::to_path_buf),
            blob,
            output_dir,
            raw_base,
            base,
            log,
        })
    }

    fn out(&self, name: String) -> PathBuf {
        self.output_dir.join(name)
    }

    /// JPEG preview of the translated input.
    #[must_use]
    pub fn jpeg(&self) -> PathBuf {
        self.out(format!("{}.jpg", self.raw_base))
    }

    #[must_use]
    pub fn bmp(&self) -> PathBuf {
        self.out(format!("{}.bmp", self.raw_base))
    }

    /// Header-carrying raw produced from a headerless input.
    #[must_use]
    pub fn translated(&self) -> PathBuf {
        self.out(format!("{}.nvraw", self.raw_base))
    }

    /// Intermediate calibration text written by the surface generator.
    #[must_use]
    pub fn calibration(&self) -> PathBuf {
        self.out(format!("{}_lsc.cfg", self.base))
    }

    #[must_use]
    pub fn flat(&self) -> PathBuf {
        self.out(format!("{}_alsc.nvraw", self.base))
    }

    #[must_use]
    pub fn flat_jpeg(&self) -> PathBuf {
        self.out(format!("{}_alsc.jpg", self.base))
    }

    #[must_use]
    pub fn flat_bmp(&self) -> PathBuf {
        self.out(format!("{}_alsc.bmp", self.base))
    }

    #[must_use]
    pub fn stats(&self) -> PathBuf {
        self.out(format!("{}_stats.csv", self.base))
    }

    /// Image stem of the verification capture.
    #[must_use]
    pub fn check_stem(&self) -> String {
        format!("{}_check", self.base)
    }

    #[must_use]
    pub fn check_jpeg(&self) -> PathBuf {
        self.out(format!("{}.jpg", self.check_stem()))
    }

    /// Local copy of the overrides file pushed before a capture.
    #[must_use]
    pub fn overrides_file(&self) -> PathBuf {
        self.out(format!("{}_overrides.isp", self.base))
    }

    /// Default device path for the installed blob.
    #[must_use]
    pub fn default_device_blob(&self) -> String {
        let suffix = self.camera.map_or("", Camera::suffix);
        format!("{LOCAL_DATA_DIR}/factory{suffix}.bin")
    }
}

// ── Tool options ─────────────────────────────────────────────────────────────

/// Config-derived switches for the surface-generation tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceToolOptions {
    pub translate_input: bool,
    pub output_jpeg: bool,
    pub output_bmp: bool,
    pub generate_blob: bool,
}

impl SurfaceToolOptions {
    #[must_use]
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self {
            translate_input: config.flag(KEY_TRANSLATE_INPUT, true),
            output_jpeg: config.flag(KEY_OUTPUT_JPEG, true),
            output_bmp: config.flag(KEY_OUTPUT_BMP, false),
            generate_blob: config.flag(KEY_BLOB_RUN, true),
        }
    }
}

/// Config-derived capture settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureSettings {
    pub preview: (u32, u32),
    pub focus_pos: Option<u32>,
    pub final_capture: bool,
    pub check_delta_ab: bool,
}

impl CaptureSettings {
    #[must_use]
    pub fn from_config(config: &CalibrationConfig) -> Self {
        let dim = |key| {
            config
                .int(key)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0)
        };
        Self {
            preview: (dim(KEY_PREVIEW_WIDTH), dim(KEY_PREVIEW_HEIGHT)),
            focus_pos: config
                .int(KEY_FOCUS_POS)
                .and_then(|v| u32::try_from(v).ok()),
            final_capture: config.flag(KEY_FINAL_CAPTURE, false),
            check_delta_ab: config.flag(KEY_FINAL_CAPTURE_DELTA_AB, false),
        }
    }
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Build the surface-generation tool command line.
#[must_use]
pub fn surface_tool_argv(
    program: &Path,
    plan: &CalibrationPlan,
    tool: &SurfaceToolOptions,
    flags: &RunFlags,
) -> Vec<String> {
    let mut argv = vec![arg(program), "-i".into(), arg(&plan.raw_input)];
    if let Some(text) = &plan.raw_text {
        argv.extend(["-r".into(), arg(text), "-z".into(), arg(&plan.translated())]);
    }
    if tool.translate_input {
        if tool.output_jpeg {
            argv.extend(["-u".into(), arg(&plan.jpeg())]);
        }
        if tool.output_bmp {
            argv.extend(["-w".into(), arg(&plan.bmp())]);
        }
    }
    argv.extend(["-c".into(), arg(&plan.config_file)]);
    argv.extend(["-l".into(), arg(&plan.calibration())]);
    argv.extend(["-f".into(), arg(&plan.flat())]);
    if tool.output_jpeg {
        argv.extend(["-j".into(), arg(&plan.flat_jpeg())]);
    }
    if tool.output_bmp {
        argv.extend(["-m".into(), arg(&plan.flat_bmp())]);
    }
    if tool.generate_blob {
        argv.extend(["-b".into(), arg(&plan.blob)]);
        if let Some(af) = &flags.af_file {
            argv.extend(["-a".into(), arg(af)]);
        }
    }
    if flags.test_mode {
        argv.extend(["-t".into(), arg(&plan.stats()), "--nv".into()]);
    }
    if flags.xtest {
        argv.push("-x".into());
    }
    argv
}

/// Build the apply-tool command line for the delta check.
#[must_use]
pub fn delta_check_argv(program: &Path, jpeg: &Path, config_file: &Path) -> Vec<String> {
    vec![
        arg(program),
        "-i".into(),
        arg(jpeg),
        "-c".into(),
        arg(config_file),
        "--nv".into(),
        "--inputjpeg".into(),
        "--deltaonly".into(),
    ]
}

// ── Verdict ──────────────────────────────────────────────────────────────────

/// Single result of a calibration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure(String),
}

impl Verdict {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Process exit code for this verdict.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure(_) => 1,
        }
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
