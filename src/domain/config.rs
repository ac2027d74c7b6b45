//! Domain types and validators for the calibration configuration file.
//!
//! Pure functions only, no I/O.

use std::collections::BTreeMap;

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

/// Namespace of keys that are forwarded to the device overrides file.
pub const OVERRIDES_PREFIX: &str = "overrides.";

pub const KEY_FOCUS_POS: &str = "raw.focus_pos";
pub const KEY_TRANSLATE_INPUT: &str = "proc.translate_input_flag";
pub const KEY_OUTPUT_JPEG: &str = "shared.output_jpeg_flag";
pub const KEY_OUTPUT_BMP: &str = "shared.output_bmp_flag";
pub const KEY_BLOB_RUN: &str = "shared.blob_run";
pub const KEY_BLOB_FULL_PATH: &str = "shared.blob_full_path";
pub const KEY_FINAL_CAPTURE: &str = "tool.final_capture";
pub const KEY_FINAL_CAPTURE_DELTA_AB: &str = "tool.final_capture_check_delta_ab";
pub const KEY_REMOTE_HOST: &str = "tool.remote_host";
pub const KEY_PREVIEW_WIDTH: &str = "tool.preview_width";
pub const KEY_PREVIEW_HEIGHT: &str = "tool.preview_height";
pub const KEY_TRANSPORT_TIMEOUT: &str = "tool.transport_timeout";
pub const KEY_DEVICE_OVERRIDES_PATH: &str = "tool.device_overrides_path";
pub const KEY_CAMERA_TOOL_PATH: &str = "tool.camera_tool_path";
pub const KEY_CAPTURE_SCRIPT_PATH: &str = "tool.capture_script_path";

// ── Parameter schema ─────────────────────────────────────────────────────────

/// Declared type of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    /// Integer within an inclusive range.
    Int { min: i64, max: i64 },
    /// Floating point value within an inclusive range.
    Float { min: f64, max: f64 },
    /// Exactly `TRUE` or `FALSE`.
    Bool,
}

/// A declared parameter: key plus kind and bound.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ValueKind,
}

const fn int(key: &'static str, min: i64, max: i64) -> ParamSpec {
    ParamSpec {
        key,
        kind: ValueKind::Int { min, max },
    }
}

const fn float(key: &'static str, min: f64, max: f64) -> ParamSpec {
    ParamSpec {
        key,
        kind: ValueKind::Float { min, max },
    }
}

const fn boolean(key: &'static str) -> ParamSpec {
    ParamSpec {
        key,
        kind: ValueKind::Bool,
    }
}

/// Every key with a declared kind. Keys not listed here are kept verbatim.
pub const DECLARED_PARAMS: &[ParamSpec] = &[
    int("overrides.ae.MaxSearchFrameCount", 0, 100),
    int("overrides.awb.module_cal_enable", 0, 1),
    int("overrides.lensShading.module_cal_enable", 0, 1),
    int(KEY_FOCUS_POS, 0, 32767),
    int(KEY_OUTPUT_JPEG, 0, 1),
    int(KEY_OUTPUT_BMP, 0, 1),
    int(KEY_BLOB_RUN, 0, 1),
    int(KEY_FINAL_CAPTURE, 0, 1),
    int(KEY_FINAL_CAPTURE_DELTA_AB, 0, 1),
    int(KEY_TRANSLATE_INPUT, 0, 1),
    int(KEY_PREVIEW_WIDTH, 0, 8192),
    int(KEY_PREVIEW_HEIGHT, 0, 8192),
    int(KEY_TRANSPORT_TIMEOUT, 0, 3600),
    float("overrides.ae.MeanAlg.TargetBrightness", 0.0, 255.0),
    float("overrides.ae.MeanAlg.ConvergeSpeed", 0.01, 1.0),
    float("overrides.ae.MaxFstopDeltaNeg", 0.01, 1.0),
    float("overrides.ae.MaxFstopDeltaPos", 0.01, 1.0),
    boolean("overrides.ap15Function.lensShading"),
    boolean("overrides.ae.MeanAlg.SmartTarget"),
];

/// Look up the declared kind for `key`, if any.
#[must_use]
pub fn declared_kind(key: &str) -> Option<ValueKind> {
    DECLARED_PARAMS
        .iter()
        .find(|p| p.key == key)
        .map(|p| p.kind)
}

// ── Entries ──────────────────────────────────────────────────────────────────

/// One parsed `key = value;` line.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub kind: Option<ValueKind>,
}

impl ConfigEntry {
    /// Check the raw value against the declared kind and bound.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the value does not parse or is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: self.key.clone(),
        };
        match self.kind {
            None => Ok(()),
            Some(ValueKind::Bool) => match self.value.as_str() {
                "TRUE" | "FALSE" => Ok(()),
                _ => Err(invalid()),
            },
            Some(ValueKind::Int { min, max }) => {
                let v: i64 = self.value.parse().map_err(|_| invalid())?;
                self.check_bound(v < min, v > max, min, max)
            }
            Some(ValueKind::Float { min, max }) => {
                let v: f64 = self.value.parse().map_err(|_| invalid())?;
                if !v.is_finite() {
                    return Err(invalid());
                }
                self.check_bound(v < min, v > max, min, max)
            }
        }
    }

    fn check_bound<T: ToString>(
        &self,
        low: bool,
        high: bool,
        min: T,
        max: T,
    ) -> Result<(), ConfigError> {
        if low {
            return Err(ConfigError::TooLow {
                key: self.key.clone(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        if high {
            return Err(ConfigError::TooHigh {
                key: self.key.clone(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        Ok(())
    }
}

/// Parse one non-comment line into an entry (not yet validated).
fn parse_line(line: &str, line_no: usize) -> Result<ConfigEntry, ConfigError> {
    let (key, rest) = line
        .split_once('=')
        .ok_or(ConfigError::Malformed { line: line_no })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::Malformed { line: line_no });
    }
    let (value, _comment) = rest
        .trim()
        .split_once(';')
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
        })?;
    Ok(ConfigEntry {
        key: key.to_string(),
        value: value.trim().to_string(),
        kind: declared_kind(key),
    })
}

// ── Validated configuration ──────────────────────────────────────────────────

/// Validated calibration configuration. Immutable once constructed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationConfig {
    values: BTreeMap<String, String>,
}

impl CalibrationConfig {
    /// Parse and validate the full text of a configuration file.
    ///
    /// Blank lines and lines starting with `#` are skipped. A later line with
    /// the same key replaces an earlier one.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered; no partial
    /// configuration is ever returned.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut values = BTreeMap::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = parse_line(line, idx + 1)?;
            entry.validate()?;
            values.insert(entry.key, entry.value);
        }
        Ok(Self { values })
    }

    /// Raw value for `key`.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Integer value for `key`. Declared keys are guaranteed to parse.
    #[must_use]
    pub fn int(&self, key: &str) -> Option<i64> {
        self.text(key).and_then(|v| v.parse().ok())
    }

    /// `true` when `key` holds `1`; `default` when the key is absent.
    #[must_use]
    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.int(key).map_or(default, |v| v == 1)
    }

    /// Entries under the `overrides.` namespace with the prefix stripped.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().filter_map(|(k, v)| {
            k.strip_prefix(OVERRIDES_PREFIX)
                .map(|stripped| (stripped, v.as_str()))
        })
    }

    /// `true` when the configuration carries at least one override.
    #[must_use]
    pub fn has_overrides(&self) -> bool {
        self.overrides().next().is_some()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when no entries were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Render the device overrides file: one `key=value;` line per override.
#[must_use]
pub fn render_overrides(config: &CalibrationConfig) -> String {
    config
        .overrides()
        .map(|(k, v)| format!("{k}={v};\n"))
        .collect()
}

// ── Unit tests ───────────────────────────────────────────────────────────────
