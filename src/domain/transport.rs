//! Transport selection.
//!
//! Pure; the interactive address prompt lives in the command layer.

use crate::domain::config::{CalibrationConfig, KEY_REMOTE_HOST};

/// Address value that asks the operator to type the target address.
pub const PROMPT_ADDRESS: &str = "0.0.0.0";

/// Which family of device a transport talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Local,
    UsbBridge,
    RemoteCommand,
}

impl TransportKind {
    /// Human-readable platform name used in messages.
    #[must_use]
    pub fn platform(self) -> &'static str {
        match self {
            Self::Local | Self::UsbBridge => "Android",
            Self::RemoteCommand => "Windows RT",
        }
    }
}

/// The transport chosen for one run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Local,
    UsbBridge { executable: String },
    RemoteCommand { executable: String, address: String },
}

impl Transport {
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Local => TransportKind::Local,
            Self::UsbBridge { .. } => TransportKind::UsbBridge,
            Self::RemoteCommand { .. } => TransportKind::RemoteCommand,
        }
    }
}

/// Where the remote address came from, before any prompting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAddress {
    Known(String),
    Prompt,
}

/// Transport choice derived from flags and config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportChoice {
    Local,
    UsbBridge,
    RemoteCommand(RemoteAddress),
}

/// Pick the transport: `--local` first, then an explicit `--remote` flag,
/// then the `tool.remote_host` config key, else the USB bridge.
#[must_use]
pub fn select_transport(
    remote_flag: Option<&str>,
    config: &CalibrationConfig,
    local: bool,
) -> TransportChoice {
    if local {
        return TransportChoice::Local;
    }
    let address = remote_flag
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .or_else(|| config.text(KEY_REMOTE_HOST).filter(|a| !a.is_empty()));
    match address {
        Some(PROMPT_ADDRESS) => TransportChoice::RemoteCommand(RemoteAddress::Prompt),
        Some(addr) => TransportChoice::RemoteCommand(RemoteAddress::Known(addr.to_string())),
        None => TransportChoice::UsbBridge,
    }
}
