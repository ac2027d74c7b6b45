//! Output styles using owo-colors stylesheet pattern

use owo_colors::Style;

/// Centralized stylesheet for CLI output colors.
#[derive(Debug, Default, Clone)]
pub struct Styles {
    /// Success banner (green)
    pub success: Style,
    /// Warning lines (yellow)
    pub warning: Style,
    /// Error lines and failure banner (red)
    pub error: Style,
    /// Dimmed/secondary text
    pub dim: Style,
}

impl Styles {
    /// Apply colors to the stylesheet.
    pub fn colorize(&mut self) {
        self.success = Style::new().green().bold();
        self.warning = Style::new().yellow();
        self.error = Style::new().red().bold();
        self.dim = Style::new().dimmed();
    }
}
