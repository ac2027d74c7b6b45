//! Output formatting module

pub mod run_log;
pub mod styles;

use console::Term;
use owo_colors::OwoColorize as _;
pub use run_log::RunLog;
pub use styles::Styles;

/// Output context carrying styling and terminal state.
#[derive(Debug, Clone)]
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool) -> Self {
        let use_colors =
            !no_color && Term::stdout().is_term() && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self { styles }
    }

    /// Print a secondary note to stdout.
    pub fn note(&self, msg: &str) {
        println!("{}", msg.style(self.styles.dim));
    }
}
