//! Language-specific inspection capabilities.
//!
//! A [`Linter`] turns source text into a free-text report. The
//! [`LinterRegistry`] maps language tags to linters and is the only thing the
//! inspection pipeline talks to.

mod command;
mod registry;
mod stub;

pub use command::CommandLinter;
pub use registry::LinterRegistry;
pub use stub::{StubLinter, DEFAULT_REPORT};

use async_trait::async_trait;

/// Lint status of a document that has not been (or could not be) inspected.
pub const NO_INSPECTION: &str = "No inspection";

/// Lint status for a language without a registered linter.
pub fn no_inspection_for(lang: &str) -> String {
    format!("{} for {}", NO_INSPECTION, lang)
}

/// Failure to run an inspection. Never escapes the registry.
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    #[error("failed to stage source: {0}")]
    Stage(#[source] std::io::Error),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait Linter: Send + Sync {
    /// Inspects `code` and returns the report to store as lint status.
    async fn inspect(&self, code: &str) -> Result<String, LintError>;
}
