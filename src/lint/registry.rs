use std::collections::HashMap;
use std::sync::Arc;

use super::{no_inspection_for, CommandLinter, Linter, StubLinter, NO_INSPECTION};
use crate::config::{LinterConfig, LinterKind};
use crate::models::Document;

/// Language tag to linter mapping.
///
/// Built once at startup and shared read-only with the pipeline.
#[derive(Clone, Default)]
pub struct LinterRegistry {
    linters: HashMap<String, Arc<dyn Linter>>,
}

impl LinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(entries: &[LinterConfig]) -> Self {
        let mut registry = Self::new();
        for entry in entries {
            let linter: Arc<dyn Linter> = match &entry.kind {
                LinterKind::Stub { report } => Arc::new(StubLinter::new(report.clone())),
                LinterKind::Command {
                    program,
                    args,
                    extension,
                } => Arc::new(CommandLinter::new(program.clone(), args.clone(), extension.clone())),
            };
            registry.register(entry.lang.clone(), linter);
        }
        registry
    }

    /// Registers `linter` for `lang`, replacing any previous one.
    pub fn register(&mut self, lang: impl Into<String>, linter: Arc<dyn Linter>) {
        self.linters.insert(lang.into(), linter);
    }

    /// Registered language tags, sorted.
    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.linters.keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }

    /// Inspects `doc` and returns it with the lint status replaced.
    ///
    /// Never fails: an unknown language or a linter error becomes the status.
    pub async fn inspect(&self, mut doc: Document) -> Document {
        let Some(linter) = self.linters.get(&doc.lang) else {
            doc.lint_status = no_inspection_for(&doc.lang);
            return doc;
        };

        doc.lint_status = match linter.inspect(&doc.text).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(doc_id = doc.id, lang = %doc.lang, "Inspection failed: {}", e);
                NO_INSPECTION.to_string()
            }
        };
        doc
    }
}

impl std::fmt::Debug for LinterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinterRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}
