use async_trait::async_trait;

use super::{LintError, Linter};

pub const DEFAULT_REPORT: &str = "Text inspected";

/// Linter that accepts anything and always reports the same text.
#[derive(Debug, Clone)]
pub struct StubLinter {
    report: String,
}

impl StubLinter {
    pub fn new(report: impl Into<String>) -> Self {
        Self {
            report: report.into(),
        }
    }
}

impl Default for StubLinter {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT)
    }
}

#[async_trait]
impl Linter for StubLinter {
    async fn inspect(&self, _code: &str) -> Result<String, LintError> {
        Ok(self.report.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_report() {
        let report = StubLinter::default().inspect("anything").await.unwrap();
        assert_eq!(report, "Text inspected");
    }

    #[tokio::test]
    async fn test_custom_report() {
        let report = StubLinter::new("fine").inspect("").await.unwrap();
        assert_eq!(report, "fine");
    }
}
