use async_trait::async_trait;
use std::io::Write;
use tempfile::NamedTempFile;
use tokio::process::Command;

use super::{LintError, Linter};

/// Report used when the tool prints nothing.
pub const CLEAN_REPORT: &str = "OK";

/// Runs an external tool over the code, staged in a temporary file.
///
/// The tool's combined stdout and stderr is the report, with the temporary
/// path removed. A non-zero exit is a normal outcome for linters that found
/// something; only failing to start the tool is an error.
#[derive(Debug, Clone)]
pub struct CommandLinter {
    program: String,
    args: Vec<String>,
    extension: String,
}

impl CommandLinter {
    pub fn new(program: impl Into<String>, args: Vec<String>, extension: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            extension: extension.into(),
        }
    }

    /// Writes `code` to a fresh temporary file on the blocking pool.
    async fn stage(&self, code: &str) -> Result<NamedTempFile, LintError> {
        let suffix = if self.extension.is_empty() {
            String::new()
        } else {
            format!(".{}", self.extension.trim_start_matches('.'))
        };
        let code = code.to_owned();

        tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut file = tempfile::Builder::new()
                .prefix("docshare-")
                .suffix(&suffix)
                .tempfile()?;
            file.write_all(code.as_bytes())?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|e| LintError::Stage(std::io::Error::other(e)))?
        .map_err(LintError::Stage)
    }
}

#[async_trait]
impl Linter for CommandLinter {
    async fn inspect(&self, code: &str) -> Result<String, LintError> {
        // Removed when dropped at the end of this call.
        let file = self.stage(code).await?;
        let path = file.path().to_string_lossy().into_owned();

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| LintError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        tracing::debug!(program = %self.program, status = %output.status, "Linter finished");

        let mut report = String::from_utf8_lossy(&output.stdout).into_owned();
        report.push_str(&String::from_utf8_lossy(&output.stderr));
        let report = report.replace(&path, "");
        let report = report.trim();

        if report.is_empty() {
            Ok(CLEAN_REPORT.to_string())
        } else {
            Ok(report.to_string())
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_report_is_tool_output() {
        let linter = CommandLinter::new("cat", vec![], "txt");

        let report = linter.inspect("  line one\nline two\n").await.unwrap();
        assert_eq!(report, "line one\nline two");
    }

    #[tokio::test]
    async fn test_temp_path_is_stripped() {
        // `echo` prints only the staged path, which leaves nothing.
        let linter = CommandLinter::new("echo", vec![], "go");

        let report = linter.inspect("package main").await.unwrap();
        assert_eq!(report, "OK");
    }

    #[tokio::test]
    async fn test_non_zero_exit_still_reports() {
        let linter = CommandLinter::new(
            "sh",
            vec!["-c".to_string(), "echo 'unused variable' >&2; exit 1".to_string()],
            "go",
        );

        let report = linter.inspect("package main").await.unwrap();
        assert_eq!(report, "unused variable");
    }

    #[tokio::test]
    async fn test_staged_file_holds_the_code() {
        let linter = CommandLinter::new("true", vec![], ".go");

        let file = linter.stage("package main\n").await.unwrap();
        let path = file.path().to_path_buf();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("go"));
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "package main\n"
        );

        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let linter = CommandLinter::new("docshare-no-such-linter", vec![], "go");

        let result = linter.inspect("package main").await;
        assert!(matches!(result, Err(LintError::Spawn { .. })));
    }
}
