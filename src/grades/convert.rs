//! Markdown to PDF conversion for feedback documents.
//!
//! The loader only depends on the [`DocumentConverter`] trait. The production
//! implementation shells out to `pandoc`, bounded by a deadline.

use crate::config::ConverterSettings;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Renders the Markdown file at `markdown` into a PDF at `pdf`.
    async fn convert(&self, markdown: &Path, pdf: &Path) -> Result<()>;
}

/// Runs `pandoc <markdown> -o <pdf> [--pdf-engine=<engine>]`.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: String,
    pdf_engine: Option<String>,
    deadline: Duration,
}

impl PandocConverter {
    pub fn new(settings: &ConverterSettings) -> Self {
        Self {
            program: settings.program.clone(),
            pdf_engine: settings.pdf_engine.clone(),
            deadline: settings.timeout,
        }
    }

    fn arguments(&self, markdown: &Path, pdf: &Path) -> Vec<String> {
        let mut args = vec![
            markdown.display().to_string(),
            "--from=markdown".to_string(),
            "-o".to_string(),
            pdf.display().to_string(),
        ];
        if let Some(engine) = &self.pdf_engine {
            args.push(format!("--pdf-engine={}", engine));
        }
        args
    }
}

#[async_trait]
impl DocumentConverter for PandocConverter {
    async fn convert(&self, markdown: &Path, pdf: &Path) -> Result<()> {
        let failure = |reason: String| AppError::Conversion {
            path: markdown.to_path_buf(),
            reason,
        };

        info!("Converting {} to PDF", markdown.display());
        let mut cmd = Command::new(&self.program);
        cmd.args(self.arguments(markdown, pdf))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.deadline, cmd.output()).await {
            Err(_) => {
                return Err(failure(format!(
                    "{} did not finish within {}s",
                    self.program,
                    self.deadline.as_secs()
                )))
            },
            Ok(Err(e)) => return Err(failure(format!("failed to run {}: {}", self.program, e))),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        if !pdf.exists() {
            return Err(failure(format!("{} did not produce {}", self.program, pdf.display())));
        }

        debug!("Wrote {}", pdf.display());
        Ok(())
    }
}
