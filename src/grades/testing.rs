//! Test doubles for the grade pipeline.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::grades::DocumentConverter;

/// Converter that writes a stub PDF next to the Markdown file.
#[derive(Debug, Default)]
pub struct StubConverter {
    pub fail: bool,
    pub converted: Mutex<Vec<PathBuf>>,
}

impl StubConverter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn converted(&self) -> Vec<PathBuf> {
        self.converted.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentConverter for StubConverter {
    async fn convert(&self, markdown: &Path, pdf: &Path) -> Result<()> {
        if self.fail {
            return Err(AppError::Conversion {
                path: markdown.to_path_buf(),
                reason: "stub converter refused".into(),
            });
        }
        std::fs::write(pdf, b"%PDF-1.4 stub")?;
        self.converted.lock().unwrap().push(markdown.to_path_buf());
        Ok(())
    }
}

/// Writes `contents` to `dir/name` and returns the full path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
