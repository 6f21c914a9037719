//! Console rendering of upload pipeline progress.

use crate::error::Result;
use crate::grades::{ProgressSink, UploadEvent};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner plus one printed line per event.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
        bar.enable_steady_tick(Duration::from_millis(120));
        Ok(Self { bar })
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for ConsoleProgress {
    fn notify(&self, event: &UploadEvent) {
        match event {
            UploadEvent::FolderReady { path } => {
                self.bar.println(format!("Feedback folder: {}", path.cyan()));
                self.bar.set_message("Uploading files...");
            },
            UploadEvent::FileUploaded { student_id, file, .. } => {
                self.bar.println(format!(
                    "Uploaded '{}' for student {}",
                    file.display_name, student_id
                ));
            },
            UploadEvent::GradePrepared {
                student_id,
                posted_grade,
                attachments,
            } => {
                self.bar.set_message(format!(
                    "Prepared grade {} for {} ({} attachments)",
                    posted_grade, student_id, attachments
                ));
            },
            UploadEvent::Submitting { grades } => {
                self.bar
                    .println(format!("Sending {} grades to Canvas...", grades));
                self.bar.set_message("Waiting for the grading job...");
            },
            UploadEvent::JobStatus { state, elapsed, .. } => {
                self.bar.set_message(format!(
                    "Uploading grades. Status: {} ({}s)",
                    state,
                    elapsed.as_secs()
                ));
            },
        }
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
