//! Feedback upload pipeline.
//!
//! Takes a loaded [`GradeSheet`] through folder provisioning, attachment upload,
//! roster validation, comment synthesis, batch submission and job polling.
//! Everything before the submit call is fail-fast and leaves grades untouched;
//! files uploaded before a failure are not removed.

use crate::api::LmsApi;
use crate::config::PollSettings;
use crate::error::{AppError, Result};
use crate::grades::naming::feedback_folder_name;
use crate::grades::sheet::{AttachmentSlot, GradeRecord, GradeSheet};
use crate::models::{GradeBatch, GradeEntry, JobState, SubmissionJob, UploadedFile};
use chrono::Local;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Progress reported while the pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    FolderReady {
        path: String,
    },
    FileUploaded {
        student_id: String,
        slot: AttachmentSlot,
        file: UploadedFile,
    },
    GradePrepared {
        student_id: String,
        posted_grade: String,
        attachments: usize,
    },
    Submitting {
        grades: usize,
    },
    JobStatus {
        job_id: u64,
        state: JobState,
        elapsed: Duration,
    },
}

/// Receives [`UploadEvent`]s; the shell renders them, tests record them.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: &UploadEvent);
}

/// Sink that drops every event.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

#[cfg(test)]

impl ProgressSink for SilentProgress {
    fn notify(&self, _event: &UploadEvent) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Completed,
    /// The job ended in a terminal state other than `completed`.
    Failed(JobState),
    /// No rows survived loading; nothing was sent.
    NothingToSubmit,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSummary {
    /// Remote folder that received the attachments, if any were uploaded.
    pub folder_path: Option<String>,
    pub uploaded_files: Vec<UploadedFile>,
    pub grades_submitted: usize,
    pub job: Option<SubmissionJob>,
    pub outcome: SubmissionOutcome,
}

impl UploadSummary {
    pub fn is_success(&self) -> bool {
        self.outcome == SubmissionOutcome::Completed
    }

    /// The `SubmissionFailed` error for a job that did not complete.
    pub fn failure(&self) -> Option<AppError> {
        match (self.outcome, self.job) {
            (SubmissionOutcome::Failed(state), Some(job)) => Some(AppError::SubmissionFailed {
                job_id: job.id,
                state,
            }),
            _ => None,
        }
    }
}

/// HTML block linking one uploaded attachment.
pub fn attachment_block(slot: AttachmentSlot, file: &UploadedFile) -> String {
    format!(
        "<p>📄 <strong>{}</strong></p><p><a href=\"{}\" target=\"_blank\">🔍 View</a><br><a href=\"{}\">💾 Download File</a></p>",
        slot.label(),
        file.view_url,
        file.download_url
    )
}

/// Free-text comment followed by one link block per uploaded attachment.
pub fn compose_comment(record: &GradeRecord) -> Option<String> {
    let blocks: String = AttachmentSlot::ALL
        .iter()
        .filter_map(|slot| {
            record
                .attachment(*slot)
                .and_then(|a| a.uploaded.as_ref())
                .map(|file| attachment_block(*slot, file))
        })
        .collect();
    let comment = record.comment.as_deref().filter(|c| !c.is_empty());

    match (comment, blocks.is_empty()) {
        (Some(text), true) => Some(text.to_string()),
        (Some(text), false) => Some(format!("{}<br>{}", text, blocks)),
        (None, false) => Some(blocks),
        (None, true) => None,
    }
}

/// Maps every record to the entry posted for that student.
pub fn build_grade_batch(sheet: &GradeSheet) -> GradeBatch {
    sheet
        .records
        .iter()
        .map(|record| {
            (
                record.student_id.clone(),
                GradeEntry {
                    posted_grade: record.posted_grade(),
                    text_comment: compose_comment(record),
                },
            )
        })
        .collect()
}

pub struct FeedbackUploader<'a> {
    api: &'a dyn LmsApi,
    polling: PollSettings,
    sink: &'a dyn ProgressSink,
}

impl<'a> FeedbackUploader<'a> {
    pub fn new(api: &'a dyn LmsApi, polling: PollSettings, sink: &'a dyn ProgressSink) -> Self {
        Self {
            api,
            polling,
            sink,
        }
    }

    /// Runs the whole pipeline for one assignment.
    ///
    /// A job that ends `failed` or `canceled` is returned as a summary with
    /// [`SubmissionOutcome::Failed`]; use [`UploadSummary::failure`] to turn it
    /// into an error.
    pub async fn upload(
        &self,
        course_id: u64,
        assignment_id: u64,
        assignment_name: Option<&str>,
        sheet: &mut GradeSheet,
    ) -> Result<UploadSummary> {
        let mut summary = UploadSummary {
            folder_path: None,
            uploaded_files: Vec::new(),
            grades_submitted: 0,
            job: None,
            outcome: SubmissionOutcome::NothingToSubmit,
        };

        if sheet.has_pdf_attachments() {
            let folder_path = feedback_folder_name(
                assignment_name,
                Some(assignment_id),
                Local::now().naive_local(),
            );
            summary.uploaded_files = self
                .upload_attachments(course_id, &folder_path, sheet)
                .await?;
            summary.folder_path = Some(folder_path);
        } else {
            debug!("No PDF attachments; skipping folder provisioning");
        }

        self.validate_roster(course_id, sheet).await?;

        let batch = build_grade_batch(sheet);
        if batch.is_empty() {
            warn!("Grade sheet has no rows to submit");
            return Ok(summary);
        }
        for record in &sheet.records {
            self.sink.notify(&UploadEvent::GradePrepared {
                student_id: record.student_id.clone(),
                posted_grade: record.posted_grade(),
                attachments: AttachmentSlot::ALL
                    .iter()
                    .filter(|slot| {
                        record
                            .attachment(**slot)
                            .map_or(false, |a| a.uploaded.is_some())
                    })
                    .count(),
            });
        }

        self.sink.notify(&UploadEvent::Submitting {
            grades: batch.len(),
        });
        info!(
            "Submitting {} grades for assignment {} in course {}",
            batch.len(),
            assignment_id,
            course_id
        );
        let job = self
            .api
            .submit_grades(course_id, assignment_id, &batch)
            .await?;
        summary.grades_submitted = batch.len();

        let job = self.wait_for_job(job).await?;
        summary.job = Some(job);
        summary.outcome = match job.state {
            JobState::Completed => SubmissionOutcome::Completed,
            state => {
                warn!("Grade submission job {} ended as {}", job.id, state);
                SubmissionOutcome::Failed(state)
            },
        };
        Ok(summary)
    }

    /// Creates the feedback folder and uploads every PDF in column order.
    async fn upload_attachments(
        &self,
        course_id: u64,
        folder_path: &str,
        sheet: &mut GradeSheet,
    ) -> Result<Vec<UploadedFile>> {
        let folder = self.api.ensure_folder(course_id, folder_path).await?;
        self.sink.notify(&UploadEvent::FolderReady {
            path: folder_path.to_string(),
        });

        let mut uploaded = Vec::new();
        for record in &mut sheet.records {
            let student_id = record.student_id.clone();
            for slot in AttachmentSlot::ALL {
                let Some(attachment) = record.attachment_mut(slot) else {
                    continue;
                };
                let Some(pdf) = attachment.pdf.clone() else {
                    continue;
                };

                let file = self.api.upload_file(course_id, &folder, &pdf).await?;
                self.sink.notify(&UploadEvent::FileUploaded {
                    student_id: student_id.clone(),
                    slot,
                    file: file.clone(),
                });
                attachment.uploaded = Some(file.clone());
                uploaded.push(file);
            }
        }

        info!("Uploaded {} files to {}", uploaded.len(), folder_path);
        Ok(uploaded)
    }

    /// Fails with `UnknownStudent` on the first id missing from the roster.
    async fn validate_roster(&self, course_id: u64, sheet: &GradeSheet) -> Result<()> {
        if sheet.is_empty() {
            return Ok(());
        }
        let roster: HashSet<String> = self
            .api
            .list_students(course_id)
            .await?
            .into_iter()
            .map(|student| student.id.to_string())
            .collect();

        match sheet
            .records
            .iter()
            .find(|record| !roster.contains(&record.student_id))
        {
            Some(record) => Err(AppError::UnknownStudent(record.student_id.clone())),
            None => Ok(()),
        }
    }

    /// Polls until the job reaches a terminal state or the poll timeout passes.
    async fn wait_for_job(&self, mut job: SubmissionJob) -> Result<SubmissionJob> {
        let started = Instant::now();
        let mut interval = self.polling.interval;

        while !job.state.is_terminal() {
            let elapsed = started.elapsed();
            if elapsed >= self.polling.timeout {
                return Err(AppError::SubmissionTimeout {
                    job_id: job.id,
                    waited: elapsed,
                });
            }
            sleep(interval.min(self.polling.timeout - elapsed)).await;

            job = self.api.get_job_status(job.id).await?;
            self.sink.notify(&UploadEvent::JobStatus {
                job_id: job.id,
                state: job.state,
                elapsed: started.elapsed(),
            });
            interval = self.polling.next_interval(interval);
        }

        Ok(job)
    }
}
