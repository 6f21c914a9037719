//! Defines data structures for the application.
//!
//! Includes structs for:
//! - Deserializing Canvas REST API v1 responses (courses, folders, assignments, users, quizzes).
//! - Request bodies sent to the API (`GradeBatch`, `NewAssignment`, `FileUploadRequest`).
//! - Values the upload pipeline produces and passes around (`UploadedFile`, `SubmissionJob`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// --- Courses ---

/// Enrollment term a course belongs to (present when requested with `include[]=term`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Term {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A course as returned by `/courses`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Course {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub term: Option<Term>,
}

/// The course a shell session currently operates on.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseContext {
    pub id: u64,
    pub name: String,
    pub code: Option<String>,
    pub term: Option<String>,
}

impl From<&Course> for CourseContext {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id,
            name: course.name.clone(),
            code: course.course_code.clone(),
            term: course.term.as_ref().and_then(|t| t.name.clone()),
        }
    }
}

// --- Files & folders ---

/// A folder in a course's file area.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Folder {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Path from the course root, e.g. `course files/Grade_Feedback/2024-05-01_Quiz`.
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub parent_folder_id: Option<u64>,
}

/// Body of the first upload phase (`POST /courses/{id}/files`).
#[derive(Debug, Clone, Serialize)]
pub struct FileUploadRequest {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub parent_folder_id: u64,
}

/// Parameters for the second upload phase: where to POST the bytes and which
/// form fields to send along with them.
#[derive(Debug, Clone, Deserialize)]
pub struct FileUploadTicket {
    pub upload_url: String,
    #[serde(default)]
    pub upload_params: serde_json::Map<String, serde_json::Value>,
}

/// File object returned once the bytes have been stored.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    pub id: u64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// A feedback attachment after it has been uploaded to the course files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedFile {
    pub remote_id: u64,
    pub display_name: String,
    /// Page showing the file inside the course.
    pub view_url: String,
    pub download_url: String,
    /// Pre-signed URL reported by the file store (may be empty).
    pub public_url: String,
    pub remote_folder_path: String,
}

// --- Assignments & submissions ---

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AssignmentGroup {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// An assignment as returned by `/courses/{id}/assignments`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Assignment {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub lock_at: Option<String>,
    #[serde(default)]
    pub unlock_at: Option<String>,
    #[serde(default)]
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub assignment_group_id: Option<u64>,
    #[serde(default)]
    pub submission_types: Vec<String>,
    #[serde(default)]
    pub allowed_attempts: Option<i64>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub has_submitted_submissions: bool,
    #[serde(default)]
    pub needs_grading_count: Option<u64>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Fields accepted when creating an assignment.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct NewAssignment {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_possible: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// A student enrolled in a course.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Student {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sis_user_id: Option<String>,
}

/// One student's submission for an assignment.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Submission {
    pub user_id: u64,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub late: bool,
}

// --- Quizzes ---

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Quiz {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quiz_type: Option<String>,
    #[serde(default)]
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub question_count: Option<u64>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct QuizAnswer {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct QuizQuestion {
    pub id: u64,
    #[serde(default)]
    pub position: Option<u64>,
    #[serde(default)]
    pub question_name: Option<String>,
    #[serde(default)]
    pub question_type: Option<String>,
    #[serde(default)]
    pub question_text: Option<String>,
    #[serde(default)]
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct QuizSubmission {
    pub id: u64,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub attempt: Option<u64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub kept_score: Option<f64>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

/// Envelope used by `/quizzes/{id}/submissions`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizSubmissionsResponse {
    #[serde(default)]
    pub quiz_submissions: Vec<QuizSubmission>,
}

// --- Grade submission ---

/// Grade and optional comment posted for one student.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GradeEntry {
    pub posted_grade: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_comment: Option<String>,
}

/// Student id → grade entry; serialized as the `grade_data` object.
pub type GradeBatch = BTreeMap<String, GradeEntry>;

/// State of a remote asynchronous job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    #[serde(alias = "cancelled")]
    Canceled,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Canceled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
            JobState::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Raw progress object returned by `update_grades` and `/progress/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Progress {
    pub id: u64,
    #[serde(default)]
    pub workflow_state: Option<JobState>,
}

/// Handle on the batch grading job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionJob {
    pub id: u64,
    pub state: JobState,
}

impl From<Progress> for SubmissionJob {
    fn from(progress: Progress) -> Self {
        Self {
            id: progress.id,
            // A progress object without a state is treated as failed.
            state: progress.workflow_state.unwrap_or(JobState::Failed),
        }
    }
}
