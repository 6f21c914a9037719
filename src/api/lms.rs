//! The LMS capability consumed by the grade pipeline and the command layer.
//!
//! `CanvasClient` is the production implementation; tests use an in-memory fake.

use crate::error::Result;
use crate::models::{
    Assignment, AssignmentGroup, Course, Folder, GradeBatch, NewAssignment, Quiz, QuizQuestion,
    QuizSubmission, Student, Submission, SubmissionJob, UploadedFile,
};
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait LmsApi: Send + Sync {
    /// Active courses of the token owner. Served from cache unless `force_refresh`.
    async fn list_courses(&self, force_refresh: bool) -> Result<Vec<Course>>;

    async fn list_folders(&self, course_id: u64) -> Result<Vec<Folder>>;

    async fn list_assignments(&self, course_id: u64) -> Result<Vec<Assignment>>;

    async fn list_assignment_groups(&self, course_id: u64) -> Result<Vec<AssignmentGroup>>;

    async fn list_students(&self, course_id: u64) -> Result<Vec<Student>>;

    async fn list_submissions(&self, course_id: u64, assignment_id: u64)
        -> Result<Vec<Submission>>;

    async fn list_quizzes(&self, course_id: u64) -> Result<Vec<Quiz>>;

    async fn get_quiz(&self, course_id: u64, quiz_id: u64) -> Result<Quiz>;

    async fn list_quiz_questions(&self, course_id: u64, quiz_id: u64)
        -> Result<Vec<QuizQuestion>>;

    async fn list_quiz_submissions(
        &self,
        course_id: u64,
        quiz_id: u64,
    ) -> Result<Vec<QuizSubmission>>;

    /// Makes sure the `/`-separated `path` exists under the course file root and
    /// returns its last folder. Existing folders are reused, never duplicated.
    async fn ensure_folder(&self, course_id: u64, path: &str) -> Result<Folder>;

    /// Uploads a local file into `folder`.
    async fn upload_file(&self, course_id: u64, folder: &Folder, path: &Path)
        -> Result<UploadedFile>;

    /// Starts the asynchronous batch grading job.
    async fn submit_grades(
        &self,
        course_id: u64,
        assignment_id: u64,
        grades: &GradeBatch,
    ) -> Result<SubmissionJob>;

    async fn get_job_status(&self, job_id: u64) -> Result<SubmissionJob>;

    async fn create_assignment(&self, course_id: u64, assignment: &NewAssignment)
        -> Result<Assignment>;

    async fn delete_assignment(&self, course_id: u64, assignment_id: u64) -> Result<Assignment>;
}
