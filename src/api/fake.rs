//! In-memory fake of [`LmsApi`] (testing only).
//!
//! Records every mutating call so tests can assert on what reached the "server",
//! and replays a scripted sequence of job states for polling.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::LmsApi;
use crate::error::{AppError, Result};
use crate::models::{
    Assignment, AssignmentGroup, Course, Folder, GradeBatch, JobState, NewAssignment, Quiz,
    QuizQuestion, QuizSubmission, Student, Submission, SubmissionJob, UploadedFile,
};

#[derive(Debug, Default)]
pub struct FakeLms {
    pub courses: Vec<Course>,
    pub assignments: Vec<Assignment>,
    pub groups: Vec<AssignmentGroup>,
    pub students: Vec<Student>,
    pub submissions: Vec<Submission>,
    pub quizzes: Vec<Quiz>,
    pub questions: Vec<QuizQuestion>,
    pub quiz_submissions: Vec<QuizSubmission>,
    /// State returned by `submit_grades`.
    pub initial_state: Option<JobState>,
    /// States returned by successive `get_job_status` calls; the last one repeats.
    pub poll_states: Mutex<VecDeque<JobState>>,
    /// When set, uploads of this file name fail with a remote error.
    pub fail_upload_of: Option<String>,
    /// When set, folder provisioning fails with a remote error.
    pub fail_ensure_folder: bool,
    pub calls: Mutex<Calls>,
}

#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub course_fetches: usize,
    pub ensured_folders: Vec<String>,
    pub uploads: Vec<PathBuf>,
    pub roster_fetches: usize,
    pub submitted: Vec<GradeBatch>,
    pub polls: usize,
    pub created: Vec<NewAssignment>,
    pub deleted: Vec<u64>,
}

impl FakeLms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_students(mut self, ids: &[u64]) -> Self {
        self.students = ids
            .iter()
            .map(|id| Student {
                id: *id,
                name: format!("Student {}", id),
                email: Some(format!("s{}@example.edu", id)),
                sis_user_id: None,
            })
            .collect();
        self
    }

    pub fn with_job_states(mut self, initial: JobState, polls: &[JobState]) -> Self {
        self.initial_state = Some(initial);
        self.poll_states = Mutex::new(polls.iter().copied().collect());
        self
    }

    pub fn calls(&self) -> Calls {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LmsApi for FakeLms {
    async fn list_courses(&self, _force_refresh: bool) -> Result<Vec<Course>> {
        self.calls.lock().unwrap().course_fetches += 1;
        Ok(self.courses.clone())
    }

    async fn list_folders(&self, _course_id: u64) -> Result<Vec<Folder>> {
        Ok(Vec::new())
    }

    async fn list_assignments(&self, _course_id: u64) -> Result<Vec<Assignment>> {
        Ok(self.assignments.clone())
    }

    async fn list_assignment_groups(&self, _course_id: u64) -> Result<Vec<AssignmentGroup>> {
        Ok(self.groups.clone())
    }

    async fn list_students(&self, _course_id: u64) -> Result<Vec<Student>> {
        self.calls.lock().unwrap().roster_fetches += 1;
        Ok(self.students.clone())
    }

    async fn list_submissions(
        &self,
        _course_id: u64,
        _assignment_id: u64,
    ) -> Result<Vec<Submission>> {
        Ok(self.submissions.clone())
    }

    async fn list_quizzes(&self, _course_id: u64) -> Result<Vec<Quiz>> {
        Ok(self.quizzes.clone())
    }

    async fn get_quiz(&self, _course_id: u64, quiz_id: u64) -> Result<Quiz> {
        self.quizzes
            .iter()
            .find(|q| q.id == quiz_id)
            .cloned()
            .ok_or(AppError::RemoteApi {
                status: 404,
                body: "quiz not found".into(),
            })
    }

    async fn list_quiz_questions(
        &self,
        _course_id: u64,
        _quiz_id: u64,
    ) -> Result<Vec<QuizQuestion>> {
        Ok(self.questions.clone())
    }

    async fn list_quiz_submissions(
        &self,
        _course_id: u64,
        _quiz_id: u64,
    ) -> Result<Vec<QuizSubmission>> {
        Ok(self.quiz_submissions.clone())
    }

    async fn ensure_folder(&self, _course_id: u64, path: &str) -> Result<Folder> {
        self.calls.lock().unwrap().ensured_folders.push(path.to_string());
        if self.fail_ensure_folder {
            return Err(AppError::RemoteApi {
                status: 403,
                body: "folder creation not allowed".into(),
            });
        }
        Ok(Folder {
            id: 900,
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            full_name: Some(format!("course files/{}", path)),
            parent_folder_id: Some(1),
        })
    }

    async fn upload_file(
        &self,
        course_id: u64,
        folder: &Folder,
        path: &Path,
    ) -> Result<UploadedFile> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_upload_of.as_deref() == Some(name.as_str()) {
            return Err(AppError::RemoteApi {
                status: 500,
                body: "upload rejected".into(),
            });
        }

        let mut calls = self.calls.lock().unwrap();
        calls.uploads.push(path.to_path_buf());
        let id = 1000 + calls.uploads.len() as u64;
        let view_url = format!("https://canvas.test/courses/{}/files/{}", course_id, id);
        Ok(UploadedFile {
            remote_id: id,
            display_name: name,
            download_url: format!("{}/download", view_url),
            view_url,
            public_url: format!("https://files.test/{}", id),
            remote_folder_path: folder.full_name.clone().unwrap_or_default(),
        })
    }

    async fn submit_grades(
        &self,
        _course_id: u64,
        _assignment_id: u64,
        grades: &GradeBatch,
    ) -> Result<SubmissionJob> {
        self.calls.lock().unwrap().submitted.push(grades.clone());
        Ok(SubmissionJob {
            id: 77,
            state: self.initial_state.unwrap_or(JobState::Queued),
        })
    }

    async fn get_job_status(&self, job_id: u64) -> Result<SubmissionJob> {
        self.calls.lock().unwrap().polls += 1;
        let mut states = self.poll_states.lock().unwrap();
        let state = if states.len() > 1 {
            states.pop_front().unwrap_or(JobState::Completed)
        } else {
            states.front().copied().unwrap_or(JobState::Completed)
        };
        Ok(SubmissionJob { id: job_id, state })
    }

    async fn create_assignment(
        &self,
        _course_id: u64,
        assignment: &NewAssignment,
    ) -> Result<Assignment> {
        self.calls.lock().unwrap().created.push(assignment.clone());
        Ok(Assignment {
            id: 500,
            name: assignment.name.clone(),
            points_possible: assignment.points_possible,
            ..Assignment::default()
        })
    }

    async fn delete_assignment(&self, _course_id: u64, assignment_id: u64) -> Result<Assignment> {
        self.calls.lock().unwrap().deleted.push(assignment_id);
        self.assignments
            .iter()
            .find(|a| a.id == assignment_id)
            .cloned()
            .ok_or(AppError::RemoteApi {
                status: 404,
                body: "assignment not found".into(),
            })
    }
}
