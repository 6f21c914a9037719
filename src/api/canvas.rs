//! Provides a client for interacting with the Canvas LMS REST API.
//!
//! `CanvasClient` wraps an `ApiGateway` with one typed method per remote call,
//! caches the course list, provisions folders and runs the two-phase file upload.

use crate::api::gateway::ApiGateway;
use crate::api::lms::LmsApi;
use crate::config::{Config, UploadLimits};
use crate::error::{AppError, Result};
use crate::models::{
    Assignment, AssignmentGroup, Course, FileUploadRequest, FileUploadTicket, Folder, GradeBatch,
    NewAssignment, Progress, Quiz, QuizQuestion, QuizSubmission, QuizSubmissionsResponse,
    RemoteFile, Student, Submission, SubmissionJob, UploadedFile,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Canvas implementation of [`LmsApi`].
pub struct CanvasClient {
    gateway: ApiGateway,
    upload: UploadLimits,
    courses: Mutex<Option<Vec<Course>>>,
}

impl CanvasClient {
    /// Creates a client for the instance and credentials in `config`.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            gateway: ApiGateway::new(config)?,
            upload: config.upload.clone(),
            courses: Mutex::new(None),
        })
    }

    fn cached_courses(&self) -> Option<Vec<Course>> {
        let cache = self.courses.lock().unwrap_or_else(|p| p.into_inner());
        cache.as_ref().filter(|c| !c.is_empty()).cloned()
    }

    fn store_courses(&self, courses: &[Course]) {
        let mut cache = self.courses.lock().unwrap_or_else(|p| p.into_inner());
        *cache = Some(courses.to_vec());
    }

    /// Walks `segments` down from the course root, creating what is missing.
    async fn walk_folders(&self, course_id: u64, segments: &[&str]) -> Result<Folder> {
        let mut current: Folder = self
            .gateway
            .get_json(&format!("/courses/{}/folders/root", course_id), &[])
            .await?;

        for segment in segments {
            let children: Vec<Folder> = self
                .gateway
                .get_all(&format!("/folders/{}/folders", current.id), &[])
                .await?;

            current = match children.into_iter().find(|f| f.name == *segment) {
                Some(existing) => {
                    debug!("Reusing folder '{}' ({})", existing.name, existing.id);
                    existing
                },
                None => {
                    info!("Creating folder '{}' under folder {}", segment, current.id);
                    self.gateway
                        .send_json(
                            Method::POST,
                            &format!("/folders/{}/folders", current.id),
                            Some(&json!({ "name": segment })),
                        )
                        .await?
                },
            };
        }

        Ok(current)
    }

    /// Rejects files that are missing, too large or of a disallowed type.
    async fn check_upload(&self, path: &Path) -> Result<u64> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                AppError::FileNotFound(path.to_path_buf())
            } else {
                AppError::from(e)
            }
        })?;

        let size = metadata.len();
        let max = self.upload.max_file_size_bytes();
        if size > max {
            return Err(AppError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                max,
            });
        }

        let extension = file_extension(path);
        if !self.upload.allows(&extension) {
            return Err(AppError::FileTypeNotAllowed {
                path: path.to_path_buf(),
                extension: format!(".{}", extension),
            });
        }

        Ok(size)
    }
}

#[async_trait]
impl LmsApi for CanvasClient {
    async fn list_courses(&self, force_refresh: bool) -> Result<Vec<Course>> {
        if !force_refresh {
            if let Some(courses) = self.cached_courses() {
                debug!("Serving {} courses from cache", courses.len());
                return Ok(courses);
            }
        }

        info!("Fetching active courses");
        let courses: Vec<Course> = self
            .gateway
            .get_all(
                "/courses",
                &[
                    ("enrollment_state", "active".to_string()),
                    ("include[]", "term".to_string()),
                ],
            )
            .await?;
        debug!("Received {} courses", courses.len());

        self.store_courses(&courses);
        Ok(courses)
    }

    async fn list_folders(&self, course_id: u64) -> Result<Vec<Folder>> {
        self.gateway
            .get_all(&format!("/courses/{}/folders", course_id), &[])
            .await
    }

    async fn list_assignments(&self, course_id: u64) -> Result<Vec<Assignment>> {
        self.gateway
            .get_all(
                &format!("/courses/{}/assignments", course_id),
                &[("include[]", "assignment_group".to_string())],
            )
            .await
    }

    async fn list_assignment_groups(&self, course_id: u64) -> Result<Vec<AssignmentGroup>> {
        self.gateway
            .get_all(&format!("/courses/{}/assignment_groups", course_id), &[])
            .await
    }

    async fn list_students(&self, course_id: u64) -> Result<Vec<Student>> {
        info!("Fetching student roster for course {}", course_id);
        let students: Vec<Student> = self
            .gateway
            .get_all(
                &format!("/courses/{}/users", course_id),
                &[("enrollment_type[]", "student".to_string())],
            )
            .await?;
        debug!("Received {} students for course {}", students.len(), course_id);
        Ok(students)
    }

    async fn list_submissions(
        &self,
        course_id: u64,
        assignment_id: u64,
    ) -> Result<Vec<Submission>> {
        self.gateway
            .get_all(
                &format!(
                    "/courses/{}/assignments/{}/submissions",
                    course_id, assignment_id
                ),
                &[("include[]", "user".to_string())],
            )
            .await
    }

    async fn list_quizzes(&self, course_id: u64) -> Result<Vec<Quiz>> {
        self.gateway
            .get_all(&format!("/courses/{}/quizzes", course_id), &[])
            .await
    }

    async fn get_quiz(&self, course_id: u64, quiz_id: u64) -> Result<Quiz> {
        self.gateway
            .get_json(&format!("/courses/{}/quizzes/{}", course_id, quiz_id), &[])
            .await
    }

    async fn list_quiz_questions(
        &self,
        course_id: u64,
        quiz_id: u64,
    ) -> Result<Vec<QuizQuestion>> {
        self.gateway
            .get_all(
                &format!("/courses/{}/quizzes/{}/questions", course_id, quiz_id),
                &[],
            )
            .await
    }

    async fn list_quiz_submissions(
        &self,
        course_id: u64,
        quiz_id: u64,
    ) -> Result<Vec<QuizSubmission>> {
        let response: QuizSubmissionsResponse = self
            .gateway
            .get_json(
                &format!("/courses/{}/quizzes/{}/submissions", course_id, quiz_id),
                &[("per_page", "100".to_string())],
            )
            .await?;
        Ok(response.quiz_submissions)
    }

    async fn ensure_folder(&self, course_id: u64, path: &str) -> Result<Folder> {
        let segments = folder_segments(path);
        if segments.is_empty() {
            return self
                .gateway
                .get_json(&format!("/courses/{}/folders/root", course_id), &[])
                .await;
        }

        let normalized = segments.join("/");
        let lookup = self
            .gateway
            .get_json::<Vec<Folder>>(
                &format!("/courses/{}/folders/by_path/{}", course_id, normalized),
                &[],
            )
            .await;

        match lookup {
            Ok(mut chain) => match chain.pop() {
                Some(folder) => {
                    debug!("Folder '{}' already exists ({})", normalized, folder.id);
                    Ok(folder)
                },
                None => self.walk_folders(course_id, &segments).await,
            },
            Err(e) if e.is_status(404) => {
                debug!("Folder '{}' not found by path, creating it", normalized);
                self.walk_folders(course_id, &segments).await
            },
            Err(e) => Err(e),
        }
    }

    async fn upload_file(
        &self,
        course_id: u64,
        folder: &Folder,
        path: &Path,
    ) -> Result<UploadedFile> {
        let size = self.check_upload(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = content_type_for(&file_extension(path));

        info!("Uploading '{}' ({} bytes) to folder {}", name, size, folder.id);

        let request = FileUploadRequest {
            name: name.clone(),
            size,
            content_type: content_type.to_string(),
            parent_folder_id: folder.id,
        };
        let ticket: FileUploadTicket = self
            .gateway
            .send_json(
                Method::POST,
                &format!("/courses/{}/files", course_id),
                Some(&request),
            )
            .await?;

        let bytes = tokio::fs::read(path).await?;
        let mut form = Form::new();
        for (key, value) in ticket.upload_params {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            form = form.text(key, value);
        }
        let part = Part::bytes(bytes)
            .file_name(name)
            .mime_str(content_type)?;
        form = form.part("file", part);

        let file: RemoteFile = self
            .gateway
            .post_form(&ticket.upload_url, form, self.upload.timeout)
            .await?;

        let view_url = format!(
            "{}/courses/{}/files/{}",
            self.gateway.base_url(),
            course_id,
            file.id
        );
        Ok(UploadedFile {
            remote_id: file.id,
            display_name: file.display_name,
            download_url: format!("{}/download", view_url),
            view_url,
            public_url: file.url.unwrap_or_default(),
            remote_folder_path: folder
                .full_name
                .clone()
                .unwrap_or_else(|| folder.name.clone()),
        })
    }

    async fn submit_grades(
        &self,
        course_id: u64,
        assignment_id: u64,
        grades: &GradeBatch,
    ) -> Result<SubmissionJob> {
        info!(
            "Submitting {} grades for assignment {} in course {}",
            grades.len(),
            assignment_id,
            course_id
        );
        let progress: Progress = self
            .gateway
            .send_json(
                Method::POST,
                &format!(
                    "/courses/{}/assignments/{}/submissions/update_grades",
                    course_id, assignment_id
                ),
                Some(&json!({ "grade_data": grades })),
            )
            .await?;
        Ok(progress.into())
    }

    async fn get_job_status(&self, job_id: u64) -> Result<SubmissionJob> {
        let progress: Progress = self
            .gateway
            .get_json(&format!("/progress/{}", job_id), &[])
            .await?;
        Ok(progress.into())
    }

    async fn create_assignment(
        &self,
        course_id: u64,
        assignment: &NewAssignment,
    ) -> Result<Assignment> {
        info!("Creating assignment '{}' in course {}", assignment.name, course_id);
        self.gateway
            .send_json(
                Method::POST,
                &format!("/courses/{}/assignments", course_id),
                Some(&json!({ "assignment": assignment })),
            )
            .await
    }

    async fn delete_assignment(&self, course_id: u64, assignment_id: u64) -> Result<Assignment> {
        info!("Deleting assignment {} in course {}", assignment_id, course_id);
        self.gateway
            .send_json::<(), Assignment>(
                Method::DELETE,
                &format!("/courses/{}/assignments/{}", course_id, assignment_id),
                None,
            )
            .await
    }
}

/// Splits a POSIX-style folder path into its non-empty, non-`.` segments.
fn folder_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// MIME type for a lowercase extension (without the dot).
fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "md" => "text/markdown",
        "txt" => "text/plain",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}
