use crate::api::{CanvasClient, LmsApi};
use crate::cli::commands::{
    AssignmentDownload, AssignmentUpload, CourseFilter, CreateTarget, DeleteTarget,
    DownloadTarget, ListTarget, NewAssignmentArgs, ShellCommand, ShowTarget, UploadTarget,
    UseTarget,
};
use crate::cli::progress::ConsoleProgress;
use crate::cli::render;
use crate::config::{Config, PollSettings};
use crate::error::{AppError, Result};
use crate::export::{self, ExportFormat, QuizExport};
use crate::grades::naming::{sanitize_name, FILE_NAME_MAX};
use crate::grades::{
    DocumentConverter, FeedbackUploader, GradeSheetLoader, PandocConverter, SubmissionOutcome,
    UploadSummary,
};
use crate::models::{Assignment, Course, CourseContext, NewAssignment};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, FuzzySelect};
use regex::RegexBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Whether the shell keeps reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Shell state: the API client and the selected course.
pub struct App<A: LmsApi> {
    api: A,
    polling: PollSettings,
    converter: Box<dyn DocumentConverter>,
    course: Option<CourseContext>,
}

impl App<CanvasClient> {
    /// Create the application against the configured Canvas instance.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = CanvasClient::new(config)?;
        let converter = Box::new(PandocConverter::new(&config.converter));
        Ok(Self::new(api, config.polling.clone(), converter))
    }
}

/// Courses whose name and code match the filter's regexes.
pub fn filter_courses<'c>(courses: &'c [Course], filter: &CourseFilter) -> Result<Vec<&'c Course>> {
    let compile = |pattern: &Option<String>| {
        pattern
            .as_deref()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(filter.ignore_case)
                    .build()
                    .map_err(|e| AppError::Cli(format!("Invalid regex: {}", e)))
            })
            .transpose()
    };
    let name_rx = compile(&filter.name)?;
    let code_rx = compile(&filter.code)?;

    Ok(courses
        .iter()
        .filter(|course| name_rx.as_ref().map_or(true, |rx| rx.is_match(&course.name)))
        .filter(|course| {
            code_rx
                .as_ref()
                .map_or(true, |rx| rx.is_match(course.course_code.as_deref().unwrap_or("")))
        })
        .collect())
}

/// `{prefix}_{course_id}_{sanitized name}.{extension}` in the working directory.
pub fn default_export_path(prefix: &str, course_id: u64, name: &str, extension: &str) -> PathBuf {
    PathBuf::from(format!(
        "{}_{}_{}.{}",
        prefix,
        course_id,
        sanitize_name(name, FILE_NAME_MAX),
        extension
    ))
}

impl<A: LmsApi> App<A> {
    pub fn new(api: A, polling: PollSettings, converter: Box<dyn DocumentConverter>) -> Self {
        Self {
            api,
            polling,
            converter,
            course: None,
        }
    }

    pub fn current_course(&self) -> Option<&CourseContext> {
        self.course.as_ref()
    }

    /// `canvas> `, or `canvas/{course}> ` once a course is selected.
    pub fn prompt(&self) -> String {
        match self.current_course() {
            None => "canvas> ".to_string(),
            Some(course) => {
                let name = course.name.to_lowercase().replace(' ', "_");
                let short = if name.chars().count() > 20 {
                    format!("{}...", name.chars().take(20).collect::<String>())
                } else {
                    name
                };
                format!("canvas/{}> ", short)
            },
        }
    }

    fn require_course(&self) -> Result<CourseContext> {
        self.current_course()
            .cloned()
            .ok_or(AppError::NoCourseSelected)
    }

    /// Dispatch one parsed shell command.
    pub async fn run(&mut self, command: ShellCommand) -> Result<Flow> {
        match command {
            ShellCommand::Ls(ListTarget::Courses(filter)) => self.list_courses(&filter).await?,
            ShellCommand::Ls(ListTarget::Folders { course_id }) => {
                self.list_folders(course_id).await?
            },
            ShellCommand::Use(UseTarget::Course { course_id }) => {
                self.select_course(course_id).await?;
            },
            ShellCommand::Show(ShowTarget::Assignments) => self.list_assignments().await?,
            ShellCommand::Show(ShowTarget::Assignment { assignment_id }) => {
                self.show_assignment(assignment_id).await?
            },
            ShellCommand::Show(ShowTarget::Students) => self.list_students().await?,
            ShellCommand::Show(ShowTarget::Quizzes) => self.list_quizzes().await?,
            ShellCommand::Download(DownloadTarget::Students { file }) => {
                self.download_students(file).await?;
            },
            ShellCommand::Download(DownloadTarget::Assignment(AssignmentDownload::Grades {
                assignment_id,
                file,
            })) => {
                self.download_grades(assignment_id, file).await?;
            },
            ShellCommand::Download(DownloadTarget::Quiz {
                quiz_id,
                file,
                format,
            }) => {
                self.download_quiz(quiz_id, file, format).await?;
            },
            ShellCommand::Upload(UploadTarget::Assignment(AssignmentUpload::Grades {
                assignment_id,
                file,
                root_dir,
            })) => {
                let summary = self
                    .upload_grades(assignment_id, &file, root_dir.as_deref())
                    .await?;
                report_upload(&summary);
            },
            ShellCommand::Create(CreateTarget::Assignment(args)) => {
                self.create_assignment(&args).await?;
            },
            ShellCommand::Delete(DeleteTarget::Assignment { assignment_id, yes }) => {
                self.delete_assignment(assignment_id, yes).await?;
            },
            ShellCommand::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    /// Switch to a course; without an ID the user picks one from the course list.
    pub async fn select_course(&mut self, course_id: Option<u64>) -> Result<CourseContext> {
        let courses = self.api.list_courses(false).await?;
        if courses.is_empty() {
            return Err(AppError::NotFound("No courses available.".to_string()));
        }

        let course = match course_id {
            Some(id) => courses.iter().find(|c| c.id == id).ok_or_else(|| {
                AppError::NotFound(format!(
                    "Course with Canvas ID {} not found in your accessible courses",
                    id
                ))
            })?,
            None => {
                let items: Vec<String> = courses
                    .iter()
                    .map(|c| format!("{} (ID: {})", c.name, c.id))
                    .collect();
                let selection = FuzzySelect::with_theme(&ColorfulTheme::default())
                    .with_prompt("Select a course")
                    .items(&items)
                    .default(0)
                    .interact_opt()?
                    .ok_or_else(|| AppError::Cli("No course selected".to_string()))?;
                &courses[selection]
            },
        };

        let context = CourseContext::from(course);
        info!("Selected course {} ({})", context.name, context.id);
        println!("Selected course: {}", context.name.green());
        self.course = Some(context.clone());
        Ok(context)
    }

    pub async fn list_courses(&self, filter: &CourseFilter) -> Result<()> {
        let courses = self.api.list_courses(filter.refresh).await?;
        let matched = filter_courses(&courses, filter)?;

        let mut title = "Available Courses".to_string();
        if filter.name.is_some() || filter.code.is_some() {
            title.push_str(" (filtered)");
        }
        println!(
            "{}",
            render::heading(&format!("{}: {}/{}", title, matched.len(), courses.len()))
        );

        match matched.first() {
            None => println!("No courses matched your filter."),
            Some(first) => {
                let current = self.current_course().map(|c| c.id);
                println!("{}", render::courses_table(&matched, current));
                println!("\nUse 'use course <canvas_id>' to select a course");
                println!("    Example: 'use course {}'", first.id);
            },
        }
        Ok(())
    }

    pub async fn list_folders(&self, course_id: Option<u64>) -> Result<()> {
        let course_id = match course_id {
            Some(id) => id,
            None => self.require_course()?.id,
        };
        let folders = self.api.list_folders(course_id).await?;

        println!(
            "{}",
            render::heading(&format!("Available Folders for course {}", course_id))
        );
        if folders.is_empty() {
            println!("No folders available in the course.");
        } else {
            println!("{}", render::folders_table(&folders));
            println!("Total folders available: {}", folders.len());
        }
        Ok(())
    }

    async fn group_names(&self, course_id: u64) -> Result<HashMap<u64, String>> {
        Ok(self
            .api
            .list_assignment_groups(course_id)
            .await?
            .into_iter()
            .map(|group| (group.id, group.name))
            .collect())
    }

    async fn find_assignment(&self, course: &CourseContext, assignment_id: u64) -> Result<Assignment> {
        self.api
            .list_assignments(course.id)
            .await?
            .into_iter()
            .find(|a| a.id == assignment_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Cannot find assignment with ID: {} in course '{}'",
                    assignment_id, course.name
                ))
            })
    }

    pub async fn list_assignments(&self) -> Result<()> {
        let course = self.require_course()?;
        let assignments = self.api.list_assignments(course.id).await?;
        let groups = self.group_names(course.id).await?;

        println!(
            "{}",
            render::heading(&format!("Available assignments for course {}", course.id))
        );
        match assignments.first() {
            None => println!("No assignments available in the course."),
            Some(first) => {
                println!("{}", render::assignments_table(&assignments, &groups));
                println!("Total assignments available: {}", assignments.len());
                println!(
                    "\nUse 'upload assignment grades {} --file <csv_file>' to upload grades",
                    first.id
                );
            },
        }
        Ok(())
    }

    pub async fn show_assignment(&self, assignment_id: u64) -> Result<()> {
        let course = self.require_course()?;
        let assignment = self.find_assignment(&course, assignment_id).await?;
        let groups = self.group_names(course.id).await?;

        println!(
            "{}",
            render::heading(&format!("Assignment Details: {}", assignment.name))
        );
        for (label, value) in
            render::assignment_details(&assignment, render::group_name(&assignment, &groups))
        {
            println!("{}: {}", label.bold(), value);
        }
        Ok(())
    }

    pub async fn list_students(&self) -> Result<()> {
        let course = self.require_course()?;
        let students = self.api.list_students(course.id).await?;

        println!(
            "{}",
            render::heading(&format!("Available students for course {}", course.id))
        );
        if students.is_empty() {
            println!("No students available in the course.");
        } else {
            println!("{}", render::students_table(&students));
            println!("Total students available: {}", students.len());
            println!("\nUse 'download students --file students.csv' to save the full list to CSV");
        }
        Ok(())
    }

    pub async fn list_quizzes(&self) -> Result<()> {
        let course = self.require_course()?;
        let quizzes = self.api.list_quizzes(course.id).await?;

        println!(
            "{}",
            render::heading(&format!("Available quizzes for course {}", course.id))
        );
        if quizzes.is_empty() {
            println!("No quizzes available in the course.");
        } else {
            println!("{}", render::quizzes_table(&quizzes));
            println!("Total quizzes available: {}", quizzes.len());
        }
        Ok(())
    }

    /// Export the roster; `None` when the course has no students.
    pub async fn download_students(&self, file: Option<PathBuf>) -> Result<Option<PathBuf>> {
        let course = self.require_course()?;
        let students = self.api.list_students(course.id).await?;
        if students.is_empty() {
            println!("No students found in this course");
            return Ok(None);
        }

        let path =
            file.unwrap_or_else(|| default_export_path("students", course.id, &course.name, "csv"));
        let written = export::write_roster(&path, &students)?;
        println!("Student list exported to: {}", path.display().to_string().green());
        println!("Total students: {}", written);
        Ok(Some(path))
    }

    pub async fn download_grades(&self, assignment_id: u64, file: Option<PathBuf>) -> Result<PathBuf> {
        let course = self.require_course()?;
        let assignment = self.find_assignment(&course, assignment_id).await?;

        println!("\nGrade Download Summary:");
        println!("   Course: {}", course.name);
        println!("   Assignment: {}", assignment.name);

        let students = self.api.list_students(course.id).await?;
        let submissions = self.api.list_submissions(course.id, assignment_id).await?;

        let path = file
            .unwrap_or_else(|| default_export_path("grades", course.id, &assignment.name, "csv"));
        let written = export::write_grades(&path, &students, &submissions)?;
        println!(
            "Downloaded {} grades to: {}",
            written,
            path.display().to_string().green()
        );
        Ok(path)
    }

    pub async fn download_quiz(
        &self,
        quiz_id: u64,
        file: Option<PathBuf>,
        format: ExportFormat,
    ) -> Result<PathBuf> {
        let course = self.require_course()?;
        let quiz = self.api.get_quiz(course.id, quiz_id).await?;
        let questions = self.api.list_quiz_questions(course.id, quiz_id).await?;
        let submissions = self.api.list_quiz_submissions(course.id, quiz_id).await?;

        let path = file.unwrap_or_else(|| {
            default_export_path("quiz", course.id, &quiz.title, format.extension())
        });
        let export = QuizExport {
            quiz,
            questions,
            submissions,
        };
        export.write(&path, format)?;
        println!(
            "Quiz '{}' exported to: {} ({} questions, {} submissions)",
            export.quiz.title,
            path.display().to_string().green(),
            export.questions.len(),
            export.submissions.len()
        );
        Ok(path)
    }

    /// Load the grade sheet, then run the upload pipeline for the assignment.
    pub async fn upload_grades(
        &self,
        assignment_id: u64,
        file: &Path,
        root_dir: Option<&Path>,
    ) -> Result<UploadSummary> {
        let course = self.require_course()?;
        let mut sheet = GradeSheetLoader::new(self.converter.as_ref())
            .load(file, root_dir)
            .await?;
        println!(
            "Loaded {} grades from {}",
            sheet.len(),
            file.display().to_string().cyan()
        );
        if sheet.dropped_rows > 0 {
            warn!("Skipped {} rows without student id or grade", sheet.dropped_rows);
        }

        let assignment = self.find_assignment(&course, assignment_id).await?;

        let progress = ConsoleProgress::new()?;
        let uploader = FeedbackUploader::new(&self.api, self.polling.clone(), &progress);
        let result = uploader
            .upload(course.id, assignment.id, Some(&assignment.name), &mut sheet)
            .await;
        progress.finish();
        result
    }

    pub async fn create_assignment(&self, args: &NewAssignmentArgs) -> Result<Assignment> {
        let course = self.require_course()?;
        let request = NewAssignment {
            name: args.name.clone(),
            points_possible: args.points,
            due_at: args.due_date.clone(),
            description: args.description.clone(),
            published: args.published.then_some(true),
        };

        let created = self.api.create_assignment(course.id, &request).await?;
        println!(
            "{} Assignment created: {} (ID: {})",
            "✅".green(),
            created.name,
            created.id
        );
        Ok(created)
    }

    /// Delete after confirmation; `None` when the user declines.
    pub async fn delete_assignment(&self, assignment_id: u64, yes: bool) -> Result<Option<Assignment>> {
        let course = self.require_course()?;
        let assignment = self.find_assignment(&course, assignment_id).await?;

        if !yes {
            let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!(
                    "Delete assignment '{}' (ID: {})?",
                    assignment.name, assignment.id
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("Deletion cancelled.");
                return Ok(None);
            }
        }

        println!(
            "Deleting assignment: {} (ID: {}) ...",
            assignment.name, assignment_id
        );
        let deleted = self.api.delete_assignment(course.id, assignment_id).await?;
        println!("{} Assignment deleted.", "✅".green());
        Ok(Some(deleted))
    }
}

fn report_upload(summary: &UploadSummary) {
    if let Some(folder) = &summary.folder_path {
        println!(
            "{} files were uploaded to {}",
            summary.uploaded_files.len(),
            folder.cyan()
        );
    }
    if summary.is_success() {
        println!(
            "{}",
            format!("{} grades uploaded successfully.", summary.grades_submitted).green()
        );
    } else if let Some(err) = summary.failure() {
        println!("{}", err.to_string().red());
    } else if summary.outcome == SubmissionOutcome::NothingToSubmit {
        println!("{}", "No grades to submit.".yellow());
    }
}
