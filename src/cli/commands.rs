use crate::error::{AppError, Result};
use crate::export::ExportFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Interactive shell for the Canvas LMS API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run one shell command (e.g. "ls courses") and exit
    #[arg(short, long)]
    pub command: Option<String>,

    /// Canvas ID of the course to select at start-up
    #[arg(long)]
    pub course: Option<u64>,
}

/// One line typed at the shell prompt.
#[derive(Parser, Debug)]
#[command(name = "canvas", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ShellCommand {
    /// List courses or course folders
    #[command(subcommand)]
    Ls(ListTarget),

    /// Select the course the other commands operate on
    #[command(subcommand)]
    Use(UseTarget),

    /// Show assignments, students or quizzes of the current course
    #[command(subcommand)]
    Show(ShowTarget),

    /// Export course data to files
    #[command(subcommand)]
    Download(DownloadTarget),

    /// Upload grades and feedback files
    #[command(subcommand)]
    Upload(UploadTarget),

    /// Create an assignment in the current course
    #[command(subcommand)]
    Create(CreateTarget),

    /// Delete an assignment from the current course
    #[command(subcommand)]
    Delete(DeleteTarget),

    /// Leave the shell
    #[command(alias = "quit")]
    Exit,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ListTarget {
    /// List active courses
    Courses(CourseFilter),
    /// List the folders of a course (current course by default)
    Folders {
        /// Canvas course ID
        course_id: Option<u64>,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct CourseFilter {
    /// Regex matched against the course name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Regex matched against the course code
    #[arg(short, long)]
    pub code: Option<String>,

    /// Case-insensitive matching
    #[arg(short = 'i', long)]
    pub ignore_case: bool,

    /// Bypass the cached course list
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum UseTarget {
    /// Switch to a course (pick from a list when no ID is given)
    Course {
        /// Canvas course ID
        course_id: Option<u64>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ShowTarget {
    /// List the assignments of the current course
    Assignments,
    /// Show the details of one assignment
    Assignment {
        /// Canvas assignment ID
        assignment_id: u64,
    },
    /// List the students of the current course
    Students,
    /// List the quizzes of the current course
    Quizzes,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum DownloadTarget {
    /// Export the student roster to CSV
    Students {
        /// Output file (default: students_<course id>_<course name>.csv)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Export assignment data
    #[command(subcommand)]
    Assignment(AssignmentDownload),
    /// Export a quiz with its questions and submissions
    Quiz {
        /// Canvas quiz ID
        quiz_id: u64,

        /// Output file (default: quiz_<course id>_<quiz title>.<ext>)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AssignmentDownload {
    /// Export the grades of an assignment to CSV
    Grades {
        /// Canvas assignment ID
        assignment_id: u64,

        /// Output file (default: grades_<course id>_<assignment name>.csv)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum UploadTarget {
    /// Upload assignment data
    #[command(subcommand)]
    Assignment(AssignmentUpload),
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AssignmentUpload {
    /// Upload grades, comments and feedback files from a CSV grade sheet
    Grades {
        /// Canvas assignment ID
        assignment_id: u64,

        /// Grade sheet (CSV)
        #[arg(short, long)]
        file: PathBuf,

        /// Directory relative attachment paths are resolved against
        /// (default: the grade sheet's directory)
        #[arg(short, long)]
        root_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CreateTarget {
    /// Create an assignment
    Assignment(NewAssignmentArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct NewAssignmentArgs {
    /// Assignment name
    pub name: String,

    /// Points possible
    #[arg(short, long)]
    pub points: Option<f64>,

    /// Due date (ISO 8601, e.g. 2024-05-01T23:59:00Z)
    #[arg(short, long)]
    pub due_date: Option<String>,

    /// Assignment description (HTML allowed)
    #[arg(long)]
    pub description: Option<String>,

    /// Publish immediately
    #[arg(long)]
    pub published: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum DeleteTarget {
    /// Delete an assignment
    Assignment {
        /// Canvas assignment ID
        assignment_id: u64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Splits a shell line into words. Single and double quotes group words;
/// a backslash escapes the next character outside single quotes.
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => match chars.next() {
                Some(escaped) => {
                    current.push(escaped);
                    in_word = true;
                },
                None => return Err(AppError::Cli("trailing backslash".to_string())),
            },
            (Some(_), c) => current.push(c),
            (None, '"') | (None, '\'') => {
                quote = Some(c);
                in_word = true;
            },
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            },
            (None, c) => {
                current.push(c);
                in_word = true;
            },
        }
    }

    if let Some(q) = quote {
        return Err(AppError::Cli(format!("unterminated {} quote", q)));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Tokenizes and parses one shell line. Help output is returned as a clap error.
pub fn parse_line(line: &str) -> Result<std::result::Result<ShellCommand, clap::Error>> {
    let words = split_command_line(line)?;
    Ok(ShellLine::try_parse_from(words).map(|parsed| parsed.command))
}
