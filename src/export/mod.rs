//! File exports: roster and grade CSVs, quiz JSON/Markdown.

pub mod markdown;
mod quiz;
mod tables;

pub use quiz::{ExportFormat, QuizExport};
pub use tables::{write_grades, write_roster};
