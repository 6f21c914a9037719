//! Quiz export: the quiz, its questions and its submissions in one document.

use crate::error::Result;
use crate::export::markdown::html_to_markdown;
use crate::models::{Quiz, QuizQuestion, QuizSubmission};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Json,
    Markdown,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizExport {
    pub quiz: Quiz,
    pub questions: Vec<QuizQuestion>,
    pub submissions: Vec<QuizSubmission>,
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Markdown rendering of a [`QuizExport`].
struct QuizMarkdown<'a>(&'a QuizExport);

impl fmt::Display for QuizMarkdown<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let export = self.0;
        let quiz = &export.quiz;

        writeln!(out, "# {}\n", quiz.title)?;
        writeln!(out, "- ID: {}", quiz.id)?;
        writeln!(out, "- Type: {}", or_dash(quiz.quiz_type.as_deref()))?;
        writeln!(out, "- Points: {}", or_dash(quiz.points_possible))?;
        writeln!(out, "- Questions: {}", export.questions.len())?;
        writeln!(out, "- Due: {}", or_dash(quiz.due_at.as_deref()))?;

        if let Some(description) = quiz.description.as_deref() {
            let body = html_to_markdown(description);
            if !body.is_empty() {
                writeln!(out, "\n{}", body)?;
            }
        }

        writeln!(out, "\n## Questions")?;
        for (index, question) in export.questions.iter().enumerate() {
            let name = question.question_name.as_deref().unwrap_or("Question");
            write!(out, "\n### {}. {}", index + 1, name)?;
            if let Some(points) = question.points_possible {
                write!(out, " ({} pts)", points)?;
            }
            writeln!(out)?;
            if let Some(kind) = question.question_type.as_deref() {
                writeln!(out, "\n_{}_", kind)?;
            }
            if let Some(text) = question.question_text.as_deref() {
                writeln!(out, "\n{}", html_to_markdown(text))?;
            }
            if !question.answers.is_empty() {
                writeln!(out)?;
                for answer in &question.answers {
                    let text = answer
                        .text
                        .clone()
                        .filter(|t| !t.is_empty())
                        .or_else(|| answer.html.as_deref().map(html_to_markdown))
                        .unwrap_or_default();
                    let mark = if answer.weight.unwrap_or(0.0) > 0.0 { "x" } else { " " };
                    writeln!(out, "- [{}] {}", mark, text)?;
                }
            }
        }

        writeln!(out, "\n## Submissions\n")?;
        if export.submissions.is_empty() {
            return writeln!(out, "No submissions.");
        }
        writeln!(out, "| User | Attempt | Score | State | Finished |")?;
        writeln!(out, "|---|---|---|---|---|")?;
        for submission in &export.submissions {
            writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                or_dash(submission.user_id),
                or_dash(submission.attempt),
                or_dash(submission.kept_score.or(submission.score)),
                or_dash(submission.workflow_state.as_deref()),
                or_dash(submission.finished_at.as_deref()),
            )?;
        }
        Ok(())
    }
}

impl QuizExport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_markdown(&self) -> String {
        QuizMarkdown(self).to_string()
    }

    pub fn write(&self, path: &Path, format: ExportFormat) -> Result<()> {
        let contents = match format {
            ExportFormat::Json => self.to_json()?,
            ExportFormat::Markdown => self.to_markdown(),
        };
        std::fs::write(path, contents)?;
        info!("Wrote quiz {} to {}", self.quiz.id, path.display());
        Ok(())
    }
}
