//! CSV exports of the course roster and of assignment grades.

use crate::error::Result;
use crate::models::{Student, Submission};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// One line of `students_*.csv`.
#[derive(Debug, Serialize, PartialEq)]
pub struct RosterRow<'a> {
    pub canvas_id: u64,
    pub name: &'a str,
    pub email: &'a str,
    pub sis_user_id: &'a str,
}

impl<'a> From<&'a Student> for RosterRow<'a> {
    fn from(student: &'a Student) -> Self {
        Self {
            canvas_id: student.id,
            name: &student.name,
            email: student.email.as_deref().unwrap_or(""),
            sis_user_id: student.sis_user_id.as_deref().unwrap_or(""),
        }
    }
}

/// One line of `grades_*.csv`.
#[derive(Debug, Serialize, PartialEq)]
pub struct GradeRow<'a> {
    pub canvas_id: u64,
    pub name: &'a str,
    pub email: &'a str,
    pub grade: Option<f64>,
    pub submitted_at: &'a str,
    pub workflow_state: &'a str,
    pub late: bool,
}

/// Joins submissions with the roster; submissions from non-students are skipped.
pub fn grade_rows<'a>(students: &'a [Student], submissions: &'a [Submission]) -> Vec<GradeRow<'a>> {
    let by_id: HashMap<u64, &Student> = students.iter().map(|s| (s.id, s)).collect();

    submissions
        .iter()
        .filter_map(|submission| {
            let student = by_id.get(&submission.user_id)?;
            Some(GradeRow {
                canvas_id: submission.user_id,
                name: &student.name,
                email: student.email.as_deref().unwrap_or(""),
                grade: submission.score,
                submitted_at: submission.submitted_at.as_deref().unwrap_or(""),
                workflow_state: submission.workflow_state.as_deref().unwrap_or(""),
                late: submission.late,
            })
        })
        .collect()
}

/// Writes serializable rows with a header line; returns the number of rows.
pub fn write_rows<W: Write, R: Serialize>(writer: W, rows: &[R]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

pub fn write_roster(path: &Path, students: &[Student]) -> Result<usize> {
    let rows: Vec<RosterRow> = students.iter().map(RosterRow::from).collect();
    let written = write_rows(File::create(path)?, &rows)?;
    info!("Wrote {} students to {}", written, path.display());
    Ok(written)
}

pub fn write_grades(path: &Path, students: &[Student], submissions: &[Submission]) -> Result<usize> {
    let rows = grade_rows(students, submissions);
    let written = write_rows(File::create(path)?, &rows)?;
    info!("Wrote {} grades to {}", written, path.display());
    Ok(written)
}
