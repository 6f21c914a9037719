//! Name sanitization shared by remote folder names and default export file names.
//!
//! Kept characters: alphanumerics (any script), space, `-` and `_`. Everything
//! else is dropped, the result is trimmed, spaces become `_`, and the name is
//! cut to at most `max_len` characters.

use chrono::NaiveDateTime;

/// Length cap for the assignment part of a feedback folder name.
pub const FOLDER_NAME_MAX: usize = 30;

/// Length cap for the descriptive part of exported file names.
pub const FILE_NAME_MAX: usize = 60;

/// Root folder (under the course files) that receives feedback uploads.
pub const FEEDBACK_ROOT: &str = "Grade_Feedback";

pub fn sanitize_name(raw: &str, max_len: usize) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim().replace(' ', "_").chars().take(max_len).collect()
}

/// Remote folder for one upload run, e.g. `Grade_Feedback/2024-05-01_Midterm_Exam`.
///
/// Falls back to the assignment id, then to a timestamped manual-upload name.
pub fn feedback_folder_name(
    assignment_name: Option<&str>,
    assignment_id: Option<u64>,
    now: NaiveDateTime,
) -> String {
    let today = now.format("%Y-%m-%d");

    if let Some(name) = assignment_name {
        let clean = sanitize_name(name, FOLDER_NAME_MAX);
        if !clean.is_empty() {
            return format!("{}/{}_{}", FEEDBACK_ROOT, today, clean);
        }
    }

    match assignment_id {
        Some(id) => format!("{}/{}_Assignment_{}", FEEDBACK_ROOT, today, id),
        None => format!(
            "{}/{}_Manual_Upload",
            FEEDBACK_ROOT,
            now.format("%Y-%m-%d_%H%M")
        ),
    }
}
