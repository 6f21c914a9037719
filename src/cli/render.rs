//! Table rendering for the read-only listings.

use crate::models::{Assignment, Course, Folder, Quiz, Student};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use std::collections::HashMap;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
    table
}

/// Title line underlined with `=`.
pub fn heading(title: &str) -> String {
    format!("\n{}\n{}", title, "=".repeat(title.chars().count()))
}

/// First ten characters of an ISO timestamp, or a placeholder.
pub fn short_date(value: Option<&str>) -> String {
    match value {
        Some(date) if !date.is_empty() => date.chars().take(10).collect(),
        _ => "No due date".to_string(),
    }
}

/// `YYYY-MM-DD HH:MM UTC` from an ISO timestamp.
pub fn date_time(value: &str) -> String {
    let date: String = value.chars().take(10).collect();
    let time: String = value.chars().skip(11).take(5).collect();
    format!("{} {} UTC", date, time)
}

fn points(value: Option<f64>) -> String {
    value.map(|p| p.to_string()).unwrap_or_else(|| "N/A".to_string())
}

pub fn courses_table(courses: &[&Course], current: Option<u64>) -> Table {
    let mut table = table(&["#", "ID", "Name", "Code", "Term"]);
    for (index, course) in courses.iter().enumerate() {
        let mut name = Cell::new(&course.name);
        if current == Some(course.id) {
            name = Cell::new(format!("{} (current)", course.name)).fg(Color::Green);
        }
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(course.id),
            name,
            Cell::new(course.course_code.as_deref().unwrap_or("")),
            Cell::new(
                course
                    .term
                    .as_ref()
                    .and_then(|t| t.name.as_deref())
                    .unwrap_or(""),
            ),
        ]);
    }
    table
}

pub fn folders_table(folders: &[Folder]) -> Table {
    let mut table = table(&["#", "ID", "Path", "Name"]);
    for (index, folder) in folders.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(folder.id),
            Cell::new(folder.full_name.as_deref().unwrap_or("")),
            Cell::new(&folder.name),
        ]);
    }
    table
}

pub fn assignments_table(assignments: &[Assignment], groups: &HashMap<u64, String>) -> Table {
    let mut table = table(&["#", "ID", "Name", "Due", "Points", "Group"]);
    for (index, assignment) in assignments.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(assignment.id),
            Cell::new(&assignment.name),
            Cell::new(short_date(assignment.due_at.as_deref())),
            Cell::new(points(assignment.points_possible)),
            Cell::new(group_name(assignment, groups)),
        ]);
    }
    table
}

pub fn group_name<'a>(assignment: &Assignment, groups: &'a HashMap<u64, String>) -> &'a str {
    assignment
        .assignment_group_id
        .and_then(|id| groups.get(&id))
        .map(String::as_str)
        .unwrap_or("No group")
}

/// Label/value lines describing one assignment.
pub fn assignment_details(assignment: &Assignment, group: &str) -> Vec<(&'static str, String)> {
    let yes_no = |flag: bool| if flag { "Yes" } else { "No" }.to_string();
    let mut lines = vec![("ID", assignment.id.to_string())];

    if let Some(description) = assignment.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(("Description", description.to_string()));
    }
    lines.push(("Group", group.to_string()));
    lines.push(("Points", points(assignment.points_possible)));
    lines.push((
        "Due",
        assignment
            .due_at
            .as_deref()
            .map(date_time)
            .unwrap_or_else(|| "No due date".to_string()),
    ));
    if let Some(lock_at) = assignment.lock_at.as_deref() {
        lines.push(("Locked after", date_time(lock_at)));
    }
    if let Some(unlock_at) = assignment.unlock_at.as_deref() {
        lines.push(("Available from", date_time(unlock_at)));
    }
    if !assignment.submission_types.is_empty() {
        lines.push(("Submission types", assignment.submission_types.join(", ")));
    }
    match assignment.allowed_attempts {
        Some(-1) => lines.push(("Allowed attempts", "Unlimited".to_string())),
        Some(n) if n > 0 => lines.push(("Allowed attempts", n.to_string())),
        _ => {},
    }
    lines.push(("Published", yes_no(assignment.published)));
    lines.push((
        "Status",
        assignment
            .workflow_state
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
    ));
    lines.push(("Has submissions", yes_no(assignment.has_submitted_submissions)));
    if let Some(count) = assignment.needs_grading_count.filter(|c| *c > 0) {
        lines.push(("Needs grading", count.to_string()));
    }
    lines.push((
        "URL",
        assignment
            .html_url
            .clone()
            .unwrap_or_else(|| "N/A".to_string()),
    ));
    lines
}

pub fn students_table(students: &[Student]) -> Table {
    let mut table = table(&["ID", "Name", "Email", "SIS ID"]);
    for student in students {
        table.add_row(vec![
            Cell::new(student.id),
            Cell::new(&student.name),
            Cell::new(student.email.as_deref().unwrap_or("No email")),
            Cell::new(student.sis_user_id.as_deref().unwrap_or("")),
        ]);
    }
    table
}

pub fn quizzes_table(quizzes: &[Quiz]) -> Table {
    let mut table = table(&["#", "ID", "Title", "Type", "Questions", "Points", "Due"]);
    for (index, quiz) in quizzes.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(quiz.id),
            Cell::new(&quiz.title),
            Cell::new(quiz.quiz_type.as_deref().unwrap_or("")),
            Cell::new(
                quiz.question_count
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
            ),
            Cell::new(points(quiz.points_possible)),
            Cell::new(short_date(quiz.due_at.as_deref())),
        ]);
    }
    table
}
