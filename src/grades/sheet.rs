//! Grade sheet loading and validation.
//!
//! A grade sheet is a UTF-8 CSV file with a header row. The accepted columns
//! (aliases in parentheses) are:
//!
//! | canonical               | aliases                           |
//! |-------------------------|-----------------------------------|
//! | `student_id`            | `canvas_id`                       |
//! | `grade`                 |                                   |
//! | `comment`               | `comments`                        |
//! | `exam_attachment_1`     | `md_exam_file1`, `pdf_exam_file1` |
//! | `exam_attachment_2`     | `md_exam_file2`, `pdf_exam_file2` |
//! | `evaluation_attachment` | `md_eval_file`, `pdf_eval_file`   |
//!
//! Any other column rejects the whole sheet. Rows without a student id or with a
//! grade that is not a number are dropped silently. Attachment paths are resolved
//! against the root directory, checked on disk, and Markdown attachments are
//! converted to a sibling PDF once every row has been validated.

use crate::error::{AppError, Result};
use crate::grades::DocumentConverter;
use crate::models::UploadedFile;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The three attachment columns, in the order their links appear in comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttachmentSlot {
    ExamFirst,
    ExamSecond,
    Evaluation,
}

impl AttachmentSlot {
    pub const ALL: [AttachmentSlot; 3] = [
        AttachmentSlot::ExamFirst,
        AttachmentSlot::ExamSecond,
        AttachmentSlot::Evaluation,
    ];

    pub fn column(self) -> &'static str {
        match self {
            AttachmentSlot::ExamFirst => "exam_attachment_1",
            AttachmentSlot::ExamSecond => "exam_attachment_2",
            AttachmentSlot::Evaluation => "evaluation_attachment",
        }
    }

    /// Heading used for the slot's link block in the grade comment.
    pub fn label(self) -> &'static str {
        match self {
            AttachmentSlot::ExamFirst => "Exam submission (Format 1)",
            AttachmentSlot::ExamSecond => "Exam submission (Format 2)",
            AttachmentSlot::Evaluation => "Detailed feedback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttachmentFormat {
    Markdown,
    Pdf,
}

impl AttachmentFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "md" => Some(AttachmentFormat::Markdown),
            "pdf" => Some(AttachmentFormat::Pdf),
            _ => None,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            AttachmentFormat::Markdown => "markdown",
            AttachmentFormat::Pdf => "PDF",
        }
    }
}

/// A file referenced from a grade sheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Absolute (or root-relative) path of the file named in the sheet.
    pub source: PathBuf,
    pub format: AttachmentFormat,
    /// PDF to upload: the source itself, or the converted sibling of a Markdown file.
    pub pdf: Option<PathBuf>,
    /// Set once the PDF has been uploaded.
    pub uploaded: Option<UploadedFile>,
}

/// One validated row of the grade sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    pub student_id: String,
    pub grade: f64,
    pub comment: Option<String>,
    pub exam_attachment_1: Option<Attachment>,
    pub exam_attachment_2: Option<Attachment>,
    pub evaluation_attachment: Option<Attachment>,
}

impl GradeRecord {
    pub fn new(student_id: impl Into<String>, grade: f64) -> Self {
        Self {
            student_id: student_id.into(),
            grade,
            comment: None,
            exam_attachment_1: None,
            exam_attachment_2: None,
            evaluation_attachment: None,
        }
    }

    pub fn attachment(&self, slot: AttachmentSlot) -> Option<&Attachment> {
        match slot {
            AttachmentSlot::ExamFirst => self.exam_attachment_1.as_ref(),
            AttachmentSlot::ExamSecond => self.exam_attachment_2.as_ref(),
            AttachmentSlot::Evaluation => self.evaluation_attachment.as_ref(),
        }
    }

    pub fn attachment_mut(&mut self, slot: AttachmentSlot) -> Option<&mut Attachment> {
        self.slot_mut(slot).as_mut()
    }

    fn slot_mut(&mut self, slot: AttachmentSlot) -> &mut Option<Attachment> {
        match slot {
            AttachmentSlot::ExamFirst => &mut self.exam_attachment_1,
            AttachmentSlot::ExamSecond => &mut self.exam_attachment_2,
            AttachmentSlot::Evaluation => &mut self.evaluation_attachment,
        }
    }

    /// Grade as sent to the server (`85`, `72.5`).
    pub fn posted_grade(&self) -> String {
        self.grade.to_string()
    }
}

/// The parsed, validated grade sheet.
#[derive(Debug, Clone)]
pub struct GradeSheet {
    pub records: Vec<GradeRecord>,
    /// Directory relative attachment paths were resolved against.
    pub root_dir: PathBuf,
    /// Rows skipped for a missing student id or grade.
    pub dropped_rows: usize,
}

impl GradeSheet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any row has a PDF ready for upload.
    pub fn has_pdf_attachments(&self) -> bool {
        self.records.iter().any(|record| {
            AttachmentSlot::ALL
                .iter()
                .any(|slot| record.attachment(*slot).and_then(|a| a.pdf.as_ref()).is_some())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Column {
    StudentId,
    Grade,
    Comment,
    /// Attachment slot plus the kind the header declares (`None` for canonical names).
    Attachment(AttachmentSlot, Option<AttachmentFormat>),
}

impl Column {
    fn parse(header: &str) -> Option<Column> {
        use AttachmentFormat::{Markdown, Pdf};
        use AttachmentSlot::{Evaluation, ExamFirst, ExamSecond};

        let column = match header {
            "student_id" | "canvas_id" => Column::StudentId,
            "grade" => Column::Grade,
            "comment" | "comments" => Column::Comment,
            "exam_attachment_1" => Column::Attachment(ExamFirst, None),
            "md_exam_file1" => Column::Attachment(ExamFirst, Some(Markdown)),
            "pdf_exam_file1" => Column::Attachment(ExamFirst, Some(Pdf)),
            "exam_attachment_2" => Column::Attachment(ExamSecond, None),
            "md_exam_file2" => Column::Attachment(ExamSecond, Some(Markdown)),
            "pdf_exam_file2" => Column::Attachment(ExamSecond, Some(Pdf)),
            "evaluation_attachment" => Column::Attachment(Evaluation, None),
            "md_eval_file" => Column::Attachment(Evaluation, Some(Markdown)),
            "pdf_eval_file" => Column::Attachment(Evaluation, Some(Pdf)),
            _ => return None,
        };
        Some(column)
    }
}

/// Maps the header row onto columns, rejecting unknown and duplicated names.
fn map_columns(headers: &StringRecord) -> Result<Vec<Column>> {
    let mut columns = Vec::with_capacity(headers.len());
    let mut unknown = Vec::new();
    let mut seen: BTreeMap<Column, &str> = BTreeMap::new();

    for header in headers.iter() {
        match Column::parse(header) {
            Some(column) => {
                if let Some(previous) = seen.insert(column, header) {
                    return Err(AppError::Schema(format!(
                        "columns '{}' and '{}' hold the same field",
                        previous, header
                    )));
                }
                columns.push(column);
            },
            None => unknown.push(header.to_string()),
        }
    }

    if !unknown.is_empty() {
        return Err(AppError::Schema(format!(
            "invalid column(s): {}",
            unknown.join(", ")
        )));
    }
    Ok(columns)
}

fn parse_grade(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|g| g.is_finite())
}

/// Resolves one attachment cell and checks existence and extension.
fn resolve_attachment(
    raw: &str,
    declared: Option<AttachmentFormat>,
    root_dir: &Path,
) -> Result<Attachment> {
    let mut path = PathBuf::from(raw);
    if path.is_relative() {
        path = root_dir.join(path);
    }

    if !path.exists() {
        return Err(AppError::AttachmentNotFound(path));
    }

    let actual = AttachmentFormat::from_path(&path);
    let format = match declared {
        Some(expected) if actual == Some(expected) => expected,
        Some(expected) => {
            return Err(AppError::InvalidAttachmentType {
                path,
                expected: expected.describe().to_string(),
            })
        },
        None => actual.ok_or_else(|| AppError::InvalidAttachmentType {
            path: path.clone(),
            expected: "markdown or PDF".to_string(),
        })?,
    };

    Ok(Attachment {
        pdf: (format == AttachmentFormat::Pdf).then(|| path.clone()),
        source: path,
        format,
        uploaded: None,
    })
}

/// Builds a record from a CSV row, or `None` when the row lacks required fields.
fn build_record(
    columns: &[Column],
    row: &StringRecord,
    root_dir: &Path,
) -> Result<Option<GradeRecord>> {
    let mut student_id = None;
    let mut grade = None;
    let mut comment = None;
    let mut cells: BTreeMap<AttachmentSlot, Vec<(&str, Option<AttachmentFormat>)>> =
        BTreeMap::new();

    for (index, column) in columns.iter().enumerate() {
        let cell = row.get(index).unwrap_or("");
        match column {
            Column::StudentId => {
                let id = cell.trim();
                if !id.is_empty() {
                    student_id = Some(id.to_string());
                }
            },
            Column::Grade => grade = parse_grade(cell),
            Column::Comment => {
                if !cell.trim().is_empty() {
                    comment = Some(cell.to_string());
                }
            },
            Column::Attachment(slot, declared) => {
                let value = cell.trim();
                if !value.is_empty() {
                    cells.entry(*slot).or_default().push((value, *declared));
                }
            },
        }
    }

    let (Some(student_id), Some(grade)) = (student_id, grade) else {
        return Ok(None);
    };

    let mut record = GradeRecord::new(student_id, grade);
    record.comment = comment;

    for (slot, candidates) in cells {
        let mut resolved = Vec::with_capacity(candidates.len());
        for (raw, declared) in candidates {
            let attachment = resolve_attachment(raw, declared, root_dir)?;
            if resolved.iter().any(|a: &Attachment| a.format == attachment.format) {
                return Err(AppError::Schema(format!(
                    "student {} has two {} files for '{}'",
                    record.student_id,
                    attachment.format.describe(),
                    slot.label()
                )));
            }
            resolved.push(attachment);
        }
        // A Markdown source wins over a PDF given for the same slot: its
        // converted PDF replaces that one.
        let chosen = match resolved
            .iter()
            .position(|a| a.format == AttachmentFormat::Markdown)
        {
            Some(index) => resolved.swap_remove(index),
            None => resolved.swap_remove(0),
        };
        *record.slot_mut(slot) = Some(chosen);
    }

    Ok(Some(record))
}

fn default_root_dir(path: &Path) -> PathBuf {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    match absolute.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Reads and validates a grade sheet without touching any attachment.
fn read_sheet(path: &Path, root_dir: Option<&Path>) -> Result<GradeSheet> {
    if !path.exists() {
        return Err(AppError::FileNotFound(path.to_path_buf()));
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::Headers)
        .flexible(true)
        .from_path(path)?;
    let columns = map_columns(reader.headers()?)?;

    let root_dir = match root_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_root_dir(path),
    };
    debug!("Resolving attachments against {}", root_dir.display());

    let mut records = Vec::new();
    let mut dropped_rows = 0;
    for row in reader.records() {
        match build_record(&columns, &row?, &root_dir)? {
            Some(record) => records.push(record),
            None => dropped_rows += 1,
        }
    }

    if dropped_rows > 0 {
        debug!("Dropped {} rows without student id or grade", dropped_rows);
    }

    Ok(GradeSheet {
        records,
        root_dir,
        dropped_rows,
    })
}

/// Loads grade sheets, converting Markdown feedback through `converter`.
pub struct GradeSheetLoader<'a> {
    converter: &'a dyn DocumentConverter,
}

impl<'a> GradeSheetLoader<'a> {
    pub fn new(converter: &'a dyn DocumentConverter) -> Self {
        Self { converter }
    }

    /// Parses, validates and prepares the sheet at `path`.
    ///
    /// `root_dir` defaults to the directory containing `path`. Any conversion
    /// failure aborts the whole load.
    pub async fn load(&self, path: &Path, root_dir: Option<&Path>) -> Result<GradeSheet> {
        info!("Loading grade sheet {}", path.display());
        let mut sheet = read_sheet(path, root_dir)?;

        for record in &mut sheet.records {
            for slot in AttachmentSlot::ALL {
                let Some(attachment) = record.attachment_mut(slot) else {
                    continue;
                };
                if attachment.format != AttachmentFormat::Markdown {
                    continue;
                }
                let pdf = attachment.source.with_extension("pdf");
                self.converter.convert(&attachment.source, &pdf).await?;
                attachment.pdf = Some(pdf);
            }
        }

        info!(
            "Loaded {} grade rows ({} dropped)",
            sheet.len(),
            sheet.dropped_rows
        );
        Ok(sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grades::testing::{write_file, StubConverter};
    use tempfile::TempDir;

    async fn load(dir: &TempDir, csv: &str, converter: &StubConverter) -> Result<GradeSheet> {
        let path = write_file(dir.path(), "grades.csv", csv);
        GradeSheetLoader::new(converter).load(&path, None).await
    }

    #[tokio::test]
    async fn aliases_normalize_to_canonical_fields() {
        let dir = TempDir::new().unwrap();
        let converter = StubConverter::default();
        let sheet = load(
            &dir,
            "canvas_id,grade,comments\n 101 ,85,Great job\n102, 72.5 ,\"Needs work, see notes\"\n",
            &converter,
        )
        .await
        .unwrap();

        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.records[0].student_id, "101");
        assert_eq!(sheet.records[0].grade, 85.0);
        assert_eq!(sheet.records[0].posted_grade(), "85");
        assert_eq!(sheet.records[0].comment.as_deref(), Some("Great job"));
        assert_eq!(sheet.records[1].posted_grade(), "72.5");
        assert_eq!(
            sheet.records[1].comment.as_deref(),
            Some("Needs work, see notes")
        );
        assert_eq!(sheet.root_dir, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn rows_missing_required_fields_are_dropped() {
        let dir = TempDir::new().unwrap();
        let converter = StubConverter::default();
        let sheet = load(
            &dir,
            "student_id,grade\n101,90\n,80\n103,\n104,abc\n105,NaN\n106,0\n",
            &converter,
        )
        .await
        .unwrap();

        let ids: Vec<&str> = sheet.records.iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, vec!["101", "106"]);
        assert_eq!(sheet.dropped_rows, 4);
    }

    #[tokio::test]
    async fn dropped_rows_skip_attachment_checks() {
        let dir = TempDir::new().unwrap();
        let converter = StubConverter::default();
        let sheet = load(
            &dir,
            "student_id,grade,pdf_eval_file\n101,,missing.pdf\n",
            &converter,
        )
        .await
        .unwrap();
        assert!(sheet.is_empty());
    }

    #[tokio::test]
    async fn unknown_columns_fail_without_side_effects() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "fb.md", "# Feedback");
        let converter = StubConverter::default();

        let err = load(
            &dir,
            "student_id,grade,md_eval_file,section\n101,85,fb.md,A\n",
            &converter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Schema(ref msg) if msg.contains("section")));
        assert!(converter.converted().is_empty());
        assert!(!dir.path().join("fb.pdf").exists());
    }

    #[tokio::test]
    async fn duplicated_fields_are_a_schema_error() {
        let dir = TempDir::new().unwrap();
        let converter = StubConverter::default();
        let err = load(&dir, "student_id,canvas_id,grade\n1,1,5\n", &converter)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Schema(_)));
    }

    #[tokio::test]
    async fn missing_sheet_is_file_not_found() {
        let dir = TempDir::new().unwrap();
        let converter = StubConverter::default();
        let missing = dir.path().join("nope.csv");
        let err = GradeSheetLoader::new(&converter)
            .load(&missing, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FileNotFound(p) if p == missing));
    }

    #[tokio::test]
    async fn missing_attachment_is_reported_with_resolved_path() {
        let dir = TempDir::new().unwrap();
        let converter = StubConverter::default();
        let err = load(&dir, "student_id,grade,pdf_eval_file\n101,85,fb.pdf\n", &converter)
            .await
            .unwrap_err();
        match err {
            AppError::AttachmentNotFound(path) => {
                assert!(path.is_absolute());
                assert!(path.ends_with("fb.pdf"));
            },
            other => panic!("Expected AttachmentNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn declared_kind_must_match_extension() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "fb.pdf", "%PDF");
        let converter = StubConverter::default();
        let err = load(&dir, "student_id,grade,md_eval_file\n101,85,fb.pdf\n", &converter)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAttachmentType { ref expected, .. } if expected == "markdown"));
    }

    #[tokio::test]
    async fn canonical_columns_accept_only_markdown_or_pdf() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "scan.txt", "text");
        let converter = StubConverter::default();
        let err = load(
            &dir,
            "student_id,grade,exam_attachment_1\n101,85,scan.txt\n",
            &converter,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidAttachmentType { .. }));
    }

    #[tokio::test]
    async fn markdown_feedback_is_converted_next_to_its_source() {
        let dir = TempDir::new().unwrap();
        let md = write_file(dir.path(), "fb.md", "# Feedback\nWell done.");
        let converter = StubConverter::default();

        let sheet = load(
            &dir,
            "student_id,grade,evaluation_attachment\n101,85,fb.md\n",
            &converter,
        )
        .await
        .unwrap();

        let attachment = sheet.records[0].evaluation_attachment.as_ref().unwrap();
        let expected_pdf = sheet.root_dir.join("fb.pdf");
        assert_eq!(attachment.format, AttachmentFormat::Markdown);
        assert_eq!(attachment.pdf.as_ref(), Some(&expected_pdf));
        assert!(expected_pdf.exists());
        assert_eq!(converter.converted(), vec![sheet.root_dir.join("fb.md")]);
        assert_eq!(
            std::fs::canonicalize(&attachment.source).unwrap(),
            std::fs::canonicalize(md).unwrap()
        );
        assert!(sheet.has_pdf_attachments());
    }

    #[tokio::test]
    async fn explicit_root_dir_resolves_relative_paths() {
        let sheet_dir = TempDir::new().unwrap();
        let files_dir = TempDir::new().unwrap();
        write_file(files_dir.path(), "exam1.pdf", "%PDF");
        let csv = write_file(
            sheet_dir.path(),
            "grades.csv",
            "student_id,grade,pdf_exam_file1\n101,85,exam1.pdf\n",
        );
        let converter = StubConverter::default();

        let sheet = GradeSheetLoader::new(&converter)
            .load(&csv, Some(files_dir.path()))
            .await
            .unwrap();

        let attachment = sheet.records[0].exam_attachment_1.as_ref().unwrap();
        assert_eq!(attachment.source, files_dir.path().join("exam1.pdf"));
        assert_eq!(attachment.pdf.as_ref(), Some(&attachment.source));
        assert!(converter.converted().is_empty());
    }

    #[tokio::test]
    async fn markdown_source_wins_over_pdf_for_the_same_slot() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "fb.md", "# Feedback");
        write_file(dir.path(), "old.pdf", "%PDF");
        let converter = StubConverter::default();

        let sheet = load(
            &dir,
            "student_id,grade,md_eval_file,pdf_eval_file\n101,85,fb.md,old.pdf\n102,70,,old.pdf\n",
            &converter,
        )
        .await
        .unwrap();

        let first = sheet.records[0].evaluation_attachment.as_ref().unwrap();
        assert!(first.pdf.as_ref().unwrap().ends_with("fb.pdf"));
        let second = sheet.records[1].evaluation_attachment.as_ref().unwrap();
        assert!(second.pdf.as_ref().unwrap().ends_with("old.pdf"));
    }

    #[tokio::test]
    async fn two_markdown_sources_for_one_slot_are_rejected() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.md", "# A");
        write_file(dir.path(), "b.md", "# B");
        let converter = StubConverter::default();

        let err = load(
            &dir,
            "student_id,grade,evaluation_attachment,md_eval_file\n101,85,a.md,b.md\n",
            &converter,
        )
        .await
        .unwrap_err();

        assert!(
            matches!(&err, AppError::Schema(msg) if msg.contains("101") && msg.contains("Detailed feedback")),
            "unexpected error: {:?}",
            err
        );
        assert!(converter.converted().is_empty());
    }

    #[tokio::test]
    async fn conversion_failure_aborts_the_load() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "fb.md", "# Feedback");
        let converter = StubConverter::failing();
        let err = load(&dir, "student_id,grade,md_eval_file\n101,85,fb.md\n", &converter)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conversion { .. }));
    }

    #[test]
    fn column_aliases_map_to_slots() {
        assert_eq!(Column::parse("canvas_id"), Some(Column::StudentId));
        assert_eq!(Column::parse("comments"), Some(Column::Comment));
        assert_eq!(
            Column::parse("pdf_exam_file2"),
            Some(Column::Attachment(
                AttachmentSlot::ExamSecond,
                Some(AttachmentFormat::Pdf)
            ))
        );
        assert_eq!(Column::parse("Grade"), None);
    }
}
