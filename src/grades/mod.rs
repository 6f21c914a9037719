//! The grades-upload pipeline.
//!
//! Includes:
//! - `sheet`: CSV loading and validation (`GradeSheetLoader`).
//! - `convert`: Markdown to PDF conversion behind `DocumentConverter`.
//! - `upload`: folder provisioning, file upload, submission and polling (`FeedbackUploader`).
//! - `naming`: name sanitization shared with the exporters.

mod convert;
pub mod naming;
mod sheet;
#[cfg(test)]
pub mod testing;
mod upload;

pub use convert::{DocumentConverter, PandocConverter};
pub use sheet::*;
pub use upload::*;
