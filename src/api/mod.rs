//! Provides clients and utilities for interacting with the Canvas LMS API.
//!
//! Includes:
//! - `gateway`: authenticated HTTP calls and error mapping.
//! - `canvas`: typed resource client (`CanvasClient`).
//! - `lms`: the `LmsApi` trait the rest of the application programs against.

mod canvas;
#[cfg(test)]
mod canvas_test;
#[cfg(test)]
pub mod fake;
mod gateway;
mod lms;

pub use canvas::CanvasClient;
pub use lms::LmsApi;
