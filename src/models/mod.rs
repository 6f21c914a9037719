//! Defines the data structures and models used throughout the application.
//!
//! This includes structures representing resources fetched from the Canvas API,
//! request bodies sent to it, and values passed between the upload pipeline stages.

mod canvas;

pub use canvas::*;
