//! Convocation DOCX
//!
//! Fills Word (`.docx`) convocation templates with per-recipient data.
//!
//! This library provides:
//! - `engine`: `render` for one document, `render_batch` for many in parallel
//! - `walker`: ordered traversal of body, header, footer and nested-table paragraphs
//! - `substitute` / `rebuild`: token replacement across split runs, with bold spans
//! - `image`: signature embedding at a placeholder paragraph
//! - `mapper`: candidate and session data to placeholder values
//! - `filename`: output file names
//!
//! Binaries:
//! - `convocations`: fill one template or generate a zip of convocations from a CSV

pub mod config;
pub mod engine;
pub mod error;
pub mod filename;
pub mod image;
pub mod mapper;
pub mod model;
pub mod package;
pub mod rebuild;
pub mod substitute;
pub mod walker;
pub mod xml;

pub use config::EngineConfig;
pub use engine::{render, render_batch, RenderJob, RenderReport, Rendered};
pub use error::{EngineError, ImageError};
pub use image::InsertOutcome;
pub use mapper::{Candidate, SessionDetails};
pub use substitute::{ForcedBoldSet, VariableMap};
