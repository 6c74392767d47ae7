//! Admission allotment list extraction and option-list reconciliation.
//!
//! [`parser::LineRecordParser`] turns the text of an allotment list into
//! [`models::AdmissionRecord`]s; [`ranges`] renders sorted numbers as
//! contiguous runs; [`analyzer`] joins an option list against a master
//! sheet and groups the result.

pub mod analyzer;
pub mod error;
pub mod input;
pub mod logging;
pub mod models;
pub mod parser;
pub mod ranges;
pub mod report;

pub use error::{AnalyzerError, LineError, Result};
pub use models::{AdmissionRecord, Config, LayoutConfig};
pub use parser::{LineRecordParser, ParseReport};
