//! Report rendering.

pub mod generator;

pub use generator::{
    format_count, generate_json_report, generate_markdown_report, Report, ReportMetadata,
};
