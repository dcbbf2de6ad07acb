//! Output formatting
//!
//! - [`json`]: results.json and inventory.json
//! - [`markdown`]: report.md
//! - [`text`]: console summaries

pub mod json;
pub mod markdown;
pub mod text;
