//! Aggregation and export over tracked chatbot sessions.
//!
//! Computes the admin dashboard summary (session counters, demographic
//! breakdowns, age histogram) and renders the spreadsheet-ready CSV export.

pub mod export;
pub mod summary;

pub use export::{export_csv, export_filename};
pub use summary::{AgeGroups, UsageSummary};
