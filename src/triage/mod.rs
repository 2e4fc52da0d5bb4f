//! Mailbox triage: scans, their reports, and the repeating scheduler.

pub mod controller;
pub mod export;
pub mod report;
pub mod schedule;

pub use controller::{ScanOptions, TriageController};
pub use report::{FailureStage, MessageFailure, ScanReport, TriageRow};
pub use schedule::{RunSummary, Scheduler};
