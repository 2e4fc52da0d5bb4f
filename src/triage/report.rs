//! What one scan produced.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::classify::Verdict;
use crate::reasons::{join_reasons, Reason};

/// One processed message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TriageRow {
    pub message_id: String,
    pub subject: String,
    #[serde(rename = "Prediction")]
    pub verdict: Verdict,
    #[serde(serialize_with = "serialize_reasons")]
    pub reasons: Vec<Reason>,
    /// Whether labels were attached during this scan.
    pub labeled: bool,
}

fn serialize_reasons<S: Serializer>(reasons: &[Reason], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&join_reasons(reasons))
}

impl TriageRow {
    pub fn reasons_joined(&self) -> String {
        join_reasons(&self.reasons)
    }
}

/// Where in the per-message pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// The raw message could not be retrieved; no row was produced.
    Fetch,
    /// The message was damaged; its row was built from what could be read.
    Decode,
    /// Labels could not be attached; the row is still present.
    Label,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Decode => "decode",
            Self::Label => "label",
        })
    }
}

/// A message-local problem recovered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageFailure {
    pub message_id: String,
    pub stage: FailureStage,
    pub reason: String,
}

/// Result of one `scan_and_label` call. Rows are oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows: Vec<TriageRow>,
    pub failures: Vec<MessageFailure>,
}

impl ScanReport {
    pub fn phishing_count(&self) -> usize {
        self.rows.iter().filter(|r| r.verdict.is_phishing()).count()
    }

    pub fn labeled_count(&self) -> usize {
        self.rows.iter().filter(|r| r.labeled).count()
    }

    /// Failures recorded for one stage.
    pub fn failures_at(&self, stage: FailureStage) -> impl Iterator<Item = &MessageFailure> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
