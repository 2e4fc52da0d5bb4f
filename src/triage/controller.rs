//! The scan: authenticate, list, fetch, classify, label, report.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::report::{FailureStage, MessageFailure, ScanReport, TriageRow};
use crate::classify::{Analysis, PhishingClassifier};
use crate::error::{Result, TriageError};
use crate::mailbox::{Mailbox, MailboxResult};
use crate::parser::{decode, DecodedMessage};
use crate::reasons::Reason;

/// How a scan labels what it finds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Label attached to every phishing message.
    pub phishing_label: String,
    /// Also attach one label per extracted reason.
    pub label_reasons: bool,
    pub reason_label_prefix: String,
    /// Classify and report without touching the mailbox.
    pub dry_run: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            phishing_label: "Phishing".to_string(),
            label_reasons: true,
            reason_label_prefix: "Reason: ".to_string(),
            dry_run: false,
        }
    }
}

/// Label ids resolved during one scan, keyed by lower-cased name.
///
/// Lives for a single scan only: labels can be renamed or deleted between
/// scans, so every scan resolves them again.
#[derive(Debug, Default)]
struct LabelCache {
    ids: HashMap<String, String>,
}

impl LabelCache {
    fn resolve<M: Mailbox>(&mut self, mailbox: &mut M, name: &str) -> MailboxResult<String> {
        let key = name.to_lowercase();
        if let Some(id) = self.ids.get(&key) {
            return Ok(id.clone());
        }
        let id = mailbox.ensure_label(name)?;
        self.ids.insert(key, id.clone());
        Ok(id)
    }
}

/// Drives scans of one mailbox with one loaded classifier.
pub struct TriageController<M: Mailbox> {
    mailbox: M,
    classifier: Arc<PhishingClassifier>,
    options: ScanOptions,
}

impl<M: Mailbox> TriageController<M> {
    pub fn new(mailbox: M, classifier: Arc<PhishingClassifier>, options: ScanOptions) -> Self {
        Self {
            mailbox,
            classifier,
            options,
        }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    pub fn mailbox_mut(&mut self) -> &mut M {
        &mut self.mailbox
    }

    /// Scan up to `max_messages` recent messages and label the phishing ones.
    pub fn scan_and_label(&mut self, max_messages: usize) -> Result<ScanReport> {
        self.scan_and_label_with_progress(max_messages, None)
    }

    /// Like [`scan_and_label`](Self::scan_and_label), calling `progress(done, total)`
    /// as each message is finished.
    ///
    /// Authentication and listing failures abort the scan. Anything that goes
    /// wrong with a single message is recorded in the report instead.
    pub fn scan_and_label_with_progress(
        &mut self,
        max_messages: usize,
        progress: Option<&dyn Fn(usize, usize)>,
    ) -> Result<ScanReport> {
        if max_messages == 0 {
            return Err(TriageError::InvalidScanSize(max_messages));
        }
        let started_at = Utc::now();

        self.mailbox.authenticate().map_err(TriageError::Auth)?;
        let mut listed = self
            .mailbox
            .list_recent(max_messages)
            .map_err(TriageError::Listing)?;
        listed.truncate(max_messages);
        // Newest first from the provider; report oldest first.
        listed.reverse();

        let total = listed.len();
        let mut done = 0;
        let tick = |done: usize| {
            if let Some(cb) = progress {
                cb(done, total);
            }
        };
        info!(count = total, dry_run = self.options.dry_run, "Scanning messages");

        let mut failures = Vec::new();
        let mut fetched: Vec<(String, DecodedMessage)> = Vec::with_capacity(total);
        for summary in &listed {
            match self.mailbox.fetch_raw(&summary.id) {
                Ok(raw) => {
                    let decoded = decode(&raw);
                    if let Some(problem) = &decoded.problem {
                        warn!(id = %summary.id, problem = %problem, "Message decoded with problems");
                        failures.push(MessageFailure {
                            message_id: summary.id.clone(),
                            stage: FailureStage::Decode,
                            reason: problem.clone(),
                        });
                    }
                    fetched.push((summary.id.clone(), decoded));
                }
                Err(e) => {
                    warn!(id = %summary.id, error = %e, "Failed to fetch message");
                    failures.push(MessageFailure {
                        message_id: summary.id.clone(),
                        stage: FailureStage::Fetch,
                        reason: e.to_string(),
                    });
                    done += 1;
                    tick(done);
                }
            }
        }

        let classifier = &*self.classifier;
        let analyses: Vec<Analysis> = fetched
            .par_iter()
            .map(|(_, message)| classifier.analyze(&message.body))
            .collect();

        let mut labels = LabelCache::default();
        let mut rows = Vec::with_capacity(fetched.len());
        for ((message_id, message), analysis) in fetched.into_iter().zip(analyses) {
            debug!(id = %message_id, verdict = %analysis.verdict, "Classified message");

            let mut labeled = false;
            if analysis.verdict.is_phishing() && !self.options.dry_run {
                match label_message(
                    &mut self.mailbox,
                    &mut labels,
                    &self.options,
                    &message_id,
                    &analysis.reasons,
                ) {
                    Ok(()) => labeled = true,
                    Err(e) => {
                        warn!(id = %message_id, error = %e, "Failed to label message");
                        failures.push(MessageFailure {
                            message_id: message_id.clone(),
                            stage: FailureStage::Label,
                            reason: e.to_string(),
                        });
                    }
                }
            }

            rows.push(TriageRow {
                message_id,
                subject: message.subject,
                verdict: analysis.verdict,
                reasons: analysis.reasons,
                labeled,
            });
            done += 1;
            tick(done);
        }

        let report = ScanReport {
            started_at,
            finished_at: Utc::now(),
            rows,
            failures,
        };
        info!(
            rows = report.rows.len(),
            phishing = report.phishing_count(),
            failures = report.failures.len(),
            "Scan finished"
        );
        Ok(report)
    }
}

/// Resolve the phishing label and reason labels, then attach them in one call.
fn label_message<M: Mailbox>(
    mailbox: &mut M,
    labels: &mut LabelCache,
    options: &ScanOptions,
    message_id: &str,
    reasons: &[Reason],
) -> MailboxResult<()> {
    let mut ids = vec![labels.resolve(mailbox, &options.phishing_label)?];
    if options.label_reasons {
        for reason in reasons {
            let id = labels.resolve(mailbox, &reason.label_name(&options.reason_label_prefix))?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    mailbox.attach_labels(message_id, &ids)
}
