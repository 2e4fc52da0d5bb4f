//! Shared fixtures and fakes for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use phishtriage::classify::{FeatureVector, FittedClassifier, FittedVectorizer, PhishingClassifier};
use phishtriage::config::ModelConfig;
use phishtriage::mailbox::{LabelInfo, Mailbox, MailboxError, MailboxResult, MessageSummary};
use phishtriage::text::Normalizer;

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn model_config(classifier: &str) -> ModelConfig {
    ModelConfig {
        vectorizer_path: fixture("vectorizer.json"),
        classifier_path: fixture(classifier),
        ..ModelConfig::default()
    }
}

/// TF-IDF + linear model fitted on a handful of keywords.
pub fn keyword_classifier() -> Arc<PhishingClassifier> {
    let classifier = PhishingClassifier::load(&model_config("linear_model.json"), Normalizer::default())
        .expect("fixture artifacts load");
    Arc::new(classifier)
}

pub const PHISHING_BODY: &str =
    "Please click here to verify your account password now http://192.168.1.5/login";
pub const LEGIT_BODY: &str = "Lunch meeting tomorrow to discuss the project";

/// A minimal single-part RFC 5322 message.
pub fn email(subject: &str, body: &str) -> Vec<u8> {
    format!(
        "From: sender@example.com\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}\r\n"
    )
    .into_bytes()
}

// ─── Fake fitted parts ──────────────────────────────────────────────

/// Counts whole-token occurrences of fixed keywords.
pub struct KeywordVectorizer {
    pub keywords: Vec<String>,
}

impl KeywordVectorizer {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl FittedVectorizer for KeywordVectorizer {
    fn dimension(&self) -> usize {
        self.keywords.len()
    }

    fn transform(&self, text: &str) -> FeatureVector {
        let mut counts = vec![0.0; self.keywords.len()];
        for token in text.split_whitespace() {
            if let Some(i) = self.keywords.iter().position(|k| k == token) {
                counts[i] += 1.0;
            }
        }
        FeatureVector::from_dense(&counts)
    }
}

/// Phishing as soon as any feature is non-zero.
pub struct AnyFeatureClassifier {
    pub n_features: usize,
    pub classes: Vec<i64>,
}

impl AnyFeatureClassifier {
    pub fn new(n_features: usize) -> Self {
        Self {
            n_features,
            classes: vec![0, 1],
        }
    }
}

impl FittedClassifier for AnyFeatureClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict(&self, features: &FeatureVector) -> i64 {
        i64::from(features.iter().any(|(_, v)| v > 0.0))
    }
}

// ─── In-memory mailbox ──────────────────────────────────────────────

/// Mailbox held in memory, with switches to make each operation fail.
#[derive(Default)]
pub struct FakeMailbox {
    /// Oldest first.
    pub messages: Vec<(String, Vec<u8>)>,
    pub labels: Vec<LabelInfo>,
    pub attached: BTreeMap<String, BTreeSet<String>>,

    /// Number of upcoming `authenticate` calls that fail.
    pub auth_failures: usize,
    pub fail_listing: bool,
    pub fail_fetch: HashSet<String>,
    pub fail_attach: HashSet<String>,

    pub list_calls: usize,
    pub create_calls: usize,
    pub attach_calls: usize,
}

impl FakeMailbox {
    pub fn with_messages(messages: Vec<(&str, Vec<u8>)>) -> Self {
        Self {
            messages: messages
                .into_iter()
                .map(|(id, raw)| (id.to_string(), raw))
                .collect(),
            ..Self::default()
        }
    }

    /// Names of the labels attached to a message, sorted.
    pub fn label_names(&self, message_id: &str) -> Vec<String> {
        let Some(ids) = self.attached.get(message_id) else {
            return Vec::new();
        };
        let mut names: Vec<String> = self
            .labels
            .iter()
            .filter(|l| ids.contains(&l.id))
            .map(|l| l.name.clone())
            .collect();
        names.sort();
        names
    }
}

impl Mailbox for FakeMailbox {
    fn authenticate(&mut self) -> MailboxResult<()> {
        if self.auth_failures > 0 {
            self.auth_failures -= 1;
            return Err(MailboxError::Auth("token expired".into()));
        }
        Ok(())
    }

    fn list_recent(&mut self, max: usize) -> MailboxResult<Vec<MessageSummary>> {
        self.list_calls += 1;
        if self.fail_listing {
            return Err(MailboxError::Timeout("listing timed out".into()));
        }
        Ok(self
            .messages
            .iter()
            .rev()
            .take(max)
            .map(|(id, _)| MessageSummary::new(id.clone()))
            .collect())
    }

    fn fetch_raw(&mut self, message_id: &str) -> MailboxResult<Vec<u8>> {
        if self.fail_fetch.contains(message_id) {
            return Err(MailboxError::Transport("connection reset".into()));
        }
        self.messages
            .iter()
            .find(|(id, _)| id == message_id)
            .map(|(_, raw)| raw.clone())
            .ok_or_else(|| MailboxError::NotFound(message_id.to_string()))
    }

    fn list_labels(&mut self) -> MailboxResult<Vec<LabelInfo>> {
        Ok(self.labels.clone())
    }

    fn create_label(&mut self, name: &str) -> MailboxResult<LabelInfo> {
        self.create_calls += 1;
        let label = LabelInfo {
            id: format!("Label_{}", self.labels.len() + 1),
            name: name.to_string(),
        };
        self.labels.push(label.clone());
        Ok(label)
    }

    fn attach_labels(&mut self, message_id: &str, label_ids: &[String]) -> MailboxResult<()> {
        self.attach_calls += 1;
        if self.fail_attach.contains(message_id) {
            return Err(MailboxError::Transport("modify failed".into()));
        }
        self.attached
            .entry(message_id.to_string())
            .or_default()
            .extend(label_ids.iter().cloned());
        Ok(())
    }
}
