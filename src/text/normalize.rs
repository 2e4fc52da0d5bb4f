//! Canonical text for feature extraction.
//!
//! The transform must match the one applied when the vectorizer was fitted,
//! byte for byte. Each step works on the output of the previous one:
//!
//! 1. lower-case
//! 2. drop URL-like tokens (`http…`, `https…`, `www…`)
//! 3. every non-word character becomes a space
//! 4. whitespace runs collapse to one space
//! 5. split, drop stop words, stem, re-join with single spaces

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::stem::PorterStemmer;
use super::stopwords;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"http\S+|www\S+|https\S+").expect("valid URL pattern"));
static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W").expect("valid non-word pattern"));
static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Which built-in stop-word list to start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopWords {
    /// NLTK English list (training default).
    English,
    /// No stop words.
    None,
}

/// Stemming algorithm applied to each surviving token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemmerKind {
    /// Porter, NLTK-extensions variant (training default).
    Porter,
    /// Keep tokens as they are.
    None,
}

impl StemmerKind {
    fn identity(self) -> &'static str {
        match self {
            Self::Porter => "porter-nltk-extensions",
            Self::None => "none",
        }
    }
}

/// Immutable normalization settings, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerConfig {
    stop_words: BTreeSet<String>,
    stemmer: StemmerKind,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self::english_porter()
    }
}

impl NormalizerConfig {
    /// The settings the shipped models were trained with.
    pub fn english_porter() -> Self {
        Self::new(StopWords::English, &[], StemmerKind::Porter)
    }

    /// Build a config from a base list plus extra (lower-cased) stop words.
    pub fn new(base: StopWords, extra_stop_words: &[String], stemmer: StemmerKind) -> Self {
        let mut stop_words: BTreeSet<String> = match base {
            StopWords::English => stopwords::ENGLISH.iter().map(|w| w.to_string()).collect(),
            StopWords::None => BTreeSet::new(),
        };
        stop_words.extend(extra_stop_words.iter().map(|w| w.to_lowercase()));
        Self {
            stop_words,
            stemmer,
        }
    }

    pub fn stop_words(&self) -> &BTreeSet<String> {
        &self.stop_words
    }

    pub fn stemmer(&self) -> StemmerKind {
        self.stemmer
    }

    /// SHA-256 over the stop-word set and stemmer identity.
    ///
    /// Two configs with the same fingerprint produce identical canonical text.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for word in &self.stop_words {
            hasher.update(word.as_bytes());
            hasher.update(b"\n");
        }
        hasher.update(b"\0stemmer=");
        hasher.update(self.stemmer.identity().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Turns free text into the canonical token string fed to the vectorizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
    stemmer: Option<PorterStemmer>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        let stemmer = match config.stemmer {
            StemmerKind::Porter => Some(PorterStemmer::new()),
            StemmerKind::None => None,
        };
        Self { config, stemmer }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize text. Total: any input, including empty, yields a string.
    pub fn normalize(&self, text: &str) -> String {
        let text = text.to_lowercase();
        let text = URL_RE.replace_all(&text, "");
        let text = NON_WORD_RE.replace_all(&text, " ");
        let text = SPACE_RE.replace_all(&text, " ");

        let tokens: Vec<String> = text
            .split_whitespace()
            .filter(|token| !self.config.stop_words.contains(*token))
            .map(|token| match &self.stemmer {
                Some(stemmer) => stemmer.stem(token),
                None => token.to_string(),
            })
            .collect();
        tokens.join(" ")
    }

    /// Normalize any value by its `Display` form.
    pub fn normalize_value(&self, value: &dyn fmt::Display) -> String {
        self.normalize(&value.to_string())
    }
}
