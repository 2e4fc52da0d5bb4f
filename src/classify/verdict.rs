//! Binary verdict and its fixed mapping to classifier labels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of classifying one text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Legit")]
    Legitimate,
    #[serde(rename = "Phishing")]
    Phishing,
}

impl Verdict {
    /// Classifier label for legitimate mail. Fixed by the training data.
    pub const LEGITIMATE_LABEL: i64 = 0;
    /// Classifier label for phishing mail. Fixed by the training data.
    pub const PHISHING_LABEL: i64 = 1;

    /// Map a classifier label; any label other than 0 or 1 is rejected.
    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            Self::LEGITIMATE_LABEL => Some(Self::Legitimate),
            Self::PHISHING_LABEL => Some(Self::Phishing),
            _ => None,
        }
    }

    pub fn label(self) -> i64 {
        match self {
            Self::Legitimate => Self::LEGITIMATE_LABEL,
            Self::Phishing => Self::PHISHING_LABEL,
        }
    }

    pub fn is_phishing(self) -> bool {
        self == Self::Phishing
    }

    /// Short form used in report rows.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legitimate => "Legit",
            Self::Phishing => "Phishing",
        }
    }

    /// Sentence shown to someone who pasted a message.
    pub fn headline(self) -> &'static str {
        match self {
            Self::Legitimate => "Legitimate Email",
            Self::Phishing => "Phishing Email!",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
