//! Rule-based reasons explaining why a message looks risky.
//!
//! Reasons are diagnostic only. They run on the raw body, never on the
//! canonical text, and never influence the verdict.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static SUSPICIOUS_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://(bit\.ly|tinyurl|[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+)")
        .expect("valid link pattern")
});
static URGENT_LANGUAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)verify your|click here|update account|login now")
        .expect("valid urgency pattern")
});
static SENSITIVE_REQUEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)password|ssn|bank account|credit card|confirm identity")
        .expect("valid sensitive-request pattern")
});

/// One entry of the fixed reason taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    SuspiciousLink,
    UrgentLanguage,
    HtmlOrScript,
    SensitiveRequest,
    /// Sentinel used when no rule matched.
    NotObvious,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuspiciousLink => "Suspicious Link",
            Self::UrgentLanguage => "Urgent Language",
            Self::HtmlOrScript => "HTML/Script Content",
            Self::SensitiveRequest => "Sensitive Request",
            Self::NotObvious => "Not obvious",
        }
    }

    /// Name of the mailbox label carrying this reason, e.g. `Reason: Urgent Language`.
    pub fn label_name(self, prefix: &str) -> String {
        format!("{prefix}{}", self.as_str())
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run every rule against `raw_body`, in a fixed order.
///
/// Never returns an empty list: with no match the result is `[NotObvious]`.
pub fn extract_reasons(raw_body: &str) -> Vec<Reason> {
    let mut reasons = Vec::new();

    if SUSPICIOUS_LINK_RE.is_match(raw_body) {
        reasons.push(Reason::SuspiciousLink);
    }
    if URGENT_LANGUAGE_RE.is_match(raw_body) {
        reasons.push(Reason::UrgentLanguage);
    }
    let lower = raw_body.to_lowercase();
    if lower.contains("<script") || lower.contains("<html") {
        reasons.push(Reason::HtmlOrScript);
    }
    if SENSITIVE_REQUEST_RE.is_match(raw_body) {
        reasons.push(Reason::SensitiveRequest);
    }

    if reasons.is_empty() {
        reasons.push(Reason::NotObvious);
    }
    reasons
}

/// Comma-joined display form used in reports.
pub fn join_reasons(reasons: &[Reason]) -> String {
    reasons
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_reasons_in_rule_order() {
        let body = "Please click here to verify your account and confirm identity now. \
                    http://192.168.1.5/login";
        assert_eq!(
            extract_reasons(body),
            vec![
                Reason::SuspiciousLink,
                Reason::UrgentLanguage,
                Reason::SensitiveRequest
            ]
        );
    }

    #[test]
    fn test_fallback_when_nothing_matches() {
        assert_eq!(extract_reasons("Lunch on Friday?"), vec![Reason::NotObvious]);
        assert_eq!(extract_reasons(""), vec![Reason::NotObvious]);
    }

    #[test]
    fn test_shortener_and_case_insensitivity() {
        assert_eq!(
            extract_reasons("see HTTPS://BIT.LY/abc"),
            vec![Reason::SuspiciousLink]
        );
        assert_eq!(
            extract_reasons("LOGIN NOW or lose access"),
            vec![Reason::UrgentLanguage]
        );
    }

    #[test]
    fn test_html_markers() {
        assert_eq!(
            extract_reasons("<HTML><body>hi</body></HTML>"),
            vec![Reason::HtmlOrScript]
        );
        assert_eq!(
            extract_reasons("<script>alert(1)</script>"),
            vec![Reason::HtmlOrScript]
        );
    }

    #[test]
    fn test_plain_domain_link_is_not_suspicious() {
        assert_eq!(
            extract_reasons("https://example.com/news"),
            vec![Reason::NotObvious]
        );
    }

    #[test]
    fn test_join_and_labels() {
        let reasons = [Reason::SuspiciousLink, Reason::HtmlOrScript];
        assert_eq!(join_reasons(&reasons), "Suspicious Link, HTML/Script Content");
        assert_eq!(
            Reason::SensitiveRequest.label_name("Reason: "),
            "Reason: Sensitive Request"
        );
    }
}
