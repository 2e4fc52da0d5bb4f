//! `phishtriage`: classify email as phishing or legitimate with a
//! pre-trained text model, and label suspicious messages in a mailbox.
//!
//! The crate is built around one pipeline, shared by the interactive
//! classifier and the mailbox scanner:
//!
//! raw message → [`parser::decode`] → [`text::Normalizer`] →
//! [`classify::FittedVectorizer`] → [`classify::FittedClassifier`] →
//! [`classify::Verdict`], with [`reasons::extract_reasons`] run on the raw
//! body alongside. [`triage::TriageController`] drives it over a
//! [`mailbox::Mailbox`] and turns phishing verdicts into labels.

pub mod classify;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod parser;
pub mod reasons;
pub mod text;
pub mod triage;
