//! The narrow mailbox capability the triage controller depends on, plus
//! the backends that implement it.
//!
//! Backends turn provider responses into [`MessageSummary`] and
//! [`LabelInfo`] right at the boundary; nothing untyped crosses it.

pub mod gmail;
pub mod imap;
pub mod mbox;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use gmail::GmailMailbox;
pub use self::imap::ImapMailbox;
pub use mbox::MboxMailbox;

/// Errors reported by a mailbox backend.
#[derive(Error, Debug)]
pub enum MailboxError {
    /// Credentials are missing, expired or rejected.
    #[error("not authorized: {0}")]
    Auth(String),

    /// The request did not complete in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Network or HTTP failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The message or label does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider answered with something unexpected.
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// Local file access failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

impl MailboxError {
    pub fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for mailbox operations.
pub type MailboxResult<T> = std::result::Result<T, MailboxError>;

/// One listed message, as returned by `list_recent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Provider-assigned id, unique within the mailbox.
    pub id: String,
    /// Conversation id when the provider has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl MessageSummary {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
        }
    }
}

/// A label in the provider's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// Mailbox operations needed to triage messages.
pub trait Mailbox {
    /// Make sure the session is usable. Called once at the start of every scan.
    fn authenticate(&mut self) -> MailboxResult<()>;

    /// Up to `max` message ids, most recent first.
    fn list_recent(&mut self, max: usize) -> MailboxResult<Vec<MessageSummary>>;

    /// Raw RFC 5322 bytes of one message.
    fn fetch_raw(&mut self, message_id: &str) -> MailboxResult<Vec<u8>>;

    /// Every label currently defined.
    fn list_labels(&mut self) -> MailboxResult<Vec<LabelInfo>>;

    /// Create a label and return it.
    fn create_label(&mut self, name: &str) -> MailboxResult<LabelInfo>;

    /// Attach labels to a message. Attaching a label that is already there
    /// is a no-op.
    fn attach_labels(&mut self, message_id: &str, label_ids: &[String]) -> MailboxResult<()>;

    /// Get-or-create a label by name (case-insensitive) and return its id.
    fn ensure_label(&mut self, name: &str) -> MailboxResult<String> {
        let existing = self
            .list_labels()?
            .into_iter()
            .find(|label| label.name.to_lowercase() == name.to_lowercase());
        if let Some(label) = existing {
            return Ok(label.id);
        }
        debug!(label = name, "Creating missing label");
        Ok(self.create_label(name)?.id)
    }
}

impl<M: Mailbox + ?Sized> Mailbox for Box<M> {
    fn authenticate(&mut self) -> MailboxResult<()> {
        (**self).authenticate()
    }

    fn list_recent(&mut self, max: usize) -> MailboxResult<Vec<MessageSummary>> {
        (**self).list_recent(max)
    }

    fn fetch_raw(&mut self, message_id: &str) -> MailboxResult<Vec<u8>> {
        (**self).fetch_raw(message_id)
    }

    fn list_labels(&mut self) -> MailboxResult<Vec<LabelInfo>> {
        (**self).list_labels()
    }

    fn create_label(&mut self, name: &str) -> MailboxResult<LabelInfo> {
        (**self).create_label(name)
    }

    fn attach_labels(&mut self, message_id: &str, label_ids: &[String]) -> MailboxResult<()> {
        (**self).attach_labels(message_id, label_ids)
    }

    fn ensure_label(&mut self, name: &str) -> MailboxResult<String> {
        (**self).ensure_label(name)
    }
}
