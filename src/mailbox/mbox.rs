//! Local mailbox backed by an MBOX file.
//!
//! Message ids are byte offsets of each message inside the file; the last
//! message in the file is the most recent. MBOX has no label storage, so
//! labels live in a JSON sidecar next to the file (`<file>.labels.json`),
//! rewritten atomically after every change.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{LabelInfo, Mailbox, MailboxError, MailboxResult, MessageSummary};
use crate::parser::mbox::{read_span, scan_spans, MessageSpan};

/// Persistent label state for one MBOX file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LabelStore {
    next_id: u64,
    labels: Vec<LabelInfo>,
    /// Message id → attached label ids.
    assignments: BTreeMap<String, BTreeSet<String>>,
}

/// MBOX file exposed through the [`Mailbox`] capability.
pub struct MboxMailbox {
    path: PathBuf,
    sidecar: PathBuf,
    spans: Vec<MessageSpan>,
    store: LabelStore,
}

impl MboxMailbox {
    /// Prepare a mailbox for `path`. Nothing is read until `authenticate`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut sidecar = path.clone().into_os_string();
        sidecar.push(".labels.json");
        Self {
            path,
            sidecar: PathBuf::from(sidecar),
            spans: Vec::new(),
            store: LabelStore::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar
    }

    /// Names of the labels attached to a message.
    pub fn labels_of(&self, message_id: &str) -> Vec<String> {
        let Some(ids) = self.store.assignments.get(message_id) else {
            return Vec::new();
        };
        self.store
            .labels
            .iter()
            .filter(|label| ids.contains(&label.id))
            .map(|label| label.name.clone())
            .collect()
    }

    fn span(&self, message_id: &str) -> MailboxResult<MessageSpan> {
        let offset: u64 = message_id
            .parse()
            .map_err(|_| MailboxError::NotFound(format!("message '{message_id}'")))?;
        self.spans
            .iter()
            .copied()
            .find(|span| span.offset == offset)
            .ok_or_else(|| MailboxError::NotFound(format!("message '{message_id}'")))
    }

    fn rescan(&mut self) -> MailboxResult<()> {
        self.spans = scan_spans(&self.path).map_err(|e| MailboxError::io(&self.path, e))?;
        Ok(())
    }

    fn load_store(&mut self) -> MailboxResult<()> {
        self.store = match std::fs::read(&self.sidecar) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                MailboxError::Protocol(format!("{}: {e}", self.sidecar.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LabelStore::default(),
            Err(e) => return Err(MailboxError::io(&self.sidecar, e)),
        };
        Ok(())
    }

    fn save_store(&self) -> MailboxResult<()> {
        let json = serde_json::to_vec_pretty(&self.store)
            .map_err(|e| MailboxError::Protocol(e.to_string()))?;
        let tmp = self.sidecar.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| MailboxError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.sidecar).map_err(|e| MailboxError::io(&self.sidecar, e))?;
        debug!(path = %self.sidecar.display(), "Saved label sidecar");
        Ok(())
    }
}

impl Mailbox for MboxMailbox {
    fn authenticate(&mut self) -> MailboxResult<()> {
        match std::fs::metadata(&self.path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(MailboxError::Auth(format!(
                    "{} is not a file",
                    self.path.display()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MailboxError::Auth(format!(
                    "MBOX file not found: {}",
                    self.path.display()
                )))
            }
            Err(e) => return Err(MailboxError::io(&self.path, e)),
        }
        self.load_store()?;
        info!(path = %self.path.display(), "Opened MBOX mailbox");
        Ok(())
    }

    fn list_recent(&mut self, max: usize) -> MailboxResult<Vec<MessageSummary>> {
        self.rescan()?;
        Ok(self
            .spans
            .iter()
            .rev()
            .take(max)
            .map(|span| MessageSummary::new(span.offset.to_string()))
            .collect())
    }

    fn fetch_raw(&mut self, message_id: &str) -> MailboxResult<Vec<u8>> {
        let span = self.span(message_id)?;
        read_span(&self.path, span).map_err(|e| MailboxError::io(&self.path, e))
    }

    fn list_labels(&mut self) -> MailboxResult<Vec<LabelInfo>> {
        Ok(self.store.labels.clone())
    }

    fn create_label(&mut self, name: &str) -> MailboxResult<LabelInfo> {
        let wanted = name.to_lowercase();
        if let Some(existing) = self
            .store
            .labels
            .iter()
            .find(|label| label.name.to_lowercase() == wanted)
        {
            return Ok(existing.clone());
        }

        self.store.next_id += 1;
        let label = LabelInfo {
            id: format!("Label_{}", self.store.next_id),
            name: name.to_string(),
        };
        self.store.labels.push(label.clone());
        self.save_store()?;
        Ok(label)
    }

    fn attach_labels(&mut self, message_id: &str, label_ids: &[String]) -> MailboxResult<()> {
        self.span(message_id)?;
        if let Some(unknown) = label_ids
            .iter()
            .find(|id| !self.store.labels.iter().any(|label| &label.id == *id))
        {
            return Err(MailboxError::NotFound(format!("label '{unknown}'")));
        }

        let attached = self
            .store
            .assignments
            .entry(message_id.to_string())
            .or_default();
        let before = attached.len();
        attached.extend(label_ids.iter().cloned());
        if attached.len() != before {
            self.save_store()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_mbox(dir: &Path, count: usize) -> PathBuf {
        let path = dir.join("inbox.mbox");
        let mut contents = String::new();
        for i in 0..count {
            contents.push_str(&format!(
                "From sender{i}@example.com Thu Jan 01 00:00:0{i} 2024\nSubject: Message {i}\n\nBody {i}\n\n"
            ));
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_list_most_recent_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut mailbox = MboxMailbox::open(write_mbox(dir.path(), 3));
        mailbox.authenticate().unwrap();

        let listed = mailbox.list_recent(2).unwrap();
        assert_eq!(listed.len(), 2);
        let newest = mailbox.fetch_raw(&listed[0].id).unwrap();
        assert!(String::from_utf8_lossy(&newest).contains("Subject: Message 2"));

        assert_eq!(mailbox.list_recent(10).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_file_is_auth_error() {
        let mut mailbox = MboxMailbox::open("/nonexistent/inbox.mbox");
        assert!(matches!(mailbox.authenticate(), Err(MailboxError::Auth(_))));
    }

    #[test]
    fn test_unknown_message_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut mailbox = MboxMailbox::open(write_mbox(dir.path(), 1));
        mailbox.authenticate().unwrap();
        mailbox.list_recent(1).unwrap();
        assert!(matches!(
            mailbox.fetch_raw("12345"),
            Err(MailboxError::NotFound(_))
        ));
        assert!(matches!(
            mailbox.fetch_raw("not-a-number"),
            Err(MailboxError::NotFound(_))
        ));
    }

    #[test]
    fn test_labels_persist_in_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_mbox(dir.path(), 1);

        let mut mailbox = MboxMailbox::open(&path);
        mailbox.authenticate().unwrap();
        let id = mailbox.list_recent(1).unwrap()[0].id.clone();
        let label = mailbox.ensure_label("Phishing").unwrap();
        assert_eq!(mailbox.ensure_label("phishing").unwrap(), label);
        mailbox.attach_labels(&id, &[label.clone()]).unwrap();
        mailbox.attach_labels(&id, &[label.clone()]).unwrap();

        let mut reopened = MboxMailbox::open(&path);
        reopened.authenticate().unwrap();
        assert_eq!(reopened.list_labels().unwrap().len(), 1);
        assert_eq!(reopened.labels_of(&id), vec!["Phishing".to_string()]);
    }

    #[test]
    fn test_attach_unknown_label_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut mailbox = MboxMailbox::open(write_mbox(dir.path(), 1));
        mailbox.authenticate().unwrap();
        let id = mailbox.list_recent(1).unwrap()[0].id.clone();
        assert!(matches!(
            mailbox.attach_labels(&id, &["Label_99".to_string()]),
            Err(MailboxError::NotFound(_))
        ));
    }
}
