//! IMAP backend.
//!
//! Logs in with an app password over implicit TLS. Message ids are UIDs in
//! the configured folder. Labels are folders: creating a label is `CREATE`
//! and attaching one copies the message into that folder, which is how
//! Gmail exposes labels over IMAP.

use std::net::{TcpStream, ToSocketAddrs};

use ::imap::error::Error as ImapError;
use ::imap::{Client, Session};
use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, info, warn};

use super::{LabelInfo, Mailbox, MailboxError, MailboxResult, MessageSummary};
use crate::config::ImapConfig;

type ImapSession = Session<TlsStream<TcpStream>>;

/// A mailbox folder reached over IMAP.
pub struct ImapMailbox {
    config: ImapConfig,
    session: Option<ImapSession>,
}

impl ImapMailbox {
    pub fn new(config: ImapConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    fn connect(&self) -> MailboxResult<ImapSession> {
        let cfg = &self.config;
        if cfg.username.is_empty() {
            return Err(MailboxError::Auth("no IMAP username configured".into()));
        }
        let password = cfg.resolve_password().ok_or_else(|| {
            MailboxError::Auth(format!(
                "no IMAP app password; set {} or [imap] password",
                cfg.password_env
            ))
        })?;

        let addr = (cfg.host.as_str(), cfg.port)
            .to_socket_addrs()
            .map_err(map_io)?
            .next()
            .ok_or_else(|| MailboxError::Transport(format!("cannot resolve {}", cfg.host)))?;
        let tcp = TcpStream::connect_timeout(&addr, cfg.timeout()).map_err(map_io)?;
        tcp.set_read_timeout(Some(cfg.timeout())).map_err(map_io)?;
        tcp.set_write_timeout(Some(cfg.timeout())).map_err(map_io)?;

        let tls = TlsConnector::new().map_err(|e| MailboxError::Transport(e.to_string()))?;
        let stream = tls
            .connect(&cfg.host, tcp)
            .map_err(|e| MailboxError::Transport(format!("TLS with {}: {e}", cfg.host)))?;

        let mut client = Client::new(stream);
        client.read_greeting().map_err(map_imap)?;
        debug!(host = %cfg.host, port = cfg.port, "IMAP greeting received");

        client
            .login(&cfg.username, &password)
            .map_err(|(e, _)| MailboxError::Auth(format!("LOGIN rejected for {}: {e}", cfg.username)))
    }

    fn session(&mut self) -> MailboxResult<&mut ImapSession> {
        self.session
            .as_mut()
            .ok_or_else(|| MailboxError::Auth("not logged in".into()))
    }
}

impl Mailbox for ImapMailbox {
    /// Opens a fresh session each time, so long-running watches survive
    /// servers that drop idle connections.
    fn authenticate(&mut self) -> MailboxResult<()> {
        if let Some(mut old) = self.session.take() {
            let _ = old.logout();
        }
        self.session = Some(self.connect()?);
        info!(host = %self.config.host, user = %self.config.username, "Logged in over IMAP");
        Ok(())
    }

    fn list_recent(&mut self, max: usize) -> MailboxResult<Vec<MessageSummary>> {
        let folder = self.config.folder.clone();
        let session = self.session()?;
        session.select(&folder).map_err(map_imap)?;
        let uids = session.uid_search("ALL").map_err(map_imap)?;
        Ok(newest_first(uids, max)
            .into_iter()
            .map(|uid| MessageSummary::new(uid.to_string()))
            .collect())
    }

    fn fetch_raw(&mut self, message_id: &str) -> MailboxResult<Vec<u8>> {
        let uid = parse_uid(message_id)?;
        let fetches = self
            .session()?
            .uid_fetch(uid.to_string(), "(UID BODY.PEEK[])")
            .map_err(map_imap)?;
        fetches
            .iter()
            .find_map(|fetch| fetch.body().map(<[u8]>::to_vec))
            .ok_or_else(|| MailboxError::NotFound(format!("message UID {uid}")))
    }

    fn list_labels(&mut self) -> MailboxResult<Vec<LabelInfo>> {
        let names = self
            .session()?
            .list(Some(""), Some("*"))
            .map_err(map_imap)?;
        Ok(names
            .iter()
            .map(|name| LabelInfo {
                id: name.name().to_string(),
                name: name.name().to_string(),
            })
            .collect())
    }

    fn create_label(&mut self, name: &str) -> MailboxResult<LabelInfo> {
        self.session()?.create(name).map_err(map_imap)?;
        info!(folder = name, "Created IMAP folder");
        Ok(LabelInfo {
            id: name.to_string(),
            name: name.to_string(),
        })
    }

    fn attach_labels(&mut self, message_id: &str, label_ids: &[String]) -> MailboxResult<()> {
        let uid = parse_uid(message_id)?.to_string();
        let session = self.session()?;
        for folder in label_ids {
            session.uid_copy(&uid, folder).map_err(map_imap)?;
        }
        Ok(())
    }
}

impl Drop for ImapMailbox {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.logout() {
                warn!(error = %e, "IMAP logout failed");
            }
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────

/// The `max` highest UIDs, highest first. UIDs grow with arrival order.
fn newest_first(uids: impl IntoIterator<Item = u32>, max: usize) -> Vec<u32> {
    let mut uids: Vec<u32> = uids.into_iter().collect();
    uids.sort_unstable_by(|a, b| b.cmp(a));
    uids.truncate(max);
    uids
}

fn parse_uid(message_id: &str) -> MailboxResult<u32> {
    message_id
        .parse()
        .ok()
        .filter(|&uid| uid > 0)
        .ok_or_else(|| MailboxError::NotFound(format!("not an IMAP UID: {message_id:?}")))
}

fn map_io(e: std::io::Error) -> MailboxError {
    match e.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            MailboxError::Timeout(e.to_string())
        }
        _ => MailboxError::Transport(e.to_string()),
    }
}

fn map_imap(e: ImapError) -> MailboxError {
    match e {
        ImapError::Io(io) => map_io(io),
        ImapError::ConnectionLost => MailboxError::Transport("connection lost".into()),
        ImapError::No(msg) | ImapError::Bad(msg) => MailboxError::Protocol(msg),
        other => MailboxError::Protocol(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;
    use std::net::TcpListener;

    fn config_with_password() -> ImapConfig {
        ImapConfig {
            host: "127.0.0.1".into(),
            username: "me@example.com".into(),
            password: Some("app-pass".into()),
            timeout_secs: 5,
            ..ImapConfig::default()
        }
    }

    #[test]
    fn test_newest_first() {
        assert_eq!(newest_first([3, 10, 7, 1], 3), vec![10, 7, 3]);
        assert_eq!(newest_first([5, 2], 10), vec![5, 2]);
        assert!(newest_first(std::iter::empty(), 4).is_empty());
    }

    #[test]
    fn test_parse_uid() {
        assert_eq!(parse_uid("42").unwrap(), 42);
        assert!(matches!(parse_uid("0"), Err(MailboxError::NotFound(_))));
        assert!(matches!(parse_uid("abc"), Err(MailboxError::NotFound(_))));
    }

    #[test]
    fn test_error_mapping() {
        let timeout = std::io::Error::new(ErrorKind::TimedOut, "slow");
        assert!(matches!(map_io(timeout), MailboxError::Timeout(_)));
        let refused = std::io::Error::new(ErrorKind::ConnectionRefused, "no");
        assert!(matches!(map_io(refused), MailboxError::Transport(_)));
        assert!(matches!(
            map_imap(ImapError::No("[TRYCREATE] no such folder".into())),
            MailboxError::Protocol(_)
        ));
        assert!(matches!(
            map_imap(ImapError::ConnectionLost),
            MailboxError::Transport(_)
        ));
    }

    #[test]
    fn test_missing_credentials_fail_before_connecting() {
        let mut no_user = ImapMailbox::new(ImapConfig::default());
        assert!(matches!(no_user.authenticate(), Err(MailboxError::Auth(_))));

        let mut no_password = ImapMailbox::new(ImapConfig {
            username: "me@example.com".into(),
            password_env: "PHISHTRIAGE_TEST_UNSET_IMAP_PASSWORD".into(),
            ..ImapConfig::default()
        });
        assert!(matches!(no_password.authenticate(), Err(MailboxError::Auth(_))));
    }

    #[test]
    fn test_operations_need_a_session() {
        let mut mailbox = ImapMailbox::new(config_with_password());
        assert!(matches!(mailbox.list_recent(5), Err(MailboxError::Auth(_))));
        assert!(matches!(mailbox.fetch_raw("1"), Err(MailboxError::Auth(_))));
        assert!(matches!(mailbox.list_labels(), Err(MailboxError::Auth(_))));
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut mailbox = ImapMailbox::new(ImapConfig {
            port,
            ..config_with_password()
        });
        assert!(matches!(
            mailbox.authenticate(),
            Err(MailboxError::Transport(_) | MailboxError::Timeout(_))
        ));
    }
}
