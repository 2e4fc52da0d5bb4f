//! Gmail REST API backend.
//!
//! Uses a blocking `reqwest` client with a request timeout. Credentials
//! come from an OAuth token file in the format written by Google's
//! installed-app flow; the access token is refreshed with the refresh
//! token when it has expired and the file is rewritten. Obtaining the first
//! token (the consent flow) happens outside this crate.

use std::path::{Path, PathBuf};

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{LabelInfo, Mailbox, MailboxError, MailboxResult, MessageSummary};
use crate::config::GmailConfig;

/// Gmail emits URL-safe base64 with or without padding.
const URL_SAFE_ANY_PAD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Refresh this long before the recorded expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

// ── Wire types ──────────────────────────────────────────────────

/// Authorized-user token file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenFile {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    /// RFC 3339 timestamp, with or without an offset (UTC assumed).
    pub expiry: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRef {
    id: String,
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct RawMessageResponse {
    raw: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListLabelsResponse {
    #[serde(default)]
    labels: Vec<LabelInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLabelRequest<'a> {
    name: &'a str,
    label_list_visibility: &'static str,
    message_list_visibility: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    add_label_ids: &'a [String],
}

// ── Mailbox ─────────────────────────────────────────────────────

/// A Gmail account reached through the REST API.
pub struct GmailMailbox {
    client: Client,
    config: GmailConfig,
    token_path: PathBuf,
    token: Option<TokenFile>,
}

impl GmailMailbox {
    pub fn new(config: GmailConfig) -> MailboxResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("phishtriage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MailboxError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            token_path: config.token_path.clone(),
            config,
            token: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/gmail/v1/users/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.user_id,
            path
        )
    }

    fn access_token(&mut self) -> MailboxResult<String> {
        if self.token.is_none() {
            self.token = Some(read_token_file(&self.token_path)?);
        }
        let needs_refresh = self
            .token
            .as_ref()
            .map_or(true, |t| t.token.is_none() || is_expired(t.expiry.as_deref(), Utc::now()));
        if needs_refresh {
            self.refresh()?;
        }
        self.token
            .as_ref()
            .and_then(|t| t.token.clone())
            .ok_or_else(|| MailboxError::Auth("token file has no access token".into()))
    }

    fn refresh(&mut self) -> MailboxResult<()> {
        let Some(token) = self.token.as_mut() else {
            return Err(MailboxError::Auth("no token loaded".into()));
        };
        let (Some(refresh), Some(client_id), Some(secret)) = (
            token.refresh_token.as_deref(),
            token.client_id.as_deref(),
            token.client_secret.as_deref(),
        ) else {
            return Err(MailboxError::Auth(
                "access token expired and the token file cannot refresh it; \
                 run the OAuth consent flow again"
                    .into(),
            ));
        };

        debug!(uri = %token.token_uri, "Refreshing access token");
        let response = self
            .client
            .post(&token.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh),
                ("client_id", client_id),
                ("client_secret", secret),
            ])
            .send()
            .map_err(map_transport)?;
        let refreshed: RefreshResponse = parse_json(check_status(response)?)?;

        token.token = Some(refreshed.access_token);
        token.expiry = refreshed
            .expires_in
            .map(|secs| (Utc::now() + chrono::Duration::seconds(secs)).to_rfc3339());

        let json = serde_json::to_string_pretty(&*token)
            .map_err(|e| MailboxError::Protocol(e.to_string()))?;
        std::fs::write(&self.token_path, json).map_err(|e| MailboxError::io(&self.token_path, e))?;
        info!(path = %self.token_path.display(), "Refreshed access token");
        Ok(())
    }

    fn send<T: DeserializeOwned>(&mut self, request: RequestBuilder) -> MailboxResult<T> {
        let token = self.access_token()?;
        let response = request.bearer_auth(token).send().map_err(map_transport)?;
        parse_json(check_status(response)?)
    }
}

impl Mailbox for GmailMailbox {
    fn authenticate(&mut self) -> MailboxResult<()> {
        let request = self.client.get(self.url("profile"));
        let profile: ProfileResponse = self.send(request)?;
        info!(
            account = profile.email_address.as_deref().unwrap_or("unknown"),
            "Authenticated with Gmail"
        );
        Ok(())
    }

    fn list_recent(&mut self, max: usize) -> MailboxResult<Vec<MessageSummary>> {
        let request = self.client.get(self.url("messages")).query(&[
            ("labelIds", self.config.inbox_label.clone()),
            ("maxResults", max.to_string()),
        ]);
        let listed: ListMessagesResponse = self.send(request)?;
        Ok(listed
            .messages
            .into_iter()
            .take(max)
            .map(|m| MessageSummary {
                id: m.id,
                thread_id: m.thread_id,
            })
            .collect())
    }

    fn fetch_raw(&mut self, message_id: &str) -> MailboxResult<Vec<u8>> {
        let request = self
            .client
            .get(self.url(&format!("messages/{message_id}")))
            .query(&[("format", "raw")]);
        let message: RawMessageResponse = self.send(request)?;
        let raw = message
            .raw
            .ok_or_else(|| MailboxError::Protocol(format!("message {message_id} has no raw payload")))?;
        decode_raw(&raw)
    }

    fn list_labels(&mut self) -> MailboxResult<Vec<LabelInfo>> {
        let request = self.client.get(self.url("labels"));
        let listed: ListLabelsResponse = self.send(request)?;
        Ok(listed.labels)
    }

    fn create_label(&mut self, name: &str) -> MailboxResult<LabelInfo> {
        let request = self.client.post(self.url("labels")).json(&CreateLabelRequest {
            name,
            label_list_visibility: "labelShow",
            message_list_visibility: "show",
        });
        let created: LabelInfo = self.send(request)?;
        info!(label = %created.name, id = %created.id, "Created label");
        Ok(created)
    }

    fn attach_labels(&mut self, message_id: &str, label_ids: &[String]) -> MailboxResult<()> {
        let request = self
            .client
            .post(self.url(&format!("messages/{message_id}/modify")))
            .json(&ModifyRequest {
                add_label_ids: label_ids,
            });
        let _: serde_json::Value = self.send(request)?;
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────

fn read_token_file(path: &Path) -> MailboxResult<TokenFile> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MailboxError::Auth(format!(
                "token file {} not found; run the OAuth consent flow to create it",
                path.display()
            )))
        }
        Err(e) => return Err(MailboxError::io(path, e)),
    };
    serde_json::from_str(&contents)
        .map_err(|e| MailboxError::Auth(format!("invalid token file {}: {e}", path.display())))
}

/// Whether a token with this expiry must be refreshed at `now`.
/// A missing or unreadable expiry is treated as still valid.
fn is_expired(expiry: Option<&str>, now: DateTime<Utc>) -> bool {
    expiry
        .and_then(parse_expiry)
        .is_some_and(|at| at - chrono::Duration::seconds(EXPIRY_SKEW_SECS) <= now)
}

fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Decode Gmail's base64url `raw` field.
fn decode_raw(raw: &str) -> MailboxResult<Vec<u8>> {
    let cleaned: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    URL_SAFE_ANY_PAD
        .decode(cleaned)
        .map_err(|e| MailboxError::Protocol(format!("invalid base64 payload: {e}")))
}

fn map_transport(e: reqwest::Error) -> MailboxError {
    if e.is_timeout() {
        MailboxError::Timeout(e.to_string())
    } else {
        MailboxError::Transport(e.to_string())
    }
}

/// Map an HTTP error status to the matching mailbox error.
fn status_error(status: u16, body: &str) -> MailboxError {
    let detail = format!("HTTP {status}: {}", body.trim());
    match status {
        401 | 403 => MailboxError::Auth(detail),
        404 => MailboxError::NotFound(detail),
        408 | 504 => MailboxError::Timeout(detail),
        _ => MailboxError::Transport(detail),
    }
}

fn check_status(response: Response) -> MailboxResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(status_error(status.as_u16(), &body))
}

fn parse_json<T: DeserializeOwned>(response: Response) -> MailboxResult<T> {
    let bytes = response.bytes().map_err(map_transport)?;
    serde_json::from_slice(&bytes).map_err(|e| MailboxError::Protocol(e.to_string()))
}
