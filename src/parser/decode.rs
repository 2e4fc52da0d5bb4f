//! Raw RFC 5322 bytes → subject and plain-text body.
//!
//! Decoding never fails: a message that cannot be parsed degrades to an
//! empty body so the rest of a scan can continue.

use std::borrow::Cow;

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use serde::Serialize;
use tracing::debug;

/// What the classifier needs from one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodedMessage {
    /// Subject header as written (encoded words left alone), unfolded.
    /// Empty when absent.
    pub subject: String,
    /// First non-attachment `text/plain` part, empty when there is none.
    pub body: String,
    /// Set when the message was damaged and the body may be incomplete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

/// Decode one raw message.
pub fn decode(raw: &[u8]) -> DecodedMessage {
    let bytes = skip_from_line(raw);

    let Some(message) = MessageParser::default().parse(bytes) else {
        debug!(len = raw.len(), "Message could not be parsed, using empty body");
        return DecodedMessage {
            problem: Some("unparseable message".into()),
            ..DecodedMessage::default()
        };
    };

    let subject = message.header_raw("Subject").map(unfold).unwrap_or_default();
    let root = message.root_part();

    let (body, damaged) = if matches!(root.body, PartType::Multipart(_) | PartType::Message(_)) {
        first_plain_text(&message)
            .map(|part| (part_text(part), part.is_encoding_problem))
            .unwrap_or_default()
    } else {
        (part_text(root), root.is_encoding_problem)
    };

    DecodedMessage {
        subject,
        body,
        problem: damaged.then(|| "body has encoding errors".to_string()),
    }
}

/// Depth-first search in part order, descending into attached
/// `message/rfc822` parts.
fn first_plain_text<'m, 'x>(message: &'m Message<'x>) -> Option<&'m MessagePart<'x>> {
    message.parts.iter().find_map(|part| match &part.body {
        PartType::Message(nested) => first_plain_text(nested),
        _ => is_inline_plain_text(part).then_some(part),
    })
}

/// Join folded header lines and trim the surrounding whitespace.
fn unfold(value: &str) -> String {
    value
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect::<String>()
        .trim()
        .to_string()
}

/// `text/plain` (the default when no type is given) and not an attachment.
fn is_inline_plain_text(part: &MessagePart<'_>) -> bool {
    if matches!(part.body, PartType::Multipart(_) | PartType::Message(_)) {
        return false;
    }
    let plain = part.content_type().map_or(true, |ct| {
        ct.ctype().eq_ignore_ascii_case("text")
            && ct
                .subtype()
                .map_or(false, |sub| sub.eq_ignore_ascii_case("plain"))
    });
    let attachment = part
        .content_disposition()
        .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"));
    plain && !attachment
}

/// Decoded payload of a part as text, with undecodable sequences dropped.
fn part_text(part: &MessagePart<'_>) -> String {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => strip_replacement(text),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            let charset = part
                .content_type()
                .and_then(|ct| ct.attribute("charset"))
                .unwrap_or("utf-8");
            decode_ignoring_errors(bytes, charset)
        }
        PartType::Message(_) => decode_ignoring_errors(part.contents(), "utf-8"),
        PartType::Multipart(_) => String::new(),
    }
}

/// Decode bytes in `charset` (UTF-8 when unknown), dropping invalid sequences.
pub fn decode_ignoring_errors(bytes: &[u8], charset: &str) -> String {
    let encoding =
        encoding_rs::Encoding::for_label(charset.trim().as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        strip_replacement(&text)
    } else {
        text.into_owned()
    }
}

fn strip_replacement(text: &Cow<'_, str>) -> String {
    if text.contains('\u{FFFD}') {
        text.chars().filter(|&c| c != '\u{FFFD}').collect()
    } else {
        text.to_string()
    }
}

/// Skip a leading BOM and an MBOX `From ` separator line.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
