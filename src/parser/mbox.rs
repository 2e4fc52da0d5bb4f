//! Streaming MBOX boundary scanner.
//!
//! Reads the file line by line and records where each message starts and
//! how long it is, without keeping message bodies in memory. Tolerant of:
//!
//! - Mixed `\n` and `\r\n` line endings
//! - `From ` lines not preceded by a blank line (logs a warning)
//! - A UTF-8 BOM at the start of the file

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

const READ_BUFFER_SIZE: usize = 128 * 1024;

/// Byte range of one message inside an MBOX file, `From ` line included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSpan {
    pub offset: u64,
    pub length: u64,
}

/// Find every message in the file, in file order.
pub fn scan_spans(path: &Path) -> io::Result<Vec<MessageSpan>> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

    let mut spans = Vec::new();
    let mut current: Option<u64> = None;
    let mut offset: u64 = 0;
    let mut prev_line_was_empty = true;
    let mut line = Vec::with_capacity(4096);

    loop {
        line.clear();
        let len = reader.read_until(b'\n', &mut line)? as u64;
        if len == 0 {
            break;
        }

        if is_mbox_separator(&line) {
            if !prev_line_was_empty {
                warn!(
                    offset,
                    "Found 'From ' separator without preceding blank line"
                );
            }
            if let Some(start) = current {
                spans.push(MessageSpan {
                    offset: start,
                    length: offset - start,
                });
            }
            current = Some(offset);
        }

        prev_line_was_empty = is_blank_line(&line);
        offset += len;
    }

    if let Some(start) = current {
        spans.push(MessageSpan {
            offset: start,
            length: offset - start,
        });
    }
    Ok(spans)
}

/// Read the raw bytes of one message.
pub fn read_span(path: &Path, span: MessageSpan) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(span.offset))?;
    let mut buffer = vec![0u8; span.length as usize];
    file.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(
            b"From user@example.com Thu Jan 01 00:00:00 2024\n"
        ));
        assert!(!is_mbox_separator(b"from user@example.com\n"));
        assert!(!is_mbox_separator(b">From user@example.com\n"));
        assert!(!is_mbox_separator(b"Subject: From here\n"));

        let mut bom = vec![0xEF, 0xBB, 0xBF];
        bom.extend_from_slice(b"From user@example.com Thu Jan 01 00:00:00 2024\n");
        assert!(is_mbox_separator(&bom));
    }

    #[test]
    fn test_is_blank_line() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    #[test]
    fn test_scan_and_read_spans() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inbox.mbox");
        let first = "From a@x Thu Jan 01 00:00:00 2024\nSubject: One\n\nbody one\n>From quoted\n\n";
        let second = "From b@x Thu Jan 01 00:00:01 2024\r\nSubject: Two\r\n\r\nbody two\r\n";
        std::fs::write(&path, format!("{first}{second}")).unwrap();

        let spans = scan_spans(&path).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].offset, 0);
        assert_eq!(spans[0].length as usize, first.len());
        assert_eq!(spans[1].offset as usize, first.len());

        let raw = read_span(&path, spans[1]).unwrap();
        assert_eq!(raw, second.as_bytes());
    }

    #[test]
    fn test_empty_file_has_no_spans() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mbox");
        std::fs::write(&path, b"").unwrap();
        assert!(scan_spans(&path).unwrap().is_empty());
    }
}
