//! Render a scan report as a terminal table, JSON or CSV.
//!
//! CSV output is UTF-8 with BOM for Excel compatibility.

use std::io::Write;
use std::path::Path;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::report::ScanReport;

const SUBJECT_WIDTH: usize = 50;
const PREDICTION_WIDTH: usize = 10;

/// Write the report as an aligned table: Subject, Prediction, Reasons.
pub fn write_table(report: &ScanReport, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(
        out,
        "{} {} Reasons",
        pad("Subject", SUBJECT_WIDTH),
        pad("Prediction", PREDICTION_WIDTH)
    )?;
    for row in &report.rows {
        let subject = if row.subject.is_empty() {
            "(no subject)"
        } else {
            row.subject.as_str()
        };
        writeln!(
            out,
            "{} {} {}",
            pad(&truncate_str(subject, SUBJECT_WIDTH), SUBJECT_WIDTH),
            pad(row.verdict.as_str(), PREDICTION_WIDTH),
            row.reasons_joined()
        )?;
    }
    for failure in &report.failures {
        writeln!(
            out,
            "! {} ({}): {}",
            failure.message_id, failure.stage, failure.reason
        )?;
    }
    Ok(())
}

/// The full report as pretty-printed JSON.
pub fn to_json(report: &ScanReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Export the rows to a CSV file.
///
/// Columns: Message_ID, Subject, Prediction, Reasons, Labeled
pub fn export_csv(report: &ScanReport, output_path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(&[0xEF, 0xBB, 0xBF])?;
    write_csv(report, &mut file)
}

/// Write the CSV rows (no BOM) to any writer.
pub fn write_csv(report: &ScanReport, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "Message_ID,Subject,Prediction,Reasons,Labeled")?;
    for row in &report.rows {
        writeln!(
            out,
            "{},{},{},{},{}",
            csv_escape(&row.message_id),
            csv_escape(&row.subject),
            row.verdict.as_str(),
            csv_escape(&row.reasons_joined()),
            row.labeled
        )?;
    }
    Ok(())
}

/// Escape a value for CSV (RFC 4180).
fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Truncate to `max_width` display columns, adding "..." when cut.
fn truncate_str(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return s.chars().take(max_width).collect();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + w + 3 > max_width {
            break;
        }
        result.push(ch);
        width += w;
    }
    result.push_str("...");
    result
}

/// Right-pad with spaces to `width` display columns.
fn pad(s: &str, width: usize) -> String {
    let used = UnicodeWidthStr::width(s);
    format!("{s}{}", " ".repeat(width.saturating_sub(used)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Verdict;
    use crate::reasons::Reason;
    use crate::triage::report::TriageRow;
    use chrono::Utc;

    fn report() -> ScanReport {
        let now = Utc::now();
        ScanReport {
            started_at: now,
            finished_at: now,
            rows: vec![
                TriageRow {
                    message_id: "1".into(),
                    subject: "Your \"account\", suspended".into(),
                    verdict: Verdict::Phishing,
                    reasons: vec![Reason::UrgentLanguage, Reason::SensitiveRequest],
                    labeled: true,
                },
                TriageRow {
                    message_id: "2".into(),
                    subject: String::new(),
                    verdict: Verdict::Legitimate,
                    reasons: vec![Reason::NotObvious],
                    labeled: false,
                },
            ],
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("hello"), "hello");
        assert_eq!(csv_escape("hello, world"), "\"hello, world\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("line1\nline2"), "\"line1\nline2\"");
    }

    #[test]
    fn test_write_csv() {
        let mut out = Vec::new();
        write_csv(&report(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Message_ID,Subject,Prediction,Reasons,Labeled");
        assert_eq!(
            lines[1],
            "1,\"Your \"\"account\"\", suspended\",Phishing,\"Urgent Language, Sensitive Request\",true"
        );
        assert_eq!(lines[2], "2,,Legit,Not obvious,false");
    }

    #[test]
    fn test_table_truncates_wide_subjects() {
        let mut r = report();
        r.rows[0].subject = "確認".repeat(40);
        let mut out = Vec::new();
        write_table(&r, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let line = text.lines().nth(1).unwrap();
        assert!(line.contains("..."));
        assert!(text.contains("(no subject)"));
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("abcdefghij", 6), "abc...");
        assert_eq!(truncate_str("abcdef", 2), "ab");
    }

    #[test]
    fn test_json_has_rows_and_failures() {
        let json = to_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["rows"].as_array().unwrap().len(), 2);
        assert!(value["failures"].as_array().unwrap().is_empty());
    }
}
