// src/dispatch/record.rs

//! Run records and error sections appended to task documents.
//!
//! Both are Obsidian callouts so they render as boxes and are easy to tell
//! apart from the human's own text:
//!
//! ```text
//! > [!quote] Familiar - Report 2 at 2025-03-01 14:05
//! > generated text, one `> ` per line
//!
//! > [!failure] Familiar - Report 3 failed at 2025-03-01 15:10
//! > **process failure**: generator exited with code 1
//! >
//! > rate limited
//! ```

use chrono::{DateTime, Local};

/// Timestamp format written to the `last_run` metadata key.
pub const LAST_RUN_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Timestamp format used in callout headers.
pub const RECORD_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn last_run_stamp(at: &DateTime<Local>) -> String {
    at.format(LAST_RUN_FORMAT).to_string()
}

/// A successful run's record.
pub fn run_record(name: &str, iteration: u64, at: &DateTime<Local>, output: &str) -> String {
    let output = output.trim();
    let content = if output.is_empty() {
        "> *(no output)*".to_string()
    } else {
        quote(output)
    };
    format!(
        "> [!quote] {name} - Report {iteration} at {}\n{content}\n",
        at.format(RECORD_FORMAT)
    )
}

/// An error section for a failed run. `kind` is the short failure label,
/// `summary` one line, `detail` anything longer (may be empty).
pub fn failure_record(
    name: &str,
    iteration: u64,
    at: &DateTime<Local>,
    kind: &str,
    summary: &str,
    detail: &str,
) -> String {
    let mut section = format!(
        "> [!failure] {name} - Report {iteration} failed at {}\n> **{kind}**: {}\n",
        at.format(RECORD_FORMAT),
        summary.trim()
    );
    let detail = detail.trim();
    if !detail.is_empty() && detail != summary.trim() {
        section.push_str(">\n");
        section.push_str(&quote(detail));
        section.push('\n');
    }
    section
}

/// Append `section` to `body`, separated by one blank line.
///
/// Existing text is only touched at its trailing whitespace.
pub fn append_section(body: &mut String, section: &str) {
    let kept = body.trim_end().len();
    body.truncate(kept);
    if !body.is_empty() {
        body.push_str("\n\n");
    }
    body.push_str(section);
}

fn quote(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
