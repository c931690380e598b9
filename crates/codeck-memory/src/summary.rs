//! Post-session summarisation: parses a finished transcript (no LLM) into
//! a short markdown summary appended to the daily log.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::error::MemoryResult;

const MIN_SESSION_SECS: i64 = 30;
const MAX_INPUT_CHARS: usize = 200;
const MAX_INPUTS_SHOWN: usize = 10;

#[derive(Deserialize)]
struct RawLine {
    ts: Option<DateTime<Utc>>,
    role: String,
    text: String,
}

/// Parsed summary of a finished session transcript.
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    /// Wall-clock duration of the session.
    pub duration_secs: i64,
    /// Distinct file paths referenced in the transcript.
    pub referenced_paths: Vec<String>,
    /// User inputs, each truncated to [`MAX_INPUT_CHARS`].
    pub inputs: Vec<String>,
    /// Count of lines matching an error-looking pattern.
    pub error_count: usize,
    /// Count of context-compaction events observed.
    pub compaction_count: usize,
}

static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:/[\w.\-]+)+\.\w+").expect("valid regex"));
static ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(error|exception|panic|traceback|failed)\b").expect("valid regex"));
static COMPACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(context window|conversation compacted|compacting context)").expect("valid regex")
});

/// Parse the transcript at `path` into a [`SessionSummary`], or `None` if
/// the session was shorter than 30 seconds (skipped per policy).
///
/// # Errors
///
/// Returns an error if the transcript cannot be read.
pub async fn summarize_transcript(path: &Path) -> MemoryResult<Option<SessionSummary>> {
    let contents = tokio::fs::read_to_string(path).await?;
    let mut summary = SessionSummary::default();
    let mut first_ts: Option<DateTime<Utc>> = None;
    let mut last_ts: Option<DateTime<Utc>> = None;
    let mut paths = HashSet::new();

    for line in contents.lines() {
        let Ok(raw) = serde_json::from_str::<RawLine>(line) else {
            continue;
        };
        if let Some(ts) = raw.ts {
            first_ts.get_or_insert(ts);
            last_ts = Some(ts);
        }
        for m in PATH_RE.find_iter(&raw.text) {
            paths.insert(m.as_str().to_string());
        }
        if ERROR_RE.is_match(&raw.text) {
            summary.error_count += 1;
        }
        if COMPACTION_RE.is_match(&raw.text) {
            summary.compaction_count += 1;
        }
        if raw.role == "input" && summary.inputs.len() < MAX_INPUTS_SHOWN {
            let truncated: String = raw.text.chars().take(MAX_INPUT_CHARS).collect();
            summary.inputs.push(truncated);
        }
    }

    summary.duration_secs = match (first_ts, last_ts) {
        (Some(a), Some(b)) => (b - a).num_seconds().max(0),
        _ => 0,
    };
    summary.referenced_paths = {
        let mut v: Vec<String> = paths.into_iter().collect();
        v.sort();
        v
    };

    if summary.duration_secs < MIN_SESSION_SECS {
        return Ok(None);
    }
    Ok(Some(summary))
}

impl SessionSummary {
    /// Render as a markdown bullet block suitable for appending to a
    /// daily log.
    #[must_use]
    pub fn to_markdown(&self, session_id: &str) -> String {
        let mut out = format!(
            "### Session `{session_id}` ({}s)\n",
            self.duration_secs
        );
        if !self.referenced_paths.is_empty() {
            out.push_str("- Paths: ");
            out.push_str(&self.referenced_paths.join(", "));
            out.push('\n');
        }
        if !self.inputs.is_empty() {
            out.push_str("- Inputs:\n");
            for input in &self.inputs {
                out.push_str(&format!("  - {input}\n"));
            }
        }
        if self.error_count > 0 {
            out.push_str(&format!("- Errors observed: {}\n", self.error_count));
        }
        if self.compaction_count > 0 {
            out.push_str(&format!("- Context compactions: {}\n", self.compaction_count));
        }
        out
    }
}
