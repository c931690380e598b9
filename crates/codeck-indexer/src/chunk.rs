//! Splits markdown and JSONL files into chunks sized for embedding and
//! full-text indexing.

use serde::Serialize;

/// Soft target chunk size for markdown, before an overlong section is
/// force-split.
const SOFT_TARGET_BYTES: usize = 1600;
/// Overlap applied when a markdown section must be force-split.
const OVERLAP_BYTES: usize = 320;
/// JSONL lines grouped per chunk.
const JSONL_LINES_PER_CHUNK: usize = 20;

/// Chunk-level metadata, stored alongside the chunk text.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ChunkMetadata {
    /// `"markdown"` or `"jsonl"`.
    pub kind: String,
    /// Source file path, relative to the workspace's `.codeck/` root.
    pub source_path: String,
    /// ISO date, if derivable from the source (daily logs, transcripts).
    pub date: Option<String>,
    /// Nearest enclosing markdown heading, if any.
    pub heading: Option<String>,
    /// JSONL-only: distinct roles seen in the chunk.
    pub roles: Vec<String>,
    /// JSONL-only: first timestamp in the chunk.
    pub first_ts: Option<String>,
    /// JSONL-only: last timestamp in the chunk.
    pub last_ts: Option<String>,
}

/// A single chunk of text plus its metadata, ready for the `chunks`
/// table.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk body text.
    pub text: String,
    /// Structured metadata about the chunk.
    pub metadata: ChunkMetadata,
}

/// Split markdown `content` on `#`/`##`/`###` heading boundaries,
/// accumulating sections near [`SOFT_TARGET_BYTES`] and force-splitting
/// with [`OVERLAP_BYTES`] of overlap when a single section exceeds it.
#[must_use]
pub fn chunk_markdown(content: &str, source_path: &str) -> Vec<Chunk> {
    let sections = split_on_headings(content);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_heading: Option<String> = None;

    for (heading, body) in sections {
        if current.len() + body.len() > SOFT_TARGET_BYTES && !current.is_empty() {
            chunks.push(make_markdown_chunk(&current, &current_heading, source_path));
            current.clear();
        }
        current_heading = heading.or(current_heading);
        current.push_str(&body);

        while current.len() > SOFT_TARGET_BYTES {
            let split_at = floor_char_boundary(&current, SOFT_TARGET_BYTES);
            let (head, _) = current.split_at(split_at);
            chunks.push(make_markdown_chunk(head, &current_heading, source_path));
            let overlap_start = split_at.saturating_sub(OVERLAP_BYTES);
            let overlap_start = floor_char_boundary(&current, overlap_start);
            current = current[overlap_start..].to_string();
        }
    }
    if !current.trim().is_empty() {
        chunks.push(make_markdown_chunk(&current, &current_heading, source_path));
    }
    chunks
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn make_markdown_chunk(text: &str, heading: &Option<String>, source_path: &str) -> Chunk {
    Chunk {
        text: text.to_string(),
        metadata: ChunkMetadata {
            kind: "markdown".to_string(),
            source_path: source_path.to_string(),
            date: extract_date_from_path(source_path),
            heading: heading.clone(),
            roles: Vec::new(),
            first_ts: None,
            last_ts: None,
        },
    }
}

fn split_on_headings(content: &str) -> Vec<(Option<String>, String)> {
    let mut sections = Vec::new();
    let mut current_heading: Option<String> = None;
    let mut current_body = String::new();

    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            if !current_body.is_empty() {
                sections.push((current_heading.clone(), std::mem::take(&mut current_body)));
            }
            current_heading = Some(trimmed.trim_start_matches('#').trim().to_string());
        }
        current_body.push_str(line);
        current_body.push('\n');
    }
    if !current_body.is_empty() {
        sections.push((current_heading, current_body));
    }
    sections
}

fn extract_date_from_path(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next()?;
    let stem = file_name.strip_suffix(".md")?;
    if stem.len() == 10 && stem.chars().filter(|c| *c == '-').count() == 2 {
        Some(stem.to_string())
    } else {
        None
    }
}

#[derive(serde::Deserialize)]
struct JsonlLine {
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Group JSONL `content` into chunks of [`JSONL_LINES_PER_CHUNK`] lines,
/// aggregating role/timestamp metadata per chunk.
#[must_use]
pub fn chunk_jsonl(content: &str, source_path: &str) -> Vec<Chunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();

    for group in lines.chunks(JSONL_LINES_PER_CHUNK) {
        let mut text = String::new();
        let mut roles = Vec::new();
        let mut first_ts = None;
        let mut last_ts = None;

        for line in group {
            if let Ok(parsed) = serde_json::from_str::<JsonlLine>(line) {
                if let Some(role) = parsed.role {
                    if !roles.contains(&role) {
                        roles.push(role);
                    }
                }
                if let Some(ts) = parsed.ts {
                    first_ts.get_or_insert_with(|| ts.clone());
                    last_ts = Some(ts);
                }
                if let Some(t) = parsed.text {
                    text.push_str(&t);
                    text.push('\n');
                }
            }
        }

        if text.trim().is_empty() {
            continue;
        }

        chunks.push(Chunk {
            text,
            metadata: ChunkMetadata {
                kind: "jsonl".to_string(),
                source_path: source_path.to_string(),
                date: None,
                heading: None,
                roles,
                first_ts,
                last_ts,
            },
        });
    }
    chunks
}
