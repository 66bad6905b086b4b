//! Heading-based markdown chunker.
//!
//! Splits a document into one chunk per heading section, tracking a 6-deep
//! stack of ancestor headings to build each chunk's `header_path`. Leading
//! YAML/TOML frontmatter becomes its own chunk. Sections that exceed the
//! character budget are split at paragraph boundaries, never through a
//! fenced code block, a pipe table, or an admonition block.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{chunk_id, content_hash, now_unix, Chunk, ContentType};

use super::{ChunkInput, Chunker};

/// Default budget for a single section chunk, in characters. Chosen to sit
/// comfortably under typical embedding context windows while staying large
/// enough that most documentation sections fit whole.
const DEFAULT_SECTION_BUDGET: usize = 2000;

static TABLE_SEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?\s*$").expect("valid regex"));

/// Trimmed lines like `NOTE:` or `SEE ALSO:` — a short all-caps label that
/// introduces a callout block. The block runs until the next blank line.
static ADMONITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z ]{0,30}:$").expect("valid regex"));

pub struct MarkdownChunker {
    section_budget: usize,
}

impl Default for MarkdownChunker {
    fn default() -> Self {
        MarkdownChunker { section_budget: DEFAULT_SECTION_BUDGET }
    }
}

impl MarkdownChunker {
    pub fn new(section_budget: usize) -> Self {
        MarkdownChunker { section_budget }
    }
}

impl Chunker for MarkdownChunker {
    fn chunk(&self, input: &ChunkInput<'_>) -> Vec<Chunk> {
        let text = String::from_utf8_lossy(input.bytes);
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut line_base: u32 = 0;
        let mut owned_body = None;

        if let Some((frontmatter, rest, consumed)) = extract_frontmatter(&text) {
            let mut metadata = HashMap::new();
            metadata.insert("type".to_string(), "frontmatter".to_string());
            chunks.push(build_chunk(input, &frontmatter, 1, consumed as u32, "", metadata));
            line_base = consumed as u32;
            owned_body = Some(rest);
        }
        let body: &str = owned_body.as_deref().unwrap_or(&text);

        let lines: Vec<&str> = body.lines().collect();
        let headings = extract_headings(&lines);
        let sections = build_sections(&lines, &headings);
        let atoms = atomic_spans(&lines);

        for section in &sections {
            let section_lines = &lines[section.start..section.end];
            let windows = split_section(section_lines, &atoms, section.start, self.section_budget);

            for (idx, window) in windows.iter().enumerate() {
                let mut content = window.text.clone();
                if idx > 0 {
                    content = format!("<!-- Section: {} -->\n{}", section.header_path, content);
                }
                let start_line = line_base + window.start as u32 + 1;
                let end_line = line_base + window.end as u32;
                chunks.push(build_chunk(
                    input,
                    &content,
                    start_line,
                    end_line,
                    &section.header_path,
                    HashMap::new(),
                ));
            }
        }

        chunks
    }
}

fn build_chunk(
    input: &ChunkInput<'_>,
    content: &str,
    start_line: u32,
    end_line: u32,
    header_path: &str,
    mut metadata: HashMap<String, String>,
) -> Chunk {
    let hash = content_hash(content.as_bytes());
    let id = chunk_id(input.path, &hash);
    if !header_path.is_empty() {
        metadata.insert("header_path".to_string(), header_path.to_string());
    }
    let now = now_unix();
    Chunk {
        id,
        file_id: crate::model::file_id(input.path),
        file_path: input.path.to_string(),
        content: content.to_string(),
        raw_content: content.to_string(),
        context: String::new(),
        content_type: ContentType::Markdown,
        language: input.language.to_string(),
        start_line,
        end_line,
        symbols: Vec::new(),
        metadata,
        embedding: None,
        created_at: now,
        updated_at: now,
    }
}

/// Splits off leading `---`-delimited frontmatter. Returns `(frontmatter,
/// remaining body, lines consumed)` or `None` if the document doesn't start
/// with a frontmatter fence or the fence is never closed.
fn extract_frontmatter(source: &str) -> Option<(String, String, usize)> {
    let lines: Vec<&str> = source.lines().collect();
    if lines.first()?.trim() != "---" {
        return None;
    }

    let end_idx = lines.iter().enumerate().skip(1).find(|(_, l)| l.trim() == "---")?.0;
    let frontmatter = lines[..=end_idx].join("\n");
    let rest = lines[end_idx + 1..].join("\n");
    Some((frontmatter, rest, end_idx + 1))
}

#[derive(Debug, Clone)]
struct Heading {
    level: usize,
    text: String,
    line: usize,
}

fn atx_heading_level(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut count = 0usize;
    for &b in bytes {
        if b == b'#' {
            count += 1;
        } else {
            break;
        }
    }
    if (1..=6).contains(&count) && bytes.get(count) == Some(&b' ') {
        Some(count)
    } else {
        None
    }
}

fn extract_headings(lines: &[&str]) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut in_fence = false;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(level) = atx_heading_level(trimmed) {
            let text = trimmed[level..].trim().to_string();
            if !text.is_empty() {
                headings.push(Heading { level, text, line: i });
            }
        }
    }
    headings
}

struct Section {
    header_path: String,
    start: usize,
    end: usize,
}

/// One section per heading (plus a leading section for any preamble before
/// the first heading). `header_path` is the joined stack of the heading's
/// ancestors, capped at 6 levels since ATX headings only go that deep.
fn build_sections(lines: &[&str], headings: &[Heading]) -> Vec<Section> {
    if headings.is_empty() {
        if lines.is_empty() {
            return Vec::new();
        }
        return vec![Section { header_path: String::new(), start: 0, end: lines.len() }];
    }

    let mut sections = Vec::new();
    if headings[0].line > 0 {
        let has_content = lines[..headings[0].line].iter().any(|l| !l.trim().is_empty());
        if has_content {
            sections.push(Section { header_path: String::new(), start: 0, end: headings[0].line });
        }
    }

    let mut stack: Vec<String> = Vec::new();
    for (i, heading) in headings.iter().enumerate() {
        stack.truncate(heading.level.saturating_sub(1));
        stack.push(heading.text.clone());
        let header_path = stack.join(" > ");

        let end = headings.get(i + 1).map(|h| h.line).unwrap_or(lines.len());
        sections.push(Section { header_path, start: heading.line, end });
    }

    sections
}

/// A maximal line range (within the whole document, 0-indexed, half-open)
/// that must not be split across a section-overflow boundary.
fn atomic_spans(lines: &[&str]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let trimmed = lines[i].trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            let fence = if trimmed.starts_with("```") { "```" } else { "~~~" };
            let start = i;
            i += 1;
            while i < lines.len() && !lines[i].trim_start().starts_with(fence) {
                i += 1;
            }
            i = (i + 1).min(lines.len());
            spans.push((start, i));
            continue;
        }

        if i + 1 < lines.len() && TABLE_SEP_RE.is_match(lines[i + 1].trim()) && trimmed.contains('|') {
            let start = i;
            i += 2;
            while i < lines.len() && lines[i].trim().contains('|') {
                i += 1;
            }
            spans.push((start, i));
            continue;
        }

        if ADMONITION_RE.is_match(trimmed) {
            let start = i;
            i += 1;
            while i < lines.len() && !lines[i].trim().is_empty() {
                i += 1;
            }
            spans.push((start, i));
            continue;
        }

        i += 1;
    }
    spans
}

struct Window {
    text: String,
    start: usize,
    end: usize,
}

/// Splits `section_lines` (a slice starting at absolute line `base`) into
/// budget-sized windows at blank-line paragraph boundaries. An atomic span
/// that straddles the budget is kept whole as its own window rather than cut.
fn split_section(section_lines: &[&str], atoms: &[(usize, usize)], base: usize, budget: usize) -> Vec<Window> {
    let total: String = section_lines.join("\n");
    if total.len() <= budget || section_lines.is_empty() {
        return vec![Window { text: total, start: base, end: base + section_lines.len() }];
    }

    let mut windows = Vec::new();
    let mut cur_start = 0usize;
    let mut cur_len = 0usize;
    let mut i = 0usize;

    while i < section_lines.len() {
        let absolute = base + i;
        if let Some(&(_, span_end)) = atoms.iter().find(|(s, _)| *s == absolute) {
            let span_end_local = (span_end - base).min(section_lines.len());
            let span_len: usize = section_lines[i..span_end_local].iter().map(|l| l.len() + 1).sum();
            if cur_len > 0 && cur_len + span_len > budget {
                flush_window(section_lines, &mut windows, cur_start, i, base);
                cur_start = i;
                cur_len = 0;
            }
            cur_len += span_len;
            i = span_end_local;
            continue;
        }

        let line_len = section_lines[i].len() + 1;
        let at_boundary = section_lines[i].trim().is_empty();

        if cur_len + line_len > budget && at_boundary && cur_len > 0 {
            flush_window(section_lines, &mut windows, cur_start, i, base);
            cur_start = i;
            cur_len = 0;
        }

        cur_len += line_len;
        i += 1;
    }

    if cur_start < section_lines.len() {
        flush_window(section_lines, &mut windows, cur_start, section_lines.len(), base);
    }

    windows
}

fn flush_window(section_lines: &[&str], windows: &mut Vec<Window>, start: usize, end: usize, base: usize) {
    if start >= end {
        return;
    }
    let text = section_lines[start..end].join("\n");
    windows.push(Window { text, start: base + start, end: base + end });
}
