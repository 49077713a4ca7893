//! Tokenizer for the tag-annotated text the generator returns.
//!
//! ```text
//! [HEADING]Sun in Leo[END]
//! [CONTENT]
//! - **Strength:** warmth and loyalty
//! - **Challenge:** pride
//! [END]
//! ```
//!
//! Regions are flat: `[HEADING]`, `[SUBHEADING]` and `[CONTENT]` open one,
//! `[END]` closes it. A region left open is closed by the next opening
//! marker or by the end of input. Only an `[END]` with nothing open is an error.
//! Inside content, lines starting with `- `, `* ` or `• ` are bullet items and
//! `**` toggles bold. Text without any marker is split into paragraphs.

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::content::{ContentBlock, TextSpan};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagParseError {
    #[error("[END] at byte {offset} closes no open region")]
    UnmatchedClose { offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Heading,
    Subheading,
    Content,
}

impl Region {
    fn marker(self) -> &'static str {
        match self {
            Region::Heading => "[HEADING]",
            Region::Subheading => "[SUBHEADING]",
            Region::Content => "[CONTENT]",
        }
    }
}

const END_MARKER: &str = "[END]";
const BULLET_PREFIXES: [&str; 3] = ["- ", "* ", "• "];
const BOLD_DELIMITER: &str = "**";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Open(Region, usize),
    Close(usize),
}

fn marker_at(input: &str, at: usize) -> Option<(Token<'static>, usize)> {
    let rest = &input[at..];
    for region in [Region::Heading, Region::Subheading, Region::Content] {
        if rest.starts_with(region.marker()) {
            return Some((Token::Open(region, at), region.marker().len()));
        }
    }
    rest.starts_with(END_MARKER)
        .then_some((Token::Close(at), END_MARKER.len()))
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut search = 0;
    while let Some(pos) = input[search..].find('[') {
        let at = search + pos;
        match marker_at(input, at) {
            Some((token, len)) => {
                if at > text_start {
                    tokens.push(Token::Text(&input[text_start..at]));
                }
                tokens.push(token);
                search = at + len;
                text_start = search;
            }
            None => search = at + 1,
        }
    }
    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

/// True when `input` contains at least one region marker.
pub fn has_markers(input: &str) -> bool {
    tokenize(input)
        .iter()
        .any(|t| !matches!(t, Token::Text(_)))
}

/// Strict parse of a tagged stream.
pub fn parse_tagged(input: &str) -> Result<Vec<ContentBlock>, TagParseError> {
    let mut blocks = Vec::new();
    let mut open: Option<(Region, String)> = None;

    for token in tokenize(input) {
        match token {
            Token::Text(text) => match open.as_mut() {
                Some((_, buffer)) => buffer.push_str(text),
                None => blocks.extend(parse_body(text)),
            },
            Token::Open(region, offset) => {
                if let Some((previous, buffer)) = open.take() {
                    debug!(
                        closed = previous.marker(),
                        opened = region.marker(),
                        offset,
                        "closing region implicitly at next marker"
                    );
                    blocks.extend(close_region(previous, &buffer));
                }
                open = Some((region, String::new()));
            }
            Token::Close(offset) => {
                let (region, buffer) = open.take().ok_or(TagParseError::UnmatchedClose { offset })?;
                blocks.extend(close_region(region, &buffer));
            }
        }
    }

    if let Some((region, buffer)) = open {
        debug!(marker = region.marker(), "closing region implicitly at end of stream");
        blocks.extend(close_region(region, &buffer));
    }
    Ok(blocks)
}

/// Parses generator output into blocks, never failing.
///
/// Untagged text becomes paragraphs. A stream with a stray `[END]` is logged
/// and rendered as one paragraph holding the whole payload with markers removed.
pub fn parse_blocks(input: &str) -> Vec<ContentBlock> {
    if !has_markers(input) {
        return untagged_paragraphs(input);
    }
    match parse_tagged(input) {
        Ok(blocks) => blocks,
        Err(err) => {
            warn!(error = %err, "malformed tag stream, rendering payload as one paragraph");
            let text: String = tokenize(input)
                .into_iter()
                .filter_map(|t| match t {
                    Token::Text(text) => Some(text),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" ");
            let text = collapse_whitespace(&strip_bold(&text));
            if text.is_empty() {
                Vec::new()
            } else {
                vec![ContentBlock::Paragraph(text)]
            }
        }
    }
}

fn close_region(region: Region, buffer: &str) -> Vec<ContentBlock> {
    match region {
        Region::Content => parse_body(buffer),
        Region::Heading | Region::Subheading => {
            let text = collapse_whitespace(&strip_bold(buffer));
            if text.is_empty() {
                return Vec::new();
            }
            vec![if region == Region::Heading {
                ContentBlock::Heading(text)
            } else {
                ContentBlock::Subheading(text)
            }]
        }
    }
}

/// Content body: bullet lines and blank-line separated paragraphs.
fn parse_body(text: &str) -> Vec<ContentBlock> {
    enum Pending {
        None,
        Paragraph(String),
        Bullet(String),
    }

    fn flush(pending: &mut Pending, blocks: &mut Vec<ContentBlock>) {
        match std::mem::replace(pending, Pending::None) {
            Pending::None => {}
            Pending::Paragraph(text) => {
                let text = collapse_whitespace(&strip_bold(&text));
                if !text.is_empty() {
                    blocks.push(ContentBlock::Paragraph(text));
                }
            }
            Pending::Bullet(text) => {
                let spans = parse_emphasis(&text);
                if !spans.is_empty() {
                    blocks.push(ContentBlock::BulletItem(spans));
                }
            }
        }
    }

    let mut blocks = Vec::new();
    let mut pending = Pending::None;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut pending, &mut blocks);
            continue;
        }
        if let Some(item) = BULLET_PREFIXES
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix))
        {
            flush(&mut pending, &mut blocks);
            pending = Pending::Bullet(item.to_string());
            continue;
        }
        match &mut pending {
            Pending::None => pending = Pending::Paragraph(trimmed.to_string()),
            Pending::Paragraph(text) | Pending::Bullet(text) => {
                text.push(' ');
                text.push_str(trimmed);
            }
        }
    }
    flush(&mut pending, &mut blocks);
    blocks
}

/// Splits on `**`, alternating plain and bold. An unclosed bold run extends to the end.
pub fn parse_emphasis(text: &str) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    for (i, part) in text.split(BOLD_DELIMITER).enumerate() {
        let part = collapse_inner(part);
        if part.trim().is_empty() && !part.is_empty() && !spans.is_empty() {
            // Keep the word boundary between two runs.
            spans.push(TextSpan::plain(" "));
            continue;
        }
        if part.is_empty() {
            continue;
        }
        spans.push(TextSpan {
            text: part,
            bold: i % 2 == 1,
        });
    }
    if spans.iter().all(|s| s.text.trim().is_empty()) {
        return Vec::new();
    }
    spans
}

fn untagged_paragraphs(input: &str) -> Vec<ContentBlock> {
    input
        .split("\n\n")
        .map(|chunk| collapse_whitespace(&strip_bold(chunk)))
        .filter(|text| !text.is_empty())
        .map(ContentBlock::Paragraph)
        .collect()
}

fn strip_bold(text: &str) -> String {
    text.replace(BOLD_DELIMITER, "")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses internal whitespace runs to single spaces but keeps one leading
/// or trailing space, which marks a word boundary with the neighbouring span.
fn collapse_inner(text: &str) -> String {
    let core = collapse_whitespace(text);
    if core.is_empty() {
        return if text.is_empty() { String::new() } else { " ".to_string() };
    }
    let lead = if text.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if text.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{core}{trail}")
}
