//! Greedy word wrapping over styled spans.
//!
//! Lines are built word by word against a measuring closure, so the same
//! code serves the dry pass and the real pass. Spans flow into each other on
//! one visual line; a space is only inserted where the source text had
//! whitespace, so `**Mars**,` renders as `Mars,` and not `Mars ,`.

use crate::layout::font_metrics::FontStyle;
use crate::models::content::TextSpan;

/// A run of one style on one line, positioned relative to the line start.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub style: FontStyle,
    pub x_offset: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line {
    pub fragments: Vec<Fragment>,
    pub width: f32,
}

impl Line {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }
}

struct Word<'a> {
    text: &'a str,
    style: FontStyle,
    space_before: bool,
}

fn split_words(spans: &[TextSpan]) -> Vec<Word<'_>> {
    let mut words = Vec::new();
    let mut pending_space = false;
    for span in spans {
        if span.text.is_empty() {
            continue;
        }
        let style = if span.bold {
            FontStyle::Bold
        } else {
            FontStyle::Regular
        };
        let leading = span.text.starts_with(char::is_whitespace);
        for (i, text) in span.text.split_whitespace().enumerate() {
            words.push(Word {
                text,
                style,
                space_before: i > 0 || leading || pending_space,
            });
        }
        pending_space = span.text.ends_with(char::is_whitespace)
            || (span.text.trim().is_empty() && !span.text.is_empty());
    }
    words
}

struct LineBuilder<'m, M: Fn(&str, FontStyle) -> f32> {
    measure: &'m M,
    max_width: f32,
    lines: Vec<Line>,
    current: Line,
}

impl<'m, M: Fn(&str, FontStyle) -> f32> LineBuilder<'m, M> {
    fn finish_line(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(std::mem::take(&mut self.current));
        }
    }

    fn append(&mut self, text: &str, style: FontStyle, space: bool, width: f32) {
        let space_width = if space && !self.current.is_empty() {
            (self.measure)(" ", style)
        } else {
            0.0
        };
        match self.current.fragments.last_mut() {
            Some(last) if last.style == style => {
                if space_width > 0.0 {
                    last.text.push(' ');
                }
                last.text.push_str(text);
            }
            _ => self.current.fragments.push(Fragment {
                text: text.to_string(),
                style,
                x_offset: self.current.width + space_width,
            }),
        }
        self.current.width += space_width + width;
    }

    fn push_word(&mut self, word: &Word<'_>) {
        let width = (self.measure)(word.text, word.style);
        let space_width = if word.space_before && !self.current.is_empty() {
            (self.measure)(" ", word.style)
        } else {
            0.0
        };

        if !self.current.is_empty() && self.current.width + space_width + width > self.max_width {
            self.finish_line();
        }

        if width <= self.max_width {
            self.append(word.text, word.style, word.space_before, width);
            return;
        }

        // Longer than a whole line: hard-split by character.
        self.finish_line();
        let mut chunk = String::new();
        for c in word.text.chars() {
            chunk.push(c);
            if (self.measure)(&chunk, word.style) > self.max_width && chunk.chars().count() > 1 {
                chunk.pop();
                let chunk_width = (self.measure)(&chunk, word.style);
                self.append(&chunk, word.style, false, chunk_width);
                self.finish_line();
                chunk.clear();
                chunk.push(c);
            }
        }
        if !chunk.is_empty() {
            let chunk_width = (self.measure)(&chunk, word.style);
            self.append(&chunk, word.style, false, chunk_width);
        }
    }
}

/// Wraps `spans` into lines no wider than `max_width`.
///
/// `measure` returns the width in points of a string in the given style at
/// the caller's font size. Whitespace-only input yields no lines.
pub fn wrap_spans<M>(spans: &[TextSpan], max_width: f32, measure: &M) -> Vec<Line>
where
    M: Fn(&str, FontStyle) -> f32,
{
    let mut builder = LineBuilder {
        measure,
        max_width,
        lines: Vec::new(),
        current: Line::default(),
    };
    for word in split_words(spans) {
        builder.push_word(&word);
    }
    builder.finish_line();
    builder.lines
}

/// Truncates `text` with a trailing ellipsis so it measures at most `max_width`.
pub fn truncate_to_width<M>(text: &str, max_width: f32, measure: &M) -> String
where
    M: Fn(&str) -> f32,
{
    if measure(text) <= max_width {
        return text.to_string();
    }
    let mut out: String = text.to_string();
    while !out.is_empty() {
        out.pop();
        let candidate = format!("{}...", out.trim_end());
        if measure(&candidate) <= max_width {
            return candidate;
        }
    }
    String::new()
}
