//! Block renderer: headings, sub-headings, bullet items and paragraphs.

use crate::layout::cursor::PageWriter;
use crate::layout::font_metrics::FontStyle;
use crate::layout::text::{wrap_spans, Line};
use crate::layout::{ACCENT, INK};
use crate::models::content::{ContentBlock, TextSpan};

const BULLET_GLYPH: &str = "•";

/// Renders `blocks` in order from the current cursor. Returns the final `y`.
pub fn render_blocks(writer: &mut PageWriter<'_>, blocks: &[ContentBlock]) -> f32 {
    for block in blocks {
        render_block(writer, block);
    }
    writer.cursor().y
}

pub fn render_block(writer: &mut PageWriter<'_>, block: &ContentBlock) {
    if block.is_blank() {
        return;
    }
    let config = writer.config().clone();
    match block {
        ContentBlock::Heading(text) => render_heading(writer, text, config.heading_size),
        ContentBlock::Subheading(text) => render_heading(writer, text, config.subheading_size),
        ContentBlock::BulletItem(spans) => {
            render_flow(writer, spans, config.bullet_indent, true);
            writer.skip(config.paragraph_gap / 2.0);
        }
        ContentBlock::Paragraph(text) => {
            render_flow(writer, &[TextSpan::plain(text.as_str())], 0.0, false);
            writer.skip(config.paragraph_gap);
        }
    }
}

/// Baseline for text of `size` vertically centred in a band of `advance` starting at `top`.
pub(crate) fn baseline_in(top: f32, advance: f32, size: f32) -> f32 {
    top + (advance - size) / 2.0 + size * 0.8
}

/// Bold, centred, wrapped at the usable width. Kept on one page when it fits.
fn render_heading(writer: &mut PageWriter<'_>, text: &str, size: f32) {
    let width = writer.usable_width();
    let left = writer.left();
    let line_advance = writer.config().line_height * 1.1;
    let gap = writer.config().heading_gap;

    let lines = wrap_lines(writer, &[TextSpan::bold(text)], width, size);
    writer.ensure_room(line_advance * lines.len() as f32);

    for line in &lines {
        writer.ensure_room(line_advance);
        let x = left + (width - line.width).max(0.0) / 2.0;
        let baseline = baseline_in(writer.cursor().y, line_advance, size);
        draw_line(writer, line, x, baseline, size);
        writer.advance(line_advance);
    }
    writer.skip(gap);
}

/// Wrapped body text. Each wrapped line is overflow-checked on its own, so a
/// long item may continue on the next page.
fn render_flow(writer: &mut PageWriter<'_>, spans: &[TextSpan], indent: f32, bullet: bool) {
    let size = writer.config().body_size;
    let line_height = writer.config().line_height;
    let left = writer.left();
    let width = writer.usable_width() - indent;

    let lines = wrap_lines(writer, spans, width, size);
    for (i, line) in lines.iter().enumerate() {
        writer.ensure_room(line_height);
        let baseline = baseline_in(writer.cursor().y, line_height, size);
        if bullet && i == 0 {
            writer
                .surface()
                .draw_text(BULLET_GLYPH, left, baseline, FontStyle::Bold, size, ACCENT);
        }
        draw_line(writer, line, left + indent, baseline, size);
        writer.advance(line_height);
    }
}

fn wrap_lines(writer: &PageWriter<'_>, spans: &[TextSpan], width: f32, size: f32) -> Vec<Line> {
    let measure = |text: &str, style: FontStyle| writer.measure(text, style, size);
    wrap_spans(spans, width, &measure)
}

fn draw_line(writer: &mut PageWriter<'_>, line: &Line, x: f32, baseline: f32, size: f32) {
    let surface = writer.surface();
    for fragment in &line.fragments {
        surface.draw_text(
            &fragment.text,
            x + fragment.x_offset,
            baseline,
            fragment.style,
            size,
            INK,
        );
    }
}
