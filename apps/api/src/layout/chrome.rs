//! Repeating page decoration: border, corner ornaments, header band, footer.

use crate::layout::cursor::PageKind;
use crate::layout::font_metrics::{FontStyle, PageConfig};
use crate::layout::surface::{Color, Rect, Surface};
use crate::layout::{ACCENT, MUTED, RULE};

const HEADER_SIZE: f32 = 9.0;
const FOOTER_SIZE: f32 = 8.0;
const CORNER_TICK: f32 = 18.0;

/// Chrome drawn on every content page before any content renderer runs.
#[derive(Debug, Clone)]
pub struct Chrome {
    /// Left-hand footer text, usually the report title.
    pub footer_text: String,
    pub border: Color,
    pub accent: Color,
}

impl Default for Chrome {
    fn default() -> Self {
        Self {
            footer_text: String::new(),
            border: RULE,
            accent: ACCENT,
        }
    }
}

impl Chrome {
    pub fn new(footer_text: impl Into<String>) -> Self {
        Self {
            footer_text: footer_text.into(),
            ..Self::default()
        }
    }

    /// Decorates the page at `page_index`. The cover page gets nothing.
    pub fn decorate(
        &self,
        surface: &mut dyn Surface,
        config: &PageConfig,
        page_index: usize,
        kind: PageKind,
        running_header: Option<&str>,
    ) {
        if kind == PageKind::Cover {
            return;
        }

        let inset = config.margin / 2.0;
        let frame = Rect::new(
            inset,
            inset,
            config.page_width - 2.0 * inset,
            config.page_height - 2.0 * inset,
        );
        surface.stroke_rect(frame, self.border, 0.75);

        match kind {
            PageKind::SectionOpening { ornate: true } => self.draw_ornaments(surface, config, frame),
            PageKind::Continuation => {
                if let Some(header) = running_header.filter(|h| !h.trim().is_empty()) {
                    let width = surface.measure_text(header, FontStyle::Regular, HEADER_SIZE);
                    let x = config.page_width - config.margin - width;
                    let baseline = config.margin + config.title_reserve - HEADER_SIZE;
                    surface.draw_text(header, x, baseline, FontStyle::Regular, HEADER_SIZE, MUTED);
                }
            }
            _ => {}
        }

        if page_index > 0 {
            self.draw_footer(surface, config, page_index);
        }
    }

    fn draw_ornaments(&self, surface: &mut dyn Surface, config: &PageConfig, frame: Rect) {
        // Filled panel across the top margin band.
        let panel = Rect::new(
            frame.x,
            frame.y,
            frame.width,
            (config.margin - frame.y) * 0.6,
        );
        surface.fill_rect(panel, self.accent);

        let (left, right) = (frame.x + 4.0, frame.x + frame.width - 4.0);
        let (top, bottom) = (frame.y + 4.0, frame.bottom() - 4.0);
        for (x, y, dx, dy) in [
            (left, top, 1.0, 1.0),
            (right, top, -1.0, 1.0),
            (left, bottom, 1.0, -1.0),
            (right, bottom, -1.0, -1.0),
        ] {
            surface.draw_line((x, y), (x + dx * CORNER_TICK, y), self.accent, 1.5);
            surface.draw_line((x, y), (x, y + dy * CORNER_TICK), self.accent, 1.5);
        }
    }

    fn draw_footer(&self, surface: &mut dyn Surface, config: &PageConfig, page_index: usize) {
        let rule_y = config.bottom_limit() + config.margin * 0.2;
        let baseline = rule_y + FOOTER_SIZE + 3.0;
        let right = config.page_width - config.margin;

        surface.draw_line((config.margin, rule_y), (right, rule_y), self.border, 0.5);
        if !self.footer_text.is_empty() {
            surface.draw_text(
                &self.footer_text,
                config.margin,
                baseline,
                FontStyle::Regular,
                FOOTER_SIZE,
                MUTED,
            );
        }
        let number = format!("Page {}", page_index + 1);
        let width = surface.measure_text(&number, FontStyle::Regular, FOOTER_SIZE);
        surface.draw_text(
            &number,
            right - width,
            baseline,
            FontStyle::Regular,
            FOOTER_SIZE,
            MUTED,
        );
    }
}
