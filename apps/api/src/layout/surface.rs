//! Rendering surface abstraction.
//!
//! The layout engine never touches a concrete document format. It issues
//! append-only drawing calls against a `Surface`, in a top-left coordinate
//! space where `y` grows downward. Backends translate to their own space.

use std::ops::Range;

use serde::Serialize;
use thiserror::Error;

use crate::layout::font_metrics::{get_metrics, FontStyle};

/// RGB colour with components in 0.0..=1.0.
pub type Color = [f32; 3];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// A raster image decoded to 8-bit RGB plus an optional 8-bit alpha plane.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("page reordering is not supported by this surface")]
    ReorderUnsupported,

    #[error("page range {start}..{end} (target {target}) is out of bounds for {count} pages")]
    PageRange {
        start: usize,
        end: usize,
        target: usize,
        count: usize,
    },

    #[error("document has no pages")]
    Empty,
}

/// Primitive drawing operations the composition engine depends on.
///
/// Drawing always targets the most recently added page. Link targets and
/// `move_pages` positions refer to positions in the final page order.
pub trait Surface {
    /// Appends a page and makes it the drawing target. Returns its position.
    fn add_page(&mut self) -> usize;

    fn page_count(&self) -> usize;

    fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        baseline: f32,
        style: FontStyle,
        size: f32,
        color: Color,
    );

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f32);

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, line_width: f32);

    fn draw_image(&mut self, image: &DecodedImage, rect: Rect);

    /// Width of `text` in points.
    fn measure_text(&self, text: &str, style: FontStyle, size: f32) -> f32 {
        get_metrics(style).width_pt(text, size)
    }

    /// Adds a clickable region jumping to a named anchor.
    /// Returns false when the surface cannot express anchor links.
    fn link_to_anchor(&mut self, _rect: Rect, _anchor: &str) -> bool {
        false
    }

    fn link_to_page(&mut self, rect: Rect, page: usize);

    fn supports_reorder(&self) -> bool {
        false
    }

    /// Moves the pages at `range` so that they start at position `to`.
    fn move_pages(&mut self, _range: Range<usize>, _to: usize) -> Result<(), SurfaceError> {
        Err(SurfaceError::ReorderUnsupported)
    }
}

/// Applies a page move to an order vector. Shared by the surfaces that support reordering.
pub(crate) fn reorder(
    order: &mut Vec<usize>,
    range: Range<usize>,
    to: usize,
) -> Result<(), SurfaceError> {
    let count = order.len();
    if range.start > range.end || range.end > count || to > count - range.len() {
        return Err(SurfaceError::PageRange {
            start: range.start,
            end: range.end,
            target: to,
            count,
        });
    }
    let moved: Vec<usize> = order.drain(range).collect();
    for (offset, page) in moved.into_iter().enumerate() {
        order.insert(to + offset, page);
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Recording surface
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LinkTarget {
    Anchor(String),
    Page(usize),
}

/// One recorded drawing call. `page` is the creation index of the page it landed on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DrawOp {
    Text {
        page: usize,
        text: String,
        x: f32,
        baseline: f32,
        style: FontStyle,
        size: f32,
    },
    FillRect {
        page: usize,
        rect: Rect,
        color: Color,
    },
    StrokeRect {
        page: usize,
        rect: Rect,
    },
    Line {
        page: usize,
        from: (f32, f32),
        to: (f32, f32),
    },
    Image {
        page: usize,
        rect: Rect,
    },
    Link {
        page: usize,
        rect: Rect,
        target: LinkTarget,
    },
}

impl DrawOp {
    pub fn page(&self) -> usize {
        match self {
            DrawOp::Text { page, .. }
            | DrawOp::FillRect { page, .. }
            | DrawOp::StrokeRect { page, .. }
            | DrawOp::Line { page, .. }
            | DrawOp::Image { page, .. }
            | DrawOp::Link { page, .. } => *page,
        }
    }
}

/// Surface that keeps a log of drawing calls instead of producing a file.
///
/// With recording disabled (`dry`) it only counts pages and measures text,
/// which is what the first pass of the two-pass pipeline needs.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    record: bool,
    anchor_links: bool,
    reorderable: bool,
    order: Vec<usize>,
    current: usize,
    ops: Vec<DrawOp>,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            record: true,
            anchor_links: true,
            reorderable: true,
            order: Vec::new(),
            current: 0,
            ops: Vec::new(),
        }
    }

    /// Height accounting only: pages are counted, nothing is stored.
    pub fn dry() -> Self {
        Self {
            record: false,
            ..Self::new()
        }
    }

    pub fn without_anchor_links(mut self) -> Self {
        self.anchor_links = false;
        self
    }

    pub fn without_reorder(mut self) -> Self {
        self.reorderable = false;
        self
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Creation indices of the pages in document order.
    pub fn page_order(&self) -> &[usize] {
        &self.order
    }

    /// Text runs drawn on the page created at `page`, in drawing order.
    pub fn texts_on_page(&self, page: usize) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { page: p, text, .. } if *p == page => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn push(&mut self, op: DrawOp) {
        if self.record {
            self.ops.push(op);
        }
    }
}

impl Surface for RecordingSurface {
    fn add_page(&mut self) -> usize {
        let id = self.order.len();
        self.order.push(id);
        self.current = id;
        id
    }

    fn page_count(&self) -> usize {
        self.order.len()
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        baseline: f32,
        style: FontStyle,
        size: f32,
        _color: Color,
    ) {
        self.push(DrawOp::Text {
            page: self.current,
            text: text.to_string(),
            x,
            baseline,
            style,
            size,
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.push(DrawOp::FillRect {
            page: self.current,
            rect,
            color,
        });
    }

    fn stroke_rect(&mut self, rect: Rect, _color: Color, _line_width: f32) {
        self.push(DrawOp::StrokeRect {
            page: self.current,
            rect,
        });
    }

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), _color: Color, _line_width: f32) {
        self.push(DrawOp::Line {
            page: self.current,
            from,
            to,
        });
    }

    fn draw_image(&mut self, _image: &DecodedImage, rect: Rect) {
        self.push(DrawOp::Image {
            page: self.current,
            rect,
        });
    }

    fn link_to_anchor(&mut self, rect: Rect, anchor: &str) -> bool {
        if !self.anchor_links {
            return false;
        }
        self.push(DrawOp::Link {
            page: self.current,
            rect,
            target: LinkTarget::Anchor(anchor.to_string()),
        });
        true
    }

    fn link_to_page(&mut self, rect: Rect, page: usize) {
        self.push(DrawOp::Link {
            page: self.current,
            rect,
            target: LinkTarget::Page(page),
        });
    }

    fn supports_reorder(&self) -> bool {
        self.reorderable
    }

    fn move_pages(&mut self, range: Range<usize>, to: usize) -> Result<(), SurfaceError> {
        if !self.reorderable {
            return Err(SurfaceError::ReorderUnsupported);
        }
        reorder(&mut self.order, range, to)
    }
}
