//! Page cursor and break manager.
//!
//! Every renderer draws through a `PageWriter`, which owns the cursor and the
//! only path to a new page. The invariant `margin <= y <= bottom_limit` holds
//! after every call: renderers ask `ensure_room` before drawing, and a page
//! break resets `y` to the top of the content band.

use tracing::{debug, warn};

use crate::layout::chrome::Chrome;
use crate::layout::font_metrics::{FontStyle, PageConfig};
use crate::layout::surface::Surface;

/// What kind of page a break opens. Drives the chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Cover,
    SectionOpening { ornate: bool },
    Continuation,
    Contents,
}

/// Current write position on the current page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCursor {
    pub page_index: usize,
    pub y: f32,
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub bottom_limit: f32,
    top: f32,
}

impl PageCursor {
    pub fn new(config: &PageConfig) -> Self {
        Self {
            page_index: 0,
            y: config.content_top(),
            page_width: config.page_width,
            page_height: config.page_height,
            margin: config.margin,
            bottom_limit: config.bottom_limit(),
            top: config.content_top(),
        }
    }

    /// True iff `y + height > bottom_limit`.
    pub fn would_overflow(&self, height: f32) -> bool {
        self.y + height > self.bottom_limit
    }

    /// Moves down by `height`. The caller has already checked `would_overflow`.
    pub fn advance(&mut self, height: f32) {
        if self.would_overflow(height) {
            // Only reachable for an item taller than an empty page.
            warn!(
                page = self.page_index,
                height, "item exceeds page capacity, clamping to bottom limit"
            );
        }
        self.y = (self.y + height).min(self.bottom_limit);
    }

    /// Moves down by a spacing gap, stopping at the bottom limit.
    pub fn skip(&mut self, gap: f32) {
        self.y = (self.y + gap).min(self.bottom_limit);
    }

    pub fn at_page_top(&self) -> bool {
        (self.y - self.top).abs() < 0.01
    }

    /// Vertical space left on an empty page.
    pub fn page_capacity(&self) -> f32 {
        self.bottom_limit - self.top
    }

    fn reset(&mut self, page_index: usize) {
        self.page_index = page_index;
        self.y = self.top;
    }
}

/// Cursor, chrome and surface bundled for the renderers of one composition call.
pub struct PageWriter<'a> {
    surface: &'a mut dyn Surface,
    config: &'a PageConfig,
    chrome: &'a Chrome,
    cursor: PageCursor,
    running_header: Option<String>,
    number_shift: isize,
}

impl<'a> PageWriter<'a> {
    pub fn new(surface: &'a mut dyn Surface, config: &'a PageConfig, chrome: &'a Chrome) -> Self {
        Self {
            surface,
            config,
            chrome,
            cursor: PageCursor::new(config),
            running_header: None,
            number_shift: 0,
        }
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut PageCursor {
        &mut self.cursor
    }

    pub fn config(&self) -> &PageConfig {
        self.config
    }

    pub fn surface(&mut self) -> &mut dyn Surface {
        &mut *self.surface
    }

    pub fn page_count(&self) -> usize {
        self.surface.page_count()
    }

    pub fn left(&self) -> f32 {
        self.config.margin
    }

    pub fn usable_width(&self) -> f32 {
        self.config.usable_width()
    }

    pub fn measure(&self, text: &str, style: FontStyle, size: f32) -> f32 {
        self.surface.measure_text(text, style, size)
    }

    /// Text shown in the header band of continuation pages.
    pub fn set_running_header(&mut self, header: Option<String>) {
        self.running_header = header;
    }

    /// Offset between the creation index of pages opened from now on and the
    /// position they will hold once the document is reordered. Only the
    /// footer number sees it.
    pub fn set_page_number_shift(&mut self, shift: isize) {
        self.number_shift = shift;
    }

    /// Opens a new page, resets `y` to the content top and draws the chrome.
    pub fn break_page(&mut self, kind: PageKind) -> usize {
        let index = self.surface.add_page();
        self.cursor.reset(index);
        let position = index.saturating_add_signed(self.number_shift);
        self.chrome.decorate(
            &mut *self.surface,
            self.config,
            position,
            kind,
            self.running_header.as_deref(),
        );
        debug!(page = index, position, ?kind, "page break");
        index
    }

    /// Breaks to a continuation page when `height` does not fit.
    ///
    /// A fresh page is never broken again: content taller than a whole page is
    /// drawn from the top and clamped by `advance`. Returns true if it broke.
    pub fn ensure_room(&mut self, height: f32) -> bool {
        if self.cursor.would_overflow(height) && !self.cursor.at_page_top() {
            self.break_page(PageKind::Continuation);
            true
        } else {
            false
        }
    }

    pub fn advance(&mut self, height: f32) {
        self.cursor.advance(height);
    }

    pub fn skip(&mut self, gap: f32) {
        self.cursor.skip(gap);
    }
}
