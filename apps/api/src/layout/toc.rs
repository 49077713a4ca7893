//! Section registry and table-of-contents builder.
//!
//! Sections move through `registered -> page bound`. A section's first page
//! is fixed the moment its opening page is created and never changes after.
//! The TOC is rendered once every section is bound.

use std::ops::Range;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::layout::blocks::{baseline_in, render_block};
use crate::layout::chrome::Chrome;
use crate::layout::cursor::{PageKind, PageWriter};
use crate::layout::font_metrics::{FontStyle, PageConfig};
use crate::layout::surface::{RecordingSurface, Rect, Surface};
use crate::layout::text::truncate_to_width;
use crate::layout::{INK, MUTED};
use crate::models::content::ContentBlock;

pub const TOC_TITLE: &str = "Table of Contents";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no registered section is waiting for its first page")]
    NoPendingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionEntry {
    pub title: String,
    pub anchor: String,
    pub first_page: Option<usize>,
    pub toc_label: String,
}

/// One line of the rendered TOC. `page` is a 0-based position in the final document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocRow {
    pub label: String,
    pub anchor: String,
    pub page: usize,
}

/// Per-composition record of every section, owned by a single composition call.
#[derive(Debug, Default, Clone)]
pub struct SectionRegistry {
    entries: Vec<SectionEntry>,
    pending: Option<usize>,
}

/// Lowercase ASCII alphanumeric words joined by `-`.
pub fn slugify(title: &str) -> String {
    let slug = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a section and returns its anchor.
    ///
    /// A title whose anchor already exists updates that entry's label instead
    /// of creating a second entry.
    pub fn start_section(&mut self, title: &str, toc_label: Option<&str>) -> String {
        let anchor = slugify(title);
        let label = toc_label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(title)
            .to_string();

        match self.entries.iter().position(|e| e.anchor == anchor) {
            Some(index) => {
                self.entries[index].toc_label = label;
                self.pending = self.entries[index].first_page.is_none().then_some(index);
                debug!(anchor = %anchor, "section re-registered, label updated");
            }
            None => {
                self.entries.push(SectionEntry {
                    title: title.to_string(),
                    anchor: anchor.clone(),
                    first_page: None,
                    toc_label: label,
                });
                self.pending = Some(self.entries.len() - 1);
            }
        }
        anchor
    }

    /// Binds `page` to the most recently registered, still unbound section.
    pub fn mark_section_page(&mut self, page: usize) -> Result<(), RegistryError> {
        let index = self.pending.take().ok_or(RegistryError::NoPendingSection)?;
        let entry = &mut self.entries[index];
        if entry.first_page.is_none() {
            entry.first_page = Some(page);
        }
        Ok(())
    }

    pub fn entries(&self) -> &[SectionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bound entries sorted by first page, each page shifted by `offset`.
    pub fn toc_rows(&self, offset: usize) -> Vec<TocRow> {
        let mut rows: Vec<TocRow> = self
            .entries
            .iter()
            .filter_map(|e| {
                e.first_page.map(|page| TocRow {
                    label: e.toc_label.clone(),
                    anchor: e.anchor.clone(),
                    page: page + offset,
                })
            })
            .collect();
        rows.sort_by_key(|r| r.page);
        rows
    }
}

/// Renders the TOC on fresh `Contents` pages, repeating the title on each.
/// Returns the range of page positions it occupied.
pub fn render_toc(writer: &mut PageWriter<'_>, rows: &[TocRow]) -> Range<usize> {
    let first = writer.page_count();
    open_toc_page(writer);

    let line_height = writer.config().line_height;
    let size = writer.config().body_size;
    for row in rows {
        if writer.cursor().would_overflow(line_height) {
            open_toc_page(writer);
        }
        draw_row(writer, row, line_height, size);
    }

    let range = first..writer.page_count();
    debug!(rows = rows.len(), pages = range.len(), "table of contents rendered");
    range
}

fn open_toc_page(writer: &mut PageWriter<'_>) {
    writer.break_page(PageKind::Contents);
    render_block(writer, &ContentBlock::Heading(TOC_TITLE.to_string()));
}

fn draw_row(writer: &mut PageWriter<'_>, row: &TocRow, line_height: f32, size: f32) {
    let left = writer.left();
    let right = left + writer.usable_width();
    let y = writer.cursor().y;
    let baseline = baseline_in(y, line_height, size);

    let number = (row.page + 1).to_string();
    let number_width = writer.measure(&number, FontStyle::Regular, size);
    let dot_width = writer.measure(".", FontStyle::Regular, size);
    let label_room = (writer.usable_width() - number_width - 6.0 * dot_width).max(0.0);
    let label = {
        let measure = |text: &str| writer.measure(text, FontStyle::Regular, size);
        truncate_to_width(&row.label, label_room, &measure)
    };
    let label_width = writer.measure(&label, FontStyle::Regular, size);

    let leader_start = left + label_width + dot_width;
    let leader_end = right - number_width - dot_width;
    let dots = ((leader_end - leader_start) / dot_width).floor().max(0.0) as usize;

    let surface = writer.surface();
    surface.draw_text(&label, left, baseline, FontStyle::Regular, size, INK);
    if dots > 0 {
        surface.draw_text(
            &".".repeat(dots),
            leader_start,
            baseline,
            FontStyle::Regular,
            size,
            MUTED,
        );
    }
    surface.draw_text(
        &number,
        right - number_width,
        baseline,
        FontStyle::Regular,
        size,
        INK,
    );

    let hotspot = Rect::new(left, y, right - left, line_height);
    if !surface.link_to_anchor(hotspot, &row.anchor) {
        surface.link_to_page(hotspot, row.page);
    }
    writer.advance(line_height);
}

/// Number of pages the TOC for `rows` occupies, measured on a dry surface.
pub fn count_toc_pages(config: &PageConfig, chrome: &Chrome, rows: &[TocRow]) -> usize {
    let mut surface = RecordingSurface::dry();
    let mut writer = PageWriter::new(&mut surface, config, chrome);
    render_toc(&mut writer, rows).len()
}

/// Moves already rendered TOC pages to `to`. Best effort: returns false and
/// leaves the pages where they are when the surface cannot reorder.
pub fn relocate_toc(surface: &mut dyn Surface, toc: Range<usize>, to: usize) -> bool {
    if !surface.supports_reorder() {
        warn!(?toc, "surface cannot reorder pages, table of contents left in place");
        return false;
    }
    match surface.move_pages(toc.clone(), to) {
        Ok(()) => true,
        Err(err) => {
            warn!(?toc, error = %err, "table of contents relocation failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::font_metrics::default_page_config;
    use crate::layout::surface::{DrawOp, LinkTarget};

    fn rows(count: usize) -> Vec<TocRow> {
        (0..count)
            .map(|i| TocRow {
                label: format!("House {}", i + 1),
                anchor: format!("house-{}", i + 1),
                page: i + 2,
            })
            .collect()
    }

    #[test]
    fn test_slugify_titles() {
        assert_eq!(slugify("Sun in Leo"), "sun-in-leo");
        assert_eq!(slugify("  Mars & Venus: 7th House!  "), "mars-venus-7th-house");
        assert_eq!(slugify("***"), "section");
    }

    #[test]
    fn test_sections_bind_in_sequence() {
        let mut registry = SectionRegistry::new();
        registry.start_section("Introduction", None);
        registry.mark_section_page(1).unwrap();
        registry.start_section("Planets", Some("The Planets"));
        registry.mark_section_page(3).unwrap();

        assert_eq!(registry.entries()[0].first_page, Some(1));
        assert_eq!(registry.entries()[1].toc_label, "The Planets");
        assert_eq!(
            registry.mark_section_page(9),
            Err(RegistryError::NoPendingSection)
        );
        assert_eq!(registry.entries()[1].first_page, Some(3));
    }

    #[test]
    fn test_duplicate_title_updates_label_without_rebinding() {
        let mut registry = SectionRegistry::new();
        registry.start_section("Houses", None);
        registry.mark_section_page(2).unwrap();
        let anchor = registry.start_section("Houses", Some("Houses (cont.)"));

        assert_eq!(anchor, "houses");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].toc_label, "Houses (cont.)");
        assert!(registry.mark_section_page(7).is_err());
        assert_eq!(registry.entries()[0].first_page, Some(2));
    }

    #[test]
    fn test_toc_rows_sorted_and_skip_unbound() {
        let mut registry = SectionRegistry::new();
        registry.start_section("Late", None);
        registry.mark_section_page(8).unwrap();
        registry.start_section("Early", None);
        registry.mark_section_page(2).unwrap();
        registry.start_section("Never drawn", None);

        let rows = registry.toc_rows(1);
        let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Early", "Late"]);
        assert_eq!(rows[0].page, 3);
    }

    #[test]
    fn test_long_toc_repeats_title_on_each_page() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new();
        let range = {
            let mut writer = PageWriter::new(&mut surface, &config, &chrome);
            render_toc(&mut writer, &rows(80))
        };
        assert!(range.len() >= 3);
        for page in range.clone() {
            let titles = surface
                .texts_on_page(page)
                .into_iter()
                .filter(|t| *t == TOC_TITLE)
                .count();
            assert_eq!(titles, 1);
        }
        assert_eq!(count_toc_pages(&config, &chrome, &rows(80)), range.len());
        assert_eq!(count_toc_pages(&config, &chrome, &rows(3)), 1);
    }

    #[test]
    fn test_rows_show_one_based_page_numbers_and_anchor_links() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new();
        {
            let mut writer = PageWriter::new(&mut surface, &config, &chrome);
            render_toc(&mut writer, &rows(1));
        }
        let texts = surface.texts_on_page(0);
        assert!(texts.contains(&"House 1"));
        assert!(texts.contains(&"3"));
        assert!(surface.ops().iter().any(|op| matches!(
            op,
            DrawOp::Link { target: LinkTarget::Anchor(a), .. } if a == "house-1"
        )));
    }

    #[test]
    fn test_links_degrade_to_page_targets() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new().without_anchor_links();
        {
            let mut writer = PageWriter::new(&mut surface, &config, &chrome);
            render_toc(&mut writer, &rows(2));
        }
        let targets: Vec<&LinkTarget> = surface
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Link { target, .. } => Some(target),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec![&LinkTarget::Page(2), &LinkTarget::Page(3)]);
    }

    #[test]
    fn test_relocate_is_best_effort() {
        let mut fixed = RecordingSurface::new().without_reorder();
        for _ in 0..4 {
            fixed.add_page();
        }
        assert!(!relocate_toc(&mut fixed, 3..4, 1));
        assert_eq!(fixed.page_order(), &[0, 1, 2, 3]);

        let mut movable = RecordingSurface::new();
        for _ in 0..4 {
            movable.add_page();
        }
        assert!(relocate_toc(&mut movable, 3..4, 1));
        assert_eq!(movable.page_order(), &[0, 3, 1, 2]);
    }
}
