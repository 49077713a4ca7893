//! Page-spanning table renderer.
//!
//! The header row is redrawn at the top of every continuation page. Banding
//! is keyed on the row's index in the full row list, so shading does not
//! shift when a table breaks across pages.

use tracing::debug;

use crate::layout::blocks::{baseline_in, render_block};
use crate::layout::cursor::{PageKind, PageWriter};
use crate::layout::font_metrics::FontStyle;
use crate::layout::surface::{Color, Rect};
use crate::layout::text::truncate_to_width;
use crate::layout::{ACCENT, BAND, INK, RULE, WHITE};
use crate::models::content::{ColumnAlign, ContentBlock, TableSpec};

const CELL_PADDING: f32 = 6.0;

/// Even rows are shaded.
pub fn row_is_shaded(row_index: usize) -> bool {
    row_index % 2 == 0
}

/// Draws `table` from the current cursor and returns the final `y`.
///
/// An empty row list draws the header alone.
pub fn render_table(writer: &mut PageWriter<'_>, table: &TableSpec) -> f32 {
    if let Some(caption) = &table.caption {
        render_block(writer, &ContentBlock::Subheading(caption.clone()));
    }

    let row_height = writer.config().table_row_height;
    // Keep the header with at least one data row.
    let lead = if table.rows.is_empty() {
        row_height
    } else {
        2.0 * row_height
    };
    writer.ensure_room(lead);
    draw_header(writer, table);

    let mut rows_on_page = 0usize;
    let mut pages = 1usize;
    for (index, row) in table.rows.iter().enumerate() {
        let cap_reached = table
            .rows_per_page
            .is_some_and(|cap| cap > 0 && rows_on_page >= cap);
        if writer.cursor().would_overflow(row_height) || cap_reached {
            writer.break_page(PageKind::Continuation);
            draw_header(writer, table);
            rows_on_page = 0;
            pages += 1;
        }
        draw_row(writer, table, index, row, FontStyle::Regular);
        rows_on_page += 1;
    }

    debug!(rows = table.rows.len(), pages, "table rendered");
    writer.cursor().y
}

fn draw_header(writer: &mut PageWriter<'_>, table: &TableSpec) {
    let row_height = writer.config().table_row_height;
    let band = Rect::new(writer.left(), writer.cursor().y, writer.usable_width(), row_height);
    writer.surface().fill_rect(band, ACCENT);
    draw_cells(writer, table, &table.headers, FontStyle::Bold, WHITE);
    writer.advance(row_height);
}

fn draw_row(
    writer: &mut PageWriter<'_>,
    table: &TableSpec,
    index: usize,
    row: &[String],
    style: FontStyle,
) {
    let row_height = writer.config().table_row_height;
    let (left, y, width) = (writer.left(), writer.cursor().y, writer.usable_width());
    if row_is_shaded(index) {
        writer
            .surface()
            .fill_rect(Rect::new(left, y, width, row_height), BAND);
    }
    draw_cells(writer, table, row, style, INK);
    let bottom = y + row_height;
    writer
        .surface()
        .draw_line((left, bottom), (left + width, bottom), RULE, 0.3);
    writer.advance(row_height);
}

fn draw_cells(
    writer: &mut PageWriter<'_>,
    table: &TableSpec,
    cells: &[String],
    style: FontStyle,
    color: Color,
) {
    let size = writer.config().table_font_size;
    let row_height = writer.config().table_row_height;
    let column_width = writer.usable_width() / table.column_count() as f32;
    let inner = (column_width - 2.0 * CELL_PADDING).max(0.0);
    let baseline = baseline_in(writer.cursor().y, row_height, size);
    let left = writer.left();

    for (column, cell) in cells.iter().enumerate() {
        let measure = |text: &str| writer.measure(text, style, size);
        let text = truncate_to_width(cell.trim(), inner, &measure);
        if text.is_empty() {
            continue;
        }
        let cell_left = left + column as f32 * column_width;
        let x = match table.align(column) {
            ColumnAlign::Left => cell_left + CELL_PADDING,
            ColumnAlign::Right => cell_left + column_width - CELL_PADDING - measure(&text),
        };
        writer
            .surface()
            .draw_text(&text, x, baseline, style, size, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::chrome::Chrome;
    use crate::layout::font_metrics::default_page_config;
    use crate::layout::surface::{DrawOp, RecordingSurface, Surface};

    fn planets_table(rows: usize) -> TableSpec {
        TableSpec {
            caption: None,
            headers: vec!["Planet".into(), "Sign".into(), "Degree".into()],
            rows: (0..rows)
                .map(|i| vec![format!("P{i}"), "Leo".to_string(), format!("{i}.5")])
                .collect(),
            column_align: vec![ColumnAlign::Left, ColumnAlign::Left, ColumnAlign::Right],
            rows_per_page: None,
        }
    }

    /// Pages (by creation index) each text appears on, in drawing order.
    fn text_pages(surface: &RecordingSurface) -> Vec<(String, usize)> {
        surface
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, page, .. } if !text.starts_with("Page ") => {
                    Some((text.clone(), *page))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_nine_rows_at_five_per_page_span_two_pages() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new();
        let mut table = planets_table(9);
        table.rows_per_page = Some(5);
        {
            let mut writer = PageWriter::new(&mut surface, &config, &chrome);
            writer.break_page(PageKind::Continuation);
            render_table(&mut writer, &table);
            assert_eq!(writer.page_count(), 2);
        }
        let texts = text_pages(&surface);
        let header_pages: Vec<usize> = texts
            .iter()
            .filter(|(t, _)| t == "Planet")
            .map(|(_, p)| *p)
            .collect();
        assert_eq!(header_pages, vec![0, 1]);
        let p5 = texts.iter().find(|(t, _)| t == "P5").unwrap();
        assert_eq!(p5.1, 1);
    }

    #[test]
    fn test_page_capacity_drives_breaks_and_header_repeats() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new();
        let row_height = config.table_row_height;
        {
            let mut writer = PageWriter::new(&mut surface, &config, &chrome);
            writer.break_page(PageKind::Continuation);
            // Room for the header plus exactly five data rows.
            let capacity = writer.cursor().page_capacity();
            writer.advance(capacity - 6.0 * row_height - 1.0);
            render_table(&mut writer, &planets_table(9));
            assert_eq!(writer.page_count(), 2);
            assert!(writer.cursor().y <= config.bottom_limit());
        }

        let texts = text_pages(&surface);
        let headers: Vec<Vec<&str>> = [0usize, 1]
            .iter()
            .map(|page| {
                texts
                    .iter()
                    .filter(|(t, p)| p == page && ["Planet", "Sign", "Degree"].contains(&t.as_str()))
                    .map(|(t, _)| t.as_str())
                    .collect()
            })
            .collect();
        assert_eq!(headers[0], headers[1], "header must be identical on every page");

        // Row order is preserved across the break.
        let order: Vec<&str> = texts
            .iter()
            .filter(|(t, _)| t.starts_with('P') && t != "Planet")
            .map(|(t, _)| t.as_str())
            .collect();
        assert_eq!(order, vec!["P0", "P1", "P2", "P3", "P4", "P5", "P6", "P7", "P8"]);
        assert_eq!(texts.iter().find(|(t, _)| t == "P4").unwrap().1, 0);
        assert_eq!(texts.iter().find(|(t, _)| t == "P5").unwrap().1, 1);
    }

    #[test]
    fn test_banding_follows_global_row_index() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new();
        let mut table = planets_table(7);
        table.rows_per_page = Some(3);
        {
            let mut writer = PageWriter::new(&mut surface, &config, &chrome);
            writer.break_page(PageKind::Continuation);
            render_table(&mut writer, &table);
        }
        let bands_per_page = |page: usize| {
            surface
                .ops()
                .iter()
                .filter(|op| matches!(op, DrawOp::FillRect { page: p, color, .. } if *p == page && *color == BAND))
                .count()
        };
        // Rows 0..3 | 3..6 | 6: shaded rows are 0,2 | 4 | 6.
        assert_eq!(bands_per_page(0), 2);
        assert_eq!(bands_per_page(1), 1);
        assert_eq!(bands_per_page(2), 1);
        assert!(row_is_shaded(0) && !row_is_shaded(3) && row_is_shaded(4));
    }

    #[test]
    fn test_empty_rows_render_header_only() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new();
        {
            let mut writer = PageWriter::new(&mut surface, &config, &chrome);
            writer.break_page(PageKind::Continuation);
            let start = writer.cursor().y;
            let end = render_table(&mut writer, &planets_table(0));
            assert_eq!(end, start + config.table_row_height);
        }
        assert_eq!(surface.texts_on_page(0), vec!["Planet", "Sign", "Degree"]);
    }

    #[test]
    fn test_right_aligned_cells_end_at_column_edge() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new();
        {
            let mut writer = PageWriter::new(&mut surface, &config, &chrome);
            writer.break_page(PageKind::Continuation);
            render_table(&mut writer, &planets_table(1));
        }
        let (x, width) = surface
            .ops()
            .iter()
            .find_map(|op| match op {
                DrawOp::Text { text, x, style, size, .. } if text == "0.5" => {
                    Some((*x, surface.measure_text(text, *style, *size)))
                }
                _ => None,
            })
            .unwrap();
        let right_edge = config.margin + config.usable_width() - CELL_PADDING;
        assert!((x + width - right_edge).abs() < 0.01);
    }
}
