// Report composition: fetch → parse → lay out → serialise.
// Fetching is async and concurrent; everything after it runs inside
// tokio::task::spawn_blocking on a single thread, in section order.

pub mod pdf;

use std::ops::Range;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assets::AssetError;
use crate::generation::fetch::{FetchedSection, Fetcher, UsageTotals};
use crate::generation::tags::parse_blocks;
use crate::layout::blocks::{render_block, render_blocks};
use crate::layout::image::{decode_image, embed_image};
use crate::layout::surface::Rect;
use crate::layout::table::render_table;
use crate::layout::text::wrap_spans;
use crate::layout::toc::{count_toc_pages, relocate_toc, render_toc, SectionEntry, TocRow};
use crate::layout::{
    Chrome, DecodedImage, FontStyle, PageConfig, PageKind, PageWriter, RecordingSurface,
    SectionRegistry, Surface, SurfaceError, ACCENT, INK, MUTED, WHITE,
};
use crate::models::content::{ContentBlock, ImageSpec, TableSpec, TextSpan};
use crate::models::report::{ReportRequest, SectionRequest};

use self::pdf::PdfSurface;

/// Failures that abort a whole composition call.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("rendering surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("composition worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("fetch pool closed: {0}")]
    Pool(#[from] tokio::sync::AcquireError),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the table of contents ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TocPlacement {
    /// Dry layout pass first, then cover → TOC → body. No reordering.
    #[default]
    Front,
    /// Single pass; TOC appended, then moved behind the cover when the surface allows it.
    /// Footers and TOC rows carry the post-move page numbers.
    Relocate,
    /// Single pass; TOC stays at the end.
    End,
}

impl FromStr for TocPlacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Ok(TocPlacement::Front),
            "relocate" => Ok(TocPlacement::Relocate),
            "end" => Ok(TocPlacement::End),
            other => Err(format!(
                "unknown TOC placement '{other}' (expected front, relocate or end)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoverInfo {
    pub title: String,
    pub subtitle: Option<String>,
    pub subject_name: String,
    pub date: NaiveDate,
}

#[derive(Debug)]
pub struct SectionImage {
    pub spec: ImageSpec,
    pub decoded: Result<DecodedImage, AssetError>,
}

/// A section with its text parsed and its image decoded, ready to draw.
#[derive(Debug)]
pub struct ResolvedSection {
    pub title: String,
    pub toc_label: Option<String>,
    pub blocks: Vec<ContentBlock>,
    pub image: Option<SectionImage>,
    pub tables: Vec<TableSpec>,
}

#[derive(Debug)]
pub struct DocumentPlan {
    pub cover: CoverInfo,
    pub sections: Vec<ResolvedSection>,
}

/// What a composition produced, for logging and tests.
#[derive(Debug, Clone, Serialize)]
pub struct Composition {
    pub page_count: usize,
    /// Final page positions of the TOC.
    pub toc_pages: Range<usize>,
    pub toc_relocated: bool,
    pub toc: Vec<TocRow>,
    pub sections: Vec<SectionEntry>,
}

#[derive(Debug, Clone)]
pub struct ComposeOptions {
    pub page: PageConfig,
    pub placement: TocPlacement,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportArtifact {
    pub report_id: Uuid,
    pub file_name: String,
    pub path: PathBuf,
    pub page_count: usize,
    pub usage: UsageTotals,
}

/// `"{subject}_Report_{date}.pdf"`, with the subject reduced to `[A-Za-z0-9_-]`.
pub fn report_file_name(subject_name: &str, date: NaiveDate) -> String {
    let subject: String = subject_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let subject = if subject.is_empty() {
        "Subject".to_string()
    } else {
        subject
    };
    format!("{subject}_Report_{}.pdf", date.format("%Y-%m-%d"))
}

/// Parses fetched text and decodes fetched image bytes. Runs once per report.
pub fn build_plan(
    cover: CoverInfo,
    sections: Vec<SectionRequest>,
    fetched: Vec<FetchedSection>,
) -> DocumentPlan {
    let sections = sections
        .into_iter()
        .zip(fetched)
        .map(|(section, fetched)| {
            let image = section.image.map(|spec| {
                let decoded = match fetched.image {
                    Some(Ok(bytes)) => decode_image(&bytes),
                    Some(Err(err)) => Err(err),
                    None => Err(AssetError::NotFound(spec.source.to_string())),
                };
                if let Err(AssetError::Decode(reason)) = &decoded {
                    warn!(asset = %spec.source, reason = %reason, "image could not be decoded");
                }
                SectionImage { spec, decoded }
            });
            ResolvedSection {
                title: section.title,
                toc_label: section.toc_label,
                blocks: parse_blocks(&fetched.text),
                image,
                tables: section.tables,
            }
        })
        .collect();
    DocumentPlan { cover, sections }
}

/// Lays out the whole document on `surface`.
pub fn compose(
    surface: &mut dyn Surface,
    plan: &DocumentPlan,
    config: &PageConfig,
    placement: TocPlacement,
) -> Composition {
    let chrome = Chrome::new(plan.cover.title.clone());
    match placement {
        TocPlacement::Front => compose_front(surface, plan, config, &chrome),
        TocPlacement::Relocate => compose_relocated(surface, plan, config, &chrome),
        TocPlacement::End => compose_end(surface, plan, config, &chrome),
    }
}

fn compose_front(
    surface: &mut dyn Surface,
    plan: &DocumentPlan,
    config: &PageConfig,
    chrome: &Chrome,
) -> Composition {
    // Pass 1: height accounting only, to learn every section's page.
    let dry_registry = {
        let mut dry = RecordingSurface::dry();
        let mut writer = PageWriter::new(&mut dry, config, chrome);
        draw_cover(&mut writer, &plan.cover);
        layout_sections(&mut writer, plan)
    };
    let toc_page_count = count_toc_pages(config, chrome, &dry_registry.toc_rows(0));
    let rows = dry_registry.toc_rows(toc_page_count);
    debug!(toc_pages = toc_page_count, sections = rows.len(), "dry pass resolved page numbers");

    // Pass 2: cover, TOC with the now known numbers, then the body.
    let mut writer = PageWriter::new(surface, config, chrome);
    draw_cover(&mut writer, &plan.cover);
    let toc_pages = render_toc(&mut writer, &rows);
    let registry = layout_sections(&mut writer, plan);
    if registry.toc_rows(0) != rows {
        warn!("section pages differ between dry and final pass");
    }

    Composition {
        page_count: writer.page_count(),
        toc_pages,
        toc_relocated: false,
        toc: rows,
        sections: registry.entries().to_vec(),
    }
}

fn compose_relocated(
    surface: &mut dyn Surface,
    plan: &DocumentPlan,
    config: &PageConfig,
    chrome: &Chrome,
) -> Composition {
    let mut writer = PageWriter::new(surface, config, chrome);
    draw_cover(&mut writer, &plan.cover);

    // Numbers are shifted only when the move can actually happen.
    let reorderable = writer.surface().supports_reorder();
    let offset = if reorderable {
        predicted_toc_pages(plan, config, chrome)
    } else {
        0
    };
    writer.set_page_number_shift(offset as isize);
    let registry = layout_sections(&mut writer, plan);

    let rows = registry.toc_rows(offset);
    if reorderable {
        // TOC pages land directly behind the cover.
        let first_toc_page = writer.page_count();
        writer.set_page_number_shift(1 - first_toc_page as isize);
    }
    let rendered = render_toc(&mut writer, &rows);
    writer.set_page_number_shift(0);
    if reorderable && rendered.len() != offset {
        warn!(
            predicted = offset,
            rendered = rendered.len(),
            "table of contents page count differs from prediction"
        );
    }
    let relocated = relocate_toc(writer.surface(), rendered.clone(), 1);
    let toc_pages = if relocated {
        1..1 + rendered.len()
    } else {
        rendered
    };

    Composition {
        page_count: writer.page_count(),
        toc_pages,
        toc_relocated: relocated,
        toc: rows,
        sections: registry.entries().to_vec(),
    }
}

/// TOC length for `plan`, known before layout: one row per distinct anchor.
fn predicted_toc_pages(plan: &DocumentPlan, config: &PageConfig, chrome: &Chrome) -> usize {
    let mut registry = SectionRegistry::new();
    for (index, section) in plan.sections.iter().enumerate() {
        registry.start_section(&section.title, section.toc_label.as_deref());
        // Placeholder pages; only the row count matters here.
        registry.mark_section_page(index + 1).ok();
    }
    count_toc_pages(config, chrome, &registry.toc_rows(0))
}

fn compose_end(
    surface: &mut dyn Surface,
    plan: &DocumentPlan,
    config: &PageConfig,
    chrome: &Chrome,
) -> Composition {
    let mut writer = PageWriter::new(surface, config, chrome);
    draw_cover(&mut writer, &plan.cover);
    let registry = layout_sections(&mut writer, plan);
    let rows = registry.toc_rows(0);
    let toc_pages = render_toc(&mut writer, &rows);

    Composition {
        page_count: writer.page_count(),
        toc_pages,
        toc_relocated: false,
        toc: rows,
        sections: registry.entries().to_vec(),
    }
}

fn layout_sections(writer: &mut PageWriter<'_>, plan: &DocumentPlan) -> SectionRegistry {
    let mut registry = SectionRegistry::new();
    for (index, section) in plan.sections.iter().enumerate() {
        layout_section(writer, &mut registry, index, section);
    }
    writer.set_running_header(None);
    registry
}

fn layout_section(
    writer: &mut PageWriter<'_>,
    registry: &mut SectionRegistry,
    index: usize,
    section: &ResolvedSection,
) {
    let config = writer.config().clone();

    registry.start_section(&section.title, section.toc_label.as_deref());
    writer.set_running_header(Some(section.title.clone()));
    let page = writer.break_page(PageKind::SectionOpening {
        ornate: index < config.ornate_sections,
    });
    if let Err(err) = registry.mark_section_page(page) {
        warn!(index, section = %section.title, error = %err, "section page not bound");
    }

    render_block(writer, &ContentBlock::Heading(section.title.clone()));

    if let Some(image) = &section.image {
        let reserved = embed_image(writer, &image.spec, image.decoded.as_ref());
        if reserved > 0.0 {
            writer.skip(config.image_gap);
        }
    }

    render_blocks(writer, &section.blocks);

    for table in &section.tables {
        render_table(writer, table);
        writer.skip(config.paragraph_gap);
    }
}

fn draw_cover(writer: &mut PageWriter<'_>, cover: &CoverInfo) {
    const TITLE_SIZE: f32 = 30.0;
    const SUBTITLE_SIZE: f32 = 14.0;
    const NAME_SIZE: f32 = 22.0;
    const DETAIL_SIZE: f32 = 12.0;

    writer.set_running_header(None);
    writer.break_page(PageKind::Cover);

    let config = writer.config().clone();
    let (width, height) = (config.page_width, config.page_height);
    let panel_height = height * 0.42;

    let title_lines = {
        let measure = |text: &str, style: FontStyle| writer.measure(text, style, TITLE_SIZE);
        wrap_spans(
            &[TextSpan::bold(cover.title.as_str())],
            config.usable_width(),
            &measure,
        )
    };

    writer
        .surface()
        .fill_rect(Rect::new(0.0, 0.0, width, panel_height), ACCENT);

    let mut baseline = panel_height * 0.45;
    for line in &title_lines {
        let x = (width - line.width) / 2.0;
        writer
            .surface()
            .draw_text(&line.text(), x, baseline, FontStyle::Bold, TITLE_SIZE, WHITE);
        baseline += TITLE_SIZE * 1.25;
    }
    if let Some(subtitle) = cover.subtitle.as_deref().filter(|s| !s.trim().is_empty()) {
        let x = (width - writer.measure(subtitle, FontStyle::Regular, SUBTITLE_SIZE)) / 2.0;
        writer
            .surface()
            .draw_text(subtitle, x, baseline, FontStyle::Regular, SUBTITLE_SIZE, WHITE);
    }

    let prepared = "Prepared for";
    let date = cover.date.format("%B %-d, %Y").to_string();
    let rows = [
        (prepared, FontStyle::Regular, DETAIL_SIZE, MUTED, panel_height + 80.0),
        (
            cover.subject_name.as_str(),
            FontStyle::Bold,
            NAME_SIZE,
            INK,
            panel_height + 112.0,
        ),
        (date.as_str(), FontStyle::Regular, DETAIL_SIZE, MUTED, panel_height + 140.0),
    ];
    for (text, style, size, color, baseline) in rows {
        let x = (width - writer.measure(text, style, size)) / 2.0;
        writer
            .surface()
            .draw_text(text, x, baseline, style, size, color);
    }

    let rule_y = panel_height + 160.0;
    writer.surface().draw_line(
        (width * 0.35, rule_y),
        (width * 0.65, rule_y),
        ACCENT,
        1.0,
    );
}

/// Fetches, composes and writes one report. The only async entry point of the pipeline.
pub async fn compose_report(
    request: &ReportRequest,
    date: NaiveDate,
    fetcher: &Fetcher,
    options: &ComposeOptions,
) -> Result<ReportArtifact, ComposeError> {
    let report_id = Uuid::new_v4();
    info!(
        %report_id,
        subject = %request.subject_name,
        sections = request.sections.len(),
        "composing report"
    );

    let fetched = fetcher.fetch_all(&request.sections).await?;
    let mut usage = UsageTotals::default();
    for section in &fetched {
        usage.merge(&section.usage);
    }

    let cover = CoverInfo {
        title: request.title.clone(),
        subtitle: request.subtitle.clone(),
        subject_name: request.subject_name.clone(),
        date,
    };
    let sections = request.sections.clone();
    let config = options.page.clone();
    let placement = options.placement;

    // CPU-bound layout: keep it off the async executor.
    let (bytes, composition) = tokio::task::spawn_blocking(
        move || -> Result<(Vec<u8>, Composition), ComposeError> {
            let plan = build_plan(cover, sections, fetched);
            let mut surface = PdfSurface::new(config.page_width, config.page_height);
            let composition = compose(&mut surface, &plan, &config, placement);
            Ok((surface.finish()?, composition))
        },
    )
    .await??;

    let file_name = report_file_name(&request.subject_name, date);
    tokio::fs::create_dir_all(&options.output_dir).await?;
    let path = options.output_dir.join(&file_name);
    tokio::fs::write(&path, &bytes).await?;

    info!(
        %report_id,
        file = %file_name,
        pages = composition.page_count,
        toc_relocated = composition.toc_relocated,
        calls = usage.calls,
        failed_calls = usage.failed_calls,
        placeholders = usage.placeholders,
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        "report written"
    );

    Ok(ReportArtifact {
        report_id,
        file_name,
        path,
        page_count: composition.page_count,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::assets::{AssetRef, AssetStore};
    use crate::generation::fetch::RetryPolicy;
    use crate::layout::default_page_config;
    use crate::layout::surface::DrawOp;
    use crate::llm_client::{GeneratedText, GenerationError, TextGenerator};
    use crate::models::content::ColumnAlign;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn cover() -> CoverInfo {
        CoverInfo {
            title: "Natal Report".to_string(),
            subtitle: Some("A personal reading".to_string()),
            subject_name: "Ada Lovelace".to_string(),
            date: date(),
        }
    }

    fn prose(chars: usize) -> String {
        let mut text = String::new();
        while text.len() < chars {
            text.push_str("Venus in the seventh house favours partnership and balance. ");
        }
        text.truncate(chars);
        text.trim_end().to_string()
    }

    fn section(title: &str, paragraphs: usize) -> ResolvedSection {
        ResolvedSection {
            title: title.to_string(),
            toc_label: None,
            blocks: (0..paragraphs)
                .map(|_| ContentBlock::Paragraph(prose(900)))
                .collect(),
            image: None,
            tables: vec![],
        }
    }

    fn plan(sections: Vec<ResolvedSection>) -> DocumentPlan {
        DocumentPlan {
            cover: cover(),
            sections,
        }
    }

    /// Creation id of the page at final position `position`.
    fn page_at(surface: &RecordingSurface, position: usize) -> usize {
        surface.page_order()[position]
    }

    #[test]
    fn test_report_file_name_sanitises_subject() {
        assert_eq!(
            report_file_name("Ada  Lovelace", date()),
            "Ada_Lovelace_Report_2026-10-16.pdf"
        );
        assert_eq!(
            report_file_name("../../José O'Neil", date()),
            "Jos_ONeil_Report_2026-10-16.pdf"
        );
        assert_eq!(report_file_name("   ", date()), "Subject_Report_2026-10-16.pdf");
    }

    #[test]
    fn test_toc_placement_parses() {
        assert_eq!("Front".parse::<TocPlacement>(), Ok(TocPlacement::Front));
        assert_eq!("relocate".parse::<TocPlacement>(), Ok(TocPlacement::Relocate));
        assert!("middle".parse::<TocPlacement>().is_err());
    }

    #[test]
    fn test_disclaimer_with_short_paragraph_is_two_pages() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new();
        let mut writer = PageWriter::new(&mut surface, &config, &chrome);
        let mut registry = SectionRegistry::new();

        let disclaimer = ResolvedSection {
            title: "Disclaimer".to_string(),
            toc_label: None,
            blocks: vec![ContentBlock::Paragraph(prose(1200))],
            image: None,
            tables: vec![],
        };
        draw_cover(&mut writer, &cover());
        layout_section(&mut writer, &mut registry, 0, &disclaimer);

        assert_eq!(writer.page_count(), 2);
        assert_eq!(registry.entries()[0].first_page, Some(1));
    }

    #[test]
    fn test_section_table_continues_with_repeated_header() {
        let config = default_page_config();
        let mut surface = RecordingSurface::new();
        let mut with_table = section("Planet Positions", 0);
        with_table.tables.push(TableSpec {
            caption: Some("Positions".to_string()),
            headers: vec!["Planet".into(), "Sign".into()],
            rows: (0..9).map(|i| vec![format!("P{i}"), "Leo".into()]).collect(),
            column_align: vec![ColumnAlign::Left, ColumnAlign::Right],
            rows_per_page: Some(5),
        });
        compose(&mut surface, &plan(vec![with_table]), &config, TocPlacement::End);

        // cover, section page, table continuation, TOC
        assert_eq!(surface.page_count(), 4);
        let headers: Vec<usize> = surface
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, page, .. } if text == "Planet" => Some(*page),
                _ => None,
            })
            .collect();
        assert_eq!(headers, vec![1, 2]);
    }

    #[test]
    fn test_missing_image_leaves_no_gap() {
        let config = default_page_config();
        let spec = ImageSpec {
            source: AssetRef::new("houses", "seventh", "png"),
            max_width: 300.0,
            max_height: 200.0,
        };

        let mut with_missing = section("Seventh House", 1);
        with_missing.image = Some(SectionImage {
            spec,
            decoded: Err(AssetError::NotFound("houses/seventh.png".to_string())),
        });
        let without = section("Seventh House", 1);

        let mut a = RecordingSurface::new();
        let mut b = RecordingSurface::new();
        compose(&mut a, &plan(vec![with_missing]), &config, TocPlacement::Front);
        compose(&mut b, &plan(vec![without]), &config, TocPlacement::Front);
        assert_eq!(a.ops(), b.ops());
        assert!(!a.ops().iter().any(|op| matches!(op, DrawOp::Image { .. })));
    }

    #[test]
    fn test_present_image_pushes_text_down() {
        let config = default_page_config();
        let mut with_image = section("Chart", 1);
        with_image.image = Some(SectionImage {
            spec: ImageSpec {
                source: AssetRef::new("charts", "natal", "png"),
                max_width: 200.0,
                max_height: 200.0,
            },
            decoded: Ok(DecodedImage {
                width: 100,
                height: 100,
                rgb: vec![0; 30_000],
                alpha: None,
            }),
        });
        let first_body_baseline = |plan: &DocumentPlan| {
            let mut surface = RecordingSurface::new();
            compose(&mut surface, plan, &config, TocPlacement::End);
            surface
                .ops()
                .iter()
                .find_map(|op| match op {
                    DrawOp::Text { baseline, size, page, .. }
                        if *size == config.body_size && *page == 1 =>
                    {
                        Some(*baseline)
                    }
                    _ => None,
                })
                .unwrap()
        };
        let shifted = first_body_baseline(&plan(vec![with_image]));
        let plain = first_body_baseline(&plan(vec![section("Chart", 1)]));
        assert!((shifted - plain - (200.0 + config.image_gap)).abs() < 0.01);
    }

    #[test]
    fn test_composition_is_deterministic() {
        let config = default_page_config();
        let document = plan(vec![section("Sun", 3), section("Moon", 5), section("Mars", 1)]);
        let mut first = RecordingSurface::new();
        let mut second = RecordingSurface::new();
        let a = compose(&mut first, &document, &config, TocPlacement::Front);
        let b = compose(&mut second, &document, &config, TocPlacement::Front);
        assert_eq!(a.page_count, b.page_count);
        assert_eq!(first.ops(), second.ops());
    }

    #[test]
    fn test_front_toc_lists_every_section_with_final_pages() {
        let config = default_page_config();
        let titles = ["Sun", "Moon", "Mercury", "Venus", "Mars"];
        let document = plan(
            titles
                .iter()
                .enumerate()
                .map(|(i, t)| section(t, i + 1))
                .collect(),
        );
        let mut surface = RecordingSurface::new();
        let composition = compose(&mut surface, &document, &config, TocPlacement::Front);

        assert_eq!(composition.toc_pages, 1..2);
        assert_eq!(composition.toc.len(), titles.len());
        assert!(composition.toc.windows(2).all(|w| w[0].page < w[1].page));
        for row in &composition.toc {
            let texts = surface.texts_on_page(page_at(&surface, row.page));
            assert!(texts.contains(&row.label.as_str()), "{} not on its page", row.label);
            let footer = format!("Page {}", row.page + 1);
            assert!(texts.contains(&footer.as_str()));
        }
        let toc_texts = surface.texts_on_page(1);
        assert!(toc_texts.contains(&"3"), "first section starts on page 3");
    }

    #[test]
    fn test_relocated_toc_moves_behind_cover() {
        let config = default_page_config();
        let document = plan(vec![section("Sun", 2), section("Moon", 2)]);
        let mut surface = RecordingSurface::new();
        let composition = compose(&mut surface, &document, &config, TocPlacement::Relocate);

        assert!(composition.toc_relocated);
        assert_eq!(composition.toc_pages, 1..2);
        let toc_creation_id = surface.page_count() - 1;
        assert_eq!(page_at(&surface, 1), toc_creation_id);
        for row in &composition.toc {
            let texts = surface.texts_on_page(page_at(&surface, row.page));
            assert!(texts.contains(&row.label.as_str()));
            let footer = format!("Page {}", row.page + 1);
            assert!(texts.contains(&footer.as_str()), "{footer} missing");
        }
        assert!(surface.texts_on_page(toc_creation_id).contains(&"Page 2"));
        for position in 1..surface.page_count() {
            let footer = format!("Page {}", position + 1);
            let texts = surface.texts_on_page(page_at(&surface, position));
            assert!(texts.contains(&footer.as_str()), "position {position} shows wrong number");
        }
    }

    #[test]
    fn test_relocation_failure_keeps_toc_at_end() {
        let config = default_page_config();
        let document = plan(vec![section("Sun", 2), section("Moon", 2)]);
        let mut surface = RecordingSurface::new().without_reorder();
        let composition = compose(&mut surface, &document, &config, TocPlacement::Relocate);

        assert!(!composition.toc_relocated);
        assert_eq!(composition.toc_pages.end, surface.page_count());
        assert_eq!(composition.toc[0].page, 1);
        for row in &composition.toc {
            let texts = surface.texts_on_page(page_at(&surface, row.page));
            assert!(texts.contains(&row.label.as_str()));
        }
    }

    #[test]
    fn test_cover_page_has_no_chrome() {
        let config = default_page_config();
        let mut surface = RecordingSurface::new();
        compose(&mut surface, &plan(vec![section("Sun", 1)]), &config, TocPlacement::End);
        let cover_ops: Vec<&DrawOp> = surface.ops().iter().filter(|op| op.page() == 0).collect();
        assert!(!cover_ops.iter().any(|op| matches!(op, DrawOp::StrokeRect { .. })));
        let texts = surface.texts_on_page(0);
        assert!(texts.contains(&"Natal Report"));
        assert!(texts.contains(&"Ada Lovelace"));
        assert!(texts.contains(&"October 16, 2026"));
    }

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, _system: &str, prompt: &str) -> Result<GeneratedText, GenerationError> {
            if prompt.contains("\"Broken\"") {
                return Err(GenerationError::EmptyContent);
            }
            Ok(GeneratedText {
                text: "[SUBHEADING]Overview[END][CONTENT]- **Key:** steady growth[END]".to_string(),
                usage: None,
            })
        }
    }

    struct NoAssets;

    #[async_trait]
    impl AssetStore for NoAssets {
        async fn fetch(&self, asset: &AssetRef) -> Result<Bytes, AssetError> {
            Err(AssetError::NotFound(asset.to_string()))
        }
    }

    #[tokio::test]
    async fn test_compose_report_writes_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(Arc::new(EchoGenerator), Arc::new(NoAssets), 2)
            .with_retry(RetryPolicy::immediate());
        let options = ComposeOptions {
            page: default_page_config(),
            placement: TocPlacement::Front,
            output_dir: dir.path().join("out"),
        };
        let request: ReportRequest = serde_json::from_value(serde_json::json!({
            "subjectName": "Ada Lovelace",
            "title": "Natal Report",
            "sections": [
                { "title": "Sun", "prompt": "Describe the Sun." },
                { "title": "Broken", "prompt": "This one fails." },
                {
                    "title": "Houses",
                    "text": "Plain supplied text.",
                    "image": {
                        "source": { "category": "houses", "key": "wheel", "extension": "png" },
                        "maxWidth": 200.0,
                        "maxHeight": 200.0
                    }
                }
            ]
        }))
        .unwrap();

        let artifact = compose_report(&request, date(), &fetcher, &options)
            .await
            .unwrap();

        assert_eq!(artifact.file_name, "Ada_Lovelace_Report_2026-10-16.pdf");
        assert_eq!(artifact.page_count, 5);
        assert_eq!(artifact.usage.calls, 4);
        assert_eq!(artifact.usage.placeholders, 1);
        let bytes = std::fs::read(&artifact.path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
