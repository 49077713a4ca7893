//! PDF backend for the layout `Surface`, built on `pdf-writer`.
//!
//! Drawing calls are buffered per page as content streams. Nothing is
//! serialised until `finish`, so pages can still be reordered after they are
//! drawn and internal links resolve against the final page order.

use std::ops::Range;

use pdf_writer::types::{ActionType, AnnotationType};
use pdf_writer::{Content, Filter, Name, Pdf, Rect as PdfRect, Ref, Str};

use crate::layout::font_metrics::FontStyle;
use crate::layout::surface::{reorder, Color, DecodedImage, Rect, Surface, SurfaceError};

const REGULAR_FONT: &[u8] = b"F1";
const BOLD_FONT: &[u8] = b"F2";
const DEFLATE_LEVEL: u8 = 6;

struct PendingLink {
    rect: Rect,
    target: usize,
}

struct PageBuffer {
    content: Content,
    images: Vec<usize>,
    links: Vec<PendingLink>,
}

impl PageBuffer {
    fn new() -> Self {
        Self {
            content: Content::new(),
            images: Vec::new(),
            links: Vec::new(),
        }
    }
}

struct ImageEntry {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

/// Surface producing a PDF document with the standard Helvetica faces.
pub struct PdfSurface {
    page_width: f32,
    page_height: f32,
    pages: Vec<PageBuffer>,
    order: Vec<usize>,
    images: Vec<ImageEntry>,
}

impl PdfSurface {
    pub fn new(page_width: f32, page_height: f32) -> Self {
        Self {
            page_width,
            page_height,
            pages: Vec::new(),
            order: Vec::new(),
            images: Vec::new(),
        }
    }

    fn current(&mut self) -> Option<&mut PageBuffer> {
        self.pages.last_mut()
    }

    fn flip(&self, y: f32) -> f32 {
        self.page_height - y
    }

    /// Serialises the document in its final page order.
    pub fn finish(self) -> Result<Vec<u8>, SurfaceError> {
        if self.pages.is_empty() {
            return Err(SurfaceError::Empty);
        }

        let mut next_id = 1;
        let mut alloc = || {
            let r = Ref::new(next_id);
            next_id += 1;
            r
        };

        let mut pdf = Pdf::new();
        let catalog_id = alloc();
        let pages_id = alloc();
        let regular_id = alloc();
        let bold_id = alloc();

        pdf.type1_font(regular_id)
            .base_font(Name(b"Helvetica"))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
        pdf.type1_font(bold_id)
            .base_font(Name(b"Helvetica-Bold"))
            .encoding_predefined(Name(b"WinAnsiEncoding"));

        let mut image_ids = Vec::with_capacity(self.images.len());
        for image in &self.images {
            let xobj_id = alloc();
            let mask_id = image.alpha.as_ref().map(|alpha| {
                let mask_id = alloc();
                let compressed = miniz_oxide::deflate::compress_to_vec_zlib(alpha, DEFLATE_LEVEL);
                let mut mask = pdf.image_xobject(mask_id, &compressed);
                mask.filter(Filter::FlateDecode);
                mask.width(image.width as i32);
                mask.height(image.height as i32);
                mask.color_space().device_gray();
                mask.bits_per_component(8);
                mask_id
            });

            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&image.rgb, DEFLATE_LEVEL);
            let mut xobj = pdf.image_xobject(xobj_id, &compressed);
            xobj.filter(Filter::FlateDecode);
            xobj.width(image.width as i32);
            xobj.height(image.height as i32);
            xobj.color_space().device_rgb();
            xobj.bits_per_component(8);
            if let Some(mask_id) = mask_id {
                xobj.s_mask(mask_id);
            }
            image_ids.push(xobj_id);
        }

        // Page ids are indexed by creation order; kids follow the final order.
        let page_ids: Vec<Ref> = (0..self.pages.len()).map(|_| alloc()).collect();
        let content_ids: Vec<Ref> = (0..self.pages.len()).map(|_| alloc()).collect();
        let ordered: Vec<Ref> = self.order.iter().map(|&i| page_ids[i]).collect();

        pdf.catalog(catalog_id).pages(pages_id);
        pdf.pages(pages_id)
            .kids(ordered.iter().copied())
            .count(ordered.len() as i32);

        for (index, page) in self.pages.into_iter().enumerate() {
            let annot_ids: Vec<Ref> = page
                .links
                .iter()
                .filter_map(|link| {
                    let target = *ordered.get(link.target)?;
                    let annot_id = alloc();
                    let bottom = self.page_height - link.rect.bottom();
                    let mut annot = pdf.annotation(annot_id);
                    annot
                        .subtype(AnnotationType::Link)
                        .rect(PdfRect::new(
                            link.rect.x,
                            bottom,
                            link.rect.x + link.rect.width,
                            bottom + link.rect.height,
                        ))
                        .border(0.0, 0.0, 0.0, None);
                    annot
                        .action()
                        .action_type(ActionType::GoTo)
                        .destination()
                        .page(target)
                        .xyz(0.0, self.page_height, None);
                    Some(annot_id)
                })
                .collect();

            let raw = page.content.finish();
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), DEFLATE_LEVEL);
            pdf.stream(content_ids[index], &compressed)
                .filter(Filter::FlateDecode);

            let mut pdf_page = pdf.page(page_ids[index]);
            pdf_page
                .media_box(PdfRect::new(0.0, 0.0, self.page_width, self.page_height))
                .parent(pages_id)
                .contents(content_ids[index]);
            if !annot_ids.is_empty() {
                pdf_page.annotations(annot_ids.iter().copied());
            }
            let mut resources = pdf_page.resources();
            {
                let mut fonts = resources.fonts();
                fonts.pair(Name(REGULAR_FONT), regular_id);
                fonts.pair(Name(BOLD_FONT), bold_id);
            }
            if !page.images.is_empty() {
                let mut xobjects = resources.x_objects();
                for &image in &page.images {
                    let name = image_name(image);
                    xobjects.pair(Name(name.as_bytes()), image_ids[image]);
                }
            }
        }

        Ok(pdf.finish())
    }
}

fn image_name(index: usize) -> String {
    format!("Im{}", index + 1)
}

fn font_name(style: FontStyle) -> Name<'static> {
    match style {
        FontStyle::Regular => Name(REGULAR_FONT),
        FontStyle::Bold => Name(BOLD_FONT),
    }
}

/// UTF-8 to WinAnsi (Windows-1252). Unmappable characters become `?`.
fn to_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u8,
            0x20AC => 0x80,
            0x2026 => 0x85,
            0x2018 => 0x91,
            0x2019 => 0x92,
            0x201C => 0x93,
            0x201D => 0x94,
            0x2022 => 0x95,
            0x2013 => 0x96,
            0x2014 => 0x97,
            0x2122 => 0x99,
            _ => b'?',
        })
        .collect()
}

impl Surface for PdfSurface {
    fn add_page(&mut self) -> usize {
        let id = self.pages.len();
        self.pages.push(PageBuffer::new());
        self.order.push(id);
        self.order.len() - 1
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
        color: Color,
    ) {
        let y = self.flip(baseline);
        let bytes = to_winansi(text);
        let Some(page) = self.current() else { return };
        page.content
            .begin_text()
            .set_font(font_name(style), size)
            .set_fill_rgb(color[0], color[1], color[2])
            .next_line(x, y)
            .show(Str(&bytes))
            .end_text();
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let y = self.flip(rect.bottom());
        let Some(page) = self.current() else { return };
        page.content
            .save_state()
            .set_fill_rgb(color[0], color[1], color[2])
            .rect(rect.x, y, rect.width, rect.height)
            .fill_nonzero()
            .restore_state();
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f32) {
        let y = self.flip(rect.bottom());
        let Some(page) = self.current() else { return };
        page.content
            .save_state()
            .set_line_width(line_width)
            .set_stroke_rgb(color[0], color[1], color[2])
            .rect(rect.x, y, rect.width, rect.height)
            .stroke()
            .restore_state();
    }

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, line_width: f32) {
        let (y1, y2) = (self.flip(from.1), self.flip(to.1));
        let Some(page) = self.current() else { return };
        page.content
            .save_state()
            .set_line_width(line_width)
            .set_stroke_rgb(color[0], color[1], color[2])
            .move_to(from.0, y1)
            .line_to(to.0, y2)
            .stroke()
            .restore_state();
    }

    fn draw_image(&mut self, image: &DecodedImage, rect: Rect) {
        if self.pages.is_empty() {
            return;
        }
        let index = self.images.len();
        self.images.push(ImageEntry {
            width: image.width,
            height: image.height,
            rgb: image.rgb.clone(),
            alpha: image.alpha.clone(),
        });
        let y = self.flip(rect.bottom());
        let name = image_name(index);
        let Some(page) = self.current() else { return };
        page.images.push(index);
        page.content
            .save_state()
            .transform([rect.width, 0.0, 0.0, rect.height, rect.x, y])
            .x_object(Name(name.as_bytes()))
            .restore_state();
    }

    fn link_to_page(&mut self, rect: Rect, page: usize) {
        if let Some(current) = self.current() {
            current.links.push(PendingLink { rect, target: page });
        }
    }

    fn supports_reorder(&self) -> bool {
        true
    }

    fn move_pages(&mut self, range: Range<usize>, to: usize) -> Result<(), SurfaceError> {
        reorder(&mut self.order, range, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_kids_in_order(bytes: &[u8]) -> String {
        let text = String::from_utf8_lossy(bytes);
        let start = text.find("/Kids [").unwrap();
        let end = text[start..].find(']').unwrap();
        text[start..start + end + 1].to_string()
    }

    #[test]
    fn test_finish_without_pages_is_an_error() {
        let surface = PdfSurface::new(595.28, 841.89);
        assert!(matches!(surface.finish(), Err(SurfaceError::Empty)));
    }

    #[test]
    fn test_finish_produces_pdf_with_every_page() {
        let mut surface = PdfSurface::new(595.28, 841.89);
        for i in 0..3 {
            surface.add_page();
            surface.draw_text(&format!("Page {}", i + 1), 50.0, 80.0, FontStyle::Bold, 12.0, [0.0; 3]);
            surface.fill_rect(Rect::new(50.0, 100.0, 100.0, 20.0), [0.9, 0.9, 0.9]);
            surface.draw_line((50.0, 130.0), (200.0, 130.0), [0.0; 3], 0.5);
        }
        surface.link_to_page(Rect::new(50.0, 60.0, 100.0, 20.0), 0);

        let bytes = surface.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Count 3"));
        assert!(text.contains("/Helvetica-Bold"));
        assert!(text.contains("/GoTo"));
    }

    #[test]
    fn test_moved_pages_change_kids_order() {
        let mut plain = PdfSurface::new(595.28, 841.89);
        let mut moved = PdfSurface::new(595.28, 841.89);
        for surface in [&mut plain, &mut moved] {
            for _ in 0..3 {
                surface.add_page();
            }
        }
        moved.move_pages(2..3, 1).unwrap();
        assert!(moved.supports_reorder());

        let plain_kids = page_kids_in_order(&plain.finish().unwrap());
        let moved_kids = page_kids_in_order(&moved.finish().unwrap());
        assert_ne!(plain_kids, moved_kids);
    }

    #[test]
    fn test_images_are_embedded_with_soft_mask() {
        let mut surface = PdfSurface::new(200.0, 200.0);
        surface.add_page();
        let image = DecodedImage {
            width: 2,
            height: 1,
            rgb: vec![255, 0, 0, 0, 0, 255],
            alpha: Some(vec![255, 0]),
        };
        surface.draw_image(&image, Rect::new(10.0, 10.0, 40.0, 20.0));
        let text = String::from_utf8_lossy(&surface.finish().unwrap()).to_string();
        assert!(text.contains("/SMask"));
        assert!(text.contains("/Im1"));
    }

    #[test]
    fn test_winansi_maps_bullet_and_replaces_unknown() {
        assert_eq!(to_winansi("• ok"), vec![0x95, b' ', b'o', b'k']);
        assert_eq!(to_winansi("☉"), vec![b'?']);
    }
}
