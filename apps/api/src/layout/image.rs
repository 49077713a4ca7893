//! Aspect-preserving image embedder.

use tracing::warn;

use crate::assets::AssetError;
use crate::layout::cursor::PageWriter;
use crate::layout::surface::{DecodedImage, Rect};
use crate::models::content::ImageSpec;

/// Decodes PNG or JPEG bytes to RGB plus an alpha plane when any pixel is translucent.
///
/// Raster only. SVG sources are not rasterised and come back as
/// `AssetError::Decode`, so the section is laid out as if the image were absent.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, AssetError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| AssetError::Decode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    if width == 0 || height == 0 {
        return Err(AssetError::Decode("image has zero size".to_string()));
    }

    let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);
    let rgb = rgba
        .pixels()
        .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
        .collect();
    let alpha = has_alpha.then(|| rgba.pixels().map(|p| p.0[3]).collect());

    Ok(DecodedImage {
        width,
        height,
        rgb,
        alpha,
    })
}

/// Scales `natural` into the `max` box: `scale = min(max_w / w, max_h / h)`.
pub fn fit_within(natural: (f32, f32), max: (f32, f32)) -> (f32, f32) {
    let (width, height) = natural;
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (max.0 / width).min(max.1 / height).max(0.0);
    (width * scale, height * scale)
}

/// Draws the image centred at the cursor and returns the height it reserved.
///
/// A failed load reserves nothing: the next block starts where the image
/// would have, and the caller must only ever advance by the returned value.
pub fn embed_image(
    writer: &mut PageWriter<'_>,
    spec: &ImageSpec,
    image: Result<&DecodedImage, &AssetError>,
) -> f32 {
    let image = match image {
        Ok(image) => image,
        Err(err) => {
            warn!(asset = %spec.source, error = %err, "image unavailable, reserving no space");
            return 0.0;
        }
    };

    let max_width = spec.max_width.min(writer.usable_width());
    let max_height = spec.max_height.min(writer.cursor().page_capacity());
    let (width, height) = fit_within(
        (image.width as f32, image.height as f32),
        (max_width, max_height),
    );
    if height <= 0.0 {
        return 0.0;
    }

    writer.ensure_room(height);
    let x = writer.left() + (writer.usable_width() - width) / 2.0;
    let rect = Rect::new(x, writer.cursor().y, width, height);
    writer.surface().draw_image(image, rect);
    writer.advance(height);
    height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetRef;
    use crate::layout::chrome::Chrome;
    use crate::layout::cursor::PageKind;
    use crate::layout::font_metrics::default_page_config;
    use crate::layout::surface::{DrawOp, RecordingSurface};

    fn spec(max_width: f32, max_height: f32) -> ImageSpec {
        ImageSpec {
            source: AssetRef::new("charts", "natal", "png"),
            max_width,
            max_height,
        }
    }

    fn solid(width: u32, height: u32) -> DecodedImage {
        DecodedImage {
            width,
            height,
            rgb: vec![128; (width * height * 3) as usize],
            alpha: None,
        }
    }

    #[test]
    fn test_fit_within_preserves_aspect_ratio() {
        let (w, h) = fit_within((800.0, 400.0), (200.0, 200.0));
        assert!((w - 200.0).abs() < 1e-3);
        assert!((h - 100.0).abs() < 1e-3);

        let (w, h) = fit_within((100.0, 300.0), (200.0, 150.0));
        assert!((w - 50.0).abs() < 1e-3);
        assert!((h - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_embed_centres_and_advances_by_scaled_height() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new();
        let image = solid(400, 200);
        {
            let mut writer = PageWriter::new(&mut surface, &config, &chrome);
            writer.break_page(PageKind::Continuation);
            let start = writer.cursor().y;
            let reserved = embed_image(&mut writer, &spec(200.0, 200.0), Ok(&image));
            assert!((reserved - 100.0).abs() < 1e-3);
            assert!((writer.cursor().y - start - 100.0).abs() < 1e-3);
        }
        let rect = surface
            .ops()
            .iter()
            .find_map(|op| match op {
                DrawOp::Image { rect, .. } => Some(*rect),
                _ => None,
            })
            .unwrap();
        let centre = config.margin + config.usable_width() / 2.0;
        assert!((rect.x + rect.width / 2.0 - centre).abs() < 1e-3);
    }

    #[test]
    fn test_failed_asset_reserves_zero_height() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new();
        let mut writer = PageWriter::new(&mut surface, &config, &chrome);
        writer.break_page(PageKind::Continuation);
        let start = writer.cursor().y;

        let err = AssetError::NotFound("charts/natal.png".to_string());
        assert_eq!(embed_image(&mut writer, &spec(200.0, 200.0), Err(&err)), 0.0);
        assert_eq!(writer.cursor().y, start);
        assert_eq!(writer.page_count(), 1);
    }

    #[test]
    fn test_image_taller_than_page_is_clamped() {
        let config = default_page_config();
        let chrome = Chrome::default();
        let mut surface = RecordingSurface::new();
        let mut writer = PageWriter::new(&mut surface, &config, &chrome);
        writer.break_page(PageKind::Continuation);
        let image = solid(10, 5_000);
        let reserved = embed_image(&mut writer, &spec(400.0, 10_000.0), Ok(&image));
        assert!(reserved <= writer.cursor().page_capacity() + 1e-3);
        assert!(writer.cursor().y <= config.bottom_limit());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"not an image").unwrap_err();
        assert!(matches!(err, AssetError::Decode(_)));
    }

    #[test]
    fn test_svg_source_is_a_decode_failure() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="10" height="10"/></svg>"#;
        let err = decode_image(svg).unwrap_err();
        assert!(matches!(err, AssetError::Decode(_)));
    }

    #[test]
    fn test_decode_png_keeps_alpha_only_when_translucent() {
        let mut opaque = image::RgbaImage::new(2, 2);
        opaque.pixels_mut().for_each(|p| p.0 = [10, 20, 30, 255]);
        let mut bytes = Vec::new();
        opaque
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (2, 2));
        assert_eq!(decoded.rgb.len(), 12);
        assert!(decoded.alpha.is_none());

        let mut translucent = opaque.clone();
        translucent.get_pixel_mut(0, 0).0[3] = 0;
        let mut bytes = Vec::new();
        translucent
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(decode_image(&bytes).unwrap().alpha.map(|a| a.len()), Some(4));
    }
}
