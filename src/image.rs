//! Embedding an image at a placeholder paragraph.
//!
//! The image is always drawn at a fixed footprint (the configured pixel size
//! converted to EMU), whatever its native resolution, so the surrounding
//! layout does not move between recipients.

use std::io::Cursor;

use crate::error::{EngineError, ImageError};
use crate::model::{Document, Run};
use crate::package::{self, DocxPackage, REL_IMAGE};
use crate::walker;

/// English Metric Units per pixel at 96 DPI.
pub const EMU_PER_PIXEL: u64 = 9525;

pub const DEFAULT_WIDTH_PX: u32 = 260;
pub const DEFAULT_HEIGHT_PX: u32 = 70;

/// Display size of an inserted image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width_px: u32,
    pub height_px: u32,
}

impl ImageSize {
    pub fn new(width_px: u32, height_px: u32) -> Self {
        Self {
            width_px,
            height_px,
        }
    }

    /// `(cx, cy)` in EMU.
    pub fn emu(&self) -> (u64, u64) {
        (
            self.width_px as u64 * EMU_PER_PIXEL,
            self.height_px as u64 * EMU_PER_PIXEL,
        )
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH_PX, DEFAULT_HEIGHT_PX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
        }
    }
}

/// Result of an insertion attempt. Only `Inserted` changed the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    PlaceholderNotFound,
    ImageUnreadable,
    /// The image was readable but the package could not take it (broken
    /// relationships or content types).
    InsertFailed,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted)
    }
}

/// Identify the image format and make sure the stream is readable.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        let decoder = png::Decoder::new(Cursor::new(bytes));
        let reader = decoder.read_info()?;
        let info = reader.info();
        log::debug!("PNG image {}x{}", info.width, info.height);
        return Ok(ImageFormat::Png);
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Ok(ImageFormat::Jpeg);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Ok(ImageFormat::Gif);
    }
    Err(ImageError::Unsupported)
}

/// Replace the runs of the first paragraph containing `placeholder` with a
/// single run holding `image`.
///
/// Never fails the document: a missing placeholder, an unreadable image or a
/// package that cannot take the image is logged and reported, and the
/// placeholder paragraph is left as it was.
pub fn insert_image(
    document: &mut Document,
    placeholder: &str,
    image: &[u8],
    size: ImageSize,
) -> InsertOutcome {
    let Some(location) = walker::find_paragraph(document, placeholder) else {
        return InsertOutcome::PlaceholderNotFound;
    };

    let format = match detect_format(image) {
        Ok(format) => format,
        Err(e) => {
            log::warn!("Image for {} could not be read: {}", placeholder, e);
            return InsertOutcome::ImageUnreadable;
        }
    };

    let Some((package, part)) = document.package_and_part_mut(location.part) else {
        return InsertOutcome::PlaceholderNotFound;
    };
    if walker::paragraph_mut(&mut part.nodes, &location.path).is_none() {
        return InsertOutcome::PlaceholderNotFound;
    }

    let (rel_id, media_name) = match embed_media(package, &part.name, format, image) {
        Ok(embedded) => embedded,
        Err(e) => {
            log::warn!(
                "Image for {} could not be embedded in {}: {}",
                placeholder,
                part.name,
                e
            );
            return InsertOutcome::InsertFailed;
        }
    };

    let file_name = media_name.rsplit('/').next().unwrap_or(&media_name).to_string();
    let run = Run::raw(inline_drawing_xml(
        &rel_id,
        drawing_id(package.len()),
        &file_name,
        size,
    ));
    if let Some(paragraph) = walker::paragraph_mut(&mut part.nodes, &location.path) {
        paragraph.replace_runs(vec![run]);
    }
    log::debug!("Embedded {} in {} as {}", media_name, part.name, rel_id);
    InsertOutcome::Inserted
}

/// Add the media entry, its relationship from `part_name` and its content
/// type. Nothing is written unless every step succeeds.
fn embed_media(
    package: &mut DocxPackage,
    part_name: &str,
    format: ImageFormat,
    image: &[u8],
) -> Result<(String, String), EngineError> {
    let media_name = package.next_media_name("signature", format.extension());
    let target = media_name
        .strip_prefix(&format!("{}/", package::part_dir(part_name)))
        .map(str::to_string)
        .unwrap_or_else(|| format!("/{}", media_name));

    let (rel_id, rels) = package.relationship_update(part_name, REL_IMAGE, &target)?;
    let types = package.content_type_update(format.extension(), format.content_type())?;

    package.apply(rels);
    if let Some(types) = types {
        package.apply(types);
    }
    package.set(&media_name, image.to_vec());
    Ok((rel_id, media_name))
}

// docPr ids only need to be unique within the document; templates number
// their own drawings from 1.
fn drawing_id(entry_count: usize) -> usize {
    10_000 + entry_count
}

/// A `<w:r>` holding an inline picture. Namespaces are declared locally so
/// the run is valid in parts whose root does not declare them.
pub fn inline_drawing_xml(rel_id: &str, id: usize, name: &str, size: ImageSize) -> String {
    let (cx, cy) = size.emu();
    let name = quick_xml::escape::escape(name);
    format!(
        concat!(
            r#"<w:r><w:drawing>"#,
            r#"<wp:inline xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
            r#"<wp:docPr id="{id}" name="Signature {id}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
        ),
        cx = cx,
        cy = cy,
        id = id,
        name = name,
        rel = rel_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, 2, 1);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0, 0, 0, 255, 255, 255]).unwrap();
        }
        out
    }

    #[test]
    fn test_default_size_in_emu() {
        assert_eq!(ImageSize::default().emu(), (2_476_500, 666_750));
    }

    #[test]
    fn test_detect_format_known_signatures() {
        assert_eq!(detect_format(&tiny_png()).unwrap(), ImageFormat::Png);
        assert_eq!(
            detect_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]).unwrap(),
            ImageFormat::Jpeg
        );
        assert_eq!(detect_format(b"GIF89a....").unwrap(), ImageFormat::Gif);
    }

    #[test]
    fn test_detect_format_failures() {
        assert!(matches!(detect_format(&[]), Err(ImageError::Empty)));
        assert!(matches!(
            detect_format(b"not an image"),
            Err(ImageError::Unsupported)
        ));
        // PNG signature followed by garbage
        let mut broken = b"\x89PNG\r\n\x1a\n".to_vec();
        broken.extend_from_slice(b"garbage");
        assert!(matches!(detect_format(&broken), Err(ImageError::Png(_))));
    }

    #[test]
    fn test_inline_drawing_xml_is_well_formed() {
        let xml = inline_drawing_xml("rId5", 10_001, "signature1.png", ImageSize::default());
        assert!(xml.contains(r#"r:embed="rId5""#));
        assert!(xml.contains(r#"cx="2476500" cy="666750""#));
        let mut reader = quick_xml::Reader::from_str(&xml);
        loop {
            match reader.read_event().unwrap() {
                quick_xml::events::Event::Eof => break,
                _ => {}
            }
        }
    }
}
