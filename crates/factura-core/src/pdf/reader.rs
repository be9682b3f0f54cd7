//! PDF backend built on lopdf (structure, images) and pdf-extract (text).

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::{PageSource, PdfType, Result};
use crate::error::PdfError;
use crate::models::document::{Block, PdfMetadata};

/// Default PDF backend.
///
/// `open` parses structure, captures metadata, and extracts the native
/// text layer for every page. Rasters for OCR are located lazily.
pub struct PdfReader {
    document: Option<Document>,
    raw_data: Vec<u8>,
    page_texts: Vec<String>,
    metadata: PdfMetadata,
}

impl PdfReader {
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
            page_texts: Vec::new(),
            metadata: PdfMetadata::default(),
        }
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("no document loaded".to_string()))
    }

    fn check_page(&self, page: u32) -> Result<()> {
        if page == 0 || page > self.page_count() {
            return Err(PdfError::InvalidPage(page));
        }
        Ok(())
    }

    /// Classify the document by its native content.
    pub fn classify(&self) -> PdfType {
        let has_text = self.page_texts.iter().any(|t| !t.trim().is_empty());
        let has_images = self
            .document
            .as_ref()
            .map(|doc| {
                doc.objects
                    .values()
                    .any(|obj| is_image_stream(obj))
            })
            .unwrap_or(false);

        match (has_text, has_images) {
            (true, false) => PdfType::Text,
            (false, true) => PdfType::Image,
            (true, true) => PdfType::Hybrid,
            (false, false) => PdfType::Empty,
        }
    }

    fn read_metadata(doc: &Document, encrypted: bool, page_texts: &[String]) -> PdfMetadata {
        let info = doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|obj| doc.dereference(obj).ok())
            .and_then(|(_, obj)| obj.as_dict().ok().cloned());

        let field = |key: &[u8]| -> Option<String> {
            info.as_ref()
                .and_then(|dict| dict.get(key).ok())
                .and_then(decode_string_object)
        };

        let xmp = doc
            .catalog()
            .ok()
            .and_then(|catalog| catalog.get(b"Metadata").ok())
            .and_then(|obj| doc.dereference(obj).ok())
            .and_then(|(_, obj)| match obj {
                Object::Stream(stream) => Some(
                    String::from_utf8_lossy(
                        &stream
                            .decompressed_content()
                            .unwrap_or_else(|_| stream.content.clone()),
                    )
                    .into_owned(),
                ),
                _ => None,
            });

        PdfMetadata {
            producer: field(b"Producer"),
            created_at: field(b"CreationDate"),
            modified_at: field(b"ModDate"),
            encrypted,
            has_native_text: page_texts.iter().any(|t| !t.trim().is_empty()),
            xmp,
        }
    }

    /// All decodable images on a page, via its (possibly inherited)
    /// resource dictionary.
    fn page_images(&self, page: u32) -> Result<Vec<DynamicImage>> {
        let doc = self.document()?;
        let pages = doc.get_pages();
        let page_id = *pages.get(&page).ok_or(PdfError::InvalidPage(page))?;

        let mut images = Vec::new();
        if let Some(resources) = resources_for(doc, page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        if let Ok((_, obj)) = doc.dereference(obj_ref) {
                            if let Some(img) = image_from_object(doc, obj) {
                                images.push(img);
                            }
                        }
                    }
                }
            }
        }
        debug!("found {} images on page {}", images.len(), page);
        Ok(images)
    }
}

impl Default for PdfReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSource for PdfReader {
    fn open(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        let encrypted = doc.is_encrypted();
        if encrypted {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("decrypted PDF with empty password");

            // pdf-extract needs the decrypted bytes
            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        // Native text layer, one entry per page. Extraction failure means
        // there is no usable layer, which the OCR decision handles later.
        let mut page_texts = match pdf_extract::extract_text_from_mem_by_pages(&self.raw_data) {
            Ok(texts) => texts,
            Err(e) => {
                warn!("native text extraction failed, treating pages as scanned: {}", e);
                Vec::new()
            }
        };
        page_texts.resize(page_count, String::new());

        self.metadata = Self::read_metadata(&doc, encrypted, &page_texts);
        self.page_texts = page_texts;
        self.document = Some(doc);

        debug!(
            "loaded PDF: {} pages, native text: {}",
            page_count, self.metadata.has_native_text
        );
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn metadata(&self) -> PdfMetadata {
        self.metadata.clone()
    }

    fn native_text(&self, page: u32) -> Result<String> {
        self.document()?;
        self.check_page(page)?;
        Ok(self.page_texts[(page - 1) as usize].clone())
    }

    fn native_blocks(&self, page: u32) -> Result<Vec<Block>> {
        let doc = self.document()?;
        self.check_page(page)?;

        let pages = doc.get_pages();
        let page_id = *pages.get(&page).ok_or(PdfError::InvalidPage(page))?;
        let content = doc
            .get_page_content(page_id)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))?;
        let content = Content::decode(&content)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))?;

        Ok(blocks_from_content(&content))
    }

    fn rasterize(&self, page: u32, dpi: u32) -> Result<DynamicImage> {
        self.check_page(page)?;

        // Scanned pages carry their raster as an embedded image; the
        // largest one is the page scan.
        let mut images = self.page_images(page)?;
        if images.is_empty() {
            // Some producers attach page scans outside the page resources.
            let doc = self.document()?;
            images = doc
                .objects
                .values()
                .filter_map(|obj| image_from_object(doc, obj))
                .collect();
            debug!(
                "no page-scoped images on page {}, document scan found {}",
                page,
                images.len()
            );
        }

        let image = images
            .into_iter()
            .max_by_key(|img| (img.width() as u64) * (img.height() as u64))
            .ok_or_else(|| PdfError::PageRender {
                page,
                reason: "no raster content found".to_string(),
            })?;

        Ok(scale_to_dpi(image, self.page_width_points(page), dpi))
    }
}

impl PdfReader {
    /// MediaBox width in points, when the page declares one.
    fn page_width_points(&self, page: u32) -> Option<f32> {
        let doc = self.document.as_ref()?;
        let pages = doc.get_pages();
        let page_id = *pages.get(&page)?;
        let dict = doc.get_object(page_id).ok()?.as_dict().ok()?;
        let media_box = dict.get(b"MediaBox").ok()?;
        let (_, media_box) = doc.dereference(media_box).ok()?;
        if let Object::Array(values) = media_box {
            if values.len() == 4 {
                let x0 = operand_number(values.first())?;
                let x1 = operand_number(values.get(2))?;
                return Some((x1 - x0).abs());
            }
        }
        None
    }
}

/// Downscale an embedded scan that is much denser than the target DPI.
/// Upscaling is never done; it adds no information for OCR.
fn scale_to_dpi(image: DynamicImage, page_width_pts: Option<f32>, dpi: u32) -> DynamicImage {
    let Some(width_pts) = page_width_pts else {
        return image;
    };
    if width_pts <= 0.0 || dpi == 0 {
        return image;
    }
    let target_width = (width_pts / 72.0 * dpi as f32).round() as u32;
    if target_width > 0 && image.width() > target_width + target_width / 4 {
        let target_height =
            (image.height() as u64 * target_width as u64 / image.width() as u64) as u32;
        trace!(
            "downscaling page raster {}x{} -> {}x{}",
            image.width(),
            image.height(),
            target_width,
            target_height
        );
        return image.resize(
            target_width,
            target_height.max(1),
            image::imageops::FilterType::Triangle,
        );
    }
    image
}

fn is_image_stream(obj: &Object) -> bool {
    if let Object::Stream(stream) = obj {
        if let Ok(subtype) = stream.dict.get(b"Subtype") {
            return subtype.as_name().map(|n| n == b"Image").unwrap_or(false);
        }
    }
    false
}

/// Decode a PDF text string: UTF-16BE when the BOM says so, UTF-8 when
/// valid, Latin-1 otherwise. Latin-1 covers WinAnsi-encoded invoice text
/// closely enough for layout and metadata purposes.
fn decode_text_bytes(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn decode_string_object(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text_bytes(bytes)),
        _ => None,
    }
}

/// Resource dictionary for a page node, walking up the page tree when
/// the page inherits its resources.
fn resources_for(doc: &Document, node_id: ObjectId) -> Option<lopdf::Dictionary> {
    let dict = doc.get_object(node_id).ok()?.as_dict().ok()?;
    if let Ok(resources) = dict.get(b"Resources") {
        if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
            return Some(res_dict.clone());
        }
    }
    match dict.get(b"Parent") {
        Ok(Object::Reference(parent_id)) => resources_for(doc, *parent_id),
        _ => None,
    }
}

fn image_from_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }
    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    trace!("image XObject: {}x{}", width, height);

    let filter_name = dict.get(b"Filter").ok().and_then(|filter| match filter {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
        _ => None,
    });
    match filter_name {
        Some(b"DCTDecode") => {
            // JPEG stream, already compressed
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                .ok();
        }
        Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
            trace!("unsupported image filter, skipping");
            return None;
        }
        _ => {}
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");
    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);

    image_from_raw(&data, width, height, color_space, bits as u8)
}

fn image_from_raw(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
    bits_per_component: u8,
) -> Option<DynamicImage> {
    if bits_per_component != 8 {
        trace!("unsupported bits per component: {}", bits_per_component);
        return None;
    }

    let pixel_count = (width as usize) * (height as usize);
    let mut rgba = Vec::with_capacity(pixel_count * 4);

    if color_space == b"DeviceRGB" || color_space == b"RGB" {
        let expected = pixel_count * 3;
        if data.len() < expected {
            return None;
        }
        for chunk in data[..expected].chunks_exact(3) {
            rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
        }
    } else if color_space == b"DeviceGray" || color_space == b"G" {
        if data.len() < pixel_count {
            return None;
        }
        for &gray in &data[..pixel_count] {
            rgba.extend_from_slice(&[gray, gray, gray, 255]);
        }
    } else {
        trace!(
            "unsupported color space: {}",
            String::from_utf8_lossy(color_space)
        );
        return None;
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

fn operand_number(obj: Option<&Object>) -> Option<f32> {
    match obj? {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Group the text-showing operations of a content stream into line
/// blocks. Positions come from the text matrix; widths are estimated
/// from font size, exact glyph metrics are not consulted.
fn blocks_from_content(content: &Content) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut x = 0.0f32;
    let mut y = 0.0f32;
    let mut font_size = 12.0f32;
    let mut leading = 0.0f32;

    let mut push_text = |blocks: &mut Vec<Block>, x: f32, y: f32, size: f32, text: String| {
        if text.trim().is_empty() {
            return;
        }
        let est_width = 0.5 * size * text.chars().count() as f32;
        // Continue the current block while we stay on the same text line.
        if let Some(last) = blocks.last_mut() {
            if (last.coords.1 - y).abs() < size * 0.5 && x >= last.coords.0 {
                if !last.text.ends_with(' ') && x > last.coords.2 + size * 0.2 {
                    last.text.push(' ');
                }
                last.text.push_str(&text);
                last.coords.2 = last.coords.2.max(x + est_width);
                last.coords.3 = last.coords.3.max(y + size);
                return;
            }
        }
        blocks.push(Block {
            text,
            coords: (x, y, x + est_width, y + size),
            confidence: None,
        });
    };

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => {
                x = 0.0;
                y = 0.0;
            }
            "Tf" => {
                if let Some(size) = operand_number(op.operands.get(1)) {
                    font_size = size;
                }
            }
            "TL" => {
                if let Some(l) = operand_number(op.operands.first()) {
                    leading = l;
                }
            }
            "Td" => {
                x += operand_number(op.operands.first()).unwrap_or(0.0);
                y += operand_number(op.operands.get(1)).unwrap_or(0.0);
            }
            "TD" => {
                let ty = operand_number(op.operands.get(1)).unwrap_or(0.0);
                x += operand_number(op.operands.first()).unwrap_or(0.0);
                y += ty;
                leading = -ty;
            }
            "Tm" => {
                x = operand_number(op.operands.get(4)).unwrap_or(x);
                y = operand_number(op.operands.get(5)).unwrap_or(y);
            }
            "T*" => {
                y -= if leading != 0.0 {
                    leading
                } else {
                    font_size * 1.2
                };
            }
            "Tj" => {
                if let Some(text) = op.operands.first().and_then(decode_string_object) {
                    push_text(&mut blocks, x, y, font_size, text);
                }
            }
            "'" => {
                y -= if leading != 0.0 {
                    leading
                } else {
                    font_size * 1.2
                };
                if let Some(text) = op.operands.first().and_then(decode_string_object) {
                    push_text(&mut blocks, x, y, font_size, text);
                }
            }
            "\"" => {
                y -= if leading != 0.0 {
                    leading
                } else {
                    font_size * 1.2
                };
                if let Some(text) = op.operands.get(2).and_then(decode_string_object) {
                    push_text(&mut blocks, x, y, font_size, text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(parts)) = op.operands.first() {
                    let text: String = parts.iter().filter_map(decode_string_object).collect();
                    push_text(&mut blocks, x, y, font_size, text);
                }
            }
            _ => {}
        }
    }

    blocks
}
