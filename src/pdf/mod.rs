use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

use crate::error::{SigilError, SigilResult};
use crate::geometry::{PageRect, PageSize};
use crate::lines::TextLayerChar;
use crate::page::PageSource;

/// Owns the PDFium binding. Documents opened through it borrow it.
pub struct PdfReader {
    pdfium: Pdfium,
}

impl PdfReader {
    /// Bind a PDFium library next to the executable, falling back to the system one
    pub fn new() -> SigilResult<Self> {
        let pdfium = Pdfium::new(
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| SigilError::pdf_processing_with_source("Failed to initialize PDFium", e))?,
        );
        Ok(Self { pdfium })
    }

    pub fn open(&self, path: &Path) -> SigilResult<PdfDocument<'_>> {
        if !path.exists() {
            return Err(SigilError::file_io(
                path.display().to_string(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "PDF file not found"),
            ));
        }
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| SigilError::pdf_processing_with_source(format!("Failed to load PDF {}", path.display()), e))?;
        debug!(path = %path.display(), pages = document.pages().len(), "PDF opened");
        Ok(document)
    }
}

pub fn page_count(document: &PdfDocument<'_>) -> u32 {
    document.pages().len() as u32
}

/// Load a 1-based page
pub fn load_page<'a>(document: &PdfDocument<'a>, page_number: u32) -> SigilResult<PdfPageSource<'a>> {
    if page_number == 0 || page_number > page_count(document) {
        return Err(SigilError::InvalidPageNumber { value: page_number.to_string() });
    }
    let page = document
        .pages()
        .get((page_number - 1) as u16)
        .map_err(|e| SigilError::page_failed(page_number, format!("Failed to get page: {}", e)))?;
    Ok(PdfPageSource::new(page, page_number))
}

/// A PDF page seen through the `PageSource` interface
pub struct PdfPageSource<'a> {
    page: PdfPage<'a>,
    page_number: u32,
}

impl<'a> PdfPageSource<'a> {
    pub fn new(page: PdfPage<'a>, page_number: u32) -> Self {
        Self { page, page_number }
    }

    fn render_over(&self, zoom: f32, clear: PdfColor) -> SigilResult<RgbaImage> {
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(zoom)
            .set_clear_color(clear);

        let bitmap = self
            .page
            .render_with_config(&render_config)
            .map_err(|e| SigilError::page_failed(self.page_number, format!("Failed to render: {}", e)))?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        let bytes = bitmap.as_rgba_bytes().to_vec();

        RgbaImage::from_raw(width, height, bytes)
            .ok_or_else(|| SigilError::page_failed(self.page_number, "Failed to create image from bitmap"))
    }
}

impl PageSource for PdfPageSource<'_> {
    fn page_size(&self) -> PageSize {
        PageSize::new(self.page.width().value, self.page.height().value)
    }

    fn render(&self, zoom: f32) -> SigilResult<RgbaImage> {
        self.render_over(zoom, PdfColor::new(255, 255, 255, 0))
    }

    fn render_opaque(&self, zoom: f32) -> SigilResult<RgbaImage> {
        self.render_over(zoom, PdfColor::new(255, 255, 255, 255))
    }

    /// PDF space is bottom-left; boxes come back flipped to top-left
    fn text_layer(&self) -> SigilResult<Vec<TextLayerChar>> {
        let page_height = self.page.height().value;
        let text = self
            .page
            .text()
            .map_err(|e| SigilError::page_failed(self.page_number, format!("Failed to read text layer: {}", e)))?;

        let mut chars = Vec::new();
        for text_char in text.chars().iter() {
            let ch = match text_char.unicode_char() {
                Some(ch) => ch,
                None => continue,
            };
            let bbox = text_char
                .loose_bounds()
                .ok()
                .map(|b| {
                    PageRect::from_bottom_left(
                        b.left().value,
                        b.bottom().value,
                        b.right().value,
                        b.top().value,
                        page_height,
                    )
                })
                .filter(|r| r.width() > 0.0 || r.height() > 0.0);
            chars.push(TextLayerChar { ch, bbox });
        }

        debug!(page = self.page_number, chars = chars.len(), "Text layer read");
        Ok(chars)
    }
}
