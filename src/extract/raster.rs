use tracing::debug;

use super::{reference_annotations, LinePiece, PageExtractor};
use crate::error::SigilResult;
use crate::geometry::Scale;
use crate::glyph::{classify_raster_token, dedup_annotations, record_glyph, GlyphVerdict, SigilWriter};
use crate::lines::{token_lines, OcrToken};
use crate::model::{ExtractionMethod, PageExtraction, VisualAnnotation, VisualKind};
use crate::ocr::TesseractEngine;
use crate::page::PageSource;
use crate::segmenter::{EntrySegmenter, LineRole};
use crate::sigil_store::{PageSigilWriter, SigilImageStore};

/// Renders each page and reads it back with tesseract
pub struct RasterExtractor {
    engine: TesseractEngine,
    preview_zoom: f32,
}

impl RasterExtractor {
    pub fn new(engine: TesseractEngine, preview_zoom: f32) -> Self {
        Self { engine, preview_zoom }
    }
}

impl PageExtractor for RasterExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    fn prepare(&self) -> SigilResult<()> {
        self.engine.check_available()
    }

    fn extract_page(
        &self,
        page: &dyn PageSource,
        page_number: u32,
        store: &mut SigilImageStore,
    ) -> SigilResult<PageExtraction> {
        let image = page.render_opaque(self.preview_zoom)?;
        let size = page.page_size();
        // the renderer rounds to whole pixels, so derive the scale from the result
        let scale = Scale {
            x: image.width() as f32 / size.width,
            y: image.height() as f32 / size.height,
        };

        let tokens = self.engine.recognize(&image, page_number)?;
        let mut writer = PageSigilWriter::new(store, page);
        Ok(process_ocr_tokens(&tokens, page_number, scale, &mut writer))
    }
}

/// Segment OCR tokens into entries and detect glyph tokens. `scale` maps the
/// tokens' pixel boxes back to page units.
pub fn process_ocr_tokens(
    tokens: &[OcrToken],
    page_number: u32,
    scale: Scale,
    writer: &mut dyn SigilWriter,
) -> PageExtraction {
    let mut segmenter = EntrySegmenter::new(page_number);
    let mut annotations = Vec::new();

    for line in token_lines(tokens) {
        let role = segmenter.feed_line(&line.text);
        let mut pieces = Vec::new();
        let mut cursor = 0;

        for token in &tokens[line.members.clone()] {
            let text = token.text.trim();
            if text.is_empty() {
                continue;
            }
            let rect = token.pixel_box.to_page(scale);
            pieces.push(LinePiece { span: cursor..cursor + text.len(), rect: Some(rect) });
            cursor += text.len() + 1;

            let part_of_heading = role == LineRole::Heading
                && segmenter.open_heading().map_or(false, |h| h.contains(text));

            let kind = if part_of_heading {
                VisualKind::Heading
            } else {
                match classify_raster_token(text, rect) {
                    GlyphVerdict::Accepted(region) => {
                        record_glyph(&mut segmenter, writer, text, region, ExtractionMethod::Ocr)
                    }
                    _ => VisualKind::TextBlock,
                }
            };
            annotations.push(VisualAnnotation::new(rect, kind, text));
        }

        annotations.extend(reference_annotations(&line.text, &pieces));
    }

    let entries = segmenter.finish();
    debug!(page = page_number, entries = entries.len(), tokens = tokens.len(), "OCR page processed");
    PageExtraction {
        entries,
        annotations: dedup_annotations(annotations),
    }
}
