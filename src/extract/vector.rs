use tracing::debug;

use super::{reference_annotations, LinePiece, PageExtractor};
use crate::error::SigilResult;
use crate::geometry::PageSize;
use crate::glyph::{classify_vector_char, dedup_annotations, record_glyph, GlyphVerdict, SigilWriter};
use crate::lines::{char_lines, TextLayerChar};
use crate::model::{ExtractionMethod, PageExtraction, VisualAnnotation, VisualKind};
use crate::page::PageSource;
use crate::segmenter::{EntrySegmenter, LineRole};
use crate::sigil_store::{PageSigilWriter, SigilImageStore};

/// Reads the PDF's own text layer, no OCR involved
#[derive(Debug, Default)]
pub struct VectorExtractor;

impl VectorExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl PageExtractor for VectorExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Direct
    }

    fn extract_page(
        &self,
        page: &dyn PageSource,
        page_number: u32,
        store: &mut SigilImageStore,
    ) -> SigilResult<PageExtraction> {
        let chars = page.text_layer()?;
        let size = page.page_size();
        let mut writer = PageSigilWriter::new(store, page);
        Ok(process_text_layer(&chars, size, page_number, &mut writer))
    }
}

/// Segment a page's text-layer characters into entries and detect glyph
/// characters. Character boxes must already be top-left origin.
pub fn process_text_layer(
    chars: &[TextLayerChar],
    page_size: PageSize,
    page_number: u32,
    writer: &mut dyn SigilWriter,
) -> PageExtraction {
    let mut segmenter = EntrySegmenter::new(page_number);
    let mut annotations = Vec::new();

    for line in char_lines(chars) {
        let members = &chars[line.members.clone()];
        let role = segmenter.feed_line(&line.text);

        // line text is trimmed; offsets below are relative to its first byte
        let raw: String = members.iter().map(|c| c.ch).collect();
        let lead = raw.len() - raw.trim_start().len();

        let mut pieces = Vec::with_capacity(members.len());
        let mut offset = 0;
        for c in members {
            let len = c.ch.len_utf8();
            if offset >= lead {
                pieces.push(LinePiece { span: offset - lead..offset - lead + len, rect: c.bbox });
            }
            offset += len;

            let bbox = match c.bbox {
                Some(bbox) => bbox,
                None => continue,
            };
            if let GlyphVerdict::Accepted(region) = classify_vector_char(c.ch, bbox, page_size) {
                let glyph = c.ch.to_string();
                let kind = record_glyph(&mut segmenter, writer, &glyph, region, ExtractionMethod::Direct);
                annotations.push(VisualAnnotation::new(region, kind, &glyph));
            }
        }

        if let Some(rect) = members.iter().filter_map(|c| c.bbox).reduce(|a, b| a.union(&b)) {
            let kind = if role == LineRole::Heading {
                VisualKind::Heading
            } else {
                VisualKind::TextBlock
            };
            annotations.push(VisualAnnotation::new(rect, kind, &line.text));
        }

        annotations.extend(reference_annotations(&line.text, &pieces));
    }

    let entries = segmenter.finish();
    debug!(page = page_number, entries = entries.len(), chars = chars.len(), "Text layer processed");
    PageExtraction {
        entries,
        annotations: dedup_annotations(annotations),
    }
}
