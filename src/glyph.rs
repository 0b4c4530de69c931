//! Glyph candidate detection shared by the raster and vector strategies.

use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::SigilResult;
use crate::geometry::{PageRect, PageSize};
use crate::model::{ExtractionMethod, SigilMetadata, VisualAnnotation, VisualKind};
use crate::segmenter::EntrySegmenter;

/// Punctuation that never counts as a glyph
pub const COMMON_PUNCTUATION: [char; 12] = ['.', ',', ';', ':', '(', ')', '\'', '"', '[', ']', '!', '?'];

/// The text layer also treats these as punctuation; OCR tokens do not
pub const VECTOR_EXTRA_PUNCTUATION: [char; 2] = ['-', '/'];

pub const MAX_OCR_GLYPH_CHARS: usize = 5;
pub const SIGIL_PADDING: f32 = 1.0;
pub const MAX_SIGIL_HEIGHT: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRejection {
    Empty,
    TooLong,
    Whitespace,
    Alphanumeric,
    Punctuation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryRejection {
    OutOfBounds,
    TooWide,
    TooTall,
}

/// Every token or character lands in exactly one of these
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlyphVerdict {
    /// Region to crop, in page units
    Accepted(PageRect),
    RejectedText(TextRejection),
    RejectedGeometry(GeometryRejection),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// OCR token rule: 1–5 non-word, non-space, non-punctuation characters.
/// Hyphen and slash pass.
pub fn classify_raster_token(text: &str, page_box: PageRect) -> GlyphVerdict {
    let text = text.trim();
    let len = text.chars().count();
    if len == 0 {
        return GlyphVerdict::RejectedText(TextRejection::Empty);
    }
    if len > MAX_OCR_GLYPH_CHARS {
        return GlyphVerdict::RejectedText(TextRejection::TooLong);
    }
    if text.chars().any(char::is_whitespace) {
        return GlyphVerdict::RejectedText(TextRejection::Whitespace);
    }
    if text.chars().any(is_word_char) {
        return GlyphVerdict::RejectedText(TextRejection::Alphanumeric);
    }
    if text.chars().any(|c| COMMON_PUNCTUATION.contains(&c)) {
        return GlyphVerdict::RejectedText(TextRejection::Punctuation);
    }
    GlyphVerdict::Accepted(page_box)
}

/// Text-layer character rule. The box is padded before the size guards so a
/// stray vector drawing is not mistaken for a glyph.
pub fn classify_vector_char(ch: char, bbox: PageRect, page: PageSize) -> GlyphVerdict {
    if ch.is_whitespace() {
        return GlyphVerdict::RejectedText(TextRejection::Whitespace);
    }
    if ch.is_alphanumeric() {
        return GlyphVerdict::RejectedText(TextRejection::Alphanumeric);
    }
    if COMMON_PUNCTUATION.contains(&ch) || VECTOR_EXTRA_PUNCTUATION.contains(&ch) {
        return GlyphVerdict::RejectedText(TextRejection::Punctuation);
    }

    let padded = bbox.pad(SIGIL_PADDING);
    if !padded.is_within(page) {
        return GlyphVerdict::RejectedGeometry(GeometryRejection::OutOfBounds);
    }
    if padded.width() > page.width / 2.0 {
        return GlyphVerdict::RejectedGeometry(GeometryRejection::TooWide);
    }
    if padded.height() > MAX_SIGIL_HEIGHT {
        return GlyphVerdict::RejectedGeometry(GeometryRejection::TooTall);
    }
    GlyphVerdict::Accepted(padded)
}

/// Persists a glyph region of the page being processed
pub trait SigilWriter {
    /// `Ok(None)` means nothing was written (empty crop)
    fn write_sigil(&mut self, region: PageRect, heading: &str, page_number: u32) -> SigilResult<Option<PathBuf>>;
}

/// Crop and attach an accepted glyph to the entry open at this point of the
/// page. Returns the overlay kind: `SavedSigil` only when an image was
/// actually written and attached.
pub fn record_glyph(
    segmenter: &mut EntrySegmenter,
    writer: &mut dyn SigilWriter,
    source_text: &str,
    region: PageRect,
    method: ExtractionMethod,
) -> VisualKind {
    let page_number = segmenter.page_number();
    let heading = match segmenter.open_heading() {
        Some(h) => h.to_string(),
        None => {
            debug!(page = page_number, glyph = source_text, "Glyph outside any entry, dropped");
            return VisualKind::PotentialSymbol;
        }
    };

    let path = match writer.write_sigil(region, &heading, page_number) {
        Ok(Some(path)) => path,
        Ok(None) => return VisualKind::PotentialSymbol,
        Err(e) => {
            warn!(page = page_number, heading = %heading, error = %e, "Error saving sigil");
            return VisualKind::PotentialSymbol;
        }
    };

    let sigil = SigilMetadata {
        image_path: path.to_string_lossy().to_string(),
        parent_entry_heading: heading,
        page_number,
        source_text: source_text.to_string(),
        bounding_box: region,
        extraction_method: method,
    };

    if segmenter.attach_sigil(sigil) {
        VisualKind::SavedSigil
    } else {
        VisualKind::PotentialSymbol
    }
}

/// Keep the first annotation for each distinct rectangle
pub fn dedup_annotations(annotations: Vec<VisualAnnotation>) -> Vec<VisualAnnotation> {
    let mut seen = HashSet::new();
    annotations
        .into_iter()
        .filter(|a| seen.insert(a.rect.key()))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingWriter;
    use super::*;

    const PAGE: PageSize = PageSize { width: 500.0, height: 700.0 };

    fn unit_box() -> PageRect {
        PageRect::new(0.0, 0.0, 1.0, 1.0)
    }

    #[test]
    fn test_raster_accepts_symbol_runs() {
        assert!(matches!(classify_raster_token("☉", unit_box()), GlyphVerdict::Accepted(_)));
        assert!(matches!(classify_raster_token(" ♂♀ ", unit_box()), GlyphVerdict::Accepted(_)));
        assert!(matches!(classify_raster_token("-", unit_box()), GlyphVerdict::Accepted(_)));
        assert!(matches!(classify_raster_token("/", unit_box()), GlyphVerdict::Accepted(_)));
    }

    #[test]
    fn test_raster_rejections() {
        let r = |t: &str| classify_raster_token(t, unit_box());
        assert_eq!(r(""), GlyphVerdict::RejectedText(TextRejection::Empty));
        assert_eq!(r("☉☉☉☉☉☉"), GlyphVerdict::RejectedText(TextRejection::TooLong));
        assert_eq!(r("☉ ☉"), GlyphVerdict::RejectedText(TextRejection::Whitespace));
        assert_eq!(r("a☉"), GlyphVerdict::RejectedText(TextRejection::Alphanumeric));
        assert_eq!(r("_"), GlyphVerdict::RejectedText(TextRejection::Alphanumeric));
        assert_eq!(r("☉."), GlyphVerdict::RejectedText(TextRejection::Punctuation));
        assert_eq!(r("?!"), GlyphVerdict::RejectedText(TextRejection::Punctuation));
    }

    #[test]
    fn test_vector_padded_box_accepted() {
        let verdict = classify_vector_char('☿', PageRect::new(10.0, 10.0, 12.0, 12.0), PAGE);
        assert_eq!(verdict, GlyphVerdict::Accepted(PageRect::new(9.0, 9.0, 13.0, 13.0)));
    }

    #[test]
    fn test_vector_too_tall_rejected() {
        // padded height: 69 - 9 = 60
        let verdict = classify_vector_char('☿', PageRect::new(10.0, 10.0, 12.0, 68.0), PAGE);
        assert_eq!(verdict, GlyphVerdict::RejectedGeometry(GeometryRejection::TooTall));
    }

    #[test]
    fn test_vector_geometry_rejections() {
        let out = classify_vector_char('☿', PageRect::new(0.5, 10.0, 3.0, 12.0), PAGE);
        assert_eq!(out, GlyphVerdict::RejectedGeometry(GeometryRejection::OutOfBounds));

        let wide = classify_vector_char('☿', PageRect::new(10.0, 10.0, 300.0, 12.0), PAGE);
        assert_eq!(wide, GlyphVerdict::RejectedGeometry(GeometryRejection::TooWide));
    }

    #[test]
    fn test_vector_text_rejections() {
        let b = PageRect::new(10.0, 10.0, 12.0, 12.0);
        assert_eq!(classify_vector_char('a', b, PAGE), GlyphVerdict::RejectedText(TextRejection::Alphanumeric));
        assert_eq!(classify_vector_char('7', b, PAGE), GlyphVerdict::RejectedText(TextRejection::Alphanumeric));
        assert_eq!(classify_vector_char(' ', b, PAGE), GlyphVerdict::RejectedText(TextRejection::Whitespace));
        assert_eq!(classify_vector_char('-', b, PAGE), GlyphVerdict::RejectedText(TextRejection::Punctuation));
        assert_eq!(classify_vector_char(';', b, PAGE), GlyphVerdict::RejectedText(TextRejection::Punctuation));
    }

    #[test]
    fn test_record_glyph_without_entry_writes_nothing() {
        let mut seg = EntrySegmenter::new(1);
        let mut writer = RecordingWriter::default();
        let kind = record_glyph(&mut seg, &mut writer, "☉", unit_box(), ExtractionMethod::Ocr);
        assert_eq!(kind, VisualKind::PotentialSymbol);
        assert!(writer.requests.is_empty());
    }

    #[test]
    fn test_record_glyph_attaches_to_open_entry() {
        let mut seg = EntrySegmenter::new(4);
        seg.feed_line("GOLD Alc. The sun.");
        let mut writer = RecordingWriter::default();
        let kind = record_glyph(&mut seg, &mut writer, "☉", unit_box(), ExtractionMethod::Direct);
        assert_eq!(kind, VisualKind::SavedSigil);

        let entries = seg.finish();
        let sigil = &entries[0].sigils[0];
        assert_eq!(sigil.parent_entry_heading, "GOLD");
        assert_eq!(sigil.page_number, 4);
        assert_eq!(sigil.source_text, "☉");
        assert_eq!(sigil.extraction_method, ExtractionMethod::Direct);
    }

    #[test]
    fn test_empty_crop_is_not_recorded() {
        let mut seg = EntrySegmenter::new(1);
        seg.feed_line("GOLD Alc.");
        let mut writer = RecordingWriter::default();
        let kind = record_glyph(&mut seg, &mut writer, "☉", PageRect::new(5.0, 5.0, 5.0, 9.0), ExtractionMethod::Ocr);
        assert_eq!(kind, VisualKind::PotentialSymbol);
        assert!(seg.finish()[0].sigils.is_empty());
    }

    #[test]
    fn test_writer_error_is_recoverable() {
        let mut seg = EntrySegmenter::new(1);
        seg.feed_line("GOLD Alc.");
        let mut writer = RecordingWriter { fail: true, ..Default::default() };
        let kind = record_glyph(&mut seg, &mut writer, "☉", unit_box(), ExtractionMethod::Ocr);
        assert_eq!(kind, VisualKind::PotentialSymbol);
    }

    #[test]
    fn test_dedup_first_wins() {
        let r = PageRect::new(1.0, 2.0, 3.0, 4.0);
        let anns = vec![
            VisualAnnotation::new(r, VisualKind::SavedSigil, "☉"),
            VisualAnnotation::new(PageRect::new(0.0, 0.0, 9.0, 9.0), VisualKind::TextBlock, "x"),
            VisualAnnotation::new(r, VisualKind::TextBlock, "dup"),
        ];
        let unique = dedup_annotations(anns);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].kind, VisualKind::SavedSigil);
    }
}
