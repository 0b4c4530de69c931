//! Page extraction strategies.
//!
//! Both strategies walk a page line by line: each line is fed to the entry
//! segmenter first, then its tokens or characters are checked for glyphs so
//! a glyph lands in the entry open at that point of the page.

mod raster;
mod vector;

pub use raster::{process_ocr_tokens, RasterExtractor};
pub use vector::{process_text_layer, VectorExtractor};

use std::ops::Range;

use crate::bibliography::reference_spans;
use crate::config::ScannerConfig;
use crate::error::SigilResult;
use crate::geometry::PageRect;
use crate::model::{ExtractionMethod, PageExtraction, VisualAnnotation, VisualKind};
use crate::ocr::TesseractEngine;
use crate::page::PageSource;
use crate::sigil_store::SigilImageStore;

/// One way of turning a page into entries, sigils and overlay annotations
pub trait PageExtractor: Send {
    fn method(&self) -> ExtractionMethod;

    /// Check external prerequisites before the first page
    fn prepare(&self) -> SigilResult<()> {
        Ok(())
    }

    fn extract_page(
        &self,
        page: &dyn PageSource,
        page_number: u32,
        store: &mut SigilImageStore,
    ) -> SigilResult<PageExtraction>;
}

pub fn extractor_for(config: &ScannerConfig) -> Box<dyn PageExtractor> {
    match config.scan.strategy {
        ExtractionMethod::Ocr => Box::new(RasterExtractor::new(
            TesseractEngine::from_config(&config.ocr),
            config.scan.preview_zoom,
        )),
        ExtractionMethod::Direct => Box::new(VectorExtractor::new()),
    }
}

/// A token or character of a line, located by its byte span in the line text
#[derive(Debug, Clone)]
pub(crate) struct LinePiece {
    pub span: Range<usize>,
    pub rect: Option<PageRect>,
}

/// `biblio_ref` annotations for each citation in `text`, boxed over the
/// pieces the citation touches
pub(crate) fn reference_annotations(text: &str, pieces: &[LinePiece]) -> Vec<VisualAnnotation> {
    reference_spans(text)
        .into_iter()
        .filter_map(|span| {
            let rect = pieces
                .iter()
                .filter(|p| p.span.start < span.end && span.start < p.span.end)
                .filter_map(|p| p.rect)
                .reduce(|a, b| a.union(&b))?;
            Some(VisualAnnotation::new(rect, VisualKind::BiblioRef, &text[span]))
        })
        .collect()
}
