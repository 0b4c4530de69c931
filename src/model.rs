use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SigilError;
use crate::geometry::PageRect;

/// How a sigil (and the page it came from) was read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Tesseract over a rendered page
    Ocr,
    /// Characters from the PDF's own text layer
    Direct,
}

impl FromStr for ExtractionMethod {
    type Err = SigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ocr" | "raster" | "tesseract" => Ok(ExtractionMethod::Ocr),
            "direct" | "vector" | "text" => Ok(ExtractionMethod::Direct),
            other => Err(SigilError::configuration(format!(
                "unknown extraction strategy {:?} (expected \"ocr\" or \"direct\")",
                other
            ))),
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Ocr => write!(f, "ocr"),
            ExtractionMethod::Direct => write!(f, "direct"),
        }
    }
}

/// One finalized dictionary record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub heading: String,
    #[serde(rename = "class")]
    pub classification: String,
    pub description: String,
    #[serde(rename = "references_raw")]
    pub references: Vec<String>,
    #[serde(rename = "sigils_metadata", default)]
    pub sigils: Vec<SigilMetadata>,
    pub page_number: u32,
}

/// One detected glyph, persisted as a cropped image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigilMetadata {
    pub image_path: String,
    pub parent_entry_heading: String,
    pub page_number: u32,
    pub source_text: String,
    #[serde(rename = "bounding_box_pdf_coords")]
    pub bounding_box: PageRect,
    pub extraction_method: ExtractionMethod,
}

/// What an overlay rectangle marks on the page preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    Heading,
    TextBlock,
    BiblioRef,
    PotentialSymbol,
    SavedSigil,
}

/// Overlay record handed to the presentation layer. Rects are page units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAnnotation {
    pub rect: PageRect,
    pub kind: VisualKind,
    pub text_snippet: String,
}

impl VisualAnnotation {
    pub fn new(rect: PageRect, kind: VisualKind, text: &str) -> Self {
        Self {
            rect,
            kind,
            text_snippet: text.chars().take(30).collect(),
        }
    }
}

/// Everything one page produced, regardless of strategy
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub entries: Vec<Entry>,
    pub annotations: Vec<VisualAnnotation>,
}

impl PageExtraction {
    pub fn sigil_count(&self) -> usize {
        self.entries.iter().map(|e| e.sigils.len()).sum()
    }
}
