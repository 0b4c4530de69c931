//! Symbol-dictionary scanner: segments a scanned or born-digital dictionary
//! PDF into entries, crops the glyphs ("sigils") each entry shows, and finds
//! stored sigils by similarity to a hand-drawn sketch.

pub mod bibliography;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod glyph;
pub mod lines;
pub mod logging;
pub mod model;
pub mod ocr;
pub mod page;
pub mod pdf;
pub mod scanner;
pub mod segmenter;
pub mod sigil_store;
pub mod similarity;

pub use config::ScannerConfig;
pub use dataset::Dataset;
pub use error::{SigilError, SigilResult};
pub use model::{Entry, ExtractionMethod, PageExtraction, SigilMetadata, VisualAnnotation, VisualKind};
pub use scanner::{spawn_scan, PageRange, ScanEvent, ScanReport, ScanRequest, ScanSession, ScanStatus};
pub use similarity::{MatchResult, SimilarityIndex};
