use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the sigil scanner
#[derive(Error, Debug)]
pub enum SigilError {
    #[error("PDF processing failed: {message}")]
    PdfProcessing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("OCR engine not available: {binary}")]
    OcrUnavailable { binary: String },

    #[error("OCR failed on page {page}: {message}")]
    OcrFailed { page: u32, message: String },

    #[error("Page {page} could not be processed: {message}")]
    PageFailed { page: u32, message: String },

    #[error("File I/O error: {path}")]
    FileIO {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image error: {path}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid page number: {value:?}")]
    InvalidPageNumber { value: String },

    #[error("Start page {start} is out of bounds (document has {total} pages)")]
    StartPageOutOfBounds { start: u32, total: u32 },

    #[error("End page {end} is before start page {start}")]
    EndBeforeStart { start: u32, end: u32 },

    #[error("Nothing drawn on the sketch canvas")]
    NothingDrawn,

    #[error("Dataset not found: {}", path.display())]
    DatasetNotFound { path: PathBuf },

    #[error("Dataset is malformed: {}", path.display())]
    DatasetMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Hashing failed: {message}")]
    Hashing { message: String },

    #[error("General error: {0}")]
    General(#[from] anyhow::Error),
}

impl SigilError {
    /// Create a PDF processing error carrying the backend's error
    pub fn pdf_processing_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::PdfProcessing {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a file I/O error
    pub fn file_io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileIO {
            path: path.into(),
            source,
        }
    }

    pub fn image(path: impl Into<String>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn page_failed(page: u32, message: impl Into<String>) -> Self {
        Self::PageFailed {
            page,
            message: message.into(),
        }
    }

    /// Check if error is recoverable (the broader operation can continue)
    pub fn is_recoverable(&self) -> bool {
        match self {
            SigilError::Image { .. } => true,
            SigilError::Hashing { .. } => true,
            SigilError::OcrUnavailable { .. } => false,
            SigilError::PdfProcessing { .. } => false,
            SigilError::PageFailed { .. } => false,
            SigilError::OcrFailed { .. } => false,
            SigilError::DatasetMalformed { .. } => false,
            _ => true,
        }
    }

    /// True for errors raised by input validation before any work starts
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SigilError::NothingDrawn
                | SigilError::InvalidPageNumber { .. }
                | SigilError::StartPageOutOfBounds { .. }
                | SigilError::EndBeforeStart { .. }
        )
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            SigilError::PdfProcessing { .. } => {
                "Couldn't open this PDF. It might be encrypted or corrupted, or PDFium is missing.".to_string()
            }
            SigilError::OcrUnavailable { binary } => {
                format!("Tesseract not found ({}). Install it or scan without --ocr.", binary)
            }
            SigilError::InvalidPageNumber { value } => {
                format!("'{}' is not a valid page number.", value)
            }
            SigilError::StartPageOutOfBounds { start, total } => {
                format!("Start page {} is out of bounds; the document has {} pages.", start, total)
            }
            SigilError::EndBeforeStart { start, end } => {
                format!("End page {} is before start page {}.", end, start)
            }
            SigilError::NothingDrawn => "Please draw a symbol first.".to_string(),
            SigilError::DatasetNotFound { path } => {
                format!("Data file not found: {}. Run a scan first.", path.display())
            }
            SigilError::DatasetMalformed { path, .. } => {
                format!("Could not decode JSON from {}.", path.display())
            }
            SigilError::FileIO { .. } => {
                "File access error. Check file permissions and disk space.".to_string()
            }
            _ => "Something went wrong. Check the logs for details.".to_string(),
        }
    }
}

/// Result type alias for convenience
pub type SigilResult<T> = Result<T, SigilError>;

/// Error context for adding additional information
pub trait ErrorContext<T> {
    fn with_path(self, path: &std::path::Path) -> SigilResult<T>;
}

impl<T> ErrorContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: &std::path::Path) -> SigilResult<T> {
        self.map_err(|e| SigilError::file_io(path.display().to_string(), e))
    }
}
