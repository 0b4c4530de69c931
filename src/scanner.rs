//! Scan orchestration: page range validation, the per-scan session, and the
//! background worker that drives it.

use chrono::{DateTime, Utc};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ScannerConfig;
use crate::dataset::Dataset;
use crate::error::{SigilError, SigilResult};
use crate::extract::{extractor_for, PageExtractor};
use crate::logging::PerformanceTimer;
use crate::model::{Entry, ExtractionMethod, VisualAnnotation};
use crate::page::PageSource;
use crate::pdf::{self, PdfReader};
use crate::sigil_store::SigilImageStore;

/// Inclusive, 1-based, already clamped to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    /// Check bounds against a document of `total` pages, clamping the end
    pub fn new(start: u32, end: u32, total: u32) -> SigilResult<Self> {
        if start < 1 || start > total {
            return Err(SigilError::StartPageOutOfBounds { start, total });
        }
        let end = end.min(total);
        if end < start {
            return Err(SigilError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }
}

fn parse_page_number(value: &str) -> SigilResult<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| SigilError::InvalidPageNumber { value: value.to_string() })
}

/// What the caller asked to scan
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub pdf_path: PathBuf,
    pub start: String,
    pub end: String,
}

impl ScanRequest {
    pub fn new(pdf_path: impl Into<PathBuf>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            pdf_path: pdf_path.into(),
            start: start.into(),
            end: end.into(),
        }
    }

    /// Numeric start and end page, checked before anything is opened
    pub fn page_bounds(&self) -> SigilResult<(u32, u32)> {
        Ok((parse_page_number(&self.start)?, parse_page_number(&self.end)?))
    }

    /// Page bounds taken from the configuration
    pub fn from_config(pdf_path: impl Into<PathBuf>, config: &ScannerConfig) -> Self {
        Self::new(
            pdf_path,
            config.scan.start_page.to_string(),
            config.scan.end_page.to_string(),
        )
    }
}

/// Progress notifications, consumed by the presentation layer
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Started {
        range: PageRange,
        total_pages: u32,
        method: ExtractionMethod,
    },
    PageCompleted {
        page: u32,
        entries: usize,
        sigils: usize,
        annotations: Vec<VisualAnnotation>,
    },
    Finished(ScanSummary),
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanStatus {
    Completed,
    Cancelled,
    PageFailed { page: u32, message: String },
    /// The pages were read but the dataset could not be written
    WriteFailed { message: String },
}

impl ScanStatus {
    pub fn dataset_written(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Cancelled)
    }
}

/// Counts and timing of a finished scan
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub status: ScanStatus,
    pub method: ExtractionMethod,
    pub pages_processed: u32,
    pub entries: usize,
    pub sigils: usize,
    pub dataset_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanSummary {
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Summary plus every entry accumulated, written or not
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub summary: ScanSummary,
    pub dataset: Dataset,
}

/// State owned by one scan: the strategy, the sigil counter and the entries
/// gathered so far
pub struct ScanSession {
    extractor: Box<dyn PageExtractor>,
    store: SigilImageStore,
    entries: Vec<Entry>,
    pages_processed: u32,
    cancel: Arc<AtomicBool>,
    events: Option<UnboundedSender<ScanEvent>>,
}

impl ScanSession {
    pub fn new(extractor: Box<dyn PageExtractor>, image_dir: impl Into<PathBuf>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            extractor,
            store: SigilImageStore::new(image_dir),
            entries: Vec::new(),
            pages_processed: 0,
            cancel,
            events: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<ScanEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn method(&self) -> ExtractionMethod {
        self.extractor.method()
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(tx) = &self.events {
            // a dropped receiver only means nobody is watching
            let _ = tx.send(event);
        }
    }

    /// Extract one page and fold its entries into the session. A failed page
    /// contributes nothing.
    pub fn process_page(&mut self, page: &dyn PageSource, page_number: u32) -> SigilResult<()> {
        let extraction = self.extractor.extract_page(page, page_number, &mut self.store)?;
        let sigils = extraction.sigil_count();
        let entries = extraction.entries.len();

        info!(page = page_number, entries, sigils, "Page processed");
        self.entries.extend(extraction.entries);
        self.pages_processed += 1;

        self.emit(ScanEvent::PageCompleted {
            page: page_number,
            entries,
            sigils,
            annotations: extraction.annotations,
        });
        Ok(())
    }

    /// Walk `range` in order, loading each page through `load`. Stops early on
    /// cancel (entries so far are written) or on a page failure (nothing is
    /// written).
    pub fn run<F, P>(mut self, range: PageRange, total_pages: u32, dataset_path: &Path, mut load: F) -> ScanReport
    where
        F: FnMut(u32) -> SigilResult<P>,
        P: PageSource,
    {
        let _timer = PerformanceTimer::start("sigil scan");
        let started_at = Utc::now();
        let method = self.method();
        info!(start = range.start, end = range.end, total_pages, %method, "Scan started");
        self.emit(ScanEvent::Started { range, total_pages, method });

        let mut status = ScanStatus::Completed;
        for page_number in range.pages() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(page = page_number, "Scan cancelled");
                status = ScanStatus::Cancelled;
                break;
            }

            let result = load(page_number).and_then(|page| self.process_page(&page, page_number));
            if let Err(e) = result {
                error!(page = page_number, error = %e, "Page failed, stopping scan");
                status = ScanStatus::PageFailed { page: page_number, message: e.to_string() };
                break;
            }
        }

        let dataset = Dataset::new(std::mem::take(&mut self.entries));
        let mut dataset_path_written = None;
        if status.dataset_written() {
            match dataset.save(dataset_path) {
                Ok(()) => dataset_path_written = Some(dataset_path.to_path_buf()),
                Err(e) => {
                    error!(path = %dataset_path.display(), error = %e, "Failed to write dataset");
                    status = ScanStatus::WriteFailed { message: e.to_string() };
                }
            }
        }

        let summary = ScanSummary {
            status,
            method,
            pages_processed: self.pages_processed,
            entries: dataset.len(),
            sigils: dataset.sigil_count(),
            dataset_path: dataset_path_written,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            status = ?summary.status,
            pages = summary.pages_processed,
            entries = summary.entries,
            sigils = summary.sigils,
            save_attempts = self.store.counter(),
            "Scan finished"
        );
        self.emit(ScanEvent::Finished(summary.clone()));

        ScanReport { summary, dataset }
    }
}

/// Run a whole scan on the current thread. Binding, document and pages are
/// released when this returns.
pub fn scan_document(
    config: &ScannerConfig,
    request: &ScanRequest,
    cancel: Arc<AtomicBool>,
    events: Option<UnboundedSender<ScanEvent>>,
) -> SigilResult<ScanReport> {
    let (start, end) = request.page_bounds()?;

    let extractor = extractor_for(config);
    extractor.prepare()?;

    let reader = PdfReader::new()?;
    let document = reader.open(&request.pdf_path)?;
    let total_pages = pdf::page_count(&document);
    let range = PageRange::new(start, end, total_pages)?;

    let mut session = ScanSession::new(extractor, &config.output.image_dir, cancel);
    if let Some(tx) = events {
        session = session.with_events(tx);
    }

    Ok(session.run(range, total_pages, &config.output.dataset_path, |page_number| {
        pdf::load_page(&document, page_number)
    }))
}

/// A scan running on the blocking pool
pub struct ScanHandle {
    cancel: Arc<AtomicBool>,
    events: UnboundedReceiver<ScanEvent>,
    task: JoinHandle<SigilResult<ScanReport>>,
}

impl ScanHandle {
    /// Shared stop flag; the worker checks it before each page
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Next progress event; `None` once the worker is gone
    pub async fn next_event(&mut self) -> Option<ScanEvent> {
        self.events.recv().await
    }

    pub async fn join(self) -> SigilResult<ScanReport> {
        self.task
            .await
            .map_err(|e| SigilError::General(anyhow::anyhow!("scan worker stopped: {}", e)))?
    }
}

/// Start a scan on a background worker
pub fn spawn_scan(config: ScannerConfig, request: ScanRequest) -> ScanHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);

    let task = tokio::task::spawn_blocking(move || {
        let result = scan_document(&config, &request, flag, Some(tx.clone()));
        if let Err(e) = &result {
            error!(error = %e, "Scan failed");
            let _ = tx.send(ScanEvent::Failed { message: e.user_message() });
        }
        result
    });

    ScanHandle { cancel, events: rx, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::VectorExtractor;
    use crate::geometry::PageRect;
    use crate::lines::TextLayerChar;
    use crate::page::RasterPage;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    fn text_page(lines: &[&str]) -> RasterPage {
        let mut chars = Vec::new();
        for (row, line) in lines.iter().enumerate() {
            let top = 20.0 + row as f32 * 20.0;
            for (col, ch) in line.chars().enumerate() {
                let left = 10.0 + col as f32 * 5.0;
                chars.push(TextLayerChar { ch, bbox: Some(PageRect::new(left, top, left + 5.0, top + 10.0)) });
            }
            chars.push(TextLayerChar { ch: '\n', bbox: None });
        }
        let mut image = RgbaImage::from_pixel(300, 200, Rgba([255, 255, 255, 0]));
        image.put_pixel(62, 25, Rgba([0, 0, 0, 255]));
        RasterPage::new(image).with_text_layer(chars)
    }

    fn parse(start: &str, end: &str, total: u32) -> SigilResult<PageRange> {
        let (start, end) = ScanRequest::new("dictionary.pdf", start, end).page_bounds()?;
        PageRange::new(start, end, total)
    }

    fn session(image_dir: &Path, cancel: Arc<AtomicBool>) -> ScanSession {
        ScanSession::new(Box::new(VectorExtractor::new()), image_dir, cancel)
    }

    #[test]
    fn test_page_range_validation() {
        assert_eq!(parse("38", "291", 300).unwrap(), PageRange { start: 38, end: 291 });
        assert_eq!(parse("5", "1000", 12).unwrap(), PageRange { start: 5, end: 12 });
        assert!(matches!(parse("x", "3", 10), Err(SigilError::InvalidPageNumber { .. })));
        assert!(matches!(parse("3", "", 10), Err(SigilError::InvalidPageNumber { .. })));
        assert!(matches!(parse("0", "3", 10), Err(SigilError::StartPageOutOfBounds { .. })));
        assert!(matches!(parse("11", "12", 10), Err(SigilError::StartPageOutOfBounds { .. })));
        assert!(matches!(parse("7", "3", 10), Err(SigilError::EndBeforeStart { .. })));
        assert_eq!(PageRange::new(2, 4, 10).unwrap().len(), 3);
    }

    #[test]
    fn test_completed_scan_writes_dataset() {
        let dir = tempdir().unwrap();
        let dataset_path = dir.path().join("dataset.json");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = session(&dir.path().join("sigils"), Arc::new(AtomicBool::new(false))).with_events(tx);

        let report = session.run(PageRange::new(1, 2, 2).unwrap(), 2, &dataset_path, |n| {
            Ok(if n == 1 {
                text_page(&["GOLD Alc. ☉", "The sun."])
            } else {
                text_page(&["SILVER Alc. The moon."])
            })
        });

        assert_eq!(report.summary.status, ScanStatus::Completed);
        assert_eq!(report.summary.pages_processed, 2);
        assert_eq!(report.summary.entries, 2);
        assert_eq!(report.summary.sigils, 1);
        assert_eq!(report.summary.dataset_path.as_deref(), Some(dataset_path.as_path()));

        let saved = Dataset::load(&dataset_path).unwrap();
        assert_eq!(saved.entries()[0].heading, "GOLD");
        assert_eq!(saved.entries()[1].page_number, 2);
        assert!(Path::new(&saved.entries()[0].sigils[0].image_path).exists());

        let mut pages = Vec::new();
        let mut finished = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ScanEvent::PageCompleted { page, .. } => pages.push(page),
                ScanEvent::Finished(_) => finished = true,
                _ => {}
            }
        }
        assert_eq!(pages, vec![1, 2]);
        assert!(finished);
    }

    #[test]
    fn test_cancel_flushes_entries_so_far() {
        let dir = tempdir().unwrap();
        let dataset_path = dir.path().join("dataset.json");
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        let report = session(dir.path(), cancel).run(PageRange::new(1, 3, 3).unwrap(), 3, &dataset_path, |n| {
            // cancelled while page 1 is being processed
            flag.store(true, Ordering::SeqCst);
            Ok(text_page(&[&format!("ENTRY{} Abc. text", n)]))
        });

        assert_eq!(report.summary.status, ScanStatus::Cancelled);
        assert_eq!(report.summary.pages_processed, 1);
        assert_eq!(Dataset::load(&dataset_path).unwrap().len(), 1);
    }

    #[test]
    fn test_page_failure_keeps_previous_output() {
        let dir = tempdir().unwrap();
        let dataset_path = dir.path().join("dataset.json");
        std::fs::write(&dataset_path, "[]").unwrap();

        let report = session(dir.path(), Arc::new(AtomicBool::new(false))).run(
            PageRange::new(1, 3, 3).unwrap(),
            3,
            &dataset_path,
            |n| {
                if n == 2 {
                    Err(SigilError::page_failed(n, "render failed"))
                } else {
                    Ok(text_page(&["GOLD Alc. metal"]))
                }
            },
        );

        assert!(matches!(report.summary.status, ScanStatus::PageFailed { page: 2, .. }));
        assert_eq!(report.dataset.len(), 1);
        assert!(report.summary.dataset_path.is_none());
        assert_eq!(std::fs::read_to_string(&dataset_path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_session_runs_on_blocking_pool() {
        let dir = tempdir().unwrap();
        let dataset_path = dir.path().join("dataset.json");
        let image_dir = dir.path().join("sigils");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let worker = tokio::task::spawn_blocking(move || {
            session(&image_dir, Arc::new(AtomicBool::new(false)))
                .with_events(tx)
                .run(PageRange::new(1, 1, 1).unwrap(), 1, &dataset_path, |_| {
                    Ok(text_page(&["GOLD Alc. ☉"]))
                })
        });

        let mut saw_start = false;
        while let Some(event) = rx.recv().await {
            if let ScanEvent::Started { range, .. } = event {
                assert_eq!(range, PageRange { start: 1, end: 1 });
                saw_start = true;
            }
        }
        let report = worker.await.unwrap();
        assert!(saw_start);
        assert_eq!(report.summary.sigils, 1);
    }

    #[tokio::test]
    async fn test_missing_pdf_reports_failure() {
        let dir = tempdir().unwrap();
        let mut config = ScannerConfig::default();
        config.output.dataset_path = dir.path().join("dataset.json");
        let mut handle = spawn_scan(config, ScanRequest::new(dir.path().join("missing.pdf"), "1", "2"));

        let mut failed = false;
        while let Some(event) = handle.next_event().await {
            if matches!(event, ScanEvent::Failed { .. }) {
                failed = true;
            }
        }
        assert!(failed);
        assert!(handle.join().await.is_err());
        assert!(!dir.path().join("dataset.json").exists());
    }

    fn ocr_config(dir: &Path) -> ScannerConfig {
        let mut config = ScannerConfig::default();
        config.scan.strategy = ExtractionMethod::Ocr;
        config.ocr.tesseract_cmd = "definitely-not-tesseract-7f3a".to_string();
        config.output.dataset_path = dir.join("dataset.json");
        config.output.image_dir = dir.join("sigils");
        config
    }

    #[tokio::test]
    async fn test_missing_ocr_engine_aborts_scan() {
        let dir = tempdir().unwrap();
        let config = ocr_config(dir.path());
        let previous = b"[{\"kept\": true}]";
        std::fs::write(&config.output.dataset_path, previous).unwrap();
        let pdf_path = dir.path().join("dictionary.pdf");
        std::fs::write(&pdf_path, b"%PDF-1.4").unwrap();

        let dataset_path = config.output.dataset_path.clone();
        let mut handle = spawn_scan(config, ScanRequest::new(pdf_path, "1", "2"));

        let mut failure = None;
        while let Some(event) = handle.next_event().await {
            match event {
                ScanEvent::Failed { message } => failure = Some(message),
                ScanEvent::Started { .. } | ScanEvent::PageCompleted { .. } => panic!("scan should not start"),
                ScanEvent::Finished(_) => panic!("scan should not finish"),
            }
        }

        let message = failure.expect("a Failed event");
        assert!(message.contains("Tesseract not found"), "{}", message);
        assert!(matches!(handle.join().await, Err(SigilError::OcrUnavailable { .. })));
        assert_eq!(std::fs::read(&dataset_path).unwrap(), previous.to_vec());
        assert!(!dir.path().join("sigils").exists());
    }

    #[tokio::test]
    async fn test_bad_page_bounds_rejected_before_engine_probe() {
        let dir = tempdir().unwrap();
        let config = ocr_config(dir.path());
        let handle = spawn_scan(config, ScanRequest::new(dir.path().join("dictionary.pdf"), "one", "2"));

        let err = handle.join().await.unwrap_err();
        assert!(matches!(err, SigilError::InvalidPageNumber { ref value } if value == "one"));
    }
}
