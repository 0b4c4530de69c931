use anyhow::{anyhow, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};

use crate::config::ScannerConfig;
use crate::dataset::Dataset;
use crate::error::SigilError;
use crate::page::flatten_on_white;
use crate::scanner::{spawn_scan, ScanEvent, ScanRequest, ScanStatus};
use crate::similarity::SimilarityIndex;

/// Keep the friendly text on top, the full chain underneath
fn user_facing(e: SigilError) -> anyhow::Error {
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

/// Scan a PDF into the dataset file. Ctrl-C stops after the current page.
pub async fn scan_command(config: ScannerConfig, request: ScanRequest) -> Result<()> {
    info!("🔍 Scanning PDF: {:?}", request.pdf_path);

    if !request.pdf_path.exists() {
        return Err(anyhow!("PDF file not found: {:?}", request.pdf_path));
    }

    let mut handle = spawn_scan(config, request);

    let cancel = handle.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current page");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    while let Some(event) = handle.next_event().await {
        match event {
            ScanEvent::Started { range, total_pages, method } => {
                println!("📄 Pages {}-{} of {} ({})", range.start, range.end, total_pages, method);
            }
            ScanEvent::PageCompleted { page, entries, sigils, .. } => {
                println!("   Page {}: {} entries, {} sigils", page, entries, sigils);
            }
            ScanEvent::Failed { message } => {
                eprintln!("❌ {}", message);
            }
            ScanEvent::Finished(_) => {}
        }
    }

    let report = handle.join().await.map_err(|e| {
        if e.is_validation() {
            anyhow!("{} Nothing was scanned.", e.user_message())
        } else {
            user_facing(e)
        }
    })?;
    let summary = &report.summary;

    println!("🎉 Scan {}!", match summary.status {
        ScanStatus::Completed => "complete",
        ScanStatus::Cancelled => "cancelled",
        _ => "stopped",
    });
    println!("   Method: {}", summary.method);
    println!("   Pages processed: {}", summary.pages_processed);
    println!("   Entries: {}", summary.entries);
    println!("   Sigils saved: {}", summary.sigils);
    println!("   Processing time: {}ms", summary.elapsed_ms());
    if let Some(path) = &summary.dataset_path {
        println!("   Output file: {:?}", path);
    }

    match &summary.status {
        ScanStatus::PageFailed { page, message } => {
            error!("Scan stopped at page {}: {}", page, message);
            Err(anyhow!("Scan stopped at page {}: {}. The dataset file was not written.", page, message))
        }
        ScanStatus::WriteFailed { message } => Err(anyhow!("Failed to write dataset: {}", message)),
        ScanStatus::Completed | ScanStatus::Cancelled => Ok(()),
    }
}

/// Text search over a scanned dataset
pub async fn query_command(dataset_path: PathBuf, term: Option<String>) -> Result<()> {
    let dataset = Dataset::load(&dataset_path).map_err(user_facing)?;
    let term = term.unwrap_or_default();
    let results = dataset.query(&term);

    info!("Query {:?} matched {} of {} entries", term, results.len(), dataset.len());

    if results.is_empty() {
        println!("No entries match {:?}", term);
        return Ok(());
    }

    for entry in &results {
        println!("• {} ({}) p.{}", entry.heading, entry.classification, entry.page_number);
        if !entry.description.is_empty() {
            let preview: String = entry.description.chars().take(120).collect();
            println!("    {}", preview);
        }
        if !entry.references.is_empty() {
            println!("    References: {}", entry.references.join("; "));
        }
        for sigil in &entry.sigils {
            println!("    Sigil {:?} ({}): {}", sigil.source_text, sigil.extraction_method, sigil.image_path);
        }
    }
    println!("\n{} of {} entries", results.len(), dataset.len());

    Ok(())
}

/// Rank stored sigils by similarity to a sketch image
pub async fn search_command(config: &ScannerConfig, sketch_path: &Path, dataset_path: PathBuf) -> Result<()> {
    let dataset = Dataset::load(&dataset_path).map_err(user_facing)?;
    let sketch = load_sketch(config, sketch_path)?;

    let index = SimilarityIndex::new(config.search.top_k);
    let matches = index.search(&sketch, dataset.sigils()).map_err(user_facing)?;

    if matches.is_empty() {
        println!("No stored sigils to compare against");
        return Ok(());
    }

    println!("🔎 Top {} matches for {:?}", matches.len(), sketch_path);
    for (rank, m) in matches.iter().enumerate() {
        println!(
            "{:>3}. distance {:>2}  {} (p.{})  {}",
            rank + 1,
            m.distance,
            m.parent_entry.heading,
            m.sigil.page_number,
            m.sigil.image_path
        );
    }

    Ok(())
}

/// Open a sketch and lay it on the configured white canvas
fn load_sketch(config: &ScannerConfig, path: &Path) -> Result<DynamicImage> {
    let image = image::open(path).map_err(|e| user_facing(SigilError::image(path.display().to_string(), e)))?;
    let mut rgba = image
        .resize_exact(
            config.search.canvas_width,
            config.search.canvas_height,
            image::imageops::FilterType::Triangle,
        )
        .to_rgba8();
    flatten_on_white(&mut rgba);
    Ok(DynamicImage::ImageRgba8(rgba))
}

/// Write the default configuration
pub async fn init_config_command(path: PathBuf) -> Result<()> {
    if path.exists() {
        return Err(anyhow!("Refusing to overwrite existing file: {:?}", path));
    }
    ScannerConfig::default().save_to_file(&path)?;
    println!("📝 Default configuration written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_config_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sigil.toml");
        init_config_command(path.clone()).await.unwrap();
        let loaded = ScannerConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.scan.start_page, 38);
        assert!(init_config_command(path).await.is_err());
    }

    #[tokio::test]
    async fn test_scan_rejects_bad_page_number() {
        let dir = tempdir().unwrap();
        let pdf_path = dir.path().join("dictionary.pdf");
        std::fs::write(&pdf_path, b"%PDF-1.4").unwrap();
        let mut config = ScannerConfig::default();
        config.output.dataset_path = dir.path().join("dataset.json");

        let err = scan_command(config, ScanRequest::new(pdf_path, "first", "3")).await.unwrap_err();
        assert_eq!(err.to_string(), "'first' is not a valid page number. Nothing was scanned.");
        assert!(!dir.path().join("dataset.json").exists());
    }

    #[tokio::test]
    async fn test_query_missing_dataset_is_error() {
        let dir = tempdir().unwrap();
        let err = query_command(dir.path().join("none.json"), None).await.unwrap_err();
        assert!(err.to_string().contains("Run a scan first"));
    }

    #[test]
    fn test_transparent_sketch_lands_on_white() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sketch.png");
        image::RgbaImage::new(40, 40).save(&path).unwrap();

        let sketch = load_sketch(&ScannerConfig::default(), &path).unwrap();
        assert_eq!((sketch.width(), sketch.height()), (250, 250));
        assert!(crate::similarity::is_blank_canvas(&sketch, crate::similarity::CANVAS_BACKGROUND));
    }
}
