use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};
use tracing::warn;

use crate::model::ExtractionMethod;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScannerConfig {
    pub scan: ScanConfig,
    pub output: OutputConfig,
    pub ocr: OcrConfig,
    pub search: SearchConfig,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// First page to scan (1-based)
    pub start_page: u32,

    /// Last page to scan (1-based, clamped to the document)
    pub end_page: u32,

    /// "direct" reads the vector text layer, "ocr" runs tesseract
    pub strategy: ExtractionMethod,

    /// Zoom used for the OCR page render
    pub preview_zoom: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dataset_path: PathBuf,
    pub image_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract binary name or path
    pub tesseract_cmd: String,

    /// Tesseract language code
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub enable_file_logging: bool,
    pub log_dir: PathBuf,
    pub enable_json_format: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start_page: 38,
            end_page: 291,
            strategy: ExtractionMethod::Direct,
            preview_zoom: 2.0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("sigil_dictionary_extracted_with_sigils_metadata.json"),
            image_dir: PathBuf::from("extracted_sigil_images"),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: "tesseract".to_string(),
            language: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            canvas_width: 250,
            canvas_height: 250,
            top_k: 10,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_file_logging: false,
            log_dir: PathBuf::from("logs"),
            enable_json_format: false,
        }
    }
}

impl ScannerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        let config: ScannerConfig = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn load_from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from SIGIL_* environment variables
    pub fn apply_env(&mut self) {
        if let Ok(strategy) = std::env::var("SIGIL_STRATEGY") {
            self.apply_strategy(&strategy);
        }

        if let Ok(zoom) = std::env::var("SIGIL_PREVIEW_ZOOM") {
            if let Ok(value) = zoom.parse::<f32>() {
                self.scan.preview_zoom = value;
            }
        }

        if let Ok(cmd) = std::env::var("SIGIL_TESSERACT_CMD") {
            self.ocr.tesseract_cmd = cmd;
        }

        if let Ok(path) = std::env::var("SIGIL_DATASET") {
            self.output.dataset_path = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("SIGIL_IMAGE_DIR") {
            self.output.image_dir = PathBuf::from(dir);
        }

        if let Ok(level) = std::env::var("SIGIL_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Override the strategy from a user-supplied string; unknown names keep
    /// the current strategy
    pub fn apply_strategy(&mut self, value: &str) {
        match value.parse::<ExtractionMethod>() {
            Ok(method) => self.scan.strategy = method,
            Err(e) => warn!(value, current = %self.scan.strategy, "Ignoring strategy override: {}", e),
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scan.preview_zoom > 0.0) {
            return Err(anyhow!("preview_zoom must be positive, got {}", self.scan.preview_zoom));
        }
        if self.search.canvas_width == 0 || self.search.canvas_height == 0 {
            return Err(anyhow!("sketch canvas must not be empty"));
        }
        if self.search.top_k == 0 {
            return Err(anyhow!("top_k must be at least 1"));
        }
        Ok(())
    }
}
