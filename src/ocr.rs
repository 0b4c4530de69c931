use image::{ImageFormat, RgbaImage};
use std::io::{BufWriter, Write};
use std::process::Command;
use tracing::debug;

use crate::config::OcrConfig;
use crate::error::{SigilError, SigilResult};
use crate::geometry::PixelRect;
use crate::lines::{LineKey, OcrToken};

/// Shells out to the tesseract binary and reads its TSV word boxes
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: String,
    language: Option<String>,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<String>, language: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            language,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(config.tesseract_cmd.clone(), config.language.clone())
    }

    /// Fails with `OcrUnavailable` when the binary cannot be run at all
    pub fn check_available(&self) -> SigilResult<()> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|_| SigilError::OcrUnavailable { binary: self.binary.clone() })?;
        if !output.status.success() {
            return Err(SigilError::OcrUnavailable { binary: self.binary.clone() });
        }
        Ok(())
    }

    /// OCR one rendered page. Token boxes are in the image's pixel space.
    pub fn recognize(&self, image: &RgbaImage, page_number: u32) -> SigilResult<Vec<OcrToken>> {
        let mut scratch = tempfile::Builder::new()
            .prefix("sigil-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| SigilError::file_io("ocr scratch image", e))?;
        {
            let mut writer = BufWriter::new(scratch.as_file_mut());
            image
                .write_to(&mut writer, ImageFormat::Png)
                .map_err(|e| SigilError::image(scratch_path_label(page_number), e))?;
            writer
                .flush()
                .map_err(|e| SigilError::file_io(scratch_path_label(page_number), e))?;
        }

        let mut cmd = Command::new(&self.binary);
        cmd.arg(scratch.path()).arg("stdout");
        if let Some(lang) = &self.language {
            cmd.arg("-l").arg(lang);
        }
        cmd.arg("tsv");

        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SigilError::OcrUnavailable { binary: self.binary.clone() }
            } else {
                SigilError::OcrFailed { page: page_number, message: e.to_string() }
            }
        })?;

        if !output.status.success() {
            return Err(SigilError::OcrFailed {
                page: page_number,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let tokens = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(page = page_number, tokens = tokens.len(), "OCR finished");
        Ok(tokens)
    }
}

fn scratch_path_label(page_number: u32) -> String {
    format!("ocr scratch image (page {})", page_number)
}

struct TsvColumns {
    block: usize,
    paragraph: usize,
    line: usize,
    left: usize,
    top: usize,
    width: usize,
    height: usize,
    conf: usize,
    text: usize,
}

impl TsvColumns {
    fn from_header(header: &str) -> Option<Self> {
        let names: Vec<&str> = header.split('\t').map(str::trim).collect();
        let find = |name: &str| names.iter().position(|n| *n == name);
        Some(Self {
            block: find("block_num")?,
            paragraph: find("par_num")?,
            line: find("line_num")?,
            left: find("left")?,
            top: find("top")?,
            width: find("width")?,
            height: find("height")?,
            conf: find("conf")?,
            text: find("text")?,
        })
    }
}

/// Parse tesseract TSV output into word tokens. Rows without a confidence
/// (structural rows) and rows with empty text are skipped.
pub fn parse_tsv(tsv: &str) -> Vec<OcrToken> {
    let mut rows = tsv.lines();
    let columns = match rows.next().and_then(TsvColumns::from_header) {
        Some(c) => c,
        None => return Vec::new(),
    };

    rows.filter_map(|row| {
        let fields: Vec<&str> = row.split('\t').collect();
        let int = |i: usize| fields.get(i).and_then(|v| v.trim().parse::<i32>().ok());

        let conf: f32 = fields.get(columns.conf)?.trim().parse().ok()?;
        if conf <= -1.0 {
            return None;
        }
        let text = fields.get(columns.text).map(|t| t.trim()).unwrap_or("");
        if text.is_empty() {
            return None;
        }

        Some(OcrToken {
            text: text.to_string(),
            key: LineKey {
                block: int(columns.block)? as u32,
                paragraph: int(columns.paragraph)? as u32,
                line: int(columns.line)? as u32,
            },
            pixel_box: PixelRect::from_ltwh(
                int(columns.left)?,
                int(columns.top)?,
                int(columns.width)?,
                int(columns.height)?,
            ),
            confidence: conf,
        })
    })
    .collect()
}
