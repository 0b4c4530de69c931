//! Sketch-to-sigil search over perceptual hashes.

use image::{DynamicImage, Rgb};
use image_hasher::{HashAlg, Hasher, HasherConfig};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{SigilError, SigilResult};
use crate::logging::PerformanceTimer;
use crate::model::{Entry, SigilMetadata};

pub const DEFAULT_TOP_K: usize = 10;

/// Blank sketch canvas colour
pub const CANVAS_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Fixed-length image fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashBits(Vec<u8>);

impl HashBits {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hamming distance; lower means more alike
    pub fn distance(&self, other: &HashBits) -> u32 {
        let common: u32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        // a length mismatch counts every unmatched bit as different
        let extra = self.0.len().abs_diff(other.0.len()) as u32 * 8;
        common + extra
    }
}

pub trait PerceptualHasher {
    fn hash(&self, image: &DynamicImage) -> SigilResult<HashBits>;
}

/// 8x8 DCT perceptual hash, thresholded on the median coefficient
pub struct PhashHasher {
    hasher: Hasher,
}

impl PhashHasher {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();
        Self { hasher }
    }
}

impl Default for PhashHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PerceptualHasher for PhashHasher {
    fn hash(&self, image: &DynamicImage) -> SigilResult<HashBits> {
        if image.width() == 0 || image.height() == 0 {
            return Err(SigilError::Hashing { message: "image has no pixels".to_string() });
        }
        let hash = self.hasher.hash_image(image);
        Ok(HashBits::from_bytes(hash.as_bytes()))
    }
}

/// One ranked hit. Borrowed from the corpus it was found in.
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    pub distance: u32,
    pub sigil: &'a SigilMetadata,
    pub parent_entry: &'a Entry,
}

/// True when every pixel is the canvas background
pub fn is_blank_canvas(image: &DynamicImage, background: Rgb<u8>) -> bool {
    image.to_rgb8().pixels().all(|p| *p == background)
}

pub struct SimilarityIndex<H: PerceptualHasher = PhashHasher> {
    hasher: H,
    top_k: usize,
    background: Rgb<u8>,
}

impl SimilarityIndex<PhashHasher> {
    pub fn new(top_k: usize) -> Self {
        Self::with_hasher(PhashHasher::new(), top_k)
    }
}

impl Default for SimilarityIndex<PhashHasher> {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl<H: PerceptualHasher> SimilarityIndex<H> {
    pub fn with_hasher(hasher: H, top_k: usize) -> Self {
        Self {
            hasher,
            top_k,
            background: CANVAS_BACKGROUND,
        }
    }

    /// Rank every readable sigil image in `corpus` (the (entry, sigil)
    /// pairs of a dataset) by distance to `query`. Ties keep corpus order.
    pub fn search<'a, I>(&self, query: &DynamicImage, corpus: I) -> SigilResult<Vec<MatchResult<'a>>>
    where
        I: IntoIterator<Item = (&'a Entry, &'a SigilMetadata)>,
    {
        if is_blank_canvas(query, self.background) {
            return Err(SigilError::NothingDrawn);
        }

        let timer = PerformanceTimer::start("sigil search");
        let query_hash = self.hasher.hash(query)?;
        timer.checkpoint("query hashed");

        let mut matches = Vec::new();
        let mut skipped = 0usize;
        for (entry, sigil) in corpus {
            match self.hash_stored(sigil) {
                Ok(hash) => matches.push(MatchResult {
                    distance: query_hash.distance(&hash),
                    sigil,
                    parent_entry: entry,
                }),
                Err(e) if e.is_recoverable() => {
                    skipped += 1;
                    warn!(path = %sigil.image_path, error = %e, "Error processing stored sigil image");
                }
                Err(e) => return Err(e),
            }
        }

        matches.sort_by_key(|m| m.distance);
        matches.truncate(self.top_k);
        info!(matches = matches.len(), skipped, "Sigil search complete");
        Ok(matches)
    }

    fn hash_stored(&self, sigil: &SigilMetadata) -> SigilResult<HashBits> {
        let path = Path::new(&sigil.image_path);
        if !path.exists() {
            return Err(SigilError::file_io(
                sigil.image_path.clone(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "sigil image missing"),
            ));
        }
        let image = image::open(path).map_err(|e| SigilError::image(sigil.image_path.clone(), e))?;
        self.hasher.hash(&image)
    }
}
