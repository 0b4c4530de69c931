use image::{imageops, ImageFormat, RgbaImage};
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{ErrorContext, SigilError, SigilResult};
use crate::geometry::{PageRect, Scale};
use crate::glyph::SigilWriter;
use crate::page::PageSource;

/// Sigils are always cropped from a 4x render, whatever the preview zoom
pub const SIGIL_ZOOM: f32 = 4.0;

const HEADING_PREFIX_CHARS: usize = 30;

/// First 30 characters of the heading, anything but word characters,
/// hyphen, dot and space replaced by `_`
pub fn sanitize_heading(heading: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[^\w\-_. ]").expect("sanitize pattern is valid"));
    let prefix: String = heading.chars().take(HEADING_PREFIX_CHARS).collect();
    re.replace_all(&prefix, "_").into_owned()
}

/// Writes sigil crops under a deterministic, collision-free name.
/// One store lives for one scan; its counter never goes backwards.
#[derive(Debug)]
pub struct SigilImageStore {
    image_dir: PathBuf,
    counter: u64,
    dir_ready: bool,
}

impl SigilImageStore {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
            counter: 0,
            dir_ready: false,
        }
    }

    /// Number of save attempts so far
    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn file_name(heading: &str, page_number: u32, id: u64) -> String {
        format!("sigil_{}_p{}_id{}.png", sanitize_heading(heading), page_number, id)
    }

    /// Render `page` at 4x and save the crop of `bbox`
    pub fn save(
        &mut self,
        page: &dyn PageSource,
        bbox: PageRect,
        heading: &str,
        page_number: u32,
    ) -> SigilResult<Option<PathBuf>> {
        let raster = page.render(SIGIL_ZOOM)?;
        self.save_from_raster(&raster, SIGIL_ZOOM, bbox, heading, page_number)
    }

    /// Crop `bbox` (page units) out of a raster rendered at `zoom`.
    /// `Ok(None)` and no file when the crop is empty.
    pub fn save_from_raster(
        &mut self,
        raster: &RgbaImage,
        zoom: f32,
        bbox: PageRect,
        heading: &str,
        page_number: u32,
    ) -> SigilResult<Option<PathBuf>> {
        self.counter += 1;

        let window = match bbox
            .to_pixels(Scale::uniform(zoom))
            .crop_window(raster.width(), raster.height())
        {
            Some(window) => window,
            None => return Ok(None),
        };

        self.ensure_dir()?;
        let path = self
            .image_dir
            .join(Self::file_name(heading, page_number, self.counter));

        let crop = imageops::crop_imm(raster, window.x, window.y, window.width, window.height).to_image();
        crop.save_with_format(&path, ImageFormat::Png)
            .map_err(|e| SigilError::image(path.display().to_string(), e))?;

        debug!(path = %path.display(), width = window.width, height = window.height, "Sigil saved");
        Ok(Some(path))
    }

    fn ensure_dir(&mut self) -> SigilResult<()> {
        if !self.dir_ready {
            std::fs::create_dir_all(&self.image_dir).with_path(&self.image_dir)?;
            self.dir_ready = true;
        }
        Ok(())
    }
}

/// Binds the store to one page; the 4x render happens once, on the first
/// glyph that needs it.
pub struct PageSigilWriter<'a> {
    store: &'a mut SigilImageStore,
    page: &'a dyn PageSource,
    raster: Option<RgbaImage>,
}

impl<'a> PageSigilWriter<'a> {
    pub fn new(store: &'a mut SigilImageStore, page: &'a dyn PageSource) -> Self {
        Self { store, page, raster: None }
    }
}

impl SigilWriter for PageSigilWriter<'_> {
    fn write_sigil(&mut self, region: PageRect, heading: &str, page_number: u32) -> SigilResult<Option<PathBuf>> {
        if self.raster.is_none() {
            self.raster = Some(self.page.render(SIGIL_ZOOM)?);
        }
        match &self.raster {
            Some(raster) => self
                .store
                .save_from_raster(raster, SIGIL_ZOOM, region, heading, page_number),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PageSize;
    use crate::page::RasterPage;
    use image::Rgba;
    use tempfile::tempdir;

    fn page() -> RasterPage {
        let mut img = RgbaImage::from_pixel(50, 70, Rgba([255, 255, 255, 0]));
        for x in 10..12 {
            for y in 10..12 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        RasterPage::new(img)
    }

    #[test]
    fn test_sanitize_heading() {
        assert_eq!(sanitize_heading("SAL AMMONIAC"), "SAL AMMONIAC");
        assert_eq!(sanitize_heading("DRAGON'S BLOOD, RED"), "DRAGON_S BLOOD_ RED");
        assert_eq!(sanitize_heading(&"A".repeat(40)).len(), 30);
    }

    #[test]
    fn test_file_name_pattern() {
        assert_eq!(SigilImageStore::file_name("GOLD", 12, 3), "sigil_GOLD_p12_id3.png");
    }

    #[test]
    fn test_save_crops_at_4x() {
        let dir = tempdir().unwrap();
        let mut store = SigilImageStore::new(dir.path().join("sigils"));
        let path = store
            .save(&page(), PageRect::new(9.0, 9.0, 13.0, 13.0), "GOLD", 5)
            .unwrap()
            .expect("crop written");

        assert!(path.exists());
        assert!(path.ends_with("sigil_GOLD_p5_id1.png"));
        let saved = image::open(&path).unwrap().to_rgba8();
        assert_eq!((saved.width(), saved.height()), (16, 16));
        // glyph pixel survives, background keeps its alpha
        assert_eq!(saved.get_pixel(6, 6)[3], 255);
        assert_eq!(saved.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_zero_area_writes_nothing() {
        let dir = tempdir().unwrap();
        let image_dir = dir.path().join("sigils");
        let mut store = SigilImageStore::new(&image_dir);
        let result = store
            .save(&page(), PageRect::new(9.0, 9.0, 9.0, 13.0), "GOLD", 5)
            .unwrap();
        assert!(result.is_none());
        assert!(!image_dir.exists());
    }

    #[test]
    fn test_counter_is_monotonic() {
        let dir = tempdir().unwrap();
        let mut store = SigilImageStore::new(dir.path());
        let a = store.save(&page(), PageRect::new(1.0, 1.0, 3.0, 3.0), "A", 1).unwrap().unwrap();
        let _ = store.save(&page(), PageRect::new(1.0, 1.0, 1.0, 3.0), "A", 1).unwrap();
        let b = store.save(&page(), PageRect::new(1.0, 1.0, 3.0, 3.0), "A", 1).unwrap().unwrap();
        assert_ne!(a, b);
        assert_eq!(store.counter(), 3);
        assert!(b.ends_with("sigil_A_p1_id3.png"));
    }

    #[test]
    fn test_page_writer_renders_once() {
        use std::cell::Cell;

        struct CountingPage {
            inner: RasterPage,
            renders: Cell<usize>,
        }
        impl PageSource for CountingPage {
            fn page_size(&self) -> PageSize {
                self.inner.page_size()
            }
            fn render(&self, zoom: f32) -> SigilResult<RgbaImage> {
                self.renders.set(self.renders.get() + 1);
                self.inner.render(zoom)
            }
        }

        let dir = tempdir().unwrap();
        let mut store = SigilImageStore::new(dir.path());
        let counting = CountingPage { inner: page(), renders: Cell::new(0) };
        {
            let mut writer = PageSigilWriter::new(&mut store, &counting);
            writer.write_sigil(PageRect::new(1.0, 1.0, 3.0, 3.0), "A", 1).unwrap();
            writer.write_sigil(PageRect::new(5.0, 5.0, 8.0, 8.0), "A", 1).unwrap();
        }
        assert_eq!(counting.renders.get(), 1);
        assert_eq!(store.counter(), 2);
    }
}
