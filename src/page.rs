use image::{imageops, Rgba, RgbaImage};

use crate::error::SigilResult;
use crate::geometry::PageSize;
use crate::lines::TextLayerChar;

/// One page as the extraction strategies see it
pub trait PageSource {
    fn page_size(&self) -> PageSize;

    /// Rasterize at `zoom` pixels per page unit, transparent background
    fn render(&self, zoom: f32) -> SigilResult<RgbaImage>;

    /// Rasterize onto an opaque white background for OCR
    fn render_opaque(&self, zoom: f32) -> SigilResult<RgbaImage> {
        let mut image = self.render(zoom)?;
        flatten_on_white(&mut image);
        Ok(image)
    }

    /// Characters of the embedded text layer in reading order.
    /// Pages without one yield nothing.
    fn text_layer(&self) -> SigilResult<Vec<TextLayerChar>> {
        Ok(Vec::new())
    }
}

/// Composite every pixel over white and drop the alpha
pub fn flatten_on_white(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let alpha = pixel[3] as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        *pixel = Rgba([blend(pixel[0]), blend(pixel[1]), blend(pixel[2]), 255]);
    }
}

/// A page already held in memory, one pixel per page unit.
/// Stands in for a PDF page wherever a real document is not needed.
#[derive(Debug, Clone)]
pub struct RasterPage {
    image: RgbaImage,
    text_layer: Vec<TextLayerChar>,
}

impl RasterPage {
    pub fn new(image: RgbaImage) -> Self {
        Self { image, text_layer: Vec::new() }
    }

    pub fn with_text_layer(mut self, chars: Vec<TextLayerChar>) -> Self {
        self.text_layer = chars;
        self
    }
}

impl PageSource for RasterPage {
    fn page_size(&self) -> PageSize {
        PageSize::new(self.image.width() as f32, self.image.height() as f32)
    }

    fn render(&self, zoom: f32) -> SigilResult<RgbaImage> {
        let width = ((self.image.width() as f32) * zoom).round().max(1.0) as u32;
        let height = ((self.image.height() as f32) * zoom).round().max(1.0) as u32;
        Ok(imageops::resize(&self.image, width, height, imageops::FilterType::Nearest))
    }

    fn text_layer(&self) -> SigilResult<Vec<TextLayerChar>> {
        Ok(self.text_layer.clone())
    }
}
