//! Page-coordinate / raster-pixel translation.
//!
//! Page coordinates are the document's native units with a top-left origin.
//! Pixel rectangles come from a raster rendered at some zoom; dividing by the
//! zoom brings them back to page units, multiplying takes page units to the
//! raster.

use serde::{Deserialize, Serialize};

/// Rectangle in page-coordinate units, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct PageRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl From<[f32; 4]> for PageRect {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<PageRect> for [f32; 4] {
    fn from(r: PageRect) -> Self {
        [r.x0, r.y0, r.x1, r.y1]
    }
}

impl PageRect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Convert a bottom-left-origin rectangle (PDFium native) to top-left page space
    pub fn from_bottom_left(left: f32, bottom: f32, right: f32, top: f32, page_height: f32) -> Self {
        let flipped_top = page_height - top;
        let flipped_bottom = page_height - bottom;
        Self::new(
            left.min(right),
            flipped_top.min(flipped_bottom),
            left.max(right),
            flipped_top.max(flipped_bottom),
        )
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Grow by `amount` on every side
    pub fn pad(&self, amount: f32) -> Self {
        Self::new(self.x0 - amount, self.y0 - amount, self.x1 + amount, self.y1 + amount)
    }

    pub fn is_within(&self, page: PageSize) -> bool {
        self.x0 >= 0.0 && self.y0 >= 0.0 && self.x1 <= page.width && self.y1 <= page.height
    }

    pub fn union(&self, other: &PageRect) -> Self {
        Self::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    /// Exact identity of the tuple, usable as a hash key
    pub fn key(&self) -> [u32; 4] {
        [self.x0.to_bits(), self.y0.to_bits(), self.x1.to_bits(), self.y1.to_bits()]
    }

    pub fn to_pixels(&self, scale: Scale) -> PixelRect {
        PixelRect {
            left: self.x0 * scale.x,
            top: self.y0 * scale.y,
            right: self.x1 * scale.x,
            bottom: self.y1 * scale.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Horizontal and vertical zoom between page units and pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    pub fn uniform(zoom: f32) -> Self {
        Self { x: zoom, y: zoom }
    }
}

/// Rectangle in raster pixels (fractional until cropped)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl PixelRect {
    /// From an OCR-style (left, top, width, height) box
    pub fn from_ltwh(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left: left as f32,
            top: top as f32,
            right: (left + width) as f32,
            bottom: (top + height) as f32,
        }
    }

    pub fn to_page(&self, scale: Scale) -> PageRect {
        PageRect::new(
            self.left / scale.x,
            self.top / scale.y,
            self.right / scale.x,
            self.bottom / scale.y,
        )
    }

    /// Whole-pixel crop window clamped to a `width`×`height` raster.
    /// Rounds outward; `None` when nothing is left.
    pub fn crop_window(&self, width: u32, height: u32) -> Option<CropWindow> {
        let x0 = self.left.floor().max(0.0) as u32;
        let y0 = self.top.floor().max(0.0) as u32;
        let x1 = (self.right.ceil().max(0.0) as u32).min(width);
        let y1 = (self.bottom.ceil().max(0.0) as u32).min(height);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(CropWindow { x: x0, y: y0, width: x1 - x0, height: y1 - y0 })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_to_page_divides_by_zoom() {
        let px = PixelRect::from_ltwh(20, 40, 10, 6);
        let page = px.to_page(Scale::uniform(2.0));
        assert_eq!(page, PageRect::new(10.0, 20.0, 15.0, 23.0));
    }

    #[test]
    fn test_round_trip_through_scale() {
        let rect = PageRect::new(9.0, 9.0, 13.0, 13.0);
        let back = rect.to_pixels(Scale::uniform(4.0)).to_page(Scale::uniform(4.0));
        assert_eq!(rect, back);
    }

    #[test]
    fn test_bottom_left_flip() {
        // 700-unit page, glyph 10 units above the bottom edge
        let rect = PageRect::from_bottom_left(10.0, 10.0, 12.0, 12.0, 700.0);
        assert_eq!(rect, PageRect::new(10.0, 688.0, 12.0, 690.0));
    }

    #[test]
    fn test_pad_and_bounds() {
        let page = PageSize::new(500.0, 700.0);
        let padded = PageRect::new(10.0, 10.0, 12.0, 12.0).pad(1.0);
        assert_eq!(padded, PageRect::new(9.0, 9.0, 13.0, 13.0));
        assert!(padded.is_within(page));
        assert!(!PageRect::new(0.5, 3.0, 2.0, 4.0).pad(1.0).is_within(page));
    }

    #[test]
    fn test_crop_window_rounds_outward_and_clamps() {
        let px = PixelRect { left: 1.2, top: 2.7, right: 5.1, bottom: 9.0 };
        assert_eq!(
            px.crop_window(100, 100),
            Some(CropWindow { x: 1, y: 2, width: 5, height: 7 })
        );

        let overhang = PixelRect { left: 95.0, top: 0.0, right: 120.0, bottom: 3.0 };
        assert_eq!(overhang.crop_window(100, 100).map(|w| w.width), Some(5));
    }

    #[test]
    fn test_crop_window_zero_area() {
        let flat = PixelRect { left: 4.0, top: 4.0, right: 4.0, bottom: 8.0 };
        assert_eq!(flat.crop_window(100, 100), None);

        let outside = PixelRect { left: 150.0, top: 10.0, right: 160.0, bottom: 20.0 };
        assert_eq!(outside.crop_window(100, 100), None);
    }

    #[test]
    fn test_union() {
        let a = PageRect::new(0.0, 0.0, 2.0, 2.0);
        let b = PageRect::new(1.0, -1.0, 5.0, 1.0);
        assert_eq!(a.union(&b), PageRect::new(0.0, -1.0, 5.0, 2.0));
    }
}
