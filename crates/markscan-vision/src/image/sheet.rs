// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sheet image — decoded frame held as 8-bit luma, with brightness sampling.
// Every later stage works on this grayscale buffer.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use markscan_core::error::{Result, ScanError};
use tracing::{debug, info, instrument};

/// A captured or previewed frame, converted to grayscale once on entry.
#[derive(Debug, Clone)]
pub struct SheetImage {
    gray: GrayImage,
}

impl SheetImage {
    // -- Construction ---------------------------------------------------------

    /// Decode raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| ScanError::Image(format!("failed to decode image: {}", err)))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Self::from_dynamic(&img)
    }

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let img = image::open(path.as_ref()).map_err(|err| {
            ScanError::Image(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Self::from_dynamic(&img)
    }

    /// Convert an already-decoded image.
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        Self::from_luma(image.to_luma8())
    }

    /// Wrap a grayscale buffer.
    pub fn from_luma(gray: GrayImage) -> Result<Self> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err(ScanError::EmptyImage);
        }
        Ok(Self { gray })
    }

    /// Wrap a raw interleaved RGB buffer as delivered by a camera.
    pub fn from_raw_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        let actual = pixels.len();
        let rgb = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            ScanError::Image(format!(
                "RGB buffer holds {actual} bytes, expected {expected} for {width}x{height}"
            ))
        })?;
        Self::from_dynamic(&DynamicImage::ImageRgb8(rgb))
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    pub fn area(&self) -> f32 {
        self.width() as f32 * self.height() as f32
    }

    pub fn as_luma(&self) -> &GrayImage {
        &self.gray
    }

    pub fn into_luma(self) -> GrayImage {
        self.gray
    }

    // -- Sampling -------------------------------------------------------------

    /// Brightness at `(x, y)`, or `None` outside the frame.
    pub fn brightness(&self, x: i64, y: i64) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return None;
        }
        Some(self.gray.get_pixel(x as u32, y as u32).0[0])
    }

    /// Mean brightness over the whole frame, in `[0, 255]`.
    pub fn mean_brightness(&self) -> f32 {
        mean_brightness(&self.gray)
    }

    /// Fraction of pixels darker than `threshold` inside a disc of
    /// `radius * inner_ratio` around `(cx, cy)`.
    ///
    /// Pixels outside the frame are not counted. Returns 0 when no pixel of
    /// the disc lies inside the frame.
    pub fn darkness_ratio(
        &self,
        cx: f32,
        cy: f32,
        radius: f32,
        inner_ratio: f32,
        threshold: u8,
    ) -> f32 {
        let r = (radius * inner_ratio).max(0.5);
        let r_sq = r * r;
        let (x0, x1) = ((cx - r).floor() as i64, (cx + r).ceil() as i64);
        let (y0, y1) = ((cy - r).floor() as i64, (cy + r).ceil() as i64);

        let mut total = 0u32;
        let mut dark = 0u32;
        for y in y0..=y1 {
            let dy = y as f32 - cy;
            for x in x0..=x1 {
                let dx = x as f32 - cx;
                if dx * dx + dy * dy > r_sq {
                    continue;
                }
                if let Some(value) = self.brightness(x, y) {
                    total += 1;
                    if value < threshold {
                        dark += 1;
                    }
                }
            }
        }

        if total == 0 {
            0.0
        } else {
            dark as f32 / total as f32
        }
    }

    // -- Transformations ------------------------------------------------------

    /// Downscale so the width is at most `max_width`, preserving aspect ratio.
    ///
    /// Returns the scaled image and the factor applied (1.0 when unchanged).
    pub fn downscale_to_width(&self, max_width: u32) -> (SheetImage, f32) {
        if self.width() <= max_width || max_width == 0 {
            return (self.clone(), 1.0);
        }
        let scale = max_width as f32 / self.width() as f32;
        let new_h = ((self.height() as f32 * scale).round() as u32).max(1);
        let resized = image::imageops::resize(&self.gray, max_width, new_h, FilterType::Triangle);
        debug!(
            from_w = self.width(),
            to_w = max_width,
            scale,
            "Frame downscaled"
        );
        (SheetImage { gray: resized }, scale)
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.gray
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| ScanError::Image(format!("image encoding failed: {}", err)))?;
        Ok(buffer)
    }
}

/// Mean pixel value of a grayscale image.
pub fn mean_brightness(gray: &GrayImage) -> f32 {
    let count = gray.width() as u64 * gray.height() as u64;
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = gray.as_raw().iter().map(|&v| v as u64).sum();
    (sum as f64 / count as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn empty_buffer_is_rejected() {
        let err = SheetImage::from_luma(GrayImage::new(0, 10)).unwrap_err();
        assert!(matches!(err, ScanError::EmptyImage));
    }

    #[test]
    fn short_rgb_buffer_is_an_image_error() {
        let err = SheetImage::from_raw_rgb(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, ScanError::Image(_)));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(SheetImage::from_bytes(b"not an image").is_err());
    }

    #[test]
    fn raw_rgb_converts_to_luma() {
        let sheet = SheetImage::from_raw_rgb(2, 1, vec![255, 255, 255, 0, 0, 0]).unwrap();
        assert_eq!(sheet.brightness(0, 0), Some(255));
        assert_eq!(sheet.brightness(1, 0), Some(0));
        assert_eq!(sheet.brightness(2, 0), None);
    }

    #[test]
    fn mean_brightness_of_half_black_frame() {
        let gray = GrayImage::from_fn(10, 10, |x, _| if x < 5 { Luma([0]) } else { Luma([200]) });
        let sheet = SheetImage::from_luma(gray).unwrap();
        assert!((sheet.mean_brightness() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn darkness_ratio_of_filled_and_blank_regions() {
        let gray = GrayImage::from_fn(60, 30, |x, _| if x < 30 { Luma([20]) } else { Luma([240]) });
        let sheet = SheetImage::from_luma(gray).unwrap();
        assert_eq!(sheet.darkness_ratio(15.0, 15.0, 10.0, 0.8, 128), 1.0);
        assert_eq!(sheet.darkness_ratio(45.0, 15.0, 10.0, 0.8, 128), 0.0);
        let edge = sheet.darkness_ratio(30.0, 15.0, 10.0, 0.8, 128);
        assert!(edge > 0.3 && edge < 0.7, "edge ratio {edge}");
    }

    #[test]
    fn darkness_outside_frame_is_zero() {
        let sheet = SheetImage::from_luma(GrayImage::new(10, 10)).unwrap();
        assert_eq!(sheet.darkness_ratio(-100.0, -100.0, 5.0, 0.8, 128), 0.0);
    }

    #[test]
    fn downscale_preserves_aspect() {
        let sheet = SheetImage::from_luma(GrayImage::new(1280, 960)).unwrap();
        let (small, scale) = sheet.downscale_to_width(640);
        assert_eq!(small.width(), 640);
        assert_eq!(small.height(), 480);
        assert!((scale - 0.5).abs() < 1e-6);

        let (same, scale) = small.downscale_to_width(640);
        assert_eq!(same.width(), 640);
        assert_eq!(scale, 1.0);
    }

    #[test]
    fn png_round_trip_keeps_dimensions() {
        let sheet = SheetImage::from_luma(GrayImage::from_pixel(8, 6, Luma([90]))).unwrap();
        let bytes = sheet.to_png_bytes().unwrap();
        let decoded = SheetImage::from_bytes(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }
}
