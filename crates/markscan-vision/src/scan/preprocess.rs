// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adaptive preprocessing — blur followed by inverse local-mean thresholding,
// with the block size and constant picked from the frame's mean brightness.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::integral_image::integral_image;
use markscan_core::config::PreprocessConfig;
use tracing::{debug, instrument};

use crate::image::sheet::mean_brightness;

/// Threshold parameters chosen for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdParams {
    /// Odd side length of the local-mean window.
    pub block_size: u32,
    /// Subtracted from the local mean before comparison.
    pub constant: f32,
}

/// Grayscale → blur → inverse adaptive threshold.
///
/// In the output, dark ink is foreground (255) and paper is background (0).
#[derive(Debug, Clone, Copy)]
pub struct AdaptivePreprocessor {
    config: PreprocessConfig,
}

impl AdaptivePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Larger windows and a larger constant for dim frames, where the
    /// paper-to-ink contrast is lower and sensor noise higher.
    pub fn select_params(&self, brightness: f32) -> ThresholdParams {
        if brightness >= self.config.brightness_split {
            ThresholdParams {
                block_size: self.config.bright_block_size,
                constant: self.config.bright_constant,
            }
        } else {
            ThresholdParams {
                block_size: self.config.dark_block_size,
                constant: self.config.dark_constant,
            }
        }
    }

    /// Binarize a grayscale frame.
    #[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
    pub fn preprocess(&self, gray: &GrayImage) -> GrayImage {
        let brightness = mean_brightness(gray);
        let params = self.select_params(brightness);
        debug!(
            brightness,
            block_size = params.block_size,
            constant = params.constant,
            "Threshold parameters selected"
        );

        let blurred = if self.config.blur_sigma > 0.0 {
            gaussian_blur_f32(gray, self.config.blur_sigma)
        } else {
            gray.clone()
        };
        threshold_inverse(&blurred, params)
    }
}

/// Inverse mean-C thresholding: a pixel is foreground when it is at least
/// `constant` darker than the mean of its `block_size` neighbourhood. The
/// window is clipped at the image border.
pub fn threshold_inverse(gray: &GrayImage, params: ThresholdParams) -> GrayImage {
    let (width, height) = gray.dimensions();
    // (width + 1) x (height + 1); entry (x, y) sums the pixels above and left of it.
    let sums: ImageBuffer<Luma<u64>, Vec<u64>> = integral_image::<_, u64>(gray);
    let sum_at = |x: u32, y: u32| sums.get_pixel(x, y).0[0] as f64;
    let radius = params.block_size / 2;

    GrayImage::from_fn(width, height, |x, y| {
        let (x0, y0) = (x.saturating_sub(radius), y.saturating_sub(radius));
        let (x1, y1) = ((x + radius + 1).min(width), (y + radius + 1).min(height));
        let window = sum_at(x1, y1) - sum_at(x0, y1) - sum_at(x1, y0) + sum_at(x0, y0);
        let mean = window / f64::from((x1 - x0) * (y1 - y0));
        if f64::from(gray.get_pixel(x, y).0[0]) <= mean - f64::from(params.constant) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
