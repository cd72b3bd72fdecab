// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective correction — maps the quadrilateral spanned by the corner
// markers onto a rectangle the size of the source frame.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use markscan_core::Point;
use tracing::{info, instrument, warn};

/// Outcome of a correction attempt.
#[derive(Debug, Clone)]
pub struct Corrected {
    pub image: GrayImage,
    /// `false` when the input was returned unchanged.
    pub applied: bool,
}

/// Projective warp from four corner points.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerspectiveCorrector;

impl PerspectiveCorrector {
    /// Warp `gray` so that `quad` (TL, TR, BR, BL) lands on the frame corners.
    ///
    /// Without a quad, or when the transform is degenerate, the original
    /// image is returned unchanged.
    #[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
    pub fn correct(&self, gray: &GrayImage, quad: Option<[Point; 4]>) -> Corrected {
        let unchanged = || Corrected {
            image: gray.clone(),
            applied: false,
        };

        let Some(quad) = quad else {
            warn!("No valid corners; continuing on the uncorrected frame");
            return unchanged();
        };

        let (out_w, out_h) = gray.dimensions();
        let dest: [(f32, f32); 4] = [
            (0.0, 0.0),                   // top-left
            (out_w as f32, 0.0),          // top-right
            (out_w as f32, out_h as f32), // bottom-right
            (0.0, out_h as f32),          // bottom-left
        ];
        let src = quad.map(|p| (p.x, p.y));

        let projection = match Projection::from_control_points(src, dest) {
            Some(p) => p,
            None => {
                warn!("Failed to compute projective transform; continuing uncorrected");
                return unchanged();
            }
        };

        let mut output = GrayImage::new(out_w, out_h);
        warp_into(
            gray,
            &projection,
            Interpolation::Bilinear,
            Luma([255u8]),
            &mut output,
        );

        info!(out_w, out_h, "Perspective correction applied");
        Corrected {
            image: output,
            applied: true,
        }
    }
}
