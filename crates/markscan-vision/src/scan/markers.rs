// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Marker detection — small solid near-square blobs used as corner markers and
// row timing marks.

use image::GrayImage;
use markscan_core::MarkerCandidate;
use markscan_core::config::MarkerFilter;
use tracing::{debug, instrument};

use crate::primitives::contours::{ContourFinder, RetrievalMode};

/// Finds marker candidates in a binarized frame.
pub struct MarkerDetector<'a> {
    contours: &'a dyn ContourFinder,
}

impl<'a> MarkerDetector<'a> {
    pub fn new(contours: &'a dyn ContourFinder) -> Self {
        Self { contours }
    }

    /// External contours that pass the area, aspect and solidity filters.
    ///
    /// The output order follows contour tracing and carries no meaning.
    /// Degenerate contours are skipped, never reported as errors.
    #[instrument(skip_all, fields(width = binary.width(), height = binary.height()))]
    pub fn find_markers(&self, binary: &GrayImage, filter: &MarkerFilter) -> Vec<MarkerCandidate> {
        let image_area = binary.width() as f32 * binary.height() as f32;
        let min_area = filter.min_area_ratio * image_area;
        let max_area = filter.max_area_ratio * image_area;

        let contours = self.contours.find_contours(binary, RetrievalMode::External);
        let total = contours.len();

        let markers: Vec<MarkerCandidate> = contours
            .iter()
            .filter_map(|contour| {
                let area = contour.area();
                if area <= 0.0 || area < min_area || area > max_area {
                    return None;
                }
                let bbox = contour.bounding_box();
                let aspect = bbox.aspect_ratio();
                if !(filter.min_aspect..=filter.max_aspect).contains(&aspect) {
                    return None;
                }
                let box_area = bbox.area();
                if box_area <= 0.0 || area / box_area < filter.min_solidity {
                    return None;
                }
                Some(MarkerCandidate {
                    center: bbox.center(),
                    area,
                    bounding_box: bbox,
                })
            })
            .collect();

        debug!(contours = total, markers = markers.len(), "Marker search complete");
        markers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::contours::ImageprocContours;
    use image::Luma;
    use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
    use imageproc::rect::Rect;

    fn binary_with(rects: &[(i32, i32, u32, u32)]) -> GrayImage {
        let mut img = GrayImage::new(400, 300);
        for &(x, y, w, h) in rects {
            draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(w, h), Luma([255]));
        }
        img
    }

    #[test]
    fn square_blobs_become_markers() {
        let img = binary_with(&[(20, 20, 16, 16), (360, 20, 16, 16)]);
        let markers = MarkerDetector::new(&ImageprocContours).find_markers(&img, &MarkerFilter::CORNERS);
        assert_eq!(markers.len(), 2);
        for m in &markers {
            assert!((m.area - 225.0).abs() < 1.0, "area {}", m.area);
            assert!(m.center.y > 26.0 && m.center.y < 29.0);
        }
    }

    #[test]
    fn elongated_blobs_are_rejected() {
        let img = binary_with(&[(20, 20, 60, 10)]);
        let markers = MarkerDetector::new(&ImageprocContours).find_markers(&img, &MarkerFilter::CORNERS);
        assert!(markers.is_empty());
    }

    #[test]
    fn blobs_outside_area_band_are_rejected() {
        // 400x300 frame: corner band is [36, 2400] square pixels.
        let img = binary_with(&[(10, 10, 4, 4), (100, 100, 80, 80)]);
        let markers = MarkerDetector::new(&ImageprocContours).find_markers(&img, &MarkerFilter::CORNERS);
        assert!(markers.is_empty());
    }

    #[test]
    fn thin_crossed_lines_are_rejected() {
        let mut img = GrayImage::new(400, 300);
        // A thin diagonal cross has a square bounding box but almost no area.
        draw_line_segment_mut(&mut img, (100.0, 100.0), (130.0, 130.0), Luma([255]));
        draw_line_segment_mut(&mut img, (130.0, 100.0), (100.0, 130.0), Luma([255]));
        let markers = MarkerDetector::new(&ImageprocContours).find_markers(&img, &MarkerFilter::CORNERS);
        assert!(markers.is_empty());
    }

    #[test]
    fn empty_frame_has_no_markers() {
        let img = GrayImage::new(50, 50);
        assert!(MarkerDetector::new(&ImageprocContours)
            .find_markers(&img, &MarkerFilter::TIMING_MARKS)
            .is_empty());
    }
}
