// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner resolution — picks the four extremal markers and checks that they
// plausibly bound a printed sheet.

use markscan_core::config::CornerValidation;
use markscan_core::{CornerRejection, DetectedCorners, MarkerCandidate, Point};
use tracing::debug;

/// The four corner roles plus the verdict on them.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerResolution {
    /// Role assignments, kept even when validation fails so an overlay can
    /// show what was found.
    pub corners: DetectedCorners,
    /// First failed check, or `None` when the corners are usable.
    pub rejection: Option<CornerRejection>,
}

impl CornerResolution {
    pub fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }

    /// The corner quad (TL, TR, BR, BL) if validation passed.
    pub fn valid_quad(&self) -> Option<[Point; 4]> {
        if self.is_valid() {
            self.corners.quad()
        } else {
            None
        }
    }
}

/// Assigns corner roles by extremal coordinate sums and differences.
#[derive(Debug, Clone, Copy, Default)]
pub struct CornerResolver {
    validation: CornerValidation,
}

impl CornerResolver {
    pub fn new(validation: CornerValidation) -> Self {
        Self { validation }
    }

    /// Resolve corners from marker candidates found in a `width`x`height` frame.
    ///
    /// Returns `None` when fewer than four markers are supplied. The role
    /// assignment does not assume markers sit near the frame edges.
    pub fn resolve(
        &self,
        markers: &[MarkerCandidate],
        width: u32,
        height: u32,
    ) -> Option<CornerResolution> {
        if markers.len() < 4 {
            debug!(markers = markers.len(), "Too few markers for corner resolution");
            return None;
        }

        let pick = |key: fn(&Point) -> f32, largest: bool| -> Option<usize> {
            let iter = markers.iter().enumerate();
            let cmp = |a: &(usize, &MarkerCandidate), b: &(usize, &MarkerCandidate)| {
                key(&a.1.center).total_cmp(&key(&b.1.center))
            };
            if largest {
                iter.max_by(cmp).map(|(i, _)| i)
            } else {
                iter.min_by(cmp).map(|(i, _)| i)
            }
        };

        let tl = pick(|p| p.x + p.y, false);
        let br = pick(|p| p.x + p.y, true);
        let tr = pick(|p| p.x - p.y, true);
        let bl = pick(|p| p.y - p.x, true);

        let center = |idx: Option<usize>| idx.map(|i| markers[i].center);
        let corners = DetectedCorners {
            top_left: center(tl),
            top_right: center(tr),
            bottom_left: center(bl),
            bottom_right: center(br),
            all_markers: markers.iter().map(|m| m.center).collect(),
        };

        let rejection = match (tl, tr, br, bl) {
            (Some(tl), Some(tr), Some(br), Some(bl)) => {
                self.check([tl, tr, br, bl], markers, width, height)
            }
            _ => Some(CornerRejection::MissingCorner),
        };

        debug!(
            markers = markers.len(),
            valid = rejection.is_none(),
            ?rejection,
            "Corners resolved"
        );
        Some(CornerResolution { corners, rejection })
    }

    /// Distinctness, marker size consistency, extent and parallelism, in that order.
    fn check(
        &self,
        roles: [usize; 4],
        markers: &[MarkerCandidate],
        width: u32,
        height: u32,
    ) -> Option<CornerRejection> {
        let mut unique = roles.to_vec();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() != 4 {
            return Some(CornerRejection::DuplicateMarker);
        }

        let areas = roles.map(|i| markers[i].area);
        let smallest = areas.iter().copied().fold(f32::INFINITY, f32::min);
        let largest = areas.iter().copied().fold(0.0f32, f32::max);
        if smallest <= 0.0 || largest / smallest > self.validation.max_marker_area_ratio {
            return Some(CornerRejection::InconsistentMarkerSize);
        }

        let [tl, tr, br, bl] = roles.map(|i| markers[i].center);
        let top = tl.distance(&tr);
        let bottom = bl.distance(&br);
        let left = tl.distance(&bl);
        let right = tr.distance(&br);

        let avg_width = (top + bottom) / 2.0;
        let avg_height = (left + right) / 2.0;
        if avg_width < self.validation.min_extent_ratio * width as f32
            || avg_height < self.validation.min_extent_ratio * height as f32
        {
            return Some(CornerRejection::TooSmall);
        }

        let ratio = |a: f32, b: f32| a.min(b) / a.max(b);
        if ratio(top, bottom) < self.validation.min_parallelism
            || ratio(left, right) < self.validation.min_parallelism
        {
            return Some(CornerRejection::NotRectangular);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markscan_core::BoundingBox;

    fn marker(x: f32, y: f32, side: f32) -> MarkerCandidate {
        MarkerCandidate {
            center: Point::new(x, y),
            area: side * side,
            bounding_box: BoundingBox {
                x: x - side / 2.0,
                y: y - side / 2.0,
                width: side,
                height: side,
            },
        }
    }

    fn sheet_markers(dx: f32, dy: f32) -> Vec<MarkerCandidate> {
        vec![
            marker(700.0 + dx, 60.0 + dy, 20.0),
            marker(50.0 + dx, 900.0 + dy, 20.0),
            marker(60.0 + dx, 50.0 + dy, 20.0),
            marker(710.0 + dx, 910.0 + dy, 20.0),
            // A bubble-sized blob in the middle never wins an extremal role.
            marker(380.0 + dx, 480.0 + dy, 12.0),
        ]
    }

    fn resolver() -> CornerResolver {
        CornerResolver::new(CornerValidation::default())
    }

    #[test]
    fn resolves_a_well_formed_sheet() {
        let res = resolver().resolve(&sheet_markers(0.0, 0.0), 800, 1000).unwrap();
        assert!(res.is_valid(), "rejection: {:?}", res.rejection);
        assert_eq!(res.corners.top_left, Some(Point::new(60.0, 50.0)));
        assert_eq!(res.corners.top_right, Some(Point::new(700.0, 60.0)));
        assert_eq!(res.corners.bottom_left, Some(Point::new(50.0, 900.0)));
        assert_eq!(res.corners.bottom_right, Some(Point::new(710.0, 910.0)));
        assert_eq!(res.corners.all_markers.len(), 5);
        assert!(res.valid_quad().is_some());
    }

    #[test]
    fn role_assignment_is_translation_invariant() {
        let base = resolver().resolve(&sheet_markers(0.0, 0.0), 800, 1000).unwrap();
        let shifted = resolver()
            .resolve(&sheet_markers(-35.0, 48.0), 800, 1000)
            .unwrap();
        let moved = base.corners.map(|p| p.offset(-35.0, 48.0));
        assert_eq!(shifted.corners.top_left, moved.top_left);
        assert_eq!(shifted.corners.top_right, moved.top_right);
        assert_eq!(shifted.corners.bottom_left, moved.bottom_left);
        assert_eq!(shifted.corners.bottom_right, moved.bottom_right);
        assert_eq!(shifted.rejection, base.rejection);
    }

    #[test]
    fn fewer_than_four_markers_is_absent() {
        let markers = &sheet_markers(0.0, 0.0)[..3];
        assert!(resolver().resolve(markers, 800, 1000).is_none());
        assert!(resolver().resolve(&[], 800, 1000).is_none());
    }

    #[test]
    fn shared_extremal_marker_is_a_duplicate() {
        // Four markers on a diagonal: the last one is both BR and TR.
        let markers = vec![
            marker(10.0, 10.0, 10.0),
            marker(200.0, 200.0, 10.0),
            marker(400.0, 400.0, 10.0),
            marker(600.0, 600.0, 10.0),
        ];
        let res = resolver().resolve(&markers, 800, 800).unwrap();
        assert_eq!(res.rejection, Some(CornerRejection::DuplicateMarker));
        assert!(res.corners.top_left.is_some());
        assert!(res.valid_quad().is_none());
    }

    #[test]
    fn inconsistent_marker_sizes_are_rejected() {
        let mut markers = sheet_markers(0.0, 0.0);
        markers[3] = marker(710.0, 910.0, 80.0);
        let res = resolver().resolve(&markers, 800, 1000).unwrap();
        assert_eq!(res.rejection, Some(CornerRejection::InconsistentMarkerSize));
    }

    #[test]
    fn tiny_quad_is_rejected() {
        let markers = vec![
            marker(100.0, 100.0, 10.0),
            marker(150.0, 100.0, 10.0),
            marker(100.0, 150.0, 10.0),
            marker(150.0, 150.0, 10.0),
        ];
        let res = resolver().resolve(&markers, 800, 1000).unwrap();
        assert_eq!(res.rejection, Some(CornerRejection::TooSmall));
    }

    #[test]
    fn trapezoid_is_not_rectangular() {
        let markers = vec![
            marker(350.0, 50.0, 10.0),
            marker(450.0, 50.0, 10.0),
            marker(50.0, 900.0, 10.0),
            marker(750.0, 900.0, 10.0),
        ];
        let res = resolver().resolve(&markers, 800, 1000).unwrap();
        assert_eq!(res.rejection, Some(CornerRejection::NotRectangular));
    }
}
