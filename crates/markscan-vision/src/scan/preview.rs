// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Live preview — corner detection only, on a downscaled copy of each camera
// frame, to tell the user when the sheet is framed well enough to capture.

use std::sync::atomic::{AtomicBool, Ordering};

use markscan_core::guidance::{Guidance, preview_guidance};
use markscan_core::{CornerRejection, DetectedCorners, Point, ScanConfig};
use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::image::sheet::SheetImage;
use crate::primitives::contours::{ContourFinder, ImageprocContours};
use crate::scan::corners::CornerResolver;
use crate::scan::markers::MarkerDetector;
use crate::scan::preprocess::AdaptivePreprocessor;

/// What the overlay needs to know about one preview frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionState {
    pub is_valid: bool,
    /// Corner roles and every marker seen, in frame pixels. Absent only when
    /// no marker was found at all.
    pub corners: Option<DetectedCorners>,
    pub rejection: Option<CornerRejection>,
    pub guidance: Guidance,
}

/// Per-frame corner analysis for capture guidance.
pub struct PreviewAnalyzer {
    config: ScanConfig,
    contours: Box<dyn ContourFinder>,
}

impl Default for PreviewAnalyzer {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

impl PreviewAnalyzer {
    pub fn new(config: ScanConfig) -> Self {
        Self::with_contours(config, Box::new(ImageprocContours))
    }

    pub fn with_contours(config: ScanConfig, contours: Box<dyn ContourFinder>) -> Self {
        Self { config, contours }
    }

    /// Analyze one frame. Never fails; an unusable frame is simply not valid.
    #[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    pub fn analyze(&self, frame: &SheetImage) -> DetectionState {
        let (small, scale) = frame.downscale_to_width(self.config.preview_max_width);
        let binary = AdaptivePreprocessor::new(self.config.preprocess).preprocess(small.as_luma());
        let markers = MarkerDetector::new(self.contours.as_ref())
            .find_markers(&binary, &self.config.preview_markers);

        let to_frame = |p: Point| Point::new(p.x / scale, p.y / scale);
        let resolution = CornerResolver::new(self.config.corners).resolve(
            &markers,
            small.width(),
            small.height(),
        );

        let (corners, rejection) = match resolution {
            Some(res) => (Some(res.corners.map(to_frame)), res.rejection),
            None if markers.is_empty() => (None, Some(CornerRejection::TooFewMarkers)),
            None => (
                Some(DetectedCorners {
                    all_markers: markers.iter().map(|m| to_frame(m.center)).collect(),
                    ..DetectedCorners::default()
                }),
                Some(CornerRejection::TooFewMarkers),
            ),
        };

        debug!(markers = markers.len(), ?rejection, "Preview frame analyzed");
        DetectionState {
            is_valid: rejection.is_none(),
            corners,
            rejection,
            guidance: preview_guidance(rejection),
        }
    }
}

/// Single-slot preview lane: a frame that arrives while the previous one is
/// still being analyzed is dropped, never queued.
pub struct PreviewLane {
    analyzer: PreviewAnalyzer,
    busy: AtomicBool,
}

impl PreviewLane {
    pub fn new(analyzer: PreviewAnalyzer) -> Self {
        Self {
            analyzer,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Analyze `frame` unless an analysis is already in flight.
    pub fn try_analyze(&self, frame: &SheetImage) -> Option<DetectionState> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("Preview busy; frame skipped");
            return None;
        }
        let _guard = BusyGuard(&self.busy);
        Some(self.analyzer.analyze(frame))
    }
}

/// Clears the busy flag when analysis ends, including by unwinding.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
