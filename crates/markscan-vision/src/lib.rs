// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// markscan-vision — The answer-sheet vision pipeline.
//
// Locates the sheet through its corner markers, corrects perspective, finds
// answer bubbles (circle voting with a contour fallback), groups them into
// questions and grades each question. A lighter corner-only pass drives the
// live camera preview.

pub mod image;
pub mod primitives;
pub mod scan;

#[cfg(test)]
pub(crate) mod testing;

// Re-export the primary structs so callers can use `markscan_vision::Scanner` etc.
pub use crate::image::sheet::SheetImage;
pub use primitives::circles::{CircleFinder, HoughCircleFinder};
pub use primitives::contours::{ContourFinder, ImageprocContours};
pub use scan::pipeline::Scanner;
pub use scan::preview::{DetectionState, PreviewAnalyzer, PreviewLane};
