// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Vision primitives behind trait seams: contour tracing and circle detection.
// The pipeline only relies on their documented semantics, so another vision
// library can be swapped in by implementing the traits.

pub mod circles;
pub mod contours;

pub use circles::{Circle, CircleFinder, CircleParams, HoughCircleFinder};
pub use contours::{Contour, ContourFinder, ImageprocContours, RetrievalMode};
