// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — preprocessing, marker and corner detection, perspective
// correction, bubble detection, question grouping, grading and live preview.

pub mod answers;
pub mod bubbles;
pub mod confidence;
pub mod corners;
pub mod grouping;
pub mod markers;
pub mod perspective;
pub mod pipeline;
pub mod preprocess;
pub mod preview;

pub use pipeline::Scanner;
pub use preview::{DetectionState, PreviewAnalyzer, PreviewLane};
