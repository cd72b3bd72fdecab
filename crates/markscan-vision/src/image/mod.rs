// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — decoding, grayscale conversion and pixel sampling.

pub mod sheet;

pub use sheet::SheetImage;
