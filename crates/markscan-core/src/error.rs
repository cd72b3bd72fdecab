// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Markscan.

use thiserror::Error;

/// Top-level error type for all Markscan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    // -- Scan parameters --
    #[error("unsupported question count: {0} (supported: 20, 50, 100)")]
    UnsupportedQuestionCount(u32),

    #[error("invalid options per question: {0} (expected 2..=26)")]
    InvalidOptionCount(u32),

    // -- Image input --
    #[error("image processing failed: {0}")]
    Image(String),

    #[error("image has no pixels")]
    EmptyImage,

    // -- Detection --
    #[error("No bubbles detected. Make sure the whole answer sheet is visible and well lit.")]
    NoBubblesDetected,

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanError>;
