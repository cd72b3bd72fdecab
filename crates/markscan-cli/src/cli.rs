// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON file overriding scanner thresholds.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Read the answers from a photographed answer sheet.
    Scan {
        /// The photograph to scan.
        image: PathBuf,
        /// Number of questions on the sheet (20, 50 or 100).
        #[arg(short = 'q', long)]
        questions: u32,
        /// Options per question.
        #[arg(short, long, default_value_t = 5)]
        options: u32,
        /// Write the perspective-corrected sheet to this PNG file.
        #[arg(long)]
        corrected: Option<PathBuf>,
    },
    /// Check whether a frame shows all four corner markers.
    Preview {
        /// The frame to analyze.
        image: PathBuf,
    },
}
