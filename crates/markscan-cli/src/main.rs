// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Markscan — answer-sheet scanner
//
// Entry point. Initialises logging, loads the scanner configuration, runs a
// full scan or a preview analysis and prints the result as JSON on stdout.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use markscan_core::error::Result;
use markscan_core::guidance::{humanize_error, review_guidance};
use markscan_core::{ScanConfig, ScanResult};
use markscan_vision::{PreviewAnalyzer, Scanner, SheetImage};
use serde_json::json;

use cli::{Cli, Command};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            let guidance = humanize_error(&err);
            tracing::error!(error = %err, "markscan failed");
            eprintln!("{}: {}", guidance.message, guidance.suggestion);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => ScanConfig::from_json_file(path)?,
        None => ScanConfig::default(),
    };

    match cli.command {
        Command::Scan {
            image,
            questions,
            options,
            corrected,
        } => {
            config.attach_corrected_image = corrected.is_some();
            let sheet = SheetImage::open(&image)?;
            let result = Scanner::new(config).scan(&sheet, questions, options);

            if let (Some(path), Some(png)) = (
                &corrected,
                result.report().and_then(|r| r.corrected_image.as_ref()),
            ) {
                std::fs::write(path, png)?;
                tracing::info!(path = %path.display(), "Corrected sheet written");
            }

            let guidance = match &result {
                ScanResult::Success(report) => review_guidance(report),
                ScanResult::Error { .. } => None,
            };
            let output = json!({
                "result": result,
                "needs_review": result.report().is_some_and(|r| r.needs_review()),
                "guidance": guidance,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);

            Ok(if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Preview { image } => {
            let frame = SheetImage::open(&image)?;
            let state = PreviewAnalyzer::new(config).analyze(&frame);
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(if state.is_valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
