// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the markscan-vision crate: a full 20-question scan
// and a single live-preview analysis on a synthetic sheet.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::rect::Rect;

use markscan_vision::{PreviewAnalyzer, Scanner, SheetImage};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// An 800x1100 sheet: four corner markers, two columns of ten rows, each row
/// a timing mark followed by five bubbles with one filled.
fn synthetic_sheet() -> SheetImage {
    let mut img = GrayImage::from_pixel(800, 1100, Luma([235u8]));
    for (x, y) in [(28, 28), (748, 28), (28, 1048), (748, 1048)] {
        draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(24, 24), Luma([20u8]));
    }
    for column in 0..2 {
        let left = 40 + column * 360;
        for row in 0..10 {
            let y = 220 + row * 75;
            draw_filled_rect_mut(&mut img, Rect::at(left + 50, y - 6).of_size(12, 12), Luma([20u8]));
            for option in 0..5 {
                let center = (left + 110 + option * 50, y);
                if option == row % 5 {
                    draw_filled_circle_mut(&mut img, center, 14, Luma([20u8]));
                } else {
                    for r in 12..=14 {
                        draw_hollow_circle_mut(&mut img, center, r, Luma([40u8]));
                    }
                }
            }
        }
    }
    SheetImage::from_luma(img).expect("non-empty sheet")
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Full pipeline: corners, correction, bubbles, grouping and grading.
fn bench_full_scan(c: &mut Criterion) {
    let sheet = synthetic_sheet();
    let scanner = Scanner::default();

    c.bench_function("full_scan (800x1100, 20 questions)", |b| {
        b.iter(|| black_box(scanner.scan(black_box(&sheet), 20, 5)));
    });
}

/// Corner-only analysis on a downscaled copy, as run for every camera frame.
fn bench_preview(c: &mut Criterion) {
    let sheet = synthetic_sheet();
    let analyzer = PreviewAnalyzer::default();

    c.bench_function("preview_analysis (800x1100)", |b| {
        b.iter(|| black_box(analyzer.analyze(black_box(&sheet))));
    });
}

criterion_group!(benches, bench_full_scan, bench_preview);
criterion_main!(benches);
