// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic answer sheets for tests.
//
// Layouts are drawn in an 800x1100 design space that already matches the
// template proportions of a corrected sheet: a timing mark leads every row,
// followed by the row's bubbles.

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::rect::Rect;
use markscan_core::{BubbleCandidate, Point, TemplateLayout};

use crate::image::sheet::SheetImage;

pub(crate) const SHEET_WIDTH: u32 = 800;
pub(crate) const SHEET_HEIGHT: u32 = 1100;

const PAPER: u8 = 235;
const INK: u8 = 20;
const OUTLINE: u8 = 40;
const MARKER_SIDE: f32 = 24.0;
const TIMING_SIDE: f32 = 12.0;
/// Bubbles smaller than this get a single-pixel outline.
const THICK_OUTLINE_RADIUS: i32 = 12;

struct Slot {
    mark: Point,
    bubbles: Vec<Point>,
}

/// Row positions in design space, column-major, plus the bubble radius.
fn slots(total: u32, options: u32) -> (Vec<Slot>, f32) {
    let layout = TemplateLayout::for_question_count(total).expect("supported question count");
    let column_width = SHEET_WIDTH as f32 / layout.columns as f32;
    let pitch = column_width * 0.56 / (options.max(2) - 1) as f32;
    let row_pitch = 720.0 / (layout.questions_per_column - 1) as f32;
    let radius = (pitch * 0.27).min(row_pitch * 0.3);

    let slots = (0..total)
        .map(|q| {
            let column = q / layout.questions_per_column;
            let row = q % layout.questions_per_column;
            let left = column as f32 * column_width;
            let y = 200.0 + row as f32 * row_pitch;
            Slot {
                mark: Point::new(left + column_width * 0.155, y),
                bubbles: (0..options)
                    .map(|i| Point::new(left + column_width * 0.305 + i as f32 * pitch, y))
                    .collect(),
            }
        })
        .collect();
    (slots, radius)
}

/// Marked option per question, cycling through the options.
pub(crate) fn answer_pattern(total: u32, options: u32) -> Vec<usize> {
    (0..total).map(|q| (q % options) as usize).collect()
}

/// Every printed bubble, as detection would report it on a corrected sheet.
pub(crate) fn layout_bubbles(total: u32, options: u32) -> Vec<BubbleCandidate> {
    let (slots, radius) = slots(total, options);
    slots
        .iter()
        .flat_map(|slot| slot.bubbles.iter())
        .map(|p| BubbleCandidate {
            x: p.x,
            y: p.y,
            radius,
            darkness: 0.0,
            area: std::f32::consts::PI * radius * radius,
            circularity: 1.0,
        })
        .collect()
}

/// Row timing mark centres in design space.
pub(crate) fn layout_marks(total: u32, options: u32) -> Vec<Point> {
    slots(total, options).0.iter().map(|slot| slot.mark).collect()
}

fn draw_square(img: &mut GrayImage, center: Point, side: f32, value: u8) {
    let side = side.round().max(1.0) as u32;
    let half = side as f32 / 2.0;
    let (x, y) = ((center.x - half).round() as i32, (center.y - half).round() as i32);
    draw_filled_rect_mut(img, Rect::at(x, y).of_size(side, side), Luma([value]));
}

fn draw_content(
    img: &mut GrayImage,
    answers: &[usize],
    options: u32,
    timing_marks: bool,
    map: impl Fn(Point) -> Point,
    scale: f32,
) {
    let (slots, radius) = slots(answers.len() as u32, options);
    let r = (radius * scale).round() as i32;
    let rings = if r >= THICK_OUTLINE_RADIUS { 3 } else { 1 };
    for (slot, &answer) in slots.iter().zip(answers) {
        if timing_marks {
            draw_square(img, map(slot.mark), TIMING_SIDE * scale, INK);
        }
        for (i, &center) in slot.bubbles.iter().enumerate() {
            let c = map(center);
            let c = (c.x.round() as i32, c.y.round() as i32);
            if i == answer {
                draw_filled_circle_mut(img, c, r, Luma([INK]));
            } else {
                for k in 0..rings {
                    draw_hollow_circle_mut(img, c, r - k, Luma([OUTLINE]));
                }
            }
        }
    }
}

/// An already-corrected sheet: content fills the frame, corner markers sit
/// inside the corner margins.
pub(crate) fn flat_sheet(answers: &[usize], options: u32) -> SheetImage {
    render_flat(answers, options, true)
}

/// Like [`flat_sheet`] but without row timing marks.
pub(crate) fn unmarked_flat_sheet(answers: &[usize], options: u32) -> SheetImage {
    render_flat(answers, options, false)
}

fn render_flat(answers: &[usize], options: u32, timing_marks: bool) -> SheetImage {
    let mut img = GrayImage::from_pixel(SHEET_WIDTH, SHEET_HEIGHT, Luma([PAPER]));
    let (w, h) = (SHEET_WIDTH as f32, SHEET_HEIGHT as f32);
    for corner in [
        Point::new(20.0, 20.0),
        Point::new(w - 20.0, 20.0),
        Point::new(20.0, h - 20.0),
        Point::new(w - 20.0, h - 20.0),
    ] {
        draw_square(&mut img, corner, MARKER_SIDE, INK);
    }
    draw_content(&mut img, answers, options, timing_marks, |p| p, 1.0);
    SheetImage::from_luma(img).expect("non-empty sheet")
}

/// Corner markers at (40, 40) .. (760, 1060) on the printed page.
pub(crate) fn printed_page(answers: &[usize], options: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(SHEET_WIDTH, SHEET_HEIGHT, Luma([PAPER]));
    let (w, h) = (SHEET_WIDTH as f32, SHEET_HEIGHT as f32);
    let (sx, sy) = ((w - 80.0) / w, (h - 80.0) / h);
    for corner in [
        Point::new(40.0, 40.0),
        Point::new(w - 40.0, 40.0),
        Point::new(40.0, h - 40.0),
        Point::new(w - 40.0, h - 40.0),
    ] {
        draw_square(&mut img, corner, MARKER_SIDE, INK);
    }
    draw_content(
        &mut img,
        answers,
        options,
        true,
        |p| Point::new(40.0 + p.x * sx, 40.0 + p.y * sy),
        sx.min(sy),
    );
    img
}

/// The printed page as a camera sees it: slightly rotated and foreshortened
/// inside a larger frame.
pub(crate) fn photographed_sheet(answers: &[usize], options: u32) -> SheetImage {
    let page = printed_page(answers, options);
    let (w, h) = (SHEET_WIDTH as f32, SHEET_HEIGHT as f32);
    let projection = Projection::from_control_points(
        [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)],
        [(60.0, 40.0), (840.0, 70.0), (820.0, 1150.0), (30.0, 1120.0)],
    )
    .expect("non-degenerate projection");
    let mut frame = GrayImage::new(880, 1200);
    warp_into(&page, &projection, Interpolation::Bilinear, Luma([PAPER]), &mut frame);
    SheetImage::from_luma(frame).expect("non-empty frame")
}

/// Plain paper with nothing printed on it.
pub(crate) fn blank_frame() -> SheetImage {
    SheetImage::from_luma(GrayImage::from_pixel(SHEET_WIDTH, SHEET_HEIGHT, Luma([PAPER])))
        .expect("non-empty frame")
}
