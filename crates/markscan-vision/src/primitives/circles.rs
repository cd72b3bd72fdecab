// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Circle detection by gradient voting.
//
// Every edge pixel votes along its gradient direction (both ways) at each
// radius in [min_radius, max_radius]. Circle centres collect votes from the
// whole circumference and show up as accumulator peaks. Peaks are visited
// strongest first; each is confirmed by the angular coverage of edge pixels
// around it. Two arcs of neighbouring circles can pile up as many votes as a
// real circle, but they only cover the sides facing them.

use std::f32::consts::{PI, TAU};

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use markscan_core::Point;
use tracing::debug;

/// Angular sectors used to measure circumference coverage.
const SECTORS: usize = 24;

/// A detected circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Point,
    pub radius: f32,
    /// Fraction of the circumference (in angular sectors) carrying edge
    /// pixels at `radius`; 0 when unscored.
    pub support: f32,
}

impl Circle {
    pub fn new(center: Point, radius: f32) -> Self {
        Self {
            center,
            radius,
            support: 0.0,
        }
    }
}

/// Parameters for one circle search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleParams {
    pub min_radius: f32,
    pub max_radius: f32,
    /// Two accepted centres are never closer than this.
    pub min_distance: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Minimum fraction of angular sectors around the centre that must
    /// carry edge pixels at the circle's radius.
    pub vote_threshold: f32,
}

/// Circle detection over a grayscale image.
pub trait CircleFinder: Send + Sync {
    fn find_circles(&self, gray: &GrayImage, params: &CircleParams) -> Vec<Circle>;
}

/// Hough-style gradient voting with edge-support confirmation.
#[derive(Debug, Clone, Copy)]
pub struct HoughCircleFinder {
    /// Gaussian sigma applied before measuring gradient directions.
    /// Values `<= 0` skip the blur.
    pub blur_sigma: f32,
}

impl Default for HoughCircleFinder {
    fn default() -> Self {
        Self { blur_sigma: 1.5 }
    }
}

impl CircleFinder for HoughCircleFinder {
    fn find_circles(&self, gray: &GrayImage, params: &CircleParams) -> Vec<Circle> {
        let (w, h) = gray.dimensions();
        let min_r = params.min_radius.max(1.0).round() as i32;
        let max_r = params.max_radius.round() as i32;
        if w < 4 || h < 4 || max_r < min_r {
            return Vec::new();
        }

        // `canny` smooths internally; the extra blur only feeds gradient directions.
        let edges = canny(gray, params.canny_low, params.canny_high);
        let blurred = if self.blur_sigma > 0.0 {
            gaussian_blur_f32(gray, self.blur_sigma)
        } else {
            gray.clone()
        };
        let gx = horizontal_sobel(&blurred);
        let gy = vertical_sobel(&blurred);

        let stride = w as usize;
        let mut edge_points: Vec<(i32, i32)> = Vec::new();
        let mut accum = vec![0u32; stride * h as usize];

        for (x, y, pixel) in edges.enumerate_pixels() {
            if pixel.0[0] == 0 {
                continue;
            }
            edge_points.push((x as i32, y as i32));
            let dx = gx.get_pixel(x, y).0[0] as f32;
            let dy = gy.get_pixel(x, y).0[0] as f32;
            let mag = (dx * dx + dy * dy).sqrt();
            if mag < 1e-3 {
                continue;
            }
            let (ux, uy) = (dx / mag, dy / mag);
            for r in min_r..=max_r {
                for sign in [-1.0f32, 1.0] {
                    let cx = (x as f32 + sign * ux * r as f32).round() as i64;
                    let cy = (y as f32 + sign * uy * r as f32).round() as i64;
                    if cx >= 0 && cy >= 0 && cx < w as i64 && cy < h as i64 {
                        accum[cy as usize * stride + cx as usize] += 1;
                    }
                }
            }
        }
        if edge_points.is_empty() {
            return Vec::new();
        }

        // 3x3 box sum absorbs the rounding scatter of individual votes.
        let score_at = |x: i64, y: i64| -> u32 {
            let mut sum = 0;
            for ny in (y - 1).max(0)..=(y + 1).min(h as i64 - 1) {
                for nx in (x - 1).max(0)..=(x + 1).min(w as i64 - 1) {
                    sum += accum[ny as usize * stride + nx as usize];
                }
            }
            sum
        };

        let floor = (params.vote_threshold * PI * min_r as f32).max(5.0) as u32;
        let mut peaks: Vec<(u32, usize)> = Vec::new();
        for (idx, &votes) in accum.iter().enumerate() {
            if votes == 0 {
                continue;
            }
            let score = score_at((idx % stride) as i64, (idx / stride) as i64);
            if score >= floor {
                peaks.push((score, idx));
            }
        }
        peaks.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        debug!(
            edge_pixels = edge_points.len(),
            peaks = peaks.len(),
            floor,
            "Circle accumulator built"
        );

        let grid = EdgeGrid::new(&edge_points, w, h, max_r + 2);
        let mut rejected = vec![false; accum.len()];
        let mut circles: Vec<Circle> = Vec::new();
        let min_dist_sq = params.min_distance * params.min_distance;

        for (_, idx) in peaks {
            if rejected[idx] {
                continue;
            }
            let center = Point::new((idx % stride) as f32, (idx / stride) as f32);
            let crowded = circles.iter().any(|c| {
                let (ddx, ddy) = (c.center.x - center.x, c.center.y - center.y);
                ddx * ddx + ddy * ddy < min_dist_sq
            });
            if crowded {
                continue;
            }

            match grid.best_radius(center, min_r, max_r) {
                Some((radius, support)) if support >= params.vote_threshold => {
                    circles.push(Circle {
                        center,
                        radius,
                        support,
                    });
                }
                _ => {
                    let (cx, cy) = (idx % stride, idx / stride);
                    for ny in cy.saturating_sub(1)..=(cy + 1).min(h as usize - 1) {
                        for nx in cx.saturating_sub(1)..=(cx + 1).min(stride - 1) {
                            rejected[ny * stride + nx] = true;
                        }
                    }
                }
            }
        }

        debug!(circles = circles.len(), "Circle detection complete");
        circles
    }
}

/// Edge pixels bucketed into square cells for neighbourhood queries.
struct EdgeGrid {
    cell: i32,
    cols: i32,
    rows: i32,
    cells: Vec<Vec<(i32, i32)>>,
}

impl EdgeGrid {
    fn new(points: &[(i32, i32)], width: u32, height: u32, cell: i32) -> Self {
        let cell = cell.max(1);
        let cols = (width as i32 + cell - 1) / cell;
        let rows = (height as i32 + cell - 1) / cell;
        let mut cells = vec![Vec::new(); (cols * rows) as usize];
        for &(x, y) in points {
            cells[((y / cell) * cols + x / cell) as usize].push((x, y));
        }
        Self {
            cell,
            cols,
            rows,
            cells,
        }
    }

    /// Radius in `[min_r, max_r]` whose ring of edge pixels covers the most
    /// sectors around `center`, with its coverage. Ties go to the ring with
    /// more edge pixels. The radius is refined to the mean distance of the
    /// supporting pixels.
    fn best_radius(&self, center: Point, min_r: i32, max_r: i32) -> Option<(f32, f32)> {
        let bins = (max_r + 2) as usize;
        let mut sectors = vec![0u32; bins];
        let mut counts = vec![0u32; bins];
        let mut sums = vec![0.0f32; bins];

        let cx = center.x as i32 / self.cell;
        let cy = center.y as i32 / self.cell;
        for row in (cy - 1).max(0)..=(cy + 1).min(self.rows - 1) {
            for col in (cx - 1).max(0)..=(cx + 1).min(self.cols - 1) {
                for &(x, y) in &self.cells[(row * self.cols + col) as usize] {
                    let (dx, dy) = (x as f32 - center.x, y as f32 - center.y);
                    let d = (dx * dx + dy * dy).sqrt();
                    let bin = d.round() as usize;
                    if bin >= bins {
                        continue;
                    }
                    let turn = (dy.atan2(dx) + PI) / TAU;
                    let sector = ((turn * SECTORS as f32) as usize).min(SECTORS - 1);
                    sectors[bin] |= 1 << sector;
                    counts[bin] += 1;
                    sums[bin] += d;
                }
            }
        }

        let mut best: Option<(f32, u32, f32)> = None;
        for r in min_r..=max_r {
            let band = [(r - 1).max(0) as usize, r as usize, (r + 1) as usize];
            let covered = band.iter().fold(0u32, |mask, &b| mask | sectors[b]);
            let coverage = covered.count_ones() as f32 / SECTORS as f32;
            let count: u32 = band.iter().map(|&b| counts[b]).sum();
            if count == 0 {
                continue;
            }
            let better = best.is_none_or(|(c, n, _)| coverage > c || (coverage == c && count > n));
            if better {
                let mean = band.iter().map(|&b| sums[b]).sum::<f32>() / count as f32;
                best = Some((coverage, count, mean));
            }
        }
        best.map(|(coverage, _, radius)| (radius, coverage))
    }
}
