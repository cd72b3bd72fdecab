// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour extraction and shape measurements.

use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::arc_length;
use imageproc::point::Point as PixelPoint;
use markscan_core::{BoundingBox, Point};

use super::circles::Circle;

/// Which borders a contour search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Outer borders of top-level components only.
    External,
    /// Outer borders at every nesting level (components inside holes too).
    AllOuter,
}

/// A closed boundary traced around a connected foreground component.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<PixelPoint<i32>>,
}

impl Contour {
    pub fn new(points: Vec<PixelPoint<i32>>) -> Self {
        Self { points }
    }

    /// Enclosed polygon area (shoelace). Degenerate contours report 0.
    pub fn area(&self) -> f32 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice_area = 0.0f64;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice_area += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
        }
        (twice_area.abs() / 2.0) as f32
    }

    /// Closed perimeter length.
    pub fn perimeter(&self) -> f32 {
        if self.points.len() < 2 {
            return 0.0;
        }
        arc_length(&self.points, true) as f32
    }

    /// `4π·area / perimeter²`: 1 for a circle, lower for anything else.
    pub fn circularity(&self) -> f32 {
        let perimeter = self.perimeter();
        if perimeter <= 0.0 {
            return 0.0;
        }
        (4.0 * std::f32::consts::PI * self.area() / (perimeter * perimeter)).min(1.0)
    }

    /// Extent of the boundary points.
    pub fn bounding_box(&self) -> BoundingBox {
        let Some(first) = self.points.first() else {
            return BoundingBox::default();
        };
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for p in &self.points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        BoundingBox {
            x: min_x as f32,
            y: min_y as f32,
            width: (max_x - min_x) as f32,
            height: (max_y - min_y) as f32,
        }
    }

    /// Smallest circle containing every boundary point.
    pub fn min_enclosing_circle(&self) -> Circle {
        let points: Vec<Point> = self
            .points
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect();
        min_enclosing_circle(&points)
    }
}

/// Boundary tracing over a binary image (foreground = non-zero).
pub trait ContourFinder: Send + Sync {
    fn find_contours(&self, binary: &GrayImage, mode: RetrievalMode) -> Vec<Contour>;
}

/// Suzuki–Abe border following as implemented by `imageproc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageprocContours;

impl ContourFinder for ImageprocContours {
    fn find_contours(&self, binary: &GrayImage, mode: RetrievalMode) -> Vec<Contour> {
        find_contours::<i32>(binary)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .filter(|c| match mode {
                RetrievalMode::External => c.parent.is_none(),
                RetrievalMode::AllOuter => true,
            })
            .map(|c| Contour::new(c.points))
            .collect()
    }
}

// -- Minimal enclosing circle -------------------------------------------------

const EPS: f32 = 1e-3;

fn contains(circle: &Circle, p: Point) -> bool {
    circle.center.distance(&p) <= circle.radius + EPS
}

fn circle_from_two(a: Point, b: Point) -> Circle {
    let center = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
    Circle::new(center, a.distance(&b) / 2.0)
}

fn circle_from_three(a: Point, b: Point, c: Point) -> Circle {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-6 {
        // Collinear: the widest pair spans the other point.
        let candidates = [circle_from_two(a, b), circle_from_two(a, c), circle_from_two(b, c)];
        return candidates
            .into_iter()
            .max_by(|x, y| x.radius.total_cmp(&y.radius))
            .unwrap_or_else(|| circle_from_two(a, b));
    }
    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    let center = Point::new(ux, uy);
    Circle::new(center, center.distance(&a))
}

/// Incremental Welzl construction.
///
/// Traced boundaries arrive in order, which is the worst case for the
/// incremental algorithm, so points are visited with a fixed coprime stride.
pub fn min_enclosing_circle(points: &[Point]) -> Circle {
    let n = points.len();
    if n == 0 {
        return Circle::new(Point::default(), 0.0);
    }
    let stride = (1..n).rev().find(|s| gcd(*s, n) == 1 && *s <= n / 2 + 1).unwrap_or(1);
    let order: Vec<Point> = (0..n).map(|i| points[(i * stride) % n]).collect();

    let mut circle = Circle::new(order[0], 0.0);
    for i in 1..n {
        if contains(&circle, order[i]) {
            continue;
        }
        circle = Circle::new(order[i], 0.0);
        for j in 0..i {
            if contains(&circle, order[j]) {
                continue;
            }
            circle = circle_from_two(order[i], order[j]);
            for k in 0..j {
                if !contains(&circle, order[k]) {
                    circle = circle_from_three(order[i], order[j], order[k]);
                }
            }
        }
    }
    circle
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
