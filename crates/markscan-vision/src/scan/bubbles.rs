// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bubble detection — circle voting inside the template's answer region, a
// contour fallback for sheets where voting finds too little, and proximity
// suppression so each printed bubble is reported once.

use image::GrayImage;
use markscan_core::config::{BubbleConfig, TemplateGeometry};
use markscan_core::{BubbleCandidate, Point, ScanParams, TemplateLayout};
use tracing::{debug, info, instrument};

use crate::image::sheet::SheetImage;
use crate::primitives::circles::{CircleFinder, CircleParams};
use crate::primitives::contours::{ContourFinder, RetrievalMode};

/// Part of the corrected sheet that holds answer bubbles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerRegion {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl AnswerRegion {
    /// Strip the header, footer and side margins from a `width`x`height` sheet.
    pub fn from_template(template: &TemplateGeometry, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            left: w * template.side_margin_ratio,
            top: h * template.header_ratio,
            right: w * (1.0 - template.side_margin_ratio),
            bottom: h * (1.0 - template.footer_ratio),
        }
    }

    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }
}

/// Expected bubble size for one layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleGeometry {
    pub expected_radius: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Two bubbles closer than this are the same bubble.
    pub min_distance: f32,
}

impl BubbleGeometry {
    /// Radius from the horizontal option pitch: each column holds
    /// `options + 1` slots (one for the question number / timing mark).
    pub fn estimate(
        config: &BubbleConfig,
        region: &AnswerRegion,
        layout: TemplateLayout,
        options: u32,
    ) -> Self {
        let pitch = region.width() / layout.columns.max(1) as f32 / (options + 1) as f32;
        let expected_radius = pitch * config.radius_pitch_ratio;
        Self {
            expected_radius,
            min_radius: expected_radius * config.min_radius_factor,
            max_radius: expected_radius * config.max_radius_factor,
            min_distance: expected_radius * 2.0 * config.suppression_factor,
        }
    }
}

/// Which path produced the bubbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionPath {
    Circles,
    Contours,
}

/// Bubbles found on one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleDetection {
    pub bubbles: Vec<BubbleCandidate>,
    pub path: DetectionPath,
    pub geometry: BubbleGeometry,
}

/// Locates answer bubbles on a (corrected) sheet.
pub struct BubbleDetector<'a> {
    config: &'a BubbleConfig,
    template: &'a TemplateGeometry,
    circles: &'a dyn CircleFinder,
    contours: &'a dyn ContourFinder,
}

impl<'a> BubbleDetector<'a> {
    pub fn new(
        config: &'a BubbleConfig,
        template: &'a TemplateGeometry,
        circles: &'a dyn CircleFinder,
        contours: &'a dyn ContourFinder,
    ) -> Self {
        Self {
            config,
            template,
            circles,
            contours,
        }
    }

    /// Detect bubbles on `sheet`, using `binary` (its thresholded form) for
    /// the contour fallback.
    ///
    /// An empty result is valid here; the caller decides whether it is fatal.
    #[instrument(skip_all, fields(
        width = sheet.width(),
        height = sheet.height(),
        questions = params.total_questions,
    ))]
    pub fn detect(
        &self,
        sheet: &SheetImage,
        binary: &GrayImage,
        params: &ScanParams,
        layout: TemplateLayout,
    ) -> BubbleDetection {
        let region = AnswerRegion::from_template(self.template, sheet.width(), sheet.height());
        let geometry =
            BubbleGeometry::estimate(self.config, &region, layout, params.options_per_question);
        debug!(
            expected_radius = geometry.expected_radius,
            min_distance = geometry.min_distance,
            "Bubble geometry estimated"
        );

        let mut path = DetectionPath::Circles;
        let mut candidates = self.from_circles(sheet, &region, &geometry);

        let floor = (params.expected_bubbles() as f32 * self.config.fallback_floor_ratio) as usize;
        if candidates.len() < floor {
            info!(
                circles = candidates.len(),
                floor, "Too few circles; falling back to contour detection"
            );
            path = DetectionPath::Contours;
            candidates = self.from_contours(sheet, binary, &region, &geometry);
        }

        let bubbles = suppress_overlaps(candidates, geometry.min_distance);
        info!(bubbles = bubbles.len(), ?path, "Bubble detection complete");
        BubbleDetection {
            bubbles,
            path,
            geometry,
        }
    }

    fn from_circles(
        &self,
        sheet: &SheetImage,
        region: &AnswerRegion,
        geometry: &BubbleGeometry,
    ) -> Vec<BubbleCandidate> {
        let params = CircleParams {
            min_radius: geometry.min_radius,
            max_radius: geometry.max_radius,
            min_distance: geometry.min_distance,
            canny_low: self.config.canny_low,
            canny_high: self.config.canny_high,
            vote_threshold: self.config.circle_vote_threshold,
        };
        self.circles
            .find_circles(sheet.as_luma(), &params)
            .into_iter()
            .filter(|c| region.contains(c.center))
            .map(|c| BubbleCandidate {
                x: c.center.x,
                y: c.center.y,
                radius: c.radius,
                darkness: self.darkness(sheet, c.center, c.radius),
                area: std::f32::consts::PI * c.radius * c.radius,
                circularity: 1.0,
            })
            .collect()
    }

    fn from_contours(
        &self,
        sheet: &SheetImage,
        binary: &GrayImage,
        region: &AnswerRegion,
        geometry: &BubbleGeometry,
    ) -> Vec<BubbleCandidate> {
        self.contours
            .find_contours(binary, RetrievalMode::AllOuter)
            .iter()
            .filter_map(|contour| {
                let area = contour.area();
                if area < self.config.contour_min_area || area > self.config.contour_max_area {
                    return None;
                }
                let circularity = contour.circularity();
                if circularity < self.config.min_circularity {
                    return None;
                }
                let circle = contour.min_enclosing_circle();
                if !region.contains(circle.center) {
                    return None;
                }
                let in_band = (geometry.min_radius..=geometry.max_radius).contains(&circle.radius);
                if self.config.fallback_radius_band && !in_band {
                    return None;
                }
                Some(BubbleCandidate {
                    x: circle.center.x,
                    y: circle.center.y,
                    radius: circle.radius,
                    darkness: self.darkness(sheet, circle.center, circle.radius),
                    area,
                    circularity,
                })
            })
            .collect()
    }

    fn darkness(&self, sheet: &SheetImage, center: Point, radius: f32) -> f32 {
        sheet.darkness_ratio(
            center.x,
            center.y,
            radius,
            self.config.inner_sample_ratio,
            self.config.dark_pixel_threshold,
        )
    }
}

/// Greedy non-maximum suppression: larger candidates win, and anything
/// centred within `min_distance` of a kept candidate is dropped.
pub fn suppress_overlaps(
    mut candidates: Vec<BubbleCandidate>,
    min_distance: f32,
) -> Vec<BubbleCandidate> {
    candidates.sort_by(|a, b| {
        b.area
            .total_cmp(&a.area)
            .then(a.y.total_cmp(&b.y))
            .then(a.x.total_cmp(&b.x))
    });

    let min_dist_sq = min_distance * min_distance;
    let mut kept: Vec<BubbleCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            let (dx, dy) = (k.x - candidate.x, k.y - candidate.y);
            dx * dx + dy * dy < min_dist_sq
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
