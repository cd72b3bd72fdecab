// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner configuration. Every tunable threshold of the pipeline lives here so
// a deployment can recalibrate without a rebuild.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// Confidence below which a result should be reviewed by hand.
pub const DEFAULT_REVIEW_THRESHOLD: f32 = 0.85;

/// Filter applied to contours when searching for square markers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerFilter {
    /// Minimum contour area as a fraction of the image area.
    pub min_area_ratio: f32,
    /// Maximum contour area as a fraction of the image area.
    pub max_area_ratio: f32,
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Minimum contour area over bounding-box area.
    pub min_solidity: f32,
}

impl MarkerFilter {
    /// Corner markers on a captured frame.
    pub const CORNERS: Self = Self {
        min_area_ratio: 0.0003,
        max_area_ratio: 0.02,
        min_aspect: 0.5,
        max_aspect: 2.0,
        min_solidity: 0.5,
    };

    /// Corner markers on a live preview frame; looser so the overlay reacts early.
    pub const PREVIEW_CORNERS: Self = Self {
        min_area_ratio: 0.0003,
        max_area_ratio: 0.02,
        min_aspect: 0.5,
        max_aspect: 2.0,
        min_solidity: 0.4,
    };

    /// Row timing marks on the corrected sheet; stricter to keep bubbles out.
    pub const TIMING_MARKS: Self = Self {
        min_area_ratio: 0.00003,
        max_area_ratio: 0.0015,
        min_aspect: 0.5,
        max_aspect: 2.0,
        min_solidity: 0.9,
    };

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.min_area_ratio >= 0.0 && self.min_area_ratio < self.max_area_ratio) {
            return Err(ScanError::Config(format!("{name}: area ratio band is empty")));
        }
        if !(self.min_aspect > 0.0 && self.min_aspect <= self.max_aspect) {
            return Err(ScanError::Config(format!("{name}: aspect band is empty")));
        }
        if !(0.0..=1.0).contains(&self.min_solidity) {
            return Err(ScanError::Config(format!("{name}: solidity must be in [0, 1]")));
        }
        Ok(())
    }
}

/// Tolerances separating a real sheet from four random blobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerValidation {
    /// Largest marker area over smallest.
    pub max_marker_area_ratio: f32,
    /// Minimum average side length as a fraction of the frame dimension.
    pub min_extent_ratio: f32,
    /// Minimum shorter-over-longer ratio for opposite sides.
    pub min_parallelism: f32,
}

impl Default for CornerValidation {
    fn default() -> Self {
        Self {
            max_marker_area_ratio: 10.0,
            min_extent_ratio: 0.10,
            min_parallelism: 0.6,
        }
    }
}

/// Brightness-adaptive thresholding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Mean brightness at or above which the frame counts as well lit.
    pub brightness_split: f32,
    pub bright_block_size: u32,
    pub dark_block_size: u32,
    pub bright_constant: f32,
    pub dark_constant: f32,
    pub blur_sigma: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            brightness_split: 100.0,
            bright_block_size: 11,
            dark_block_size: 21,
            bright_constant: 2.0,
            dark_constant: 5.0,
            blur_sigma: 1.0,
        }
    }
}

/// Printed template proportions, relative to the corrected sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemplateGeometry {
    /// Band at the top holding the title and student fields.
    pub header_ratio: f32,
    pub footer_ratio: f32,
    /// Left and right margins holding corner markers.
    pub side_margin_ratio: f32,
    /// Square regions at each corner reserved for the corner markers.
    pub corner_margin_ratio: f32,
}

impl Default for TemplateGeometry {
    fn default() -> Self {
        Self {
            header_ratio: 0.12,
            footer_ratio: 0.05,
            side_margin_ratio: 0.04,
            corner_margin_ratio: 0.08,
        }
    }
}

/// Bubble detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BubbleConfig {
    /// Expected radius as a fraction of the horizontal option pitch.
    pub radius_pitch_ratio: f32,
    pub min_radius_factor: f32,
    pub max_radius_factor: f32,
    /// Minimum fraction of a circle's circumference, measured in angular
    /// sectors around its centre, that must carry edge pixels.
    pub circle_vote_threshold: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Pixels darker than this count toward a bubble's darkness.
    pub dark_pixel_threshold: u8,
    /// Fraction of the radius sampled for darkness.
    pub inner_sample_ratio: f32,
    pub contour_min_area: f32,
    pub contour_max_area: f32,
    pub min_circularity: f32,
    /// Fraction of the expected bubble count below which the contour fallback runs.
    pub fallback_floor_ratio: f32,
    /// Suppression distance as a fraction of the expected diameter.
    pub suppression_factor: f32,
    /// Also hold contour fallback candidates to the circle radius band and
    /// the bubble region.
    #[serde(default)]
    pub fallback_radius_band: bool,
}

impl Default for BubbleConfig {
    fn default() -> Self {
        Self {
            radius_pitch_ratio: 0.3,
            min_radius_factor: 0.6,
            max_radius_factor: 1.5,
            circle_vote_threshold: 0.75,
            canny_low: 30.0,
            canny_high: 90.0,
            dark_pixel_threshold: 128,
            inner_sample_ratio: 0.8,
            contour_min_area: 60.0,
            contour_max_area: 4000.0,
            min_circularity: 0.30,
            fallback_floor_ratio: 0.5,
            suppression_factor: 0.75,
            fallback_radius_band: false,
        }
    }
}

/// Question grouping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Row break when the y-gap exceeds this many average diameters.
    pub row_gap_factor: f32,
    /// Bubbles within this many average diameters of a timing mark's y share its row.
    pub timing_row_tolerance: f32,
    /// Fraction of expected rows (and questions) the timing strategy must reach.
    pub timing_acceptance_ratio: f32,
    /// Per column count: timing marks must lie in this leading fraction of their column.
    pub timing_column_fractions: BTreeMap<u32, f32>,
}

impl GroupingConfig {
    /// Column fraction for a layout, falling back to the two-column value.
    pub fn timing_column_fraction(&self, columns: u32) -> f32 {
        self.timing_column_fractions
            .get(&columns)
            .or_else(|| self.timing_column_fractions.get(&2))
            .copied()
            .unwrap_or(0.35)
    }
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            row_gap_factor: 0.6,
            timing_row_tolerance: 0.8,
            timing_acceptance_ratio: 0.7,
            // Only the two-column value is calibrated against printed sheets.
            timing_column_fractions: BTreeMap::from([(2, 0.35), (3, 0.30), (4, 0.25)]),
        }
    }
}

/// Darkness thresholds used to classify a question's marks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnswerThresholds {
    /// Two bubbles at or above this are a double mark.
    pub double_mark: f32,
    pub filled: f32,
    /// Filled marks below this are flagged as faint.
    pub faint: f32,
    pub erased: f32,
}

impl Default for AnswerThresholds {
    fn default() -> Self {
        Self {
            double_mark: 0.25,
            filled: 0.30,
            faint: 0.40,
            erased: 0.15,
        }
    }
}

/// Confidence deductions per issue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidencePenalties {
    /// Per missing question or double mark.
    pub severe: f32,
    /// Per faint or erased mark.
    pub minor: f32,
}

impl Default for ConfidencePenalties {
    fn default() -> Self {
        Self {
            severe: 0.05,
            minor: 0.02,
        }
    }
}

/// Complete scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub corner_markers: MarkerFilter,
    pub preview_markers: MarkerFilter,
    pub timing_marks: MarkerFilter,
    pub corners: CornerValidation,
    pub preprocess: PreprocessConfig,
    pub template: TemplateGeometry,
    pub bubbles: BubbleConfig,
    pub grouping: GroupingConfig,
    pub answers: AnswerThresholds,
    pub penalties: ConfidencePenalties,
    pub review_threshold: f32,
    /// Attach a PNG of the corrected sheet to successful results.
    pub attach_corrected_image: bool,
    /// Preview frames wider than this are downscaled before analysis.
    pub preview_max_width: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            corner_markers: MarkerFilter::CORNERS,
            preview_markers: MarkerFilter::PREVIEW_CORNERS,
            timing_marks: MarkerFilter::TIMING_MARKS,
            corners: CornerValidation::default(),
            preprocess: PreprocessConfig::default(),
            template: TemplateGeometry::default(),
            bubbles: BubbleConfig::default(),
            grouping: GroupingConfig::default(),
            answers: AnswerThresholds::default(),
            penalties: ConfidencePenalties::default(),
            review_threshold: DEFAULT_REVIEW_THRESHOLD,
            attach_corrected_image: false,
            preview_max_width: 640,
        }
    }
}

impl ScanConfig {
    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load overrides from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<()> {
        self.corner_markers.validate("corner_markers")?;
        self.preview_markers.validate("preview_markers")?;
        self.timing_marks.validate("timing_marks")?;

        let c = &self.corners;
        if !(c.max_marker_area_ratio >= 1.0) {
            return Err(ScanError::Config("max_marker_area_ratio must be >= 1".into()));
        }
        if !(c.min_extent_ratio > 0.0 && c.min_extent_ratio < 1.0) {
            return Err(ScanError::Config("min_extent_ratio must be in (0, 1)".into()));
        }
        if !(c.min_parallelism > 0.0 && c.min_parallelism <= 1.0) {
            return Err(ScanError::Config("min_parallelism must be in (0, 1]".into()));
        }

        let pre = &self.preprocess;
        if !(pre.blur_sigma >= 0.0) {
            return Err(ScanError::Config("preprocess blur_sigma must be >= 0".into()));
        }
        for block in [pre.bright_block_size, pre.dark_block_size] {
            if block < 3 || block % 2 == 0 {
                return Err(ScanError::Config(format!(
                    "threshold block size must be odd and >= 3, got {block}"
                )));
            }
        }

        let b = &self.bubbles;
        if !(b.min_radius_factor > 0.0 && b.min_radius_factor < b.max_radius_factor) {
            return Err(ScanError::Config("bubble radius band is empty".into()));
        }
        if !(b.contour_min_area < b.contour_max_area) {
            return Err(ScanError::Config("contour area band is empty".into()));
        }
        if !(0.0..=1.0).contains(&b.inner_sample_ratio) || b.inner_sample_ratio == 0.0 {
            return Err(ScanError::Config("inner_sample_ratio must be in (0, 1]".into()));
        }
        if !(b.circle_vote_threshold > 0.0 && b.circle_vote_threshold <= 1.0) {
            return Err(ScanError::Config("circle_vote_threshold must be in (0, 1]".into()));
        }

        let a = &self.answers;
        if !(a.erased <= a.filled && a.filled <= a.faint) {
            return Err(ScanError::Config(
                "answer thresholds must satisfy erased <= filled <= faint".into(),
            ));
        }

        let g = &self.grouping;
        if !(g.row_gap_factor > 0.0) {
            return Err(ScanError::Config("row_gap_factor must be > 0".into()));
        }
        if !(g.timing_row_tolerance > 0.0) {
            return Err(ScanError::Config("timing_row_tolerance must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&g.timing_acceptance_ratio) {
            return Err(ScanError::Config(
                "timing_acceptance_ratio must be in [0, 1]".into(),
            ));
        }
        if self.preview_max_width < 64 {
            return Err(ScanError::Config("preview_max_width must be >= 64".into()));
        }
        Ok(())
    }
}
