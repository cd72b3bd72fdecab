// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Markscan answer-sheet scanner.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// A pixel (or normalised `[0, 1]`) coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Shift by a constant offset.
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Width over height. Zero-height boxes report `f32::INFINITY`.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height <= 0.0 {
            f32::INFINITY
        } else {
            self.width / self.height
        }
    }
}

/// A small, near-square, high-contrast blob (corner marker or timing mark).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerCandidate {
    pub center: Point,
    pub area: f32,
    pub bounding_box: BoundingBox,
}

/// The four sheet corners resolved from marker candidates.
///
/// Any corner may be absent; `all_markers` always carries every candidate
/// centre so an overlay can draw them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectedCorners {
    pub top_left: Option<Point>,
    pub top_right: Option<Point>,
    pub bottom_left: Option<Point>,
    pub bottom_right: Option<Point>,
    pub all_markers: Vec<Point>,
}

impl DetectedCorners {
    /// Corners in TL, TR, BR, BL order, if all four are present.
    pub fn quad(&self) -> Option<[Point; 4]> {
        Some([
            self.top_left?,
            self.top_right?,
            self.bottom_right?,
            self.bottom_left?,
        ])
    }

    /// Map every coordinate through `f`.
    pub fn map(&self, f: impl Fn(Point) -> Point) -> Self {
        Self {
            top_left: self.top_left.map(&f),
            top_right: self.top_right.map(&f),
            bottom_left: self.bottom_left.map(&f),
            bottom_right: self.bottom_right.map(&f),
            all_markers: self.all_markers.iter().copied().map(&f).collect(),
        }
    }

    /// Coordinates divided by the frame size, for overlay rendering.
    pub fn normalized(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        self.map(|p| Point::new(p.x / w, p.y / h))
    }
}

/// Why a set of four corners was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerRejection {
    /// Fewer than four marker candidates were found.
    TooFewMarkers,
    /// One of the four extremal roles could not be assigned.
    MissingCorner,
    /// One marker satisfied two extremal roles.
    DuplicateMarker,
    /// The largest marker is more than the allowed multiple of the smallest.
    InconsistentMarkerSize,
    /// The quadrilateral covers too little of the frame.
    TooSmall,
    /// Opposite sides differ too much in length.
    NotRectangular,
}

/// A candidate answer bubble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BubbleCandidate {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Fraction of dark pixels inside 80% of the radius, in `[0, 1]`.
    pub darkness: f32,
    pub area: f32,
    pub circularity: f32,
}

impl BubbleCandidate {
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn diameter(&self) -> f32 {
        self.radius * 2.0
    }
}

/// The bubbles of one question, ordered left to right (option A first).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuestionGroup {
    pub bubbles: Vec<BubbleCandidate>,
}

impl QuestionGroup {
    pub fn new(mut bubbles: Vec<BubbleCandidate>) -> Self {
        bubbles.sort_by(|a, b| a.x.total_cmp(&b.x));
        Self { bubbles }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }
}

/// Letter for a zero-based option index (0 → "A").
pub fn option_letter(index: usize) -> String {
    char::from_u32('A' as u32 + index as u32)
        .map(String::from)
        .unwrap_or_else(|| "?".to_string())
}

/// Kind of per-question anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    /// The question's bubbles were not found on the sheet.
    Missing,
    /// No bubble is dark enough to count as marked.
    NoMark,
    /// Answer recorded, but the mark is light.
    Faint,
    /// Answer recorded from a mark that looks partially erased.
    Erased,
    /// Two bubbles are both marked; no answer recorded.
    DoubleMark,
}

/// A per-question anomaly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanIssue {
    /// One-based question number.
    pub question_number: u32,
    pub message: String,
    pub kind: IssueKind,
}

/// Which grouping strategy produced the question groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategy {
    TimingMarks,
    RowClustering,
}

/// Payload of a successful scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// One letter or `""` per question, in question order.
    pub answers: Vec<String>,
    pub confidence: f32,
    pub issues: Vec<ScanIssue>,
    pub bubbles_detected: usize,
    pub grouping_strategy: GroupingStrategy,
    pub perspective_corrected: bool,
    /// PNG of the perspective-corrected sheet, when requested.
    #[serde(skip)]
    pub corrected_image: Option<Vec<u8>>,
    #[serde(skip, default = "default_review_threshold")]
    review_threshold: f32,
}

fn default_review_threshold() -> f32 {
    crate::config::DEFAULT_REVIEW_THRESHOLD
}

impl ScanReport {
    pub fn new(
        answers: Vec<String>,
        confidence: f32,
        issues: Vec<ScanIssue>,
        grouping_strategy: GroupingStrategy,
    ) -> Self {
        Self {
            answers,
            confidence,
            issues,
            bubbles_detected: 0,
            grouping_strategy,
            perspective_corrected: false,
            corrected_image: None,
            review_threshold: default_review_threshold(),
        }
    }

    pub fn with_review_threshold(mut self, threshold: f32) -> Self {
        self.review_threshold = threshold;
        self
    }

    /// Whether a person should check the flagged questions by hand.
    pub fn needs_review(&self) -> bool {
        self.confidence < self.review_threshold
    }

    /// Issues of one kind.
    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &ScanIssue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }
}

/// The sole externally visible output of a full scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanResult {
    Success(ScanReport),
    Error { message: String },
}

impl ScanResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            Self::Success(report) => Some(report),
            Self::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Error { message } => Some(message),
        }
    }
}

impl From<ScanError> for ScanResult {
    fn from(err: ScanError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }
}

/// Physical arrangement of questions on a supported sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateLayout {
    pub columns: u32,
    pub questions_per_column: u32,
}

impl TemplateLayout {
    /// Layout for a supported question count (20, 50 or 100).
    pub fn for_question_count(total_questions: u32) -> Result<Self> {
        let (columns, questions_per_column) = match total_questions {
            20 => (2, 10),
            50 => (3, 17),
            100 => (4, 25),
            other => return Err(ScanError::UnsupportedQuestionCount(other)),
        };
        Ok(Self {
            columns,
            questions_per_column,
        })
    }
}

/// Parameters supplied by the caller for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanParams {
    pub total_questions: u32,
    pub options_per_question: u32,
}

impl ScanParams {
    pub const DEFAULT_OPTIONS: u32 = 5;

    /// Validated parameters.
    pub fn new(total_questions: u32, options_per_question: u32) -> Result<Self> {
        TemplateLayout::for_question_count(total_questions)?;
        if !(2..=26).contains(&options_per_question) {
            return Err(ScanError::InvalidOptionCount(options_per_question));
        }
        Ok(Self {
            total_questions,
            options_per_question,
        })
    }

    /// Parameters with the default five options per question.
    pub fn with_default_options(total_questions: u32) -> Result<Self> {
        Self::new(total_questions, Self::DEFAULT_OPTIONS)
    }

    pub fn layout(&self) -> Result<TemplateLayout> {
        TemplateLayout::for_question_count(self.total_questions)
    }

    pub fn expected_bubbles(&self) -> u32 {
        self.total_questions * self.options_per_question
    }
}
