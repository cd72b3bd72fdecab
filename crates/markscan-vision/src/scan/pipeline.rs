// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Full-scan orchestration.
//
// 1. Binarize the captured frame and look for corner markers.
// 2. Resolve and validate the four corners; warp the sheet upright.
//    A geometry failure is logged and the uncorrected frame is used.
// 3. Binarize the corrected sheet and detect bubbles.
// 4. Group bubbles into questions, read the answers, score confidence.

use image::GrayImage;
use markscan_core::error::{Result, ScanError};
use markscan_core::{BubbleCandidate, ScanConfig, ScanParams, ScanReport, ScanResult};
use tracing::{info, instrument, warn};

use crate::image::sheet::SheetImage;
use crate::primitives::circles::{CircleFinder, HoughCircleFinder};
use crate::primitives::contours::{ContourFinder, ImageprocContours};
use crate::scan::answers::AnswerExtractor;
use crate::scan::bubbles::BubbleDetector;
use crate::scan::confidence::ConfidenceScorer;
use crate::scan::corners::CornerResolver;
use crate::scan::grouping::QuestionGrouper;
use crate::scan::markers::MarkerDetector;
use crate::scan::perspective::PerspectiveCorrector;
use crate::scan::preprocess::AdaptivePreprocessor;

/// Runs the full answer-sheet pipeline.
///
/// Holds no per-scan state: one `Scanner` can serve any number of scans,
/// from any number of threads.
pub struct Scanner {
    config: ScanConfig,
    contours: Box<dyn ContourFinder>,
    circles: Box<dyn CircleFinder>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

impl Scanner {
    /// Scanner backed by the built-in contour and circle finders.
    pub fn new(config: ScanConfig) -> Self {
        Self::with_finders(
            config,
            Box::new(ImageprocContours),
            Box::new(HoughCircleFinder::default()),
        )
    }

    /// Scanner using caller-supplied vision primitives.
    pub fn with_finders(
        config: ScanConfig,
        contours: Box<dyn ContourFinder>,
        circles: Box<dyn CircleFinder>,
    ) -> Self {
        Self {
            config,
            contours,
            circles,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan a frame. Every failure becomes [`ScanResult::Error`].
    pub fn scan(
        &self,
        sheet: &SheetImage,
        total_questions: u32,
        options_per_question: u32,
    ) -> ScanResult {
        let outcome = ScanParams::new(total_questions, options_per_question)
            .and_then(|params| self.try_scan(sheet, &params));
        match outcome {
            Ok(report) => ScanResult::Success(report),
            Err(err) => {
                warn!(error = %err, "Scan failed");
                ScanResult::from(err)
            }
        }
    }

    /// Decode encoded image bytes and scan them.
    pub fn scan_bytes(
        &self,
        data: &[u8],
        total_questions: u32,
        options_per_question: u32,
    ) -> ScanResult {
        match SheetImage::from_bytes(data) {
            Ok(sheet) => self.scan(&sheet, total_questions, options_per_question),
            Err(err) => ScanResult::from(err),
        }
    }

    /// Scan a frame, returning the typed error on failure.
    #[instrument(skip_all, fields(
        width = sheet.width(),
        height = sheet.height(),
        questions = params.total_questions,
        options = params.options_per_question,
    ))]
    pub fn try_scan(&self, sheet: &SheetImage, params: &ScanParams) -> Result<ScanReport> {
        let layout = params.layout()?;
        let preprocessor = AdaptivePreprocessor::new(self.config.preprocess);

        // Geometry
        let binary = preprocessor.preprocess(sheet.as_luma());
        let markers = MarkerDetector::new(self.contours.as_ref())
            .find_markers(&binary, &self.config.corner_markers);
        let resolution = CornerResolver::new(self.config.corners).resolve(
            &markers,
            sheet.width(),
            sheet.height(),
        );
        let quad = match &resolution {
            Some(res) if res.is_valid() => res.corners.quad(),
            Some(res) => {
                warn!(rejection = ?res.rejection, "Corner markers rejected");
                None
            }
            None => {
                warn!(markers = markers.len(), "Too few corner markers");
                None
            }
        };
        let corrected = PerspectiveCorrector.correct(sheet.as_luma(), quad);
        let corrected_sheet = SheetImage::from_luma(corrected.image)?;

        // Bubbles
        let corrected_binary = preprocessor.preprocess(corrected_sheet.as_luma());
        let detection = BubbleDetector::new(
            &self.config.bubbles,
            &self.config.template,
            self.circles.as_ref(),
            self.contours.as_ref(),
        )
        .detect(&corrected_sheet, &corrected_binary, params, layout);
        if detection.bubbles.is_empty() {
            return Err(ScanError::NoBubblesDetected);
        }

        let mut report = self.grade(&detection.bubbles, params, Some(&corrected_binary))?;
        report.perspective_corrected = corrected.applied;
        if self.config.attach_corrected_image {
            report.corrected_image = Some(corrected_sheet.to_png_bytes()?);
        }

        info!(
            confidence = report.confidence,
            issues = report.issues.len(),
            bubbles = report.bubbles_detected,
            strategy = ?report.grouping_strategy,
            "Scan complete"
        );
        Ok(report)
    }

    /// Group already-detected bubbles and grade them.
    ///
    /// `binary` is the thresholded corrected sheet used for timing-mark
    /// search; pass `None` to rely on row clustering alone.
    pub fn grade(
        &self,
        bubbles: &[BubbleCandidate],
        params: &ScanParams,
        binary: Option<&GrayImage>,
    ) -> Result<ScanReport> {
        if bubbles.is_empty() {
            return Err(ScanError::NoBubblesDetected);
        }
        let layout = params.layout()?;

        let grouping = QuestionGrouper::new(
            &self.config.grouping,
            &self.config.template,
            &self.config.timing_marks,
            self.contours.as_ref(),
        )
        .group(bubbles, params, layout, binary);

        let extraction = AnswerExtractor::new(self.config.answers).extract(&grouping.groups);
        let confidence = ConfidenceScorer::new(self.config.penalties).score(
            &extraction.answers,
            &extraction.issues,
            params.total_questions,
        );

        let mut report = ScanReport::new(
            extraction.answers,
            confidence,
            extraction.issues,
            grouping.strategy,
        )
        .with_review_threshold(self.config.review_threshold);
        report.bubbles_detected = bubbles.len();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use markscan_core::{GroupingStrategy, IssueKind, option_letter};

    fn grid(darkness: impl Fn(usize, usize) -> f32) -> Vec<BubbleCandidate> {
        let mut out = Vec::new();
        for q in 0..20 {
            let (column, row) = (q / 10, q % 10);
            for i in 0..5 {
                out.push(BubbleCandidate {
                    x: 120.0 + column as f32 * 400.0 + i as f32 * 55.0,
                    y: 200.0 + row as f32 * 80.0,
                    radius: 15.0,
                    darkness: darkness(q, i),
                    area: 700.0,
                    circularity: 0.9,
                });
            }
        }
        out
    }

    fn params() -> ScanParams {
        ScanParams::with_default_options(20).unwrap()
    }

    #[test]
    fn clean_grid_grades_with_full_confidence() {
        let bubbles = grid(|q, i| if i == q % 5 { 0.9 } else { 0.05 });
        let report = Scanner::default().grade(&bubbles, &params(), None).unwrap();
        assert_eq!(report.answers.len(), 20);
        assert!(report.issues.is_empty());
        assert_eq!(report.confidence, 1.0);
        assert!(!report.needs_review());
        for (q, answer) in report.answers.iter().enumerate() {
            assert_eq!(answer, &option_letter(q % 5));
        }
        assert_eq!(report.grouping_strategy, GroupingStrategy::RowClustering);
        assert_eq!(report.bubbles_detected, 100);
    }

    #[test]
    fn one_double_mark_costs_one_answer_and_a_penalty() {
        let bubbles = grid(|q, i| match (q, i) {
            (4, 1) => 0.4,
            (4, 3) => 0.35,
            (4, _) => 0.1,
            (_, i) if i == 0 => 0.9,
            _ => 0.05,
        });
        let report = Scanner::default().grade(&bubbles, &params(), None).unwrap();
        assert_eq!(report.answers[4], "");
        let doubles: Vec<_> = report.issues_of(IssueKind::DoubleMark).collect();
        assert_eq!(doubles.len(), 1);
        assert_eq!(doubles[0].question_number, 5);
        assert_eq!(doubles[0].message, "Multiple answers marked: B and D");
        assert!((report.confidence - 0.90).abs() < 1e-6);
        assert!(!report.needs_review());
    }

    #[test]
    fn unsupported_question_count_is_an_error_result() {
        let result = Scanner::default().scan(&testing::blank_frame(), 30, 5);
        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("unsupported question count"));
    }

    #[test]
    fn blank_frame_reports_no_bubbles() {
        let result = Scanner::default().scan(&testing::blank_frame(), 20, 5);
        let message = result.error_message().expect("error result");
        assert!(message.starts_with("No bubbles detected"), "message: {message}");
    }

    #[test]
    fn undecodable_bytes_are_an_error_result() {
        let result = Scanner::default().scan_bytes(b"\x89PNG broken", 20, 5);
        assert!(!result.is_success());
    }

    #[test]
    fn photographed_sheet_is_read_correctly() {
        let expected = testing::answer_pattern(20, 5);
        let photo = testing::photographed_sheet(&expected, 5);
        let result = Scanner::default().scan(&photo, 20, 5);
        let report = result.report().unwrap_or_else(|| panic!("scan failed: {result:?}"));

        assert!(report.perspective_corrected);
        assert_eq!(report.answers.len(), 20);
        let letters: Vec<String> = expected.iter().map(|&i| option_letter(i)).collect();
        assert_eq!(report.answers, letters);
        assert_eq!(report.confidence, 1.0);
    }

    #[test]
    fn photographed_dense_sheets_are_read_correctly() {
        for total in [50, 100] {
            let expected = testing::answer_pattern(total, 5);
            let photo = testing::photographed_sheet(&expected, 5);
            let result = Scanner::default().scan(&photo, total, 5);
            let report = result
                .report()
                .unwrap_or_else(|| panic!("{total} questions: scan failed: {result:?}"));

            assert_eq!(report.answers.len(), total as usize);
            let letters: Vec<String> = expected.iter().map(|&i| option_letter(i)).collect();
            assert_eq!(report.answers, letters, "{total} questions");
            assert!(report.issues.is_empty(), "{total} questions: {:?}", report.issues);
            assert_eq!(report.confidence, 1.0);
            assert_eq!(report.grouping_strategy, GroupingStrategy::TimingMarks);
        }
    }

    #[test]
    fn scanning_is_deterministic() {
        let photo = testing::photographed_sheet(&testing::answer_pattern(20, 5), 5);
        let scanner = Scanner::default();
        let first = scanner.scan(&photo, 20, 5);
        let second = scanner.scan(&photo, 20, 5);
        assert_eq!(first, second);
    }

    #[test]
    fn corrected_image_is_attached_on_request() {
        let config = ScanConfig {
            attach_corrected_image: true,
            ..ScanConfig::default()
        };
        let photo = testing::photographed_sheet(&testing::answer_pattern(20, 5), 5);
        let result = Scanner::new(config).scan(&photo, 20, 5);
        let png = result.report().and_then(|r| r.corrected_image.clone()).expect("corrected image");
        let decoded = SheetImage::from_bytes(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (photo.width(), photo.height()));
    }
}
