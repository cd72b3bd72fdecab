// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable guidance for the person holding the camera.
//
// Every scan error and every live-preview rejection maps to plain English with
// a clear suggestion. Severity drives how the UI presents it.

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::types::{CornerRejection, IssueKind, ScanReport};

/// Severity of a message from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Framing or lighting; taking another photo will likely help.
    Transient,
    /// The user must check something before continuing.
    ActionRequired,
    /// Retrying will not help (unsupported sheet, broken file).
    Permanent,
    /// Nothing is wrong.
    Ready,
}

/// A message with an actionable suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guidance {
    /// Short summary (shown as a heading).
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    /// Whether a retake is worthwhile.
    pub retriable: bool,
    pub severity: Severity,
}

impl Guidance {
    fn new(message: &str, suggestion: &str, retriable: bool, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable,
            severity,
        }
    }
}

/// Convert a `ScanError` into guidance the person scanning can act on.
pub fn humanize_error(err: &ScanError) -> Guidance {
    match err {
        ScanError::UnsupportedQuestionCount(count) => Guidance {
            message: format!("Sheets with {count} questions aren't supported."),
            suggestion: "Choose an exam with 20, 50 or 100 questions.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ScanError::InvalidOptionCount(_) => Guidance::new(
            "The number of answer choices isn't supported.",
            "Each question needs between 2 and 26 choices. Check the exam settings.",
            false,
            Severity::ActionRequired,
        ),

        ScanError::Image(_) | ScanError::EmptyImage => Guidance::new(
            "The photo couldn't be read.",
            "Take the photo again. If this keeps happening, try a different camera app or file.",
            true,
            Severity::Transient,
        ),

        ScanError::NoBubblesDetected => Guidance::new(
            "No answer bubbles were found.",
            "Make sure the whole sheet is in the frame, flat, and evenly lit, then scan again.",
            true,
            Severity::Transient,
        ),

        ScanError::Config(_) | ScanError::Serialization(_) => Guidance::new(
            "The scanner settings are invalid.",
            "Restore the default scanner settings and try again.",
            false,
            Severity::Permanent,
        ),

        ScanError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                Guidance::new(
                    "The file couldn't be found.",
                    "It may have been moved or deleted. Try choosing the file again.",
                    false,
                    Severity::ActionRequired,
                )
            } else {
                Guidance::new(
                    "There was a problem reading a file.",
                    "Try again. If this keeps happening, your device's storage may be full.",
                    true,
                    Severity::Transient,
                )
            }
        }
    }
}

/// Live-preview feedback for the current frame.
pub fn preview_guidance(rejection: Option<CornerRejection>) -> Guidance {
    match rejection {
        None => Guidance::new(
            "Sheet found.",
            "Hold steady while the photo is taken.",
            false,
            Severity::Ready,
        ),
        Some(CornerRejection::TooFewMarkers) | Some(CornerRejection::MissingCorner) => {
            Guidance::new(
                "Can't see all four corner squares.",
                "Fit the whole sheet inside the frame.",
                true,
                Severity::Transient,
            )
        }
        Some(CornerRejection::DuplicateMarker) | Some(CornerRejection::InconsistentMarkerSize) => {
            Guidance::new(
                "Something in the background looks like a corner square.",
                "Place the sheet on a plain surface.",
                true,
                Severity::Transient,
            )
        }
        Some(CornerRejection::TooSmall) => Guidance::new(
            "The sheet is too far away.",
            "Move the camera closer.",
            true,
            Severity::Transient,
        ),
        Some(CornerRejection::NotRectangular) => Guidance::new(
            "The sheet is tilted.",
            "Hold the camera straight above the sheet.",
            true,
            Severity::Transient,
        ),
    }
}

/// Prompt for manual review when a successful scan is not trustworthy enough.
pub fn review_guidance(report: &ScanReport) -> Option<Guidance> {
    if !report.needs_review() {
        return None;
    }
    let flagged: Vec<String> = report
        .issues
        .iter()
        .filter(|issue| issue.kind != IssueKind::NoMark)
        .map(|issue| issue.question_number.to_string())
        .collect();
    let suggestion = if flagged.is_empty() {
        "Check the answers against the sheet before saving.".to_string()
    } else {
        format!("Check questions {} against the sheet before saving.", flagged.join(", "))
    };
    Some(Guidance {
        message: "Some answers may be wrong.".into(),
        suggestion,
        retriable: true,
        severity: Severity::ActionRequired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GroupingStrategy, ScanIssue};

    #[test]
    fn no_bubbles_is_retriable() {
        let guidance = humanize_error(&ScanError::NoBubblesDetected);
        assert_eq!(guidance.severity, Severity::Transient);
        assert!(guidance.retriable);
    }

    #[test]
    fn unsupported_count_is_permanent() {
        let guidance = humanize_error(&ScanError::UnsupportedQuestionCount(30));
        assert_eq!(guidance.severity, Severity::Permanent);
        assert!(guidance.message.contains("30"));
    }

    #[test]
    fn valid_frame_is_ready() {
        assert_eq!(preview_guidance(None).severity, Severity::Ready);
        let far = preview_guidance(Some(CornerRejection::TooSmall));
        assert!(far.suggestion.contains("closer"));
    }

    #[test]
    fn low_confidence_lists_flagged_questions() {
        let issues = vec![
            ScanIssue {
                question_number: 3,
                message: "Multiple answers marked: A and C".into(),
                kind: IssueKind::DoubleMark,
            },
            ScanIssue {
                question_number: 7,
                message: "No answer marked".into(),
                kind: IssueKind::NoMark,
            },
        ];
        let report = ScanReport::new(vec![String::new(); 2], 0.5, issues, GroupingStrategy::RowClustering);
        let guidance = review_guidance(&report).expect("needs review");
        assert!(guidance.suggestion.contains('3'));
        assert!(!guidance.suggestion.contains('7'));
    }

    #[test]
    fn confident_report_needs_no_review() {
        let report = ScanReport::new(vec!["A".into()], 1.0, Vec::new(), GroupingStrategy::TimingMarks);
        assert!(review_guidance(&report).is_none());
    }
}
