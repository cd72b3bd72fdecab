// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Confidence scoring.

use markscan_core::config::ConfidencePenalties;
use markscan_core::{IssueKind, ScanIssue};

/// Folds answer coverage and issue penalties into a score in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer {
    penalties: ConfidencePenalties,
}

impl ConfidenceScorer {
    pub fn new(penalties: ConfidencePenalties) -> Self {
        Self { penalties }
    }

    /// `answered / total` minus a deduction per issue, clamped to `[0, 1]`.
    ///
    /// Missing questions and double marks cost `severe`; faint and erased
    /// marks cost `minor`. Unmarked questions only lower coverage.
    pub fn score(&self, answers: &[String], issues: &[ScanIssue], total_questions: u32) -> f32 {
        if total_questions == 0 {
            return 0.0;
        }
        let answered = answers.iter().filter(|a| !a.is_empty()).count();
        let base = answered as f32 / total_questions as f32;

        let penalty: f32 = issues
            .iter()
            .map(|issue| match issue.kind {
                IssueKind::Missing | IssueKind::DoubleMark => self.penalties.severe,
                IssueKind::Faint | IssueKind::Erased => self.penalties.minor,
                IssueKind::NoMark => 0.0,
            })
            .sum();

        (base - penalty).clamp(0.0, 1.0)
    }
}
