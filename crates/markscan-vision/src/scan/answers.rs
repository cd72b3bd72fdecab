// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Answer extraction — one letter (or nothing) per question group, plus an
// issue record for anything a person should look at.

use markscan_core::config::AnswerThresholds;
use markscan_core::{IssueKind, QuestionGroup, ScanIssue, option_letter};
use tracing::debug;

/// Answers in question order and the issues raised while reading them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    pub answers: Vec<String>,
    pub issues: Vec<ScanIssue>,
}

/// Classifies each question from the darkness of its bubbles.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerExtractor {
    thresholds: AnswerThresholds,
}

impl AnswerExtractor {
    pub fn new(thresholds: AnswerThresholds) -> Self {
        Self { thresholds }
    }

    /// Read every group. Letters follow each bubble's position in its group.
    pub fn extract(&self, groups: &[QuestionGroup]) -> Extraction {
        let mut out = Extraction {
            answers: Vec::with_capacity(groups.len()),
            issues: Vec::new(),
        };
        for (index, group) in groups.iter().enumerate() {
            let question_number = index as u32 + 1;
            let (answer, issue) = self.classify(group);
            if let Some((kind, message)) = issue {
                out.issues.push(ScanIssue {
                    question_number,
                    message,
                    kind,
                });
            }
            out.answers.push(answer);
        }
        debug!(
            questions = groups.len(),
            issues = out.issues.len(),
            "Answers extracted"
        );
        out
    }

    fn classify(&self, group: &QuestionGroup) -> (String, Option<(IssueKind, String)>) {
        if group.is_empty() {
            return (
                String::new(),
                Some((IssueKind::Missing, "Question not detected".to_string())),
            );
        }

        let mut ranked: Vec<(usize, f32)> = group
            .bubbles
            .iter()
            .enumerate()
            .map(|(i, b)| (i, b.darkness))
            .collect();
        // Stable sort keeps the leftmost bubble first among equals.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (top_index, d1) = ranked[0];
        let t = &self.thresholds;

        let double = ranked
            .get(1)
            .filter(|&&(_, d2)| d1 >= t.double_mark && d2 >= t.double_mark);
        if let Some(&(second_index, _)) = double {
            let (first, second) = (top_index.min(second_index), top_index.max(second_index));
            let message = format!(
                "Multiple answers marked: {} and {}",
                option_letter(first),
                option_letter(second)
            );
            return (String::new(), Some((IssueKind::DoubleMark, message)));
        }

        let letter = option_letter(top_index);
        if d1 >= t.filled {
            let issue = (d1 < t.faint).then(|| {
                (
                    IssueKind::Faint,
                    format!("Faint mark on {letter}; please verify"),
                )
            });
            (letter, issue)
        } else if d1 >= t.erased {
            let message = format!("Mark on {letter} looks partially erased");
            (letter, Some((IssueKind::Erased, message)))
        } else {
            (
                String::new(),
                Some((IssueKind::NoMark, "No answer marked".to_string())),
            )
        }
    }
}
