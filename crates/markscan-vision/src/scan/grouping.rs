// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Question grouping — turns a loose set of bubbles into one ordered group per
// question. Row timing marks anchor the rows when enough of them are found;
// otherwise rows are recovered by clustering bubble y-positions.

use image::GrayImage;
use markscan_core::config::{GroupingConfig, MarkerFilter, TemplateGeometry};
use markscan_core::{
    BubbleCandidate, GroupingStrategy, MarkerCandidate, Point, QuestionGroup, ScanParams,
    TemplateLayout,
};
use tracing::{debug, info, instrument};

use crate::primitives::contours::ContourFinder;
use crate::scan::markers::MarkerDetector;

/// Groups in question order and the strategy that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    /// Exactly `total_questions` groups; missing questions are empty groups.
    pub groups: Vec<QuestionGroup>,
    pub strategy: GroupingStrategy,
}

/// Assigns bubbles to questions, column-major.
pub struct QuestionGrouper<'a> {
    config: &'a GroupingConfig,
    template: &'a TemplateGeometry,
    timing_filter: &'a MarkerFilter,
    contours: &'a dyn ContourFinder,
}

impl<'a> QuestionGrouper<'a> {
    pub fn new(
        config: &'a GroupingConfig,
        template: &'a TemplateGeometry,
        timing_filter: &'a MarkerFilter,
        contours: &'a dyn ContourFinder,
    ) -> Self {
        Self {
            config,
            template,
            timing_filter,
            contours,
        }
    }

    /// Group `bubbles` into `params.total_questions` questions.
    ///
    /// `binary` is the thresholded corrected sheet; without it only row
    /// clustering is attempted. Candidates centred on a row timing mark are
    /// dropped before either strategy runs.
    #[instrument(skip_all, fields(bubbles = bubbles.len(), questions = params.total_questions))]
    pub fn group(
        &self,
        bubbles: &[BubbleCandidate],
        params: &ScanParams,
        layout: TemplateLayout,
        binary: Option<&GrayImage>,
    ) -> Grouping {
        let total = params.total_questions as usize;
        let options = params.options_per_question as usize;

        let marks = binary.map(|binary| self.timing_marks(binary, layout));
        let mut bubbles = bubbles.to_vec();
        if let Some(marks) = &marks {
            let before = bubbles.len();
            bubbles.retain(|b| !marks.iter().any(|m| covers(m, b)));
            if bubbles.len() < before {
                debug!(dropped = before - bubbles.len(), "Dropped candidates on timing marks");
            }
        }

        if bubbles.is_empty() {
            return Grouping {
                groups: pad(Vec::new(), total),
                strategy: GroupingStrategy::RowClustering,
            };
        }
        let avg_diameter = average_diameter(&bubbles);

        if let (Some(marks), Some(binary)) = (marks, binary) {
            let needed = (self.config.timing_acceptance_ratio * total as f32).ceil() as usize;
            let anchors = mark_rows(&marks, layout, binary.width(), avg_diameter);
            if anchors.len() >= needed {
                let groups = self.anchor_to_marks(
                    &anchors,
                    &bubbles,
                    layout,
                    options,
                    avg_diameter,
                    binary.width(),
                );
                if groups.len() >= needed {
                    info!(marks = anchors.len(), groups = groups.len(), "Grouped by timing marks");
                    return Grouping {
                        groups: pad(groups, total),
                        strategy: GroupingStrategy::TimingMarks,
                    };
                }
                info!(
                    groups = groups.len(),
                    needed, "Timing marks produced too few groups; clustering rows"
                );
            } else {
                debug!(marks = anchors.len(), needed, "Too few timing marks; clustering rows");
            }
        }

        let groups = self.cluster_rows(&bubbles, layout, options, avg_diameter);
        info!(groups = groups.len(), "Grouped by row clustering");
        Grouping {
            groups: pad(groups, total),
            strategy: GroupingStrategy::RowClustering,
        }
    }

    /// Mark-shaped blobs in the leading strip of each column, between the
    /// header and footer and clear of the corner markers.
    fn timing_marks(&self, binary: &GrayImage, layout: TemplateLayout) -> Vec<MarkerCandidate> {
        let (w, h) = (binary.width() as f32, binary.height() as f32);
        let columns = layout.columns.max(1) as usize;
        let column_width = w / columns as f32;
        let lead = column_width * self.config.timing_column_fraction(layout.columns);
        let top = h * self.template.header_ratio;
        let bottom = h * (1.0 - self.template.footer_ratio);
        let corner_w = w * self.template.corner_margin_ratio;
        let corner_h = h * self.template.corner_margin_ratio;

        let in_corner = |p: Point| {
            (p.x < corner_w || p.x > w - corner_w) && (p.y < corner_h || p.y > h - corner_h)
        };

        let marks: Vec<MarkerCandidate> = MarkerDetector::new(self.contours)
            .find_markers(binary, self.timing_filter)
            .into_iter()
            .filter(|mark| {
                let p = mark.center;
                let column = ((p.x / column_width) as usize).min(columns - 1);
                p.y >= top
                    && p.y <= bottom
                    && !in_corner(p)
                    && p.x - column as f32 * column_width < lead
            })
            .collect();
        debug!(marks = marks.len(), "Timing marks located");
        marks
    }

    fn anchor_to_marks(
        &self,
        marks: &[Point],
        bubbles: &[BubbleCandidate],
        layout: TemplateLayout,
        options: usize,
        avg_diameter: f32,
        width: u32,
    ) -> Vec<QuestionGroup> {
        let column_width = width as f32 / layout.columns.max(1) as f32;
        let tolerance = self.config.timing_row_tolerance * avg_diameter;

        marks
            .iter()
            .filter_map(|mark| {
                let mut row: Vec<BubbleCandidate> = bubbles
                    .iter()
                    .filter(|b| {
                        b.x > mark.x
                            && b.x - mark.x <= column_width
                            && (b.y - mark.y).abs() <= tolerance
                    })
                    .copied()
                    .collect();
                if row.is_empty() {
                    return None;
                }
                row.sort_by(|a, b| a.x.total_cmp(&b.x));
                if row.len() > options {
                    row = best_spaced(&row, options);
                }
                Some(QuestionGroup::new(row))
            })
            .collect()
    }

    fn cluster_rows(
        &self,
        bubbles: &[BubbleCandidate],
        layout: TemplateLayout,
        options: usize,
        avg_diameter: f32,
    ) -> Vec<QuestionGroup> {
        let columns = layout.columns.max(1) as usize;
        let min_x = bubbles.iter().map(|b| b.x).fold(f32::INFINITY, f32::min);
        let max_x = bubbles.iter().map(|b| b.x).fold(f32::NEG_INFINITY, f32::max);
        let span = max_x - min_x;

        let mut buckets: Vec<Vec<BubbleCandidate>> = vec![Vec::new(); columns];
        for b in bubbles {
            let column = if span > 0.0 {
                (((b.x - min_x) / span * columns as f32) as usize).min(columns - 1)
            } else {
                0
            };
            buckets[column].push(*b);
        }

        let gap = self.config.row_gap_factor * avg_diameter;
        let mut groups = Vec::new();
        for mut bucket in buckets {
            bucket.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
            let mut rows: Vec<Vec<BubbleCandidate>> = Vec::new();
            let mut previous_y: Option<f32> = None;
            for b in bucket {
                if previous_y.is_none_or(|y| b.y - y > gap) {
                    rows.push(Vec::new());
                }
                if let Some(row) = rows.last_mut() {
                    row.push(b);
                }
                previous_y = Some(b.y);
            }

            for mut row in rows {
                row.sort_by(|a, b| a.x.total_cmp(&b.x));
                let kept = match row.len() {
                    n if n == options => row,
                    n if n > options => best_spaced(&row, options),
                    n if n + 1 == options => row,
                    _ => continue,
                };
                groups.push(QuestionGroup::new(kept));
            }
        }
        groups
    }
}

/// Mark centres in column-major order, each column top to bottom. Marks
/// closer than half a bubble diameter in y are the same row.
fn mark_rows(
    marks: &[MarkerCandidate],
    layout: TemplateLayout,
    width: u32,
    avg_diameter: f32,
) -> Vec<Point> {
    let columns = layout.columns.max(1) as usize;
    let column_width = width as f32 / columns as f32;
    let mut per_column: Vec<Vec<Point>> = vec![Vec::new(); columns];
    for mark in marks {
        let column = ((mark.center.x / column_width) as usize).min(columns - 1);
        per_column[column].push(mark.center);
    }

    let mut rows = Vec::new();
    for mut points in per_column {
        points.sort_by(|a, b| a.y.total_cmp(&b.y));
        let mut last_y: Option<f32> = None;
        for p in points {
            if last_y.is_some_and(|y| p.y - y < avg_diameter / 2.0) {
                continue;
            }
            last_y = Some(p.y);
            rows.push(p);
        }
    }
    rows
}

/// Whether `bubble` is centred inside `mark`'s box.
fn covers(mark: &MarkerCandidate, bubble: &BubbleCandidate) -> bool {
    let b = &mark.bounding_box;
    (b.x..=b.x + b.width).contains(&bubble.x) && (b.y..=b.y + b.height).contains(&bubble.y)
}

/// Pick `n` of `row` (sorted by x) that best match an even spacing between
/// the first and last candidate. Both ends are always kept.
pub fn best_spaced(row: &[BubbleCandidate], n: usize) -> Vec<BubbleCandidate> {
    if row.len() <= n {
        return row.to_vec();
    }
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![row[0]];
    }

    let (first, last) = (row[0], row[row.len() - 1]);
    let mut used = vec![false; row.len()];
    used[0] = true;
    used[row.len() - 1] = true;
    let mut picked = vec![first];

    for k in 1..n - 1 {
        let target = first.x + (last.x - first.x) * k as f32 / (n - 1) as f32;
        let best = (1..row.len() - 1)
            .filter(|&i| !used[i])
            .min_by(|&a, &b| (row[a].x - target).abs().total_cmp(&(row[b].x - target).abs()));
        if let Some(i) = best {
            used[i] = true;
            picked.push(row[i]);
        }
    }
    picked.push(last);
    picked.sort_by(|a, b| a.x.total_cmp(&b.x));
    picked
}

fn average_diameter(bubbles: &[BubbleCandidate]) -> f32 {
    if bubbles.is_empty() {
        return 0.0;
    }
    bubbles.iter().map(|b| b.diameter()).sum::<f32>() / bubbles.len() as f32
}

fn pad(mut groups: Vec<QuestionGroup>, total: usize) -> Vec<QuestionGroup> {
    groups.truncate(total);
    groups.resize_with(total, QuestionGroup::empty);
    groups
}
