//! Classification scores accumulated over an evaluation pass.
//!
//! Predictions and ground truth are label sets, so the same bookkeeping
//! serves multi-class (one label per sample) and multi-label models.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::registry::MetricKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LabelCounts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

impl LabelCounts {
    fn support(&self) -> usize {
        self.tp + self.fn_
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn harmonic(p: f64, r: f64) -> f64 {
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

/// One metric averaged in every supported way
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub micro: f64,
    #[serde(rename = "macro")]
    pub macro_avg: f64,
    /// Per-label scores weighted by label support
    pub weighted: f64,
    pub per_label: Vec<f64>,
}

impl Score {
    fn from_per_label(micro: f64, per_label: Vec<f64>, supports: &[usize]) -> Self {
        let macro_avg = if per_label.is_empty() {
            0.0
        } else {
            per_label.iter().sum::<f64>() / per_label.len() as f64
        };
        let total: usize = supports.iter().sum();
        let weighted = if total == 0 {
            0.0
        } else {
            per_label
                .iter()
                .zip(supports)
                .map(|(s, &n)| s * n as f64)
                .sum::<f64>()
                / total as f64
        };
        Self {
            micro,
            macro_avg,
            weighted,
            per_label,
        }
    }
}

/// Scores for the requested metrics, in request order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    pub samples: usize,
    pub scores: Vec<(String, Score)>,
}

impl MetricReport {
    pub fn get(&self, key: &str) -> Option<&Score> {
        self.scores.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }
}

impl fmt::Display for MetricReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .scores
            .iter()
            .map(|(key, score)| {
                format!(
                    "{key}: micro={:.4} macro={:.4} weighted={:.4}",
                    score.micro, score.macro_avg, score.weighted
                )
            })
            .collect();
        write!(f, "{} samples; {}", self.samples, parts.join(", "))
    }
}

/// Running confusion counts per label
#[derive(Debug, Clone, PartialEq)]
pub struct RunningScore {
    counts: Vec<LabelCounts>,
    exact_matches: usize,
    samples: usize,
}

impl RunningScore {
    pub fn new(num_classes: usize) -> Self {
        Self {
            counts: vec![LabelCounts::default(); num_classes],
            exact_matches: 0,
            samples: 0,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Add a batch of `(true, predicted)` label sets. Labels outside
    /// `0..num_classes` are ignored.
    pub fn update(&mut self, truth: &[Vec<usize>], predicted: &[Vec<usize>]) {
        for (t, p) in truth.iter().zip(predicted) {
            self.update_one(t, p);
        }
    }

    fn update_one(&mut self, truth: &[usize], predicted: &[usize]) {
        let n = self.counts.len();
        let mut t = vec![false; n];
        let mut p = vec![false; n];
        truth.iter().filter(|&&l| l < n).for_each(|&l| t[l] = true);
        predicted.iter().filter(|&&l| l < n).for_each(|&l| p[l] = true);

        for (counts, (&is_true, &is_predicted)) in self.counts.iter_mut().zip(t.iter().zip(&p)) {
            match (is_true, is_predicted) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (true, false) => counts.fn_ += 1,
                (false, false) => {}
            }
        }
        if t == p {
            self.exact_matches += 1;
        }
        self.samples += 1;
    }

    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = LabelCounts::default());
        self.exact_matches = 0;
        self.samples = 0;
    }

    fn supports(&self) -> Vec<usize> {
        self.counts.iter().map(LabelCounts::support).collect()
    }

    fn totals(&self) -> LabelCounts {
        self.counts.iter().fold(LabelCounts::default(), |acc, c| LabelCounts {
            tp: acc.tp + c.tp,
            fp: acc.fp + c.fp,
            fn_: acc.fn_ + c.fn_,
        })
    }

    /// Exact-match accuracy as `micro`; per label it is the share of samples
    /// on which that label was decided correctly.
    pub fn accuracy(&self) -> Score {
        let per_label = self
            .counts
            .iter()
            .map(|c| ratio(self.samples - c.fp - c.fn_, self.samples))
            .collect();
        Score::from_per_label(
            ratio(self.exact_matches, self.samples),
            per_label,
            &self.supports(),
        )
    }

    pub fn precision(&self) -> Score {
        let totals = self.totals();
        let per_label = self.counts.iter().map(|c| ratio(c.tp, c.tp + c.fp)).collect();
        Score::from_per_label(
            ratio(totals.tp, totals.tp + totals.fp),
            per_label,
            &self.supports(),
        )
    }

    pub fn recall(&self) -> Score {
        let totals = self.totals();
        let per_label = self.counts.iter().map(|c| ratio(c.tp, c.support())).collect();
        Score::from_per_label(ratio(totals.tp, totals.support()), per_label, &self.supports())
    }

    pub fn f1_score(&self) -> Score {
        let totals = self.totals();
        let micro = harmonic(
            ratio(totals.tp, totals.tp + totals.fp),
            ratio(totals.tp, totals.support()),
        );
        let per_label = self
            .counts
            .iter()
            .map(|c| harmonic(ratio(c.tp, c.tp + c.fp), ratio(c.tp, c.support())))
            .collect();
        Score::from_per_label(micro, per_label, &self.supports())
    }

    pub fn score(&self, metric: MetricKind) -> Score {
        match metric {
            MetricKind::Accuracy => self.accuracy(),
            MetricKind::Precision => self.precision(),
            MetricKind::Recall => self.recall(),
            MetricKind::F1Score => self.f1_score(),
        }
    }

    pub fn get_scores(&self, metrics: &[MetricKind]) -> MetricReport {
        MetricReport {
            samples: self.samples,
            scores: metrics
                .iter()
                .map(|&m| (m.key().to_string(), self.score(m)))
                .collect(),
        }
    }
}
