//! Weight-adjustment reports from operator verdicts
//!
//! A verdict on a stored clip is turned into a single linear-model step:
//! the clip's per-signal maxima are normalized, weighted into a prediction,
//! compared with the target implied by the verdict, and the resulting
//! `lr * error * input` deltas are reported and applied to a private copy of
//! the weights. Live fusion is never touched.

use crate::app::config::FusionConfig;
use crate::capture::{ClipRecord, ClipStore};
use crate::fusion::{normalize_value, ThreatLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Default step size
pub const DEFAULT_LEARNING_RATE: f64 = 0.05;

/// Stat name used for the violence input
const VIOLENCE_SIGNAL: &str = "violence_pressure";

/// False-positive analysis runs above this prediction
const FALSE_POSITIVE_PREDICTION: f64 = 0.3;
/// False-negative analysis runs below this prediction
const FALSE_NEGATIVE_PREDICTION: f64 = 0.6;
/// Contributions above this are blamed for a false positive
const BLAME_CONTRIBUTION: f64 = 0.05;
/// Inputs above this are flagged in a false negative
const HIGH_INPUT: f64 = 0.5;
/// Errors at or below this need no adjustment
const ERROR_TOLERANCE: f64 = 0.1;

/// Operator judgement of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accurate,
    Inaccurate,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accurate => "accurate",
            Verdict::Inaccurate => "inaccurate",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted adjustment report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentReport {
    pub report_id: String,
    pub event_id: String,
    pub created_at: DateTime<Utc>,
    pub verdict: Verdict,
    /// Linear prediction before adjustment
    pub prediction: f64,
    /// 1 for "should have alarmed", 0 otherwise
    pub target: f64,
    /// target - prediction
    pub error: f64,
    pub weight_deltas: BTreeMap<String, f64>,
    pub credit_assignment: Vec<String>,
    pub conclusion: String,
}

/// Result of processing one verdict
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackOutcome {
    Report(AdjustmentReport),
    NotFound { event_id: String },
}

/// Offline learner over stored clips
pub struct FeedbackAnalyzer {
    weights: BTreeMap<String, f64>,
    ceilings: BTreeMap<String, f64>,
    learning_rate: f64,
    store: ClipStore,
}

impl FeedbackAnalyzer {
    /// Analyzer with its own copy of the fusion weights
    pub fn new(config: &FusionConfig, store: ClipStore) -> Self {
        let mut weights: BTreeMap<String, f64> = config
            .weights
            .iter()
            .map(|(c, w)| (c.as_str().to_string(), *w))
            .collect();
        weights.insert(VIOLENCE_SIGNAL.to_string(), config.violence_weight);

        let mut ceilings: BTreeMap<String, f64> = config
            .ceilings
            .iter()
            .map(|(c, v)| (c.as_str().to_string(), *v))
            .collect();
        ceilings.insert(VIOLENCE_SIGNAL.to_string(), config.violence_ceiling);

        Self {
            weights,
            ceilings,
            learning_rate: DEFAULT_LEARNING_RATE,
            store,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Current private weights
    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Evaluate a verdict, save the report under `learning/` and apply the
    /// deltas to the private weights.
    pub fn process(&mut self, event_id: &str, verdict: Verdict) -> crate::Result<FeedbackOutcome> {
        let Some(record) = self.store.find(event_id)? else {
            info!(event_id, "Feedback for unknown event");
            return Ok(FeedbackOutcome::NotFound {
                event_id: event_id.to_string(),
            });
        };

        let report = self.evaluate(&record, verdict);
        let path = self.save(&report)?;
        info!(
            event_id = %report.event_id,
            verdict = %verdict,
            prediction = report.prediction,
            error = report.error,
            path = %path.display(),
            "Adjustment report written"
        );

        self.apply(&report.weight_deltas);
        Ok(FeedbackOutcome::Report(report))
    }

    /// Build a report for `record` without touching disk or weights
    pub fn evaluate(&self, record: &ClipRecord, verdict: Verdict) -> AdjustmentReport {
        let meta = &record.metadata;
        let target = target_for(meta.final_level, verdict);

        let inputs: BTreeMap<&str, f64> = self
            .ceilings
            .iter()
            .map(|(name, ceiling)| (name.as_str(), normalize_value(meta.stat_max(name), *ceiling)))
            .collect();

        let contributions: BTreeMap<&str, f64> = self
            .weights
            .iter()
            .map(|(name, w)| (name.as_str(), w * inputs.get(name.as_str()).copied().unwrap_or(0.0)))
            .collect();
        let prediction: f64 = contributions.values().sum();
        let error = target - prediction;

        let weight_deltas: BTreeMap<String, f64> = inputs
            .iter()
            .filter(|(name, _)| self.weights.contains_key(**name))
            .map(|(name, input)| (name.to_string(), self.learning_rate * error * input))
            .collect();

        let credit_assignment = self.credit(target, prediction, &inputs, &contributions);
        let conclusion = conclude(target, error, &weight_deltas);
        debug!(clip_id = %meta.clip_id, target, prediction, "Feedback evaluated");

        let created_at = Utc::now();
        let event_id = meta.clip_id.to_string();
        AdjustmentReport {
            report_id: format!("report_{}_{}_{}", event_id, verdict, created_at.timestamp_millis()),
            event_id,
            created_at,
            verdict,
            prediction,
            target,
            error,
            weight_deltas,
            credit_assignment,
            conclusion,
        }
    }

    fn credit(
        &self,
        target: f64,
        prediction: f64,
        inputs: &BTreeMap<&str, f64>,
        contributions: &BTreeMap<&str, f64>,
    ) -> Vec<String> {
        if target == 0.0 && prediction > FALSE_POSITIVE_PREDICTION {
            let mut ranked: Vec<(&str, f64)> = contributions.iter().map(|(k, v)| (*k, *v)).collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            ranked
                .into_iter()
                .filter(|(_, c)| *c > BLAME_CONTRIBUTION)
                .map(|(name, c)| {
                    format!(
                        "{} contributed {:.2} (value {:.2} x weight {})",
                        name,
                        c,
                        inputs.get(name).copied().unwrap_or(0.0),
                        self.weights[name]
                    )
                })
                .collect()
        } else if target == 1.0 && prediction < FALSE_NEGATIVE_PREDICTION {
            self.weights
                .iter()
                .filter_map(|(name, w)| {
                    let value = inputs.get(name.as_str()).copied().unwrap_or(0.0);
                    (value > HIGH_INPUT).then(|| {
                        format!("{} was high ({:.2}) but weight ({}) might be too low", name, value, w)
                    })
                })
                .collect()
        } else {
            Vec::new()
        }
    }

    fn save(&self, report: &AdjustmentReport) -> crate::Result<PathBuf> {
        let dir = self.store.learning_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", report.report_id));
        std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
        Ok(path)
    }

    fn apply(&mut self, deltas: &BTreeMap<String, f64>) {
        for (name, delta) in deltas {
            if let Some(w) = self.weights.get_mut(name) {
                *w = (*w + delta).max(0.0);
            }
        }
    }
}

/// Target implied by a verdict on a clip that ended at `level`
pub fn target_for(level: ThreatLevel, verdict: Verdict) -> f64 {
    let alarmed = level != ThreatLevel::Calm;
    match (verdict, alarmed) {
        (Verdict::Accurate, true) | (Verdict::Inaccurate, false) => 1.0,
        (Verdict::Accurate, false) | (Verdict::Inaccurate, true) => 0.0,
    }
}

fn conclude(target: f64, error: f64, deltas: &BTreeMap<String, f64>) -> String {
    if error.abs() <= ERROR_TOLERANCE {
        return "No significant adjustment needed.".to_string();
    }
    if target == 1.0 {
        return "Model under-confident. Consider increasing weights for observed active signals.".to_string();
    }
    match deltas.iter().min_by(|a, b| a.1.total_cmp(b.1)) {
        Some((name, delta)) => format!(
            "Model over-confident. {} caused the false alarm; weight penalty {:.4}.",
            name, delta
        ),
        None => "Model over-confident.".to_string(),
    }
}
