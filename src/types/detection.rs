//! Classifier predictions and detection events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One labelled confidence from a classifier result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Class name from the model's label vocabulary
    pub label: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Canonical outcome a label maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Incorrect,
}

impl Outcome {
    pub fn from_correct(correct: bool) -> Self {
        if correct {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        }
    }

    pub fn is_correct(&self) -> bool {
        *self == Outcome::Correct
    }
}

/// A single decision produced by one detection tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub outcome: Outcome,
    /// Label that crossed its threshold
    pub label: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl DetectionEvent {
    pub fn new(outcome: Outcome, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            outcome,
            label: label.into(),
            confidence,
            timestamp: Utc::now(),
        }
    }

    /// Manual key press, full confidence
    pub fn manual(correct: bool) -> Self {
        Self::new(Outcome::from_correct(correct), "manual", 1.0)
    }

    pub fn is_correct(&self) -> bool {
        self.outcome.is_correct()
    }
}
