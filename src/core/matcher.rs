//! Label matcher: maps classifier labels to game outcomes
//!
//! Each outcome owns a set of accepted label strings and a minimum
//! confidence. Labels compare trimmed and case-insensitively, as whole
//! strings, so "Incorrecto" never matches a "Correcto" rule.

use std::collections::HashSet;

use crate::config::MatcherConfig;
use crate::types::{Outcome, Prediction};

/// Accepted labels + threshold for one outcome
#[derive(Debug, Clone)]
pub struct OutcomeRule {
    pub outcome: Outcome,
    labels: HashSet<String>,
    pub min_confidence: f64,
}

impl OutcomeRule {
    pub fn new<I, S>(outcome: Outcome, labels: I, min_confidence: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            outcome,
            labels: labels
                .into_iter()
                .map(|l| normalize(l.as_ref()))
                .filter(|l| !l.is_empty())
                .collect(),
            min_confidence,
        }
    }

    /// Is `label` one of this rule's synonyms?
    pub fn accepts_label(&self, label: &str) -> bool {
        self.labels.contains(&normalize(label))
    }

    /// Does the prediction cross this rule?
    pub fn matches(&self, prediction: &Prediction) -> bool {
        self.accepts_label(&prediction.label) && prediction.confidence >= self.min_confidence
    }
}

/// Outcome rules evaluated once per tick
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    correct: OutcomeRule,
    incorrect: OutcomeRule,
}

impl Default for LabelMatcher {
    fn default() -> Self {
        Self::from_config(&MatcherConfig::default())
    }
}

impl LabelMatcher {
    pub fn new(correct: OutcomeRule, incorrect: OutcomeRule) -> Self {
        Self { correct, incorrect }
    }

    pub fn from_config(config: &MatcherConfig) -> Self {
        Self {
            correct: OutcomeRule::new(
                Outcome::Correct,
                &config.correct_labels,
                config.effective_correct_threshold(),
            ),
            incorrect: OutcomeRule::new(
                Outcome::Incorrect,
                &config.incorrect_labels,
                config.effective_incorrect_threshold(),
            ),
        }
    }

    pub fn rule(&self, outcome: Outcome) -> &OutcomeRule {
        match outcome {
            Outcome::Correct => &self.correct,
            Outcome::Incorrect => &self.incorrect,
        }
    }

    /// Outcome for a single prediction; the correct rule is checked first
    pub fn classify(&self, prediction: &Prediction) -> Option<Outcome> {
        if self.correct.matches(prediction) {
            Some(Outcome::Correct)
        } else if self.incorrect.matches(prediction) {
            Some(Outcome::Incorrect)
        } else {
            None
        }
    }

    /// First prediction, in result order, that crosses its rule
    pub fn first_match<'a>(&self, predictions: &'a [Prediction]) -> Option<(Outcome, &'a Prediction)> {
        predictions
            .iter()
            .find_map(|p| self.classify(p).map(|outcome| (outcome, p)))
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}
