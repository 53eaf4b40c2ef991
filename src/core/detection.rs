//! Detection loop: frames → classifier → at most one event per tick

use tracing::{debug, info, warn};

use crate::core::capture::CaptureStream;
use crate::core::classifier::Classifier;
use crate::core::matcher::LabelMatcher;
use crate::types::{DetectionEvent, GameError, Prediction};
use crate::DEBUG_LOG_CONFIDENCE;

/// What one tick produced
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// A label crossed its threshold
    Event(DetectionEvent),
    /// Classifier ran, nothing qualified
    NoSignal,
    /// A decision was pending, classifier not consulted
    Pending,
    /// Classifier or frame failed; tick skipped
    Skipped(GameError),
}

/// Turns classifier output into discrete key signals
#[derive(Debug, Clone, Default)]
pub struct DetectionLoop {
    matcher: LabelMatcher,
    ticks: u64,
    skipped: u64,
}

impl DetectionLoop {
    pub fn new(matcher: LabelMatcher) -> Self {
        Self {
            matcher,
            ticks: 0,
            skipped: 0,
        }
    }

    pub fn matcher(&self) -> &LabelMatcher {
        &self.matcher
    }

    /// Ticks run so far
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Ticks lost to classifier or frame failures
    pub fn skipped_count(&self) -> u64 {
        self.skipped
    }

    /// Map one result set to an event
    ///
    /// Returns `None` while `pending`, whatever the confidences say.
    pub fn evaluate(&self, predictions: &[Prediction], pending: bool) -> Option<DetectionEvent> {
        if pending {
            return None;
        }
        for p in predictions.iter().filter(|p| p.confidence > DEBUG_LOG_CONFIDENCE) {
            debug!(label = %p.label, confidence = %format!("{:.0}%", p.confidence * 100.0), "candidate");
        }
        let (outcome, prediction) = self.matcher.first_match(predictions)?;
        info!(
            ?outcome,
            label = %prediction.label,
            confidence = %format!("{:.0}%", prediction.confidence * 100.0),
            "key detected"
        );
        Some(DetectionEvent::new(outcome, prediction.label.clone(), prediction.confidence))
    }

    /// Run one tick against the stream and classifier
    pub async fn tick(
        &mut self,
        stream: &mut dyn CaptureStream,
        classifier: &dyn Classifier,
        pending: bool,
    ) -> TickOutcome {
        self.ticks += 1;
        if pending {
            return TickOutcome::Pending;
        }

        let predictions = match Self::classify(stream, classifier).await {
            Ok(predictions) => predictions,
            Err(e) => {
                self.skipped += 1;
                warn!(error = %e, tick = self.ticks, "prediction failed, skipping tick");
                return TickOutcome::Skipped(e);
            }
        };

        match self.evaluate(&predictions, false) {
            Some(event) => TickOutcome::Event(event),
            None => TickOutcome::NoSignal,
        }
    }

    async fn classify(
        stream: &mut dyn CaptureStream,
        classifier: &dyn Classifier,
    ) -> Result<Vec<Prediction>, GameError> {
        let frame = stream.next_frame().await?;
        let pose = classifier.estimate(&frame).await?;
        classifier.predict(&pose).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureConfig;
    use crate::core::capture::{CaptureRequest, CaptureSource, SyntheticCapture};
    use crate::core::classifier::{ReplayClassifier, ReplayScript, ScriptStep};
    use crate::types::Outcome;

    fn labels() -> Vec<String> {
        vec!["Clave".to_string(), "Incorrecto".to_string()]
    }

    #[test]
    fn test_correct_above_threshold() {
        let detection = DetectionLoop::default();
        let event = detection
            .evaluate(&[Prediction::new("Clave", 0.95), Prediction::new("Incorrecto", 0.05)], false)
            .unwrap();
        assert_eq!(event.outcome, Outcome::Correct);
        assert_eq!(event.label, "Clave");
    }

    #[test]
    fn test_below_threshold_no_signal() {
        let detection = DetectionLoop::default();
        assert!(detection
            .evaluate(&[Prediction::new("Clave", 0.5), Prediction::new("Incorrecto", 0.5)], false)
            .is_none());
    }

    #[test]
    fn test_pending_suppresses_everything() {
        let detection = DetectionLoop::default();
        assert!(detection.evaluate(&[Prediction::new("Clave", 1.0)], true).is_none());
        assert!(detection.evaluate(&[Prediction::new("Incorrecto", 1.0)], true).is_none());
    }

    #[test]
    fn test_threshold_iff_over_confidence_grid() {
        let detection = DetectionLoop::default();
        for step in 0..=100 {
            let c = step as f64 / 100.0;
            let emitted = detection
                .evaluate(&[Prediction::new("Clave", c)], false)
                .map(|e| e.is_correct())
                .unwrap_or(false);
            assert_eq!(emitted, c >= 0.90, "confidence {}", c);
        }
    }

    #[tokio::test]
    async fn test_tick_skips_on_classifier_failure() {
        let request = CaptureRequest::from(&CaptureConfig::default());
        let mut stream = SyntheticCapture::granting().request(&request).await.unwrap();
        let classifier = ReplayClassifier::new(
            labels(),
            ReplayScript::new(vec![
                ScriptStep::failure("inference crashed"),
                ScriptStep::once(vec![Prediction::new("Clave", 0.95)]),
            ]),
        );
        let mut detection = DetectionLoop::default();

        let first = detection.tick(stream.as_mut(), &classifier, false).await;
        assert!(matches!(first, TickOutcome::Skipped(GameError::ClassifierRuntime(_))));

        let second = detection.tick(stream.as_mut(), &classifier, false).await;
        assert!(matches!(second, TickOutcome::Event(ref e) if e.is_correct()));
        assert_eq!(detection.tick_count(), 2);
        assert_eq!(detection.skipped_count(), 1);
    }

    #[tokio::test]
    async fn test_pending_tick_does_not_consume_classifier() {
        let request = CaptureRequest::from(&CaptureConfig::default());
        let mut stream = SyntheticCapture::granting().request(&request).await.unwrap();
        let classifier = ReplayClassifier::new(
            labels(),
            ReplayScript::new(vec![ScriptStep::once(vec![Prediction::new("Clave", 0.95)])]),
        );
        let mut detection = DetectionLoop::default();

        assert!(matches!(detection.tick(stream.as_mut(), &classifier, true).await, TickOutcome::Pending));
        assert_eq!(classifier.remaining(), 1);
    }
}
