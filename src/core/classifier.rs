//! Classifier: the external pose model behind a trait
//!
//! `estimate` turns a frame into a pose, `predict` turns a pose into ranked
//! label confidences. `ReplayClassifier` plays back a scripted sequence of
//! results over a model's vocabulary, one result per tick.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::capture::Frame;
use crate::core::model::ModelSource;
use crate::types::{GameError, Prediction};

/// One body keypoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub part: String,
    pub x: f64,
    pub y: f64,
    pub score: f64,
}

/// Pose estimated from one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    pub frame_sequence: u64,
    pub score: f64,
    pub keypoints: Vec<Keypoint>,
}

/// A loaded pose classifier
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Size of the label vocabulary
    fn total_classes(&self) -> usize;

    /// Estimate a pose from a frame
    async fn estimate(&self, frame: &Frame) -> Result<PoseEstimate, GameError>;

    /// Label confidences for a pose, in vocabulary order
    async fn predict(&self, pose: &PoseEstimate) -> Result<Vec<Prediction>, GameError>;
}

/// Builds a classifier from a model source
#[async_trait]
pub trait ClassifierLoader: Send + Sync {
    async fn load(&self, source: &ModelSource) -> Result<Box<dyn Classifier>, GameError>;
}

// =============================================================================
// Replay script
// =============================================================================

fn one() -> u32 {
    1
}

/// One scripted step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    /// Return `predictions` for `repeat` ticks
    Frames {
        predictions: Vec<Prediction>,
        #[serde(default = "one")]
        repeat: u32,
    },
    /// Fail one tick with `error`
    Failure { error: String },
}

impl ScriptStep {
    pub fn frames(predictions: Vec<Prediction>, repeat: u32) -> Self {
        ScriptStep::Frames { predictions, repeat }
    }

    pub fn once(predictions: Vec<Prediction>) -> Self {
        Self::frames(predictions, 1)
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ScriptStep::Failure { error: error.into() }
    }
}

/// Sequence of scripted steps, usually read from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    pub steps: Vec<ScriptStep>,
}

impl ReplayScript {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self { steps }
    }

    pub fn from_json(text: &str) -> Result<Self, GameError> {
        serde_json::from_str(text).map_err(|e| GameError::Config(format!("replay script: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| GameError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Flatten into one entry per tick
    fn into_ticks(self) -> VecDeque<Result<Vec<Prediction>, String>> {
        let mut ticks = VecDeque::new();
        for step in self.steps {
            match step {
                ScriptStep::Frames { predictions, repeat } => {
                    for _ in 0..repeat.max(1) {
                        ticks.push_back(Ok(predictions.clone()));
                    }
                }
                ScriptStep::Failure { error } => ticks.push_back(Err(error)),
            }
        }
        ticks
    }
}

// =============================================================================
// Replay classifier
// =============================================================================

/// Classifier that replays a script, then reports every label at zero
#[derive(Debug)]
pub struct ReplayClassifier {
    labels: Vec<String>,
    ticks: Mutex<VecDeque<Result<Vec<Prediction>, String>>>,
}

impl ReplayClassifier {
    pub fn new(labels: Vec<String>, script: ReplayScript) -> Self {
        for step in &script.steps {
            if let ScriptStep::Frames { predictions, .. } = step {
                for p in predictions {
                    if !labels.iter().any(|l| l == &p.label) {
                        warn!(label = %p.label, "scripted label not in model vocabulary");
                    }
                }
            }
        }
        Self {
            labels,
            ticks: Mutex::new(script.into_ticks()),
        }
    }

    /// Scripted ticks not yet consumed
    pub fn remaining(&self) -> usize {
        self.ticks.lock().map(|t| t.len()).unwrap_or(0)
    }

    fn idle_predictions(&self) -> Vec<Prediction> {
        self.labels.iter().map(|l| Prediction::new(l.clone(), 0.0)).collect()
    }
}

#[async_trait]
impl Classifier for ReplayClassifier {
    fn total_classes(&self) -> usize {
        self.labels.len()
    }

    async fn estimate(&self, frame: &Frame) -> Result<PoseEstimate, GameError> {
        Ok(PoseEstimate {
            frame_sequence: frame.sequence,
            score: 1.0,
            keypoints: Vec::new(),
        })
    }

    async fn predict(&self, _pose: &PoseEstimate) -> Result<Vec<Prediction>, GameError> {
        let next = self
            .ticks
            .lock()
            .map_err(|_| GameError::ClassifierRuntime("replay state poisoned".to_string()))?
            .pop_front();
        match next {
            Some(Ok(predictions)) => Ok(predictions),
            Some(Err(error)) => Err(GameError::ClassifierRuntime(error)),
            None => Ok(self.idle_predictions()),
        }
    }
}

/// Where a replay loader takes its vocabulary from
#[derive(Debug, Clone, PartialEq)]
pub enum Vocabulary {
    /// Fetch and validate the model resources
    FromModel,
    /// Skip fetching, use these labels
    Fixed(Vec<String>),
}

/// Loader producing `ReplayClassifier`s
#[derive(Debug, Clone)]
pub struct ReplayLoader {
    vocabulary: Vocabulary,
    script: ReplayScript,
}

impl ReplayLoader {
    pub fn new(vocabulary: Vocabulary, script: ReplayScript) -> Self {
        Self { vocabulary, script }
    }

    /// Offline loader with a fixed vocabulary
    pub fn offline(labels: &[&str], script: ReplayScript) -> Self {
        Self::new(
            Vocabulary::Fixed(labels.iter().map(|l| l.to_string()).collect()),
            script,
        )
    }
}

#[async_trait]
impl ClassifierLoader for ReplayLoader {
    async fn load(&self, source: &ModelSource) -> Result<Box<dyn Classifier>, GameError> {
        let labels = match &self.vocabulary {
            Vocabulary::FromModel => source.load().await?.labels().to_vec(),
            Vocabulary::Fixed(labels) => {
                if labels.is_empty() {
                    return Err(GameError::ModelLoad("empty vocabulary".to_string()));
                }
                labels.clone()
            }
        };
        info!(classes = labels.len(), steps = self.script.steps.len(), "replay classifier ready");
        Ok(Box::new(ReplayClassifier::new(labels, self.script.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn frame(sequence: u64) -> Frame {
        Frame {
            sequence,
            width: 1280,
            height: 720,
            mirrored: true,
            captured_at: Utc::now(),
            pixels: Vec::new(),
        }
    }

    async fn tick(classifier: &ReplayClassifier, seq: u64) -> Result<Vec<Prediction>, GameError> {
        let pose = classifier.estimate(&frame(seq)).await?;
        classifier.predict(&pose).await
    }

    #[tokio::test]
    async fn test_replays_in_order_then_idles() {
        let script = ReplayScript::new(vec![
            ScriptStep::frames(vec![Prediction::new("Clave", 0.95)], 2),
            ScriptStep::failure("glitch"),
        ]);
        let classifier = ReplayClassifier::new(vec!["Clave".into(), "Incorrecto".into()], script);
        assert_eq!(classifier.remaining(), 3);

        assert_eq!(tick(&classifier, 1).await.unwrap()[0].confidence, 0.95);
        assert_eq!(tick(&classifier, 2).await.unwrap()[0].label, "Clave");
        assert!(matches!(tick(&classifier, 3).await, Err(GameError::ClassifierRuntime(_))));

        let idle = tick(&classifier, 4).await.unwrap();
        assert_eq!(idle.len(), 2);
        assert!(idle.iter().all(|p| p.confidence == 0.0));
    }

    #[test]
    fn test_script_json() {
        let text = r#"{"steps": [
            {"predictions": [{"label": "Clave", "confidence": 0.95}], "repeat": 3},
            {"error": "camera glitch"},
            {"predictions": [{"label": "Incorrecto", "confidence": 0.75}]}
        ]}"#;
        let script = ReplayScript::from_json(text).unwrap();
        assert_eq!(script.steps.len(), 3);
        assert_eq!(script.steps[1], ScriptStep::failure("camera glitch"));
        assert!(matches!(script.steps[2], ScriptStep::Frames { repeat: 1, .. }));
    }

    #[tokio::test]
    async fn test_offline_loader_reports_classes() {
        let loader = ReplayLoader::offline(&["Clave", "Incorrecto", "Fondo"], ReplayScript::default());
        let classifier = loader.load(&ModelSource::parse("./unused")).await.unwrap();
        assert_eq!(classifier.total_classes(), 3);
    }

    #[tokio::test]
    async fn test_model_loader_fails_without_model() {
        let loader = ReplayLoader::new(Vocabulary::FromModel, ReplayScript::default());
        let err = loader.load(&ModelSource::parse("/nonexistent/escape-gate")).await.err().unwrap();
        assert!(matches!(err, GameError::ModelLoad(_)));
    }
}
