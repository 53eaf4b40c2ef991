//! Model source: locates and validates the classifier's resources
//!
//! A pose model is published as two JSON documents under one base:
//! - `model.json`: network topology + weights manifest
//! - `metadata.json`: label vocabulary and model info
//!
//! Only the documents are fetched and checked here. Inference itself lives
//! behind the `Classifier` trait.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::GameError;

pub const MODEL_FILE: &str = "model.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Where the model lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// http(s) base URL ending in `/`
    Remote { base_url: String },
    /// Directory on disk
    Local { dir: PathBuf },
}

impl ModelSource {
    /// Parse a URL or directory path
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            let base_url = if location.ends_with('/') {
                location.to_string()
            } else {
                format!("{}/", location)
            };
            ModelSource::Remote { base_url }
        } else {
            ModelSource::Local { dir: PathBuf::from(location) }
        }
    }

    /// Location of the topology descriptor
    pub fn model_url(&self) -> String {
        self.resource(MODEL_FILE)
    }

    /// Location of the label descriptor
    pub fn metadata_url(&self) -> String {
        self.resource(METADATA_FILE)
    }

    fn resource(&self, file: &str) -> String {
        match self {
            ModelSource::Remote { base_url } => format!("{}{}", base_url, file),
            ModelSource::Local { dir } => dir.join(file).display().to_string(),
        }
    }

    async fn fetch(&self, file: &str) -> Result<String, GameError> {
        let location = self.resource(file);
        debug!(%location, "fetching model resource");
        match self {
            ModelSource::Remote { .. } => {
                let response = reqwest::get(&location)
                    .await
                    .map_err(|e| GameError::ModelLoad(format!("{}: {}", location, e)))?;
                let response = response
                    .error_for_status()
                    .map_err(|e| GameError::ModelLoad(format!("{}: {}", location, e)))?;
                response
                    .text()
                    .await
                    .map_err(|e| GameError::ModelLoad(format!("{}: {}", location, e)))
            }
            ModelSource::Local { .. } => tokio::fs::read_to_string(&location)
                .await
                .map_err(|e| GameError::ModelLoad(format!("{}: {}", location, e))),
        }
    }

    /// Fetch and validate both resources
    pub async fn load(&self) -> Result<LoadedModel, GameError> {
        let topology_text = self.fetch(MODEL_FILE).await?;
        let metadata_text = self.fetch(METADATA_FILE).await?;

        let topology = ModelTopology::parse(&topology_text)?;
        let metadata = ModelMetadata::parse(&metadata_text)?;

        info!(
            model = metadata.model_name.as_deref().unwrap_or("unnamed"),
            classes = metadata.labels.len(),
            "model loaded"
        );

        Ok(LoadedModel {
            source: self.clone(),
            topology,
            metadata,
        })
    }
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub labels: Vec<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub tm_version: Option<String>,
    #[serde(default)]
    pub tfjs_version: Option<String>,
    #[serde(default)]
    pub time_stamp: Option<String>,
}

impl ModelMetadata {
    pub fn parse(text: &str) -> Result<Self, GameError> {
        let metadata: ModelMetadata = serde_json::from_str(text)
            .map_err(|e| GameError::ModelLoad(format!("{}: {}", METADATA_FILE, e)))?;
        if metadata.labels.is_empty() {
            return Err(GameError::ModelLoad(format!("{}: no labels", METADATA_FILE)));
        }
        Ok(metadata)
    }
}

/// One weights shard group from `model.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsGroup {
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Contents of `model.json` we care about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTopology {
    pub model_topology: serde_json::Value,
    #[serde(default)]
    pub weights_manifest: Vec<WeightsGroup>,
    #[serde(default)]
    pub format: Option<String>,
}

impl ModelTopology {
    pub fn parse(text: &str) -> Result<Self, GameError> {
        let topology: ModelTopology = serde_json::from_str(text)
            .map_err(|e| GameError::ModelLoad(format!("{}: {}", MODEL_FILE, e)))?;
        if topology.model_topology.is_null() {
            return Err(GameError::ModelLoad(format!("{}: empty modelTopology", MODEL_FILE)));
        }
        Ok(topology)
    }

    /// Number of weight shard files referenced
    pub fn shard_count(&self) -> usize {
        self.weights_manifest.iter().map(|g| g.paths.len()).sum()
    }
}

/// A model whose resources were fetched and validated
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub source: ModelSource,
    pub topology: ModelTopology,
    pub metadata: ModelMetadata,
}

impl LoadedModel {
    /// Size of the label vocabulary
    pub fn total_classes(&self) -> usize {
        self.metadata.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.metadata.labels
    }
}
