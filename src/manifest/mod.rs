//! The semantic manifest: the assembled, validated union of all semantic
//! models and metrics.
//!
//! A manifest is built once (or cached by content hash) and shared
//! read-only by any number of concurrent compiles.

pub mod assembler;
pub mod model;
pub mod raw;
pub mod validate;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use assembler::{assemble_manifest, ManifestError};
pub use model::{
    DataType, Dimension, Entity, EntityType, Measure, Metric, MetricType, NodeRelation,
    ProjectConfiguration, SemanticModel,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub semantic_models: Vec<SemanticModel>,
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub project_configuration: ProjectConfiguration,
}

impl Manifest {
    pub fn model(&self, name: &str) -> Option<&SemanticModel> {
        self.semantic_models.iter().find(|m| m.name == name)
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn dimension(&self, model: &str, name: &str) -> Option<&Dimension> {
        self.model(model).and_then(|m| m.dimension(name))
    }

    pub fn measure(&self, model: &str, name: &str) -> Option<&Measure> {
        self.model(model).and_then(|m| m.measure(name))
    }

    /// First dimension with this name in any model, for metadata lookups
    /// where the model is unknown.
    pub fn any_dimension(&self, name: &str) -> Option<&Dimension> {
        self.semantic_models
            .iter()
            .find_map(|m| m.dimension(name))
    }

    /// First measure with this name in any model.
    pub fn any_measure(&self, name: &str) -> Option<&Measure> {
        self.semantic_models.iter().find_map(|m| m.measure(name))
    }

    /// Stable content hash for caller-side caching.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}
