//! Pipeline configuration.
//!
//! Everything the pipeline needs is carried by one [`PipelineConfig`] value that
//! callers pass in explicitly. It can be loaded from a JSON file; any field
//! missing from the file falls back to its default.

use crate::error::{PeerStudyError, Result, ResultExt as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MATRIX_FILE: &str = "X.csv";
pub const META_FILE: &str = "students_meta.csv";
pub const SCHEMA_FILE: &str = "feature_map.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "kmeans_model.json";
pub const LABELED_FILE: &str = "students_with_clusters.csv";
pub const SUMMARY_FILE: &str = "evaluation_results.txt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raw survey table (CSV, JSON or Parquet)
    #[serde(default = "default_input_path")]
    pub input_path: PathBuf,

    /// Directory receiving every artifact
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Identity/context columns carried into the meta table, never used as features
    #[serde(default = "default_meta_columns")]
    pub meta_columns: Vec<String>,

    /// Columns expanded into one indicator per category
    #[serde(default = "default_categorical_columns")]
    pub categorical_columns: Vec<String>,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub matching: MatchingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_dir: default_output_dir(),
            meta_columns: default_meta_columns(),
            categorical_columns: default_categorical_columns(),
            clustering: ClusteringConfig::default(),
            matching: MatchingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.clustering.cluster_count == 0 {
            return Err(PeerStudyError::Config(
                "cluster_count must be a positive integer".to_owned(),
            ));
        }
        if self.clustering.n_runs == 0 {
            return Err(PeerStudyError::Config(
                "n_runs must be at least 1".to_owned(),
            ));
        }
        if self.matching.max_matches == 0 {
            return Err(PeerStudyError::Config(
                "max_matches must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn artifacts(&self) -> ArtifactPaths {
        ArtifactPaths::new(&self.output_dir)
    }
}

/// K-means parameters. The cluster count is an external decision; nothing here
/// searches for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default = "default_cluster_count")]
    pub cluster_count: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Independent initialisations; the lowest-inertia run wins
    #[serde(default = "default_n_runs")]
    pub n_runs: usize,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,

    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Free-text remark copied into the evaluation summary
    #[serde(default)]
    pub note: Option<String>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            cluster_count: default_cluster_count(),
            seed: default_seed(),
            n_runs: default_n_runs(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            note: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_matches: default_max_matches(),
        }
    }
}

/// Locations of every artifact the pipeline reads or writes.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub matrix: PathBuf,
    pub meta: PathBuf,
    pub schema: PathBuf,
    pub scaler: PathBuf,
    pub model: PathBuf,
    pub labeled: PathBuf,
    pub summary: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            matrix: dir.join(MATRIX_FILE),
            meta: dir.join(META_FILE),
            schema: dir.join(SCHEMA_FILE),
            scaler: dir.join(SCALER_FILE),
            model: dir.join(MODEL_FILE),
            labeled: dir.join(LABELED_FILE),
            summary: dir.join(SUMMARY_FILE),
        }
    }
}

fn default_input_path() -> PathBuf {
    PathBuf::from("data/peer_study_dataset.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_meta_columns() -> Vec<String> {
    ["student_id", "Name", "first_name", "last_name"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_categorical_columns() -> Vec<String> {
    [
        "Year_of_Study",
        "Branch",
        "Preferred_Study_Style",
        "Preferred_Study_Location",
        "Session_Preference",
        "Branch_Preference",
        "Available_Time_Slot",
        "Preferred_Group_Size",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn default_cluster_count() -> usize {
    7
}

fn default_seed() -> u64 {
    42
}

fn default_n_runs() -> usize {
    10
}

fn default_max_iterations() -> u64 {
    300
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_max_matches() -> usize {
    5
}
