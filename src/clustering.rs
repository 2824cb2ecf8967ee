//! Cluster assignment over the scaled feature matrix.
//!
//! K-means itself comes from `linfa-clustering`; this module only prepares its
//! input, reads back labels and centroids, and keeps the labels aligned with
//! the meta table. The cluster count is supplied by the caller.

use crate::config::ClusteringConfig;
use crate::error::{PeerStudyError, Result, ResultExt as _};
use crate::features::FeatureMatrix;
use chrono::{DateTime, Local};
use linfa::DatasetBase;
use linfa::prelude::*;
use linfa_clustering::KMeans;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use polars::prelude::*;
use rand_xoshiro::Xoshiro256Plus;
use rand_xoshiro::rand_core::SeedableRng as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CLUSTER_COLUMN: &str = "Cluster";

#[derive(Debug, Clone)]
pub struct ClusterAssignment {
    pub k: usize,
    /// One label per matrix row
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub centroids: Array2<f64>,
    pub columns: Vec<String>,
}

impl ClusterAssignment {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &label in &self.labels {
            if let Some(size) = sizes.get_mut(label) {
                *size += 1;
            }
        }
        sizes
    }

    pub fn model(&self, seed: u64) -> ClusterModel {
        ClusterModel {
            cluster_count: self.k,
            seed,
            inertia: self.inertia,
            columns: self.columns.clone(),
            centroids: self
                .centroids
                .axis_iter(Axis(0))
                .map(|row| row.to_vec())
                .collect(),
        }
    }
}

pub fn assign_clusters(
    matrix: &FeatureMatrix,
    config: &ClusteringConfig,
) -> Result<ClusterAssignment> {
    let k = config.cluster_count;
    if k == 0 {
        return Err(PeerStudyError::Config(
            "cluster_count must be a positive integer".to_owned(),
        ));
    }
    if matrix.n_cols() == 0 {
        return Err(PeerStudyError::Clustering(
            "cannot cluster a matrix with no feature columns".to_owned(),
        ));
    }
    if matrix.n_rows() < k {
        return Err(PeerStudyError::Clustering(format!(
            "cannot form {k} clusters from {} rows",
            matrix.n_rows()
        )));
    }

    let records = matrix.values().to_owned();
    let dataset = DatasetBase::from(records.clone());
    let rng = Xoshiro256Plus::seed_from_u64(config.seed);

    let model = KMeans::params_with_rng(k, rng)
        .n_runs(config.n_runs)
        .max_n_iterations(config.max_iterations)
        .tolerance(config.tolerance)
        .fit(&dataset)
        .context("K-means training failed")?;

    let labels: Array1<usize> = model.predict(&records);
    let centroids = model.centroids().to_owned();
    let inertia = inertia(records.view(), centroids.view(), labels.view());

    tracing::info!(
        "K-means with k={k} over {} rows: inertia {inertia:.4}",
        matrix.n_rows()
    );

    Ok(ClusterAssignment {
        k,
        labels: labels.to_vec(),
        inertia,
        centroids,
        columns: matrix.columns().to_vec(),
    })
}

/// Sum of squared distances from each row to its assigned centroid.
fn inertia(records: ArrayView2<'_, f64>, centroids: ArrayView2<'_, f64>, labels: ArrayView1<'_, usize>) -> f64 {
    records
        .axis_iter(Axis(0))
        .zip(labels.iter())
        .map(|(row, &label)| squared_distance(row, centroids.index_axis(Axis(0), label)))
        .sum()
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Append the `Cluster` column to the meta table.
pub fn label_meta(meta: &DataFrame, assignment: &ClusterAssignment) -> Result<DataFrame> {
    if meta.height() != assignment.labels.len() {
        return Err(PeerStudyError::SchemaMismatch(format!(
            "meta table has {} rows but {} cluster labels were produced",
            meta.height(),
            assignment.labels.len()
        )));
    }

    let labels: Vec<u32> = assignment
        .labels
        .iter()
        .map(|&l| u32::try_from(l).unwrap_or(u32::MAX))
        .collect();
    let mut labeled = meta.clone();
    labeled.with_column(Series::new(CLUSTER_COLUMN.into(), labels))?;
    Ok(labeled)
}

/// Fitted centroids in a form that can be saved and used to place new rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    pub cluster_count: usize,
    pub seed: u64,
    pub inertia: f64,
    pub columns: Vec<String>,
    pub centroids: Vec<Vec<f64>>,
}

impl ClusterModel {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write cluster model: {}", path.display()))?;
        tracing::info!("Saved cluster model to: {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cluster model: {}", path.display()))?;
        let model: Self = serde_json::from_str(&content)?;
        if model.centroids.len() != model.cluster_count
            || model.centroids.iter().any(|c| c.len() != model.columns.len())
        {
            return Err(PeerStudyError::Config(format!(
                "cluster model {} has inconsistent centroid dimensions",
                path.display()
            )));
        }
        Ok(model)
    }

    /// Nearest centroid and the Euclidean distance to it, per row of `matrix`.
    pub fn assign(&self, matrix: &FeatureMatrix) -> Result<Vec<(usize, f64)>> {
        if matrix.columns() != self.columns.as_slice() {
            return Err(PeerStudyError::SchemaMismatch(format!(
                "cluster model expects {} columns, matrix has {}",
                self.columns.len(),
                matrix.n_cols()
            )));
        }

        matrix
            .values()
            .axis_iter(Axis(0))
            .map(|row| {
                self.centroids
                    .iter()
                    .enumerate()
                    .map(|(label, centroid)| {
                        let d2: f64 = row
                            .iter()
                            .zip(centroid)
                            .map(|(x, c)| (x - c).powi(2))
                            .sum();
                        (label, d2.sqrt())
                    })
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .ok_or_else(|| PeerStudyError::Clustering("cluster model has no centroids".to_owned()))
            })
            .collect()
    }
}

/// Human-readable fit-quality report written next to the labeled output.
#[derive(Debug, Clone)]
pub struct FitSummary {
    pub k: usize,
    pub inertia: f64,
    pub rows: usize,
    pub cluster_sizes: Vec<usize>,
    pub note: Option<String>,
    pub generated_at: DateTime<Local>,
}

impl FitSummary {
    pub fn new(assignment: &ClusterAssignment, note: Option<String>) -> Self {
        Self {
            k: assignment.k,
            inertia: assignment.inertia,
            rows: assignment.labels.len(),
            cluster_sizes: assignment.cluster_sizes(),
            note,
            generated_at: Local::now(),
        }
    }

    pub fn interpretation(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.rows > 0 {
            lines.push(format!(
                "Average squared distance to cluster centre: {:.4}",
                self.inertia / self.rows as f64
            ));
        }
        for (label, size) in self.cluster_sizes.iter().enumerate() {
            match size {
                0 => lines.push(format!("Cluster {label} is empty; k may be too large.")),
                1 => lines.push(format!(
                    "Cluster {label} has a single member; that student has no peers in their group."
                )),
                _ => {}
            }
        }
        lines
    }

    pub fn render(&self) -> String {
        let sizes = self
            .cluster_sizes
            .iter()
            .enumerate()
            .map(|(label, size)| format!("{label}={size}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = format!(
            "Best K: {}\nInertia: {}\nRows: {}\nCluster sizes: {sizes}\n",
            self.k, self.inertia, self.rows
        );
        for line in self.interpretation() {
            out.push_str(&line);
            out.push('\n');
        }
        if let Some(note) = &self.note {
            out.push_str(note);
            out.push('\n');
        }
        out.push_str(&format!(
            "Generated: {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.render())
            .with_context(|| format!("Failed to write evaluation summary: {}", path.display()))?;
        tracing::info!("Saved evaluation summary to: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> FeatureMatrix {
        FeatureMatrix::from_columns(
            vec![
                ("x".to_owned(), vec![0.0, 0.1, -0.1, 10.0, 10.1, 9.9]),
                ("y".to_owned(), vec![0.0, -0.1, 0.1, 10.0, 9.9, 10.1]),
            ],
            6,
        )
        .unwrap()
    }

    fn config(k: usize) -> ClusteringConfig {
        ClusteringConfig {
            cluster_count: k,
            ..Default::default()
        }
    }

    #[test]
    fn test_separates_obvious_groups() -> anyhow::Result<()> {
        let assignment = assign_clusters(&two_blobs(), &config(2))?;

        assert_eq!(assignment.labels.len(), 6);
        assert_eq!(assignment.labels[0], assignment.labels[1]);
        assert_eq!(assignment.labels[0], assignment.labels[2]);
        assert_eq!(assignment.labels[3], assignment.labels[4]);
        assert_ne!(assignment.labels[0], assignment.labels[3]);
        assert_eq!(assignment.cluster_sizes(), vec![3, 3]);
        assert!(assignment.inertia < 1.0);
        Ok(())
    }

    #[test]
    fn test_same_seed_same_labels() -> anyhow::Result<()> {
        let first = assign_clusters(&two_blobs(), &config(2))?;
        let second = assign_clusters(&two_blobs(), &config(2))?;
        assert_eq!(first.labels, second.labels);
        Ok(())
    }

    #[test]
    fn test_invalid_cluster_counts() {
        assert!(matches!(
            assign_clusters(&two_blobs(), &config(0)),
            Err(PeerStudyError::Config(_))
        ));
        assert!(matches!(
            assign_clusters(&two_blobs(), &config(7)),
            Err(PeerStudyError::Clustering(_))
        ));
    }

    #[test]
    fn test_label_meta_appends_cluster_column() -> anyhow::Result<()> {
        let assignment = assign_clusters(&two_blobs(), &config(2))?;
        let meta = DataFrame::new(vec![Column::from(Series::new(
            "row_index".into(),
            (0u32..6).collect::<Vec<_>>(),
        ))])?;

        let labeled = label_meta(&meta, &assignment)?;
        assert_eq!(labeled.width(), 2);
        assert_eq!(labeled.height(), 6);
        assert!(labeled.column(CLUSTER_COLUMN).is_ok());

        let short = meta.head(Some(4));
        assert!(matches!(
            label_meta(&short, &assignment),
            Err(PeerStudyError::SchemaMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn test_model_assigns_new_rows() -> anyhow::Result<()> {
        let assignment = assign_clusters(&two_blobs(), &config(2))?;
        let model = assignment.model(42);

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kmeans_model.json");
        model.save(&path)?;
        let model = ClusterModel::load(&path)?;

        let new_rows = FeatureMatrix::from_columns(
            vec![
                ("x".to_owned(), vec![9.5, 0.2]),
                ("y".to_owned(), vec![10.2, 0.0]),
            ],
            2,
        )?;
        let placed = model.assign(&new_rows)?;
        assert_eq!(placed[0].0, assignment.labels[3]);
        assert_eq!(placed[1].0, assignment.labels[0]);
        assert!(placed[1].1 < 1.0);

        let wrong = FeatureMatrix::from_columns(vec![("x".to_owned(), vec![1.0])], 1)?;
        assert!(matches!(
            model.assign(&wrong),
            Err(PeerStudyError::SchemaMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn test_summary_render() -> anyhow::Result<()> {
        let assignment = assign_clusters(&two_blobs(), &config(2))?;
        let summary = FitSummary::new(&assignment, Some("Silhouette peaked at k=2".to_owned()));
        let text = summary.render();

        assert!(text.starts_with("Best K: 2\nInertia: "));
        assert!(text.contains("Cluster sizes: 0=3, 1=3"));
        assert!(text.contains("Silhouette peaked at k=2"));
        Ok(())
    }
}
