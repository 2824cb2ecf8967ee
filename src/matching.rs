//! Peer lookup for new students.
//!
//! A new survey response is re-encoded with the saved schema, standardised with
//! the saved scaler and placed at the nearest saved centroid. Students already in
//! that cluster are ranked by distance in the scaled feature space.

use crate::clustering::{CLUSTER_COLUMN, ClusterModel};
use crate::config::ArtifactPaths;
use crate::error::{PeerStudyError, Result};
use crate::features::meta::row_label;
use crate::features::{
    FeatureMatrix, FeatureSchema, StandardScaler, encode_with_schema, load_table,
};
use ndarray::{ArrayView1, Axis};
use polars::prelude::*;
use serde::Serialize;

// Raw indicator values at or above this count as "takes the subject".
const SUBJECT_PRESENT: f64 = 0.5;

#[derive(Debug, Clone, Serialize)]
pub struct PeerMatch {
    pub row_index: usize,
    pub label: String,
    pub cluster: usize,
    /// `100 / (1 + distance)`; 100 means identical answers
    pub similarity: f64,
    pub common_subjects: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentMatches {
    /// Row of the new-student table
    pub query_row: usize,
    pub cluster: usize,
    pub distance_to_centroid: f64,
    pub matches: Vec<PeerMatch>,
}

/// Everything a previous `run` saved, checked for consistency.
#[derive(Debug)]
pub struct PeerIndex {
    schema: FeatureSchema,
    scaler: StandardScaler,
    model: ClusterModel,
    scaled: FeatureMatrix,
    raw: FeatureMatrix,
    /// Meta columns of the labeled table, without the cluster label
    meta: DataFrame,
    labels: Vec<usize>,
}

impl PeerIndex {
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let schema = FeatureSchema::load(&paths.schema)?;
        let scaler = StandardScaler::load(&paths.scaler)?;
        let model = ClusterModel::load(&paths.model)?;
        let scaled = FeatureMatrix::from_dataframe(&load_table(&paths.matrix)?)?;
        let labeled = load_table(&paths.labeled)?;
        Self::new(schema, scaler, model, scaled, labeled)
    }

    pub fn new(
        schema: FeatureSchema,
        scaler: StandardScaler,
        model: ClusterModel,
        scaled: FeatureMatrix,
        labeled: DataFrame,
    ) -> Result<Self> {
        schema.validate_columns(scaled.columns())?;
        scaler.check_schema(&schema)?;
        schema.validate_columns(&model.columns)?;
        if labeled.height() != scaled.n_rows() {
            return Err(PeerStudyError::SchemaMismatch(format!(
                "labeled table has {} rows, feature matrix has {}",
                labeled.height(),
                scaled.n_rows()
            )));
        }

        let labels = labeled
            .column(CLUSTER_COLUMN)?
            .as_materialized_series()
            .cast(&DataType::UInt32)?
            .u32()?
            .into_iter()
            .enumerate()
            .map(|(row, label)| {
                label.map(|l| l as usize).ok_or_else(|| {
                    PeerStudyError::DataProcessing(format!("row {row} has no cluster label"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let meta = labeled.drop(CLUSTER_COLUMN)?;
        let raw = scaler.inverse_transform(&scaled)?;
        Ok(Self {
            schema,
            scaler,
            model,
            scaled,
            raw,
            meta,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rank existing students for every row of `new_rows`; at most `top_n` per row.
    pub fn find_peers(&self, new_rows: &DataFrame, top_n: usize) -> Result<Vec<StudentMatches>> {
        let encoded = encode_with_schema(new_rows, &self.schema)?;
        let scaled = self.scaler.transform(&encoded)?;
        let placed = self.model.assign(&scaled)?;

        let subjects: Vec<(usize, &str)> = self
            .schema
            .subject_columns
            .iter()
            .filter_map(|name| self.scaled.column_index(name).map(|idx| (idx, name.as_str())))
            .collect();

        let results = scaled
            .values()
            .axis_iter(Axis(0))
            .zip(encoded.values().axis_iter(Axis(0)))
            .zip(placed)
            .enumerate()
            .map(|(query_row, ((query, query_raw), (cluster, centroid_distance)))| {
                let mut matches: Vec<PeerMatch> = self
                    .labels
                    .iter()
                    .enumerate()
                    .filter(|(_, label)| **label == cluster)
                    .map(|(row, _)| {
                        let distance = euclidean(query, self.scaled.values().row(row));
                        PeerMatch {
                            row_index: row,
                            label: row_label(&self.meta, row),
                            cluster,
                            similarity: 100.0 / (1.0 + distance),
                            common_subjects: common_subjects(
                                &subjects,
                                query_raw,
                                self.raw.values().row(row),
                            ),
                        }
                    })
                    .collect();
                matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
                matches.truncate(top_n);

                tracing::debug!(
                    "New student {query_row} placed in cluster {cluster} with {} peers shown",
                    matches.len()
                );

                StudentMatches {
                    query_row,
                    cluster,
                    distance_to_centroid: centroid_distance,
                    matches,
                }
            })
            .collect();

        Ok(results)
    }
}

fn euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn common_subjects(
    subjects: &[(usize, &str)],
    query: ArrayView1<'_, f64>,
    peer: ArrayView1<'_, f64>,
) -> Vec<String> {
    subjects
        .iter()
        .filter(|(idx, _)| {
            query.get(*idx).is_some_and(|v| *v >= SUBJECT_PRESENT)
                && peer.get(*idx).is_some_and(|v| *v >= SUBJECT_PRESENT)
        })
        .map(|(_, name)| (*name).to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::{assign_clusters, label_meta};
    use crate::config::ClusteringConfig;
    use crate::features::{build_meta_table, classify_columns, encode_features};

    fn survey() -> anyhow::Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Column::from(Series::new(
                "student_id".into(),
                vec!["S1", "S2", "S3", "S4", "S5", "S6"],
            )),
            Column::from(Series::new("Math".into(), vec![1, 1, 1, 0, 0, 0])),
            Column::from(Series::new("Physics".into(), vec![1, 1, 0, 0, 0, 0])),
            Column::from(Series::new("English".into(), vec![0, 0, 0, 1, 1, 1])),
            Column::from(Series::new(
                "Preferred_Study_Style".into(),
                vec!["Quiet", "Quiet", "Quiet", "Mixed", "Mixed", "Mixed"],
            )),
        ])?)
    }

    fn build_index(df: &DataFrame, categorical: &[String]) -> anyhow::Result<PeerIndex> {
        let classes = classify_columns(df, &["student_id".to_owned()], categorical)?;
        let encoded = encode_features(df, &classes)?;
        let (scaler, scaled) = StandardScaler::fit_transform(&encoded.matrix)?;
        let config = ClusteringConfig {
            cluster_count: 2,
            ..Default::default()
        };
        let assignment = assign_clusters(&scaled, &config)?;
        let labeled = label_meta(&build_meta_table(df, &classes)?, &assignment)?;
        Ok(PeerIndex::new(
            encoded.schema,
            scaler,
            assignment.model(config.seed),
            scaled,
            labeled,
        )?)
    }

    fn index() -> anyhow::Result<PeerIndex> {
        build_index(&survey()?, &["Preferred_Study_Style".to_owned()])
    }

    #[test]
    fn test_new_student_matched_with_similar_peers() -> anyhow::Result<()> {
        let index = index()?;
        let newcomer = DataFrame::new(vec![
            Column::from(Series::new("Math".into(), vec![1])),
            Column::from(Series::new("Physics".into(), vec![1])),
            Column::from(Series::new("English".into(), vec![0])),
            Column::from(Series::new("Preferred_Study_Style".into(), vec!["Quiet"])),
        ])?;

        let results = index.find_peers(&newcomer, 2)?;
        assert_eq!(results.len(), 1);

        let best = &results[0].matches;
        assert_eq!(best.len(), 2);
        assert!(best[0].similarity >= best[1].similarity);
        assert!((best[0].similarity - 100.0).abs() < 1e-9);
        assert!(["S1", "S2"].contains(&best[0].label.as_str()));
        assert_eq!(best[0].common_subjects, vec!["Math", "Physics"]);
        Ok(())
    }

    #[test]
    fn test_missing_survey_column_rejected() -> anyhow::Result<()> {
        let index = index()?;
        let newcomer = DataFrame::new(vec![Column::from(Series::new("Math".into(), vec![1]))])?;
        assert!(matches!(
            index.find_peers(&newcomer, 3),
            Err(PeerStudyError::SchemaMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn test_peers_without_meta_columns_labelled_by_row() -> anyhow::Result<()> {
        let df = DataFrame::new(vec![
            Column::from(Series::new("Math".into(), vec![1, 1, 1, 0, 0, 0])),
            Column::from(Series::new("English".into(), vec![0, 0, 0, 1, 1, 1])),
        ])?;
        let index = build_index(&df, &[])?;
        let newcomer = DataFrame::new(vec![
            Column::from(Series::new("Math".into(), vec![0])),
            Column::from(Series::new("English".into(), vec![1])),
        ])?;

        let results = index.find_peers(&newcomer, 3)?;
        let mut labels: Vec<&str> = results[0]
            .matches
            .iter()
            .map(|m| m.label.as_str())
            .collect();
        labels.sort_unstable();
        assert_eq!(labels, vec!["row 3", "row 4", "row 5"]);
        Ok(())
    }
}
