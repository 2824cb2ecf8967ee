//! End-to-end runs over the survey: preprocessing, clustering and peer lookup.
//!
//! Each entry point takes an explicit [`PipelineConfig`]; there is no ambient
//! state. Artifacts land in `config.output_dir` under the names listed in
//! [`crate::config`].
//!
//! # Example
//!
//! ```no_run
//! use peer_study::config::PipelineConfig;
//! use peer_study::pipeline;
//!
//! let mut config = PipelineConfig::default();
//! config.input_path = "survey.csv".into();
//! config.clustering.cluster_count = 4;
//!
//! let report = pipeline::run(&config)?;
//! println!("{}", report.summary());
//! # Ok::<(), peer_study::error::PeerStudyError>(())
//! ```

use crate::clustering::{ClusterAssignment, FitSummary, assign_clusters, label_meta};
use crate::config::PipelineConfig;
use crate::error::{PeerStudyError, Result};
use crate::features::{
    ColumnClassification, FeatureMatrix, FeatureSchema, StandardScaler, build_meta_table,
    classify_columns, encode_features, load_table, save_table,
};
use crate::matching::{PeerIndex, StudentMatches};
use polars::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};

/// In-memory results of preprocessing, after the artifacts were written.
#[derive(Debug)]
pub struct Preprocessed {
    pub classification: ColumnClassification,
    pub schema: FeatureSchema,
    pub scaler: StandardScaler,
    pub scaled: FeatureMatrix,
    pub meta: DataFrame,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub rows: usize,
    pub input_columns: usize,
    pub feature_columns: usize,
    pub dropped_columns: Vec<String>,
    pub cluster_count: Option<usize>,
    pub inertia: Option<f64>,
    pub duration: Duration,
}

impl RunReport {
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Preprocessing completed. Rows: {}, input columns: {}, features: {}",
            self.rows, self.input_columns, self.feature_columns
        );
        if !self.dropped_columns.is_empty() {
            out.push_str(&format!(", dropped: {:?}", self.dropped_columns));
        }
        if let (Some(k), Some(inertia)) = (self.cluster_count, self.inertia) {
            out.push_str(&format!(". Clustered with k={k}, inertia {inertia:.4}"));
        }
        out.push_str(&format!(" ({:.2}s)", self.duration.as_secs_f64()));
        out
    }
}

/// Classify, encode and scale the raw survey, writing schema, scaler, scaled
/// matrix and meta table.
pub fn preprocess(config: &PipelineConfig) -> Result<(Preprocessed, RunReport)> {
    let start = Instant::now();
    config.validate()?;

    let raw = load_table(&config.input_path)?;
    let input_columns = raw.width();

    let classification =
        classify_columns(&raw, &config.meta_columns, &config.categorical_columns)?;
    let encoded = encode_features(&raw, &classification)?;
    let mut meta = build_meta_table(&raw, &classification)?;

    // Fit before writing anything so a degenerate table leaves no artifacts behind.
    let (scaler, scaled) = StandardScaler::fit_transform(&encoded.matrix)?;

    let paths = config.artifacts();
    std::fs::create_dir_all(&config.output_dir)?;
    encoded.schema.save(&paths.schema)?;
    scaler.save(&paths.scaler)?;
    save_table(&mut scaled.to_dataframe()?, &paths.matrix)?;
    save_table(&mut meta, &paths.meta)?;

    let report = RunReport {
        rows: scaled.n_rows(),
        input_columns,
        feature_columns: scaled.n_cols(),
        dropped_columns: classification.dropped.clone(),
        cluster_count: None,
        inertia: None,
        duration: start.elapsed(),
    };
    tracing::info!("{}", report.summary());

    Ok((
        Preprocessed {
            classification,
            schema: encoded.schema,
            scaler,
            scaled,
            meta,
        },
        report,
    ))
}

/// Cluster a previously written scaled matrix and label its meta table.
pub fn train(config: &PipelineConfig) -> Result<(ClusterAssignment, RunReport)> {
    let start = Instant::now();
    config.validate()?;
    let paths = config.artifacts();

    let scaled = FeatureMatrix::from_dataframe(&load_table(&paths.matrix)?)?;
    if paths.schema.exists() {
        FeatureSchema::load(&paths.schema)?.validate_columns(scaled.columns())?;
    } else {
        tracing::warn!(
            "No feature schema at {}; clustering {} without a column check",
            paths.schema.display(),
            paths.matrix.display()
        );
    }
    let meta = load_table(&paths.meta)?;

    let assignment = cluster_and_save(config, &scaled, &meta)?;
    let report = RunReport {
        rows: scaled.n_rows(),
        input_columns: scaled.n_cols(),
        feature_columns: scaled.n_cols(),
        dropped_columns: Vec::new(),
        cluster_count: Some(assignment.k),
        inertia: Some(assignment.inertia),
        duration: start.elapsed(),
    };
    Ok((assignment, report))
}

/// Preprocess and cluster in one pass.
pub fn run(config: &PipelineConfig) -> Result<RunReport> {
    let start = Instant::now();
    let (prepared, mut report) = preprocess(config)?;
    let assignment = cluster_and_save(config, &prepared.scaled, &prepared.meta)?;

    report.cluster_count = Some(assignment.k);
    report.inertia = Some(assignment.inertia);
    report.duration = start.elapsed();
    Ok(report)
}

/// Find peers for every row of a new-student table using the saved artifacts.
pub fn match_students(config: &PipelineConfig, students: &Path) -> Result<Vec<StudentMatches>> {
    config.validate()?;
    let index = PeerIndex::load(&config.artifacts())?;
    let new_rows = load_table(students)?;
    if new_rows.height() == 0 {
        return Err(PeerStudyError::DataProcessing(format!(
            "{} contains no students to match",
            students.display()
        )));
    }
    index.find_peers(&new_rows, config.matching.max_matches)
}

fn cluster_and_save(
    config: &PipelineConfig,
    scaled: &FeatureMatrix,
    meta: &DataFrame,
) -> Result<ClusterAssignment> {
    if meta.height() != scaled.n_rows() {
        return Err(PeerStudyError::SchemaMismatch(format!(
            "meta table has {} rows, feature matrix has {}",
            meta.height(),
            scaled.n_rows()
        )));
    }

    let paths = config.artifacts();
    let assignment = assign_clusters(scaled, &config.clustering)?;

    let mut labeled = label_meta(meta, &assignment)?;
    save_table(&mut labeled, &paths.labeled)?;
    assignment.model(config.clustering.seed).save(&paths.model)?;
    FitSummary::new(&assignment, config.clustering.note.clone()).save(&paths.summary)?;

    Ok(assignment)
}
