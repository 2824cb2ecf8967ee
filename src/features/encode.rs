use super::classify::ColumnClassification;
use super::matrix::FeatureMatrix;
use super::schema::{FeatureSchema, FeatureSource, MISSING_CATEGORY};
use crate::error::{PeerStudyError, Result};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct EncodedFeatures {
    pub matrix: FeatureMatrix,
    pub schema: FeatureSchema,
}

/// Build the feature matrix for a freshly classified table and record its schema.
///
/// Column order: subject columns, then one indicator per category of each
/// categorical column (categories sorted lexically, missing values become
/// `MISSING`), then residual numeric columns. Remaining missing values are
/// filled with zero. Every input row is kept.
pub fn encode_features(df: &DataFrame, classes: &ColumnClassification) -> Result<EncodedFeatures> {
    let mut builder = MatrixBuilder::new(df.height());
    let mut categories = BTreeMap::new();

    for name in &classes.subject {
        builder.push(name.clone(), numeric_values(df, name)?)?;
    }

    for name in &classes.categorical {
        let values = category_values(df, name)?;
        let levels: BTreeSet<&str> = values.iter().map(String::as_str).collect();
        tracing::debug!("Expanding '{name}' into {} indicator columns", levels.len());
        for &level in &levels {
            builder.push(
                FeatureSchema::indicator_name(name, level),
                indicator(&values, level),
            )?;
        }
        categories.insert(
            name.clone(),
            levels.into_iter().map(str::to_owned).collect(),
        );
    }

    for name in &classes.residual {
        builder.push(name.clone(), numeric_values(df, name)?)?;
    }

    let matrix = builder.finish()?;
    let schema = FeatureSchema {
        columns_order: matrix.columns().to_vec(),
        subject_columns: classes.subject.clone(),
        categorical_columns_used: classes.categorical.clone(),
        residual_columns: classes.residual.clone(),
        categories,
    };

    tracing::info!(
        "Encoded {} rows into {} feature columns",
        matrix.n_rows(),
        matrix.n_cols()
    );

    Ok(EncodedFeatures { matrix, schema })
}

/// Re-encode a table against a recorded schema.
///
/// Output columns follow `schema.columns_order` exactly, and each column's
/// role comes from the schema rather than from its name. Categories come from
/// the schema; values never seen when the schema was recorded produce an
/// all-zero indicator row for that column.
pub fn encode_with_schema(df: &DataFrame, schema: &FeatureSchema) -> Result<FeatureMatrix> {
    let sources = schema.feature_sources()?;

    let mut seen = HashSet::new();
    let missing: Vec<&str> = sources
        .iter()
        .map(FeatureSource::raw_column)
        .filter(|name| seen.insert(*name) && df.column(name).is_err())
        .collect();
    if !missing.is_empty() {
        return Err(PeerStudyError::SchemaMismatch(format!(
            "input table lacks columns required by the schema: {missing:?}"
        )));
    }

    let mut categories: HashMap<&str, Vec<String>> = HashMap::new();
    for (name, _) in schema.categories.iter().filter(|(_, levels)| !levels.is_empty()) {
        let values = category_values(df, name)?;
        let known: HashSet<&str> = schema.category_levels(name).into_iter().collect();
        let unseen: BTreeSet<&str> = values
            .iter()
            .map(String::as_str)
            .filter(|v| !known.contains(v))
            .collect();
        if !unseen.is_empty() {
            tracing::warn!(
                "Column '{name}' has categories not present in the schema, encoded as all zeros: {unseen:?}"
            );
        }
        categories.insert(name.as_str(), values);
    }

    let mut builder = MatrixBuilder::new(df.height());
    for (name, source) in schema.columns_order.iter().zip(sources) {
        let data = match source {
            FeatureSource::Numeric(column) => numeric_values(df, column)?,
            FeatureSource::Indicator { column, category } => {
                let values = categories.get(column).ok_or_else(|| {
                    PeerStudyError::SchemaMismatch(format!(
                        "no values for categorical column '{column}'"
                    ))
                })?;
                indicator(values, category)
            }
        };
        builder.push(name.clone(), data)?;
    }
    builder.finish()
}

fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let values = series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(0.0))
        .collect();
    Ok(values)
}

fn category_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let text = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let values = text
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or(MISSING_CATEGORY).to_owned())
        .collect();
    Ok(values)
}

fn indicator(values: &[String], category: &str) -> Vec<f64> {
    values
        .iter()
        .map(|v| if v == category { 1.0 } else { 0.0 })
        .collect()
}

struct MatrixBuilder {
    n_rows: usize,
    seen: HashSet<String>,
    columns: Vec<(String, Vec<f64>)>,
}

impl MatrixBuilder {
    fn new(n_rows: usize) -> Self {
        Self {
            n_rows,
            seen: HashSet::new(),
            columns: Vec::new(),
        }
    }

    fn push(&mut self, name: String, data: Vec<f64>) -> Result<()> {
        if !self.seen.insert(name.clone()) {
            return Err(PeerStudyError::DataProcessing(format!(
                "feature column '{name}' would appear twice in the matrix"
            )));
        }
        self.columns.push((name, data));
        Ok(())
    }

    fn finish(self) -> Result<FeatureMatrix> {
        FeatureMatrix::from_columns(self.columns, self.n_rows)
    }
}
