use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a raw survey column takes part in the feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    /// Identity/context column, copied to the meta table
    Meta,
    /// Numeric column whose values are all 0 or 1
    Subject,
    /// Allowlisted column expanded into one indicator per category
    Categorical,
    /// Any other numeric column, passed through unchanged
    ResidualNumeric,
    /// Non-numeric column that matched no rule
    Dropped,
}

impl ColumnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Subject => "subject",
            Self::Categorical => "categorical",
            Self::ResidualNumeric => "residual-numeric",
            Self::Dropped => "dropped",
        }
    }
}

/// Result of classifying every column of a raw table once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnClassification {
    /// Allowlist order
    pub meta: Vec<String>,
    /// Table order
    pub subject: Vec<String>,
    /// Allowlist order
    pub categorical: Vec<String>,
    /// Table order
    pub residual: Vec<String>,
    /// Table order
    pub dropped: Vec<String>,
    roles: Vec<(String, ColumnRole)>,
}

impl ColumnClassification {
    /// Every input column with its role, in table order.
    pub fn roles(&self) -> &[(String, ColumnRole)] {
        &self.roles
    }

    pub fn role_of(&self, column: &str) -> Option<ColumnRole> {
        self.roles
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, role)| *role)
    }

    /// Raw columns that feed the feature matrix.
    pub fn source_column_count(&self) -> usize {
        self.subject.len() + self.categorical.len() + self.residual.len()
    }
}

pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    dtype.is_primitive_numeric() || dtype.is_bool()
}

/// Partition the columns of `df` into meta, subject, categorical, residual-numeric
/// and dropped sets.
///
/// Meta and categorical membership come from the allowlists only. Subject
/// membership is decided by the values: a numeric column qualifies when every
/// non-missing value is 0 or 1. Names listed on both allowlists are treated as
/// meta. Columns matching no rule are dropped with a warning, never an error.
pub fn classify_columns(
    df: &DataFrame,
    meta_allowlist: &[String],
    categorical_allowlist: &[String],
) -> Result<ColumnClassification> {
    let present: HashSet<&str> = df.get_columns().iter().map(|c| c.name().as_str()).collect();

    let meta: Vec<String> = unique_present(meta_allowlist, &present);
    let meta_set: HashSet<&str> = meta.iter().map(String::as_str).collect();

    let categorical: Vec<String> = unique_present(categorical_allowlist, &present)
        .into_iter()
        .filter(|name| {
            let clash = meta_set.contains(name.as_str());
            if clash {
                tracing::warn!(
                    "Column '{name}' is on both the meta and categorical allowlists; treating it as meta"
                );
            }
            !clash
        })
        .collect();
    let categorical_set: HashSet<&str> = categorical.iter().map(String::as_str).collect();

    let mut classification = ColumnClassification {
        meta: meta.clone(),
        categorical: categorical.clone(),
        ..Default::default()
    };

    for column in df.get_columns() {
        let name = column.name().as_str();
        let role = if meta_set.contains(name) {
            ColumnRole::Meta
        } else if categorical_set.contains(name) {
            ColumnRole::Categorical
        } else if is_numeric_dtype(column.dtype()) {
            if is_binary_indicator(column)? {
                classification.subject.push(name.to_owned());
                ColumnRole::Subject
            } else {
                classification.residual.push(name.to_owned());
                ColumnRole::ResidualNumeric
            }
        } else {
            classification.dropped.push(name.to_owned());
            ColumnRole::Dropped
        };
        tracing::debug!("Column '{name}' classified as {}", role.as_str());
        classification.roles.push((name.to_owned(), role));
    }

    if !classification.dropped.is_empty() {
        tracing::warn!(
            "Dropping {} column(s) that are neither meta, categorical nor numeric: {:?}",
            classification.dropped.len(),
            classification.dropped
        );
    }

    tracing::info!(
        "Classified {} columns ({} feeding features): {} meta, {} subject, {} categorical, {} residual numeric, {} dropped",
        classification.roles.len(),
        classification.source_column_count(),
        classification.meta.len(),
        classification.subject.len(),
        classification.categorical.len(),
        classification.residual.len(),
        classification.dropped.len()
    );

    Ok(classification)
}

fn unique_present(allowlist: &[String], present: &HashSet<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    allowlist
        .iter()
        .filter(|name| present.contains(name.as_str()) && seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// True when every non-missing value is 0 or 1. An all-missing column qualifies.
fn is_binary_indicator(column: &Column) -> Result<bool> {
    let values = column.as_materialized_series().cast(&DataType::Float64)?;
    let binary = values
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .all(|v| v == 0.0 || v == 1.0);
    Ok(binary)
}
