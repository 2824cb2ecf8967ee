//! Feature schema: the recorded column order of the encoded matrix.
//!
//! The schema is written next to the scaler and is the contract between the
//! first encoding run and every later re-encoding. Roles and category levels
//! are never re-derived from new data or from column names; they are read back
//! from the recorded lists.

use crate::error::{PeerStudyError, Result, ResultExt as _};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Separator between a categorical column name and one of its categories.
pub const CATEGORY_SEPARATOR: &str = "__";

/// Category used for missing values of a categorical column.
pub const MISSING_CATEGORY: &str = "MISSING";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub columns_order: Vec<String>,
    pub subject_columns: Vec<String>,
    pub categorical_columns_used: Vec<String>,
    #[serde(default)]
    pub residual_columns: Vec<String>,
    /// Levels of each categorical column, in matrix order
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
}

/// Where one column of the encoded matrix comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSource<'a> {
    /// Subject or residual column copied from the raw column of the same name
    Numeric(&'a str),
    /// Indicator of `column == category`
    Indicator { column: &'a str, category: &'a str },
}

impl<'a> FeatureSource<'a> {
    /// Raw column the value is read from.
    pub fn raw_column(&self) -> &'a str {
        match *self {
            Self::Numeric(name) => name,
            Self::Indicator { column, .. } => column,
        }
    }
}

impl FeatureSchema {
    pub fn indicator_name(column: &str, category: &str) -> String {
        format!("{column}{CATEGORY_SEPARATOR}{category}")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feature schema: {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write feature schema: {}", path.display()))?;
        tracing::info!("Saved feature schema: {}", path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.columns_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns_order.is_empty()
    }

    /// Categories recorded for `column`, in matrix order.
    pub fn category_levels(&self, column: &str) -> Vec<&str> {
        self.categories
            .get(column)
            .map(|levels| levels.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Source of every column in `columns_order`, taken from the recorded roles.
    pub fn feature_sources(&self) -> Result<Vec<FeatureSource<'_>>> {
        let indicators: HashMap<String, (&str, &str)> = self
            .categories
            .iter()
            .flat_map(|(column, levels)| {
                levels.iter().map(move |level| {
                    (
                        Self::indicator_name(column, level),
                        (column.as_str(), level.as_str()),
                    )
                })
            })
            .collect();

        self.columns_order
            .iter()
            .map(|name| {
                if self.subject_columns.contains(name) || self.residual_columns.contains(name) {
                    Ok(FeatureSource::Numeric(name.as_str()))
                } else if let Some(&(column, category)) = indicators.get(name) {
                    Ok(FeatureSource::Indicator { column, category })
                } else {
                    Err(PeerStudyError::SchemaMismatch(format!(
                        "column '{name}' has no recorded source in the schema"
                    )))
                }
            })
            .collect()
    }

    /// Reject any column list that differs from `columns_order` in count or order.
    pub fn validate_columns(&self, columns: &[String]) -> Result<()> {
        if columns.len() != self.columns_order.len() {
            return Err(PeerStudyError::SchemaMismatch(format!(
                "expected {} columns, found {}",
                self.columns_order.len(),
                columns.len()
            )));
        }
        if let Some((idx, (expected, found))) = self
            .columns_order
            .iter()
            .zip(columns)
            .enumerate()
            .find(|(_, (expected, found))| expected != found)
        {
            return Err(PeerStudyError::SchemaMismatch(format!(
                "column {idx} is '{found}', schema expects '{expected}'"
            )));
        }
        Ok(())
    }
}
