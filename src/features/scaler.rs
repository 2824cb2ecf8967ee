use super::matrix::FeatureMatrix;
use super::schema::FeatureSchema;
use crate::error::{PeerStudyError, Result, ResultExt as _};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Relative to the column mean; below this a column is treated as constant.
const ZERO_VARIANCE_TOLERANCE: f64 = 1e-12;

/// Per-column standardisation `(x - mean) / std` with population std.
///
/// The fitted state remembers the columns it was fitted on and refuses to
/// transform anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    pub n_samples: usize,
}

impl StandardScaler {
    pub fn fit(matrix: &FeatureMatrix) -> Result<Self> {
        if matrix.n_rows() == 0 {
            return Err(PeerStudyError::DegenerateFit(
                "cannot fit scaler on a matrix with zero rows".to_owned(),
            ));
        }
        if matrix.n_cols() == 0 {
            return Err(PeerStudyError::DegenerateFit(
                "cannot fit scaler on a matrix with no columns".to_owned(),
            ));
        }

        let values = matrix.values();
        let mean = values.mean_axis(Axis(0)).ok_or_else(|| {
            PeerStudyError::DegenerateFit("column means are undefined".to_owned())
        })?;
        let std = values.std_axis(Axis(0), 0.0);

        if let Some((name, _)) = matrix
            .columns()
            .iter()
            .zip(mean.iter().zip(std.iter()))
            .find(|(_, (m, s))| !m.is_finite() || !s.is_finite())
        {
            return Err(PeerStudyError::DegenerateFit(format!(
                "column '{name}' has non-finite statistics"
            )));
        }

        Ok(Self {
            columns: matrix.columns().to_vec(),
            mean: mean.to_vec(),
            std: std.to_vec(),
            n_samples: matrix.n_rows(),
        })
    }

    pub fn fit_transform(matrix: &FeatureMatrix) -> Result<(Self, FeatureMatrix)> {
        let scaler = Self::fit(matrix)?;
        let scaled = scaler.transform(matrix)?;
        Ok((scaler, scaled))
    }

    /// Standardise `matrix`. Constant columns map to zero.
    pub fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        self.ensure_columns(matrix.columns())?;

        let mut values = matrix.values().to_owned();
        for ((mut column, &mean), &std) in values
            .axis_iter_mut(Axis(1))
            .zip(&self.mean)
            .zip(&self.std)
        {
            if is_zero_variance(mean, std) {
                column.fill(0.0);
            } else {
                column.mapv_inplace(|x| (x - mean) / std);
            }
        }
        FeatureMatrix::new(self.columns.clone(), values)
    }

    /// Map standardised values back to the original units. Constant columns
    /// come back as their mean.
    pub fn inverse_transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        self.ensure_columns(matrix.columns())?;

        let mut values = matrix.values().to_owned();
        for ((mut column, &mean), &std) in values
            .axis_iter_mut(Axis(1))
            .zip(&self.mean)
            .zip(&self.std)
        {
            if is_zero_variance(mean, std) {
                column.fill(mean);
            } else {
                column.mapv_inplace(|x| x * std + mean);
            }
        }
        FeatureMatrix::new(self.columns.clone(), values)
    }

    /// Confirm this scaler was fitted on the columns the schema records.
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<()> {
        schema.validate_columns(&self.columns)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write scaler: {}", path.display()))?;
        tracing::info!("Saved scaler to: {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler: {}", path.display()))?;
        let scaler: Self = serde_json::from_str(&content)?;
        if scaler.mean.len() != scaler.columns.len() || scaler.std.len() != scaler.columns.len() {
            return Err(PeerStudyError::Config(format!(
                "scaler file {} has {} columns but {} means and {} deviations",
                path.display(),
                scaler.columns.len(),
                scaler.mean.len(),
                scaler.std.len()
            )));
        }
        Ok(scaler)
    }

    fn ensure_columns(&self, columns: &[String]) -> Result<()> {
        if columns == self.columns.as_slice() {
            return Ok(());
        }
        Err(PeerStudyError::SchemaMismatch(format!(
            "scaler was fitted on {} columns {:?}, matrix has {} columns {:?}",
            self.columns.len(),
            preview(&self.columns),
            columns.len(),
            preview(columns)
        )))
    }
}

fn is_zero_variance(mean: f64, std: f64) -> bool {
    std <= ZERO_VARIANCE_TOLERANCE * mean.abs().max(1.0)
}

fn preview(columns: &[String]) -> &[String] {
    columns.get(..5).unwrap_or(columns)
}
