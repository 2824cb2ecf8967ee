use crate::error::{PeerStudyError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use polars::prelude::*;

/// Numeric matrix with named, ordered columns. Rows line up with the meta table.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(PeerStudyError::DataProcessing(format!(
                "{} column names given for a matrix with {} columns",
                columns.len(),
                values.ncols()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Assemble a matrix from column-major data. Every column must hold `n_rows` values.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>, n_rows: usize) -> Result<Self> {
        let mut values = Array2::zeros((n_rows, columns.len()));
        let mut names = Vec::with_capacity(columns.len());
        for ((name, data), mut target) in columns.into_iter().zip(values.axis_iter_mut(Axis(1))) {
            if data.len() != n_rows {
                return Err(PeerStudyError::DataProcessing(format!(
                    "column '{name}' has {} values, expected {n_rows}",
                    data.len()
                )));
            }
            target.assign(&ArrayView1::from(data.as_slice()));
            names.push(name);
        }
        Self::new(names, values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name)
            .map(|idx| self.values.index_axis(Axis(1), idx))
    }

    /// Read a fully numeric table back, e.g. a previously written `X.csv`.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let name = column.name().to_string();
            let series = column.as_materialized_series().cast(&DataType::Float64)?;
            let data = series
                .f64()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.ok_or_else(|| {
                        PeerStudyError::DataProcessing(format!(
                            "missing value in feature column '{name}' at row {row}"
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            columns.push((name, data));
        }
        Self::from_columns(columns, df.height())
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns = self
            .columns
            .iter()
            .zip(self.values.axis_iter(Axis(1)))
            .map(|(name, data)| Column::from(Series::new(name.as_str().into(), data.to_vec())))
            .collect::<Vec<_>>();
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_columns_layout() -> anyhow::Result<()> {
        let matrix = FeatureMatrix::from_columns(
            vec![
                ("a".to_owned(), vec![1.0, 2.0, 3.0]),
                ("b".to_owned(), vec![4.0, 5.0, 6.0]),
            ],
            3,
        )?;
        assert_eq!(matrix.n_rows(), 3);
        assert_eq!(matrix.n_cols(), 2);
        assert_eq!(matrix.values()[[1, 0]], 2.0);
        assert_eq!(matrix.values()[[2, 1]], 6.0);
        assert_eq!(matrix.column("b").unwrap().to_vec(), vec![4.0, 5.0, 6.0]);
        Ok(())
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = FeatureMatrix::from_columns(
            vec![
                ("a".to_owned(), vec![1.0, 2.0]),
                ("b".to_owned(), vec![4.0]),
            ],
            2,
        );
        assert!(matches!(result, Err(PeerStudyError::DataProcessing(_))));
    }

    #[test]
    fn test_dataframe_conversion_keeps_order() -> anyhow::Result<()> {
        let df = DataFrame::new(vec![
            Column::from(Series::new("z".into(), vec![1, 0])),
            Column::from(Series::new("a".into(), vec![0.5, -0.5])),
        ])?;
        let matrix = FeatureMatrix::from_dataframe(&df)?;
        assert_eq!(matrix.columns(), &["z".to_owned(), "a".to_owned()]);

        let back = matrix.to_dataframe()?;
        let names: Vec<String> = back
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["z", "a"]);
        assert_eq!(back.height(), 2);
        Ok(())
    }

    #[test]
    fn test_nulls_rejected_when_reading_features() -> anyhow::Result<()> {
        let df = DataFrame::new(vec![Column::from(Series::new(
            "a".into(),
            vec![Some(1.0), None],
        ))])?;
        assert!(FeatureMatrix::from_dataframe(&df).is_err());
        Ok(())
    }
}
