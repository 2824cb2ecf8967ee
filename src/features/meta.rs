use super::classify::ColumnClassification;
use crate::error::Result;
use polars::prelude::*;

pub const ROW_INDEX_COLUMN: &str = "row_index";

/// Build the meta table: `row_index` followed by the meta columns present.
///
/// Row `i` of the result describes the same student as row `i` of the feature
/// matrix. Without meta columns only `row_index` is produced.
pub fn build_meta_table(df: &DataFrame, classes: &ColumnClassification) -> Result<DataFrame> {
    let row_index: Vec<u32> = (0..df.height())
        .map(|i| u32::try_from(i).unwrap_or(u32::MAX))
        .collect();

    let mut columns = vec![Column::from(Series::new(ROW_INDEX_COLUMN.into(), row_index))];
    for name in &classes.meta {
        if name == ROW_INDEX_COLUMN {
            tracing::warn!("Meta column '{ROW_INDEX_COLUMN}' is replaced by the synthetic row index");
            continue;
        }
        columns.push(df.column(name)?.clone());
    }

    if classes.meta.is_empty() {
        tracing::info!("No meta columns present; meta table carries only '{ROW_INDEX_COLUMN}'");
    }

    Ok(DataFrame::new(columns)?)
}

/// Human-readable label for a meta row: the first meta column's value, else the row index.
pub fn row_label(meta: &DataFrame, row: usize) -> String {
    meta.get_columns()
        .iter()
        .find(|c| c.name().as_str() != ROW_INDEX_COLUMN)
        .and_then(|c| c.get(row).ok())
        .filter(|v| !v.is_null())
        .map_or_else(|| format!("row {row}"), |v| v.str_value().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::classify::classify_columns;

    #[test]
    fn test_meta_table_keeps_identity_columns() -> anyhow::Result<()> {
        let df = DataFrame::new(vec![
            Column::from(Series::new("Math".into(), vec![1, 0, 1])),
            Column::from(Series::new("student_id".into(), vec!["s1", "s2", "s3"])),
        ])?;
        let classes = classify_columns(&df, &["student_id".to_owned()], &[])?;
        let meta = build_meta_table(&df, &classes)?;

        let names: Vec<String> = meta.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["row_index", "student_id"]);
        assert_eq!(meta.height(), 3);
        assert_eq!(row_label(&meta, 1), "s2");
        Ok(())
    }

    #[test]
    fn test_synthetic_row_index_only() -> anyhow::Result<()> {
        let df = DataFrame::new(vec![Column::from(Series::new("Math".into(), vec![1, 0]))])?;
        let classes = classify_columns(&df, &["student_id".to_owned()], &[])?;
        let meta = build_meta_table(&df, &classes)?;

        assert_eq!(meta.width(), 1);
        let index: Vec<u32> = meta
            .column(ROW_INDEX_COLUMN)?
            .as_materialized_series()
            .u32()?
            .into_no_null_iter()
            .collect();
        assert_eq!(index, vec![0, 1]);
        assert_eq!(row_label(&meta, 1), "row 1");
        Ok(())
    }
}
