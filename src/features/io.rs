use crate::error::{PeerStudyError, Result, ResultExt as _};
use polars::prelude::*;
use std::path::Path;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Load a table from CSV, JSON or Parquet, chosen by file extension.
///
/// A missing file is reported as [`PeerStudyError::InputMissing`] before any
/// reading starts.
pub fn load_table(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PeerStudyError::InputMissing(path.display().to_string()));
    }

    let ext = extension(path);
    let df = match ext.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10000))
            .with_has_header(true)
            .finish()?
            .collect()
            .context("Failed to read CSV")?,
        "parquet" => ParquetReader::new(std::fs::File::open(path)?)
            .finish()
            .context("Failed to read Parquet")?,
        "json" => JsonReader::new(std::fs::File::open(path)?)
            .finish()
            .context("Failed to read JSON")?,
        _ => {
            return Err(PeerStudyError::DataProcessing(format!(
                "Unsupported file extension: {ext}"
            )));
        }
    };

    tracing::info!(
        "Loaded {}: {} rows, {} columns",
        path.display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

/// Write a table as Parquet when the extension says so, CSV otherwise.
pub fn save_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    match extension(path).as_str() {
        "parquet" => {
            let file = std::fs::File::create(path).context("Failed to create Parquet file")?;
            ParquetWriter::new(file)
                .finish(df)
                .context("Failed to write Parquet file")?;
        }
        _ => {
            let file = std::fs::File::create(path).context("Failed to create CSV file")?;
            CsvWriter::new(file)
                .include_header(true)
                .finish(df)
                .context("Failed to write CSV file")?;
        }
    }

    tracing::info!("Saved {} rows to: {}", df.height(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_is_reported() {
        let result = load_table(Path::new("does/not/exist.csv"));
        assert!(matches!(result, Err(PeerStudyError::InputMissing(_))));
    }

    #[test]
    fn test_unsupported_extension() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("survey.xlsx");
        std::fs::write(&path, "not a table")?;
        assert!(matches!(
            load_table(&path),
            Err(PeerStudyError::DataProcessing(_))
        ));
        Ok(())
    }

    #[test]
    fn test_csv_round_trip_keeps_column_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("table.csv");
        let mut df = DataFrame::new(vec![
            Column::from(Series::new("b".into(), vec![1, 0])),
            Column::from(Series::new("a".into(), vec!["x", "y"])),
        ])?;
        save_table(&mut df, &path)?;

        let loaded = load_table(&path)?;
        let names: Vec<String> = loaded.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(loaded.height(), 2);
        Ok(())
    }
}
