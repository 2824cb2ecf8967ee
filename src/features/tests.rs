use super::*;
use anyhow::Result;
use polars::prelude::*;

fn survey() -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::from(Series::new(
            "student_id".into(),
            vec!["S001", "S002", "S003", "S004"],
        )),
        Column::from(Series::new(
            "Year_of_Study".into(),
            vec!["1st", "2nd", "2nd", "1st"],
        )),
        Column::from(Series::new("Math".into(), vec![1, 0, 1, 1])),
        Column::from(Series::new("Physics".into(), vec![0, 0, 1, 1])),
        Column::from(Series::new("English".into(), vec![1, 1, 0, 0])),
    ])?)
}

fn allowlists() -> (Vec<String>, Vec<String>) {
    (
        vec!["student_id".to_owned(), "Name".to_owned()],
        vec!["Year_of_Study".to_owned(), "Branch".to_owned()],
    )
}

#[test]
fn test_survey_end_to_end_features() -> Result<()> {
    let df = survey()?;
    let (meta_cols, cat_cols) = allowlists();

    let classes = classify_columns(&df, &meta_cols, &cat_cols)?;
    let encoded = encode_features(&df, &classes)?;
    let meta = build_meta_table(&df, &classes)?;
    let (_, scaled) = StandardScaler::fit_transform(&encoded.matrix)?;

    let meta_names: Vec<String> = meta.get_column_names().iter().map(|s| s.to_string()).collect();
    assert_eq!(meta_names, vec!["row_index", "student_id"]);
    assert_eq!(encoded.schema.subject_columns, vec!["Math", "Physics", "English"]);
    assert_eq!(encoded.schema.categorical_columns_used, vec!["Year_of_Study"]);
    assert_eq!(
        encoded.schema.columns_order,
        vec![
            "Math",
            "Physics",
            "English",
            "Year_of_Study__1st",
            "Year_of_Study__2nd"
        ]
    );
    assert_eq!(scaled.n_cols(), 5);
    assert_eq!(scaled.n_rows(), df.height());
    assert_eq!(meta.height(), df.height());
    Ok(())
}

#[test]
fn test_column_count_formula() -> Result<()> {
    let df = DataFrame::new(vec![
        Column::from(Series::new("Math".into(), vec![1, 0, 1])),
        Column::from(Series::new("Branch".into(), vec![Some("CSE"), None, Some("ECE")])),
        Column::from(Series::new(
            "Preferred_Study_Style".into(),
            vec!["Quiet", "Quiet", "Mixed"],
        )),
        Column::from(Series::new("Hours".into(), vec![2.0, 3.0, 9.0])),
        Column::from(Series::new("Notes".into(), vec!["a", "b", "c"])),
    ])?;
    let categorical = vec!["Branch".to_owned(), "Preferred_Study_Style".to_owned()];

    let classes = classify_columns(&df, &[], &categorical)?;
    let encoded = encode_features(&df, &classes)?;

    // 1 subject + (3 branch + 2 style) categories + 1 residual
    assert_eq!(encoded.matrix.n_cols(), 7);
    assert_eq!(encoded.schema.len(), encoded.matrix.n_cols());
    assert_eq!(classes.dropped, vec!["Notes"]);
    Ok(())
}

#[test]
fn test_all_missing_rows_are_kept() -> Result<()> {
    let df = DataFrame::new(vec![
        Column::from(Series::new("Math".into(), vec![Some(1), None, Some(0)])),
        Column::from(Series::new("Hours".into(), vec![Some(2.0), None, Some(5.0)])),
    ])?;

    let classes = classify_columns(&df, &[], &[])?;
    let encoded = encode_features(&df, &classes)?;
    let meta = build_meta_table(&df, &classes)?;

    assert_eq!(encoded.matrix.n_rows(), 3);
    assert_eq!(meta.height(), 3);
    assert_eq!(encoded.matrix.values().row(1).to_vec(), vec![0.0, 0.0]);
    Ok(())
}

#[test]
fn test_reencoding_matches_first_run() -> Result<()> {
    let df = survey()?;
    let (meta_cols, cat_cols) = allowlists();

    let classes = classify_columns(&df, &meta_cols, &cat_cols)?;
    let encoded = encode_features(&df, &classes)?;
    let (scaler, scaled) = StandardScaler::fit_transform(&encoded.matrix)?;

    let again = encode_with_schema(&df, &encoded.schema)?;
    assert_eq!(again, encoded.matrix);
    assert_eq!(scaler.transform(&again)?, scaled);
    Ok(())
}
