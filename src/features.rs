//! Feature engineering for survey tables.
//!
//! Turns a raw survey [`DataFrame`](polars::prelude::DataFrame) into a
//! fixed-order numeric matrix:
//!
//! ```text
//! raw table ─> classify_columns ─> encode_features ─> FeatureSchema (saved)
//!                                        │
//!                                        └─> StandardScaler::fit_transform ─> scaled matrix
//! ```
//!
//! - [`classify`]: assigns each column a [`ColumnRole`] once.
//! - [`encode`]: builds the matrix (subjects, one-hot categoricals, residual numerics)
//!   and re-encodes later tables against a saved schema.
//! - [`schema`]: the persisted column order.
//! - [`scaler`]: standardisation that can be saved and reapplied without refitting.
//! - [`meta`]: identity columns kept row-aligned with the matrix.
//! - [`io`]: table loading and saving.

pub mod classify;
pub mod encode;
pub mod io;
pub mod matrix;
pub mod meta;
pub mod scaler;
pub mod schema;

pub use classify::{ColumnClassification, ColumnRole, classify_columns};
pub use encode::{EncodedFeatures, encode_features, encode_with_schema};
pub use io::{load_table, save_table};
pub use matrix::FeatureMatrix;
pub use meta::{ROW_INDEX_COLUMN, build_meta_table};
pub use scaler::StandardScaler;
pub use schema::{CATEGORY_SEPARATOR, FeatureSchema, FeatureSource, MISSING_CATEGORY};

#[cfg(test)]
mod tests;
