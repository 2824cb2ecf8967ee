//! # peer-study - survey feature engineering and study-group clustering
//!
//! peer-study turns a tabular student survey into a reproducible, scaled
//! numeric feature matrix and groups students into clusters of likely study
//! partners.
//!
//! ## Quick Start
//!
//! ```no_run
//! use peer_study::config::PipelineConfig;
//! use peer_study::pipeline;
//!
//! let mut config = PipelineConfig::default();
//! config.input_path = "peer_study_dataset.csv".into();
//! config.output_dir = "output".into();
//!
//! let report = pipeline::run(&config)?;
//! println!("{}", report.summary());
//! # Ok::<(), peer_study::error::PeerStudyError>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`features`]: column classification, encoding, schema and scaler
//! - [`clustering`]: K-means over the scaled matrix (via `linfa-clustering`)
//! - [`matching`]: peer lookup for new students against saved artifacts
//! - [`pipeline`]: end-to-end runs writing every artifact
//! - [`config`]: the explicit configuration passed into every run
//! - [`error`]: error types and handling utilities
//! - [`logging`]: console and rotating-file logging for the binary
//!
//! ## Reproducibility
//!
//! Encoding is driven by a [`features::FeatureSchema`] recorded on the first
//! run. Later tables are re-encoded against that schema, never re-classified,
//! so the saved [`features::StandardScaler`] and cluster model always see the
//! columns they were fitted on. Applying them to anything else fails with
//! [`error::PeerStudyError::SchemaMismatch`].

#![warn(clippy::all, rust_2018_idioms)]

pub mod clustering;
pub mod config;
pub mod error;
pub mod features;
pub mod logging;
pub mod matching;
pub mod pipeline;
