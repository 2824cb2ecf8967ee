use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use peer_study::config::PipelineConfig;
use peer_study::pipeline;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "peer-study",
    about = "Encode a student survey and group students into study clusters"
)]
pub struct Cli {
    /// JSON configuration file. Command-line flags override its values.
    #[arg(short, long, global = true, env = "PEER_STUDY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for log files. Defaults to the platform data directory.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default)]
pub struct PipelineArgs {
    /// Raw survey file (CSV, JSON or Parquet)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory for the generated artifacts
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Number of clusters
    #[arg(short = 'k', long)]
    clusters: Option<usize>,

    /// Random seed for K-means initialisation
    #[arg(long)]
    seed: Option<u64>,

    /// Comma-separated identity columns kept out of the features
    #[arg(long, value_delimiter = ',')]
    meta_columns: Option<Vec<String>>,

    /// Comma-separated columns to one-hot encode
    #[arg(long, value_delimiter = ',')]
    categorical_columns: Option<Vec<String>>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify, encode and scale the survey; write schema, scaler, matrix and meta table
    Preprocess(PipelineArgs),
    /// Cluster a previously preprocessed matrix and write the labeled table
    Train(PipelineArgs),
    /// Preprocess and train in one go
    Run(PipelineArgs),
    /// Suggest study partners for new survey responses using saved artifacts
    Match {
        /// Survey rows for the new students
        #[arg(short, long)]
        students: PathBuf,

        /// Directory holding the artifacts of a previous run
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Maximum number of peers per student
        #[arg(long)]
        top: Option<usize>,

        /// Print matches as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the default configuration to a file
    InitConfig {
        #[arg(short, long, default_value = "peer-study.json")]
        output: PathBuf,
    },
}

pub fn run_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Preprocess(args) => {
            let config = resolve_config(config_path, &args)?;
            let (_, report) = pipeline::preprocess(&config)?;
            println!("{}", report.summary());
            println!("Artifacts written to {}", config.output_dir.display());
        }
        Commands::Train(args) => {
            let config = resolve_config(config_path, &args)?;
            let (assignment, report) = pipeline::train(&config)?;
            println!("{}", report.summary());
            println!("Cluster sizes: {:?}", assignment.cluster_sizes());
        }
        Commands::Run(args) => {
            let config = resolve_config(config_path, &args)?;
            let report = pipeline::run(&config)?;
            println!("{}", report.summary());
            println!("Artifacts written to {}", config.output_dir.display());
        }
        Commands::Match {
            students,
            output_dir,
            top,
            json,
        } => {
            let mut config = resolve_config(
                config_path,
                &PipelineArgs {
                    output_dir,
                    ..Default::default()
                },
            )?;
            if let Some(top) = top {
                config.matching.max_matches = top;
            }
            handle_match(&config, &students, json)?;
        }
        Commands::InitConfig { output } => {
            PipelineConfig::default().to_file(&output)?;
            println!("Default configuration written to {}", output.display());
        }
    }
    Ok(())
}

fn handle_match(config: &PipelineConfig, students: &Path, json: bool) -> Result<()> {
    let results = pipeline::match_students(config, students)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&results).context("Failed to serialize matches")?
        );
        return Ok(());
    }

    for result in &results {
        println!(
            "Student {} -> cluster {} ({} potential study partners)",
            result.query_row + 1,
            result.cluster,
            result.matches.len()
        );
        for peer in &result.matches {
            let subjects = if peer.common_subjects.is_empty() {
                "-".to_owned()
            } else {
                peer.common_subjects.join(", ")
            };
            println!(
                "  {:<20} similarity {:5.1}%  common subjects: {subjects}",
                peer.label, peer.similarity
            );
        }
    }
    Ok(())
}

fn resolve_config(path: Option<&Path>, args: &PipelineArgs) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(input) = &args.input {
        config.input_path.clone_from(input);
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir.clone_from(dir);
    }
    if let Some(k) = args.clusters {
        config.clustering.cluster_count = k;
    }
    if let Some(seed) = args.seed {
        config.clustering.seed = seed;
    }
    if let Some(columns) = &args.meta_columns {
        config.meta_columns.clone_from(columns);
    }
    if let Some(columns) = &args.categorical_columns {
        config.categorical_columns.clone_from(columns);
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "peer-study",
            "run",
            "--input",
            "survey.csv",
            "-k",
            "4",
            "--categorical-columns",
            "Branch,Year_of_Study",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };

        let config = resolve_config(None, &args).unwrap();
        assert_eq!(config.input_path, PathBuf::from("survey.csv"));
        assert_eq!(config.clustering.cluster_count, 4);
        assert_eq!(config.categorical_columns, vec!["Branch", "Year_of_Study"]);
        assert_eq!(config.meta_columns, PipelineConfig::default().meta_columns);
    }

    #[test]
    fn test_zero_clusters_flag_rejected() {
        let args = PipelineArgs {
            clusters: Some(0),
            ..Default::default()
        };
        assert!(resolve_config(None, &args).is_err());
    }
}
