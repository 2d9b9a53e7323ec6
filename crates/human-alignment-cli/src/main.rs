//! Human Alignment CLI
//!
//! The `human-alignment` command runs an AutoSxS human alignment check on
//! Vertex AI Pipelines.
//!
//! ## Commands
//!
//! - `run`: create the bucket, stage the dataset, compile and submit the pipeline
//! - `clean-up`: optionally delete the bucket
//! - `outputs`: show the outputs of one task of a submitted job
//! - `metrics`: print the rows of a JSON Lines metrics or judgments file

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use human_alignment::{
    init_tracing, AutoSxsParameters, EvaluationColumns, GsutilStore, JobHandle, JobState,
    PipelineDefinition, PipelineService, PipelineSpec, Session, SessionConfig,
    VertexPipelineService, DEFAULT_REGION, DEFAULT_TEMPLATE_PATH,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "human-alignment")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AutoSxS human alignment runs on Vertex AI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct CloudArgs {
    /// Google Cloud Project ID
    #[arg(long, alias = "project_id", env = "GOOGLE_CLOUD_PROJECT")]
    project_id: String,

    /// Google Cloud Region
    #[arg(long, env = "GOOGLE_CLOUD_REGION", default_value = DEFAULT_REGION)]
    location: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the AutoSxS pipeline for human alignment
    Run {
        #[command(flatten)]
        cloud: CloudArgs,

        /// Cloud Storage bucket (gs://...); generated when omitted
        #[arg(long, alias = "bucket_name", env = "HUMAN_ALIGNMENT_BUCKET")]
        bucket_name: Option<String>,

        /// Contexts for evaluation
        #[arg(long, num_args = 1.., required = true)]
        context: Vec<String>,

        /// Questions for evaluation
        #[arg(long, num_args = 1.., required = true)]
        questions: Vec<String>,

        /// Predictions from model A
        #[arg(long, alias = "predictions_a", num_args = 1.., required = true)]
        predictions_a: Vec<String>,

        /// Predictions from model B
        #[arg(long, alias = "predictions_b", num_args = 1.., required = true)]
        predictions_b: Vec<String>,

        /// Human preference labels
        #[arg(long, alias = "human_preference", num_args = 1.., required = true)]
        human_preference: Vec<String>,

        /// Where to write the compiled template
        #[arg(long, default_value = DEFAULT_TEMPLATE_PATH)]
        template_path: PathBuf,

        /// Published template to compile (default: AutoSxS)
        #[arg(long, conflicts_with = "template_file")]
        template_uri: Option<String>,

        /// Local pipeline spec to compile instead of a published template
        #[arg(long)]
        template_file: Option<PathBuf>,

        /// Pipeline job id and display name
        #[arg(long, default_value = "human-alignment-check")]
        display_name: String,

        /// Block until the job finishes
        #[arg(long)]
        wait: bool,

        /// Seconds between status polls when waiting
        #[arg(long, default_value = "30")]
        poll_secs: u64,

        /// Give up waiting after this many seconds
        #[arg(long, default_value = "14400")]
        timeout_secs: u64,
    },

    /// Clean up resources for the human alignment project
    CleanUp {
        #[command(flatten)]
        cloud: CloudArgs,

        /// Cloud Storage bucket to clean up
        #[arg(long, alias = "bucket_name", env = "HUMAN_ALIGNMENT_BUCKET")]
        bucket_name: String,

        /// Delete the Cloud Storage bucket
        #[arg(long, alias = "delete_bucket")]
        delete_bucket: bool,
    },

    /// Show the outputs of a task in a submitted job
    Outputs {
        #[command(flatten)]
        cloud: CloudArgs,

        /// Pipeline job id
        #[arg(long, default_value = "human-alignment-check")]
        job_id: String,

        /// Task name, e.g. model-evaluation-autosxs-metrics
        #[arg(long)]
        task_name: String,
    },

    /// Print rows of a JSON Lines file (local path or gs:// URI)
    Metrics {
        #[command(flatten)]
        cloud: CloudArgs,

        /// File to load
        uri: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            cloud,
            bucket_name,
            context,
            questions,
            predictions_a,
            predictions_b,
            human_preference,
            template_path,
            template_uri,
            template_file,
            display_name,
            wait,
            poll_secs,
            timeout_secs,
        } => {
            let columns = EvaluationColumns {
                context,
                questions,
                predictions_a,
                predictions_b,
                human_preference,
            };
            let definition = pipeline_definition(template_uri, template_file.as_ref())?;
            let wait = wait.then(|| {
                (
                    Duration::from_secs(poll_secs),
                    Duration::from_secs(timeout_secs),
                )
            });
            cmd_run(
                &cloud,
                bucket_name.as_deref(),
                columns,
                &definition,
                &template_path,
                &display_name,
                wait,
            )
            .await
        }
        Commands::CleanUp {
            cloud,
            bucket_name,
            delete_bucket,
        } => cmd_clean_up(&cloud, &bucket_name, delete_bucket).await,
        Commands::Outputs {
            cloud,
            job_id,
            task_name,
        } => cmd_outputs(&cloud, &job_id, &task_name).await,
        Commands::Metrics { cloud, uri } => cmd_metrics(&cloud, &uri).await,
    }
}

fn pipeline_definition(
    template_uri: Option<String>,
    template_file: Option<&PathBuf>,
) -> Result<PipelineDefinition> {
    match (template_uri, template_file) {
        (_, Some(path)) => {
            let spec = PipelineSpec::load(path)
                .with_context(|| format!("Failed to load pipeline spec from {:?}", path))?;
            Ok(PipelineDefinition::Inline(spec))
        }
        (Some(uri), None) => Ok(PipelineDefinition::Published(uri)),
        (None, None) => Ok(PipelineDefinition::autosxs()),
    }
}

fn open_session(
    cloud: &CloudArgs,
    bucket: Option<&str>,
) -> Result<Session<GsutilStore, VertexPipelineService>> {
    let config = SessionConfig::new(&cloud.project_id, &cloud.location, bucket)
        .context("Invalid session configuration")?;
    let platform =
        VertexPipelineService::from_env().context("Failed to create Vertex AI client")?;
    Ok(Session::new(config, GsutilStore::new(), platform))
}

fn job_resource_name(cloud: &CloudArgs, job_id: &str) -> String {
    format!(
        "projects/{}/locations/{}/pipelineJobs/{}",
        cloud.project_id, cloud.location, job_id
    )
}

// ========== Run ==========

async fn cmd_run(
    cloud: &CloudArgs,
    bucket: Option<&str>,
    columns: EvaluationColumns,
    definition: &PipelineDefinition,
    template_path: &PathBuf,
    display_name: &str,
    wait: Option<(Duration, Duration)>,
) -> Result<()> {
    let mut session = open_session(cloud, bucket)?;
    info!("Using bucket {}", session.config().bucket());

    session
        .ensure_storage()
        .await
        .context("Failed to create bucket")?;
    println!("Bucket ready: {}", session.config().bucket());

    let staged = session
        .stage_dataset(columns)
        .await
        .context("Failed to stage evaluation dataset")?;
    println!("Dataset uploaded to: {}", staged.remote_uri);

    session
        .compile_template(definition, template_path)
        .await
        .context("Failed to compile pipeline")?;
    println!("Pipeline compiled successfully.");

    let parameters = AutoSxsParameters::question_answering(&staged.remote_uri);
    let job = session
        .submit_job(parameters.to_parameter_values(), display_name, template_path)
        .await
        .with_context(|| format!("Failed to submit pipeline {}", display_name))?;
    println!(
        "Pipeline {} is running. Check Vertex AI console for progress.",
        display_name
    );
    println!("Job: {}", job.name);

    if let Some((poll, timeout)) = wait {
        let job = session.wait_for_completion(&job, poll, timeout).await?;
        print_job_summary(&job);
    } else {
        println!("Pipeline initiated. You can monitor the job in the Vertex AI console.");
    }

    Ok(())
}

fn print_job_summary(job: &JobHandle) {
    println!();
    println!("Job {} finished: {}", job.job_id(), job.state);
    for task in job.tasks() {
        println!(
            "  {:<40} {}",
            task.task_name,
            task.state.as_deref().unwrap_or("-")
        );
    }
}

// ========== Clean up ==========

async fn cmd_clean_up(cloud: &CloudArgs, bucket: &str, delete_bucket: bool) -> Result<()> {
    let session = open_session(cloud, Some(bucket))?;

    let deleted = session
        .teardown(delete_bucket)
        .await
        .with_context(|| format!("Failed to delete bucket {}", bucket))?;
    if deleted {
        println!("Bucket {} deleted.", session.config().bucket());
    }
    println!("Clean-up process completed.");

    Ok(())
}

// ========== Outputs & metrics ==========

async fn cmd_outputs(cloud: &CloudArgs, job_id: &str, task_name: &str) -> Result<()> {
    let session = open_session(cloud, None)?;
    let job = session
        .platform()
        .get_job(&job_resource_name(cloud, job_id))
        .await
        .with_context(|| format!("Failed to read pipeline job {}", job_id))?;

    if job.state != JobState::Succeeded {
        println!("Job {} is {}", job.job_id(), job.state);
    }

    match session.fetch_task_output(&job, task_name) {
        Some(outputs) => println!("{}", serde_json::to_string_pretty(outputs)?),
        None => println!("No task named {} in job {}", task_name, job.job_id()),
    }

    Ok(())
}

async fn cmd_metrics(cloud: &CloudArgs, uri: &str) -> Result<()> {
    let session = open_session(cloud, None)?;
    let table = session
        .load_metrics(uri)
        .await
        .with_context(|| format!("Failed to load metrics from {}", uri))?;

    println!("Columns: {}", table.columns().join(", "));
    for row in table.rows() {
        println!("{}", serde_json::to_string(row)?);
    }
    println!("{} rows", table.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_accepts_original_flag_spellings() {
        let cli = Cli::try_parse_from([
            "human-alignment",
            "run",
            "--project_id",
            "test-project",
            "--context",
            "Context 1",
            "Context 2",
            "--questions",
            "Question 1",
            "Question 2",
            "--predictions_a",
            "A1",
            "A2",
            "--predictions_b",
            "B1",
            "B2",
            "--human_preference",
            "A",
            "B",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                cloud,
                context,
                human_preference,
                template_path,
                display_name,
                wait,
                ..
            } => {
                assert_eq!(cloud.project_id, "test-project");
                assert_eq!(context, vec!["Context 1", "Context 2"]);
                assert_eq!(human_preference, vec!["A", "B"]);
                assert_eq!(template_path, PathBuf::from("pipeline.yaml"));
                assert_eq!(display_name, "human-alignment-check");
                assert!(!wait);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_every_column() {
        let result = Cli::try_parse_from([
            "human-alignment",
            "run",
            "--project-id",
            "p",
            "--context",
            "c",
            "--questions",
            "q",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_clean_up_flags() {
        let cli = Cli::try_parse_from([
            "human-alignment",
            "clean-up",
            "--project-id",
            "p",
            "--bucket-name",
            "gs://p-aip-abc12345",
            "--delete_bucket",
        ])
        .unwrap();

        match cli.command {
            Commands::CleanUp {
                bucket_name,
                delete_bucket,
                ..
            } => {
                assert_eq!(bucket_name, "gs://p-aip-abc12345");
                assert!(delete_bucket);
            }
            _ => panic!("expected clean-up"),
        }
    }

    #[test]
    fn test_pipeline_definition_selection() {
        assert_eq!(
            pipeline_definition(None, None).unwrap(),
            PipelineDefinition::autosxs()
        );
        assert_eq!(
            pipeline_definition(Some("https://registry/t".into()), None).unwrap(),
            PipelineDefinition::Published("https://registry/t".into())
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.yaml");
        std::fs::write(
            &path,
            "pipelineInfo:\n  name: local\nschemaVersion: 2.1.0\nroot:\n  dag: {}\n",
        )
        .unwrap();
        match pipeline_definition(None, Some(&path)).unwrap() {
            PipelineDefinition::Inline(spec) => assert_eq!(spec.name(), "local"),
            other => panic!("unexpected definition: {:?}", other),
        }
    }

    #[test]
    fn test_job_resource_name() {
        let cloud = CloudArgs {
            project_id: "p".into(),
            location: "us-central1".into(),
        };
        assert_eq!(
            job_resource_name(&cloud, "human-alignment-check"),
            "projects/p/locations/us-central1/pipelineJobs/human-alignment-check"
        );
    }
}
