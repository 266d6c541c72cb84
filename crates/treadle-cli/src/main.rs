//! treadle - run the model-training graph locally.
//!
//! External systems are replaced by local stand-ins: records come from a
//! JSON file, the model predicts column means, and results are logged.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use treadle_core::{
    CancelHandle, CancelToken, Executor, Graph, RunError, RunParams, RunReport,
};
use treadle_training::local::{
    FrameFeatureOps, InMemorySource, MeanRegressorFactory, RecordingSink,
};
use treadle_training::{Frame, RecordSource, TrainingConfig, TrainingOps, model_training};

mod config;
mod source;

use config::{CliConfig, load_params};
use source::JsonFileSource;

#[derive(Parser)]
#[command(name = "treadle")]
#[command(about = "Treadle - task-graph runner for the model-training pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the training graph once
    Run {
        /// Records file: a frame object or an array of records
        #[arg(long)]
        records: PathBuf,

        /// Run parameters (model_id, date, lot_id, features_name, targets_name)
        #[arg(long)]
        params: Option<PathBuf>,

        /// Executor and training config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Declare the graph and check it, without running anything
    Validate {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print tasks in execution order with their dependencies
    Plan {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            records,
            params,
            config,
            json,
        } => run(&records, params.as_deref(), config.as_deref(), json).await,
        Commands::Validate { config } => validate(config.as_deref()).await,
        Commands::Plan { config } => plan(config.as_deref()).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn env_filter() -> EnvFilter {
    filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
}

/// `RUST_LOG` directives when set and valid, `info` otherwise.
fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn local_ops(source: impl RecordSource + 'static) -> TrainingOps {
    TrainingOps::new(source, FrameFeatureOps, MeanRegressorFactory, RecordingSink::new())
}

/// The graph only, for commands that never fetch records.
fn declared_graph(training: &TrainingConfig) -> anyhow::Result<Graph> {
    let ops = local_ops(InMemorySource::new(Frame::default()));
    Ok(model_training(&ops, training)?)
}

/// A finished run: what gets printed and how the process exits.
struct Finished {
    report: RunReport,
    verdict: Result<(), RunError>,
}

impl Finished {
    fn render(&self, json: bool) -> anyhow::Result<String> {
        if json {
            Ok(serde_json::to_string_pretty(&self.report)?)
        } else {
            Ok(self.report.to_string())
        }
    }

    /// 0 when the root sequence succeeded, 1 on a `RunError`.
    fn exit_code(&self) -> ExitCode {
        match self.verdict {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        }
    }
}

async fn execute(
    records: &Path,
    params: RunParams,
    config: CliConfig,
    cancel: CancelToken,
) -> anyhow::Result<Finished> {
    let ops = local_ops(JsonFileSource::new(records));
    let graph = model_training(&ops, &config.training)?;

    let record = Executor::new(config.executor)
        .run_with_cancel(&graph, params, cancel)
        .await;

    let report = RunReport::from_record(&record);
    let verdict = record.into_result().map(|record| {
        info!(run_id = %record.run_id(), "run finished");
    });
    Ok(Finished { report, verdict })
}

async fn run(
    records: &Path,
    params: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let config = CliConfig::load(config).await?;
    let params: RunParams = load_params(params).await?.into();

    let (handle, token) = CancelHandle::new();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling run");
            handle.cancel();
        }
    });

    let finished = execute(records, params, config, token).await;
    interrupt.abort();
    let finished = finished?;

    println!("{}", finished.render(json)?);
    if let Err(e) = &finished.verdict {
        eprintln!("error: {e}");
    }
    Ok(finished.exit_code())
}

async fn validate(config: Option<&Path>) -> anyhow::Result<ExitCode> {
    let config = CliConfig::load(config).await?;
    let graph = declared_graph(&config.training)?;

    println!("graph is valid");
    println!("  tasks: {}", graph.len());
    if let Some(branch) = graph.branch_task() {
        println!("  branch: {}", branch.name());
    }
    Ok(ExitCode::SUCCESS)
}

async fn plan(config: Option<&Path>) -> anyhow::Result<ExitCode> {
    let config = CliConfig::load(config).await?;
    let graph = declared_graph(&config.training)?;

    for (step, name) in graph.topological_order().into_iter().enumerate() {
        let deps: Vec<&str> = graph
            .dependencies(name.as_str())
            .into_iter()
            .map(|d| d.as_str())
            .collect();
        let marker = if graph.task(name.as_str()).is_some_and(|t| t.is_branch()) {
            " [branch]"
        } else {
            ""
        };

        if deps.is_empty() {
            println!("{:>2}. {name}{marker}", step + 1);
        } else {
            println!("{:>2}. {name}{marker} <- {}", step + 1, deps.join(", "));
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{Value, json};
    use std::io::Write;
    use tracing_subscriber::filter::LevelFilter;
    use treadle_training::TrainingParams;

    #[rstest]
    #[case::unset(None, LevelFilter::INFO)]
    #[case::debug(Some("debug"), LevelFilter::DEBUG)]
    #[case::warn(Some("warn"), LevelFilter::WARN)]
    #[case::invalid(Some("treadle=loud"), LevelFilter::INFO)]
    fn log_level_follows_rust_log(#[case] directives: Option<&str>, #[case] level: LevelFilter) {
        assert_eq!(filter_from(directives).max_level_hint(), Some(level));
    }

    /// Twenty records of one lot with constant targets.
    fn lot_file() -> tempfile::NamedTempFile {
        let records: Vec<Value> = (0..20)
            .map(|i| {
                json!({
                    "equipment_id": format!("EQ-{}", i % 2),
                    "lf_id": "LF-1",
                    "proc_datetime": format!("2024-01-01 09:{:02}:00", i),
                    "heat_pre": 150.0 + i as f64,
                    "loop_height": 42.0,
                    "ball_thickness": 21.0,
                })
            })
            .collect();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(Value::Array(records).to_string().as_bytes())
            .unwrap();
        file
    }

    fn params() -> RunParams {
        TrainingParams {
            targets_name: vec!["loop_height".into(), "ball_thickness".into()],
            ..TrainingParams::default()
        }
        .into()
    }

    async fn run_lot(records: &Path) -> Finished {
        execute(records, params(), CliConfig::default(), CancelToken::never())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn good_lot_exits_zero() {
        let records = lot_file();

        let finished = run_lot(records.path()).await;

        assert!(finished.verdict.is_ok());
        assert_eq!(finished.exit_code(), ExitCode::SUCCESS);
        assert!(finished.report.happy_path_completed);
        assert_eq!(finished.report.counts.failed, 0);
    }

    #[tokio::test]
    async fn unreadable_records_exit_one() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("records.json");

        let finished = run_lot(&missing).await;

        match &finished.verdict {
            Err(RunError::RootTaskFailed { task, .. }) => {
                assert_eq!(task.as_str(), "data_collect")
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
        assert_eq!(finished.exit_code(), ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn json_report_lists_every_task() {
        let records = lot_file();
        let finished = run_lot(records.path()).await;

        let report: Value = serde_json::from_str(&finished.render(true).unwrap()).unwrap();
        assert_eq!(report["status"], "SUCCEEDED");
        assert_eq!(report["chosen_branch"], json!(["failure"]));
        assert_eq!(report["tasks"].as_array().unwrap().len(), 10);
        assert_eq!(report["counts"]["completed"], 7);
        assert_eq!(report["counts"]["skipped"], 3);
    }

    #[tokio::test]
    async fn text_report_ends_with_counts() {
        let records = lot_file();
        let finished = run_lot(records.path()).await;

        let text = finished.render(false).unwrap();
        assert!(text.ends_with("completed=7 skipped=3 failed=0"), "{text}");
    }
}
