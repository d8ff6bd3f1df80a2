use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod academic;
mod attendance;
mod error;
mod fees;
mod files;
mod forest;
mod models;
mod pipeline;
mod predictor;
mod reader;
mod reconcile;
mod report;
mod summary;

use error::AnalysisError;
use files::UploadedFile;
use pipeline::CohortAnalyzer;
use predictor::RiskPredictor;

#[derive(Parser)]
#[command(name = "cohort-risk")]
#[command(about = "Student cohort risk analysis for Group Scholar", long_about = None)]
struct Cli {
    /// Directory holding the trained risk model artifacts
    #[arg(long, global = true, env = "COHORT_RISK_MODEL_DIR", default_value = ".")]
    model_dir: PathBuf,

    /// Log filter directive, e.g. `cohort_risk=debug`
    #[arg(long, global = true, env = "COHORT_RISK_LOG")]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile roster, academic and activity spreadsheets and predict risk
    Analyze {
        /// Uploaded spreadsheets; names must contain `students`,
        /// `academic_records` or `activity_records`
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Write the JSON result here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Summarize a previous analysis result for the dashboard
    Summary {
        /// JSON array produced by `analyze`
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = SummaryFormat::Json)]
        format: SummaryFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SummaryFormat {
    Json,
    Markdown,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_filter.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(err),
    }
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| "cohort_risk=info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Analyze { files, out } => {
            let predictor = RiskPredictor::load(&cli.model_dir)
                .context("failed to load the risk model")?;
            let analyzer = CohortAnalyzer::new(Arc::new(predictor));

            let uploads = load_uploads(&files).await?;
            let rows = analyzer.analyze(uploads)?;
            let json = serde_json::to_string_pretty(&rows)?;
            write_output(out.as_deref(), &json).await?;
        }
        Commands::Summary { input, format, out } => {
            let text = tokio::fs::read_to_string(&input)
                .await
                .with_context(|| format!("failed to read {}", input.display()))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .map_err(|err| AnalysisError::InvalidSummaryInput(err.to_string()))?;
            let summary = summary::summarize_json(value)?;

            let rendered = match format {
                SummaryFormat::Json => serde_json::to_string_pretty(&summary)?,
                SummaryFormat::Markdown => {
                    let source = input.file_name().and_then(|name| name.to_str());
                    report::render_markdown(source, &summary)
                }
            };
            write_output(out.as_deref(), &rendered).await?;
        }
    }

    Ok(())
}

async fn load_uploads(paths: &[PathBuf]) -> anyhow::Result<Vec<UploadedFile>> {
    let mut tasks = JoinSet::new();
    for (index, path) in paths.iter().cloned().enumerate() {
        tasks.spawn(async move {
            let content = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok::<_, anyhow::Error>((index, UploadedFile::new(filename, content)))
        });
    }

    let mut loaded = Vec::with_capacity(paths.len());
    while let Some(joined) = tasks.join_next().await {
        loaded.push(joined.context("file read task failed")??);
    }
    loaded.sort_by_key(|(index, _)| *index);
    Ok(loaded.into_iter().map(|(_, file)| file).collect())
}

async fn write_output(out: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "output written");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn report_failure(err: anyhow::Error) -> ExitCode {
    let Some(analysis_err) = err.downcast_ref::<AnalysisError>() else {
        error!(error = ?err, "command failed");
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    };

    let body = serde_json::to_string(&analysis_err.to_response())
        .unwrap_or_else(|_| analysis_err.to_string());
    eprintln!("{body}");
    if analysis_err.is_client_error() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uploads_keep_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let names = ["students.csv", "academic_records.csv", "activity_records.csv"];
        let paths: Vec<PathBuf> = names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                std::fs::write(&path, format!("student_id\n{name}\n")).unwrap();
                path
            })
            .collect();

        let uploads = load_uploads(&paths).await.unwrap();
        let loaded: Vec<&str> = uploads.iter().map(|file| file.filename.as_str()).collect();
        assert_eq!(loaded, names);
        assert_eq!(uploads[1].content, b"student_id\nacademic_records.csv\n");
    }

    #[tokio::test]
    async fn missing_upload_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_uploads(&[dir.path().join("students.csv")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn cli_parses_both_commands() {
        let cli = Cli::try_parse_from([
            "cohort-risk",
            "--model-dir",
            "models",
            "analyze",
            "students.csv",
            "academic_records.csv",
        ])
        .unwrap();
        assert_eq!(cli.model_dir, PathBuf::from("models"));
        assert!(matches!(cli.command, Commands::Analyze { ref files, .. } if files.len() == 2));

        let cli = Cli::try_parse_from([
            "cohort-risk",
            "summary",
            "--input",
            "analysis.json",
            "--format",
            "markdown",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Summary {
                format: SummaryFormat::Markdown,
                ..
            }
        ));
    }
}
