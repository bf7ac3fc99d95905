//! Égua Tutor CLI
//!
//! Serves the tutor API, grades local files and writes progress reports.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use egua_report::{
    json::JsonGenerator, ExerciseInput, LessonInput, MarkdownGenerator, RecordInput,
    ReportGenerator, ReportInput,
};
use egua_tutor::{
    create_router, feedback, progress, scan_with_trace, AppState, Config, GradingGate,
    JsonFileStore, LessonCatalog, ProgressRecord, ProgressStore, Statement, Submission,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Learner id used by `run` when none is given.
const LOCAL_LEARNER: &str = "local";

/// Exit code of `run` when the output does not match.
const EXIT_MISMATCH: u8 = 2;

/// Égua Tutor - lessons, grading and feedback for the Égua language
#[derive(Parser, Debug)]
#[command(name = "egua")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: egua.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Scan and grade an Égua source file
    Run {
        /// Source file to grade
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Exercise to grade against
        #[arg(short, long, value_name = "ID")]
        exercise: String,

        /// Learner the attempt is recorded for
        #[arg(short, long, value_name = "ID", default_value = LOCAL_LEARNER)]
        learner: String,

        /// Show how every line was classified
        #[arg(long)]
        trace: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List lessons and exercises
    Lessons,

    /// Write Markdown and JSON progress reports for a learner
    Report {
        /// Learner to report on
        #[arg(short, long, value_name = "ID")]
        learner: String,

        /// Output directory for reports
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }
    tracing::debug!(config = ?args.config, "Config file");

    match dispatch(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn dispatch(args: Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Serve { port } => serve(config, port).await.map(|()| ExitCode::SUCCESS),
        Command::Run {
            file,
            exercise,
            learner,
            trace,
            json,
        } => run_file(&config, &file, &exercise, &learner, trace, json).await,
        Command::Lessons => {
            let catalog = load_catalog(&config)?;
            print_lessons(&catalog);
            Ok(ExitCode::SUCCESS)
        }
        Command::Report {
            learner,
            output_dir,
        } => {
            generate_reports(&config, &learner, &output_dir)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Starts the HTTP API and serves until Ctrl+C.
async fn serve(mut config: Config, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.port = port;
    }
    config.validate()?;

    let catalog = load_catalog(&config)?;
    let store = open_store(&config)?;
    let generator = feedback::from_config(&config.feedback);

    print_config(&config, &catalog);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| {
            anyhow::anyhow!(
                "Invalid bind address '{}:{}': {e}\n\nSuggestion: Set host to an IP address such as '127.0.0.1'",
                config.host,
                config.port
            )
        })?;

    let state = AppState::new(config, catalog, progress::shared(store), generator);
    let router = create_router(state);

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");
    tracing::info!(%addr, "Égua tutor listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await?;

    tracing::info!("Égua tutor stopped");
    Ok(())
}

/// Grades a local file and prints the result.
async fn run_file(
    config: &Config,
    file: &Path,
    exercise_id: &str,
    learner: &str,
    trace: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let code = std::fs::read_to_string(file).map_err(|e| {
        anyhow::anyhow!("Failed to read '{}': {e}", file.display())
    })?;

    let catalog = load_catalog(config)?;
    let (lesson, exercise) = catalog.find_exercise(exercise_id).map_err(|e| {
        anyhow::anyhow!("{e}\n\nSuggestion: Run 'egua lessons' to list exercise ids")
    })?;

    if trace {
        print_trace(&code);
    }

    let gate = GradingGate::new(
        progress::shared(open_store(config)?),
        feedback::from_config(&config.feedback),
    );
    let report = gate
        .run(Submission {
            learner_id: learner,
            lesson_id: &lesson.id,
            exercise,
            code: &code,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Output:   {}", report.output);
        println!("Expected: {}", report.expected_output);
        println!("Status:   {:?}", report.outcome.status);
        if let Some(feedback) = &report.outcome.feedback {
            println!();
            println!("{feedback}");
        }
        if let Some(error) = &report.outcome.feedback_error {
            println!();
            println!("Feedback: {error}");
        }
    }

    if report.outcome.completed {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_MISMATCH))
    }
}

/// Writes `egua-report.md` and `egua-report.json` for a learner.
fn generate_reports(config: &Config, learner: &str, output_dir: &Path) -> anyhow::Result<()> {
    let catalog = load_catalog(config)?;
    let store = open_store(config)?;
    let records = store.records_for(learner);
    tracing::debug!(
        store = %store.path().display(),
        learner,
        records = records.len(),
        "Loaded learner progress"
    );

    let input = create_report_input(&catalog, &records, learner);
    let report = ReportGenerator::new(input).generate();

    std::fs::create_dir_all(output_dir)?;

    let md_path = output_dir.join("egua-report.md");
    std::fs::write(&md_path, MarkdownGenerator::new(&report).generate())?;
    println!("Markdown report: {}", md_path.display());

    let json_path = output_dir.join("egua-report.json");
    JsonGenerator::new(&report).write_to_file(&json_path, true)?;
    println!("JSON report: {}", json_path.display());

    let summary = &report.summary;
    println!();
    println!(
        "Exercises completed: {}/{} ({}%)",
        summary.exercises_completed, summary.exercises_total, summary.completion_percent
    );

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Loads configuration from the given file or from the working directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn load_catalog(config: &Config) -> anyhow::Result<LessonCatalog> {
    LessonCatalog::load_or_builtin(config.lessons.as_deref()).map_err(|e| anyhow::anyhow!("{e}"))
}

fn open_store(config: &Config) -> anyhow::Result<JsonFileStore> {
    JsonFileStore::open(&config.store_file).map_err(|e| anyhow::anyhow!("{e}"))
}

fn print_config(config: &Config, catalog: &LessonCatalog) {
    println!("Configuration loaded:");
    println!(
        "  Lessons: {} ({} lessons, {} exercises)",
        config.lessons.as_deref().unwrap_or("built-in"),
        catalog.lessons().len(),
        catalog.exercise_count()
    );
    println!("  Progress store: {}", config.store_file);
    println!("  Feedback provider: {:?}", config.feedback.provider);
    println!("  Feedback model: {}", config.feedback.model);
    println!();
}

fn print_lessons(catalog: &LessonCatalog) {
    for lesson in catalog.lessons() {
        println!("{}. {} [{}]", lesson.order, lesson.title, lesson.id);
        for exercise in &lesson.exercises {
            println!("   - {} [{}]", exercise.title, exercise.id);
        }
    }
}

fn print_trace(code: &str) {
    let result = scan_with_trace(code);
    println!("Line classification:");
    for line in &result.lines {
        let label = match line.statement {
            Statement::Declaration { name, value } => format!("declaration {name} = \"{value}\""),
            Statement::Reassignment { name, value } => {
                format!("reassignment {name} = \"{value}\"")
            }
            Statement::Print { arg } => format!("print {arg:?}"),
            Statement::Ignored { reason } => format!("ignored ({reason:?})"),
        };
        println!("  {:>3}: {label}", line.line);
    }
    println!(
        "  {} of {} lines ignored",
        result.ignored_count(),
        result.lines.len()
    );
    println!();
}

/// Creates a `ReportInput` from the catalog and the learner's records.
fn create_report_input(
    catalog: &LessonCatalog,
    records: &[ProgressRecord],
    learner: &str,
) -> ReportInput {
    ReportInput {
        learner_id: learner.to_string(),
        lessons: catalog
            .lessons()
            .iter()
            .map(|lesson| LessonInput {
                id: lesson.id.clone(),
                title: lesson.title.clone(),
                order: lesson.order,
                exercises: lesson
                    .exercises
                    .iter()
                    .map(|exercise| ExerciseInput {
                        id: exercise.id.clone(),
                        title: exercise.title.clone(),
                    })
                    .collect(),
            })
            .collect(),
        records: records.iter().map(convert_record).collect(),
    }
}

/// Converts a `ProgressRecord` to `RecordInput`.
fn convert_record(record: &ProgressRecord) -> RecordInput {
    RecordInput {
        lesson_id: record.lesson_id.clone(),
        exercise_id: record.exercise_id.clone(),
        completed: record.completed,
        attempts: record.attempts,
        updated_at: record.updated_at,
    }
}
