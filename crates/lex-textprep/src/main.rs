//! CLI entry point for the text preparation pipeline.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use lex_textprep::{
    DatasetRole, NaiveBayesClassifier, PerRole, PipelineConfig, PipelineController,
    PipelineResult, ReportWriter, RunReport, Severity,
};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Last stage the CLI runs before writing results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum StopAfter {
    Parse,
    Inspect,
    Preprocess,
    Embed,
    Train,
    Evaluate,
    Predict,
}

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Text classification data preparation pipeline",
    long_about = "Validates, parses and encodes train/test/validation CSV files into \
                  fixed-length integer sequences, then trains and evaluates a baseline \
                  naive Bayes classifier.\n\n\
                  EXAMPLES:\n  \
                  # Files named train.csv, test.csv, validation.csv in ./data\n  \
                  lex-textprep --data-dir data\n\n  \
                  # Export vocabulary, encoded datasets and a run report\n  \
                  lex-textprep --data-dir data -o outputs/\n\n  \
                  # Classify ad-hoc text after evaluation\n  \
                  lex-textprep --data-dir data -p \"free money now\" -p \"see you at lunch\""
)]
struct Args {
    /// Directory holding the three dataset files under their expected names
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Path to the training file (overrides --data-dir)
    #[arg(long)]
    train: Option<PathBuf>,

    /// Path to the testing file (overrides --data-dir)
    #[arg(long)]
    test: Option<PathBuf>,

    /// Path to the validation file (overrides --data-dir)
    #[arg(long)]
    validation: Option<PathBuf>,

    /// JSON configuration file; missing fields take defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Length every sequence is truncated or padded to
    #[arg(long)]
    max_length: Option<usize>,

    /// Epochs passed to the classifier
    #[arg(long)]
    epochs: Option<usize>,

    /// Batch size passed to the classifier
    #[arg(long)]
    batch_size: Option<usize>,

    /// Stop after this stage
    #[arg(long, value_enum, default_value = "predict")]
    stop_after: StopAfter,

    /// Text to classify once the model is evaluated (repeatable)
    #[arg(short, long)]
    predict: Vec<String>,

    /// Output directory for vocabulary.json, encoded_<role>.json and run_report.json
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output the run report as JSON to stdout instead of a summary
    ///
    /// Disables all progress logs.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    let config = load_config(&args)?;
    let paths = resolve_paths(&args, &config)?;

    let mut builder = PipelineController::builder().config(config);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            let line = format!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.step.display_name(),
                update.message
            );
            match update.severity {
                Severity::Info | Severity::Success => info!("{}", line),
                Severity::Warning => warn!("{}", line),
                Severity::Error => error!("{}", line),
            }
        });
    }
    let mut controller = builder.build()?;

    let mut report = RunReport::new(&controller);
    let outcome = execute(&mut controller, &args, &paths, &mut report);
    report.sync(&controller);

    if let Some(dir) = &args.output {
        let writer = ReportWriter::new(dir);
        if controller.run().encoded().is_some() {
            writer.write_artifacts(&controller)?;
        }
        writer.write_report(&report)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    outcome.map_err(|e| anyhow!("Pipeline failed: {}", e))
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(length) = args.max_length {
        config.max_sequence_length = length;
    }
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    config.validate()?;
    Ok(config)
}

fn resolve_paths(args: &Args, config: &PipelineConfig) -> Result<PerRole<PathBuf>> {
    let resolve = |role: DatasetRole, explicit: &Option<PathBuf>| -> Result<PathBuf> {
        match (explicit, &args.data_dir) {
            (Some(path), _) => Ok(path.clone()),
            (None, Some(dir)) => Ok(dir.join(config.file_name(role))),
            (None, None) => Err(anyhow!(
                "No path for the {} dataset: pass --data-dir or --{}",
                role,
                match role {
                    DatasetRole::Training => "train",
                    DatasetRole::Testing => "test",
                    DatasetRole::Validation => "validation",
                }
            )),
        }
    };
    Ok(PerRole {
        training: resolve(DatasetRole::Training, &args.train)?,
        testing: resolve(DatasetRole::Testing, &args.test)?,
        validation: resolve(DatasetRole::Validation, &args.validation)?,
    })
}

/// Run the stages in order up to `--stop-after`, recording each report.
fn execute(
    controller: &mut PipelineController,
    args: &Args,
    paths: &PerRole<PathBuf>,
    report: &mut RunReport,
) -> PipelineResult<()> {
    for (role, path) in paths.iter() {
        controller.select_file(role, path)?;
    }

    report.parse = Some(controller.parse()?);
    if args.stop_after == StopAfter::Parse {
        return Ok(());
    }
    report.inspection = Some(controller.inspect()?);
    if args.stop_after == StopAfter::Inspect {
        return Ok(());
    }
    report.preprocess = Some(controller.preprocess()?);
    if args.stop_after == StopAfter::Preprocess {
        return Ok(());
    }
    report.embedding = Some(controller.embed()?);
    if args.stop_after == StopAfter::Embed {
        return Ok(());
    }

    let threshold = controller.config().decision_threshold;
    controller.create_model(|spec| {
        Ok(Box::new(NaiveBayesClassifier::new(*spec).with_threshold(threshold)))
    })?;
    controller.train()?;
    if args.stop_after == StopAfter::Train {
        return Ok(());
    }
    controller.evaluate()?;
    if args.stop_after == StopAfter::Evaluate {
        return Ok(());
    }

    for text in &args.predict {
        report.predictions.push(controller.predict(text)?);
    }
    Ok(())
}

/// Print a human-readable summary of the run.
///
/// Uses `println!` so the summary is visible regardless of log level.
fn print_summary(report: &RunReport) {
    println!("\n{}", "=".repeat(80));
    println!("TEXT PREPARATION SUMMARY");
    println!("{}\n", "=".repeat(80));

    println!("  Stage reached: {}", report.stage.display_name());

    if let Some(parse) = &report.parse {
        println!();
        println!("DATASETS");
        println!("{}", "-".repeat(40));
        for (role, rows) in parse.rows.iter() {
            println!("  {:<12} {:>8} rows", role.as_str(), rows);
        }
    }

    if let Some(inspection) = &report.inspection {
        let keys = &inspection.column_keys;
        println!();
        println!("COLUMNS");
        println!("{}", "-".repeat(40));
        println!("  Text:  {}", keys.text_key);
        println!("  Label: {}", keys.label_key);
        if keys.inferred {
            println!("  (inferred from header position)");
        }
    }

    if let Some(pre) = &report.preprocess {
        println!();
        println!("PREPROCESSING ({})", pre.status_message());
        println!("{}", "-".repeat(40));
        for (role, kept) in pre.kept.iter() {
            println!(
                "  {:<12} kept {:>8}, dropped {:>6}",
                role.as_str(),
                kept,
                pre.dropped.get(role)
            );
        }
        println!("  Vocabulary size: {}", pre.vocabulary_size);
    }

    if let Some(emb) = &report.embedding {
        println!();
        println!("EMBEDDING (length {})", emb.sequence_length);
        println!("{}", "-".repeat(40));
        for (role, rate) in emb.oov_rate.iter() {
            println!("  {:<12} OOV rate {:>6.2}%", role.as_str(), rate * 100.0);
        }
    }

    if let Some(last) = report.training.as_ref().and_then(|h| h.last()) {
        println!();
        println!("TRAINING");
        println!("{}", "-".repeat(40));
        println!("  Loss:     {:.4}", last.loss);
        println!("  Accuracy: {:.2}%", last.accuracy * 100.0);
        if let (Some(loss), Some(acc)) = (last.val_loss, last.val_accuracy) {
            println!("  Validation loss {:.4}, accuracy {:.2}%", loss, acc * 100.0);
        }
    }

    if let Some(eval) = &report.evaluation {
        println!();
        println!("EVALUATION (test set)");
        println!("{}", "-".repeat(40));
        println!("  Loss:     {:.4}", eval.loss);
        println!("  Accuracy: {:.2}%", eval.accuracy * 100.0);
    }

    if !report.predictions.is_empty() {
        println!();
        println!("PREDICTIONS");
        println!("{}", "-".repeat(40));
        for p in &report.predictions {
            println!("  [{}] p={:.3}  {}", p.label, p.probability, p.text);
        }
    }

    if let Some(failure) = &report.failure {
        println!();
        println!("FAILED at {}: [{}] {}", failure.step, failure.code, failure.message);
    }

    println!("\n{}", "=".repeat(80));
}
