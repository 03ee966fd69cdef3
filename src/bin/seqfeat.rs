use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use seqfeat::corpus::open_buffered;
use seqfeat::report::{create_output, write_eval_report, write_predictions};
use seqfeat::tokenizer::Tokenizer;
use seqfeat::{
    source_for, source_with_workers, Converter, FeatureAssembler, FeatureRecord, HfTokenizer,
    LabelMode, PipelineConfig, Split, TaskKind,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Sequence classification feature pipeline", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a task split into JSON-lines feature records
    Convert(ConvertArgs),
    /// Print the label set of a task
    Labels(LabelsArgs),
    /// Turn predicted label ids into a `<record_id> <label>` predictions file
    Predictions(PredictionsArgs),
    /// Write an evaluation report from NAME=VALUE pairs
    Report(ReportArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Task name (cola, mnli, mrpc, semeval, semeval2, semevalofficial)
    #[arg(long)]
    task: TaskKind,

    /// Directory holding the task's dataset files
    #[arg(long, value_name = "DIR")]
    data_dir: PathBuf,

    /// BERT vocab.txt for a WordPiece tokenizer
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with = "tokenizer_json",
        required_unless_present = "tokenizer_json"
    )]
    vocab: Option<PathBuf>,

    /// Hugging Face tokenizer.json to load instead of a vocab file
    #[arg(long, value_name = "PATH")]
    tokenizer_json: Option<PathBuf>,

    /// Split to convert
    #[arg(long, default_value = "train")]
    split: Split,

    /// Inference mode: read the dev split without labels and keep example ids
    #[arg(long)]
    predict: bool,

    /// Fixed output sequence length
    #[arg(long, value_name = "LEN")]
    max_seq_length: Option<usize>,

    /// Shuffle chunks of this many tokens before truncation
    #[arg(long, value_name = "N")]
    permute_ngrams: Option<usize>,

    /// Seed for chunk permutation
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads (defaults to available parallelism)
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Lowercase and strip accents (uncased checkpoints; WordPiece only)
    #[arg(long)]
    lowercase: bool,

    /// Disable progress logging and the spinner
    #[arg(long)]
    no_progress: bool,

    /// Output path for the JSON-lines features
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct LabelsArgs {
    /// Task name
    #[arg(long)]
    task: TaskKind,
}

#[derive(Args, Debug)]
struct PredictionsArgs {
    /// JSON-lines features produced by `convert --predict`
    #[arg(long, value_name = "PATH")]
    features: PathBuf,

    /// File with one predicted label id per line, aligned with the features
    #[arg(long, value_name = "PATH")]
    predicted: PathBuf,

    /// Task whose label set maps ids to names
    #[arg(long)]
    task: TaskKind,

    /// Output predictions file
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Output report file
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    /// Metrics as NAME=VALUE
    #[arg(required = true, value_parser = parse_metric)]
    metrics: Vec<(String, f64)>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Convert(args) => run_convert(args),
        Commands::Labels(args) => run_labels(&args),
        Commands::Predictions(args) => run_predictions(&args),
        Commands::Report(args) => run_report(&args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let defaults = PipelineConfig::default();
    let cfg = PipelineConfig::builder()
        .max_seq_length(args.max_seq_length.unwrap_or(defaults.max_seq_length))
        .permute_ngrams(args.permute_ngrams)
        .seed(args.seed.unwrap_or(defaults.seed))
        .workers(args.threads)
        .show_progress(!args.no_progress)
        .build()?;

    let tokenizer: Arc<dyn Tokenizer> = match (&args.vocab, &args.tokenizer_json) {
        (Some(vocab), _) => Arc::new(
            HfTokenizer::wordpiece(vocab, args.lowercase)
                .with_context(|| format!("failed to build WordPiece tokenizer from {}", vocab.display()))?,
        ),
        (None, Some(path)) => Arc::new(
            HfTokenizer::from_file(path)
                .with_context(|| format!("failed to load tokenizer from {}", path.display()))?,
        ),
        (None, None) => bail!("either --vocab or --tokenizer-json is required"),
    };

    let mut source = source_with_workers(args.task, cfg.effective_workers());
    let split = if args.predict { Split::Dev } else { args.split };
    let examples = source
        .examples(split, &args.data_dir)
        .with_context(|| format!("failed to read {split} examples for {}", args.task))?;
    info!(
        "{}: {} {split} examples via the {} source",
        args.task,
        examples.len(),
        source.name()
    );

    let mode = if args.predict {
        LabelMode::Inference
    } else {
        LabelMode::labelled(&source.labels())
    };
    let assembler = FeatureAssembler::new(tokenizer, mode, &cfg)?;
    let converter = Converter::new(assembler, cfg);

    let total = examples.len();
    let progress = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template("{spinner} converting {pos}/{len} examples {elapsed}")
            .context("invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let output = converter.convert_with_progress(examples, |done, _| {
        if let Some(pb) = &progress {
            pb.set_position(done as u64);
        }
    })?;
    if let Some(pb) = progress {
        pb.finish_with_message("conversion complete");
    }

    let mut out = create_output(&args.output)?;
    for record in &output.records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    info!("conversion complete: {}", output.metrics);
    println!(
        "✅ wrote {} feature records to {}",
        output.records.len(),
        args.output.display()
    );
    println!("   {}", output.metrics);
    Ok(())
}

fn run_labels(args: &LabelsArgs) -> Result<()> {
    let labels = source_for(args.task).labels();
    for (id, label) in labels.labels().iter().enumerate() {
        println!("{id}\t{label}");
    }
    Ok(())
}

fn run_predictions(args: &PredictionsArgs) -> Result<()> {
    let mut record_ids = Vec::new();
    let features = open_buffered(&args.features)?;
    for (idx, line) in features.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", args.features.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FeatureRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid feature record", args.features.display(), idx + 1))?;
        let id = record.record_id.ok_or_else(|| {
            anyhow!(
                "{}:{}: record has no id; convert with --predict",
                args.features.display(),
                idx + 1
            )
        })?;
        record_ids.push(id);
    }

    let text = fs::read_to_string(&args.predicted)
        .with_context(|| format!("failed to read {}", args.predicted.display()))?;
    let predicted = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(idx, line)| {
            line.trim()
                .parse::<usize>()
                .with_context(|| format!("{}:{}: not a label id", args.predicted.display(), idx + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    let labels = source_for(args.task).labels();
    write_predictions(create_output(&args.output)?, &record_ids, &predicted, &labels)?;
    println!(
        "✅ wrote {} predictions to {}",
        predicted.len(),
        args.output.display()
    );
    Ok(())
}

fn run_report(args: &ReportArgs) -> Result<()> {
    let metrics: Vec<(&str, f64)> = args
        .metrics
        .iter()
        .map(|(name, value)| (name.as_str(), *value))
        .collect();
    info!("***** Eval results *****");
    write_eval_report(create_output(&args.output)?, &metrics)?;
    println!("✅ wrote report to {}", args.output.display());
    Ok(())
}

fn parse_metric(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("metric name missing in {raw:?}"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid value in {raw:?}: {err}"))?;
    Ok((name.to_string(), value))
}
