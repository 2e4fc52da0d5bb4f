//! CLI entry point for `phishtriage`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use phishtriage::classify::artifact::{load_classifier, load_vectorizer, save_artifact};
use phishtriage::classify::{FittedClassifier, FittedVectorizer, PhishingClassifier};
use phishtriage::config::{self, Config};
use phishtriage::mailbox::{GmailMailbox, ImapMailbox, Mailbox, MboxMailbox};
use phishtriage::reasons::{extract_reasons, join_reasons};
use phishtriage::text::Normalizer;
use phishtriage::triage::{export, ScanReport, Scheduler, TriageController};

#[derive(Parser)]
#[command(
    name = "phishtriage",
    version,
    about = "Classify email as phishing or legitimate and label suspicious messages"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (overrides the default search path)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Fitted vectorizer artifact
    #[arg(long, value_name = "FILE", global = true)]
    vectorizer: Option<PathBuf>,

    /// Fitted classifier artifact
    #[arg(long, value_name = "FILE", global = true)]
    model: Option<PathBuf>,
}

/// Which mailbox to scan.
#[derive(Args)]
struct MailboxArgs {
    /// Scan the Gmail inbox of the configured account
    #[arg(long, conflicts_with_all = ["imap", "mbox"])]
    gmail: bool,

    /// Scan the configured IMAP folder (app-password login)
    #[arg(long, conflicts_with = "mbox")]
    imap: bool,

    /// Scan a local MBOX file (labels go to a sidecar file)
    #[arg(long, value_name = "FILE")]
    mbox: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one text (argument, --file, or stdin)
    Classify {
        text: Option<String>,
        /// Read the text from a file; `.eml` files are decoded first
        #[arg(long, value_name = "FILE", conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show why a text looks risky, without classifying it
    Reasons {
        text: Option<String>,
        #[arg(long, value_name = "FILE", conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// Scan recent messages once and label the phishing ones
    Scan {
        #[command(flatten)]
        source: MailboxArgs,
        /// Number of recent messages to scan
        #[arg(short = 'n', long, value_name = "N")]
        max_messages: Option<usize>,
        #[arg(long)]
        json: bool,
        /// Also write the report as CSV
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
        /// Classify and report without changing any labels
        #[arg(long)]
        dry_run: bool,
    },
    /// Scan repeatedly on an interval until interrupted
    Watch {
        #[command(flatten)]
        source: MailboxArgs,
        #[arg(short = 'n', long, value_name = "N")]
        max_messages: Option<usize>,
        #[arg(long, value_name = "MINUTES")]
        interval_minutes: Option<u64>,
        /// Stop after this many scans
        #[arg(long, value_name = "K")]
        cycles: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Describe the loaded model artifacts
    Model {
        /// Write bincode copies of both artifacts into this directory
        #[arg(long, value_name = "DIR")]
        export: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config(),
    };
    if let Some(path) = &cli.vectorizer {
        config.model.vectorizer_path = path.clone();
    }
    if let Some(path) = &cli.model {
        config.model.classifier_path = path.clone();
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Classify { text, file, json } => {
            cmd_classify(&config, text, file.as_deref(), json)
        }
        Commands::Reasons { text, file } => cmd_reasons(text, file.as_deref()),
        Commands::Scan {
            source,
            max_messages,
            json,
            csv,
            dry_run,
        } => cmd_scan(
            &config,
            &source,
            max_messages.unwrap_or(config.scan.max_messages),
            json,
            csv.as_deref(),
            dry_run,
        ),
        Commands::Watch {
            source,
            max_messages,
            interval_minutes,
            cycles,
            dry_run,
        } => {
            let interval = interval_minutes
                .map(config::minutes)
                .unwrap_or_else(|| config.scan.interval());
            cmd_watch(
                &config,
                &source,
                max_messages.unwrap_or(config.scan.max_messages),
                interval,
                cycles,
                dry_run,
            )
        }
        Commands::Model { export } => cmd_model(&config, export.as_deref()),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "phishtriage.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn load_pipeline(config: &Config) -> anyhow::Result<PhishingClassifier> {
    let normalizer = Normalizer::new(config.normalizer.to_normalizer_config());
    Ok(PhishingClassifier::load(&config.model, normalizer)?)
}

/// Text from the argument, a file, or stdin, in that order.
fn read_input(text: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let is_eml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"));
        return Ok(if is_eml {
            phishtriage::parser::decode(&bytes).body
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        });
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn cmd_classify(
    config: &Config,
    text: Option<String>,
    file: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let classifier = load_pipeline(config)?;
    let input = read_input(text, file)?;
    let analysis = classifier.analyze(&input);

    if json {
        let output = serde_json::json!({
            "verdict": analysis.verdict,
            "headline": analysis.verdict.headline(),
            "reasons": analysis.reasons.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            "canonical": analysis.canonical,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", analysis.verdict.headline());
        println!("Reasons: {}", join_reasons(&analysis.reasons));
    }
    Ok(())
}

fn cmd_reasons(text: Option<String>, file: Option<&Path>) -> anyhow::Result<()> {
    let input = read_input(text, file)?;
    for reason in extract_reasons(&input) {
        println!("{reason}");
    }
    Ok(())
}

fn open_mailbox(source: &MailboxArgs, config: &Config) -> anyhow::Result<Box<dyn Mailbox>> {
    if source.gmail {
        return Ok(Box::new(GmailMailbox::new(config.gmail.clone())?));
    }
    if source.imap {
        return Ok(Box::new(ImapMailbox::new(config.imap.clone())));
    }
    let path = source
        .mbox
        .clone()
        .or_else(|| config.mbox.path.clone())
        .context("choose a mailbox with --gmail, --imap or --mbox FILE")?;
    let mailbox = MboxMailbox::open(path);
    tracing::info!(
        mbox = %mailbox.path().display(),
        labels = %mailbox.sidecar_path().display(),
        "Using local MBOX mailbox"
    );
    Ok(Box::new(mailbox))
}

fn build_controller(
    config: &Config,
    source: &MailboxArgs,
    dry_run: bool,
) -> anyhow::Result<TriageController<Box<dyn Mailbox>>> {
    let classifier = Arc::new(load_pipeline(config)?);
    let mailbox = open_mailbox(source, config)?;
    let mut options = config.scan.scan_options();
    options.dry_run = dry_run;
    Ok(TriageController::new(mailbox, classifier, options))
}

fn scan_with_progress(
    controller: &mut TriageController<Box<dyn Mailbox>>,
    max_messages: usize,
) -> phishtriage::error::Result<ScanReport> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Scanning [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    let result = controller.scan_and_label_with_progress(
        max_messages,
        Some(&|done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        }),
    );
    pb.finish_and_clear();
    result
}

fn print_report(report: &ScanReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", export::to_json(report)?);
        return Ok(());
    }
    println!();
    export::write_table(report, &mut std::io::stdout().lock())?;
    println!();
    println!(
        "  {} message(s), {} phishing, {} labeled, {} problem(s) in {:.1}s",
        report.rows.len(),
        report.phishing_count(),
        report.labeled_count(),
        report.failures.len(),
        report.elapsed().num_milliseconds() as f64 / 1000.0
    );
    Ok(())
}

fn cmd_scan(
    config: &Config,
    source: &MailboxArgs,
    max_messages: usize,
    json: bool,
    csv: Option<&Path>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let mut controller = build_controller(config, source, dry_run)?;
    let report = scan_with_progress(&mut controller, max_messages)?;

    print_report(&report, json)?;
    if let Some(path) = csv {
        export::export_csv(&report, path)?;
        eprintln!("  Exported CSV to {}", path.display());
    }
    Ok(())
}

fn cmd_watch(
    config: &Config,
    source: &MailboxArgs,
    max_messages: usize,
    interval: Duration,
    cycles: Option<usize>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let mut controller = build_controller(config, source, dry_run)?;
    let scheduler = Scheduler::new(interval).with_max_cycles(cycles);

    let stop = scheduler.stop_handle();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
        .context("installing Ctrl-C handler")?;

    let summary = scheduler.run(|cycle| {
        eprintln!("Checking for phishing emails (scan {cycle})...");
        let report = scan_with_progress(&mut controller, max_messages)?;
        print_report(&report, false)?;
        eprintln!(
            "Next scan in {} minute(s). Press Ctrl-C to stop.",
            interval.as_secs() / 60
        );
        anyhow::Ok(())
    });

    eprintln!(
        "Stopped after {} scan(s), {} failed.",
        summary.cycles, summary.failed
    );
    Ok(())
}

fn cmd_model(config: &Config, export_dir: Option<&Path>) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let vectorizer = load_vectorizer(
        &config.model.vectorizer_path,
        config.model.vectorizer_sha256.as_deref(),
    )?;
    let classifier = load_classifier(
        &config.model.classifier_path,
        config.model.classifier_sha256.as_deref(),
    )?;
    let normalizer = config.normalizer.to_normalizer_config();

    println!();
    println!("  {:<20} {}", "Vectorizer", vectorizer.path.display());
    println!("  {:<20} {}", "  kind", vectorizer.value.kind());
    println!("  {:<20} {}", "  size", format_size(vectorizer.size, BINARY));
    println!("  {:<20} {}", "  features", vectorizer.value.dimension());
    println!("  {:<20} {}", "  sha256", vectorizer.sha256);
    println!("  {:<20} {}", "Classifier", classifier.path.display());
    println!("  {:<20} {}", "  kind", classifier.value.kind());
    println!("  {:<20} {}", "  size", format_size(classifier.size, BINARY));
    println!("  {:<20} {}", "  features", classifier.value.n_features());
    println!("  {:<20} {:?}", "  classes", classifier.value.classes());
    println!("  {:<20} {}", "  sha256", classifier.sha256);
    println!("  {:<20} {} word(s)", "Stop words", normalizer.stop_words().len());
    println!("  {:<20} {:?}", "Stemmer", normalizer.stemmer());
    println!("  {:<20} {}", "Fingerprint", normalizer.fingerprint());

    if vectorizer.value.dimension() != classifier.value.n_features() {
        println!();
        println!("  WARNING: vectorizer and classifier feature counts differ");
    }
    println!();

    if let Some(dir) = export_dir {
        std::fs::create_dir_all(dir)?;
        let vec_out = dir.join("vectorizer.bin");
        let clf_out = dir.join("phishing_model.bin");
        save_artifact(&vectorizer.value, &vec_out)?;
        save_artifact(&classifier.value, &clf_out)?;
        println!("  Exported {} and {}", vec_out.display(), clf_out.display());
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "phishtriage", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
