use clap::{Args, Parser, Subcommand};
use dmatch_cli::{MatchSession, SessionResult, load_config, run_suite, write_matches};
use dmatch_engine::{MatchReport, MatcherConfig, MatcherKind, MetricFamily, SelectionStrategy};
use dmatch_store::FeatureDump;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dmatch")]
#[command(about = "Match keypoint descriptors between two images", long_about = None)]
struct Cli {
    /// Log per-call details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match source descriptors against reference descriptors
    Match(MatchArgs),
    /// Run every matcher, selector and cross-check combination
    Suite(SuiteArgs),
}

#[derive(Args)]
struct Inputs {
    /// Source feature dump (.json, .bin or .dat)
    #[arg(short, long)]
    source: PathBuf,
    /// Reference feature dump (.json, .bin or .dat)
    #[arg(short, long)]
    reference: PathBuf,
    /// Descriptor family: binary or continuous (defaults to the source dump's family)
    #[arg(long)]
    metric: Option<MetricFamily>,
}

#[derive(Args)]
struct MatchArgs {
    #[command(flatten)]
    inputs: Inputs,
    /// brute-force or approximate (MAT_BF / MAT_FLANN)
    #[arg(short, long)]
    matcher: Option<MatcherKind>,
    /// nearest or knn-ratio (SEL_NN / SEL_KNN)
    #[arg(long)]
    selector: Option<SelectionStrategy>,
    /// Keep only mutual nearest neighbours
    #[arg(long)]
    cross_check: bool,
    /// Distance ratio threshold for knn-ratio
    #[arg(long)]
    ratio: Option<f32>,
    /// Randomized kd-trees in the approximate index
    #[arg(long)]
    trees: Option<usize>,
    /// Leaf checks per query in the approximate index
    #[arg(long)]
    checks: Option<usize>,
    /// Dedicated worker threads
    #[arg(short, long)]
    threads: Option<usize>,
    /// Matcher configuration file (.toml or .json); flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write matches to this JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct SuiteArgs {
    #[command(flatten)]
    inputs: Inputs,
    /// Dedicated worker threads
    #[arg(short, long)]
    threads: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Match(args) => run_match(args),
        Commands::Suite(args) => run_suite_command(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_inputs(inputs: &Inputs) -> SessionResult<(FeatureDump, FeatureDump, MetricFamily)> {
    let source = FeatureDump::load(&inputs.source)?;
    let reference = FeatureDump::load(&inputs.reference)?;
    let metric = inputs.metric.unwrap_or_else(|| source.family());
    info!(
        "{} source and {} reference {} descriptors",
        source.len(),
        reference.len(),
        source.family()
    );
    Ok((source, reference, metric))
}

fn run_match(args: MatchArgs) -> SessionResult<()> {
    let (source, reference, metric) = load_inputs(&args.inputs)?;

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => MatcherConfig::new(metric),
    };
    if args.inputs.metric.is_some() {
        config.metric = metric;
    }
    let mut builder = config.to_builder();
    if let Some(kind) = args.matcher {
        builder = builder.matcher(kind);
    }
    if let Some(selector) = args.selector {
        builder = builder.selector(selector);
    }
    if args.cross_check {
        builder = builder.cross_check(true);
    }
    if let Some(ratio) = args.ratio {
        builder = builder.ratio(ratio);
    }
    if let Some(trees) = args.trees {
        builder = builder.trees(trees);
    }
    if let Some(checks) = args.checks {
        builder = builder.checks(checks);
    }
    if let Some(threads) = args.threads {
        builder = builder.threads(threads);
    }

    let session = MatchSession::from_builder(builder)?;
    let report = session.match_dumps(&source, &reference)?;
    print_report(&session.config().matcher.to_string(), session.config(), &report);

    if let Some(path) = &args.output {
        write_matches(path, &report.matches)?;
        info!("Saved {} matches to {}", report.matches.len(), path.display());
    }
    Ok(())
}

fn run_suite_command(args: SuiteArgs) -> SessionResult<()> {
    let (source, reference, metric) = load_inputs(&args.inputs)?;
    let mut base = MatcherConfig::new(metric);
    base.threads = args.threads;

    let runs = run_suite(&source, &reference, &base);
    let mut failures = 0;
    for run in &runs {
        match &run.outcome {
            Ok(report) => {
                let config = MatcherConfig {
                    matcher: run.matcher,
                    selector: run.selector,
                    cross_check: run.cross_check,
                    ..base.clone()
                };
                print_report(&run.label(), &config, report);
            }
            Err(e) => {
                failures += 1;
                warn!("{}: {}", run.label(), e);
            }
        }
    }
    info!("{} of {} runs succeeded", runs.len() - failures, runs.len());
    Ok(())
}

fn print_report(label: &str, config: &MatcherConfig, report: &MatchReport) {
    println!(
        "{} ({}) with k={} n={} matches in {:.3} ms",
        label,
        config.selector,
        report.k,
        report.matches.len(),
        report.elapsed_ms()
    );
    if report.k == 2 {
        println!(
            "  discarded {:.1} % of {} candidate pairs (ratio {:.2})",
            report.discarded_fraction() * 100.0,
            report.queried,
            config.ratio
        );
    }
}
