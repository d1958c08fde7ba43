use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pagedefer_cli::output::emit_structured;
use pagedefer_cli::{render_page, simulate, OutputFormat, PageManifest, SimulationReport};
use pagedefer_policy_center::{load_snapshot_with_options, LoadOptions, PolicySnapshot};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_POLICY_PATH: &str = "config/pagedefer.yaml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Policy file (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    output: OutputFormat,

    /// Policy override applied on top of file and environment (repeatable)
    #[arg(long = "set", value_name = "PATH=VALUE", global = true)]
    set: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the server-rendered HTML of a page manifest
    Render(RenderArgs),

    /// Play a manifest script against simulated hosts and report activations
    Simulate(SimulateArgs),

    /// Inspect the resolved policy
    Policy(PolicyArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// Page manifest (YAML or JSON)
    manifest: PathBuf,

    /// Flush the shell first, then one chunk per section
    #[arg(long)]
    stream: bool,
}

#[derive(Args)]
struct SimulateArgs {
    /// Page manifest (YAML or JSON)
    manifest: PathBuf,

    /// Stop waiting after this many milliseconds
    #[arg(long, default_value_t = 10_000)]
    max_ms: u64,
}

#[derive(Args)]
struct PolicyArgs {
    #[command(subcommand)]
    command: PolicyCommand,
}

#[derive(Subcommand)]
enum PolicyCommand {
    /// Show the resolved policy snapshot with provenance
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.debug)?;

    info!("Starting pagedefer v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        build_date = env!("BUILD_DATE"),
        git_hash = env!("GIT_HASH"),
        "build info"
    );

    let result = match cli.command {
        Commands::Render(ref args) => cmd_render(args, &cli).await,
        Commands::Simulate(ref args) => cmd_simulate(args, &cli).await,
        Commands::Policy(ref args) => cmd_policy(args, &cli),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

fn load_policy(cli: &Cli) -> Result<PolicySnapshot> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_POLICY_PATH));
    let mut options = LoadOptions::with_path(path);
    options.cli_overrides = cli.set.clone();
    load_snapshot_with_options(&options).context("Failed to load policy")
}

async fn cmd_render(args: &RenderArgs, cli: &Cli) -> Result<()> {
    let snapshot = load_policy(cli)?;
    let manifest = PageManifest::load(&args.manifest).await?;
    let chunks = render_page(&manifest, &snapshot, args.stream)
        .await
        .with_context(|| format!("Failed to render {}", args.manifest.display()))?;

    let mut stdout = std::io::stdout().lock();
    for chunk in &chunks {
        stdout.write_all(chunk.as_bytes())?;
        if args.stream {
            stdout.flush()?;
        }
    }
    writeln!(stdout)?;
    Ok(())
}

async fn cmd_simulate(args: &SimulateArgs, cli: &Cli) -> Result<()> {
    let snapshot = load_policy(cli)?;
    let manifest = PageManifest::load(&args.manifest).await?;
    let report = simulate(&manifest, &snapshot, args.max_ms).await?;
    if !emit_structured(&report, cli.output)? {
        print_report_human(&report);
    }
    Ok(())
}

fn print_report_human(report: &SimulationReport) {
    println!(
        "Page: {} (policy rev {}, constrained={})",
        report.title, report.policy_rev, report.constrained
    );
    println!();
    for section in &report.sections {
        let at = section
            .activated_at_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".to_string());
        let cause = section
            .cause
            .map(|cause| cause.as_str())
            .unwrap_or("-");
        println!(
            "  {:<20} mode={:<12} strategy={:<12} phase={:<10} cause={:<20} at={}",
            section.id, section.mode, section.strategy, section.phase, cause, at
        );
    }
    println!();
    println!(
        "Elapsed → {}ms, pending={}",
        report.elapsed_ms,
        report.pending.len()
    );
    println!(
        "Metrics → armed={} activated={} torn_down={} duplicate_fires={} unmounted_pending={}",
        report.metrics.armed,
        report.metrics.activated,
        report.metrics.guards_torn_down,
        report.metrics.duplicate_fires,
        report.metrics.unmounted_pending
    );
}

fn cmd_policy(args: &PolicyArgs, cli: &Cli) -> Result<()> {
    match args.command {
        PolicyCommand::Show => {
            let snapshot = load_policy(cli)?;
            if emit_structured(&snapshot, cli.output)? {
                return Ok(());
            }
            let activation = &snapshot.activation;
            println!("Policy Revision: {}", snapshot.rev);
            println!();
            println!(
                "Activation → min_delay_ms={}, idle_timeout_ms={}, idle_fallback_delay_ms={}",
                activation.min_delay_ms,
                activation.idle_timeout_ms,
                activation.idle_fallback_delay_ms
            );
            println!(
                "Ceilings → interaction_ceiling_ms={}, proximity_fallback_ms={}, root_margin_px={}",
                activation.interaction_ceiling_ms,
                activation.proximity_fallback_ms,
                activation.root_margin_px
            );
            println!(
                "Priorities → high=immediate, medium={}, low={}",
                snapshot.priorities.medium.as_str(),
                snapshot.priorities.low.as_str()
            );
            println!(
                "Viewport → constrained_max_width_px={}",
                snapshot.viewport.constrained_max_width_px
            );
            println!(
                "Features → table_of_contents={}, streaming_shell={}",
                snapshot.features.table_of_contents,
                snapshot.features.streaming_shell
            );
            println!();
            println!("Provenance:");
            let mut entries: Vec<_> = snapshot.provenance.values().collect();
            entries.sort_by(|a, b| a.path.cmp(&b.path));
            for entry in entries {
                println!("  {:<40} {:?}", entry.path, entry.source);
            }
        }
    }
    Ok(())
}
