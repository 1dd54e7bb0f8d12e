//! Evalgate CLI
//!
//! The `evalgate` command resolves evaluation contracts and gates runs
//! against them.
//!
//! ## Commands
//!
//! - `resolve`: Resolve, validate and optionally live-check a contract
//! - `compare`: Compare a candidate run against the baseline
//! - `failures`: List the worst-scoring items of a run
//! - `bootstrap`: Create a dataset and write its evaluation metadata
//! - `baseline`: Record a run as the dataset's baseline
//! - `export`: Export dataset metadata as snapshot files

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, Level};

use evalgate_core::contract::DEFAULT_SNAPSHOT_DIR;
use evalgate_core::{
    extract_failures, resolve_contract, resolve_live_contract, validate_contract, write_snapshot,
    BootstrapRequest, ComparisonReport, EvalConfig, EvalContract, EvalError, EvalInfraManager,
    FailureQuery, LiveValidator, RunMetricsReader,
};
use evalgate_store::{RestClient, RestConfig};

/// Contract could not be resolved (missing file, bad shape).
const EXIT_RESOLUTION: u8 = 2;
/// Contract failed structural validation.
const EXIT_INVALID: u8 = 3;
/// Contract disagrees with live platform state.
const EXIT_LIVE_MISMATCH: u8 = 4;
/// A critical dimension failed its guard.
const EXIT_GUARD_FAILED: u8 = 5;

#[derive(Parser)]
#[command(name = "evalgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluation contract resolution and run gating", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    platform: PlatformArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PlatformArgs {
    /// Platform base URL
    #[arg(long, env = "EVALGATE_HOST", global = true)]
    host: Option<String>,

    /// Platform public key
    #[arg(long, env = "EVALGATE_PUBLIC_KEY", global = true, hide_env_values = true)]
    public_key: Option<String>,

    /// Platform secret key
    #[arg(long, env = "EVALGATE_SECRET_KEY", global = true, hide_env_values = true)]
    secret_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "EVALGATE_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,

    /// Label judge prompts must carry
    #[arg(long, env = "EVALGATE_PROMPT_LABEL", global = true)]
    prompt_label: Option<String>,
}

#[derive(Args)]
struct ContractArgs {
    /// Agent name
    #[arg(short, long)]
    agent: String,

    /// Explicit snapshot path (overrides --snapshot-dir lookup)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Directory holding <agent>.yaml / <agent>.json snapshots
    #[arg(long, default_value = DEFAULT_SNAPSHOT_DIR)]
    snapshot_dir: PathBuf,

    /// Resolve from this dataset's live metadata instead of a snapshot
    #[arg(long)]
    live_dataset: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve, validate and optionally live-check a contract
    Resolve {
        #[command(flatten)]
        contract: ContractArgs,

        /// Cross-check identifiers against the live platform
        #[arg(long)]
        validate_live: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
    },

    /// Compare a candidate run against the baseline run
    Compare {
        #[command(flatten)]
        contract: ContractArgs,

        /// Candidate run name
        #[arg(long)]
        candidate: String,

        /// Baseline run name (default: the contract's baseline)
        #[arg(long)]
        baseline: Option<String>,
    },

    /// List the worst-scoring items of a run on one dimension
    Failures {
        #[command(flatten)]
        contract: ContractArgs,

        /// Run name
        #[arg(long)]
        run: String,

        /// Dimension (default: first contract dimension)
        #[arg(long)]
        dimension: Option<String>,

        /// Threshold override (0-1 or 0-10)
        #[arg(long)]
        threshold: Option<f64>,

        /// Maximum items to return
        #[arg(long, default_value = "20")]
        top: usize,
    },

    /// Create a dataset (if missing) and write its evaluation metadata
    Bootstrap {
        /// Dataset name
        #[arg(short, long)]
        dataset: String,

        /// Agent name
        #[arg(short, long)]
        agent: String,

        /// Dimensions as a JSON list of objects
        #[arg(long)]
        dimensions: String,

        /// Agent entry point recorded in metadata
        #[arg(long)]
        entry_point: Option<String>,

        /// Dataset description
        #[arg(long)]
        description: Option<String>,
    },

    /// Record a run's per-dimension means as the dataset baseline
    Baseline {
        /// Dataset name
        #[arg(short, long)]
        dataset: String,

        /// Run name
        #[arg(long)]
        run: String,
    },

    /// Export dataset metadata as <agent>.json and <agent>.yaml snapshots
    Export {
        /// Dataset name
        #[arg(short, long)]
        dataset: String,

        /// Agent name (snapshot file stem)
        #[arg(short, long)]
        agent: String,

        /// Output directory
        #[arg(short, long, default_value = DEFAULT_SNAPSHOT_DIR)]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    evalgate_core::telemetry::init_tracing(cli.json, level);

    let platform = Platform::new(&cli.platform);

    match cli.command {
        Commands::Resolve {
            contract,
            validate_live,
            format,
        } => cmd_resolve(&platform, &contract, validate_live, format).await,
        Commands::Compare {
            contract,
            candidate,
            baseline,
        } => cmd_compare(&platform, &contract, &candidate, baseline.as_deref()).await,
        Commands::Failures {
            contract,
            run,
            dimension,
            threshold,
            top,
        } => {
            let query = FailureQuery {
                dimension,
                threshold,
                top,
            };
            cmd_failures(&platform, &contract, &run, &query).await
        }
        Commands::Bootstrap {
            dataset,
            agent,
            dimensions,
            entry_point,
            description,
        } => {
            let dimensions: Vec<Value> = serde_json::from_str(&dimensions)
                .context("--dimensions must be a JSON list")?;
            let request = BootstrapRequest {
                dataset,
                agent,
                entry_point,
                description,
                dimensions,
            };
            cmd_bootstrap(&platform, &request).await
        }
        Commands::Baseline { dataset, run } => cmd_baseline(&platform, &dataset, &run).await,
        Commands::Export {
            dataset,
            agent,
            output_dir,
        } => cmd_export(&platform, &dataset, &agent, &output_dir).await,
    }
}

// ---------------------------------------------------------------------------
// Platform wiring
// ---------------------------------------------------------------------------

/// Lazily connected platform settings. Commands that never touch the network
/// never require credentials.
struct Platform {
    rest: RestConfig,
    eval: EvalConfig,
}

impl Platform {
    fn new(args: &PlatformArgs) -> Self {
        let mut rest = RestConfig::from_env();
        let mut eval = EvalConfig::from_env();
        if let Some(host) = &args.host {
            rest.host = host.clone();
        }
        if let (Some(pk), Some(sk)) = (&args.public_key, &args.secret_key) {
            rest = rest.with_credentials(pk, sk);
        }
        if let Some(secs) = args.timeout_secs {
            rest = rest.with_timeout(Duration::from_secs(secs));
            eval = eval.with_timeout(Duration::from_secs(secs));
        }
        if let Some(label) = &args.prompt_label {
            rest = rest.with_prompt_label(label);
        }
        Self { rest, eval }
    }

    fn client(&self) -> Result<Arc<RestClient>> {
        let client = RestClient::new(self.rest.clone())
            .with_context(|| format!("Failed to configure platform client for {}", self.rest.host))?;
        Ok(Arc::new(client))
    }

    fn reader(&self) -> Result<RunMetricsReader> {
        let client = self.client()?;
        Ok(RunMetricsReader::new(client.clone(), client).with_config(self.eval.clone()))
    }

    fn manager(&self) -> Result<EvalInfraManager> {
        let client = self.client()?;
        Ok(
            EvalInfraManager::new(client.clone(), client.clone(), client)
                .with_config(self.eval.clone())
                .with_host(&self.rest.host),
        )
    }
}

async fn load_contract(platform: &Platform, args: &ContractArgs) -> Result<EvalContract, EvalError> {
    match &args.live_dataset {
        Some(dataset) => {
            let client = platform
                .client()
                .map_err(|e| EvalError::ContractNotFound(format!("{e:#}")))?;
            resolve_live_contract(client.as_ref(), dataset, &args.agent).await
        }
        None => resolve_contract(&args.snapshot_dir, &args.agent, args.path.as_deref()),
    }
}

/// Resolve and validate, printing the failure and returning its exit code
/// when the contract is unusable.
async fn usable_contract(
    platform: &Platform,
    args: &ContractArgs,
) -> Result<std::result::Result<EvalContract, ExitCode>> {
    let contract = match load_contract(platform, args).await {
        Ok(c) => c,
        Err(e) => {
            print_json(&json!({"status": "error", "error": e.to_string()}))?;
            return Ok(Err(ExitCode::from(EXIT_RESOLUTION)));
        }
    };

    let errors = validate_contract(&contract);
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        print_json(&json!({"status": "invalid", "errors": messages}))?;
        return Ok(Err(ExitCode::from(EXIT_INVALID)));
    }
    Ok(Ok(contract))
}

fn dataset_name(contract: &EvalContract) -> Result<&str> {
    match contract.dataset.name.as_deref() {
        Some(name) => Ok(name),
        None => bail!("contract for {} names no dataset", contract.agent_name),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_resolve(
    platform: &Platform,
    args: &ContractArgs,
    validate_live: bool,
    format: Format,
) -> Result<ExitCode> {
    let contract = match usable_contract(platform, args).await? {
        Ok(c) => c,
        Err(code) => return Ok(code),
    };

    if validate_live {
        let client = platform.client()?;
        let validator = LiveValidator::new(client.clone(), client.clone(), client)
            .with_config(platform.eval.clone());
        let discrepancies = validator.validate_live(&contract).await;
        if !discrepancies.is_empty() {
            let messages: Vec<String> = discrepancies.iter().map(ToString::to_string).collect();
            print_json(&json!({"status": "live_invalid", "errors": messages}))?;
            return Ok(ExitCode::from(EXIT_LIVE_MISMATCH));
        }
    }

    match format {
        Format::Json => print_json(&contract)?,
        Format::Yaml => print!("{}", serde_yaml::to_string(&contract)?),
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_compare(
    platform: &Platform,
    args: &ContractArgs,
    candidate: &str,
    baseline: Option<&str>,
) -> Result<ExitCode> {
    let contract = match usable_contract(platform, args).await? {
        Ok(c) => c,
        Err(code) => return Ok(code),
    };
    let dataset = dataset_name(&contract)?;
    let baseline = match baseline {
        Some(b) => b.to_string(),
        None if !contract.baseline.run_name.is_empty() => contract.baseline.run_name.clone(),
        None => bail!("no --baseline given and the contract records no baseline run"),
    };

    let reader = platform.reader()?;
    let baseline_agg = reader
        .aggregate(dataset, &baseline)
        .await
        .with_context(|| format!("Failed to aggregate baseline run {baseline}"))?;
    let candidate_agg = reader
        .aggregate(dataset, candidate)
        .await
        .with_context(|| format!("Failed to aggregate candidate run {candidate}"))?;

    let report = ComparisonReport::build(&contract, &baseline_agg, &candidate_agg);
    print_json(&json!({
        "status": if report.guard_passed() { "passed" } else { "failed" },
        "report": report,
    }))?;

    if report.guard_passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_GUARD_FAILED))
    }
}

async fn cmd_failures(
    platform: &Platform,
    args: &ContractArgs,
    run: &str,
    query: &FailureQuery,
) -> Result<ExitCode> {
    let contract = match usable_contract(platform, args).await? {
        Ok(c) => c,
        Err(code) => return Ok(code),
    };
    let dataset = dataset_name(&contract)?;
    let (dimension, threshold) = query.resolve(&contract)?;

    let reader = platform.reader()?;
    let failures = extract_failures(&reader, &contract, dataset, run, query).await?;
    print_json(&json!({
        "status": "ok",
        "dataset": dataset,
        "run_name": run,
        "dimension": dimension,
        "threshold": threshold,
        "count": failures.len(),
        "failures": failures,
    }))?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_bootstrap(platform: &Platform, request: &BootstrapRequest) -> Result<ExitCode> {
    let outcome = platform
        .manager()?
        .bootstrap(request)
        .await
        .with_context(|| format!("Failed to bootstrap dataset {}", request.dataset))?;
    info!(dataset = %outcome.dataset.name, "bootstrap complete");
    print_json(&outcome)?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_baseline(platform: &Platform, dataset: &str, run: &str) -> Result<ExitCode> {
    let record = platform
        .manager()?
        .record_baseline(dataset, run)
        .await
        .with_context(|| format!("Failed to record baseline {run} on {dataset}"))?;
    print_json(&record)?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_export(
    platform: &Platform,
    dataset: &str,
    agent: &str,
    output_dir: &Path,
) -> Result<ExitCode> {
    let snapshot = platform
        .manager()?
        .export_snapshot(dataset)
        .await
        .with_context(|| format!("Failed to export dataset {dataset}"))?;
    let paths = write_snapshot(output_dir, agent, &snapshot)?;
    let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    print_json(&json!({"status": "exported", "paths": paths}))?;
    Ok(ExitCode::SUCCESS)
}
