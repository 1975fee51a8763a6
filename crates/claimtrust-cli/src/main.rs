//! ClaimTrust CLI
//!
//! Usage:
//!   claimtrust check "Laut offizieller Statistik ..." --lang de
//!   claimtrust batch claims.jsonl --policy policy.yaml
//!   claimtrust validate-policy policy.yaml
//!   claimtrust trust who.int rki.de example.com

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use claimtrust_core::{
    types::normalize_domain, ClaimRequest, EvidenceItem, PolicyConfig, PolicyError,
    PolicyOverrides, TrustScorer,
};
use claimtrust_runtime::{
    CancellationToken, ChainOrchestrator, ClaimWorkerPool, Mode, RuntimeConfig,
};

#[derive(Parser)]
#[command(name = "claimtrust")]
#[command(about = "Multi-provider fact-check consensus with an auditable trail")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Provider mode
    #[arg(long, global = true)]
    mode: Option<Mode>,

    /// Policy file (YAML or JSON); built-in defaults when omitted
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    /// Runtime config file (YAML): timeouts, retries, provider endpoints
    #[arg(long, global = true)]
    runtime: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fact-check one claim and print its ClaimTrust record
    Check {
        /// The claim text
        text: String,

        /// Language code, e.g. de or en-US
        #[arg(long)]
        lang: Option<String>,

        #[arg(long)]
        topic: Option<String>,

        /// Claim id; a UUID is assigned when omitted
        #[arg(long)]
        id: Option<String>,

        /// Token budget for this claim; negative means unlimited
        #[arg(long, allow_hyphen_values = true)]
        max_tokens: Option<i64>,

        /// Providers consulted at most
        #[arg(long)]
        max_fallbacks: Option<u32>,
    },

    /// Fact-check a JSON-lines file of claim requests
    Batch {
        /// One ClaimRequest JSON object per line
        file: PathBuf,
    },

    /// Check a policy file against the schema and semantic rules
    ValidatePolicy {
        file: PathBuf,
    },

    /// Show source trust for domains
    Trust {
        #[arg(required = true)]
        domains: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Check {
            ref text,
            ref lang,
            ref topic,
            ref id,
            max_tokens,
            max_fallbacks,
        } => {
            let overrides = PolicyOverrides {
                max_tokens,
                max_fallbacks,
                ..Default::default()
            };
            let mut claim = ClaimRequest::new(text.clone());
            claim.language = lang.clone();
            claim.topic = topic.clone();
            claim.claim_id = id.clone();
            if !overrides.is_empty() {
                claim.policy_overrides = Some(overrides);
            }

            let orchestrator = build_orchestrator(&cli)?;
            let cancel = cancel_on_ctrl_c();
            let report = orchestrator
                .evaluate_with_report(&claim, &cancel)
                .await
                .context("claim evaluation failed")?;

            for failure in &report.run.failures {
                eprintln!("provider {} failed: {}", failure.provider, failure.error);
            }
            println!("{}", report.record.to_json_pretty()?);
        }

        Commands::Batch { ref file } => {
            let claims = read_claims(file)?;
            let orchestrator = Arc::new(build_orchestrator(&cli)?);
            let pool = ClaimWorkerPool::new(orchestrator);
            let cancel = cancel_on_ctrl_c();

            let results = pool.run(claims, &cancel).await;
            for (index, result) in results.into_iter().enumerate() {
                match result {
                    Ok(record) => println!("{}", record.to_json()?),
                    Err(error) => eprintln!(
                        "{}",
                        serde_json::json!({"index": index, "error": error.to_string()})
                    ),
                }
            }
            eprintln!("{}", serde_json::to_string_pretty(&pool.usage())?);
        }

        Commands::ValidatePolicy { ref file } => match PolicyConfig::from_file(file) {
            Ok(policy) => {
                println!("Policy is valid");
                println!(
                    "  Providers: {}",
                    policy.provider_ids().collect::<Vec<_>>().join(" → ")
                );
                println!("  Max tokens per claim: {}", policy.max_tokens_per_job.to_signed());
                println!("  Max fallbacks: {}", policy.max_fallbacks);
                println!("  Worker concurrency: {}", policy.worker_concurrency);
            }
            Err(PolicyError::SchemaViolation(errors)) => {
                println!("Policy has schema violations:");
                for error in &errors {
                    println!("  - {}", error);
                }
                std::process::exit(1);
            }
            Err(error) => {
                println!("Policy is invalid: {}", error);
                std::process::exit(1);
            }
        },

        Commands::Trust { ref domains } => {
            let scorer = TrustScorer::new();
            let now = Utc::now();
            let items: Vec<EvidenceItem> = domains.iter().map(EvidenceItem::new).collect();
            let per_domain: Vec<_> = domains
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "domain": normalize_domain(d),
                        "trust": scorer.base_trust(d),
                    })
                })
                .collect();

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "domains": per_domain,
                    "score": scorer.score(&items, now),
                }))?
            );
        }
    }

    Ok(())
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_orchestrator(cli: &Cli) -> anyhow::Result<ChainOrchestrator> {
    let policy = match &cli.policy {
        Some(path) => PolicyConfig::from_file(path)
            .with_context(|| format!("loading policy {}", path.display()))?,
        None => PolicyConfig::default(),
    };

    let mut config = match &cli.runtime {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading runtime config {}", path.display()))?;
            RuntimeConfig::from_yaml(&contents)
                .with_context(|| format!("parsing runtime config {}", path.display()))?
        }
        None => RuntimeConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config = config.with_mode(mode);
    }

    tracing::info!(
        mode = %config.mode,
        providers = ?policy.provider_ids().collect::<Vec<_>>(),
        "Starting ClaimTrust"
    );

    Ok(ChainOrchestrator::builder(policy).config(config).build()?)
}

fn read_claims(path: &Path) -> anyhow::Result<Vec<ClaimRequest>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening claims file {}", path.display()))?;

    let mut claims = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let claim: ClaimRequest = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid claim request", path.display(), number + 1))?;
        claims.push(claim);
    }
    Ok(claims)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight claims");
            trigger.cancel();
        }
    });
    cancel
}
