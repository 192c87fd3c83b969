//! scaffdiff: generate and cache upgrade patches
//!
//! Thin command-line front end over the diff pipeline and the batch
//! orchestrator.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use scaffdiff::trigger::{self, SIGNATURE_HEADER};
use scaffdiff::{
    BatchOrchestrator, BatchOutcome, Config, DiffLocation, DiffPipeline, Feature, FeatureSet,
    PatchStore, ScaffdiffBuilder, Secrets, StaticVersions, Version,
};

/// Scaffdiff CLI
#[derive(Parser)]
#[command(name = "scaffdiff")]
#[command(version = scaffdiff::PKG_VERSION)]
#[command(about = "Upgrade patches between generated project versions")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "SCAFFDIFF_CONFIG")]
    config: Option<PathBuf>,

    /// Print full error chains instead of the short user message
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the patch for one version pair
    Diff {
        /// Current version (or use --slug)
        current: Option<String>,
        /// Upgrade version
        upgrade: Option<String>,
        /// Page slug, e.g. 7.0.0..7.5.0-prisma-tailwind
        #[arg(long, conflicts_with_all = ["current", "upgrade"])]
        slug: Option<String>,
        /// Enabled feature (repeatable)
        #[arg(short, long = "feature")]
        features: Vec<Feature>,
    },

    /// List cache keys of known targets that have no cached patch
    Missing {
        /// Stop after this many
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Generate up to `count` missing patches
    Batch {
        count: usize,
    },

    /// Generate every missing patch for the configured versions
    Backfill,

    /// Handle a release webhook delivery
    Webhook {
        /// Value of the x-hub-signature-256 header
        #[arg(long)]
        signature: Option<String>,
        /// File holding the raw body (or omit to read from stdin)
        #[arg(long)]
        body: Option<PathBuf>,
    },

    /// List cached patch keys
    Keys,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialise tracing (default: info for scaffdiff; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scaffdiff=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!(version = %scaffdiff::version_string(), "starting scaffdiff");
    let verbose = args.verbose;

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            if verbose {
                eprintln!("error: {e}");
                let mut source = std::error::Error::source(&e);
                while let Some(cause) = source {
                    eprintln!("  caused by: {cause}");
                    source = cause.source();
                }
            } else {
                eprintln!("error: {}", e.user_message());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> scaffdiff::Result<ExitCode> {
    let config = Config::load(args.config.as_deref())?;
    let pipeline = Arc::new(ScaffdiffBuilder::from_config(&config).build()?);

    match args.command {
        Command::Diff {
            current,
            upgrade,
            slug,
            features,
        } => {
            let location = match (slug, current, upgrade) {
                (Some(slug), _, _) => DiffLocation::from_slug(&slug)?,
                (None, Some(current), Some(upgrade)) => {
                    let features: FeatureSet = features.into_iter().collect();
                    DiffLocation::parse(&current, &upgrade, features)?
                }
                _ => {
                    return Err(scaffdiff::ScaffdiffError::InvalidLocation(
                        "expected <CURRENT> <UPGRADE> or --slug".to_string(),
                    ));
                }
            };
            let patch = pipeline.generate_diff(&location).await?;
            print!("{patch}");
        }

        Command::Missing { limit } => {
            let batch = orchestrator(&pipeline, &config);
            for location in batch.missing(known_targets(&config)?, limit).await? {
                println!("{}", location.cache_key());
            }
        }

        Command::Batch { count } => {
            let batch = orchestrator(&pipeline, &config);
            let outcomes = batch.run_missing(known_targets(&config)?, Some(count)).await?;
            return Ok(report(&outcomes));
        }

        Command::Backfill => {
            let outcomes = backfill(&pipeline, &config, None).await?;
            return Ok(report(&outcomes));
        }

        Command::Webhook { signature, body } => {
            let body = read_body(body)?;
            let secrets = Secrets::load()?;
            trigger::verify_signature(
                secrets.require_webhook_secret()?,
                &body,
                signature.as_deref(),
            )?;

            let event = trigger::parse_release_event(&body)?;
            if !event.triggers_backfill() {
                println!("ignored {:?} event for {}", event.action, event.release.name);
                return Ok(ExitCode::SUCCESS);
            }
            let released = event.release.version()?;
            println!("release {released} published, starting backfill");
            let outcomes = backfill(&pipeline, &config, Some(released)).await?;
            return Ok(report(&outcomes));
        }

        Command::Keys => {
            let mut keys: Vec<_> = pipeline.store().list_keys().await?.into_iter().collect();
            keys.sort();
            for key in keys {
                println!("{key}");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn orchestrator(pipeline: &Arc<DiffPipeline>, config: &Config) -> BatchOrchestrator {
    BatchOrchestrator::new(pipeline.clone(), pipeline.store())
        .with_group_size(config.batch.group_size)
}

fn known_targets(config: &Config) -> scaffdiff::Result<Vec<DiffLocation>> {
    Ok(scaffdiff::batch::targets_for_versions(
        &config.versions.parsed()?,
    ))
}

/// Backfill every configured version, plus `released` if it is not yet listed.
async fn backfill(
    pipeline: &Arc<DiffPipeline>,
    config: &Config,
    released: Option<Version>,
) -> scaffdiff::Result<Vec<BatchOutcome>> {
    let mut versions = config.versions.parsed()?;
    versions.extend(released);
    let source = StaticVersions::new(versions);
    orchestrator(pipeline, config).run_all_missing(&source).await
}

/// Print per-location results; failure if any location failed.
fn report(outcomes: &[BatchOutcome]) -> ExitCode {
    let mut failed = 0;
    for outcome in outcomes {
        match &outcome.result {
            Ok(_) => println!("ok     {}", outcome.location),
            Err(e) => {
                failed += 1;
                println!("failed {}: {e}", outcome.location);
            }
        }
    }
    println!("{} generated, {failed} failed", outcomes.len() - failed);
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Read the webhook body from a file or stdin.
fn read_body(path: Option<PathBuf>) -> scaffdiff::Result<Vec<u8>> {
    if let Some(path) = path {
        return Ok(std::fs::read(path)?);
    }
    if io::stdin().is_terminal() {
        return Err(scaffdiff::ScaffdiffError::InvalidEvent(format!(
            "no body provided; pipe the delivery on stdin (signature goes in --signature, from {SIGNATURE_HEADER})"
        )));
    }
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;
    Ok(buf)
}
