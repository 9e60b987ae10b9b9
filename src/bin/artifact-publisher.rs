//! Artifact Publisher CLI
//!
//! Publishes build artifacts to local and remote feeds

use anyhow::{Context, Result, bail};
use artifact_publisher::{
    ArtifactProducer, CommandProducer, ConfigLoadOptions, ConfigLoader, ConsoleInteraction,
    CredentialStore, FeedPushStatus, InteractionMode, Orchestrator, PrebuiltArtifacts, PublishConfig, PublishError,
    PublishOptionsConfig, RepositoryVersionInfo, RunContext, RunOutcome, RunRequest, ToolPaths,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Termination with a configuration error
const EXIT_CONFIG_ERROR: i32 = -1;
/// Unhandled error
const EXIT_ERROR: i32 = -2;
/// One or more feeds failed to push
const EXIT_PUSH_FAILED: i32 = -3;

/// Build artifact publishing to local and remote feeds
#[derive(Parser)]
#[command(name = "artifact-publisher")]
#[command(version)]
#[command(about = "Publishes build artifacts to local and remote feeds", long_about = None)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan, build and push the missing artifacts
    Publish(RunArgs),

    /// Print the publication plan without building nor pushing
    Plan(RunArgs),

    /// Validate the effective configuration
    Check {
        /// Project path (defaults to current directory)
        #[arg(value_name = "PROJECT_PATH")]
        project_path: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Project path (defaults to current directory)
    #[arg(value_name = "PROJECT_PATH")]
    project_path: Option<PathBuf>,

    /// Repository version to publish
    #[arg(long = "version", env = "PUBLISH_VERSION")]
    repository_version: String,

    /// Publishable project identifier (repeatable)
    #[arg(long = "project", value_name = "ID", required = true)]
    projects: Vec<String>,

    /// Directory holding the artifact files (defaults to PROJECT_PATH/artifacts)
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Never prompt (build servers)
    #[arg(long, conflicts_with = "autointeraction")]
    nointeraction: bool,

    /// Answer every prompt with its default option
    #[arg(long)]
    autointeraction: bool,

    /// Preset a prompt answer, e.g. PushToRemote=N (repeatable)
    #[arg(long, value_name = "NAME=X", value_parser = parse_answer)]
    answer: Vec<(String, char)>,

    /// Continue even if every artifact is already published
    #[arg(long)]
    ignore_no_artifacts: bool,

    /// Force remote publishing on or off
    #[arg(long, value_name = "BOOL")]
    push_to_remote: Option<bool>,

    /// Write a JSON run report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

fn parse_answer(value: &str) -> Result<(String, char), String> {
    let (name, answer) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=X, got '{}'", value))?;
    let mut chars = answer.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !name.is_empty() => Ok((name.to_string(), c)),
        _ => Err(format!("expected a single character answer, got '{}'", value)),
    }
}

#[tokio::main]
async fn main() {
    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            let exit_code = match e.downcast_ref::<PublishError>() {
                Some(error) if error.is_fatal() => {
                    for action in error.suggested_actions() {
                        eprintln!("  💡 {}", action);
                    }
                    EXIT_CONFIG_ERROR
                }
                _ => EXIT_ERROR,
            };
            process::exit(exit_code);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { Level::DEBUG } else { Level::INFO });

    match cli.command {
        Commands::Publish(args) => run_command(args, false).await,
        Commands::Plan(args) => run_command(args, true).await,
        Commands::Check { project_path } => check_command(project_path).await,
    }
}

fn init_tracing(level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
}

async fn load_config(project_path: &Path, cli_args: Option<PublishConfig>) -> Result<PublishConfig> {
    let mut options = ConfigLoadOptions::for_project(project_path);
    options.cli_args = cli_args;
    let config = ConfigLoader::load(options).await?;

    let validation = ConfigLoader::validate(&config);
    if !validation.valid {
        eprintln!("{}", ConfigLoader::format_validation_result(&validation));
        bail!(PublishError::ConfigError("invalid configuration".to_string()));
    }
    if !validation.warnings.is_empty() {
        eprintln!("{}", ConfigLoader::format_validation_result(&validation));
    }
    Ok(config)
}

async fn run_command(args: RunArgs, plan_only: bool) -> Result<i32> {
    let project_path = args.project_path.unwrap_or_else(|| PathBuf::from("."));

    let cli_config = PublishConfig {
        publish: Some(PublishOptionsConfig {
            push_to_remote: args.push_to_remote,
            ignore_no_artifacts_to_produce: args.ignore_no_artifacts.then_some(true),
            interactive: args.nointeraction.then_some(false),
            ..Default::default()
        }),
        ..PublishConfig::layer()
    };
    let config = load_config(&project_path, Some(cli_config)).await?;

    let mode = if args.autointeraction {
        InteractionMode::AutoInteraction
    } else if args.nointeraction || !config.interactive() {
        InteractionMode::NoInteraction
    } else {
        InteractionMode::Interactive
    };
    let interaction = args
        .answer
        .into_iter()
        .fold(ConsoleInteraction::new(mode), |interaction, (name, answer)| {
            interaction.with_answer(name, answer)
        });

    let mut ctx = RunContext::new(config, &project_path, Arc::new(interaction))?;
    if let Some(dir) = args.artifacts_dir {
        ctx = ctx.with_artifacts_dir(dir);
    }

    let producer: Box<dyn ArtifactProducer> = match ctx.config.build.clone() {
        Some(build) => Box::new(CommandProducer::new(
            build,
            &project_path,
            ToolPaths::resolve(&project_path, ctx.config.tool_paths()),
        )),
        None => Box::new(PrebuiltArtifacts),
    };

    println!("\n📦 artifact-publisher\n");

    let request = RunRequest {
        version: RepositoryVersionInfo::parse(&args.repository_version),
        projects: args.projects,
        ignore_no_artifacts_to_produce: args.ignore_no_artifacts,
        plan_only,
    };

    let mut orchestrator = Orchestrator::new(&ctx, producer.as_ref());
    let result = orchestrator.run(request).await;

    if let Some(path) = &args.report {
        orchestrator
            .state()
            .save_to(path)
            .await
            .with_context(|| format!("Unable to write run report {}", path.display()))?;
    }

    let outcome = result?;
    print_outcome(&outcome);
    Ok(exit_code(&outcome))
}

fn exit_code(outcome: &RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Failed { .. } => EXIT_PUSH_FAILED,
        RunOutcome::Published { .. } | RunOutcome::NothingToPublish | RunOutcome::PlanOnly { .. } => 0,
    }
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::PlanOnly { to_publish } => {
            println!("\n📋 {} artifacts would be published", to_publish.len());
            for artifact in to_publish {
                println!("  - {}", artifact);
            }
        }
        RunOutcome::NothingToPublish => {}
        RunOutcome::Published { reports } | RunOutcome::Failed { reports } => {
            println!();
            for report in reports {
                let icon = match report.status {
                    FeedPushStatus::Pushed => "✅",
                    FeedPushStatus::NothingToPush => "➖",
                    FeedPushStatus::Skipped { .. } => "⚠️ ",
                    FeedPushStatus::Failed { .. } => "❌",
                };
                println!(
                    "{} {}: {} ({} pushed)",
                    icon,
                    report.feed,
                    report.status,
                    report.pushed.len()
                );
                for promotion in report.promotions.iter().filter(|p| !p.success) {
                    println!(
                        "    ⚠️  {} not promoted to @{}: {}",
                        promotion.artifact,
                        promotion.view,
                        promotion.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            if outcome.is_success() {
                println!("\n✅ Publishing completed successfully!");
            } else {
                println!("\n❌ Publishing completed with errors");
            }
        }
    }
}

async fn check_command(project_path: Option<PathBuf>) -> Result<i32> {
    let path = project_path.unwrap_or_else(|| PathBuf::from("."));

    println!("\n🔍 Configuration Check\n");

    let config = ConfigLoader::load(ConfigLoadOptions::for_project(&path)).await?;
    let validation = ConfigLoader::validate(&config);
    println!("{}", ConfigLoader::format_validation_result(&validation));

    let credentials = CredentialStore::from_env();
    println!("\n📡 Remote feeds:");
    for feed in config.remote_feeds() {
        let channels: Vec<&str> = feed.channels.iter().map(|c| c.as_str()).collect();
        let secret = match feed.secret_key_name.as_deref().filter(|k| !k.is_empty()) {
            Some(key) if credentials.has(key) => format!("{} set", key),
            Some(key) => format!("{} missing", key),
            None => "no secretKeyName, skipped".to_string(),
        };
        println!(
            "  - {} [{}] => {} ({})",
            feed.name,
            channels.join(", "),
            feed.url,
            secret
        );
    }
    println!();

    Ok(if validation.valid { 0 } else { EXIT_CONFIG_ERROR })
}
