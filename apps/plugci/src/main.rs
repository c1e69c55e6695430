//! plugci - continuous-integration builder for PocketMine plugins
//!
//! Assembles a plugin archive out of a repository zipball, lints it and runs
//! sandboxed static analysis through the builder crate, then prints the
//! ordered diagnostics report.

mod cli;
mod display;
mod error;
mod logging;

use crate::cli::{BuildArgs, Cli, Commands, GlobalArgs};
use crate::display::OutputRenderer;
use crate::error::CliError;
use crate::logging::log_event_with_tracing;
use clap::Parser;
use plugci_builder::{BuildContext, Builder, ZipballTree};
use plugci_config::Config;
use plugci_events::EventReceiver;
use plugci_resolver::{DependencyResolver, ReleasePolicy, RepoRef, SqliteReleaseStore};
use plugci_types::{OutputFormat, ProjectManifest, Severity};
use std::future::Future;
use std::process;
use std::sync::Arc;
use tokio::select;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    match run(cli).await {
        Ok(Severity::BuildError) => process::exit(1),
        Ok(_) => {}
        Err(e) => {
            error!("Application error: {}", e);
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(1);
        }
    }
}

/// Main application logic; returns the worst severity of the build
async fn run(cli: Cli) -> Result<Severity, CliError> {
    info!("Starting plugci v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration with proper precedence:
    // 1. Start with file config (or defaults)
    let mut config = Config::load_or_default(&cli.global.config).await?;

    // 2. Merge environment variables
    config.merge_env()?;

    // 3. Apply CLI flags (highest precedence)
    apply_cli_config(&mut config, &cli.global, &cli.command);
    config.validate()?;

    let format = if cli.global.json {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };

    match cli.command {
        Commands::Build(args) => build(config, args, &OutputRenderer::new(format)).await,
    }
}

fn apply_cli_config(config: &mut Config, global: &GlobalArgs, command: &Commands) {
    if global.debug {
        config.analysis.debug = true;
    }
    match command {
        Commands::Build(args) => {
            if args.no_analysis {
                config.analysis.enabled = false;
            }
        }
    }
}

async fn build(
    config: Config,
    args: BuildArgs,
    renderer: &OutputRenderer,
) -> Result<Severity, CliError> {
    let manifest = load_project_manifest(&args).await?;
    let repo = match &args.repo {
        Some(slug) => RepoRef::parse(slug).ok_or_else(|| {
            CliError::InvalidArguments(format!("repository must be owner/name, got '{slug}'"))
        })?,
        None => RepoRef::default(),
    };
    let tree = ZipballTree::open_with(&args.zipball, args.root_handling())?;
    let builder = configure_builder(config).await?;

    let (event_sender, event_receiver) = plugci_events::channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling build");
            let _ = cancel_tx.send(true);
        }
    });

    let ctx = BuildContext::new(args.project_name.clone())
        .with_repo(repo)
        .with_event_sender(event_sender)
        .with_debug(builder.config().analysis.debug)
        .with_cancellation(cancel_rx);

    let output =
        execute_with_events(builder.build(&ctx, &tree, &manifest), event_receiver).await?;

    let written = match &args.output {
        Some(path) if !output.result.has_build_error() => {
            output.archive.write_zip(path).await?;
            info!(path = %path.display(), "Archive written");
            Some(path.as_path())
        }
        _ => None,
    };

    renderer.render_build(&output, written)?;
    Ok(output.result.worst_severity())
}

/// Project entry from `--poggit-yml`, or a default entry; `--project-path`
/// overrides the declared path either way
async fn load_project_manifest(args: &BuildArgs) -> Result<ProjectManifest, CliError> {
    let mut manifest = match &args.poggit_yml {
        Some(path) => {
            let source = tokio::fs::read_to_string(path).await?;
            ProjectManifest::from_ci_manifest(&source, &args.project_name)?
        }
        None => ProjectManifest::default(),
    };
    if let Some(path) = &args.project_path {
        let trimmed = path.trim_matches('/');
        manifest.path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}/")
        };
    }
    Ok(manifest)
}

/// Builder with the SQLite release store wired in when a database is configured
async fn configure_builder(config: Config) -> Result<Builder, CliError> {
    let Some(url) = config.store.database_url.clone() else {
        return Ok(Builder::new(config));
    };

    let store = Arc::new(SqliteReleaseStore::connect(&url, config.resource_dir()).await?);
    let resolver = DependencyResolver::new()
        .with_policy(ReleasePolicy {
            min_public_release_state: config.store.min_public_release_state,
            dev_build_class: config.store.dev_build_class,
        })
        .with_virion_lookup(store.clone())
        .with_release_store(store);
    Ok(Builder::new(config).with_resolver(resolver))
}

/// Drive a build future while forwarding its events to tracing
async fn execute_with_events<T, F>(
    future: F,
    mut event_receiver: EventReceiver,
) -> Result<T, CliError>
where
    F: Future<Output = Result<T, plugci_errors::Error>>,
{
    let mut command_future = Box::pin(future);

    loop {
        select! {
            result = &mut command_future => {
                // Drain any remaining events
                while let Ok(message) = event_receiver.try_recv() {
                    log_event_with_tracing(&message);
                }
                return result.map_err(CliError::from);
            }

            message = event_receiver.recv() => {
                match message {
                    Some(message) => log_event_with_tracing(&message),
                    None => { /* Channel closed: keep waiting for the build to finish */ }
                }
            }
        }
    }
}

/// Initialize tracing/logging; logs go to stderr so stdout carries only the report
fn init_tracing(json_mode: bool, debug_enabled: bool) {
    let default_filter = if debug_enabled {
        "debug,plugci=debug"
    } else {
        "warn,plugci=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_mode {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(debug_enabled)
            .init();
    }
}
