//! hubcas - download CAS-backed files from a model hub
//!
//! The binary resolves repository paths, requests scoped credentials and
//! drives the transfer engine through the `hubcas` client crate. Library
//! events arrive on a channel and are turned into tracing records here.

mod cli;
mod error;
mod logging;
mod output;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::error::CliError;
use crate::output::{CommandOutput, CredentialSummary, DownloadRow, OutputRenderer};
use clap::Parser;
use hubcas_client::{
    CancellationToken, CasClient, Config, ContentDescriptor, Direction, EventReceiver,
    TransferRequest,
};
use hubcas_events::FailureContext;
use std::path::PathBuf;
use std::process;
use tokio::select;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting hubcas v{}", env!("CARGO_PKG_VERSION"));

    // File (or defaults), then environment, then flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global);
    config.validate()?;

    let (event_sender, event_receiver) = hubcas_events::channel();
    let client =
        CasClient::with_config(config, cli.global.token.clone())?.with_events(event_sender);

    let renderer = OutputRenderer::new(cli.global.json);
    let output = execute_command_with_events(cli.command, client, event_receiver).await?;
    renderer.render(&output)?;

    let failed = output.failures();
    if failed > 0 {
        return Err(CliError::PartialFailure {
            failed,
            total: output.rows(),
        });
    }

    debug!("Command completed successfully");
    Ok(())
}

/// Run a command while forwarding its events to the log
async fn execute_command_with_events(
    command: Commands,
    client: CasClient,
    mut event_receiver: EventReceiver,
) -> Result<CommandOutput, CliError> {
    let mut command_future = Box::pin(execute_command(command, client));
    let mut channel_open = true;

    loop {
        select! {
            result = &mut command_future => {
                while let Ok(message) = event_receiver.try_recv() {
                    logging::log_event_with_tracing(&message);
                }
                return result;
            }

            message = event_receiver.recv(), if channel_open => {
                match message {
                    Some(message) => logging::log_event_with_tracing(&message),
                    None => channel_open = false,
                }
            }
        }
    }
}

async fn execute_command(command: Commands, client: CasClient) -> Result<CommandOutput, CliError> {
    match command {
        Commands::Resolve {
            repo,
            path,
            revision,
        } => {
            let descriptor = client.resolve(&repo, &path, revision.as_deref()).await?;
            Ok(CommandOutput::Resolved {
                repo,
                path,
                revision: revision_label(revision),
                descriptor,
            })
        }

        Commands::Token {
            repo,
            revision,
            upload,
        } => {
            let direction = if upload {
                Direction::Upload
            } else {
                Direction::Download
            };
            let credential = client
                .authorize(&repo, revision.as_deref(), direction)
                .await?;
            Ok(CommandOutput::Credential(CredentialSummary::from(
                credential,
            )))
        }

        Commands::Download {
            repo,
            paths,
            dest,
            revision,
            partial,
        } => download(&client, &repo, paths, dest, revision.as_deref(), partial).await,

        Commands::Sweep { dir, grace_secs } => {
            let grace = grace_secs.map_or_else(
                || client.config().transfer.staging_grace(),
                std::time::Duration::from_secs,
            );
            let removed = hubcas_client::sweep_orphaned_staging(&dir, grace).await?;
            Ok(CommandOutput::Swept { dir, removed })
        }
    }
}

async fn download(
    client: &CasClient,
    repo: &str,
    paths: Vec<String>,
    dest: PathBuf,
    revision: Option<&str>,
    partial: bool,
) -> Result<CommandOutput, CliError> {
    let resolved = futures::future::try_join_all(
        paths
            .iter()
            .map(|path| client.resolve_file(repo, path, revision)),
    )
    .await?;

    let missing: Vec<String> = paths
        .iter()
        .zip(&resolved)
        .filter(|(_, resolution)| resolution.descriptor.is_none())
        .map(|(path, _)| path.clone())
        .collect();
    if !missing.is_empty() {
        return Err(CliError::NotCasBacked { paths: missing });
    }

    // One credential covers the whole repo revision
    let credential = match resolved.first() {
        Some(first) => client.authorize_resolved(repo, revision, first).await?,
        None => client.authorize(repo, revision, Direction::Download).await?,
    };
    let descriptors: Vec<ContentDescriptor> = resolved
        .into_iter()
        .filter_map(|resolution| resolution.descriptor)
        .collect();
    let request = TransferRequest::new(descriptors.clone(), dest, credential);

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling download");
                cancel.cancel();
            }
        }
    });

    let rows = if partial {
        client
            .download_partial_with_cancel(request, cancel)
            .await
            .map(|result| {
                result
                    .outcomes
                    .into_iter()
                    .zip(paths)
                    .zip(descriptors)
                    .map(|((outcome, path), descriptor)| match outcome {
                        Ok(local) => row(path, descriptor, Some(local), None),
                        Err(e) => {
                            row(path, descriptor, None, Some(FailureContext::from_error(&e)))
                        }
                    })
                    .collect()
            })
    } else {
        client
            .download_with_cancel(request, cancel)
            .await
            .map(|result| {
                result
                    .paths
                    .into_iter()
                    .zip(paths)
                    .zip(descriptors)
                    .map(|((local, path), descriptor)| row(path, descriptor, Some(local), None))
                    .collect()
            })
    };
    interrupt.abort();

    Ok(CommandOutput::Downloaded(rows?))
}

fn row(
    path: String,
    descriptor: ContentDescriptor,
    local: Option<PathBuf>,
    failure: Option<FailureContext>,
) -> DownloadRow {
    DownloadRow {
        path,
        hash: descriptor.hash,
        size: descriptor.size,
        local,
        failure,
    }
}

fn revision_label(revision: Option<String>) -> String {
    revision.unwrap_or_else(|| hubcas_client::DEFAULT_REVISION.to_string())
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &GlobalArgs) {
    if let Some(endpoint) = &global.endpoint {
        config.hub.endpoint.clone_from(endpoint);
    }
}

/// Initialize tracing on stderr so stdout stays parseable
fn init_tracing(json_mode: bool, debug_enabled: bool) {
    let default_filter = if debug_enabled {
        "info,hubcas=debug,hubcas_hub=debug,hubcas_net=debug,hubcas_transfer=debug"
    } else {
        "warn,hubcas=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    if json_mode || debug_enabled {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}
