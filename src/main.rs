//! envmap CLI entrypoint.
//!
//! This is the main entrypoint for the envmap planning service and its
//! offline commands.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use envmap_planner::cli::{Cli, Commands, OutputFormatter};
use envmap_planner::config::{load_dotenv, LogFormat, Settings};
use envmap_planner::definition::{DefinitionParser, DefinitionValidator};
use envmap_planner::error::{ConfigError, Result};
use envmap_planner::mapper::Mapper;
use envmap_planner::message::{OutboundMessage, Request};
use envmap_planner::model::{Datacenter, Previous, PreviousState};
use envmap_planner::service::{connect, BusServer, CompletionHandler, RequestHandler};
use envmap_planner::store::{BuildStore, LocalBuildStore};
use envmap_planner::workflow::TemplateRegistry;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = load_dotenv(None) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_logging(cli.verbose, cli.log_format.unwrap_or(settings.log_format));

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let registry = Arc::new(load_registry(
        cli.workflows.as_deref().or(settings.workflows.as_deref()),
    )?);

    match cli.command {
        Commands::Serve => cmd_serve(registry, &settings).await,
        Commands::Plan {
            definition,
            previous,
            datacenter,
            service_id,
        } => cmd_plan(
            registry,
            &definition,
            previous.as_deref(),
            datacenter.as_deref(),
            service_id,
            &formatter,
        ),
        Commands::Destroy { previous } => cmd_destroy(registry, &previous, &formatter),
        Commands::Diff {
            definition,
            previous,
        } => cmd_diff(registry, &definition, previous.as_deref(), &formatter),
        Commands::Validate {
            definition,
            warnings,
        } => cmd_validate(&definition, warnings, &formatter),
        Commands::Fragments => {
            eprintln!("{}", formatter.format_fragments(&registry));
            Ok(())
        }
    }
}

/// Serve planning requests on the bus until interrupted.
async fn cmd_serve(registry: Arc<TemplateRegistry>, settings: &Settings) -> Result<()> {
    let client = connect(&settings.nats_uri).await?;
    let store_settings = settings.resolve_store(&client).await?;

    let store: Arc<dyn BuildStore> =
        Arc::new(LocalBuildStore::new(&store_settings.uri, &store_settings.name));
    info!(
        "Using {} build store at {}/{}",
        store.backend_type(),
        store_settings.uri,
        store_settings.name
    );

    let server = BusServer::new(
        client,
        RequestHandler::new(Mapper::new(registry), Arc::clone(&store)),
        CompletionHandler::new(store, settings.settle),
    );

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}

/// Plan the creation or update of an environment.
fn cmd_plan(
    registry: Arc<TemplateRegistry>,
    definition: &Path,
    previous: Option<&Path>,
    datacenter: Option<&Path>,
    service_id: String,
    formatter: &OutputFormatter,
) -> Result<()> {
    let realized = previous.map(read_message).transpose()?;
    let datacenter = match (datacenter, &realized) {
        (Some(path), _) => read_datacenter(path)?,
        (None, Some(message)) => message.datacenter.clone(),
        (None, None) => local_datacenter(),
    };

    let request = Request {
        id: service_id,
        previous_id: None,
        client_id: String::new(),
        client_name: String::new(),
        name: String::new(),
        datacenter,
        definition: std::fs::read_to_string(definition)?,
    };

    let previous = Previous::from_message(realized.as_ref())?;
    let message = Mapper::new(registry).create(&request, &previous)?;

    eprintln!("{}", formatter.format_plan(&message));
    Ok(())
}

/// Plan the removal of a realized environment.
fn cmd_destroy(
    registry: Arc<TemplateRegistry>,
    previous: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let realized = read_message(previous)?;
    let request = Request {
        id: realized.service_id.clone(),
        previous_id: None,
        client_id: realized.client_id.clone(),
        client_name: realized.client_name.clone(),
        name: realized.service_name.clone(),
        datacenter: realized.datacenter.clone(),
        definition: String::new(),
    };

    let message = Mapper::new(registry).delete(&request, PreviousState::from_message(&realized)?)?;

    eprintln!("{}", formatter.format_plan(&message));
    Ok(())
}

/// Show the changes a definition would make.
fn cmd_diff(
    registry: Arc<TemplateRegistry>,
    definition: &Path,
    previous: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let realized = previous.map(read_message).transpose()?;
    let request = Request {
        id: realized
            .as_ref()
            .map_or_else(|| String::from("local"), |m| m.service_id.clone()),
        previous_id: None,
        client_id: String::new(),
        client_name: String::new(),
        name: String::new(),
        datacenter: realized
            .as_ref()
            .map_or_else(local_datacenter, |m| m.datacenter.clone()),
        definition: std::fs::read_to_string(definition)?,
    };

    let previous = Previous::from_message(realized.as_ref())?;
    let changes = Mapper::new(registry).diff(&request, &previous)?;

    eprintln!("{}", formatter.format_changes(&changes));
    Ok(())
}

/// Validate a definition.
fn cmd_validate(definition: &Path, show_warnings: bool, formatter: &OutputFormatter) -> Result<()> {
    let parsed = DefinitionParser::new().load_file(definition)?;
    let result = DefinitionValidator::new().validate(&parsed)?;

    eprintln!("{}", formatter.format_validation(&parsed, &result, show_warnings));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the template registry.
fn load_registry(dir: Option<&Path>) -> Result<TemplateRegistry> {
    dir.map_or_else(TemplateRegistry::builtin, |dir| {
        debug!("Loading workflow templates from: {}", dir.display());
        TemplateRegistry::load_dir(dir)
    })
}

/// Reads a realized message from a file.
fn read_message(path: &Path) -> Result<OutboundMessage> {
    debug!("Loading realized message from: {}", path.display());
    let content = std::fs::read(path)?;
    OutboundMessage::from_json(&path.display().to_string(), &content)
}

/// Reads datacenter metadata from a YAML or JSON file.
fn read_datacenter(path: &Path) -> Result<Datacenter> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| {
        ConfigError::LoadFailed {
            path: PathBuf::from(path),
            message: e.to_string(),
        }
        .into()
    })
}

/// Datacenter used when planning offline without metadata.
fn local_datacenter() -> Datacenter {
    Datacenter {
        name: String::from("local"),
        kind: String::from("fake"),
        ..Datacenter::default()
    }
}
