use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use provider_bridge::config::Config;
use provider_bridge::node::{self, Node};
use provider_bridge::remote::{RemoteClient, ServiceClient};
use provider_bridge::resource::{self, Action};
use provider_bridge::state::StateFile;
use provider_bridge::variant;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Create, read, update, delete and import cloud resources from generic
/// configuration
#[derive(Parser, Debug)]
#[command(name = "provider-bridge", version, about, long_about = None)]
struct Cli {
    /// API bearer token (defaults to PROVIDER_BRIDGE_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Service endpoint override for this call
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Target {
    /// Resource kind, e.g. tekton_pipeline_trigger
    #[arg(short, long)]
    kind: String,

    /// State file holding the resource identity
    #[arg(short, long)]
    state: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a resource from a JSON or YAML configuration file
    Create {
        #[command(flatten)]
        target: Target,
        /// Configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Refresh a resource by its stored identity
    Read {
        #[command(flatten)]
        target: Target,
    },
    /// Apply configuration changes to an existing resource
    Update {
        #[command(flatten)]
        target: Target,
        /// Configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Delete a resource
    Delete {
        #[command(flatten)]
        target: Target,
    },
    /// Adopt an existing resource by identity, e.g. pipe-1/trig-9
    Import {
        #[command(flatten)]
        target: Target,
        /// Composite identity
        #[arg(long)]
        id: String,
    },
    /// List variant families, their discriminator values and fields
    Variants {
        /// Only this family
        #[arg(long)]
        family: Option<String>,
    },
    /// Persist endpoint overrides or the state directory
    Configure {
        /// Service whose endpoint to set with --endpoint (pipeline, event_notifications)
        #[arg(long)]
        service: Option<String>,
        /// Directory for state files
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("provider-bridge started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("provider-bridge").join("provider-bridge.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".provider-bridge").join("provider-bridge.log");
    }
    PathBuf::from("provider-bridge.log")
}

/// Read a configuration node; `.yaml`/`.yml` files are YAML, the rest JSON.
fn load_node(path: &Path) -> Result<Node> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration {:?}", path))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let parsed = if is_yaml {
        node::from_yaml_str(&text)
    } else {
        node::from_json_str(&text)
    };
    parsed.with_context(|| format!("Invalid configuration {:?}", path))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_lifecycle(cli: &Cli, config: &Config, target: &Target, action: Action) -> Result<()> {
    let service = resource::service_for(&target.kind)?;
    let endpoint = config.effective_endpoint(service, cli.endpoint.as_deref())?;
    let token = Config::effective_token(cli.token.as_deref())?;
    let client: Arc<dyn RemoteClient> = Arc::new(ServiceClient::new(&endpoint, &token)?);

    let state_path = target
        .state
        .clone()
        .unwrap_or_else(|| config.state_path(&target.kind));
    let identity = StateFile::identity_for(&state_path, &target.kind)?;

    tracing::info!(
        "{} {} via {} (state {:?})",
        action.operation(),
        target.kind,
        endpoint,
        state_path
    );

    let outcome = match resource::execute(&target.kind, client, identity.as_deref(), action).await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Some(failed) = err.downcast_ref::<resource::Failed>() {
                if failed.identity != identity {
                    StateFile::new(&target.kind, failed.identity.clone()).save(&state_path)?;
                }
            }
            return Err(err);
        }
    };

    StateFile::new(&target.kind, outcome.identity.clone()).save(&state_path)?;
    print_json(&outcome)
}

fn list_variants(family: Option<&str>) -> Result<()> {
    let listing: Vec<serde_json::Value> = match family {
        Some(name) => {
            let registry = variant::get_family(name)
                .with_context(|| format!("Unknown variant family: {}", name))?;
            vec![registry.describe()]
        }
        None => variant::all_families().iter().map(|f| f.describe()).collect(),
    };
    print_json(&listing)
}

fn configure(
    config: &mut Config,
    service: Option<&str>,
    endpoint: Option<&str>,
    state_dir: Option<&Path>,
) -> Result<()> {
    if let Some(service) = service {
        let endpoint = endpoint.context("--service needs --endpoint")?;
        resource::KINDS
            .iter()
            .filter_map(|k| resource::service_for(k).ok())
            .find(|s| *s == service)
            .with_context(|| format!("Unknown service: {}", service))?;
        config.set_endpoint(service, endpoint)?;
    }
    if let Some(dir) = state_dir {
        config.set_state_dir(dir)?;
    }
    print_json(&*config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = setup_logging(cli.log_level)?;
    let mut config = Config::load();

    match &cli.command {
        Command::Create { target, config: file } => {
            let node = load_node(file)?;
            run_lifecycle(&cli, &config, target, Action::Create(node)).await
        }
        Command::Read { target } => run_lifecycle(&cli, &config, target, Action::Read).await,
        Command::Update { target, config: file } => {
            let node = load_node(file)?;
            run_lifecycle(&cli, &config, target, Action::Update(node)).await
        }
        Command::Delete { target } => run_lifecycle(&cli, &config, target, Action::Delete).await,
        Command::Import { target, id } => {
            run_lifecycle(&cli, &config, target, Action::Import(id.clone())).await
        }
        Command::Variants { family } => list_variants(family.as_deref()),
        Command::Configure { service, state_dir } => configure(
            &mut config,
            service.as_deref(),
            cli.endpoint.as_deref(),
            state_dir.as_deref(),
        ),
    }
}
