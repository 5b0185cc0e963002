use clap::{Parser, Subcommand, ValueEnum};
use feel_playground::{
    DisplayState, Error, EvaluationSession, SessionConfig,
    api_client::{ApiClient, EvaluationService, engine_version_or_unknown},
    config::Settings,
    envelope::EnvelopeAddress,
    models::Metadata,
    share::{Location, StaticLocation, decode_from_location, encode_share_url},
};
use serde_json::Value;
use std::{fs, path::PathBuf, sync::Arc};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use url::Url;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Evaluation service URL
    #[arg(long, short = 'u', env = "FEEL_PLAYGROUND_API_URL", global = true)]
    api_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, env = "FEEL_PLAYGROUND_TIMEOUT_MS", global = true)]
    timeout_ms: Option<u64>,

    /// Settings directory
    #[arg(long, short = 'd', global = true)]
    settings_dir: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression
    Eval(EvalArgs),

    /// Evaluate unary tests against an input value
    Unary(UnaryArgs),

    /// Print a share link for an expression
    Share(ShareArgs),

    /// Evaluate the expression of a share link
    Open {
        /// Share link
        #[arg()]
        url: String,
    },

    /// Show the version of the remote engine
    Version,

    /// Evaluate an expression and address an envelope with the result
    Envelope(EvalArgs),

    /// Show the effective settings
    Settings {
        /// Store the effective settings
        #[arg(long)]
        save: bool,
    },
}

#[derive(Parser)]
struct ContextArgs {
    /// Context as a JSON object
    #[arg(short, long, conflicts_with = "context_file")]
    context: Option<String>,

    /// File holding the context
    #[arg(short = 'f', long)]
    context_file: Option<PathBuf>,

    /// Metadata entries forwarded to the service (key=value)
    #[arg(short, long, value_parser = parse_metadata_entry)]
    metadata: Vec<(String, String)>,
}

#[derive(Parser)]
struct EvalArgs {
    /// Expression to evaluate
    #[arg()]
    expression: String,

    #[command(flatten)]
    context: ContextArgs,
}

#[derive(Parser)]
struct UnaryArgs {
    /// Unary tests to evaluate
    #[arg()]
    expression: String,

    /// Input value as JSON
    #[arg(short, long)]
    input_value: String,

    #[command(flatten)]
    context: ContextArgs,
}

#[derive(Parser)]
struct ShareArgs {
    /// Expression to share
    #[arg()]
    expression: String,

    /// Context as a JSON object
    #[arg(short, long)]
    context: Option<String>,

    /// Page the link points to
    #[arg(long)]
    base_url: Option<String>,
}

fn parse_metadata_entry(entry: &str) -> Result<(String, String), String> {
    entry
        .split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", entry))
}

fn load_settings(cli: &Cli) -> Settings {
    let dir = cli.settings_dir.clone().or_else(Settings::default_dir);
    Settings::initialize(dir, cli.api_url.clone(), cli.timeout_ms)
}

fn metadata(settings: &Settings, entries: &[(String, String)]) -> Metadata {
    let mut metadata = settings.metadata.clone();
    for (key, value) in entries {
        metadata.insert(key.clone(), Value::String(value.clone()));
    }
    metadata
}

fn read_context(args: &ContextArgs) -> Result<Option<String>, Error> {
    match (&args.context, &args.context_file) {
        (Some(context), _) => Ok(Some(context.clone())),
        (None, Some(path)) => fs::read_to_string(path)
            .map(Some)
            .map_err(|e| Error::internal(format!("Failed to read context file: {}", e))),
        (None, None) => Ok(None),
    }
}

/// Session settings plus the context text typed by the user.
///
/// The typed context goes through the context editor so that a malformed
/// document is displayed as a local failure instead of aborting.
fn session_config(
    settings: &Settings,
    expression: &str,
    args: &ContextArgs,
) -> Result<(SessionConfig, Option<String>), Error> {
    let mut config = SessionConfig::new(expression)
        .with_metadata(metadata(settings, &args.metadata))
        .with_timeout(settings.request_timeout)
        .with_share_base_url(settings.share_base_url.clone());
    let context = read_context(args)?;
    if context.is_some() {
        config = config.with_context("{}");
    }
    Ok((config, context))
}

fn print_display(display: &DisplayState, output: OutputFormat) -> Result<bool, Error> {
    match output {
        OutputFormat::Text => print!("{}", display.render()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&display.to_json())?),
    }
    Ok(display.error().is_none())
}

async fn evaluate(
    config: SessionConfig,
    context: Option<String>,
    service: Arc<dyn EvaluationService>,
    location: Box<dyn Location>,
    output: OutputFormat,
) -> Result<bool, Error> {
    let mut session = EvaluationSession::new(config, service, location)?;
    if let Some(context) = context {
        session.edit_context(&context);
    }
    let display = session.evaluate().await;
    print_display(display, output)
}

async fn handle_envelope(
    config: SessionConfig,
    context: Option<String>,
    service: Arc<dyn EvaluationService>,
    output: OutputFormat,
) -> Result<bool, Error> {
    let mut envelope = EnvelopeAddress::new(config, service, Box::new(StaticLocation::detached()))?;
    if let Some(context) = context {
        envelope.session_mut().edit_context(&context);
    }
    let succeeded = print_display(envelope.evaluate().await, output)?;
    println!();
    println!("{}", envelope.render());
    Ok(succeeded)
}

fn handle_share(args: &ShareArgs, settings: &Settings) -> Result<bool, Error> {
    let base = args
        .base_url
        .clone()
        .unwrap_or_else(|| settings.share_base_url.clone());
    let base = Url::parse(&base)?;
    let url = encode_share_url(&base, &args.expression, args.context.as_deref());
    println!("{}", url);
    Ok(true)
}

fn handle_settings(settings: &Settings, save: bool) -> Result<bool, Error> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    if save {
        let path = settings.save()?;
        println!("Settings saved to {}", path.display());
    }
    Ok(true)
}

async fn run(cli: &Cli) -> Result<bool, Error> {
    let settings = load_settings(cli);
    debug!("Using evaluation service at {}", settings.api_url);
    let service: Arc<dyn EvaluationService> = Arc::new(ApiClient::from_settings(&settings));
    let detached = || -> Box<dyn Location> { Box::new(StaticLocation::detached()) };

    match &cli.command {
        Commands::Eval(args) => {
            let (config, context) = session_config(&settings, &args.expression, &args.context)?;
            evaluate(config, context, service, detached(), cli.output).await
        }
        Commands::Unary(args) => {
            let (config, context) = session_config(&settings, &args.expression, &args.context)?;
            let config = config.with_input_value(args.input_value.clone());
            evaluate(config, context, service, detached(), cli.output).await
        }
        Commands::Share(args) => handle_share(args, &settings),
        Commands::Open { url } => {
            let location = StaticLocation::parse(url)?;
            let shared = decode_from_location(&location)?;
            if shared.expression.is_none() {
                return Err(Error::ShareState(
                    "share link has no expression".to_string(),
                ));
            }
            // The context editor is enabled so that a shared context is used.
            let config = SessionConfig::new("")
                .with_context("{}")
                .with_metadata(settings.metadata.clone())
                .with_timeout(settings.request_timeout);
            evaluate(config, None, service, Box::new(location), cli.output).await
        }
        Commands::Version => {
            println!("{}", engine_version_or_unknown(service.as_ref()).await);
            Ok(true)
        }
        Commands::Envelope(args) => {
            let (config, context) = session_config(&settings, &args.expression, &args.context)?;
            handle_envelope(config, context, service, cli.output).await
        }
        Commands::Settings { save } => handle_settings(&settings, *save),
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
