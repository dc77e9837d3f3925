//! Command-line front end for the dashboard resource API.
//!
//! # Responsibility
//! - Map subcommands onto `ResourceApiServer` operations.
//! - Print objects as pretty JSON on stdout and errors on stderr.

use apistore_core::{
    core_version, dashboard_resource_type, init_logging, new_dashboard, ApiError, CallerIdentity,
    ConfigError, ListOptions, LoggingError, RequestContext, ResourceApiServer, ServerConfig,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "apistore", about = "Manage dashboard resources", version)]
struct Cli {
    /// JSON configuration file; defaults to in-memory storage.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Caller identity recorded in request logs.
    #[arg(long, global = true, default_value = "cli")]
    caller: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List dashboards.
    List {
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Create a dashboard with an explicit or generated name.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, conflicts_with = "generate_name")]
        name: Option<String>,
        #[arg(long, default_value = "dashboard-")]
        generate_name: String,
    },
    /// Print one dashboard.
    Get { name: String },
    /// Delete one dashboard.
    Delete { name: String },
    /// Print the core version.
    Version,
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Api(ApiError),
    Output(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Api(err) => write!(f, "{err}"),
            Self::Output(err) => write!(f, "failed to encode output: {err}"),
        }
    }
}

impl From<ApiError> for CliError {
    fn from(value: ApiError) -> Self {
        Self::Api(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Command::Version = cli.command {
        println!("apistore_core version={}", core_version());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => ServerConfig::load(path).map_err(CliError::Config)?,
        None => ServerConfig::default(),
    };
    if let Some(dir) = &config.logging.dir {
        init_logging(&config.logging.level, dir).map_err(CliError::Logging)?;
    }

    let server = ResourceApiServer::from_config(&config).map_err(CliError::Config)?;
    let ctx = RequestContext::new(CallerIdentity::new(cli.caller));
    let gvr = dashboard_resource_type().gvr;

    match cli.command {
        Command::List { prefix, limit } => {
            let options = ListOptions {
                name_prefix: prefix,
                limit,
            };
            print_json(&server.list(&ctx, &gvr, &options)?)
        }
        Command::Create {
            title,
            name,
            generate_name,
        } => {
            let obj = match name {
                Some(name) => new_dashboard(title).with_name(name),
                None => new_dashboard(title).with_generate_name(generate_name),
            };
            print_json(&server.create(&ctx, &gvr, &obj)?)
        }
        Command::Get { name } => print_json(&server.get(&ctx, &gvr, &name)?),
        Command::Delete { name } => {
            server.delete(&ctx, &gvr, &name)?;
            println!("deleted {name}");
            Ok(())
        }
        Command::Version => Ok(()),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(value).map_err(CliError::Output)?;
    println!("{encoded}");
    Ok(())
}
