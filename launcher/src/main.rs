//! cheup - Entry Point
//!
//! `cheup server start` deploys the Che server and waits until it is reachable.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use cheup::app::options::StartOptions;
use cheup::app::run::run;
use cheup::app::settings::Settings;
use cheup::deploy::orchestrator::StartOutcome;
use cheup::errors::DeployError;
use cheup::logs::{init_logging, LogLevel};
use cheup::utils::version_info;

#[derive(Debug, Parser)]
#[command(
    name = "cheup",
    version,
    about = "Deploy and verify a Che server on Kubernetes-family clusters"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage the Che server
    Server {
        #[command(subcommand)]
        command: ServerCommand,
    },

    /// Print version and build information as JSON
    Version,
}

#[derive(Debug, Subcommand)]
enum ServerCommand {
    /// Start the Che server, installing it when needed
    Start(StartArgs),
}

#[derive(Debug, Args)]
struct StartArgs {
    /// Namespace of the Che server
    #[arg(short = 'n', long = "chenamespace", env = "CHE_NAMESPACE")]
    namespace: Option<String>,

    /// Che server container image
    #[arg(short = 'i', long = "cheimage", env = "CHE_CONTAINER_IMAGE")]
    image: Option<String>,

    /// Path to the templates folder
    #[arg(short = 't', long, env = "CHE_TEMPLATES_FOLDER")]
    templates: Option<PathBuf>,

    /// Che server boot timeout, in milliseconds
    #[arg(short = 'o', long = "cheboottimeout", env = "CHE_SERVER_BOOT_TIMEOUT")]
    boot_timeout: Option<u64>,

    /// Start Che in multi-user mode
    #[arg(short = 'm', long)]
    multiuser: bool,

    /// Enable TLS encryption (implies multi-user mode)
    #[arg(short = 's', long)]
    tls: bool,

    /// Installer: helm, operator or minishift-addon
    #[arg(short = 'a', long)]
    installer: Option<String>,

    /// Domain of the cluster, discovered when omitted
    #[arg(short = 'b', long)]
    domain: Option<String>,

    /// Platform: minikube or minishift
    #[arg(short = 'p', long)]
    platform: Option<String>,

    /// Name of the Che server deployment
    #[arg(long, env = "CHE_DEPLOYMENT")]
    deployment_name: Option<String>,

    /// Task rendering: default, silent or verbose
    #[arg(long)]
    renderer: Option<String>,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    /// Log as JSON on stderr
    #[arg(long)]
    log_json: bool,

    /// Also log to a daily file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl StartArgs {
    /// Defaults, then the settings file, then flags and environment
    async fn into_options(self) -> Result<StartOptions, DeployError> {
        let mut options = StartOptions::default();
        if let Some(path) = &self.config {
            Settings::load(path).await?.apply(&mut options);
        }

        if let Some(namespace) = self.namespace {
            options.namespace = namespace;
        }
        if let Some(image) = self.image {
            options.image = image;
        }
        if let Some(templates) = self.templates {
            options.templates = templates;
        }
        if let Some(ms) = self.boot_timeout {
            options.server_boot_timeout = Duration::from_millis(ms);
        }
        if self.multiuser {
            options.multiuser = true;
        }
        if self.tls {
            options.tls = true;
        }
        if let Some(installer) = self.installer {
            options.installer = installer;
        }
        if let Some(domain) = self.domain {
            options.domain = domain;
        }
        if let Some(platform) = self.platform {
            options.platform = platform;
        }
        if let Some(name) = self.deployment_name {
            options.deployment_name = name;
        }
        if let Some(renderer) = self.renderer {
            options.renderer = renderer.parse()?;
        }
        if let Some(level) = self.log_level {
            options.log.log_level = level.parse::<LogLevel>().map_err(DeployError::ConfigError)?;
        }
        if self.log_json {
            options.log.json_format = true;
        }
        if let Some(dir) = self.log_dir {
            options.log.log_dir = Some(dir);
        }
        Ok(options)
    }
}

async fn start(args: StartArgs) -> anyhow::Result<StartOutcome> {
    let options = args.into_options().await.context("Invalid start options")?;
    let _guard = init_logging(options.log.clone()).context("Failed to initialize logging")?;
    let outcome = run(options).await?;
    Ok(outcome)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Server {
            command: ServerCommand::Start(args),
        } => match start(args).await {
            Ok(outcome) => {
                println!(
                    "{} Che is {} at {}",
                    "✔".green(),
                    outcome.status,
                    outcome.server_url.bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                let code = e.downcast_ref::<DeployError>().map_or("E_INTERNAL", DeployError::code);
                eprintln!("{} {:#}", "Error:".red(), e);
                eprintln!("code: {}", code.dimmed());
                ExitCode::from(1)
            }
        },
    }
}
