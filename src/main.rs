use clap::{Parser, Subcommand};
use kubegate::{ExecutionResult, Gateway, GatewayConfig};
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "kubegate")]
#[command(about = "Validate and run kubectl, helm, istioctl, argocd and rancher commands")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and execute a command
    Run {
        /// Tool name, e.g. kubectl
        tool: String,

        /// Command line; several arguments are joined with spaces
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,

        /// Timeout in seconds (defaults to KUBEGATE_TIMEOUT)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show a tool's help text
    Describe {
        tool: String,

        /// Optional subcommand, e.g. "get" or "app delete"
        subcommand: Vec<String>,
    },

    /// Show which configured tools are installed
    Tools,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout only carries JSON
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let gateway = match Gateway::new(config) {
        Ok(gateway) => gateway,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Run {
            tool,
            command,
            timeout,
        } => {
            let command = command.join(" ");
            debug!("Running {} command: {}", tool, command);
            let result = gateway
                .execute(&tool, &command, timeout.map(Duration::from_secs))
                .await;
            print_result(&result)
        }
        Commands::Describe { tool, subcommand } => {
            let subcommand = subcommand.join(" ");
            let subcommand = (!subcommand.is_empty()).then_some(subcommand.as_str());
            let result = gateway.describe_help(&tool, subcommand).await;
            print_result(&result)
        }
        Commands::Tools => {
            let tools = gateway.installed_tools().await;
            match serde_json::to_string_pretty(&tools) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn print_result(result: &ExecutionResult) -> ExitCode {
    match result.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
