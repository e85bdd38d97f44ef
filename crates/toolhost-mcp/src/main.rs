//! toolhost MCP server: entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use toolhost_mcp::config::load_config;
use toolhost_mcp::server::ServerContext;
use toolhost_mcp::transport::{StdioTransport, TcpTransport};

#[derive(Parser)]
#[command(
    name = "toolhost-mcp",
    about = "MCP server exposing schema-validated tools and resources over JSON-RPC",
    version
)]
struct Cli {
    /// Path to a JSON config file (falls back to TOOLHOST_CONFIG, then config/toolhost.json).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides logging.level.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Start MCP server over TCP, one session per connection.
    ServeTcp {
        /// Listen address (host:port).
        #[arg(long, default_value = "127.0.0.1:3200")]
        addr: String,
    },

    /// Start MCP server over HTTP.
    #[cfg(feature = "http")]
    ServeHttp {
        /// Listen address (host:port).
        #[arg(long, default_value = "127.0.0.1:3100")]
        addr: String,

        /// Bearer token for authentication.
        /// Also reads from TOOLHOST_TOKEN env var.
        #[arg(long)]
        token: Option<String>,
    },

    /// Print server info and capabilities as JSON.
    Info,

    /// Load, validate and print the effective configuration.
    CheckConfig,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   toolhost-mcp completions bash > ~/.local/share/bash-completion/completions/toolhost-mcp
    ///   toolhost-mcp completions zsh > ~/.zfunc/_toolhost-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

/// Logs go to stderr; stdout carries the protocol.
fn init_logging(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve);

    if let Commands::Completions { shell } = command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "toolhost-mcp", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_logging(&level, cli.log_format);

    match command {
        Commands::Serve => {
            let context = ServerContext::from_config(config)?;
            tracing::info!("toolhost MCP server (stdio)");
            let transport =
                StdioTransport::new(context.new_dispatcher(), context.max_message_bytes());
            transport.run().await?;
        }

        Commands::ServeTcp { addr } => {
            let context = ServerContext::from_config(config)?;
            tracing::info!("toolhost MCP server (tcp)");
            TcpTransport::new(context).run(&addr).await?;
        }

        #[cfg(feature = "http")]
        Commands::ServeHttp { addr, token } => {
            use toolhost_mcp::transport::HttpTransport;

            // Resolve token: CLI flag > env var
            let effective_token = token.or_else(|| std::env::var("TOOLHOST_TOKEN").ok());
            if effective_token.is_some() {
                tracing::info!("Auth: bearer token required");
            }

            let context = ServerContext::from_config(config)?;
            tracing::info!("toolhost MCP server (http)");
            let transport = HttpTransport::new(context.new_dispatcher(), effective_token);
            transport.run(&addr).await?;
        }

        Commands::Info => {
            let context = ServerContext::from_config(config)?;
            println!("{}", serde_json::to_string_pretty(&context.info())?);
        }

        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}
