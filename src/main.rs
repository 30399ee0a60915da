//! pomosync CLI
//!
//! Runs focus/break cycles of four focus sessions:
//! - 25 minutes of focus
//! - 5 minutes of short break between focus sessions
//! - 15 minutes of long break closing the cycle
//!
//! A primary daemon owns the timer and mirrors its state to a second daemon.

use anyhow::Result;
use clap::{CommandFactory, Parser};

use pomosync::cli::{Cli, Commands, Display, IpcClient};
use pomosync::daemon::{self, DaemonConfig};
use pomosync::timer::Role;
use pomosync::types::ConfigureParams;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let client = || -> Result<IpcClient> {
        match &cli.socket {
            Some(path) => Ok(IpcClient::with_socket_path(path.clone())),
            None => IpcClient::new(Role::Primary),
        }
    };

    match command {
        Commands::Start => Display::show_result(&client()?.start().await?),
        Commands::Pause => Display::show_result(&client()?.pause().await?),
        Commands::Reset => Display::show_result(&client()?.reset_session().await?),
        Commands::ResetCycle => Display::show_result(&client()?.reset_cycle().await?),
        Commands::Skip { start } => Display::show_result(&client()?.skip(start).await?),
        Commands::Select { session } => {
            Display::show_result(&client()?.select(session.into()).await?)
        }
        Commands::Configure(args) => {
            if args.is_empty() {
                anyhow::bail!("--focus, --short-break, --long-break のいずれかを指定してください");
            }
            let params = ConfigureParams::from(&args);
            Display::show_result(&client()?.configure(params).await?);
        }
        Commands::Resync => Display::show_result(&client()?.resync().await?),
        Commands::Sync => Display::show_result(&client()?.sync().await?),
        Commands::Status => Display::show_status(&client()?.status().await?),
        Commands::Daemon(args) => {
            let config = DaemonConfig::from_args(&args, cli.socket.clone())?;
            daemon::run(config).await?;
        }
        Commands::Completions { shell } => generate_completions(shell),
    }

    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
