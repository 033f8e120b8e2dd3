mod commands;
mod program;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "Declarative cloud stacks with deferred outputs and tracked secrets", long_about = None)]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Realize the stack
    Up {
        /// Stack name (dev, stg, prod)
        #[arg(short, long, env = "STACKFLOW_STACK")]
        stack: String,
        /// Inject a provider failure, `resource=kind*times` (local provider only)
        #[arg(long = "fail", value_name = "SPEC")]
        faults: Vec<String>,
    },
    /// Show the realization order without provisioning
    Preview {
        /// Stack name (dev, stg, prod)
        #[arg(short, long, env = "STACKFLOW_STACK")]
        stack: String,
    },
    /// Build a signed read URL for a blob
    Sas(commands::sas::SasArgs),
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.command {
        Commands::Up { stack, faults } => {
            commands::up::handle(&stack, &faults).await?;
        }
        Commands::Preview { stack } => {
            commands::preview::handle(&stack)?;
        }
        Commands::Sas(args) => {
            commands::sas::handle(args)?;
        }
        Commands::Version => {
            println!("stackflow {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
