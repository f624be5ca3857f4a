use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use taxogate::models::GovernorConfig;
use taxogate::Result;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taxogate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Governance gate for feedback-taxonomy edits", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (default: ./taxogate.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the evaluation endpoint over HTTP
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Evaluate one proposed operation
    Evaluate {
        /// Operation type (e.g. rename-subtheme, merge-subtheme)
        operation: String,

        /// Context as inline JSON, or @path to a JSON file
        #[arg(short = 'x', long, default_value = "{}")]
        context: String,

        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },

    /// Word-level diff between two names
    Diff {
        old: String,
        new: String,

        /// Unchanged characters kept around each change
        #[arg(long, default_value_t = taxogate::diff::DEFAULT_MAX_CONTEXT)]
        max_context: usize,
    },

    /// Run a plan of proposed edits through the change lifecycle
    Review {
        /// Plan file (JSON)
        plan: PathBuf,

        /// Taxonomy snapshot used to derive each proposal's context
        #[arg(short, long)]
        taxonomy: Option<PathBuf>,

        /// Accept approved reviews and apply all live drafts
        #[arg(short, long)]
        apply: bool,
    },

    /// Check a taxonomy snapshot for structural violations
    Check {
        /// Taxonomy snapshot (JSON)
        taxonomy: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(config: &GovernorConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    if let Err(e) = runtime.block_on(run_async(cli)) {
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

async fn run_async(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "taxogate", &mut io::stdout());
        return Ok(());
    }

    let config = GovernorConfig::load(cli.config.as_deref())?;
    init_tracing(&config);

    match cli.command {
        Commands::Serve { port } => {
            taxogate::cli::serve::run(&config, port).await?;
        }

        Commands::Evaluate {
            operation,
            context,
            json,
        } => {
            taxogate::cli::evaluate::run(&config, &operation, &context, json).await?;
        }

        Commands::Diff {
            old,
            new,
            max_context,
        } => {
            taxogate::cli::diff::run(&old, &new, max_context)?;
        }

        Commands::Review {
            plan,
            taxonomy,
            apply,
        } => {
            taxogate::cli::review::run(&config, &plan, taxonomy.as_deref(), apply).await?;
        }

        Commands::Check { taxonomy } => {
            taxogate::cli::check::run(&taxonomy)?;
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}
