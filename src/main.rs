use clap::{Parser, Subcommand};
use policy_rag::Result;
use policy_rag::commands::{
    ask_question, clear_history, index_documents, run_chat, show_history, show_status,
};
use policy_rag::config::{load_dotenv, run_interactive_config, show_config, write_default_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "policy-rag")]
#[command(about = "Answer questions about company policies from a folder of documents")]
#[command(version)]
struct Cli {
    /// Directory holding policy-rag.toml and the data folders
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, split and embed the documents folder into a new index
    Index,
    /// Ask a single question
    Ask {
        /// The question to answer
        question: String,
    },
    /// Start an interactive conversation
    Chat,
    /// Show or clear the conversation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Show whether the index is ready and what it holds
    Status,
    /// Show or create the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print every stored message
    Show,
    /// Forget the conversation
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create or update the configuration file
    Init {
        /// Write defaults without prompting
        #[arg(long)]
        defaults: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_path();

    match cli.command {
        Commands::Index => {
            index_documents(config_dir).await?;
        }
        Commands::Ask { question } => {
            ask_question(config_dir, &question).await?;
        }
        Commands::Chat => {
            run_chat(config_dir).await?;
        }
        Commands::History { action } => match action {
            HistoryAction::Show => show_history(config_dir)?,
            HistoryAction::Clear => clear_history(config_dir)?,
        },
        Commands::Status => {
            show_status(config_dir).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => show_config(config_dir)?,
            ConfigAction::Init { defaults: true } => {
                let config = write_default_config(config_dir)?;
                println!(
                    "Configuration written to {}",
                    config.config_file_path().display()
                );
            }
            ConfigAction::Init { defaults: false } => run_interactive_config(config_dir)?,
        },
    }

    Ok(())
}
