#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod command;

use command::{
    ChatInput, ChatStrategy, CommandStrategy, EmbedInput, EmbedStrategy, InfoStrategy,
    InitStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "quill AI chat client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a conversation (interactive unless -m is given)
    Chat {
        /// Single message to send
        #[arg(short = 'm', long)]
        message: Option<String>,

        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,

        /// Maximum autonomous turns per message
        #[arg(long)]
        max_turns: Option<usize>,
    },
    /// Embed one or more texts and print vector sizes
    Embed {
        /// Texts to embed
        texts: Vec<String>,
    },
    /// Initialize configuration
    Init,
    /// Show configuration
    Info,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            message,
            model,
            max_turns,
        } => {
            info!("Starting chat command");
            ChatStrategy
                .execute(ChatInput {
                    message,
                    model,
                    max_turns,
                })
                .await
        }
        Commands::Embed { texts } => EmbedStrategy.execute(EmbedInput { texts }).await,
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
