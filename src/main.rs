use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tagstash::channel::stdio::read_events;
use tagstash::channel::StdioMessenger;
use tagstash::report::{build_page, tag_frequencies, PageLayout, EMPTY_NOTICE};
use tagstash::{Bot, Config, FileIndex, SearchEngine};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Tag-indexed media stash for chat bots.
#[derive(Parser, Debug)]
#[command(name = "tagstash", version, about)]
struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve events: JSON lines on stdin, outbound actions on stdout.
    Run,
    /// Look up a user's files. No query lists the latest, `*` shuffles.
    Search {
        #[arg(long)]
        owner: i64,
        query: Option<String>,
    },
    /// Print one page of a user's tag report.
    Top {
        #[arg(long)]
        owner: i64,
        #[arg(long, default_value_t = 0)]
        page: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let index = FileIndex::open(&config.database_path())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config, index).await,
        Commands::Search { owner, query } => {
            let engine = SearchEngine::new(index, config.search.limit);
            for record in engine.search(owner, query.as_deref()) {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(())
        }
        Commands::Top { owner, page } => {
            let ranked = tag_frequencies(&index, owner)?;
            if ranked.is_empty() {
                println!("{EMPTY_NOTICE}");
                return Ok(());
            }
            let layout = PageLayout::new(ranked.len(), config.report.page_size, page);
            let (text, _) = build_page(&ranked, &layout, Uuid::nil());
            println!("{text}");
            Ok(())
        }
    }
}

async fn run(config: &Config, index: FileIndex) -> Result<()> {
    info!("database at {}", config.database_path().display());
    let messenger = Arc::new(StdioMessenger::stdout());
    let bot = Bot::new(config, index, messenger);

    let (tx, rx) = mpsc::channel(256);
    let reader = tokio::spawn(async move {
        if let Err(e) = read_events(BufReader::new(tokio::io::stdin()), tx).await {
            error!("Event reader stopped: {e:#}");
        }
    });

    // Returns once stdin is exhausted and every queued reply is written.
    bot.run(rx).await;
    reader.await.context("Event reader panicked")?;
    Ok(())
}
