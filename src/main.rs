use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use newswire::config::{Config, Credentials};
use newswire::health;
use newswire::publish::TelegramClient;
use newswire::scheduler::Scheduler;
use newswire::storage::{Database, DatabaseError};
use newswire::summarize::Summarizer;

#[derive(Parser, Debug)]
#[command(
    name = "newswire",
    about = "RSS news bot posting OpenAI summaries to a Telegram channel"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "FILE", default_value = "newswire.toml")]
    config: PathBuf,

    /// Run a single polling pass and exit (smoke testing)
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Credentials first: a missing token should abort here with a clear
    // message, not as an authentication failure deep inside a pass.
    let credentials = Credentials::from_env().context("Startup aborted")?;

    let config = Config::load(&args.config).context("Failed to load configuration")?;

    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of newswire appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let already_published = db
        .published_count()
        .await
        .context("Failed to query published links")?;
    tracing::info!(
        feeds = config.feeds.len(),
        published_links = already_published,
        "newswire starting"
    );

    // Optional uptime endpoint for hosting platforms that probe a port
    if let Ok(port_str) = std::env::var("PORT") {
        let port: u16 = port_str
            .parse()
            .with_context(|| format!("Invalid PORT value '{port_str}'"))?;
        tokio::spawn(async move {
            if let Err(e) = health::serve(port).await {
                tracing::error!(error = %e, "Health endpoint failed");
            }
        });
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("newswire/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let summarizer = Summarizer::new(credentials.openai_api_key, config.summary_model.clone());
    let telegram = TelegramClient::new(credentials.bot_token, credentials.channel_id);
    let scheduler = Scheduler::new(config, db, client, summarizer, telegram);

    if args.once {
        let summary = scheduler.run_pass().await?;
        tracing::info!(
            published = summary.published,
            duplicates = summary.duplicates,
            "Single pass complete"
        );
        return Ok(());
    }

    scheduler.run().await;
    Ok(())
}
