use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use tiekou::agent::FortuneAgent;
use tiekou::cli::{Cli, Commands};
use tiekou::config::Config;
use tiekou::gateway;
use tiekou::providers;
use tiekou::store::{InteractionStore, SqliteStore};
use tiekou::verdicts::Language;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = Config::load_or_init()?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            let port = port.unwrap_or(config.gateway.port);
            gateway::run_gateway(&host, port, config).await
        }
        Commands::Ask {
            question,
            language,
            reasoning,
        } => ask(&config, &question, language.as_deref(), reasoning).await,
        Commands::History { limit } => history(&config, limit).await,
        Commands::Clear => clear(&config).await,
    }
}

async fn ask(
    config: &Config,
    question: &str,
    language: Option<&str>,
    reasoning: bool,
) -> Result<()> {
    config.validate()?;
    let language = Language::from_tag_or(language, config.default_language);

    let provider = providers::create_provider(&config.llm);
    let agent = FortuneAgent::new(provider);

    let reading = agent.execute(question, language, reasoning).await?;
    println!("{}", reading.result);

    if let Some(trace) = reading.reasoning {
        eprintln!("--");
        eprintln!("state:          {}", trace.state);
        eprintln!("mother verdict: {}", trace.mother_verdict);
        eprintln!(
            "features:       attempt={} len={} qmark={} hour={}",
            trace.features.attempt_count,
            trace.features.char_length,
            trace.features.has_question_mark,
            trace.features.hour
        );
    }
    Ok(())
}

async fn history(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let records = store.recent_interactions(limit).await?;
    if records.is_empty() {
        println!("no readings stored");
        return Ok(());
    }
    for record in records {
        println!(
            "[{}] ({}) {} → {}",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.state,
            if record.question.is_empty() {
                "<empty>"
            } else {
                record.question.as_str()
            },
            record.result
        );
    }
    Ok(())
}

async fn clear(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let deleted = store.clear_interactions().await?;
    println!("deleted {deleted} readings");
    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::open(&config.db_path())?))
}
