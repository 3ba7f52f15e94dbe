use anyhow::Result;
use clap::{Parser, Subcommand};
use gems_search::db::{self, PgEnumStore, PgQueryExecutor, SearchHistoryRepository};
use gems_search::orchestrator::suggest_from;
use gems_search::security::validate;
use gems_search::{EnumCache, LlmClient, ResultEnricher, SearchConfig, SearchOrchestrator, SqlParam};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gems-search")]
#[command(about = "Natural-language search over the GEMS recruitment database")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a natural-language search
    Search {
        /// The question in natural language
        query: String,

        /// Positional parameter values bound to @p0, @p1, ... (JSON or plain text)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Check a SQL statement against the safety policy
    Validate {
        sql: String,
    },
    /// Suggest previous searches starting with the given text
    Suggest {
        partial: String,

        /// Maximum suggestions (default: SUGGESTION_LIMIT)
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

/// Parse a CLI parameter as JSON, falling back to a plain string.
fn parse_param(raw: &str) -> SqlParam {
    serde_json::from_str(raw).unwrap_or_else(|_| SqlParam::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = SearchConfig::from_env()?;

    match args.command {
        Command::Validate { sql } => {
            println!("{}", serde_json::to_string_pretty(&validate(&sql))?);
        }
        Command::Suggest { partial, limit } => {
            let pool = db::init_pool(&config).await?;
            db::init_schema(&pool).await?;
            let history = SearchHistoryRepository::new(pool);
            let limit = limit.unwrap_or(config.suggestion_limit);
            let suggestions = suggest_from(&history, &partial, limit).await;
            println!("{}", serde_json::to_string_pretty(&suggestions)?);
        }
        Command::Search { query, params } => {
            let api_key = config.require_api_key()?.to_string();
            let pool = db::init_pool(&config).await?;
            db::init_schema(&pool).await?;

            let cache = EnumCache::with_ttl(Arc::new(PgEnumStore::new(pool.clone())), config.enum_cache_ttl);
            let llm = LlmClient::new(api_key, config.openai_model.clone(), config.openai_base_url.clone());
            let orchestrator = SearchOrchestrator::new(Arc::new(llm), Arc::new(PgQueryExecutor::new(pool.clone())))
                .with_enricher(ResultEnricher::new(Arc::new(cache)))
                .with_history(Arc::new(SearchHistoryRepository::new(pool)));

            let params: Vec<SqlParam> = params.iter().map(|p| parse_param(p)).collect();
            info!(query = %query, params = params.len(), "Search starting");

            match orchestrator.search(&query, &params).await {
                Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                Err(failure) => {
                    println!("{}", serde_json::to_string_pretty(&failure)?);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
