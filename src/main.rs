use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use whydiff::config::Settings;
use whydiff::constants;
use whydiff::dispatch::Gate;
use whydiff::env::Env;
use whydiff::orchestrator::Pipeline;
use whydiff::providers::rig::RigProvider;
use whydiff::providers::ReasoningProvider;
use whydiff::reasoning::{PromptTemplates, ReasoningService};
use whydiff::server;
use whydiff::storage::Store;

/// Business-reasoning webhook service for merge and pull requests.
#[derive(Parser, Debug)]
#[command(name = constants::APP_NAME, version, about)]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = constants::DEFAULT_PORT)]
    port: u16,

    /// SQLite database path.
    #[arg(long, env = "DATABASE_PATH", default_value = constants::DEFAULT_DB_PATH)]
    db: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{}=info", constants::APP_NAME))),
        )
        .init();

    let args = Args::parse();
    let settings = Arc::new(Settings::from_env(&Env::real()));

    if let Some(parent) = args.db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let store = Arc::new(Store::open(&args.db)?);

    let provider = Arc::new(RigProvider::new(settings.provider.clone())?) as Arc<dyn ReasoningProvider>;
    let templates = PromptTemplates::resolve(settings.prompt_file.as_deref())?;
    let reasoner = Arc::new(ReasoningService::new(
        provider,
        templates,
        settings.max_input_tokens,
    ));

    let pipeline = Arc::new(Pipeline::new(store, reasoner, Arc::clone(&settings)));
    let gate = Arc::new(Gate::new(settings, pipeline));

    server::serve(gate, args.port).await
}
