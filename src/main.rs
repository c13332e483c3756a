use std::io::Write;
use std::sync::Arc;
use tracing::info;

use research_engine::capabilities::{HttpChatModel, HttpPageFetcher, HttpWebSearch};
use research_engine::config::{load_engine_file_config, EngineConfig};
use research_engine::session::SessionState;
use research_engine::Engine;

/// Minimal CLI entry point: reads one research request from stdin (or the
/// first CLI argument) and prints the resulting plan/report. The HTTP/SSE
/// request surface described in the requirements is a presentation-layer
/// concern left to callers embedding this crate; this binary exists to
/// exercise the engine end to end.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,research_engine=debug"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let file_config = load_engine_file_config();
    let config = EngineConfig::resolve(&file_config);

    let message = match std::env::args().nth(1) {
        Some(m) => m,
        None => {
            print!("Research request: ");
            std::io::stdout().flush().ok();
            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;
            input.trim().to_string()
        }
    };

    if message.is_empty() {
        anyhow::bail!("no research request provided");
    }

    let chat = Arc::new(HttpChatModel::new(&config));
    let search = Arc::new(HttpWebSearch::new(&config));
    let fetcher = Arc::new(HttpPageFetcher::new(&config));
    let engine = Engine::new(chat, search, fetcher, config);

    let mut state = SessionState::default();
    let progress: research_engine::ProgressCallback = Box::new(|p| {
        info!(stage = ?p.stage, "{}", p.message);
    });

    let (plan, result) = engine.run_turn(&message, &mut state, Some(progress)).await;

    match result {
        Some(report) => {
            println!("{}", report.synthesis);
        }
        None => {
            println!("{:#?}", plan);
        }
    }

    Ok(())
}
