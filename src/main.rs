use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Parser;

use ollama_chat::{handler, logging, tui, ui, App, BackendClient, Config};

#[derive(Parser)]
#[command(name = "ollama-chat", version)]
#[command(about = "Chat with a local Ollama backend from the terminal")]
struct Cli {
    /// Base URL of the chat backend
    #[arg(short, long, env = "OLLAMA_CHAT_URL")]
    url: Option<String>,
    /// Model to preselect when the backend offers it
    #[arg(short, long, env = "OLLAMA_CHAT_MODEL")]
    model: Option<String>,
    /// Config file (defaults to <config dir>/ollama-chat/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log file (defaults to <cache dir>/ollama-chat/ollama-chat.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = match cli.log_file {
        Some(path) => path,
        None => logging::default_log_path()?,
    };
    let _guard = logging::init(&log_path)?;

    let file_config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let config = file_config.merge(cli.url, cli.model);
    tracing::info!(base_url = config.base_url(), "ollama-chat starting");

    tui::install_panic_hook();
    let mut terminal = tui::init().context("setting up terminal")?;

    let result = run(&mut terminal, config).await;

    tui::restore().context("restoring terminal")?;
    if let Err(e) = &result {
        tracing::error!("exiting with error: {:#}", e);
    }
    result
}

async fn run(terminal: &mut tui::Tui, config: Config) -> Result<()> {
    let mut events = tui::EventHandler::new();
    let client = BackendClient::new(config.base_url());
    let mut app = App::new(client, config.default_model.clone(), events.sender());

    app.refresh();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event)?,
            None => break,
        }
    }

    Ok(())
}
