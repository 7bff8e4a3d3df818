//! Interactive search against the live catalog with debounced input.
//! Each stdin line replaces the current query text; a search runs once input pauses.
//! An empty line (or `:clear`) resets to the idle prompt immediately.
//! Usage:
//!   cargo run --bin search_repl
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use cinefav::config::Config;
use cinefav::debounce::SearchInput;
use cinefav::favorites::FavoritesStore;
use cinefav::search::SearchController;
use cinefav::storage::{FileStore, KeyValueStore};
use cinefav::tmdb::TmdbClient;
use cinefav::views::SearchView;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present for local runs.
    dotenv().ok();

    let config = Config::from_env().context("Missing configuration")?;
    let client = TmdbClient::new(&config)?;
    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.data_dir)?);
    let favorites = FavoritesStore::load(storage);

    let (mut input, mut queries) = SearchInput::new(config.debounce);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut search = SearchController::new();
    let mut stdin_open = true;

    eprintln!("Type a movie title (debounce {:?}).", config.debounce);
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line.context("reading stdin")? {
                    Some(l) if l.trim().is_empty() || l.trim() == ":clear" => input.clear(),
                    Some(l) => input.on_change(l),
                    None => stdin_open = false,
                }
            }
            Some(query) = queries.recv() => {
                if let Err(e) = search.run(&client, &query).await {
                    eprintln!("Search failed: {e}");
                }
                let view = SearchView::build(&search, &favorites);
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
        }
        if !stdin_open && !input.is_pending() && queries.is_empty() {
            break;
        }
    }
    Ok(())
}
