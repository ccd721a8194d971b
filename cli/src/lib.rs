//! `opsdesk`: search and navigate scoped hierarchies from the terminal.

mod cache_cmd;
mod data_source;
mod nav_cmd;

pub use cache_cmd::CacheCommand;
pub use data_source::JsonFileSource;
pub use nav_cmd::NavigateCommand;
pub use nav_cmd::ScopeArgs;
pub use nav_cmd::SearchCommand;

use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "opsdesk", version, about = "Search and navigate scoped hierarchies")]
pub struct Cli {
    /// Directory for cached hierarchies. Defaults to the platform cache dir.
    #[arg(long = "cache-dir", global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one tiered search and print the active result list.
    Search(SearchCommand),
    /// Replay key presses against a search and print what gets committed.
    Navigate(NavigateCommand),
    /// Manage cached hierarchies.
    #[command(subcommand)]
    Cache(CacheCommand),
}

impl Cli {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    pub async fn run(self) -> Result<()> {
        let cache_dir = self.cache_dir();
        match self.command {
            Command::Search(cmd) => nav_cmd::run_search(cmd, &cache_dir).await,
            Command::Navigate(cmd) => nav_cmd::run_navigate(cmd, &cache_dir).await,
            Command::Cache(cmd) => cache_cmd::run_cache(cmd, &cache_dir),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("opsdesk")
}
