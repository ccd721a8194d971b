use crate::nav_cmd::open_cache;
use anyhow::Result;
use clap::Subcommand;
use opsdesk_navigator::HierarchyKey;
use opsdesk_utils_cache::DEFAULT_TTL;
use std::path::Path;

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Drop the cached hierarchy for one scope.
    Clear {
        /// Scope path, outermost segment first.
        #[arg(long = "scope", value_name = "SEGMENT", num_args = 1.., required = true)]
        scope: Vec<String>,
    },
}

pub fn run_cache(cmd: CacheCommand, cache_dir: &Path) -> Result<()> {
    match cmd {
        CacheCommand::Clear { scope } => {
            let key = HierarchyKey::new(scope);
            open_cache(cache_dir, DEFAULT_TTL).invalidate(&key.cache_key());
            println!("cleared {key}");
        }
    }
    Ok(())
}
