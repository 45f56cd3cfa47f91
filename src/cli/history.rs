//! History command - list a repository's recorded scans

use anyhow::Result;
use std::path::Path;

use vigil::config::Config;
use vigil::history::HistoryStore;
use vigil::output::render_history;
use vigil::storage::StorePaths;

pub async fn history_command(
    work_dir: &Path,
    repo: &str,
    limit: usize,
    json: bool,
) -> Result<i32> {
    let config = Config::from_dir(work_dir)?;
    let store = StorePaths::default_home()?;
    let history = HistoryStore::new(store, config.settings.max_scans).load(repo)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
    } else {
        print!("{}", render_history(&history, limit));
    }
    Ok(0)
}
