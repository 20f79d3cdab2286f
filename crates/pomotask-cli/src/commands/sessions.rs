use clap::Subcommand;
use pomotask_core::{reconcile, Config, HttpSink, SessionRecord, TaskId};
use serde_json::json;
use url::Url;

use super::{open_cache, print_json};

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List cached sessions in recording order
    List {
        /// Only sessions for this task
        #[arg(long)]
        task: Option<TaskId>,
    },
    /// Total worked seconds, for one task or per task
    Worked {
        #[arg(long)]
        task: Option<TaskId>,
    },
    /// Upload cached sessions to the server, then drop them locally
    Sync {
        /// Server base URL (defaults to sync.server_url)
        #[arg(long)]
        url: Option<Url>,
        /// Bearer token (defaults to sync.api_token)
        #[arg(long)]
        token: Option<String>,
    },
    /// Delete every cached session without uploading
    Clear {
        /// Confirm that unsynced sessions may be lost
        #[arg(long)]
        yes: bool,
    },
}

pub async fn run(action: SessionsAction) -> Result<(), Box<dyn std::error::Error>> {
    let cache = open_cache()?;

    match action {
        SessionsAction::List { task } => {
            let sessions: Vec<SessionRecord> = cache
                .get_sessions()?
                .into_iter()
                .filter(|s| task.as_ref().map_or(true, |t| s.task_id() == t))
                .collect();
            print_json(&sessions)?;
        }
        SessionsAction::Worked { task: Some(task) } => {
            let seconds = cache.worked_seconds(&task)?;
            print_json(&json!({ "taskId": task, "workedSeconds": seconds }))?;
        }
        SessionsAction::Worked { task: None } => {
            print_json(&cache.worked_by_task()?)?;
        }
        SessionsAction::Sync { url, token } => {
            let config = Config::load()?;
            let base = match url {
                Some(url) => url.to_string(),
                None if !config.sync.server_url.is_empty() => config.sync.server_url.clone(),
                None => return Err("no server configured; pass --url or set sync.server_url".into()),
            };
            let token = token.or_else(|| Some(config.sync.api_token.clone()));
            let sink = HttpSink::new(&base, token)?;
            let report = reconcile(&cache, &sink).await?;
            print_json(&report)?;
        }
        SessionsAction::Clear { yes } => {
            if !yes {
                return Err("refusing to clear unsynced sessions without --yes".into());
            }
            cache.clear_sessions()?;
            print_json(&json!({ "cleared": true }))?;
        }
    }
    Ok(())
}
