use std::io::Read;
use std::path::PathBuf;

use clap::Subcommand;
use repcue_core::clock::now_ms;
use repcue_core::workout::{Queue, Session};
use repcue_core::{Database, ExecutionStore, SessionSource};
use serde_json::json;
use tracing::warn;

use super::CliResult;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Import a session definition from a JSON file ("-" for stdin)
    Import {
        /// Path to the definition
        file: PathBuf,
    },
    /// List stored sessions
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stored session
    Show {
        /// Session ID
        id: String,
        /// Include the flattened action queue
        #[arg(long)]
        queue: bool,
    },
    /// Delete a stored session
    Delete {
        /// Session ID
        id: String,
    },
}

fn read_definition(file: &PathBuf) -> CliResult<String> {
    if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    Ok(std::fs::read_to_string(file)?)
}

pub fn run(action: SessionAction) -> CliResult {
    let db = Database::open()?;

    match action {
        SessionAction::Import { file } => {
            let mut session: Session = serde_json::from_str(&read_definition(&file)?)?;
            if session.id.trim().is_empty() {
                session.id = uuid::Uuid::new_v4().to_string();
            }
            let now = now_ms() as i64;
            if session.created_at == 0 {
                session.created_at = now;
            }
            session.updated_at = now;
            if db.load(&session.id)?.is_some() {
                warn!(session_id = %session.id, "session has a stored run; it may no longer resume");
            }
            db.upsert_session(&session)?;
            println!("{}", session.id);
        }
        SessionAction::List { json } => {
            let sessions = db.list_sessions()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                println!("no sessions");
            } else {
                for s in &sessions {
                    println!("{}  {}", s.id, s.name);
                }
            }
        }
        SessionAction::Show { id, queue } => {
            let session = db
                .find_session(&id)?
                .ok_or_else(|| format!("session not found: {id}"))?;
            if queue {
                let q = Queue::build(&session);
                let out = json!({
                    "session": session,
                    "queue": q,
                    "total_duration_sec": q.total_duration_sec(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&session)?);
            }
        }
        SessionAction::Delete { id } => {
            if !db.delete_session(&id)? {
                return Err(format!("session not found: {id}").into());
            }
            println!("session deleted: {id}");
        }
    }
    Ok(())
}
