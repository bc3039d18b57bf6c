//! `curia-client` status tool.
//!
//! ```text
//! curia-client [status]   restore the persisted session and report it
//! curia-client logout     clear the persisted session
//! ```

use anyhow::{Context, bail};
use serde_json::json;

use curia_auth::{InMemoryIdentityDirectory, Session, SessionStore};
use curia_client::{ClientConfig, SqliteStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("failed to load client configuration")?;
    curia_observability::init(config.log_format);
    for warning in &config.warnings {
        tracing::warn!("{warning}");
    }

    let command = std::env::args().nth(1).unwrap_or_else(|| "status".to_string());

    let storage = SqliteStorage::open(config.session_db_path());
    tracing::debug!(path = ?config.session_db_path(), "using session storage");

    // Restoring and clearing never consult the directory.
    let sessions = SessionStore::new(InMemoryIdentityDirectory::new(), storage);
    let session = sessions.restore().await;

    match command.as_str() {
        "status" => report(&session).context("failed to render session status")?,
        "logout" => {
            sessions.logout().await.context("failed to clear the persisted session")?;
            println!("signed out");
        }
        other => bail!("unknown command `{other}` (expected `status` or `logout`)"),
    }

    Ok(())
}

fn report(session: &Session) -> anyhow::Result<()> {
    let status = match session.identity() {
        Some(identity) => json!({
            "signed_in": true,
            "email": identity.email,
            "display_name": identity.display_name,
            "role": identity.role_label,
            "account_kind": identity.account_kind,
            "unit_id": identity.unit_id,
            "permissions": identity.permissions(),
        }),
        None => json!({ "signed_in": false }),
    };

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
