//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                 |
//! |------------|----------------------------------|
//! | `auth`     | `Login`, `Register`, `Logout`    |
//! | `projects` | `Projects`, `Members`            |
//! | `tasks`    | `Tasks`, `Users`                 |
//! | `board`    | `Board`, `Move`                  |
//! | `stats`    | `Stats`                          |
//! | `config`   | `Config`                         |

pub mod auth;
pub mod board;
pub mod config;
pub mod projects;
pub mod stats;
pub mod tasks;

pub use auth::{cmd_login, cmd_logout, cmd_register};
pub use board::{cmd_board, cmd_move};
pub use config::cmd_config;
pub use projects::{cmd_members, cmd_projects};
pub use stats::cmd_stats;
pub use tasks::{cmd_tasks, cmd_users};

use anyhow::{Context, Result};
use std::sync::Arc;

use metritask::config::Config;
use metritask::gateway::HttpGateway;
use metritask::session::FileSession;

/// Build the gateway every networked command talks through.
pub(crate) fn connect(config: &Config) -> Result<Arc<HttpGateway>> {
    let session = FileSession::new(config.session_path()?);
    tracing::debug!(
        api_url = %config.api_url(),
        session = %session.path().display(),
        "connecting"
    );
    let gateway = HttpGateway::with_timeout(
        &config.api_url(),
        Arc::new(session),
        config.request_timeout(),
    )
    .context("Failed to build HTTP client")?;
    Ok(Arc::new(gateway))
}

/// Truncate `text` to `width` characters, marking the cut with an ellipsis.
pub(crate) fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{}…", kept)
}
