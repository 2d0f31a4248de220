//! Durable helpdesk records in a single SQLite file.
//!
//! [`SqliteStore`] holds companies, users, stages, teams, projects, tasks,
//! tags and tickets, and implements every store trait the assignment
//! selector, the filter composer and the mail hook read through. The schema
//! is versioned in [`migrations`]. A team's members and auto-update source
//! stages live in edge tables that are deleted with the team, which needs
//! `foreign_keys` on every connection.

pub mod migrations;
pub mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// How long a CLI call waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the workspace database at `path`, creating it and its directory on
/// first use, and bring the schema up to date.
///
/// # Errors
///
/// Returns an error if opening, configuring or migrating the database fails.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("open helpdesk database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    let version = migrations::migrate(&mut conn).context("apply helpdesk migrations")?;
    tracing::debug!(path = %path.display(), version, "helpdesk database ready");

    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // ticket reads from `hdesk domain` run while a seed writes
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
