pub mod assign;
pub mod domain;
pub mod init;
pub mod mail;
pub mod seed;
pub mod team;
pub mod ticket;

use crate::output::{CliError, OutputMode, fail};
use anyhow::{Context as _, Result};
use helpdesk_core::ErrorCode;
use helpdesk_core::compose::Session;
use helpdesk_core::config::{self, HelpdeskConfig};
use helpdesk_core::db::SqliteStore;
use helpdesk_core::store::TicketRepository;
use std::path::{Path, PathBuf};

/// Resolved workspace: config plus the database the command runs against.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: HelpdeskConfig,
    pub db_path: PathBuf,
}

impl Workspace {
    /// Load `.hdesk/config.toml` under `root`. `db_override` wins over the
    /// configured database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load(root: &Path, db_override: Option<&Path>) -> Result<Self> {
        let config = config::load_config(root)?;
        let db_path = db_override.map_or_else(|| config.database_path(root), Path::to_path_buf);
        Ok(Self {
            root: root.to_path_buf(),
            config,
            db_path,
        })
    }

    /// Open the existing database.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorCode::NotInitialized`] when the database file is
    /// missing, or with the underlying error when it cannot be opened.
    pub fn open_store(&self, output: OutputMode) -> Result<SqliteStore> {
        if !self.db_path.exists() {
            return Err(fail(
                output,
                CliError::with_code(
                    format!("no helpdesk database at {}", self.db_path.display()),
                    ErrorCode::NotInitialized,
                ),
            ));
        }
        SqliteStore::open(&self.db_path)
    }

    /// The session configured under `[session]`, with user and company
    /// records loaded when they exist.
    ///
    /// # Errors
    ///
    /// Returns store errors from the lookups.
    pub fn session(&self, store: &SqliteStore) -> Result<Session> {
        let session_cfg = &self.config.session;
        let mut session = Session::new(session_cfg.user_id);
        if let Some(user) = store
            .user(session_cfg.user_id)
            .context("load session user")?
        {
            session = session.with_user(user);
        }
        if let Some(company_id) = session_cfg.company_id
            && let Some(company) = store.company(company_id).context("load session company")?
        {
            session = session.with_company(company);
        }
        Ok(session)
    }
}

/// Report a missing record the same way from every command.
pub fn not_found(output: OutputMode, model: &str, id: i64) -> anyhow::Error {
    fail(
        output,
        CliError::with_code(format!("{model} record {id} not found"), ErrorCode::RecordNotFound),
    )
}

/// Render a helpdesk error and turn it into the command's failure.
pub fn helpdesk_failure(output: OutputMode, err: &helpdesk_core::HelpdeskError) -> anyhow::Error {
    fail(output, CliError::from(err))
}
