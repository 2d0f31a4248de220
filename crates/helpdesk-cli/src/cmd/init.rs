//! `hdesk init`: create the workspace config and database.

use crate::cmd::Workspace;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use helpdesk_core::config::{self, HelpdeskConfig};
use helpdesk_core::db::SqliteStore;
use helpdesk_core::model::{CompanyId, UserId};
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing `.hdesk/config.toml`.
    #[arg(long)]
    pub force: bool,

    /// User the session runs as.
    #[arg(long, value_name = "ID")]
    pub user: Option<i64>,

    /// Company the session runs in.
    #[arg(long, value_name = "ID")]
    pub company: Option<i64>,

    /// Skip scripted filter layers.
    #[arg(long)]
    pub no_scripts: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    ok: bool,
    config: String,
    database: String,
}

/// Execute `hdesk init`.
///
/// # Errors
///
/// Returns an error if the config already exists without `--force`, or if
/// writing the config or creating the database fails.
pub fn run_init(args: &InitArgs, workspace: &Workspace, output: OutputMode) -> Result<()> {
    let path = config::config_path(&workspace.root);
    if path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists. Use `hdesk init --force` to reinitialize.",
            path.display()
        );
    }

    let mut cfg = if args.force {
        workspace.config.clone()
    } else {
        HelpdeskConfig::default()
    };
    if let Some(user) = args.user {
        cfg.session.user_id = UserId(user);
    }
    if let Some(company) = args.company {
        cfg.session.company_id = Some(CompanyId(company));
    }
    if args.no_scripts {
        cfg.scripts.enabled = false;
    }

    let config_file = config::write_config(&workspace.root, &cfg)?;
    let db_path = workspace.db_path.clone();
    SqliteStore::open(&db_path)?;
    tracing::info!(config = %config_file.display(), database = %db_path.display(), "workspace initialized");

    let result = InitOutput {
        ok: true,
        config: config_file.display().to_string(),
        database: db_path.display().to_string(),
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "initialized\t{}\t{}", r.config, r.database),
        |r, w| {
            pretty_section(w, "Initialized helpdesk workspace")?;
            pretty_kv(w, "config", &r.config)?;
            pretty_kv(w, "database", &r.database)
        },
    )
}
