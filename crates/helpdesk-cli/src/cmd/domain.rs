//! `hdesk domain`: show the composed project/task filter.

use crate::cmd::{Workspace, helpdesk_failure};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use helpdesk_core::compose::{DomainComposer, DomainKind};
use helpdesk_core::domain::Domain;
use helpdesk_core::model::{CompanyId, TeamId, TicketId};
use helpdesk_core::store::RecordCatalog;
use helpdesk_core::ticket::{TicketDomains, ViewContext};
use helpdesk_script::ScriptEngine;
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct DomainArgs {
    /// Selector to compose the filter for: project or task.
    pub kind: DomainKind,

    /// Compose for an existing ticket.
    #[arg(long, value_name = "ID")]
    pub ticket: Option<i64>,

    /// Team to use when no ticket is given.
    #[arg(long, value_name = "ID")]
    pub team: Option<i64>,

    /// Company to use when no ticket is given; defaults to the session company.
    #[arg(long, value_name = "ID")]
    pub company: Option<i64>,

    /// Also list the records the filter selects.
    #[arg(long)]
    pub search: bool,
}

#[derive(Debug, Serialize)]
struct Selected {
    id: i64,
    name: String,
}

#[derive(Debug, Serialize)]
struct DomainOutput {
    kind: DomainKind,
    domain: Domain,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    records: Option<Vec<Selected>>,
}

/// Execute `hdesk domain`.
///
/// # Errors
///
/// Returns an error on lookup or search failures.
pub fn run_domain(args: &DomainArgs, workspace: &Workspace, output: OutputMode) -> Result<()> {
    let store = workspace.open_store(output)?;
    let session = workspace.session(&store)?;
    let engine = ScriptEngine::new();
    let composer = DomainComposer::new(&engine).with_scripts(workspace.config.scripts.enabled);
    let domains = TicketDomains::new(&composer, &store, &session);

    let ctx = ViewContext {
        active_id: args.ticket.map(TicketId),
        default_team_id: args.team.map(TeamId),
        default_company_id: args.company.map(CompanyId),
    };
    let domain = domains
        .for_view(args.kind, &ctx)
        .map_err(|e| helpdesk_failure(output, &e))?;
    tracing::debug!(kind = %args.kind, domain = %domain, "composed filter");

    let records = if args.search {
        Some(search(&store, args.kind, &domain).map_err(|e| helpdesk_failure(output, &e))?)
    } else {
        None
    };

    let result = DomainOutput {
        kind: args.kind,
        text: domain.to_string(),
        domain,
        records,
    };
    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(w, "{}\t{}", r.kind, r.text)?;
            for rec in r.records.iter().flatten() {
                writeln!(w, "{}\t{}", rec.id, rec.name)?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, &format!("{} filter", r.kind))?;
            pretty_kv(w, "domain", &r.text)?;
            if let Some(records) = &r.records {
                pretty_kv(w, "matches", records.len().to_string())?;
                for rec in records {
                    writeln!(w, "  #{:<6} {}", rec.id, rec.name)?;
                }
            }
            Ok(())
        },
    )
}

/// An empty filter selects nothing rather than everything.
fn search(
    store: &impl RecordCatalog,
    kind: DomainKind,
    domain: &Domain,
) -> helpdesk_core::Result<Vec<Selected>> {
    if domain.is_empty() {
        return Ok(Vec::new());
    }
    Ok(match kind {
        DomainKind::Project => store
            .search_projects(domain)?
            .into_iter()
            .map(|p| Selected {
                id: p.id.get(),
                name: p.name,
            })
            .collect(),
        DomainKind::Task => store
            .search_tasks(domain)?
            .into_iter()
            .map(|t| Selected {
                id: t.id.get(),
                name: t.name,
            })
            .collect(),
    })
}
