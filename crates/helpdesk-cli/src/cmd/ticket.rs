//! `hdesk ticket create` / `hdesk ticket show`.

use crate::cmd::{Workspace, helpdesk_failure, not_found};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};
use helpdesk_core::model::{
    CategoryId, CompanyId, PartnerId, Priority, ProjectId, StageId, TaskId, TeamId, Ticket,
    TicketDraft, TicketId, UserId,
};
use helpdesk_core::store::TicketRepository;
use helpdesk_core::ticket::create_ticket;
use std::io::{self, Write};

#[derive(Subcommand, Debug)]
pub enum TicketCommand {
    /// Create a ticket, filling the assignee from the team's method.
    Create(CreateArgs),
    /// Show one ticket.
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Ticket subject.
    #[arg(short, long)]
    pub name: String,

    #[arg(long, value_name = "ID")]
    pub team: Option<i64>,

    /// Assignee to keep if they are a member of the team. Anyone else is
    /// replaced by the team's pick, or cleared on a manual team.
    #[arg(long, value_name = "ID")]
    pub user: Option<i64>,

    #[arg(long, value_name = "ID")]
    pub stage: Option<i64>,

    #[arg(long, value_name = "ID")]
    pub partner: Option<i64>,

    /// Commercial partner; defaults to `--partner`.
    #[arg(long, value_name = "ID")]
    pub commercial_partner: Option<i64>,

    #[arg(long, value_name = "ID")]
    pub category: Option<i64>,

    /// 0-3 or low, medium, high, very-high.
    #[arg(long)]
    pub priority: Option<Priority>,

    #[arg(long, value_name = "ID")]
    pub company: Option<i64>,

    #[arg(long, value_name = "ID")]
    pub project: Option<i64>,

    #[arg(long, value_name = "ID")]
    pub task: Option<i64>,
}

impl CreateArgs {
    fn to_draft(&self) -> TicketDraft {
        TicketDraft {
            name: self.name.clone(),
            team_id: self.team.map(TeamId),
            user_id: self.user.map(UserId),
            stage_id: self.stage.map(StageId),
            partner_id: self.partner.map(PartnerId),
            commercial_partner_id: self.commercial_partner.or(self.partner).map(PartnerId),
            category_id: self.category.map(CategoryId),
            priority: self.priority.unwrap_or_default(),
            company_id: self.company.map(CompanyId),
            project_id: self.project.map(ProjectId),
            task_id: self.task.map(TaskId),
            ..TicketDraft::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Ticket id.
    pub id: i64,
}

/// Execute a `hdesk ticket` subcommand.
///
/// # Errors
///
/// Returns an error on unknown teams or tickets, or store failures.
pub fn run_ticket(command: &TicketCommand, workspace: &Workspace, output: OutputMode) -> Result<()> {
    match command {
        TicketCommand::Create(args) => run_create(args, workspace, output),
        TicketCommand::Show(args) => run_show(args, workspace, output),
    }
}

fn run_create(args: &CreateArgs, workspace: &Workspace, output: OutputMode) -> Result<()> {
    let mut store = workspace.open_store(output)?;
    let ticket = create_ticket(&mut store, args.to_draft(), Utc::now())
        .map_err(|e| helpdesk_failure(output, &e))?;
    tracing::info!(ticket = %ticket.id, assignee = ?ticket.user_id, "ticket created");
    render_ticket(output, &ticket)
}

fn run_show(args: &ShowArgs, workspace: &Workspace, output: OutputMode) -> Result<()> {
    let store = workspace.open_store(output)?;
    let ticket = store
        .ticket(TicketId(args.id))
        .map_err(|e| helpdesk_failure(output, &e))?
        .ok_or_else(|| not_found(output, TicketId::MODEL, args.id))?;
    render_ticket(output, &ticket)
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn render_ticket(output: OutputMode, ticket: &Ticket) -> Result<()> {
    render_mode(
        output,
        ticket,
        |t, w| {
            writeln!(
                w,
                "{}\t{}\tteam={}\tuser={}\tstage={}",
                t.id,
                t.name,
                or_dash(t.team_id),
                or_dash(t.user_id),
                or_dash(t.stage_id)
            )
        },
        |t, w| pretty_ticket(t, w),
    )
}

fn pretty_ticket(t: &Ticket, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Ticket {}: {}", t.id, t.name))?;
    pretty_kv(w, "team", or_dash(t.team_id))?;
    pretty_kv(w, "assignee", or_dash(t.user_id))?;
    pretty_kv(w, "stage", or_dash(t.stage_id))?;
    pretty_kv(w, "priority", t.priority.as_str())?;
    pretty_kv(w, "partner", or_dash(t.partner_id))?;
    pretty_kv(w, "project", or_dash(t.project_id))?;
    pretty_kv(w, "task", or_dash(t.task_id))?;
    pretty_kv(w, "created", t.created_at.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: CreateArgs,
    }

    #[test]
    fn create_args_build_draft() {
        let w = Wrapper::parse_from([
            "test", "--name", "Printer jam", "--team", "1", "--partner", "9", "--priority", "high",
        ]);
        let draft = w.args.to_draft();
        assert_eq!(draft.name, "Printer jam");
        assert_eq!(draft.team_id, Some(TeamId(1)));
        assert_eq!(draft.commercial_partner_id, Some(PartnerId(9)));
        assert_eq!(draft.priority, Priority::High);
        assert!(draft.user_id.is_none());
        assert!(draft.id.is_none());
    }

    #[test]
    fn bad_priority_is_rejected() {
        assert!(Wrapper::try_parse_from(["test", "--name", "x", "--priority", "urgent"]).is_err());
    }
}
