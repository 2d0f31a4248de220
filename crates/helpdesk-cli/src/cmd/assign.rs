//! `hdesk assign preview`: who the team's method would pick next.

use crate::cmd::{Workspace, helpdesk_failure, not_found};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use clap::{Args, Subcommand};
use helpdesk_core::assign::select_assignee;
use helpdesk_core::model::{AssignMethod, TeamId, UserId};
use helpdesk_core::store::{TicketHistory, TicketRepository};
use serde::Serialize;
use std::io::Write;

#[derive(Subcommand, Debug)]
pub enum AssignCommand {
    /// Print the assignee a new ticket for the team would get.
    Preview(PreviewArgs),
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    #[arg(long, value_name = "ID")]
    pub team: i64,
}

#[derive(Debug, Serialize)]
struct PreviewOutput {
    team: TeamId,
    method: AssignMethod,
    members: Vec<UserId>,
    open_tickets: Vec<(UserId, usize)>,
    assignee: Option<UserId>,
}

/// Execute `hdesk assign preview`. Nothing is written.
///
/// # Errors
///
/// Returns an error if the team does not exist or a lookup fails.
pub fn run_assign(command: &AssignCommand, workspace: &Workspace, output: OutputMode) -> Result<()> {
    let AssignCommand::Preview(args) = command;
    let store = workspace.open_store(output)?;
    let team = store
        .team(TeamId(args.team))
        .map_err(|e| helpdesk_failure(output, &e))?
        .ok_or_else(|| not_found(output, TeamId::MODEL, args.team))?;

    let members = team.sorted_members();
    let counts = store
        .open_ticket_counts(&members)
        .map_err(|e| helpdesk_failure(output, &e))?;
    let assignee = select_assignee(&team, &store).map_err(|e| helpdesk_failure(output, &e))?;

    let result = PreviewOutput {
        team: team.id,
        method: team.assign_method,
        open_tickets: members
            .iter()
            .map(|m| (*m, counts.get(m).copied().unwrap_or(0)))
            .collect(),
        members,
        assignee,
    };
    render_mode(
        output,
        &result,
        |r, w| {
            let assignee = r.assignee.map_or_else(|| "-".to_string(), |u| u.to_string());
            writeln!(w, "{}\t{}\t{assignee}", r.team, r.method)
        },
        |r, w| {
            pretty_section(w, &format!("Assignment preview for team {}", r.team))?;
            pretty_kv(w, "method", r.method.to_string())?;
            for (member, open) in &r.open_tickets {
                pretty_kv(w, &format!("user {member}"), format!("{open} open"))?;
            }
            pretty_kv(
                w,
                "next",
                r.assignee.map_or_else(|| "nobody".to_string(), |u| u.to_string()),
            )
        },
    )
}
