//! `hdesk team`: inspect and check team configuration.

use crate::cmd::{Workspace, helpdesk_failure, not_found};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use clap::{Args, Subcommand};
use helpdesk_core::model::{AssignMethod, StageId, TeamId, UserId};
use helpdesk_core::store::TicketRepository;
use helpdesk_script::ScriptEngine;
use serde::Serialize;
use std::io::Write;

#[derive(Subcommand, Debug)]
pub enum TeamCommand {
    /// Run the write-time checks (assignation, scripts) on a stored team.
    Validate(TeamArgs),
}

#[derive(Args, Debug)]
pub struct TeamArgs {
    /// Team id.
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct ValidateOutput {
    ok: bool,
    team: TeamId,
    name: String,
    method: AssignMethod,
    members: Vec<UserId>,
    autoupdate_ticket_stage: bool,
    autoupdate_src_stage_ids: Vec<StageId>,
    autoupdate_dest_stage_id: Option<StageId>,
}

/// Execute a `hdesk team` subcommand.
///
/// # Errors
///
/// Returns an error if the team is missing or fails validation.
pub fn run_team(command: &TeamCommand, workspace: &Workspace, output: OutputMode) -> Result<()> {
    let TeamCommand::Validate(args) = command;
    let store = workspace.open_store(output)?;
    let team = store
        .team(TeamId(args.id))
        .map_err(|e| helpdesk_failure(output, &e))?
        .ok_or_else(|| not_found(output, TeamId::MODEL, args.id))?;

    if let Err(e) = team.validate(&ScriptEngine::new()) {
        tracing::warn!(team = %team.id, error = %e, "team failed validation");
        return Err(helpdesk_failure(output, &e));
    }

    let result = ValidateOutput {
        ok: true,
        team: team.id,
        members: team.sorted_members(),
        name: team.name,
        method: team.assign_method,
        autoupdate_ticket_stage: team.autoupdate_ticket_stage,
        autoupdate_src_stage_ids: team.autoupdate_src_stage_ids,
        autoupdate_dest_stage_id: team.autoupdate_dest_stage_id,
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "ok\t{}\t{}", r.team, r.name),
        |r, w| {
            pretty_section(w, &format!("Team {}: {} is valid", r.team, r.name))?;
            pretty_kv(w, "method", r.method.label())?;
            let members: Vec<String> = r.members.iter().map(ToString::to_string).collect();
            pretty_kv(w, "members", members.join(", "))?;
            if r.autoupdate_ticket_stage {
                let src: Vec<String> = r
                    .autoupdate_src_stage_ids
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                let dest = r
                    .autoupdate_dest_stage_id
                    .map_or_else(|| "-".to_string(), |s| s.to_string());
                pretty_kv(w, "autoupdate", format!("[{}] -> {dest}", src.join(", ")))?;
            }
            Ok(())
        },
    )
}
