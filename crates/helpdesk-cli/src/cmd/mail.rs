//! `hdesk mail inbound`: feed a reply routed to a ticket through the
//! inbound handlers.

use crate::cmd::{Workspace, helpdesk_failure, not_found};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use clap::{Args, Subcommand};
use helpdesk_core::mail::{Accept, InboundMessage, Route, RouteHandler, StageAutoUpdate};
use helpdesk_core::model::{StageId, TicketId};
use helpdesk_core::store::TicketRepository;
use serde::Serialize;
use std::io::Write;

#[derive(Subcommand, Debug)]
pub enum MailCommand {
    /// Process an inbound message routed to a ticket.
    Inbound(InboundArgs),
}

#[derive(Args, Debug)]
pub struct InboundArgs {
    /// Ticket the message is routed to.
    #[arg(long, value_name = "ID")]
    pub ticket: i64,

    #[arg(long, default_value = "")]
    pub subject: String,

    #[arg(long, default_value = "")]
    pub from: String,

    #[arg(long, default_value = "")]
    pub message_id: String,
}

#[derive(Debug, Serialize)]
struct InboundOutput {
    ticket: TicketId,
    from_stage: Option<StageId>,
    to_stage: Option<StageId>,
    changed: bool,
}

fn stage_label(stage: Option<StageId>) -> String {
    stage.map_or_else(|| "-".to_string(), |s| s.to_string())
}

/// Execute `hdesk mail inbound`.
///
/// # Errors
///
/// Returns an error if the ticket is missing or a store write fails.
pub fn run_mail(command: &MailCommand, workspace: &Workspace, output: OutputMode) -> Result<()> {
    let MailCommand::Inbound(args) = command;
    let mut store = workspace.open_store(output)?;
    let id = TicketId(args.ticket);
    let before = store
        .ticket(id)
        .map_err(|e| helpdesk_failure(output, &e))?
        .ok_or_else(|| not_found(output, TicketId::MODEL, args.ticket))?;

    let message = InboundMessage {
        message_id: args.message_id.clone(),
        subject: args.subject.clone(),
        from: args.from.clone(),
    };
    let mut handler = StageAutoUpdate::new(Accept);
    handler
        .process(&mut store, &message, &[Route::new(TicketId::MODEL, id.get())])
        .map_err(|e| helpdesk_failure(output, &e))?;

    let after = store
        .ticket(id)
        .map_err(|e| helpdesk_failure(output, &e))?
        .ok_or_else(|| not_found(output, TicketId::MODEL, args.ticket))?;

    let result = InboundOutput {
        ticket: id,
        from_stage: before.stage_id,
        to_stage: after.stage_id,
        changed: before.stage_id != after.stage_id,
    };
    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(
                w,
                "{}\t{}\t{}",
                r.ticket,
                stage_label(r.from_stage),
                stage_label(r.to_stage)
            )
        },
        |r, w| {
            pretty_section(w, &format!("Inbound mail for ticket {}", r.ticket))?;
            if r.changed {
                pretty_kv(
                    w,
                    "stage",
                    format!("{} -> {}", stage_label(r.from_stage), stage_label(r.to_stage)),
                )
            } else {
                pretty_kv(w, "stage", format!("{} (unchanged)", stage_label(r.to_stage)))
            }
        },
    )
}
