//! Stage auto-transition on inbound mail.
//!
//! When a reply is routed to a ticket whose team enables
//! `autoupdate_ticket_stage`, and the ticket sits in one of the team's
//! source stages, the ticket moves to the destination stage. The message
//! is then handed to the next handler unchanged.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::TicketId;
use crate::store::TicketRepository;

/// Where the mail gateway decided a message belongs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub model: String,
    pub record_id: i64,
}

impl Route {
    pub fn new(model: impl Into<String>, record_id: i64) -> Self {
        Self {
            model: model.into(),
            record_id,
        }
    }
}

/// The parts of an inbound message the handlers look at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: String,
    pub subject: String,
    pub from: String,
}

/// A link in the inbound mail processing chain.
pub trait RouteHandler<R> {
    /// # Errors
    ///
    /// Returns whatever error the handler hits.
    fn process(&mut self, repo: &mut R, message: &InboundMessage, routes: &[Route]) -> Result<()>;
}

/// End of the chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct Accept;

impl<R> RouteHandler<R> for Accept {
    fn process(&mut self, _repo: &mut R, _message: &InboundMessage, _routes: &[Route]) -> Result<()> {
        Ok(())
    }
}

/// Moves the routed ticket's stage, then delegates to `next`.
#[derive(Debug, Default, Clone)]
pub struct StageAutoUpdate<N> {
    next: N,
}

impl<N> StageAutoUpdate<N> {
    pub const fn new(next: N) -> Self {
        Self { next }
    }

    pub fn into_inner(self) -> N {
        self.next
    }
}

fn transition<R: TicketRepository>(repo: &mut R, routes: &[Route]) -> Result<()> {
    let Some(route) = routes.first() else {
        return Ok(());
    };
    if route.model != TicketId::MODEL {
        return Ok(());
    }

    let id = TicketId(route.record_id);
    let Some(ticket) = repo.ticket(id)? else {
        tracing::warn!(ticket = %id, "routed ticket not found, stage left unchanged");
        return Ok(());
    };
    let Some(team_id) = ticket.team_id else {
        return Ok(());
    };
    let Some(team) = repo.team(team_id)? else {
        return Ok(());
    };
    if !team.autoupdate_ticket_stage {
        return Ok(());
    }
    let Some(current) = ticket.stage_id else {
        return Ok(());
    };
    if !team.autoupdate_src_stage_ids.contains(&current) {
        return Ok(());
    }
    let Some(dest) = team.autoupdate_dest_stage_id else {
        tracing::debug!(team = %team.id, "no destination stage configured");
        return Ok(());
    };

    repo.set_ticket_stage(id, dest)?;
    tracing::info!(ticket = %id, from = %current, to = %dest, "stage updated from inbound mail");
    Ok(())
}

impl<R: TicketRepository, N: RouteHandler<R>> RouteHandler<R> for StageAutoUpdate<N> {
    fn process(&mut self, repo: &mut R, message: &InboundMessage, routes: &[Route]) -> Result<()> {
        transition(repo, routes)?;
        self.next.process(repo, message, routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StageId, Team, TeamId, TicketDraft};
    use crate::store::{MemoryStore, RecordWriter};
    use chrono::{TimeZone, Utc};

    /// Records how many messages reached it.
    #[derive(Default)]
    struct Count(usize);

    impl RouteHandler<MemoryStore> for Count {
        fn process(&mut self, _: &mut MemoryStore, _: &InboundMessage, _: &[Route]) -> Result<()> {
            self.0 += 1;
            Ok(())
        }
    }

    fn setup(enabled: bool, stage: i64) -> (MemoryStore, TicketId) {
        let mut team = Team::new(TeamId(1), "Support");
        team.autoupdate_ticket_stage = enabled;
        team.autoupdate_src_stage_ids = vec![StageId(3)];
        team.autoupdate_dest_stage_id = Some(StageId(1));

        let mut store = MemoryStore::default();
        store.upsert_team(&team).expect("team");
        let mut draft = TicketDraft::new("Waiting on customer");
        draft.team_id = Some(team.id);
        draft.stage_id = Some(StageId(stage));
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("time");
        let ticket = store.insert_ticket(&draft, at).expect("insert");
        (store, ticket.id)
    }

    fn stage_of(store: &MemoryStore, id: TicketId) -> Option<StageId> {
        store.ticket(id).expect("lookup").expect("ticket").stage_id
    }

    #[test]
    fn reply_moves_ticket_from_source_stage() {
        let (mut store, id) = setup(true, 3);
        let mut hook = StageAutoUpdate::new(Count::default());
        hook.process(&mut store, &InboundMessage::default(), &[Route::new("helpdesk.ticket", id.get())])
            .expect("process");
        assert_eq!(stage_of(&store, id), Some(StageId(1)));
        assert_eq!(hook.into_inner().0, 1);
    }

    #[test]
    fn other_stages_and_disabled_teams_are_untouched() {
        let (mut store, id) = setup(true, 2);
        let mut hook = StageAutoUpdate::new(Count::default());
        let routes = [Route::new("helpdesk.ticket", id.get())];
        hook.process(&mut store, &InboundMessage::default(), &routes).expect("process");
        assert_eq!(stage_of(&store, id), Some(StageId(2)));

        let (mut store, id) = setup(false, 3);
        hook.process(&mut store, &InboundMessage::default(), &[Route::new("helpdesk.ticket", id.get())])
            .expect("process");
        assert_eq!(stage_of(&store, id), Some(StageId(3)));
        assert_eq!(hook.into_inner().0, 2);
    }

    #[test]
    fn only_first_route_counts() {
        let (mut store, id) = setup(true, 3);
        let routes = [Route::new("res.partner", 1), Route::new("helpdesk.ticket", id.get())];
        let mut hook = StageAutoUpdate::new(Count::default());
        hook.process(&mut store, &InboundMessage::default(), &routes).expect("process");
        assert_eq!(stage_of(&store, id), Some(StageId(3)));
        assert_eq!(hook.into_inner().0, 1);
    }

    #[test]
    fn unknown_ticket_still_delegates() {
        let (mut store, _) = setup(true, 3);
        let mut hook = StageAutoUpdate::new(Count::default());
        hook.process(&mut store, &InboundMessage::default(), &[Route::new("helpdesk.ticket", 999)])
            .expect("process");
        assert_eq!(hook.into_inner().0, 1);
    }
}
