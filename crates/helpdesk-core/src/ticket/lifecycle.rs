//! Points in a ticket's life where the assignment selector runs.

use chrono::{DateTime, Utc};

use crate::assign::select_assignee;
use crate::error::{HelpdeskError, Result};
use crate::model::{Team, TeamId, Ticket, TicketDraft};
use crate::store::TicketRepository;

fn load_team<R: TicketRepository>(repo: &R, id: TeamId) -> Result<Team> {
    repo.team(id)?.ok_or(HelpdeskError::NotFound {
        model: TeamId::MODEL,
        id: id.get(),
    })
}

/// Fill the assignee of a new ticket's default values.
///
/// Applies when `requested` is empty or names `user_id`, the defaults have
/// no assignee yet and carry a team.
///
/// # Errors
///
/// Returns [`HelpdeskError::NotFound`] for an unknown team, or a store error.
pub fn default_assignee<R: TicketRepository>(
    requested: &[&str],
    defaults: &mut TicketDraft,
    repo: &R,
) -> Result<()> {
    let wants_user = requested.is_empty() || requested.contains(&"user_id");
    if !wants_user || defaults.user_id.is_some() {
        return Ok(());
    }
    let Some(team_id) = defaults.team_id else {
        return Ok(());
    };
    let team = load_team(repo, team_id)?;
    defaults.user_id = select_assignee(&team, repo)?;
    Ok(())
}

/// Editor reaction to a team change: pick an assignee if there is none.
///
/// # Errors
///
/// Returns [`HelpdeskError::NotFound`] for an unknown team, or a store error.
pub fn on_team_changed<R: TicketRepository>(draft: &mut TicketDraft, repo: &R) -> Result<()> {
    let Some(team_id) = draft.team_id else {
        return Ok(());
    };
    if draft.user_id.is_some() {
        return Ok(());
    }
    let team = load_team(repo, team_id)?;
    draft.user_id = select_assignee(&team, repo)?;
    Ok(())
}

/// Resolve the final assignee of create values.
///
/// With a team present, a missing assignee or one who is not a team
/// member is replaced by the selector's pick. For manual teams that pick
/// is nobody, so a foreign assignee is cleared.
///
/// # Errors
///
/// Returns [`HelpdeskError::NotFound`] for an unknown team, or a store error.
pub fn prepare_create<R: TicketRepository>(vals: &mut TicketDraft, repo: &R) -> Result<()> {
    let Some(team_id) = vals.team_id else {
        return Ok(());
    };
    let team = load_team(repo, team_id)?;
    match vals.user_id {
        Some(user) if team.has_member(user) => Ok(()),
        given => {
            let picked = select_assignee(&team, repo)?;
            if let Some(foreign) = given {
                tracing::info!(
                    team = %team.id,
                    user = %foreign,
                    replacement = ?picked,
                    "assignee is not a team member"
                );
            }
            vals.user_id = picked;
            Ok(())
        }
    }
}

/// [`prepare_create`] followed by the insert.
///
/// # Errors
///
/// See [`prepare_create`]; store errors from the insert are returned too.
pub fn create_ticket<R: TicketRepository>(
    repo: &mut R,
    mut vals: TicketDraft,
    created_at: DateTime<Utc>,
) -> Result<Ticket> {
    prepare_create(&mut vals, repo)?;
    let ticket = repo.insert_ticket(&vals, created_at)?;
    tracing::debug!(ticket = %ticket.id, user = ?ticket.user_id, "ticket created");
    Ok(ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssignMethod, UserId};
    use crate::store::{MemoryStore, RecordWriter};
    use chrono::TimeZone;

    fn store(method: AssignMethod) -> MemoryStore {
        let mut team = Team::new(TeamId(1), "Support");
        team.members = vec![UserId(1), UserId(2), UserId(3)];
        team.assign_method = method;
        let mut store = MemoryStore::default();
        store.upsert_team(&team).expect("team");
        store
    }

    fn now(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 10, minute, 0).single().expect("time")
    }

    fn with_team(user: Option<i64>) -> TicketDraft {
        let mut draft = TicketDraft::new("Broken VPN");
        draft.team_id = Some(TeamId(1));
        draft.user_id = user.map(UserId);
        draft
    }

    #[test]
    fn defaults_fill_assignee_only_when_requested() {
        let repo = store(AssignMethod::Sequential);

        let mut defaults = with_team(None);
        default_assignee(&["name"], &mut defaults, &repo).expect("defaults");
        assert_eq!(defaults.user_id, None);

        default_assignee(&[], &mut defaults, &repo).expect("defaults");
        assert_eq!(defaults.user_id, Some(UserId(1)));

        let mut preset = with_team(Some(3));
        default_assignee(&["user_id"], &mut preset, &repo).expect("defaults");
        assert_eq!(preset.user_id, Some(UserId(3)));
    }

    #[test]
    fn team_change_keeps_existing_assignee() {
        let repo = store(AssignMethod::Balanced);
        let mut draft = with_team(Some(2));
        on_team_changed(&mut draft, &repo).expect("onchange");
        assert_eq!(draft.user_id, Some(UserId(2)));

        let mut draft = with_team(None);
        on_team_changed(&mut draft, &repo).expect("onchange");
        assert_eq!(draft.user_id, Some(UserId(1)));
    }

    #[test]
    fn foreign_assignee_is_replaced() {
        let mut repo = store(AssignMethod::Sequential);
        let ticket = create_ticket(&mut repo, with_team(Some(99)), now(0)).expect("create");
        assert_eq!(ticket.user_id, Some(UserId(1)));

        let ticket = create_ticket(&mut repo, with_team(Some(99)), now(1)).expect("create");
        assert_eq!(ticket.user_id, Some(UserId(2)));
    }

    #[test]
    fn foreign_assignee_is_cleared_on_manual_team() {
        let mut repo = store(AssignMethod::Manual);
        let ticket = create_ticket(&mut repo, with_team(Some(99)), now(0)).expect("create");
        assert_eq!(ticket.user_id, None);
    }

    #[test]
    fn member_assignee_is_kept() {
        let mut repo = store(AssignMethod::Sequential);
        let ticket = create_ticket(&mut repo, with_team(Some(3)), now(0)).expect("create");
        assert_eq!(ticket.user_id, Some(UserId(3)));
    }

    #[test]
    fn unknown_team_is_reported() {
        let mut repo = MemoryStore::default();
        let err = create_ticket(&mut repo, with_team(None), now(0)).expect_err("no team");
        assert!(matches!(err, HelpdeskError::NotFound { model: "helpdesk.ticket.team", .. }));
    }
}
