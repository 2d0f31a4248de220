//! Picks the member a new ticket goes to.
//!
//! Every strategy works on the team's members sorted by id, so the choice is
//! reproducible regardless of the order members were added in.
//!
//! | method | rule |
//! |---|---|
//! | `manual` | nobody |
//! | `randomly` | member after the assignee of the team's latest ticket, wrapping |
//! | `sequential` | same rotation as `randomly`, with info-level logging |
//! | `balanced` | member with the fewest open tickets, lowest id on ties |

use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{AssignMethod, Team, UserId};
use crate::store::TicketHistory;

/// The member a new ticket of `team` should be assigned to.
///
/// Returns `None` for manual teams and teams without members.
///
/// # Errors
///
/// Propagates failures reading ticket history.
pub fn select_assignee(team: &Team, history: &dyn TicketHistory) -> Result<Option<UserId>> {
    let members = team.sorted_members();
    if members.is_empty() || team.assign_method == AssignMethod::Manual {
        return Ok(None);
    }

    match team.assign_method {
        AssignMethod::Manual => Ok(None),
        AssignMethod::Randomly => {
            let previous = previous_assignee(team, history)?;
            let next = rotate_after(&members, previous);
            tracing::debug!(team = %team.id, ?previous, ?next, "round-robin assignment");
            Ok(next)
        }
        AssignMethod::Sequential => {
            tracing::info!(team = %team.id, ?members, "assigning ticket sequentially");
            let previous = previous_assignee(team, history)?;
            let next = rotate_after(&members, previous);
            if let Some(user) = next {
                tracing::info!(team = %team.id, user = %user, "next assigned user");
            }
            Ok(next)
        }
        AssignMethod::Balanced => {
            let counts = history.open_ticket_counts(&members)?;
            let next = least_loaded(&members, &counts);
            tracing::debug!(team = %team.id, ?counts, ?next, "balanced assignment");
            Ok(next)
        }
    }
}

fn previous_assignee(team: &Team, history: &dyn TicketHistory) -> Result<Option<UserId>> {
    Ok(history
        .latest_team_ticket(team.id)?
        .and_then(|ticket| ticket.user_id))
}

/// The member after `previous` in `sorted`, wrapping to the first.
///
/// When `previous` is unset or no longer a member, the first member is
/// returned.
#[must_use]
pub fn rotate_after(sorted: &[UserId], previous: Option<UserId>) -> Option<UserId> {
    let first = sorted.first().copied()?;
    let Some(index) = previous.and_then(|p| sorted.iter().position(|m| *m == p)) else {
        return Some(first);
    };
    Some(sorted[(index + 1) % sorted.len()])
}

/// The member with the fewest open tickets. Missing counts are zero and
/// ties go to the earliest member in `sorted`.
#[must_use]
pub fn least_loaded(sorted: &[UserId], counts: &BTreeMap<UserId, usize>) -> Option<UserId> {
    sorted
        .iter()
        .copied()
        .min_by_key(|user| counts.get(user).copied().unwrap_or(0))
}
