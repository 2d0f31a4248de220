//! Record access the rules depend on.
//!
//! Three read traits cover what the selector, composer and mail hook need,
//! and [`RecordWriter`] covers seeding and configuration writes. Both
//! [`MemoryStore`] and the SQLite store implement all of them.

mod fixture;
mod memory;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub use fixture::Fixture;
pub use memory::MemoryStore;

use crate::compose::PredicateEvaluator;
use crate::domain::{Domain, RecordView};
use crate::error::Result;
use crate::model::{
    Company, CompanyId, Project, Stage, StageId, Task, Team, TeamId, Ticket, TicketDraft,
    TicketId, TicketTag, User, UserId,
};

/// Ticket history read by the assignment strategies.
pub trait TicketHistory {
    /// The team's most recently created ticket; on equal timestamps the
    /// higher id wins.
    ///
    /// # Errors
    ///
    /// Returns a store error if the lookup fails.
    fn latest_team_ticket(&self, team: TeamId) -> Result<Option<Ticket>>;

    /// Open tickets (stage not closed) per user, across all teams. Users
    /// without open tickets may be absent from the map.
    ///
    /// # Errors
    ///
    /// Returns a store error if the count fails.
    fn open_ticket_counts(&self, users: &[UserId]) -> Result<BTreeMap<UserId, usize>>;
}

/// Lookups and ticket writes.
pub trait TicketRepository: TicketHistory {
    /// # Errors
    ///
    /// Returns a store error if the lookup fails.
    fn team(&self, id: TeamId) -> Result<Option<Team>>;

    /// # Errors
    ///
    /// Returns a store error if the lookup fails.
    fn company(&self, id: CompanyId) -> Result<Option<Company>>;

    /// # Errors
    ///
    /// Returns a store error if the lookup fails.
    fn user(&self, id: UserId) -> Result<Option<User>>;

    /// # Errors
    ///
    /// Returns a store error if the lookup fails.
    fn stage(&self, id: StageId) -> Result<Option<Stage>>;

    /// # Errors
    ///
    /// Returns a store error if the lookup fails.
    fn ticket(&self, id: TicketId) -> Result<Option<Ticket>>;

    /// Persist a new ticket and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns a store error if the insert fails.
    fn insert_ticket(&mut self, draft: &TicketDraft, created_at: DateTime<Utc>) -> Result<Ticket>;

    /// # Errors
    ///
    /// Returns [`crate::HelpdeskError::NotFound`] for an unknown ticket.
    fn set_ticket_stage(&mut self, id: TicketId, stage: StageId) -> Result<()>;
}

/// Searches over the project/task catalog.
///
/// Inactive records are skipped unless the domain itself filters on
/// `active`.
pub trait RecordCatalog {
    /// # Errors
    ///
    /// Returns a domain error for filters naming unknown fields.
    fn search_projects(&self, domain: &Domain) -> Result<Vec<Project>>;

    /// # Errors
    ///
    /// Returns a domain error for filters naming unknown fields.
    fn search_tasks(&self, domain: &Domain) -> Result<Vec<Task>>;

    /// Active tags in display order.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    fn ticket_tags(&self) -> Result<Vec<TicketTag>>;
}

/// Inserts or replaces records by id.
pub trait RecordWriter {
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    fn upsert_user(&mut self, user: &User) -> Result<()>;
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    fn upsert_company(&mut self, company: &Company) -> Result<()>;
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    fn upsert_stage(&mut self, stage: &Stage) -> Result<()>;
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    fn upsert_team(&mut self, team: &Team) -> Result<()>;
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    fn upsert_project(&mut self, project: &Project) -> Result<()>;
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    fn upsert_task(&mut self, task: &Task) -> Result<()>;
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    fn upsert_tag(&mut self, tag: &TicketTag) -> Result<()>;
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    fn upsert_ticket(&mut self, ticket: &Ticket) -> Result<()>;
}

/// Run the team write-time checks, then persist.
///
/// # Errors
///
/// Returns the validation error that rejected the write, or a store error.
pub fn save_team(
    store: &mut dyn RecordWriter,
    team: &Team,
    evaluator: &dyn PredicateEvaluator,
) -> Result<()> {
    team.validate(evaluator)?;
    store.upsert_team(team)?;
    tracing::debug!(team = %team.id, method = %team.assign_method, "team saved");
    Ok(())
}

/// Keep the rows whose record view matches `domain`, applying the implicit
/// active test.
pub(crate) fn filter_rows<T>(
    rows: impl IntoIterator<Item = T>,
    domain: &Domain,
    is_active: impl Fn(&T) -> bool,
    to_record: impl Fn(&T) -> RecordView,
) -> Result<Vec<T>> {
    let active_test = !domain.mentions_field("active");
    let mut out = Vec::new();
    for row in rows {
        if active_test && !is_active(&row) {
            continue;
        }
        if domain.matches(&to_record(&row))? {
            out.push(row);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{Bindings, PredicateError};
    use crate::domain::Operator;
    use crate::model::{AssignMethod, ProjectId};
    use crate::HelpdeskError;

    struct AcceptAll;

    impl PredicateEvaluator for AcceptAll {
        fn evaluate_text(&self, _: &str, _: UserId) -> std::result::Result<Domain, PredicateError> {
            Ok(Domain::new())
        }

        fn evaluate_script(
            &self,
            _: &str,
            _: &Bindings<'_>,
        ) -> std::result::Result<Domain, PredicateError> {
            Ok(Domain::new())
        }

        fn check_script(&self, _: &str) -> std::result::Result<(), String> {
            Ok(())
        }
    }

    #[test]
    fn invalid_team_is_not_written() {
        let mut store = MemoryStore::default();
        let mut team = Team::new(TeamId(4), "Field");
        team.assign_method = AssignMethod::Balanced;

        let err = save_team(&mut store, &team, &AcceptAll).expect_err("rejected");
        assert!(matches!(err, HelpdeskError::AssignMethodWithoutMembers { .. }));
        assert!(store.team(TeamId(4)).expect("lookup").is_none());

        team.members = vec![UserId(1)];
        save_team(&mut store, &team, &AcceptAll).expect("saved");
        assert!(store.team(TeamId(4)).expect("lookup").is_some());
    }

    #[test]
    fn active_test_is_implicit() {
        let rows = vec![
            Project {
                id: ProjectId(1),
                ..Project::default()
            },
            Project {
                id: ProjectId(2),
                active: false,
                ..Project::default()
            },
        ];
        let all = filter_rows(rows.clone(), &Domain::true_domain(), |p| p.active, Project::to_record)
            .expect("filter");
        assert_eq!(all.len(), 1);

        let archived = filter_rows(
            rows,
            &Domain::leaf("active", Operator::Eq, false),
            |p| p.active,
            Project::to_record,
        )
        .expect("filter");
        assert_eq!(archived.iter().map(|p| p.id).collect::<Vec<_>>(), vec![ProjectId(2)]);
    }
}
