use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::{RecordCatalog, RecordWriter, TicketHistory, TicketRepository, filter_rows};
use crate::domain::Domain;
use crate::error::{HelpdeskError, Result};
use crate::model::{
    Company, CompanyId, Project, ProjectId, Stage, StageId, TagId, Task, TaskId, Team, TeamId,
    Ticket, TicketDraft, TicketId, TicketTag, User, UserId,
};

/// Store backed by ordered maps. Used in tests and for dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    users: BTreeMap<UserId, User>,
    companies: BTreeMap<CompanyId, Company>,
    stages: BTreeMap<StageId, Stage>,
    teams: BTreeMap<TeamId, Team>,
    projects: BTreeMap<ProjectId, Project>,
    tasks: BTreeMap<TaskId, Task>,
    tags: BTreeMap<TagId, TicketTag>,
    tickets: BTreeMap<TicketId, Ticket>,
}

impl MemoryStore {
    #[must_use]
    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values()
    }

    fn is_open(&self, ticket: &Ticket) -> bool {
        ticket
            .stage_id
            .and_then(|id| self.stages.get(&id))
            .is_none_or(|stage| !stage.closed)
    }
}

impl TicketHistory for MemoryStore {
    fn latest_team_ticket(&self, team: TeamId) -> Result<Option<Ticket>> {
        Ok(self
            .tickets
            .values()
            .filter(|t| t.team_id == Some(team))
            .max_by_key(|t| (t.created_at, t.id))
            .cloned())
    }

    fn open_ticket_counts(&self, users: &[UserId]) -> Result<BTreeMap<UserId, usize>> {
        let mut counts = BTreeMap::new();
        for ticket in self.tickets.values() {
            let Some(user) = ticket.user_id else {
                continue;
            };
            if users.contains(&user) && self.is_open(ticket) {
                *counts.entry(user).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

impl TicketRepository for MemoryStore {
    fn team(&self, id: TeamId) -> Result<Option<Team>> {
        Ok(self.teams.get(&id).cloned())
    }

    fn company(&self, id: CompanyId) -> Result<Option<Company>> {
        Ok(self.companies.get(&id).cloned())
    }

    fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.get(&id).cloned())
    }

    fn stage(&self, id: StageId) -> Result<Option<Stage>> {
        Ok(self.stages.get(&id).cloned())
    }

    fn ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        Ok(self.tickets.get(&id).cloned())
    }

    fn insert_ticket(&mut self, draft: &TicketDraft, created_at: DateTime<Utc>) -> Result<Ticket> {
        let next = self.tickets.keys().next_back().map_or(1, |id| id.get() + 1);
        let ticket = Ticket::from_draft(TicketId(next), draft, created_at);
        self.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    fn set_ticket_stage(&mut self, id: TicketId, stage: StageId) -> Result<()> {
        let ticket = self.tickets.get_mut(&id).ok_or(HelpdeskError::NotFound {
            model: TicketId::MODEL,
            id: id.get(),
        })?;
        ticket.stage_id = Some(stage);
        Ok(())
    }
}

impl RecordCatalog for MemoryStore {
    fn search_projects(&self, domain: &Domain) -> Result<Vec<Project>> {
        filter_rows(self.projects.values().cloned(), domain, |p| p.active, Project::to_record)
    }

    fn search_tasks(&self, domain: &Domain) -> Result<Vec<Task>> {
        filter_rows(self.tasks.values().cloned(), domain, |t| t.active, Task::to_record)
    }

    fn ticket_tags(&self) -> Result<Vec<TicketTag>> {
        let mut tags: Vec<TicketTag> = self.tags.values().filter(|t| t.active).cloned().collect();
        tags.sort();
        Ok(tags)
    }
}

impl RecordWriter for MemoryStore {
    fn upsert_user(&mut self, user: &User) -> Result<()> {
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    fn upsert_company(&mut self, company: &Company) -> Result<()> {
        self.companies.insert(company.id, company.clone());
        Ok(())
    }

    fn upsert_stage(&mut self, stage: &Stage) -> Result<()> {
        self.stages.insert(stage.id, stage.clone());
        Ok(())
    }

    fn upsert_team(&mut self, team: &Team) -> Result<()> {
        self.teams.insert(team.id, team.clone());
        Ok(())
    }

    fn upsert_project(&mut self, project: &Project) -> Result<()> {
        self.projects.insert(project.id, project.clone());
        Ok(())
    }

    fn upsert_task(&mut self, task: &Task) -> Result<()> {
        self.tasks.insert(task.id, task.clone());
        Ok(())
    }

    fn upsert_tag(&mut self, tag: &TicketTag) -> Result<()> {
        self.tags.insert(tag.id, tag.clone());
        Ok(())
    }

    fn upsert_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        self.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operator;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 8, minute, 0).single().expect("time")
    }

    #[test]
    fn ticket_ids_are_sequential() {
        let mut store = MemoryStore::default();
        let a = store.insert_ticket(&TicketDraft::new("a"), at(0)).expect("insert");
        let b = store.insert_ticket(&TicketDraft::new("b"), at(1)).expect("insert");
        assert_eq!((a.id, b.id), (TicketId(1), TicketId(2)));
        assert_eq!(store.tickets().count(), 2);
    }

    #[test]
    fn tickets_without_stage_count_as_open() {
        let mut store = MemoryStore::default();
        let mut draft = TicketDraft::new("a");
        draft.user_id = Some(UserId(5));
        store.insert_ticket(&draft, at(0)).expect("insert");
        let counts = store.open_ticket_counts(&[UserId(5), UserId(6)]).expect("counts");
        assert_eq!(counts.get(&UserId(5)), Some(&1));
        assert_eq!(counts.get(&UserId(6)), None);
    }

    #[test]
    fn stage_update_requires_existing_ticket() {
        let mut store = MemoryStore::default();
        let err = store.set_ticket_stage(TicketId(9), StageId(1)).expect_err("missing");
        assert!(matches!(err, HelpdeskError::NotFound { id: 9, .. }));
    }

    #[test]
    fn catalog_search_filters_tasks() {
        let mut store = MemoryStore::default();
        for (id, project) in [(1, 10), (2, 11), (3, 10)] {
            store
                .upsert_task(&Task {
                    id: TaskId(id),
                    project_id: Some(ProjectId(project)),
                    ..Task::default()
                })
                .expect("upsert");
        }
        let found = store
            .search_tasks(&Domain::leaf("project_id", Operator::Eq, 10))
            .expect("search");
        assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![TaskId(1), TaskId(3)]);
    }
}
