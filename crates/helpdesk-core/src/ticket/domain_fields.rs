//! Project/task filters as the ticket form sees them.

use crate::compose::{ComposeSources, DomainComposer, DomainKind, Session};
use crate::domain::Domain;
use crate::error::Result;
use crate::model::{CompanyId, Project, Task, TeamId, TicketDraft, TicketId};
use crate::store::{RecordCatalog, TicketRepository};

/// Fields the available-projects computation depends on.
pub const PROJECT_COMPUTE_TRIGGERS: [&str; 5] =
    ["team_id", "partner_id", "category_id", "priority", "company_id"];

/// Fields the available-tasks computation depends on.
pub const TASK_COMPUTE_TRIGGERS: [&str; 6] = [
    "team_id",
    "partner_id",
    "category_id",
    "priority",
    "company_id",
    "project_id",
];

/// Edits that refresh the project selector's filter.
pub const PROJECT_ONCHANGE_TRIGGERS: [&str; 4] = ["team_id", "partner_id", "category_id", "priority"];

/// Edits that refresh the task selector's filter.
pub const TASK_ONCHANGE_TRIGGERS: [&str; 5] =
    ["team_id", "partner_id", "category_id", "priority", "project_id"];

/// New filter for one selector of the ticket form.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainUpdate {
    /// `project_id` or `task_id`.
    pub field: &'static str,
    pub domain: Domain,
}

/// Request context used when no ticket is loaded yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewContext {
    pub active_id: Option<TicketId>,
    pub default_team_id: Option<TeamId>,
    pub default_company_id: Option<CompanyId>,
}

/// Whether editing `field` invalidates the computed list for `kind`.
#[must_use]
pub fn recompute_needed(kind: DomainKind, field: &str) -> bool {
    match kind {
        DomainKind::Project => PROJECT_COMPUTE_TRIGGERS.contains(&field),
        DomainKind::Task => TASK_COMPUTE_TRIGGERS.contains(&field),
    }
}

/// Composed filters for ticket drafts, resolved against a store.
pub struct TicketDomains<'a, R> {
    composer: &'a DomainComposer<'a>,
    repo: &'a R,
    session: &'a Session,
}

impl<'a, R: TicketRepository + RecordCatalog> TicketDomains<'a, R> {
    pub const fn new(composer: &'a DomainComposer<'a>, repo: &'a R, session: &'a Session) -> Self {
        Self {
            composer,
            repo,
            session,
        }
    }

    /// The filter for one of the draft's selectors. Team and company come
    /// from the draft itself.
    ///
    /// # Errors
    ///
    /// Returns a store error if the team or company lookup fails.
    pub fn for_ticket(&self, kind: DomainKind, draft: &TicketDraft) -> Result<Domain> {
        let team = match draft.team_id {
            Some(id) => self.repo.team(id)?,
            None => None,
        };
        let company = match draft.company_id {
            Some(id) => self.repo.company(id)?,
            None => None,
        };
        Ok(self.composer.compose(
            kind,
            ComposeSources {
                team: team.as_ref(),
                company: company.as_ref(),
                ticket: Some(draft),
            },
            self.session,
        ))
    }

    /// Projects the draft may select. An empty filter selects nothing.
    ///
    /// # Errors
    ///
    /// Returns store or domain errors from the search.
    pub fn available_projects(&self, draft: &TicketDraft) -> Result<Vec<Project>> {
        let domain = self.for_ticket(DomainKind::Project, draft)?;
        if domain.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.search_projects(&domain)
    }

    /// Tasks the draft may select. An empty filter selects nothing.
    ///
    /// # Errors
    ///
    /// Returns store or domain errors from the search.
    pub fn available_tasks(&self, draft: &TicketDraft) -> Result<Vec<Task>> {
        let domain = self.for_ticket(DomainKind::Task, draft)?;
        if domain.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.search_tasks(&domain)
    }

    /// Selector filters to refresh after `field` was edited.
    ///
    /// # Errors
    ///
    /// Returns a store error if the team or company lookup fails.
    pub fn on_field_changed(&self, field: &str, draft: &TicketDraft) -> Result<Vec<DomainUpdate>> {
        let mut updates = Vec::new();
        if PROJECT_ONCHANGE_TRIGGERS.contains(&field) {
            updates.push(DomainUpdate {
                field: DomainKind::Project.ticket_field(),
                domain: self.for_ticket(DomainKind::Project, draft)?,
            });
        }
        if TASK_ONCHANGE_TRIGGERS.contains(&field) {
            updates.push(DomainUpdate {
                field: DomainKind::Task.ticket_field(),
                domain: self.for_ticket(DomainKind::Task, draft)?,
            });
        }
        Ok(updates)
    }

    /// The filter for a form that may not have a ticket yet.
    ///
    /// Uses the active ticket when it exists. Otherwise the team and
    /// company come from the context defaults, the company falling back to
    /// the session company, and no ticket is bound.
    ///
    /// # Errors
    ///
    /// Returns a store error if a lookup fails.
    pub fn for_view(&self, kind: DomainKind, ctx: &ViewContext) -> Result<Domain> {
        if let Some(id) = ctx.active_id
            && let Some(ticket) = self.repo.ticket(id)?
        {
            return self.for_ticket(kind, &ticket.to_draft());
        }

        let team = match ctx.default_team_id {
            Some(id) => self.repo.team(id)?,
            None => None,
        };
        let company = match ctx.default_company_id {
            Some(id) => self.repo.company(id)?,
            None => None,
        }
        .or_else(|| self.session.company.clone());

        Ok(self.composer.compose(
            kind,
            ComposeSources {
                team: team.as_ref(),
                company: company.as_ref(),
                ticket: None,
            },
            self.session,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{Bindings, PredicateError, PredicateEvaluator};
    use crate::domain::Operator;
    use crate::model::{Company, ProjectId, Team, UserId};
    use crate::store::{MemoryStore, RecordWriter};
    use chrono::{TimeZone, Utc};

    /// Understands `active=<bool>` and `id=<n>` shorthands.
    struct Shorthand;

    fn shorthand(text: &str) -> std::result::Result<Domain, PredicateError> {
        match text.trim().split_once('=') {
            Some(("active", flag)) => Ok(Domain::leaf("active", Operator::Eq, flag == "true")),
            Some(("id", n)) => n
                .parse::<i64>()
                .map(|n| Domain::leaf("id", Operator::Eq, n))
                .map_err(|e| PredicateError::Script(e.to_string())),
            _ => Ok(Domain::new()),
        }
    }

    impl PredicateEvaluator for Shorthand {
        fn evaluate_text(&self, text: &str, _: UserId) -> std::result::Result<Domain, PredicateError> {
            shorthand(text)
        }

        fn evaluate_script(
            &self,
            script: &str,
            _: &Bindings<'_>,
        ) -> std::result::Result<Domain, PredicateError> {
            shorthand(script)
        }

        fn check_script(&self, _: &str) -> std::result::Result<(), String> {
            Ok(())
        }
    }

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::default();
        let mut team = Team::new(TeamId(1), "Support");
        team.project_domain = Some("id=2".into());
        store.upsert_team(&team).expect("team");

        let mut company = Company::new(CompanyId(1), "Acme");
        company.helpdesk_mgmt_project_domain = Some("active=true".into());
        store.upsert_company(&company).expect("company");

        for id in 1..=3 {
            store
                .upsert_project(&Project {
                    id: ProjectId(id),
                    name: format!("P{id}"),
                    ..Project::default()
                })
                .expect("project");
        }
        store
    }

    fn draft() -> TicketDraft {
        let mut draft = TicketDraft::new("t");
        draft.team_id = Some(TeamId(1));
        draft.company_id = Some(CompanyId(1));
        draft
    }

    #[test]
    fn available_projects_follow_composed_filter() {
        let store = seeded();
        let composer = DomainComposer::new(&Shorthand);
        let session = Session::new(UserId(1));
        let domains = TicketDomains::new(&composer, &store, &session);

        let found = domains.available_projects(&draft()).expect("search");
        assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![ProjectId(2)]);
    }

    #[test]
    fn empty_filter_selects_nothing() {
        let store = seeded();
        let composer = DomainComposer::new(&Shorthand);
        let session = Session::new(UserId(1));
        let domains = TicketDomains::new(&composer, &store, &session);

        assert!(domains.available_projects(&TicketDraft::new("bare")).expect("search").is_empty());
    }

    #[test]
    fn onchange_updates_affected_selectors() {
        let store = seeded();
        let composer = DomainComposer::new(&Shorthand);
        let session = Session::new(UserId(1));
        let domains = TicketDomains::new(&composer, &store, &session);

        let updates = domains.on_field_changed("partner_id", &draft()).expect("onchange");
        assert_eq!(
            updates.iter().map(|u| u.field).collect::<Vec<_>>(),
            vec!["project_id", "task_id"]
        );

        let updates = domains.on_field_changed("project_id", &draft()).expect("onchange");
        assert_eq!(updates.iter().map(|u| u.field).collect::<Vec<_>>(), vec!["task_id"]);

        assert!(domains.on_field_changed("name", &draft()).expect("onchange").is_empty());
        assert!(recompute_needed(DomainKind::Project, "company_id"));
        assert!(!recompute_needed(DomainKind::Project, "project_id"));
    }

    #[test]
    fn view_prefers_active_ticket_then_context() {
        let mut store = seeded();
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).single().expect("time");
        let ticket = store.insert_ticket(&draft(), at).expect("insert");

        let composer = DomainComposer::new(&Shorthand);
        let session = Session::new(UserId(1));
        let domains = TicketDomains::new(&composer, &store, &session);

        let from_ticket = domains
            .for_view(
                DomainKind::Project,
                &ViewContext {
                    active_id: Some(ticket.id),
                    ..ViewContext::default()
                },
            )
            .expect("view");
        assert_eq!(from_ticket, domains.for_ticket(DomainKind::Project, &draft()).expect("ticket"));

        let from_context = domains
            .for_view(
                DomainKind::Project,
                &ViewContext {
                    active_id: Some(TicketId(404)),
                    default_team_id: Some(TeamId(1)),
                    default_company_id: None,
                },
            )
            .expect("view");
        assert_eq!(from_context, Domain::leaf("id", Operator::Eq, 2));
    }

    #[test]
    fn view_falls_back_to_session_company() {
        let store = seeded();
        let composer = DomainComposer::new(&Shorthand);
        let mut company = Company::new(CompanyId(5), "Session Co");
        company.helpdesk_mgmt_project_domain = Some("active=false".into());
        let session = Session::new(UserId(1)).with_company(company);
        let domains = TicketDomains::new(&composer, &store, &session);

        let domain = domains
            .for_view(DomainKind::Project, &ViewContext::default())
            .expect("view");
        assert_eq!(domain, Domain::leaf("active", Operator::Eq, false));
    }
}
