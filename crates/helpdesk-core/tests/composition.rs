//! Layered filters resolved against a seeded SQLite store.
//!
//! Stored filter text here is the JSON domain form, read by a small
//! evaluator defined below, so the tests exercise the composer and store
//! without a script engine.

use helpdesk_core::compose::{
    Bindings, DomainComposer, DomainKind, PredicateError, PredicateEvaluator, Session,
};
use helpdesk_core::db::SqliteStore;
use helpdesk_core::domain::{Domain, Operator};
use helpdesk_core::model::{CompanyId, ProjectId, TaskId, TeamId, TicketDraft, TicketId, UserId};
use helpdesk_core::store::{Fixture, TicketRepository};
use helpdesk_core::ticket::{TicketDomains, ViewContext};

struct JsonDomains;

fn parse(text: &str) -> Result<Domain, PredicateError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| PredicateError::Script(e.to_string()))?;
    if !value.is_array() {
        return Err(PredicateError::NotADomain(value.to_string()));
    }
    serde_json::from_value(value).map_err(|e| PredicateError::Script(e.to_string()))
}

impl PredicateEvaluator for JsonDomains {
    fn evaluate_text(&self, text: &str, _uid: UserId) -> Result<Domain, PredicateError> {
        parse(text)
    }

    fn evaluate_script(&self, script: &str, _: &Bindings<'_>) -> Result<Domain, PredicateError> {
        if script.trim_start().starts_with('#') {
            return Ok(Domain::new());
        }
        parse(script)
    }

    fn check_script(&self, _script: &str) -> Result<(), String> {
        Ok(())
    }
}

const FIXTURE: &str = r#"
[[companies]]
id = 1
name = "Acme"
helpdesk_mgmt_project_domain = '[["company_id", "=", 1]]'
helpdesk_mgmt_task_domain = '[["company_id", "=", 1]]'

[[users]]
id = 2
name = "Ana"
login = "ana"
company_id = 1

[[teams]]
id = 1
name = "Support"
company_id = 1
members = [2]
task_domain = '[["name", "ilike", "setup"]]'
task_domain_python = '[["project_id", "=", 10]]'

[[teams]]
id = 2
name = "Broken"
project_domain = '42'

[[projects]]
id = 10
name = "Onboarding"
company_id = 1

[[projects]]
id = 11
name = "Legacy"
company_id = 1
active = false

[[projects]]
id = 12
name = "Elsewhere"
company_id = 2

[[tasks]]
id = 100
name = "Account setup"
project_id = 10
company_id = 1

[[tasks]]
id = 101
name = "Printer setup"
project_id = 12
company_id = 1

[[tasks]]
id = 102
name = "Billing"
project_id = 10
company_id = 1

[[tickets]]
id = 7
name = "New starter"
team_id = 1
company_id = 1
project_id = 10
created_at = "2025-03-01T10:00:00Z"
"#;

fn seeded() -> SqliteStore {
    let mut store = SqliteStore::open_in_memory().expect("open");
    Fixture::from_toml_str(FIXTURE)
        .expect("fixture")
        .apply(&mut store, &JsonDomains)
        .expect("apply");
    store
}

#[test]
fn projects_filtered_by_company_layer() {
    let store = seeded();
    let composer = DomainComposer::new(&JsonDomains);
    let session = Session::new(UserId(2));
    let domains = TicketDomains::new(&composer, &store, &session);

    let ticket = store.ticket(TicketId(7)).expect("load").expect("ticket");
    let projects = domains.available_projects(&ticket.to_draft()).expect("search");
    let ids: Vec<_> = projects.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![ProjectId(10)]);
}

#[test]
fn task_project_leaf_is_not_duplicated() {
    let store = seeded();
    let composer = DomainComposer::new(&JsonDomains);
    let session = Session::new(UserId(2));
    let domains = TicketDomains::new(&composer, &store, &session);

    let draft = store.ticket(TicketId(7)).expect("load").expect("ticket").to_draft();
    let domain = domains.for_ticket(DomainKind::Task, &draft).expect("compose");
    assert_eq!(
        domain.to_string(),
        "['&', '&', ('company_id', '=', 1), ('name', 'ilike', 'setup'), ('project_id', '=', 10)]"
    );
    let tasks = domains.available_tasks(&draft).expect("search");
    assert_eq!(tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![TaskId(100)]);
}

#[test]
fn task_filter_adds_ticket_project_without_script() {
    let store = seeded();
    let composer = DomainComposer::new(&JsonDomains).with_scripts(false);
    let session = Session::new(UserId(2));
    let domains = TicketDomains::new(&composer, &store, &session);

    let mut draft = TicketDraft::new("other project");
    draft.team_id = Some(TeamId(1));
    draft.project_id = Some(ProjectId(12));
    let tasks = domains.available_tasks(&draft).expect("search");
    assert_eq!(tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![TaskId(101)]);
}

#[test]
fn non_list_layer_is_dropped() {
    let store = seeded();
    let composer = DomainComposer::new(&JsonDomains);
    let session = Session::new(UserId(2));
    let domains = TicketDomains::new(&composer, &store, &session);

    let mut draft = TicketDraft::new("broken team");
    draft.team_id = Some(TeamId(2));
    // the default script template still runs and restricts nothing
    let domain = domains.for_ticket(DomainKind::Project, &draft).expect("compose");
    assert_eq!(domain, Domain::true_domain());
    let projects = domains.available_projects(&draft).expect("search");
    assert_eq!(
        projects.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![ProjectId(10), ProjectId(12)]
    );
}

#[test]
fn view_context_falls_back_to_session_company() {
    let store = seeded();
    let composer = DomainComposer::new(&JsonDomains);
    let company = store.company(CompanyId(1)).expect("load").expect("company");
    let session = Session::new(UserId(2)).with_company(company);
    let domains = TicketDomains::new(&composer, &store, &session);

    let ctx = ViewContext {
        default_team_id: Some(TeamId(2)),
        ..ViewContext::default()
    };
    let domain = domains.for_view(DomainKind::Project, &ctx).expect("compose");
    assert_eq!(domain, Domain::leaf("company_id", Operator::Eq, 1));

    let active = ViewContext {
        active_id: Some(TicketId(7)),
        ..ViewContext::default()
    };
    let domain = domains.for_view(DomainKind::Task, &active).expect("compose");
    assert!(domain.contains_condition("project_id", Operator::Eq, &10.into()));
}

#[test]
fn editing_project_refreshes_only_tasks() {
    let store = seeded();
    let composer = DomainComposer::new(&JsonDomains);
    let session = Session::new(UserId(2));
    let domains = TicketDomains::new(&composer, &store, &session);

    let draft = store.ticket(TicketId(7)).expect("load").expect("ticket").to_draft();
    let updates = domains.on_field_changed("project_id", &draft).expect("updates");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].field, "task_id");

    let updates = domains.on_field_changed("partner_id", &draft).expect("updates");
    let fields: Vec<_> = updates.iter().map(|u| u.field).collect();
    assert_eq!(fields, vec!["project_id", "task_id"]);

    assert!(domains.on_field_changed("name", &draft).expect("updates").is_empty());
}
