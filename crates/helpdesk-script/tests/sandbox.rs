//! Domain scripts run through the composer the way a team stores them.

use helpdesk_core::compose::{
    Bindings, ComposeSources, DomainComposer, DomainKind, IdentityTranslator, PredicateError,
    PredicateEvaluator, Session,
};
use helpdesk_core::domain::{Domain, Operator, and_all};
use helpdesk_core::model::{
    Company, CompanyId, DEFAULT_PROJECT_SCRIPT, DEFAULT_TASK_SCRIPT, PartnerId, Project,
    ProjectId, Team, TeamId, TicketDraft, UserId,
};
use helpdesk_core::store::{MemoryStore, RecordWriter};
use helpdesk_core::ticket::TicketDomains;
use helpdesk_script::ScriptEngine;
use proptest::prelude::*;
use std::collections::BTreeMap;

const PARTNER_SCRIPT: &str = "
if ticket.partner_id:
    domain = [('partner_id', '=', ticket.commercial_partner_id.id)]
else:
    domain = []
";

fn team_with_scripts(project: Option<&str>, task: Option<&str>) -> Team {
    let mut team = Team::new(TeamId(1), "Support");
    team.project_domain_python = project.map(str::to_string);
    team.task_domain_python = task.map(str::to_string);
    team
}

fn ticket_for_partner(partner: i64) -> TicketDraft {
    let mut ticket = TicketDraft::new("Printer jam");
    ticket.partner_id = Some(PartnerId(partner));
    ticket.commercial_partner_id = Some(PartnerId(partner + 100));
    ticket
}

fn compose(kind: DomainKind, team: &Team, ticket: Option<&TicketDraft>) -> Domain {
    let engine = ScriptEngine;
    DomainComposer::new(&engine).compose(
        kind,
        ComposeSources {
            team: Some(team),
            company: None,
            ticket,
        },
        &Session::new(UserId(2)),
    )
}

#[test]
fn partner_script_branches_on_ticket() {
    let team = team_with_scripts(Some(PARTNER_SCRIPT), None);

    let ticket = ticket_for_partner(5);
    assert_eq!(
        compose(DomainKind::Project, &team, Some(&ticket)),
        Domain::leaf("partner_id", Operator::Eq, 105)
    );

    let anonymous = TicketDraft::new("No partner");
    assert_eq!(
        compose(DomainKind::Project, &team, Some(&anonymous)),
        Domain::true_domain()
    );
}

#[test]
fn expression_script_uses_ticket_project() {
    let team = team_with_scripts(
        None,
        Some("[('project_id', '=', ticket.project_id.id), ('stage_id.fold', '=', False)]"),
    );
    let mut ticket = TicketDraft::new("Deploy");
    ticket.project_id = Some(ProjectId(10));

    let domain = compose(DomainKind::Task, &team, Some(&ticket));
    assert_eq!(
        domain.to_string(),
        "['&', ('project_id', '=', 10), ('stage_id.fold', '=', False)]"
    );
}

#[test]
fn project_leaf_from_script_is_not_duplicated() {
    let team = team_with_scripts(None, Some("domain = [('project_id', '=', ticket.project_id.id)]"));
    let mut ticket = TicketDraft::new("Deploy");
    ticket.project_id = Some(ProjectId(10));

    let domain = compose(DomainKind::Task, &team, Some(&ticket));
    assert_eq!(domain, Domain::leaf("project_id", Operator::Eq, 10));
}

#[test]
fn combinators_and_base_domain_are_bound() {
    let team = team_with_scripts(
        Some("domain = OR([base_domain, [('user_id', '=', env.uid)], [('company_id', '=', company.id)]])"),
        None,
    );
    let domain = compose(DomainKind::Project, &team, None);
    assert_eq!(
        domain.to_string(),
        "['|', ('user_id', '=', 2), ('company_id', '=', False)]"
    );
}

#[test]
fn failing_script_drops_only_its_layer() {
    let mut team = team_with_scripts(Some("domain = [('x', '=', ticket.missing_field)]"), None);
    team.project_domain = Some("[('active', '=', True)]".to_string());

    let ticket = ticket_for_partner(1);
    assert_eq!(
        compose(DomainKind::Project, &team, Some(&ticket)),
        Domain::leaf("active", Operator::Eq, true)
    );
}

#[test]
fn non_list_domain_is_reported() {
    let session = Session::new(UserId(2));
    let bindings = Bindings::new(&session, None, &IdentityTranslator);
    assert_eq!(
        ScriptEngine.evaluate_script("domain = {'a': 1}", &bindings),
        Err(PredicateError::NotADomain("dict".into()))
    );

    let team = team_with_scripts(Some("domain = 42"), None);
    assert!(compose(DomainKind::Project, &team, None).is_empty());
}

#[test]
fn default_templates_allow_everything() {
    let team = Team::new(TeamId(1), "Support");
    assert_eq!(team.project_domain_python.as_deref(), Some(DEFAULT_PROJECT_SCRIPT));
    assert_eq!(team.task_domain_python.as_deref(), Some(DEFAULT_TASK_SCRIPT));
    assert!(team.validate_scripts(&ScriptEngine).is_ok());

    let ticket = ticket_for_partner(3);
    let domain = compose(DomainKind::Project, &team, Some(&ticket));
    assert_eq!(domain.to_string(), "[(1, '=', 1)]");
    assert_eq!(compose(DomainKind::Task, &team, Some(&ticket)), Domain::true_domain());

    let mut store = MemoryStore::default();
    store.upsert_team(&team).expect("team");
    store
        .upsert_project(&Project {
            id: ProjectId(10),
            name: "Onboarding".to_string(),
            ..Project::default()
        })
        .expect("project");
    let engine = ScriptEngine;
    let composer = DomainComposer::new(&engine);
    let session = Session::new(UserId(2));
    let domains = TicketDomains::new(&composer, &store, &session);
    let mut draft = TicketDraft::new("Printer jam");
    draft.team_id = Some(TeamId(1));
    let projects = domains.available_projects(&draft).expect("search");
    assert_eq!(projects.iter().map(|p| p.id).collect::<Vec<_>>(), vec![ProjectId(10)]);
}

#[test]
fn nested_repeat_is_a_script_error() {
    let session = Session::new(UserId(2));
    let bindings = Bindings::new(&session, None, &IdentityTranslator);
    let script = "x = 'a' * 100000\ny = [x] * 100000\ndomain = []";
    assert!(ScriptEngine.check_script(script).is_ok());
    let err = ScriptEngine
        .evaluate_script(script, &bindings)
        .expect_err("allocation limit");
    assert!(matches!(err, PredicateError::Script(ref msg) if msg.contains("allocated")), "{err}");

    let team = team_with_scripts(Some(script), None);
    assert!(compose(DomainKind::Project, &team, None).is_empty());
}

#[test]
fn unsafe_scripts_fail_team_validation() {
    for (script, needle) in [
        ("import os\ndomain = []", "'import' statement"),
        ("while True:\n    pass", "'while' statement"),
        ("domain = ticket.__class__", "attribute '__class__'"),
        ("domain = [x for x in y]", "comprehensions"),
        ("domain = eval('[]')", "use of 'eval'"),
    ] {
        let team = team_with_scripts(Some(script), None);
        let err = team.validate(&ScriptEngine).expect_err(script);
        let message = err.to_string();
        assert!(
            message.starts_with("Project Domain Python Code: "),
            "{script}: {message}"
        );
        assert!(message.contains(needle), "{script}: {message}");
    }

    let team = team_with_scripts(None, Some("domain = ["));
    let message = team.validate(&ScriptEngine).expect_err("syntax").to_string();
    assert!(message.starts_with("Task Domain Python Code: invalid syntax"), "{message}");
}

#[test]
fn static_layers_and_script_compose_in_order() {
    let mut company = Company::new(CompanyId(1), "Acme");
    company.helpdesk_mgmt_project_domain = Some("[('company_id', '=', 1)]".to_string());
    let mut team = team_with_scripts(Some("[('user_id', '=', user.id)]"), None);
    team.project_domain = Some("[('active', '=', True)]".to_string());

    let engine = ScriptEngine;
    let domain = DomainComposer::new(&engine).compose(
        DomainKind::Project,
        ComposeSources {
            team: Some(&team),
            company: Some(&company),
            ticket: None,
        },
        &Session::new(UserId(7)),
    );
    let expected = and_all(&[
        Domain::leaf("company_id", Operator::Eq, 1),
        Domain::leaf("active", Operator::Eq, true),
        Domain::leaf("user_id", Operator::Eq, 7),
    ])
    .expect("and");
    assert_eq!(domain, expected);
}

#[test]
fn translator_is_bound_as_underscore() {
    let mut catalog = BTreeMap::new();
    catalog.insert("Printer jam".to_string(), "Papierstau".to_string());
    let session = Session::new(UserId(2));
    let ticket = TicketDraft::new("Printer jam");
    let bindings = Bindings::new(&session, Some(&ticket), &catalog);

    let domain = ScriptEngine
        .evaluate_script("[('name', '=', _(ticket.name))]", &bindings)
        .expect("domain");
    assert_eq!(domain, Domain::leaf("name", Operator::Eq, "Papierstau"));
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn arbitrary_source_never_panics(source in "\\PC{0,80}") {
        let session = Session::new(UserId(1));
        let bindings = Bindings::new(&session, None, &IdentityTranslator);
        let _ = ScriptEngine.check_script(&source);
        let _ = ScriptEngine.evaluate_text(&source, UserId(1));
        let _ = ScriptEngine.evaluate_script(&source, &bindings);
    }

    #[test]
    fn script_like_source_never_panics(
        source in prop::collection::vec(
            prop::sample::select(vec![
                "domain", "=", "[", "]", "(", ")", "'a'", ",", "1", "-", "//", "%",
                "if", "for", "in", "not", ":", "\n", "    ", "ticket", ".", "id", "AND", "_",
            ]),
            0..40,
        )
    ) {
        let source = source.concat();
        let session = Session::new(UserId(1));
        let bindings = Bindings::new(&session, None, &IdentityTranslator);
        let _ = ScriptEngine.check_script(&source);
        let _ = ScriptEngine.evaluate_script(&source, &bindings);
    }
}
