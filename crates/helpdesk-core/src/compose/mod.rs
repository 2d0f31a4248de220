//! Layered project/task filters.
//!
//! A filter is built from up to four layers, AND-ed in this order:
//!
//! 1. the company's static filter text,
//! 2. the team's static filter text,
//! 3. the team's domain script,
//! 4. for tasks only, `('project_id', '=', P)` when the ticket has a project
//!    and no earlier layer already contains that exact leaf.
//!
//! A layer that fails to parse or evaluate is logged and dropped. Nothing
//! here returns an error to the caller.

mod evaluator;
mod translate;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub use evaluator::{Bindings, PredicateError, PredicateEvaluator, Session};
pub use translate::{IdentityTranslator, Translate};

use crate::domain::{Domain, Operator, Value, and_all};
use crate::model::{Company, ParseEnumError, ProjectId, TaskId, Team, TicketDraft, UserId};

static IDENTITY: IdentityTranslator = IdentityTranslator;

/// Which selector a filter is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainKind {
    Project,
    Task,
}

impl DomainKind {
    pub const ALL: [Self; 2] = [Self::Project, Self::Task];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Task => "task",
        }
    }

    /// Model the filter is searched against.
    #[must_use]
    pub const fn target_model(self) -> &'static str {
        match self {
            Self::Project => ProjectId::MODEL,
            Self::Task => TaskId::MODEL,
        }
    }

    /// Ticket field whose selector the filter restricts.
    #[must_use]
    pub const fn ticket_field(self) -> &'static str {
        match self {
            Self::Project => "project_id",
            Self::Task => "task_id",
        }
    }

    fn company_text(self, company: &Company) -> Option<&str> {
        match self {
            Self::Project => company.helpdesk_mgmt_project_domain.as_deref(),
            Self::Task => company.helpdesk_mgmt_task_domain.as_deref(),
        }
    }

    fn team_text(self, team: &Team) -> Option<&str> {
        match self {
            Self::Project => team.project_domain.as_deref(),
            Self::Task => team.task_domain.as_deref(),
        }
    }

    fn team_script(self, team: &Team) -> Option<&str> {
        match self {
            Self::Project => team.project_domain_python.as_deref(),
            Self::Task => team.task_domain_python.as_deref(),
        }
    }
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "domain kind",
                got: s.to_string(),
            })
    }
}

/// The records a filter is composed from. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposeSources<'a> {
    pub team: Option<&'a Team>,
    pub company: Option<&'a Company>,
    pub ticket: Option<&'a TicketDraft>,
}

/// Builds project/task filters from company, team and ticket state.
pub struct DomainComposer<'a> {
    evaluator: &'a dyn PredicateEvaluator,
    translator: &'a dyn Translate,
    scripts_enabled: bool,
}

impl<'a> DomainComposer<'a> {
    pub fn new(evaluator: &'a dyn PredicateEvaluator) -> Self {
        Self {
            evaluator,
            translator: &IDENTITY,
            scripts_enabled: true,
        }
    }

    #[must_use]
    pub fn with_translator(mut self, translator: &'a dyn Translate) -> Self {
        self.translator = translator;
        self
    }

    /// When disabled, team scripts are skipped entirely.
    #[must_use]
    pub const fn with_scripts(mut self, enabled: bool) -> Self {
        self.scripts_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn evaluator(&self) -> &'a dyn PredicateEvaluator {
        self.evaluator
    }

    /// Compose the filter for `kind`.
    ///
    /// Returns `[]` when no layer contributes.
    pub fn compose(&self, kind: DomainKind, sources: ComposeSources<'_>, session: &Session) -> Domain {
        let mut layers: Vec<Domain> = Vec::new();

        if let Some(company) = sources.company {
            self.push_static(&mut layers, kind, "company", kind.company_text(company), session.uid);
        }

        if let Some(team) = sources.team {
            self.push_static(&mut layers, kind, "team", kind.team_text(team), session.uid);

            if self.scripts_enabled
                && let Some(script) = kind.team_script(team)
            {
                let bindings = Bindings::new(session, sources.ticket, self.translator);
                self.push_script(&mut layers, kind, team, script, &bindings);
            }
        }

        if kind == DomainKind::Task
            && let Some(project) = sources.ticket.and_then(|t| t.project_id)
        {
            let value = Value::from(project);
            let present = layers
                .iter()
                .any(|d| d.contains_condition("project_id", Operator::Eq, &value));
            if present {
                tracing::debug!(project = %project, "project filter already present");
            } else {
                layers.push(Domain::leaf("project_id", Operator::Eq, value));
            }
        }

        if layers.is_empty() {
            return Domain::new();
        }

        and_all(&layers).unwrap_or_else(|e| {
            tracing::error!(kind = %kind, error = %e, "failed to combine filter layers");
            Domain::new()
        })
    }

    fn push_static(
        &self,
        layers: &mut Vec<Domain>,
        kind: DomainKind,
        origin: &'static str,
        text: Option<&str>,
        uid: UserId,
    ) {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };
        match self.evaluator.evaluate_text(text, uid) {
            Ok(domain) => push_checked(layers, kind, origin, domain),
            Err(PredicateError::NotADomain(got)) => {
                tracing::warn!(
                    kind = %kind,
                    layer = origin,
                    expr = text,
                    "evaluated domain is not a list/tuple (got {got})"
                );
            }
            Err(e) => {
                tracing::error!(
                    kind = %kind,
                    layer = origin,
                    expr = text,
                    error = %e,
                    "failed to evaluate static domain"
                );
            }
        }
    }

    fn push_script(
        &self,
        layers: &mut Vec<Domain>,
        kind: DomainKind,
        team: &Team,
        script: &str,
        bindings: &Bindings<'_>,
    ) {
        if script.trim().is_empty() {
            return;
        }
        match self.evaluator.evaluate_script(script, bindings) {
            Ok(domain) => push_checked(layers, kind, "script", domain),
            Err(PredicateError::NotADomain(got)) => {
                tracing::warn!(
                    kind = %kind,
                    team = %team.id,
                    "domain script assigned invalid type to 'domain': {got}"
                );
            }
            Err(e) => {
                tracing::error!(
                    kind = %kind,
                    team = %team.id,
                    error = %e,
                    "error executing domain script"
                );
            }
        }
    }
}

/// Normalize and keep a layer, dropping it if it is malformed.
///
/// A layer that evaluates to `[]` sets no restriction and counts as TRUE.
fn push_checked(layers: &mut Vec<Domain>, kind: DomainKind, origin: &'static str, domain: Domain) {
    if domain.is_empty() {
        layers.push(Domain::true_domain());
        return;
    }
    match domain.normalize() {
        Ok(normalized) => layers.push(normalized),
        Err(e) => {
            tracing::error!(kind = %kind, layer = origin, error = %e, "dropping malformed domain");
        }
    }
}
