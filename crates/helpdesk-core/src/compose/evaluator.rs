use super::translate::Translate;
use crate::domain::{Domain, DomainError, RecordView};
use crate::model::{Company, CompanyId, TicketDraft, TicketId, User, UserId};

/// Why a predicate produced no domain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredicateError {
    /// The predicate ran but its result was not a list or tuple.
    #[error("evaluated domain is not a list/tuple (got {0})")]
    NotADomain(String),

    /// The result was a list that does not form a valid domain.
    #[error(transparent)]
    Invalid(#[from] DomainError),

    /// Parsing or running the predicate failed.
    #[error("{0}")]
    Script(String),
}

/// Evaluates stored filter text and domain scripts.
///
/// The composer only needs these three entry points; the language behind
/// them lives in its own crate.
pub trait PredicateEvaluator {
    /// Evaluate static filter text with `uid` as the only binding.
    ///
    /// # Errors
    ///
    /// Returns a [`PredicateError`] when the text does not evaluate to a domain.
    fn evaluate_text(&self, text: &str, uid: UserId) -> Result<Domain, PredicateError>;

    /// Run a domain script: first as an expression, then as statements
    /// that assign `domain`. A script that leaves `domain` unset yields an
    /// empty domain.
    ///
    /// # Errors
    ///
    /// Returns a [`PredicateError`] when both attempts fail or `domain` ends
    /// up holding something other than a list.
    fn evaluate_script(&self, script: &str, bindings: &Bindings<'_>)
    -> Result<Domain, PredicateError>;

    /// Static syntax and safety check, run when a team is saved.
    ///
    /// # Errors
    ///
    /// Returns the diagnostic message.
    fn check_script(&self, script: &str) -> Result<(), String>;
}

/// The current user and company a request runs as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub uid: UserId,
    pub user: Option<User>,
    pub company: Option<Company>,
}

impl Session {
    #[must_use]
    pub fn new(uid: UserId) -> Self {
        Self {
            uid,
            user: None,
            company: None,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.uid = user.id;
        self.user = Some(user);
        self
    }

    #[must_use]
    pub fn with_company(mut self, company: Company) -> Self {
        self.company = Some(company);
        self
    }

    #[must_use]
    pub fn company_id(&self) -> Option<CompanyId> {
        self.company.as_ref().map(|c| c.id)
    }
}

/// Names a domain script can read.
///
/// The set is fixed: `ticket`, `env`, `user`, `company`, `AND`, `OR`,
/// `normalize`, `_` and `base_domain`. The combinators are provided by the
/// evaluator itself; the records and the translator come from here.
pub struct Bindings<'a> {
    pub uid: UserId,
    /// The ticket being edited. Empty when no ticket is bound.
    pub ticket: RecordView,
    pub user: RecordView,
    /// The session company, not the ticket's.
    pub company: RecordView,
    pub base_domain: Domain,
    pub translator: &'a dyn Translate,
}

impl<'a> Bindings<'a> {
    pub fn new(
        session: &Session,
        ticket: Option<&TicketDraft>,
        translator: &'a dyn Translate,
    ) -> Self {
        let user = session.user.as_ref().map_or_else(
            || RecordView::new(UserId::MODEL, session.uid.get()),
            User::to_record,
        );
        let company = session
            .company
            .as_ref()
            .map_or_else(|| RecordView::empty(CompanyId::MODEL), Company::to_record);
        Self {
            uid: session.uid,
            ticket: ticket.map_or_else(|| RecordView::empty(TicketId::MODEL), TicketDraft::to_record),
            user,
            company,
            base_domain: Domain::new(),
            translator,
        }
    }

    /// The `env` record: `env.uid`, `env.user`, `env.company`.
    #[must_use]
    pub fn env(&self) -> RecordView {
        RecordView::new("env", 1)
            .with("uid", self.uid)
            .with_one("user", self.user.clone())
            .with_one("company", self.company.clone())
    }
}

impl std::fmt::Debug for Bindings<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("uid", &self.uid)
            .field("ticket", &self.ticket)
            .field("user", &self.user)
            .field("company", &self.company)
            .field("base_domain", &self.base_domain)
            .finish_non_exhaustive()
    }
}
