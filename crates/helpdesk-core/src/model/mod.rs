//! Records the helpdesk rules read and derive from.

mod catalog;
mod company;
mod ids;
mod tag;
mod team;
mod ticket;

use std::fmt;

pub use catalog::{Project, Stage, Task, User};
pub use company::{Company, CompanySettings};
pub use ids::{
    CategoryId, CompanyId, PartnerId, ProjectId, StageId, TagId, TaskId, TeamId, TicketId, UserId,
};
pub use tag::TicketTag;
pub use team::{
    AssignMethod, DEFAULT_PROJECT_SCRIPT, DEFAULT_TASK_SCRIPT, PROJECT_SCRIPT_FIELD,
    TASK_SCRIPT_FIELD, Team,
};
pub use ticket::{Priority, Ticket, TicketDraft};

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}
