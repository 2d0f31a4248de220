use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $model:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Technical model name records of this id belong to.
            pub const MODEL: &'static str = $model;

            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for crate::domain::Value {
            fn from(id: $name) -> Self {
                Self::Int(id.0)
            }
        }
    };
}

record_id!(
    /// A support agent.
    UserId,
    "res.users"
);
record_id!(TeamId, "helpdesk.ticket.team");
record_id!(TicketId, "helpdesk.ticket");
record_id!(StageId, "helpdesk.ticket.stage");
record_id!(CompanyId, "res.company");
record_id!(PartnerId, "res.partner");
record_id!(CategoryId, "helpdesk.ticket.category");
record_id!(ProjectId, "project.project");
record_id!(TaskId, "project.task");
record_id!(TagId, "helpdesk.ticket.tag");
