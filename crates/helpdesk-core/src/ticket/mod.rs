//! Ticket touchpoints: assignee defaults and selector filters.

pub mod domain_fields;
pub mod lifecycle;

pub use domain_fields::{DomainUpdate, TicketDomains, ViewContext, recompute_needed};
pub use lifecycle::{create_ticket, default_assignee, on_team_changed, prepare_create};
