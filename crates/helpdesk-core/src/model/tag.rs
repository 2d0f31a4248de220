use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::ids::{CompanyId, TagId};

/// A label attachable to tickets. Tags list by `(sequence, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketTag {
    pub id: TagId,
    pub name: String,
    pub color: i32,
    pub sequence: i32,
    pub active: bool,
    pub company_id: Option<CompanyId>,
}

impl Default for TicketTag {
    fn default() -> Self {
        Self {
            id: TagId::default(),
            name: String::new(),
            color: 0,
            sequence: 10,
            active: true,
            company_id: None,
        }
    }
}

impl TicketTag {
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }
}

impl PartialOrd for TicketTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TicketTag {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.sequence, self.id)
            .cmp(&(other.sequence, other.id))
            .then_with(|| self.name.cmp(&other.name))
    }
}
