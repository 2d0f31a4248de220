use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;
use super::ids::{
    CategoryId, CompanyId, PartnerId, ProjectId, StageId, TaskId, TeamId, TicketId, UserId,
};
use crate::domain::RecordView;

/// Ticket priority, stored as the selection keys `"0"` to `"3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    #[serde(rename = "0")]
    Low,
    #[serde(rename = "1")]
    Medium,
    #[serde(rename = "2")]
    High,
    #[serde(rename = "3")]
    VeryHigh,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::VeryHigh];

    /// Selection key as stored and as scripts see it.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Low => "0",
            Self::Medium => "1",
            Self::High => "2",
            Self::VeryHigh => "3",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very-high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|p| p.key() == normalized || p.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            })
    }
}

/// A persisted ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub name: String,
    #[serde(default)]
    pub team_id: Option<TeamId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub stage_id: Option<StageId>,
    #[serde(default)]
    pub partner_id: Option<PartnerId>,
    #[serde(default)]
    pub commercial_partner_id: Option<PartnerId>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub task_id: Option<TaskId>,
}

impl Ticket {
    /// A saved ticket built from create values.
    #[must_use]
    pub fn from_draft(id: TicketId, draft: &TicketDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name.clone(),
            team_id: draft.team_id,
            user_id: draft.user_id,
            created_at,
            stage_id: draft.stage_id,
            partner_id: draft.partner_id,
            commercial_partner_id: draft.commercial_partner_id,
            category_id: draft.category_id,
            priority: draft.priority,
            company_id: draft.company_id,
            project_id: draft.project_id,
            task_id: draft.task_id,
        }
    }

    /// The editable form of this ticket.
    #[must_use]
    pub fn to_draft(&self) -> TicketDraft {
        TicketDraft {
            id: Some(self.id),
            name: self.name.clone(),
            team_id: self.team_id,
            user_id: self.user_id,
            stage_id: self.stage_id,
            partner_id: self.partner_id,
            commercial_partner_id: self.commercial_partner_id,
            category_id: self.category_id,
            priority: self.priority,
            company_id: self.company_id,
            project_id: self.project_id,
            task_id: self.task_id,
        }
    }
}

/// Field values of a ticket that is being edited or created.
///
/// `id` is `None` until the ticket is saved. The same shape carries the
/// values passed to create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketDraft {
    pub id: Option<TicketId>,
    pub name: String,
    pub team_id: Option<TeamId>,
    pub user_id: Option<UserId>,
    pub stage_id: Option<StageId>,
    pub partner_id: Option<PartnerId>,
    pub commercial_partner_id: Option<PartnerId>,
    pub category_id: Option<CategoryId>,
    pub priority: Priority,
    pub company_id: Option<CompanyId>,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
}

impl TicketDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Read-only view handed to domain scripts as `ticket`.
    ///
    /// Relations are bare references; an unsaved draft is still a non-empty
    /// record so scripts can read its fields.
    #[must_use]
    pub fn to_record(&self) -> RecordView {
        let id = self.id.map_or(0, TicketId::get);
        RecordView::new(TicketId::MODEL, id)
            .with("name", self.name.as_str())
            .with("priority", self.priority.key())
            .with_one("team_id", RecordView::reference(TeamId::MODEL, self.team_id.map(TeamId::get)))
            .with_one("user_id", RecordView::reference(UserId::MODEL, self.user_id.map(UserId::get)))
            .with_one("stage_id", RecordView::reference(StageId::MODEL, self.stage_id.map(StageId::get)))
            .with_one(
                "partner_id",
                RecordView::reference(PartnerId::MODEL, self.partner_id.map(PartnerId::get)),
            )
            .with_one(
                "commercial_partner_id",
                RecordView::reference(PartnerId::MODEL, self.commercial_partner_id.map(PartnerId::get)),
            )
            .with_one(
                "category_id",
                RecordView::reference(CategoryId::MODEL, self.category_id.map(CategoryId::get)),
            )
            .with_one(
                "company_id",
                RecordView::reference(CompanyId::MODEL, self.company_id.map(CompanyId::get)),
            )
            .with_one(
                "project_id",
                RecordView::reference(ProjectId::MODEL, self.project_id.map(ProjectId::get)),
            )
            .with_one("task_id", RecordView::reference(TaskId::MODEL, self.task_id.map(TaskId::get)))
    }
}

impl From<&Ticket> for TicketDraft {
    fn from(ticket: &Ticket) -> Self {
        ticket.to_draft()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Operator};

    #[test]
    fn priority_parses_keys_and_names() {
        assert_eq!("2".parse::<Priority>().expect("key"), Priority::High);
        assert_eq!("very_high".parse::<Priority>().expect("name"), Priority::VeryHigh);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(
            serde_json::to_string(&Priority::Medium).expect("serialize"),
            "\"1\""
        );
    }

    #[test]
    fn draft_record_exposes_relations() {
        let mut draft = TicketDraft::new("Printer jam");
        draft.partner_id = Some(PartnerId(7));
        draft.priority = Priority::High;

        let record = draft.to_record();
        assert!(!record.is_empty());
        assert!(
            Domain::leaf("partner_id", Operator::Eq, 7)
                .matches(&record)
                .expect("match")
        );
        assert!(
            Domain::leaf("project_id", Operator::Eq, false)
                .matches(&record)
                .expect("match")
        );
        assert!(
            Domain::leaf("priority", Operator::Eq, "2")
                .matches(&record)
                .expect("match")
        );
    }
}
