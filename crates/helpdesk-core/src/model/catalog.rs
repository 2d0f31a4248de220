use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{CompanyId, PartnerId, ProjectId, StageId, TaskId, UserId};
use crate::domain::{RecordView, Value};

/// A helpdesk agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub login: String,
    pub company_id: Option<CompanyId>,
}

impl User {
    #[must_use]
    pub fn to_record(&self) -> RecordView {
        RecordView::new(UserId::MODEL, self.id.get())
            .with("name", self.name.as_str())
            .with("login", self.login.as_str())
            .with_one(
                "company_id",
                RecordView::reference(CompanyId::MODEL, self.company_id.map(CompanyId::get)),
            )
    }
}

/// A ticket workflow stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    pub sequence: i32,
    /// Tickets in a closed stage do not count as open.
    pub closed: bool,
}

/// A project that tickets may be linked to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub active: bool,
    pub company_id: Option<CompanyId>,
    pub partner_id: Option<PartnerId>,
    /// Additional scalar fields filters may test.
    pub extra: BTreeMap<String, Value>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            id: ProjectId::default(),
            name: String::new(),
            active: true,
            company_id: None,
            partner_id: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Project {
    #[must_use]
    pub fn to_record(&self) -> RecordView {
        let mut record = RecordView::new(ProjectId::MODEL, self.id.get())
            .with("name", self.name.as_str())
            .with("active", self.active)
            .with_one(
                "company_id",
                RecordView::reference(CompanyId::MODEL, self.company_id.map(CompanyId::get)),
            )
            .with_one(
                "partner_id",
                RecordView::reference(PartnerId::MODEL, self.partner_id.map(PartnerId::get)),
            );
        for (name, value) in &self.extra {
            record = record.with(name.as_str(), value.clone());
        }
        record
    }
}

/// A project task that tickets may be linked to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub active: bool,
    pub project_id: Option<ProjectId>,
    pub company_id: Option<CompanyId>,
    pub partner_id: Option<PartnerId>,
    pub extra: BTreeMap<String, Value>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: TaskId::default(),
            name: String::new(),
            active: true,
            project_id: None,
            company_id: None,
            partner_id: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Task {
    #[must_use]
    pub fn to_record(&self) -> RecordView {
        let mut record = RecordView::new(TaskId::MODEL, self.id.get())
            .with("name", self.name.as_str())
            .with("active", self.active)
            .with_one(
                "project_id",
                RecordView::reference(ProjectId::MODEL, self.project_id.map(ProjectId::get)),
            )
            .with_one(
                "company_id",
                RecordView::reference(CompanyId::MODEL, self.company_id.map(CompanyId::get)),
            )
            .with_one(
                "partner_id",
                RecordView::reference(PartnerId::MODEL, self.partner_id.map(PartnerId::get)),
            );
        for (name, value) in &self.extra {
            record = record.with(name.as_str(), value.clone());
        }
        record
    }
}
