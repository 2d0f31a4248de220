use serde::{Deserialize, Serialize};

use super::ids::CompanyId;
use crate::domain::RecordView;

/// A company and its default project/task filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    /// Static filter text applied to every team's project selector.
    pub helpdesk_mgmt_project_domain: Option<String>,
    /// Static filter text applied to every team's task selector.
    pub helpdesk_mgmt_task_domain: Option<String>,
}

impl Company {
    pub fn new(id: CompanyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn to_record(&self) -> RecordView {
        RecordView::new(CompanyId::MODEL, self.id.get()).with("name", self.name.as_str())
    }
}

/// Settings-screen view over a company's helpdesk filters.
///
/// Values are read from the company when the screen opens and written back
/// through [`CompanySettings::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySettings {
    pub company_id: CompanyId,
    pub helpdesk_mgmt_project_domain: Option<String>,
    pub helpdesk_mgmt_task_domain: Option<String>,
}

impl CompanySettings {
    #[must_use]
    pub fn load(company: &Company) -> Self {
        Self {
            company_id: company.id,
            helpdesk_mgmt_project_domain: company.helpdesk_mgmt_project_domain.clone(),
            helpdesk_mgmt_task_domain: company.helpdesk_mgmt_task_domain.clone(),
        }
    }

    /// Write the edited values back. Blank text clears the filter.
    pub fn apply(&self, company: &mut Company) {
        company.helpdesk_mgmt_project_domain = non_blank(self.helpdesk_mgmt_project_domain.as_deref());
        company.helpdesk_mgmt_task_domain = non_blank(self.helpdesk_mgmt_task_domain.as_deref());
    }
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty()).map(str::to_string)
}
