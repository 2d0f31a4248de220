use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;
use super::ids::{CompanyId, StageId, TeamId, UserId};
use crate::compose::PredicateEvaluator;
use crate::error::{HelpdeskError, Result};

/// Label used in validation errors for the project script field.
pub const PROJECT_SCRIPT_FIELD: &str = "Project Domain Python Code";
/// Label used in validation errors for the task script field.
pub const TASK_SCRIPT_FIELD: &str = "Task Domain Python Code";

/// Template new teams start with for `project_domain_python`.
pub const DEFAULT_PROJECT_SCRIPT: &str = "# Available variables:
#  - ticket: Current helpdesk ticket record
#  - env: Environment (uid, user, company)
#  - user: Current user
#  - company: Current company
#  - AND, OR: Domain operators
#  - normalize: Function to normalize domain lists
#  - _: Translation function
#
# Your code will be automatically combined with static domains using AND.
# The code can either assign to 'domain' variable OR return a list directly.
#
# Example:
# if ticket.partner_id:
#     domain = [('partner_id', '=', ticket.commercial_partner_id.id)]
";

/// Template new teams start with for `task_domain_python`.
pub const DEFAULT_TASK_SCRIPT: &str = "# Available variables:
#  - ticket: Current helpdesk ticket record
#  - env: Environment (uid, user, company)
#  - user: Current user
#  - company: Current company
#  - AND, OR: Domain operators
#  - normalize: Function to normalize domain lists
#  - _: Translation function
#
# Your code will be automatically combined with static domains using AND.
# The code can either assign to 'domain' variable OR return a list directly.
#
# Example:
# if ticket.project_id:
#     domain = [('project_id', '=', ticket.project_id.id)]
";

/// Automatic assignation policy for new tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignMethod {
    /// Nobody is picked automatically.
    #[default]
    Manual,
    /// Round-robin after the team's latest assignee.
    Randomly,
    /// Member with the fewest open tickets.
    Balanced,
    /// Round-robin after the team's latest assignee.
    Sequential,
}

impl AssignMethod {
    pub const ALL: [Self; 4] = [Self::Manual, Self::Randomly, Self::Balanced, Self::Sequential];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Randomly => "randomly",
            Self::Balanced => "balanced",
            Self::Sequential => "sequential",
        }
    }

    /// Human label shown next to the selection.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Manual => "Manually",
            Self::Randomly => "Randomly",
            Self::Balanced => "Balanced",
            Self::Sequential => "Sequential",
        }
    }
}

impl fmt::Display for AssignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "assign method",
                got: s.to_string(),
            })
    }
}

/// A support team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub company_id: Option<CompanyId>,
    pub members: Vec<UserId>,
    pub assign_method: AssignMethod,
    pub project_domain: Option<String>,
    pub project_domain_python: Option<String>,
    pub task_domain: Option<String>,
    pub task_domain_python: Option<String>,
    pub autoupdate_ticket_stage: bool,
    pub autoupdate_src_stage_ids: Vec<StageId>,
    pub autoupdate_dest_stage_id: Option<StageId>,
}

impl Default for Team {
    fn default() -> Self {
        Self {
            id: TeamId::default(),
            name: String::new(),
            company_id: None,
            members: Vec::new(),
            assign_method: AssignMethod::Manual,
            project_domain: None,
            project_domain_python: Some(DEFAULT_PROJECT_SCRIPT.to_string()),
            task_domain: None,
            task_domain_python: Some(DEFAULT_TASK_SCRIPT.to_string()),
            autoupdate_ticket_stage: false,
            autoupdate_src_stage_ids: Vec::new(),
            autoupdate_dest_stage_id: None,
        }
    }
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Members in ascending id order, without duplicates.
    #[must_use]
    pub fn sorted_members(&self) -> Vec<UserId> {
        let mut members = self.members.clone();
        members.sort_unstable();
        members.dedup();
        members
    }

    #[must_use]
    pub fn has_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    /// Editor-side reaction to a member list change: an empty team falls
    /// back to manual assignation.
    pub fn on_members_changed(&mut self) {
        if self.members.is_empty() {
            self.assign_method = AssignMethod::Manual;
        }
    }

    /// Reject non-manual assignation on a team without members.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::AssignMethodWithoutMembers`].
    pub fn check_assignation(&self) -> Result<()> {
        if self.members.is_empty() && self.assign_method != AssignMethod::Manual {
            return Err(HelpdeskError::AssignMethodWithoutMembers {
                team: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Statically check both domain scripts. Empty fields always pass.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::Validation`] naming the first failing field.
    pub fn validate_scripts(&self, evaluator: &dyn PredicateEvaluator) -> Result<()> {
        let fields = [
            (PROJECT_SCRIPT_FIELD, self.project_domain_python.as_deref()),
            (TASK_SCRIPT_FIELD, self.task_domain_python.as_deref()),
        ];
        for (field, script) in fields {
            let Some(script) = script.map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };
            evaluator
                .check_script(script)
                .map_err(|message| HelpdeskError::Validation { field, message })?;
        }
        Ok(())
    }

    /// All write-time checks.
    ///
    /// # Errors
    ///
    /// See [`Team::check_assignation`] and [`Team::validate_scripts`].
    pub fn validate(&self, evaluator: &dyn PredicateEvaluator) -> Result<()> {
        self.check_assignation()?;
        self.validate_scripts(evaluator)
    }
}
