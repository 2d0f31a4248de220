use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{RecordWriter, save_team};
use crate::compose::PredicateEvaluator;
use crate::error::Result;
use crate::model::{Company, Project, Stage, Task, Team, Ticket, TicketTag, User};

/// Seed data for a store, usually read from TOML.
///
/// ```toml
/// [[stages]]
/// id = 1
/// name = "New"
///
/// [[teams]]
/// id = 1
/// name = "Support"
/// members = [2, 3]
/// assign_method = "sequential"
///
/// [[tickets]]
/// id = 1
/// name = "Printer jam"
/// team_id = 1
/// created_at = "2025-01-06T09:00:00Z"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub users: Vec<User>,
    pub companies: Vec<Company>,
    pub stages: Vec<Stage>,
    pub teams: Vec<Team>,
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    pub tags: Vec<TicketTag>,
    pub tickets: Vec<Ticket>,
}

impl Fixture {
    /// # Errors
    ///
    /// Returns an error if the text is not a valid fixture.
    pub fn from_toml_str(text: &str) -> AnyResult<Self> {
        toml::from_str(text).context("failed to parse fixture")
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> AnyResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Write every record to `store`. Teams go through the write-time checks.
    ///
    /// # Errors
    ///
    /// Returns the first validation or store error; records written before
    /// it stay written.
    pub fn apply(&self, store: &mut dyn RecordWriter, evaluator: &dyn PredicateEvaluator) -> Result<()> {
        for user in &self.users {
            store.upsert_user(user)?;
        }
        for company in &self.companies {
            store.upsert_company(company)?;
        }
        for stage in &self.stages {
            store.upsert_stage(stage)?;
        }
        for team in &self.teams {
            save_team(store, team, evaluator)?;
        }
        for project in &self.projects {
            store.upsert_project(project)?;
        }
        for task in &self.tasks {
            store.upsert_task(task)?;
        }
        for tag in &self.tags {
            store.upsert_tag(tag)?;
        }
        for ticket in &self.tickets {
            store.upsert_ticket(ticket)?;
        }
        tracing::info!(
            users = self.users.len(),
            teams = self.teams.len(),
            tickets = self.tickets.len(),
            "fixture applied"
        );
        Ok(())
    }
}
