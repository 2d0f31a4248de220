//! `hdesk seed`: load a TOML fixture into the database.

use crate::cmd::{Workspace, helpdesk_failure};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use helpdesk_core::store::Fixture;
use helpdesk_script::ScriptEngine;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Fixture file with users, companies, stages, teams, projects, tasks and tickets.
    #[arg(value_name = "FIXTURE")]
    pub fixture: PathBuf,
}

#[derive(Debug, Serialize)]
struct SeedOutput {
    ok: bool,
    fixture: String,
    users: usize,
    companies: usize,
    stages: usize,
    teams: usize,
    projects: usize,
    tasks: usize,
    tags: usize,
    tickets: usize,
}

/// Execute `hdesk seed`. Teams pass the same checks as any team write.
///
/// # Errors
///
/// Returns an error if the fixture cannot be read, a team fails
/// validation, or a write fails.
pub fn run_seed(args: &SeedArgs, workspace: &Workspace, output: OutputMode) -> Result<()> {
    let fixture = Fixture::load(&args.fixture)?;
    let mut store = workspace.open_store(output)?;

    fixture
        .apply(&mut store, &ScriptEngine)
        .map_err(|e| helpdesk_failure(output, &e))?;

    let result = SeedOutput {
        ok: true,
        fixture: args.fixture.display().to_string(),
        users: fixture.users.len(),
        companies: fixture.companies.len(),
        stages: fixture.stages.len(),
        teams: fixture.teams.len(),
        projects: fixture.projects.len(),
        tasks: fixture.tasks.len(),
        tags: fixture.tags.len(),
        tickets: fixture.tickets.len(),
    };
    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(
                w,
                "seeded\tteams={}\tprojects={}\ttasks={}\ttickets={}",
                r.teams, r.projects, r.tasks, r.tickets
            )
        },
        |r, w| {
            pretty_section(w, &format!("Seeded from {}", r.fixture))?;
            for (label, count) in [
                ("users", r.users),
                ("companies", r.companies),
                ("stages", r.stages),
                ("teams", r.teams),
                ("projects", r.projects),
                ("tasks", r.tasks),
                ("tags", r.tags),
                ("tickets", r.tickets),
            ] {
                pretty_kv(w, label, count.to_string())?;
            }
            Ok(())
        },
    )
}
