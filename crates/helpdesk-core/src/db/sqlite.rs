use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::collections::BTreeMap;
use std::path::Path;

use super::{configure_connection, migrations, open_database};
use crate::domain::{Domain, Value};
use crate::error::{HelpdeskError, Result};
use crate::model::{
    AssignMethod, CategoryId, Company, CompanyId, PartnerId, Priority, Project, ProjectId, Stage,
    StageId, TagId, Task, TaskId, Team, TeamId, Ticket, TicketDraft, TicketId, TicketTag, User,
    UserId,
};
use crate::store::{RecordCatalog, RecordWriter, TicketHistory, TicketRepository, filter_rows};

const TICKET_COLUMNS: &str = "id, name, team_id, user_id, created_at_us, stage_id, partner_id, \
     commercial_partner_id, category_id, priority, company_id, project_id, task_id";

/// Record store over a SQLite connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

/// Ticket columns before enum and timestamp conversion.
struct TicketRow {
    id: i64,
    name: String,
    team_id: Option<i64>,
    user_id: Option<i64>,
    created_at_us: i64,
    stage_id: Option<i64>,
    partner_id: Option<i64>,
    commercial_partner_id: Option<i64>,
    category_id: Option<i64>,
    priority: String,
    company_id: Option<i64>,
    project_id: Option<i64>,
    task_id: Option<i64>,
}

impl TicketRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            team_id: row.get(2)?,
            user_id: row.get(3)?,
            created_at_us: row.get(4)?,
            stage_id: row.get(5)?,
            partner_id: row.get(6)?,
            commercial_partner_id: row.get(7)?,
            category_id: row.get(8)?,
            priority: row.get(9)?,
            company_id: row.get(10)?,
            project_id: row.get(11)?,
            task_id: row.get(12)?,
        })
    }

    fn into_ticket(self) -> Result<Ticket> {
        let created_at = DateTime::<Utc>::from_timestamp_micros(self.created_at_us).ok_or_else(|| {
            HelpdeskError::Corrupt(format!("ticket {} created_at_us {}", self.id, self.created_at_us))
        })?;
        let priority: Priority = self
            .priority
            .parse()
            .map_err(|e| HelpdeskError::Corrupt(format!("ticket {}: {e}", self.id)))?;
        Ok(Ticket {
            id: TicketId(self.id),
            name: self.name,
            team_id: self.team_id.map(TeamId),
            user_id: self.user_id.map(UserId),
            created_at,
            stage_id: self.stage_id.map(StageId),
            partner_id: self.partner_id.map(PartnerId),
            commercial_partner_id: self.commercial_partner_id.map(PartnerId),
            category_id: self.category_id.map(CategoryId),
            priority,
            company_id: self.company_id.map(CompanyId),
            project_id: self.project_id.map(ProjectId),
            task_id: self.task_id.map(TaskId),
        })
    }
}

fn extra_from_json(owner: &str, text: &str) -> Result<BTreeMap<String, Value>> {
    serde_json::from_str(text).map_err(|e| HelpdeskError::Corrupt(format!("{owner} extra_json: {e}")))
}

fn extra_to_json(extra: &BTreeMap<String, Value>) -> Result<String> {
    serde_json::to_string(extra).map_err(|e| HelpdeskError::Corrupt(e.to_string()))
}

impl SqliteStore {
    /// Open the database file at `path`, creating and migrating it as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: open_database(path)?,
        })
    }

    /// A private in-memory database with the latest schema.
    ///
    /// # Errors
    ///
    /// Returns an error if configuring or migrating fails.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        migrations::migrate(&mut conn)?;
        Ok(Self { conn })
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    fn id_list(&self, sql: &str, id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn load_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, active, company_id, partner_id, extra_json FROM projects ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, name, active, company_id, partner_id, extra)| {
                Ok(Project {
                    id: ProjectId(id),
                    name,
                    active,
                    company_id: company_id.map(CompanyId),
                    partner_id: partner_id.map(PartnerId),
                    extra: extra_from_json(&format!("project {id}"), &extra)?,
                })
            })
            .collect()
    }

    fn load_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, active, project_id, company_id, partner_id, extra_json \
             FROM tasks ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, name, active, project_id, company_id, partner_id, extra)| {
                Ok(Task {
                    id: TaskId(id),
                    name,
                    active,
                    project_id: project_id.map(ProjectId),
                    company_id: company_id.map(CompanyId),
                    partner_id: partner_id.map(PartnerId),
                    extra: extra_from_json(&format!("task {id}"), &extra)?,
                })
            })
            .collect()
    }
}

impl TicketHistory for SqliteStore {
    fn latest_team_ticket(&self, team: TeamId) -> Result<Option<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE team_id = ?1 \
             ORDER BY created_at_us DESC, id DESC LIMIT 1"
        );
        self.conn
            .query_row(&sql, [team.get()], TicketRow::read)
            .optional()?
            .map(TicketRow::into_ticket)
            .transpose()
    }

    fn open_ticket_counts(&self, users: &[UserId]) -> Result<BTreeMap<UserId, usize>> {
        if users.is_empty() {
            return Ok(BTreeMap::new());
        }
        let placeholders = vec!["?"; users.len()].join(", ");
        let sql = format!(
            "SELECT t.user_id, COUNT(*) FROM tickets t \
             LEFT JOIN stages s ON s.id = t.stage_id \
             WHERE t.user_id IN ({placeholders}) AND COALESCE(s.closed, 0) = 0 \
             GROUP BY t.user_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(users.iter().map(|u| u.get())), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(user, count)| {
                let count = usize::try_from(count)
                    .map_err(|e| HelpdeskError::Corrupt(format!("open ticket count: {e}")))?;
                Ok((UserId(user), count))
            })
            .collect()
    }
}

impl TicketRepository for SqliteStore {
    fn team(&self, id: TeamId) -> Result<Option<Team>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, company_id, assign_method, project_domain, project_domain_python, \
                 task_domain, task_domain_python, autoupdate_ticket_stage, autoupdate_dest_stage_id \
                 FROM teams WHERE id = ?1",
                [id.get()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, bool>(7)?,
                        row.get::<_, Option<i64>>(8)?,
                    ))
                },
            )
            .optional()?;
        let Some((
            name,
            company_id,
            method,
            project_domain,
            project_domain_python,
            task_domain,
            task_domain_python,
            autoupdate_ticket_stage,
            dest,
        )) = row
        else {
            return Ok(None);
        };

        let assign_method: AssignMethod = method
            .parse()
            .map_err(|e| HelpdeskError::Corrupt(format!("team {id}: {e}")))?;
        let members = self
            .id_list(
                "SELECT user_id FROM team_members WHERE team_id = ?1 ORDER BY user_id",
                id.get(),
            )?
            .into_iter()
            .map(UserId)
            .collect();
        let sources = self
            .id_list(
                "SELECT stage_id FROM team_autoupdate_stages WHERE team_id = ?1 ORDER BY stage_id",
                id.get(),
            )?
            .into_iter()
            .map(StageId)
            .collect();

        Ok(Some(Team {
            id,
            name,
            company_id: company_id.map(CompanyId),
            members,
            assign_method,
            project_domain,
            project_domain_python,
            task_domain,
            task_domain_python,
            autoupdate_ticket_stage,
            autoupdate_src_stage_ids: sources,
            autoupdate_dest_stage_id: dest.map(StageId),
        }))
    }

    fn company(&self, id: CompanyId) -> Result<Option<Company>> {
        Ok(self
            .conn
            .query_row(
                "SELECT name, project_domain, task_domain FROM companies WHERE id = ?1",
                [id.get()],
                |row| {
                    Ok(Company {
                        id,
                        name: row.get(0)?,
                        helpdesk_mgmt_project_domain: row.get(1)?,
                        helpdesk_mgmt_task_domain: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                "SELECT name, login, company_id FROM users WHERE id = ?1",
                [id.get()],
                |row| {
                    Ok(User {
                        id,
                        name: row.get(0)?,
                        login: row.get(1)?,
                        company_id: row.get::<_, Option<i64>>(2)?.map(CompanyId),
                    })
                },
            )
            .optional()?)
    }

    fn stage(&self, id: StageId) -> Result<Option<Stage>> {
        Ok(self
            .conn
            .query_row(
                "SELECT name, sequence, closed FROM stages WHERE id = ?1",
                [id.get()],
                |row| {
                    Ok(Stage {
                        id,
                        name: row.get(0)?,
                        sequence: row.get(1)?,
                        closed: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1");
        self.conn
            .query_row(&sql, [id.get()], TicketRow::read)
            .optional()?
            .map(TicketRow::into_ticket)
            .transpose()
    }

    fn insert_ticket(&mut self, draft: &TicketDraft, created_at: DateTime<Utc>) -> Result<Ticket> {
        self.conn.execute(
            "INSERT INTO tickets (name, team_id, user_id, created_at_us, stage_id, partner_id, \
             commercial_partner_id, category_id, priority, company_id, project_id, task_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                draft.name,
                draft.team_id.map(TeamId::get),
                draft.user_id.map(UserId::get),
                created_at.timestamp_micros(),
                draft.stage_id.map(StageId::get),
                draft.partner_id.map(PartnerId::get),
                draft.commercial_partner_id.map(PartnerId::get),
                draft.category_id.map(CategoryId::get),
                draft.priority.key(),
                draft.company_id.map(CompanyId::get),
                draft.project_id.map(ProjectId::get),
                draft.task_id.map(TaskId::get),
            ],
        )?;
        let id = TicketId(self.conn.last_insert_rowid());
        self.ticket(id)?.ok_or(HelpdeskError::NotFound {
            model: TicketId::MODEL,
            id: id.get(),
        })
    }

    fn set_ticket_stage(&mut self, id: TicketId, stage: StageId) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE tickets SET stage_id = ?1 WHERE id = ?2",
            params![stage.get(), id.get()],
        )?;
        if changed == 0 {
            return Err(HelpdeskError::NotFound {
                model: TicketId::MODEL,
                id: id.get(),
            });
        }
        Ok(())
    }
}

impl RecordCatalog for SqliteStore {
    fn search_projects(&self, domain: &Domain) -> Result<Vec<Project>> {
        filter_rows(self.load_projects()?, domain, |p| p.active, Project::to_record)
    }

    fn search_tasks(&self, domain: &Domain) -> Result<Vec<Task>> {
        filter_rows(self.load_tasks()?, domain, |t| t.active, Task::to_record)
    }

    fn ticket_tags(&self) -> Result<Vec<TicketTag>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, color, sequence, active, company_id FROM ticket_tags \
             WHERE active = 1 ORDER BY sequence, id",
        )?;
        let tags = stmt
            .query_map([], |row| {
                Ok(TicketTag {
                    id: TagId(row.get(0)?),
                    name: row.get(1)?,
                    color: row.get(2)?,
                    sequence: row.get(3)?,
                    active: row.get(4)?,
                    company_id: row.get::<_, Option<i64>>(5)?.map(CompanyId),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }
}

impl RecordWriter for SqliteStore {
    fn upsert_user(&mut self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, name, login, company_id) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, login = excluded.login, \
             company_id = excluded.company_id",
            params![user.id.get(), user.name, user.login, user.company_id.map(CompanyId::get)],
        )?;
        Ok(())
    }

    fn upsert_company(&mut self, company: &Company) -> Result<()> {
        self.conn.execute(
            "INSERT INTO companies (id, name, project_domain, task_domain) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, \
             project_domain = excluded.project_domain, task_domain = excluded.task_domain",
            params![
                company.id.get(),
                company.name,
                company.helpdesk_mgmt_project_domain,
                company.helpdesk_mgmt_task_domain
            ],
        )?;
        Ok(())
    }

    fn upsert_stage(&mut self, stage: &Stage) -> Result<()> {
        self.conn.execute(
            "INSERT INTO stages (id, name, sequence, closed) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, sequence = excluded.sequence, \
             closed = excluded.closed",
            params![stage.id.get(), stage.name, stage.sequence, stage.closed],
        )?;
        Ok(())
    }

    fn upsert_team(&mut self, team: &Team) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO teams (id, name, company_id, assign_method, project_domain, \
             project_domain_python, task_domain, task_domain_python, autoupdate_ticket_stage, \
             autoupdate_dest_stage_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, company_id = excluded.company_id, \
             assign_method = excluded.assign_method, project_domain = excluded.project_domain, \
             project_domain_python = excluded.project_domain_python, \
             task_domain = excluded.task_domain, task_domain_python = excluded.task_domain_python, \
             autoupdate_ticket_stage = excluded.autoupdate_ticket_stage, \
             autoupdate_dest_stage_id = excluded.autoupdate_dest_stage_id",
            params![
                team.id.get(),
                team.name,
                team.company_id.map(CompanyId::get),
                team.assign_method.as_str(),
                team.project_domain,
                team.project_domain_python,
                team.task_domain,
                team.task_domain_python,
                team.autoupdate_ticket_stage,
                team.autoupdate_dest_stage_id.map(StageId::get),
            ],
        )?;
        tx.execute("DELETE FROM team_members WHERE team_id = ?1", [team.id.get()])?;
        for member in team.sorted_members() {
            tx.execute(
                "INSERT INTO team_members (team_id, user_id) VALUES (?1, ?2)",
                params![team.id.get(), member.get()],
            )?;
        }
        tx.execute(
            "DELETE FROM team_autoupdate_stages WHERE team_id = ?1",
            [team.id.get()],
        )?;
        for stage in &team.autoupdate_src_stage_ids {
            tx.execute(
                "INSERT OR IGNORE INTO team_autoupdate_stages (team_id, stage_id) VALUES (?1, ?2)",
                params![team.id.get(), stage.get()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn upsert_project(&mut self, project: &Project) -> Result<()> {
        let extra = extra_to_json(&project.extra)?;
        self.conn.execute(
            "INSERT INTO projects (id, name, active, company_id, partner_id, extra_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, active = excluded.active, \
             company_id = excluded.company_id, partner_id = excluded.partner_id, \
             extra_json = excluded.extra_json",
            params![
                project.id.get(),
                project.name,
                project.active,
                project.company_id.map(CompanyId::get),
                project.partner_id.map(PartnerId::get),
                extra
            ],
        )?;
        Ok(())
    }

    fn upsert_task(&mut self, task: &Task) -> Result<()> {
        let extra = extra_to_json(&task.extra)?;
        self.conn.execute(
            "INSERT INTO tasks (id, name, active, project_id, company_id, partner_id, extra_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, active = excluded.active, \
             project_id = excluded.project_id, company_id = excluded.company_id, \
             partner_id = excluded.partner_id, extra_json = excluded.extra_json",
            params![
                task.id.get(),
                task.name,
                task.active,
                task.project_id.map(ProjectId::get),
                task.company_id.map(CompanyId::get),
                task.partner_id.map(PartnerId::get),
                extra
            ],
        )?;
        Ok(())
    }

    fn upsert_tag(&mut self, tag: &TicketTag) -> Result<()> {
        self.conn.execute(
            "INSERT INTO ticket_tags (id, name, color, sequence, active, company_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, color = excluded.color, \
             sequence = excluded.sequence, active = excluded.active, company_id = excluded.company_id",
            params![
                tag.id.get(),
                tag.name,
                tag.color,
                tag.sequence,
                tag.active,
                tag.company_id.map(CompanyId::get)
            ],
        )?;
        Ok(())
    }

    fn upsert_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tickets (id, name, team_id, user_id, created_at_us, stage_id, partner_id, \
             commercial_partner_id, category_id, priority, company_id, project_id, task_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, team_id = excluded.team_id, \
             user_id = excluded.user_id, created_at_us = excluded.created_at_us, \
             stage_id = excluded.stage_id, partner_id = excluded.partner_id, \
             commercial_partner_id = excluded.commercial_partner_id, \
             category_id = excluded.category_id, priority = excluded.priority, \
             company_id = excluded.company_id, project_id = excluded.project_id, \
             task_id = excluded.task_id",
            params![
                ticket.id.get(),
                ticket.name,
                ticket.team_id.map(TeamId::get),
                ticket.user_id.map(UserId::get),
                ticket.created_at.timestamp_micros(),
                ticket.stage_id.map(StageId::get),
                ticket.partner_id.map(PartnerId::get),
                ticket.commercial_partner_id.map(PartnerId::get),
                ticket.category_id.map(CategoryId::get),
                ticket.priority.key(),
                ticket.company_id.map(CompanyId::get),
                ticket.project_id.map(ProjectId::get),
                ticket.task_id.map(TaskId::get),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operator;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 14, minute, 0).single().expect("time")
    }

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("open")
    }

    #[test]
    fn team_roundtrip_keeps_members_and_stages() {
        let mut store = store();
        let mut team = Team::new(TeamId(1), "Support");
        team.members = vec![UserId(9), UserId(3)];
        team.assign_method = AssignMethod::Sequential;
        team.autoupdate_ticket_stage = true;
        team.autoupdate_src_stage_ids = vec![StageId(4)];
        team.autoupdate_dest_stage_id = Some(StageId(2));
        team.task_domain = Some("[('active', '=', True)]".into());
        store.upsert_team(&team).expect("upsert");

        let loaded = store.team(TeamId(1)).expect("load").expect("team");
        assert_eq!(loaded.members, vec![UserId(3), UserId(9)]);
        assert_eq!(loaded.assign_method, AssignMethod::Sequential);
        assert_eq!(loaded.autoupdate_src_stage_ids, vec![StageId(4)]);
        assert_eq!(loaded.task_domain, team.task_domain);
        assert_eq!(loaded.project_domain_python, team.project_domain_python);

        team.members = vec![UserId(3)];
        store.upsert_team(&team).expect("upsert again");
        let loaded = store.team(TeamId(1)).expect("load").expect("team");
        assert_eq!(loaded.members, vec![UserId(3)]);
    }

    #[test]
    fn latest_ticket_orders_by_time_then_id() {
        let mut store = store();
        let mut draft = TicketDraft::new("a");
        draft.team_id = Some(TeamId(1));
        draft.user_id = Some(UserId(1));
        store.insert_ticket(&draft, at(5)).expect("insert");
        draft.user_id = Some(UserId(2));
        store.insert_ticket(&draft, at(5)).expect("insert");
        draft.user_id = Some(UserId(3));
        store.insert_ticket(&draft, at(1)).expect("insert");

        let latest = store.latest_team_ticket(TeamId(1)).expect("latest").expect("ticket");
        assert_eq!(latest.user_id, Some(UserId(2)));
        assert_eq!(latest.created_at, at(5));
        assert!(store.latest_team_ticket(TeamId(2)).expect("latest").is_none());
    }

    #[test]
    fn open_counts_skip_closed_stages() {
        let mut store = store();
        store
            .upsert_stage(&Stage {
                id: StageId(1),
                name: "Solved".into(),
                sequence: 5,
                closed: true,
            })
            .expect("stage");

        let mut draft = TicketDraft::new("x");
        for (user, stage) in [(1, None), (1, Some(1)), (2, None), (2, None), (3, Some(1))] {
            draft.user_id = Some(UserId(user));
            draft.stage_id = stage.map(StageId);
            store.insert_ticket(&draft, at(0)).expect("insert");
        }

        let counts = store
            .open_ticket_counts(&[UserId(1), UserId(2), UserId(3)])
            .expect("counts");
        assert_eq!(counts, BTreeMap::from([(UserId(1), 1), (UserId(2), 2)]));
    }

    #[test]
    fn stage_update_and_missing_ticket() {
        let mut store = store();
        let ticket = store.insert_ticket(&TicketDraft::new("x"), at(0)).expect("insert");
        store.set_ticket_stage(ticket.id, StageId(7)).expect("update");
        assert_eq!(
            store.ticket(ticket.id).expect("load").expect("ticket").stage_id,
            Some(StageId(7))
        );
        assert!(store.set_ticket_stage(TicketId(99), StageId(7)).is_err());
    }

    #[test]
    fn catalog_search_uses_extra_fields() {
        let mut store = store();
        let mut project = Project {
            id: ProjectId(1),
            name: "Internal".into(),
            ..Project::default()
        };
        project.extra.insert("is_internal".into(), Value::Bool(true));
        store.upsert_project(&project).expect("project");
        store
            .upsert_project(&Project {
                id: ProjectId(2),
                name: "Customer".into(),
                ..Project::default()
            })
            .expect("project");

        let found = store
            .search_projects(&Domain::leaf("name", Operator::Ilike, "intern"))
            .expect("search");
        assert_eq!(found, vec![project]);
    }

    #[test]
    fn tags_come_back_in_display_order() {
        let mut store = store();
        let mut late = TicketTag::new(TagId(1), "late");
        late.sequence = 20;
        let mut hidden = TicketTag::new(TagId(3), "hidden");
        hidden.active = false;
        for tag in [&late, &TicketTag::new(TagId(2), "early"), &hidden] {
            store.upsert_tag(tag).expect("tag");
        }
        let names: Vec<_> = store.ticket_tags().expect("tags").into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["early", "late"]);
    }
}
