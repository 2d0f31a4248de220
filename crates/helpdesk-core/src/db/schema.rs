//! SQLite schema for the helpdesk store.
//!
//! - `teams` holds assignment and filter configuration; members and the
//!   auto-update source stages live in edge tables
//! - `tickets` keeps creation time in microseconds so the latest-ticket
//!   lookup is a single indexed scan
//! - `projects` / `tasks` keep extra filterable fields as a JSON object
//! - `helpdesk_meta` mirrors the schema version for diagnostics

/// Migration v1: core records.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS companies (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    project_domain TEXT,
    task_domain TEXT
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    login TEXT NOT NULL DEFAULT '',
    company_id INTEGER
);

CREATE TABLE IF NOT EXISTS stages (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    sequence INTEGER NOT NULL DEFAULT 0,
    closed INTEGER NOT NULL DEFAULT 0 CHECK (closed IN (0, 1))
);

CREATE TABLE IF NOT EXISTS teams (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    company_id INTEGER,
    assign_method TEXT NOT NULL DEFAULT 'manual'
        CHECK (assign_method IN ('manual', 'randomly', 'balanced', 'sequential')),
    project_domain TEXT,
    project_domain_python TEXT,
    task_domain TEXT,
    task_domain_python TEXT,
    autoupdate_ticket_stage INTEGER NOT NULL DEFAULT 0 CHECK (autoupdate_ticket_stage IN (0, 1)),
    autoupdate_dest_stage_id INTEGER
);

CREATE TABLE IF NOT EXISTS team_members (
    team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL,
    PRIMARY KEY (team_id, user_id)
);

CREATE TABLE IF NOT EXISTS team_autoupdate_stages (
    team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    stage_id INTEGER NOT NULL,
    PRIMARY KEY (team_id, stage_id)
);

CREATE TABLE IF NOT EXISTS tickets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL DEFAULT '',
    team_id INTEGER,
    user_id INTEGER,
    created_at_us INTEGER NOT NULL,
    stage_id INTEGER,
    partner_id INTEGER,
    commercial_partner_id INTEGER,
    category_id INTEGER,
    priority TEXT NOT NULL DEFAULT '0' CHECK (priority IN ('0', '1', '2', '3')),
    company_id INTEGER,
    project_id INTEGER,
    task_id INTEGER
);

CREATE INDEX IF NOT EXISTS idx_tickets_team_created
    ON tickets(team_id, created_at_us DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_tickets_user_stage ON tickets(user_id, stage_id);

CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    active INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1)),
    company_id INTEGER,
    partner_id INTEGER,
    extra_json TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    active INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1)),
    project_id INTEGER,
    company_id INTEGER,
    partner_id INTEGER,
    extra_json TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);

CREATE TABLE IF NOT EXISTS helpdesk_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO helpdesk_meta (id, schema_version) VALUES (1, 0);
";

/// Migration v2: ticket tags.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS ticket_tags (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    color INTEGER NOT NULL DEFAULT 0,
    sequence INTEGER NOT NULL DEFAULT 10,
    active INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1)),
    company_id INTEGER
);

CREATE INDEX IF NOT EXISTS idx_ticket_tags_order ON ticket_tags(sequence, id);
";

/// Indexes the store relies on for its hot queries.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_tickets_team_created",
    "idx_tickets_user_stage",
    "idx_tasks_project",
    "idx_ticket_tags_order",
];
