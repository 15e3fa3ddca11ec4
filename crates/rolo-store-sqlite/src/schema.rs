//! SQL schema for the Rolo SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Accounts ────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL DEFAULT '',
    password_hash TEXT NOT NULL DEFAULT '',
    first_name    TEXT NOT NULL DEFAULT '',
    last_name     TEXT NOT NULL DEFAULT '',
    is_staff      INTEGER NOT NULL DEFAULT 0,
    is_active     INTEGER NOT NULL DEFAULT 0,
    date_joined   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS groups (
    group_id TEXT PRIMARY KEY,
    name     TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS permissions (
    permission_id TEXT PRIMARY KEY,
    app_label     TEXT NOT NULL,
    codename      TEXT NOT NULL,
    name          TEXT NOT NULL,
    UNIQUE (app_label, codename)
);

CREATE TABLE IF NOT EXISTS group_permissions (
    group_id      TEXT NOT NULL REFERENCES groups(group_id),
    permission_id TEXT NOT NULL REFERENCES permissions(permission_id),
    PRIMARY KEY (group_id, permission_id)
);

CREATE TABLE IF NOT EXISTS user_groups (
    user_id  TEXT NOT NULL REFERENCES users(user_id),
    group_id TEXT NOT NULL REFERENCES groups(group_id),
    PRIMARY KEY (user_id, group_id)
);

-- ── Lookup tables ───────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS business_types (
    business_type_id      TEXT PRIMARY KEY,
    name                  TEXT NOT NULL,
    slug                  TEXT NOT NULL UNIQUE,
    can_view_all_projects INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS relationship_types (
    relationship_type_id TEXT PRIMARY KEY,
    name                 TEXT NOT NULL UNIQUE,
    slug                 TEXT NOT NULL UNIQUE
);

-- ── Contacts ────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS contacts (
    contact_id  TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,            -- 'individual' | 'business'
    user_id     TEXT UNIQUE REFERENCES users(user_id),
    name        TEXT NOT NULL DEFAULT '',
    first_name  TEXT NOT NULL DEFAULT '',
    middle_name TEXT NOT NULL DEFAULT '',
    last_name   TEXT NOT NULL DEFAULT '',
    sort_name   TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    email       TEXT NOT NULL DEFAULT '',
    description TEXT,
    notes       TEXT,
    picture     TEXT,
    locations   TEXT NOT NULL DEFAULT '[]', -- JSON array of Location
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contact_business_types (
    contact_id       TEXT NOT NULL REFERENCES contacts(contact_id),
    business_type_id TEXT NOT NULL REFERENCES business_types(business_type_id),
    PRIMARY KEY (contact_id, business_type_id)
);

CREATE TABLE IF NOT EXISTS contact_relationships (
    relationship_id TEXT PRIMARY KEY,
    from_contact    TEXT NOT NULL REFERENCES contacts(contact_id),
    to_contact      TEXT NOT NULL REFERENCES contacts(contact_id),
    UNIQUE (from_contact, to_contact)
);

CREATE TABLE IF NOT EXISTS contact_relationship_types (
    relationship_id      TEXT NOT NULL REFERENCES contact_relationships(relationship_id),
    relationship_type_id TEXT NOT NULL REFERENCES relationship_types(relationship_type_id),
    PRIMARY KEY (relationship_id, relationship_type_id)
);

-- ── Projects ────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS projects (
    project_id       TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    trac_environment TEXT,
    business_id      TEXT NOT NULL REFERENCES contacts(contact_id),
    point_person_id  TEXT NOT NULL REFERENCES users(user_id),
    kind             TEXT NOT NULL,       -- 'consultation' | 'software'
    status           TEXT NOT NULL,       -- 'requested' | 'accepted' | 'finished'
    description      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS project_relationships (
    relationship_id TEXT PRIMARY KEY,
    contact_id      TEXT NOT NULL REFERENCES contacts(contact_id),
    project_id      TEXT NOT NULL REFERENCES projects(project_id),
    UNIQUE (contact_id, project_id)
);

CREATE TABLE IF NOT EXISTS project_relationship_types (
    relationship_id      TEXT NOT NULL REFERENCES project_relationships(relationship_id),
    relationship_type_id TEXT NOT NULL REFERENCES relationship_types(relationship_type_id),
    PRIMARY KEY (relationship_id, relationship_type_id)
);

-- ── Interactions ────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS interactions (
    interaction_id TEXT PRIMARY KEY,
    date           TEXT NOT NULL,         -- fixed-width RFC 3339 UTC
    kind           TEXT NOT NULL,
    completed      INTEGER NOT NULL DEFAULT 0,
    project_id     TEXT REFERENCES projects(project_id),
    memo           TEXT NOT NULL DEFAULT '',
    cdr_id         TEXT
);

CREATE TABLE IF NOT EXISTS interaction_contacts (
    interaction_id TEXT NOT NULL REFERENCES interactions(interaction_id),
    contact_id     TEXT NOT NULL REFERENCES contacts(contact_id),
    PRIMARY KEY (interaction_id, contact_id)
);

-- ── Registrations ───────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS login_registrations (
    registration_id TEXT PRIMARY KEY,
    contact_id      TEXT NOT NULL REFERENCES contacts(contact_id),
    date            TEXT NOT NULL,
    activation_key  TEXT NOT NULL UNIQUE CHECK (length(activation_key) <= 40),
    activated       INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS registration_groups (
    registration_id TEXT NOT NULL REFERENCES login_registrations(registration_id),
    group_id        TEXT NOT NULL REFERENCES groups(group_id),
    PRIMARY KEY (registration_id, group_id)
);

CREATE INDEX IF NOT EXISTS contacts_sort_idx       ON contacts(sort_name);
CREATE INDEX IF NOT EXISTS projects_business_idx   ON projects(business_id);
CREATE INDEX IF NOT EXISTS interactions_date_idx   ON interactions(date);
CREATE INDEX IF NOT EXISTS registrations_contact_idx ON login_registrations(contact_id);

PRAGMA user_version = 1;
";
