//! SQL schema for the Rakshak SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- The three principal collections are disjoint; they share only the
-- authentication scheme.
CREATE TABLE IF NOT EXISTS requesters (
    requester_id  TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    phone         TEXT,
    role          TEXT NOT NULL DEFAULT 'user',    -- 'user' | 'admin'
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS organizations (
    organization_id TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    email           TEXT NOT NULL UNIQUE,
    status          TEXT NOT NULL DEFAULT 'active', -- 'active' | 'inactive'
    password_hash   TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS volunteers (
    volunteer_id      TEXT PRIMARY KEY,
    organization_id   TEXT NOT NULL REFERENCES organizations(organization_id),
    name              TEXT NOT NULL,
    email             TEXT NOT NULL UNIQUE,
    phone             TEXT,
    status            TEXT NOT NULL DEFAULT 'active',
    completed_rescues INTEGER NOT NULL DEFAULT 0,
    password_hash     TEXT NOT NULL,
    created_at        TEXT NOT NULL
);

-- Cases are never deleted. `ngo_id` and `volunteer_id` are weak references:
-- a removed volunteer stays recorded on the cases it worked.
CREATE TABLE IF NOT EXISTS cases (
    case_id        TEXT PRIMARY KEY,
    requester_id   TEXT NOT NULL REFERENCES requesters(requester_id),
    animal_type    TEXT NOT NULL,
    animal_details TEXT NOT NULL,               -- JSON
    location       TEXT NOT NULL,               -- JSON
    images         TEXT NOT NULL DEFAULT '[]',  -- JSON
    status         TEXT NOT NULL,
    emergency      INTEGER NOT NULL DEFAULT 0,
    ngo_id         TEXT,
    volunteer_id   TEXT,
    assigned_at    TEXT,
    contact_info   TEXT NOT NULL,               -- JSON
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    revision       INTEGER NOT NULL DEFAULT 0
);

-- Strictly append-only. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS timeline_entries (
    case_id   TEXT NOT NULL REFERENCES cases(case_id),
    seq       INTEGER NOT NULL,
    status    TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    notes     TEXT,
    PRIMARY KEY (case_id, seq)
);

-- Mirrors (volunteer_id, status) on cases; written in the same transaction
-- as the case update it follows.
CREATE TABLE IF NOT EXISTS volunteer_active_cases (
    volunteer_id TEXT NOT NULL REFERENCES volunteers(volunteer_id) ON DELETE CASCADE,
    case_id      TEXT NOT NULL REFERENCES cases(case_id),
    PRIMARY KEY (volunteer_id, case_id)
);

CREATE INDEX IF NOT EXISTS cases_requester_idx  ON cases(requester_id);
CREATE INDEX IF NOT EXISTS cases_ngo_idx        ON cases(ngo_id);
CREATE INDEX IF NOT EXISTS cases_volunteer_idx  ON cases(volunteer_id);
CREATE INDEX IF NOT EXISTS cases_created_idx    ON cases(created_at);
CREATE INDEX IF NOT EXISTS volunteers_org_idx   ON volunteers(organization_id);

PRAGMA user_version = 1;
";
