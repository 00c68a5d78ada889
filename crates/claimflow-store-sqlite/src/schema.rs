//! SQL schema for the claimflow SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    email        TEXT,
    role         TEXT NOT NULL    -- 'admin' | 'user'
);

CREATE TABLE IF NOT EXISTS institutions (
    institution_id TEXT PRIMARY KEY,
    kind           TEXT NOT NULL, -- 'institution' | 'group'
    name           TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    -- Ownership; written once, by the transition into VERIFIED.
    claimed_by     TEXT REFERENCES users(user_id),
    claimed_at     TEXT,
    claim_id       TEXT
);

CREATE TABLE IF NOT EXISTS claims (
    claim_id            TEXT PRIMARY KEY,
    target_kind         TEXT NOT NULL,
    target_id           TEXT NOT NULL REFERENCES institutions(institution_id),
    requester_id        TEXT NOT NULL REFERENCES users(user_id),
    requester_name      TEXT NOT NULL,
    requester_email     TEXT NOT NULL,
    institutional_email TEXT,
    position            TEXT NOT NULL,
    comments            TEXT,
    evidence            TEXT NOT NULL DEFAULT '[]',  -- JSON array of URLs
    status              TEXT NOT NULL,
    admin_notes         TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    expires_at          TEXT NOT NULL,
    reviewed_by         TEXT,
    reviewed_at         TEXT
);

-- Audit entries are strictly append-only.
-- Rows only leave this table when their claim is deleted.
CREATE TABLE IF NOT EXISTS audit_entries (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id    TEXT NOT NULL UNIQUE,
    claim_id    TEXT NOT NULL REFERENCES claims(claim_id) ON DELETE CASCADE,
    at          TEXT NOT NULL,
    actor_id    TEXT NOT NULL,
    actor_name  TEXT NOT NULL,
    action      TEXT NOT NULL,
    from_status TEXT,
    to_status   TEXT,
    note        TEXT
);

CREATE TRIGGER IF NOT EXISTS audit_entries_append_only
BEFORE UPDATE ON audit_entries
BEGIN
    SELECT RAISE(ABORT, 'audit entries are append-only');
END;

CREATE TABLE IF NOT EXISTS messages (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id     TEXT NOT NULL UNIQUE,
    claim_id       TEXT NOT NULL REFERENCES claims(claim_id) ON DELETE CASCADE,
    sender_id      TEXT NOT NULL,
    sender_role    TEXT NOT NULL,
    body           TEXT NOT NULL,
    attachments    TEXT NOT NULL DEFAULT '[]',
    kind           TEXT NOT NULL,   -- 'CHAT' | 'DOCUMENT_REQUEST' | 'INTERNAL_NOTE'
    schema         TEXT,            -- JSON DataRequestSchema, DOCUMENT_REQUEST only
    submitted_data TEXT,            -- JSON object or NULL
    documents      TEXT NOT NULL DEFAULT '[]',
    created_at     TEXT NOT NULL,
    CHECK ((kind = 'DOCUMENT_REQUEST') = (schema IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS documents (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id  TEXT NOT NULL UNIQUE,
    claim_id     TEXT NOT NULL REFERENCES claims(claim_id) ON DELETE CASCADE,
    url          TEXT NOT NULL,
    kind         TEXT NOT NULL,     -- 'image' | 'pdf'
    name         TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'PENDING',
    admin_notes  TEXT,
    reviewed_by  TEXT,
    reviewed_at  TEXT,
    can_resubmit INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS claims_requester_idx ON claims(requester_id);
CREATE INDEX IF NOT EXISTS claims_target_idx    ON claims(target_kind, target_id);
CREATE INDEX IF NOT EXISTS claims_status_idx    ON claims(status);
CREATE INDEX IF NOT EXISTS audit_claim_idx      ON audit_entries(claim_id);
CREATE INDEX IF NOT EXISTS messages_claim_idx   ON messages(claim_id);
CREATE INDEX IF NOT EXISTS documents_claim_idx  ON documents(claim_id);

PRAGMA user_version = 1;
";
