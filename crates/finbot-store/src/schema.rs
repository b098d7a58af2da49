//! SQLite schema and indexes
//!
//! All identifiers are UUIDs stored as TEXT. Money columns are TEXT
//! holding decimal strings so no precision is lost. Timestamps are
//! RFC3339 TEXT, dates are `YYYY-MM-DD` TEXT.

/// Full schema, applied on open. Every statement is idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    display_name  TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    password_salt TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(id),
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS teams (
    id               TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    owner_id         TEXT NOT NULL REFERENCES users(id),
    default_currency TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS team_members (
    team_id   TEXT NOT NULL REFERENCES teams(id),
    user_id   TEXT NOT NULL REFERENCES users(id),
    role      TEXT NOT NULL,
    joined_at TEXT NOT NULL,
    PRIMARY KEY (team_id, user_id)
);

CREATE TABLE IF NOT EXISTS accounts (
    id              TEXT PRIMARY KEY,
    team_id         TEXT NOT NULL REFERENCES teams(id),
    name            TEXT NOT NULL,
    kind            TEXT NOT NULL,
    currency        TEXT NOT NULL,
    opening_balance TEXT NOT NULL,
    archived        INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id           TEXT PRIMARY KEY,
    team_id      TEXT NOT NULL REFERENCES teams(id),
    account_id   TEXT NOT NULL REFERENCES accounts(id),
    entry_type   TEXT NOT NULL,
    amount       TEXT NOT NULL,
    currency     TEXT NOT NULL,
    category     TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    counterparty TEXT,
    date         TEXT NOT NULL,
    due_date     TEXT,
    settled_at   TEXT,
    recurring_id TEXT REFERENCES recurring_transactions(id),
    deleted      INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cashboxes (
    id         TEXT PRIMARY KEY,
    team_id    TEXT NOT NULL REFERENCES teams(id),
    name       TEXT NOT NULL,
    currency   TEXT NOT NULL,
    balance    TEXT NOT NULL,
    archived   INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cashbox_entries (
    id             TEXT PRIMARY KEY,
    cashbox_id     TEXT NOT NULL REFERENCES cashboxes(id),
    entry_type     TEXT NOT NULL,
    amount         TEXT NOT NULL,
    balance_after  TEXT NOT NULL,
    note           TEXT,
    counterpart_id TEXT,
    created_by     TEXT NOT NULL REFERENCES users(id),
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id         TEXT PRIMARY KEY,
    team_id    TEXT NOT NULL REFERENCES teams(id),
    actor_id   TEXT NOT NULL REFERENCES users(id),
    action     TEXT NOT NULL,
    entity     TEXT NOT NULL,
    entity_id  TEXT NOT NULL,
    details    TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS recurring_transactions (
    id             TEXT PRIMARY KEY,
    team_id        TEXT NOT NULL REFERENCES teams(id),
    account_id     TEXT NOT NULL REFERENCES accounts(id),
    name           TEXT NOT NULL,
    amount         TEXT NOT NULL,
    entry_type     TEXT NOT NULL,
    category       TEXT NOT NULL,
    interval_unit  TEXT NOT NULL,
    interval_count INTEGER NOT NULL DEFAULT 1,
    next_due       TEXT NOT NULL,
    end_date       TEXT,
    active         INTEGER NOT NULL DEFAULT 1,
    last_run       TEXT,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS credits (
    id               TEXT PRIMARY KEY,
    team_id          TEXT NOT NULL REFERENCES teams(id),
    name             TEXT NOT NULL,
    principal        TEXT NOT NULL,
    balance          TEXT NOT NULL,
    annual_rate_bps  INTEGER NOT NULL,
    installment      TEXT NOT NULL,
    start_date       TEXT NOT NULL,
    term_months      INTEGER NOT NULL,
    next_payment_due TEXT NOT NULL,
    closed           INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS credit_payments (
    id             TEXT PRIMARY KEY,
    credit_id      TEXT NOT NULL REFERENCES credits(id),
    amount         TEXT NOT NULL,
    principal_part TEXT NOT NULL,
    interest_part  TEXT NOT NULL,
    paid_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS investments (
    id            TEXT PRIMARY KEY,
    team_id       TEXT NOT NULL REFERENCES teams(id),
    name          TEXT NOT NULL,
    kind          TEXT NOT NULL,
    units         TEXT NOT NULL,
    unit_cost     TEXT NOT NULL,
    current_price TEXT NOT NULL,
    currency      TEXT NOT NULL,
    purchased_at  TEXT NOT NULL,
    archived      INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS forecasts (
    id             TEXT PRIMARY KEY,
    team_id        TEXT NOT NULL REFERENCES teams(id),
    name           TEXT NOT NULL,
    horizon_months INTEGER NOT NULL,
    iterations     INTEGER NOT NULL,
    params         TEXT NOT NULL,
    result         TEXT NOT NULL,
    created_at     TEXT NOT NULL
);
"#;

/// Secondary indexes for the hot query paths
pub const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_team_members_user ON team_members(user_id);
CREATE INDEX IF NOT EXISTS idx_accounts_team ON accounts(team_id);
CREATE INDEX IF NOT EXISTS idx_transactions_team_date ON transactions(team_id, date);
CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id);
CREATE INDEX IF NOT EXISTS idx_transactions_due ON transactions(team_id, due_date)
    WHERE due_date IS NOT NULL AND settled_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_cashboxes_team ON cashboxes(team_id);
CREATE INDEX IF NOT EXISTS idx_cashbox_entries_box ON cashbox_entries(cashbox_id, created_at);
CREATE INDEX IF NOT EXISTS idx_audit_team ON audit_logs(team_id, created_at);
CREATE INDEX IF NOT EXISTS idx_recurring_team ON recurring_transactions(team_id);
CREATE INDEX IF NOT EXISTS idx_recurring_due ON recurring_transactions(next_due)
    WHERE active = 1;
CREATE INDEX IF NOT EXISTS idx_credits_team ON credits(team_id);
CREATE INDEX IF NOT EXISTS idx_credit_payments_credit ON credit_payments(credit_id);
CREATE INDEX IF NOT EXISTS idx_investments_team ON investments(team_id);
CREATE INDEX IF NOT EXISTS idx_forecasts_team ON forecasts(team_id, created_at);
"#;
