pub const SCHEMA: &str = r#"
-- Accounts hold the hosting-provider credential for a user
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    provider TEXT NOT NULL DEFAULT 'github',
    access_token TEXT,            -- NULL = credential not linked
    created_at TEXT DEFAULT (datetime('now'))
);

-- Mirrored repositories
CREATE TABLE IF NOT EXISTS repositories (
    id TEXT PRIMARY KEY,
    site TEXT NOT NULL,
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    github_id INTEGER NOT NULL,   -- provider-assigned numeric repository ID
    name TEXT NOT NULL,

    -- Lifecycle
    state TEXT NOT NULL DEFAULT 'inactive',  -- 'inactive' | 'active'
    hook_id INTEGER,              -- provider webhook ID, set only while active

    -- Webhook signing secret, generated once at creation
    secret TEXT NOT NULL,

    fork INTEGER NOT NULL DEFAULT 0,
    modified TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(site, account_id, github_id)
);

-- Presentations declared by a repository's manifest
CREATE TABLE IF NOT EXISTS presentations (
    id TEXT PRIMARY KEY,
    repository_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    path TEXT NOT NULL,           -- source path relative to the checkout
    modified TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(repository_id, name)
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_repositories_account ON repositories(site, account_id);
CREATE INDEX IF NOT EXISTS idx_repositories_name ON repositories(name);
CREATE INDEX IF NOT EXISTS idx_presentations_repository ON presentations(repository_id);
"#;
