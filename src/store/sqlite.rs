use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        provider: row.get(2)?,
        access_token: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<Repository> {
    let state: String = row.get(5)?;
    Ok(Repository {
        id: row.get(0)?,
        site: row.get(1)?,
        account_id: row.get(2)?,
        github_id: row.get(3)?,
        name: row.get(4)?,
        state: RepoState::parse(&state).unwrap_or_else(|| {
            tracing::error!("Invalid repository state in database: '{}'", state);
            RepoState::Inactive
        }),
        hook_id: row.get(6)?,
        secret: row.get(7)?,
        fork: row.get(8)?,
        modified: parse_datetime(&row.get::<_, String>(9)?),
        created_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

fn presentation_from_row(row: &Row<'_>) -> rusqlite::Result<Presentation> {
    Ok(Presentation {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        name: row.get(2)?,
        path: row.get(3)?,
        modified: parse_datetime(&row.get::<_, String>(4)?),
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

const REPOSITORY_COLUMNS: &str =
    "id, site, account_id, github_id, name, state, hook_id, secret, fork, modified, created_at";

const PRESENTATION_COLUMNS: &str = "id, repository_id, name, path, modified, created_at";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Account operations

    fn create_account(&self, account: &Account) -> Result<()> {
        self.conn().execute(
            "INSERT INTO accounts (id, username, provider, access_token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.id,
                account.username,
                account.provider,
                account.access_token,
                format_datetime(&account.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_account(&self, id: &str) -> Result<Option<Account>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, provider, access_token, created_at FROM accounts WHERE id = ?1",
            params![id],
            account_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, provider, access_token, created_at
             FROM accounts WHERE username = ?1",
            params![username],
            account_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, username, provider, access_token, created_at
             FROM accounts ORDER BY username",
        )?;

        let rows = stmt.query_map([], account_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_account(&self, account: &Account) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE accounts SET provider = ?1, access_token = ?2 WHERE id = ?3",
            params![account.provider, account.access_token, account.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Repository operations

    fn create_repository(&self, repo: &Repository) -> Result<()> {
        self.conn().execute(
            "INSERT INTO repositories
             (id, site, account_id, github_id, name, state, hook_id, secret, fork, modified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                repo.id,
                repo.site,
                repo.account_id,
                repo.github_id,
                repo.name,
                repo.state.as_str(),
                repo.hook_id,
                repo.secret,
                repo.fork,
                format_datetime(&repo.modified),
                format_datetime(&repo.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_repository(&self, id: &str) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE id = ?1"),
            params![id],
            repository_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_repository_by_github_id(
        &self,
        site: &str,
        account_id: &str,
        github_id: i64,
    ) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {REPOSITORY_COLUMNS} FROM repositories
                 WHERE site = ?1 AND account_id = ?2 AND github_id = ?3"
            ),
            params![site, account_id, github_id],
            repository_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_repository_by_route(&self, username: &str, name: &str) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT r.id, r.site, r.account_id, r.github_id, r.name, r.state, r.hook_id,
                    r.secret, r.fork, r.modified, r.created_at
             FROM repositories r
             JOIN accounts a ON a.id = r.account_id
             WHERE a.username = ?1 AND r.name = ?2",
            params![username, name],
            repository_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_repositories(&self, site: &str, account_id: &str) -> Result<Vec<Repository>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories
             WHERE site = ?1 AND account_id = ?2 ORDER BY name"
        ))?;

        let rows = stmt.query_map(params![site, account_id], repository_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_repository(&self, repo: &Repository) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE repositories
             SET name = ?1, state = ?2, hook_id = ?3, fork = ?4, modified = ?5
             WHERE id = ?6",
            params![
                repo.name,
                repo.state.as_str(),
                repo.hook_id,
                repo.fork,
                format_datetime(&repo.modified),
                repo.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn touch_repository(&self, id: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE repositories SET modified = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn set_repository_hook(&self, id: &str, state: RepoState, hook_id: Option<i64>) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE repositories SET state = ?1, hook_id = ?2, modified = ?3 WHERE id = ?4",
            params![state.as_str(), hook_id, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn list_stale_repositories(
        &self,
        site: &str,
        account_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Vec<Repository>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories
             WHERE site = ?1 AND account_id = ?2 AND modified < ?3 ORDER BY name"
        ))?;

        let rows = stmt.query_map(
            params![site, account_id, format_datetime(&before)],
            repository_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_repository(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM repositories WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Presentation operations

    fn create_presentation(&self, presentation: &Presentation) -> Result<()> {
        self.conn().execute(
            "INSERT INTO presentations (id, repository_id, name, path, modified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                presentation.id,
                presentation.repository_id,
                presentation.name,
                presentation.path,
                format_datetime(&presentation.modified),
                format_datetime(&presentation.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_presentation(&self, repository_id: &str, name: &str) -> Result<Option<Presentation>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {PRESENTATION_COLUMNS} FROM presentations
                 WHERE repository_id = ?1 AND name = ?2"
            ),
            params![repository_id, name],
            presentation_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_presentation_by_route(
        &self,
        username: &str,
        repository: &str,
        name: &str,
    ) -> Result<Option<Presentation>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT p.id, p.repository_id, p.name, p.path, p.modified, p.created_at
             FROM presentations p
             JOIN repositories r ON r.id = p.repository_id
             JOIN accounts a ON a.id = r.account_id
             WHERE a.username = ?1 AND r.name = ?2 AND p.name = ?3",
            params![username, repository, name],
            presentation_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_presentations(&self, repository_id: &str) -> Result<Vec<Presentation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRESENTATION_COLUMNS} FROM presentations
             WHERE repository_id = ?1 ORDER BY name"
        ))?;

        let rows = stmt.query_map(params![repository_id], presentation_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_account_presentations(&self, account_id: &str) -> Result<Vec<Presentation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.repository_id, p.name, p.path, p.modified, p.created_at
             FROM presentations p
             JOIN repositories r ON r.id = p.repository_id
             WHERE r.account_id = ?1 ORDER BY r.name, p.name",
        )?;

        let rows = stmt.query_map(params![account_id], presentation_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_presentation(&self, id: &str, path: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE presentations SET path = ?1, modified = ?2 WHERE id = ?3",
            params![path, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn list_stale_presentations(
        &self,
        repository_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Vec<Presentation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRESENTATION_COLUMNS} FROM presentations
             WHERE repository_id = ?1 AND modified < ?2 ORDER BY name"
        ))?;

        let rows = stmt.query_map(
            params![repository_id, format_datetime(&before)],
            presentation_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_presentation(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM presentations WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let store = SqliteStore::new(dir.path().join("test.db")).expect("open store");
        store.initialize().expect("initialize");
        (dir, store)
    }

    fn seed_account(store: &SqliteStore) -> Account {
        let account = Account::new("alice", Some("token".to_string()));
        store.create_account(&account).expect("create account");
        account
    }

    #[test]
    fn test_account_roundtrip() {
        let (_dir, store) = open_store();
        let account = seed_account(&store);

        let loaded = store
            .get_account_by_username("alice")
            .expect("get")
            .expect("exists");
        assert_eq!(loaded.id, account.id);
        assert_eq!(loaded.access_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_repository_lookup_by_github_id_and_route() {
        let (_dir, store) = open_store();
        let account = seed_account(&store);

        let repo = Repository::new("example.org", &account.id, 99, "slides", false);
        store.create_repository(&repo).expect("create repo");

        let by_gh = store
            .get_repository_by_github_id("example.org", &account.id, 99)
            .expect("get")
            .expect("exists");
        assert_eq!(by_gh.id, repo.id);

        let by_route = store
            .get_repository_by_route("alice", "slides")
            .expect("get")
            .expect("exists");
        assert_eq!(by_route.id, repo.id);
        assert_eq!(by_route.secret, repo.secret);

        assert!(
            store
                .get_repository_by_route("bob", "slides")
                .expect("get")
                .is_none()
        );
    }

    #[test]
    fn test_touch_moves_repository_out_of_stale_set() {
        let (_dir, store) = open_store();
        let account = seed_account(&store);

        let mut repo = Repository::new("example.org", &account.id, 1, "old", false);
        repo.modified = Utc::now() - chrono::Duration::hours(1);
        store.create_repository(&repo).expect("create repo");

        let cutoff = Utc::now();
        let stale = store
            .list_stale_repositories("example.org", &account.id, cutoff)
            .expect("stale");
        assert_eq!(stale.len(), 1);

        store.touch_repository(&repo.id).expect("touch");
        let stale = store
            .list_stale_repositories("example.org", &account.id, cutoff)
            .expect("stale");
        assert!(stale.is_empty());
    }

    #[test]
    fn test_presentation_stale_listing_and_route() {
        let (_dir, store) = open_store();
        let account = seed_account(&store);
        let repo = Repository::new("example.org", &account.id, 2, "talks", false);
        store.create_repository(&repo).expect("create repo");

        let mut old = Presentation::new(&repo.id, "stale", "stale.rst");
        old.modified = Utc::now() - chrono::Duration::hours(1);
        store.create_presentation(&old).expect("create");

        let fresh = Presentation::new(&repo.id, "fresh", "fresh.rst");
        store.create_presentation(&fresh).expect("create");

        let stale = store
            .list_stale_presentations(&repo.id, Utc::now() - chrono::Duration::minutes(30))
            .expect("stale");
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].name, "stale");

        let by_route = store
            .get_presentation_by_route("alice", "talks", "fresh")
            .expect("get")
            .expect("exists");
        assert_eq!(by_route.id, fresh.id);
    }

    #[test]
    fn test_update_presentation_refreshes_modified() {
        let (_dir, store) = open_store();
        let account = seed_account(&store);
        let repo = Repository::new("example.org", &account.id, 3, "deck", false);
        store.create_repository(&repo).expect("create repo");

        let mut pres = Presentation::new(&repo.id, "talk", "talk.rst");
        pres.modified = Utc::now() - chrono::Duration::hours(1);
        store.create_presentation(&pres).expect("create");

        store
            .update_presentation(&pres.id, "other.rst")
            .expect("update");

        let loaded = store
            .get_presentation(&repo.id, "talk")
            .expect("get")
            .expect("exists");
        assert_eq!(loaded.path, "other.rst");
        assert!(loaded.modified > pres.modified);
    }

    #[test]
    fn test_set_repository_hook() {
        let (_dir, store) = open_store();
        let account = seed_account(&store);
        let repo = Repository::new("example.org", &account.id, 4, "hooked", false);
        store.create_repository(&repo).expect("create repo");

        store
            .set_repository_hook(&repo.id, RepoState::Active, Some(77))
            .expect("set hook");
        let loaded = store.get_repository(&repo.id).expect("get").expect("exists");
        assert_eq!(loaded.state, RepoState::Active);
        assert_eq!(loaded.hook_id, Some(77));

        store
            .set_repository_hook(&repo.id, RepoState::Inactive, None)
            .expect("clear hook");
        let loaded = store.get_repository(&repo.id).expect("get").expect("exists");
        assert_eq!(loaded.state, RepoState::Inactive);
        assert_eq!(loaded.hook_id, None);
    }

    #[test]
    fn test_deleting_repository_cascades_presentations() {
        let (_dir, store) = open_store();
        let account = seed_account(&store);
        let repo = Repository::new("example.org", &account.id, 5, "gone", false);
        store.create_repository(&repo).expect("create repo");
        store
            .create_presentation(&Presentation::new(&repo.id, "talk", "talk.rst"))
            .expect("create");

        assert!(store.delete_repository(&repo.id).expect("delete"));
        assert!(
            store
                .get_presentation(&repo.id, "talk")
                .expect("get")
                .is_none()
        );
    }
}
