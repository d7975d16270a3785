mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Account operations
    fn create_account(&self, account: &Account) -> Result<()>;
    fn get_account(&self, id: &str) -> Result<Option<Account>>;
    fn get_account_by_username(&self, username: &str) -> Result<Option<Account>>;
    fn list_accounts(&self) -> Result<Vec<Account>>;
    fn update_account(&self, account: &Account) -> Result<()>;

    // Repository operations
    fn create_repository(&self, repo: &Repository) -> Result<()>;
    fn get_repository(&self, id: &str) -> Result<Option<Repository>>;
    fn get_repository_by_github_id(
        &self,
        site: &str,
        account_id: &str,
        github_id: i64,
    ) -> Result<Option<Repository>>;
    /// Webhook and download routing: repository by name under a username.
    fn get_repository_by_route(&self, username: &str, name: &str) -> Result<Option<Repository>>;
    fn list_repositories(&self, site: &str, account_id: &str) -> Result<Vec<Repository>>;
    fn update_repository(&self, repo: &Repository) -> Result<()>;
    /// Refreshes the modification timestamp, marking the row as seen.
    fn touch_repository(&self, id: &str) -> Result<()>;
    fn set_repository_hook(&self, id: &str, state: RepoState, hook_id: Option<i64>) -> Result<()>;
    fn list_stale_repositories(
        &self,
        site: &str,
        account_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Vec<Repository>>;
    fn delete_repository(&self, id: &str) -> Result<bool>;

    // Presentation operations
    fn create_presentation(&self, presentation: &Presentation) -> Result<()>;
    fn get_presentation(&self, repository_id: &str, name: &str) -> Result<Option<Presentation>>;
    fn get_presentation_by_route(
        &self,
        username: &str,
        repository: &str,
        name: &str,
    ) -> Result<Option<Presentation>>;
    fn list_presentations(&self, repository_id: &str) -> Result<Vec<Presentation>>;
    fn list_account_presentations(&self, account_id: &str) -> Result<Vec<Presentation>>;
    /// Updates the source path and refreshes the modification timestamp.
    fn update_presentation(&self, id: &str, path: &str) -> Result<()>;
    fn list_stale_presentations(
        &self,
        repository_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Vec<Presentation>>;
    fn delete_presentation(&self, id: &str) -> Result<bool>;

    fn close(&self) -> Result<()>;
}
