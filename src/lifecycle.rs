//! Repository lifecycle transitions.
//!
//! A two-node state machine (`inactive` <-> `active`) with a side-effecting
//! webhook protocol wrapped around each edge. Transitions are declared in an
//! explicit table; there is no runtime discovery of states or transitions.

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::github::{CodeHost, HookConfig};
use crate::store::Store;
use crate::types::{Account, RepoState, Repository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activate,
    Deactivate,
}

/// Every supported transition. Endpoints are declared statically from this
/// table rather than synthesized from model introspection.
pub const TRANSITIONS: &[Transition] = &[Transition::Activate, Transition::Deactivate];

impl Transition {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
        }
    }

    /// States this transition may start from.
    #[must_use]
    pub fn sources(&self) -> &'static [RepoState] {
        match self {
            Self::Activate => &[RepoState::Inactive],
            Self::Deactivate => &[RepoState::Inactive, RepoState::Active],
        }
    }

    #[must_use]
    pub fn target(&self) -> RepoState {
        match self {
            Self::Activate => RepoState::Active,
            Self::Deactivate => RepoState::Inactive,
        }
    }

    pub fn validate(&self, from: RepoState) -> Result<()> {
        if self.sources().contains(&from) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                transition: self.name(),
                from: from.as_str(),
            })
        }
    }
}

/// Outcome of the remote half of a deactivation. Local state is cleared in
/// every case; a remote failure is reported here instead of raised so callers
/// can decide whether divergence from the provider matters to them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookRemoval {
    Removed,
    NotRegistered,
    RemoteFailed(String),
}

fn credential(store: &dyn Store, repo: &Repository) -> Result<(Account, String)> {
    let account = store.get_account(&repo.account_id)?.ok_or(Error::NotFound)?;
    let token = account
        .access_token
        .clone()
        .ok_or_else(|| Error::CredentialMissing {
            username: account.username.clone(),
            provider: account.provider.clone(),
        })?;
    Ok((account, token))
}

/// Transition: inactive -> active.
///
/// Registers a push webhook on the provider and records the returned hook ID.
/// Any failure (missing credential, missing upstream repository, hook
/// registration) aborts without mutating `state` or `hook_id` and is returned
/// to the caller.
pub fn activate(
    store: &dyn Store,
    host: &dyn CodeHost,
    config: &ServerConfig,
    repo: &mut Repository,
) -> Result<()> {
    Transition::Activate.validate(repo.state)?;

    let (account, token) = credential(store, repo)?;
    host.get_repo(&token, &account.username, &repo.name)?;

    let hook_url = format!(
        "{}/webhook/{}/{}",
        config.external_url(),
        account.username,
        repo.name
    );
    let hook_id = host.create_hook(
        &token,
        &account.username,
        &repo.name,
        &HookConfig {
            url: hook_url,
            secret: repo.secret.clone(),
        },
    )?;

    repo.state = RepoState::Active;
    repo.hook_id = Some(hook_id);
    store.set_repository_hook(&repo.id, RepoState::Active, Some(hook_id))?;

    info!("Activated repository {} (hook {})", repo.name, hook_id);
    Ok(())
}

/// Transition: any state -> inactive.
///
/// Attempts to remove a registered webhook from the provider, then clears the
/// local hook ID and state regardless of the remote outcome. Idempotent: a
/// second call reports `NotRegistered` without error.
pub fn deactivate(
    store: &dyn Store,
    host: &dyn CodeHost,
    repo: &mut Repository,
) -> Result<HookRemoval> {
    Transition::Deactivate.validate(repo.state)?;

    let removal = match repo.hook_id {
        None => HookRemoval::NotRegistered,
        Some(hook_id) => match remove_remote_hook(store, host, repo, hook_id) {
            Ok(()) => HookRemoval::Removed,
            Err(e) => {
                warn!(
                    "Could not remove webhook {} for {}: {}",
                    hook_id, repo.name, e
                );
                HookRemoval::RemoteFailed(e.to_string())
            }
        },
    };

    repo.state = RepoState::Inactive;
    repo.hook_id = None;
    store.set_repository_hook(&repo.id, RepoState::Inactive, None)?;

    info!("Deactivated repository {}", repo.name);
    Ok(removal)
}

fn remove_remote_hook(
    store: &dyn Store,
    host: &dyn CodeHost,
    repo: &Repository,
    hook_id: i64,
) -> Result<()> {
    let (account, token) = credential(store, repo)?;
    host.delete_hook(&token, &account.username, &repo.name, hook_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::testing::FakeHost;

    fn setup() -> (tempfile::TempDir, SqliteStore, FakeHost, Repository) {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let store = SqliteStore::new(dir.path().join("test.db")).expect("open");
        store.initialize().expect("initialize");

        let account = Account::new("alice", Some("token".to_string()));
        store.create_account(&account).expect("create account");

        let repo = Repository::new("example.org", &account.id, 7, "slides", false);
        store.create_repository(&repo).expect("create repo");

        let host = FakeHost::new();
        host.add_repo(7, "slides", "file:///tmp/unused");

        (dir, store, host, repo)
    }

    #[test]
    fn test_transition_table() {
        assert!(Transition::Activate.validate(RepoState::Inactive).is_ok());
        assert!(Transition::Activate.validate(RepoState::Active).is_err());
        assert!(Transition::Deactivate.validate(RepoState::Active).is_ok());
        assert!(Transition::Deactivate.validate(RepoState::Inactive).is_ok());
        assert_eq!(TRANSITIONS.len(), 2);
    }

    #[test]
    fn test_activate_registers_hook() {
        let (_dir, store, host, mut repo) = setup();
        let config = ServerConfig::default();

        activate(&store, &host, &config, &mut repo).expect("activate");

        assert_eq!(repo.state, RepoState::Active);
        assert!(repo.hook_id.is_some());

        let stored = store.get_repository(&repo.id).expect("get").expect("exists");
        assert_eq!(stored.state, RepoState::Active);
        assert_eq!(stored.hook_id, repo.hook_id);

        let hooks = host.hooks();
        assert_eq!(hooks.len(), 1);
        assert!(hooks[0].url.ends_with("/webhook/alice/slides"));
        assert_eq!(hooks[0].secret, repo.secret);
    }

    #[test]
    fn test_activate_requires_credential() {
        let (_dir, store, host, mut repo) = setup();
        let config = ServerConfig::default();

        let mut account = store.get_account(&repo.account_id).unwrap().unwrap();
        account.access_token = None;
        store.update_account(&account).expect("update");

        let err = activate(&store, &host, &config, &mut repo).unwrap_err();
        assert!(matches!(err, Error::CredentialMissing { .. }));
        assert_eq!(repo.state, RepoState::Inactive);
        assert!(repo.hook_id.is_none());
    }

    #[test]
    fn test_activate_missing_upstream_aborts() {
        let (_dir, store, host, mut repo) = setup();
        let config = ServerConfig::default();
        host.clear_repos();

        let err = activate(&store, &host, &config, &mut repo).unwrap_err();
        assert!(matches!(err, Error::UpstreamNotFound(_)));
        assert_eq!(repo.state, RepoState::Inactive);
        assert!(repo.hook_id.is_none());
    }

    #[test]
    fn test_activate_hook_failure_leaves_state_untouched() {
        let (_dir, store, host, mut repo) = setup();
        let config = ServerConfig::default();
        host.fail_hook_create(true);

        let err = activate(&store, &host, &config, &mut repo).unwrap_err();
        assert!(matches!(err, Error::WebhookOperation(_)));

        let stored = store.get_repository(&repo.id).expect("get").expect("exists");
        assert_eq!(stored.state, RepoState::Inactive);
        assert!(stored.hook_id.is_none());
    }

    #[test]
    fn test_activate_twice_is_rejected() {
        let (_dir, store, host, mut repo) = setup();
        let config = ServerConfig::default();

        activate(&store, &host, &config, &mut repo).expect("activate");
        let err = activate(&store, &host, &config, &mut repo).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let (_dir, store, host, mut repo) = setup();
        let config = ServerConfig::default();

        activate(&store, &host, &config, &mut repo).expect("activate");
        let first = deactivate(&store, &host, &mut repo).expect("deactivate");
        assert_eq!(first, HookRemoval::Removed);
        assert_eq!(repo.state, RepoState::Inactive);
        assert!(repo.hook_id.is_none());
        assert!(host.hooks().is_empty());

        let second = deactivate(&store, &host, &mut repo).expect("deactivate again");
        assert_eq!(second, HookRemoval::NotRegistered);
        assert_eq!(repo.state, RepoState::Inactive);
    }

    #[test]
    fn test_deactivate_reports_remote_failure_but_clears_local_state() {
        let (_dir, store, host, mut repo) = setup();
        let config = ServerConfig::default();

        activate(&store, &host, &config, &mut repo).expect("activate");
        host.fail_hook_delete(true);

        let removal = deactivate(&store, &host, &mut repo).expect("deactivate");
        assert!(matches!(removal, HookRemoval::RemoteFailed(_)));

        let stored = store.get_repository(&repo.id).expect("get").expect("exists");
        assert_eq!(stored.state, RepoState::Inactive);
        assert!(stored.hook_id.is_none());
    }
}
