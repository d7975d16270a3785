//! Reconciles local repository rows with the set visible to an account's
//! provider credential.

use chrono::Utc;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::github::CodeHost;
use crate::lifecycle;
use crate::store::Store;
use crate::types::Repository;

#[derive(Debug, Default)]
pub struct SyncReport {
    /// Repositories returned by the provider.
    pub seen: usize,
    /// New local rows created this pass.
    pub created: usize,
    /// Stale rows deactivated and deleted this pass.
    pub removed: usize,
}

/// One full synchronization pass for an account.
///
/// Every repository visible upstream is created locally or has its metadata
/// refreshed; rows whose modification timestamp still predates the start of
/// the pass are no longer visible upstream and are deactivated then deleted.
/// A provider failure aborts before anything is touched; the stale query only
/// ever sees rows this pass enumerated, so a partial failure never deletes
/// rows it did not process.
pub fn synchronize(
    store: &dyn Store,
    host: &dyn CodeHost,
    config: &ServerConfig,
    username: &str,
) -> Result<SyncReport> {
    let account = store
        .get_account_by_username(username)?
        .ok_or(Error::NotFound)?;
    let token = account
        .access_token
        .clone()
        .ok_or_else(|| Error::CredentialMissing {
            username: account.username.clone(),
            provider: account.provider.clone(),
        })?;

    let prior = Utc::now();
    let upstream = host.list_repos(&token)?;
    info!(
        "Synchronizing {} repositories for {}",
        upstream.len(),
        account.username
    );

    let mut report = SyncReport {
        seen: upstream.len(),
        ..SyncReport::default()
    };

    for hosted in &upstream {
        match store.get_repository_by_github_id(&config.site, &account.id, hosted.id)? {
            Some(mut existing) => {
                debug!("Updating repository: {}", hosted.name);
                if existing.name != hosted.name || existing.fork != hosted.fork {
                    existing.name = hosted.name.clone();
                    existing.fork = hosted.fork;
                    existing.modified = Utc::now();
                    store.update_repository(&existing)?;
                } else {
                    store.touch_repository(&existing.id)?;
                }
            }
            None => {
                debug!("Creating repository: {}", hosted.name);
                let repo = Repository::new(
                    &config.site,
                    &account.id,
                    hosted.id,
                    &hosted.name,
                    hosted.fork,
                );
                store.create_repository(&repo)?;
                report.created += 1;
            }
        }
    }

    for mut stale in store.list_stale_repositories(&config.site, &account.id, prior)? {
        info!("Removing stale repository: {}", stale.name);
        lifecycle::deactivate(store, host, &mut stale)?;
        store.delete_repository(&stale.id)?;
        report.removed += 1;
    }

    Ok(report)
}
