mod client;

pub use client::GithubHost;

use crate::error::Result;

/// A repository as reported by the hosting provider.
#[derive(Debug, Clone)]
pub struct HostedRepo {
    pub id: i64,
    pub name: String,
    pub clone_url: String,
    pub fork: bool,
}

/// Payload for registering a push webhook on the provider.
#[derive(Debug, Clone)]
pub struct HookConfig {
    /// Endpoint the provider will POST events to.
    pub url: String,
    /// Shared secret used for the delivery signature.
    pub secret: String,
}

/// CodeHost defines the hosting-provider interface. Blocking: called from
/// worker context only.
pub trait CodeHost: Send + Sync {
    /// All repositories visible to the credential, across pages.
    fn list_repos(&self, token: &str) -> Result<Vec<HostedRepo>>;

    fn get_repo(&self, token: &str, owner: &str, name: &str) -> Result<HostedRepo>;

    /// Registers a push webhook and returns the provider-assigned hook ID.
    fn create_hook(&self, token: &str, owner: &str, name: &str, config: &HookConfig)
    -> Result<i64>;

    fn delete_hook(&self, token: &str, owner: &str, name: &str, hook_id: i64) -> Result<()>;
}
