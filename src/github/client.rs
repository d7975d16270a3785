use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;

use super::{CodeHost, HookConfig, HostedRepo};
use crate::error::{Error, Result};

const USER_AGENT: &str = concat!("podium/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
struct RepoPayload {
    id: i64,
    name: String,
    clone_url: String,
    #[serde(default)]
    fork: bool,
}

impl From<RepoPayload> for HostedRepo {
    fn from(payload: RepoPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name,
            clone_url: payload.clone_url,
            fork: payload.fork,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HookPayload {
    id: i64,
}

/// GitHub REST v3 client. The API base URL is configurable so tests can point
/// at a local stub.
pub struct GithubHost {
    client: Client,
    base_url: String,
}

impl GithubHost {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(token)
    }
}

impl CodeHost for GithubHost {
    fn list_repos(&self, token: &str) -> Result<Vec<HostedRepo>> {
        let mut repos = Vec::new();
        let mut page = 1u32;

        loop {
            let url = format!(
                "{}/user/repos?per_page={}&page={}",
                self.base_url, PER_PAGE, page
            );
            let response = self
                .request(self.client.get(&url), token)
                .send()?
                .error_for_status()?;

            let batch: Vec<RepoPayload> = response.json()?;
            let done = (batch.len() as u32) < PER_PAGE;
            repos.extend(batch.into_iter().map(HostedRepo::from));

            if done {
                break;
            }
            page += 1;
        }

        Ok(repos)
    }

    fn get_repo(&self, token: &str, owner: &str, name: &str) -> Result<HostedRepo> {
        let url = format!("{}/repos/{}/{}", self.base_url, owner, name);
        let response = self.request(self.client.get(&url), token).send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::UpstreamNotFound(format!("{owner}/{name}")));
        }

        let payload: RepoPayload = response.error_for_status()?.json()?;
        Ok(payload.into())
    }

    fn create_hook(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        config: &HookConfig,
    ) -> Result<i64> {
        let url = format!("{}/repos/{}/{}/hooks", self.base_url, owner, name);
        let body = json!({
            "name": "web",
            "active": true,
            "events": ["push"],
            "config": {
                "url": config.url,
                "content_type": "json",
                "secret": config.secret,
            },
        });

        let response = self
            .request(self.client.post(&url), token)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::WebhookOperation(format!(
                "create hook for {owner}/{name} returned {status}"
            )));
        }

        let payload: HookPayload = response.json()?;
        Ok(payload.id)
    }

    fn delete_hook(&self, token: &str, owner: &str, name: &str, hook_id: i64) -> Result<()> {
        let url = format!("{}/repos/{}/{}/hooks/{}", self.base_url, owner, name, hook_id);
        let response = self.request(self.client.delete(&url), token).send()?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(Error::WebhookOperation(format!(
                "delete hook {hook_id} for {owner}/{name} returned {status}"
            )));
        }

        Ok(())
    }
}
