use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SECRET_LENGTH: usize = 16;

/// Generates the per-repository shared secret used to sign webhook deliveries.
/// Created once when the repository row is first seen and never rotated.
#[must_use]
pub fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}

/// A local account holding the hosting-provider credential for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub provider: String,
    #[serde(skip)]
    pub access_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    #[must_use]
    pub fn new(username: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            provider: "github".to_string(),
            access_token,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle state of a mirrored repository. Two states only; the interesting
/// part is the webhook protocol wrapped around each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoState {
    Inactive,
    Active,
}

impl RepoState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inactive" => Some(Self::Inactive),
            "active" => Some(Self::Active),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub site: String,
    pub account_id: String,
    /// Provider-assigned numeric repository ID.
    pub github_id: i64,
    pub name: String,
    pub state: RepoState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_id: Option<i64>,
    #[serde(skip)]
    pub secret: String,
    pub fork: bool,
    pub modified: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Repository {
    /// A fresh, inactive repository row with a newly generated secret.
    #[must_use]
    pub fn new(site: &str, account_id: &str, github_id: i64, name: &str, fork: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            site: site.to_string(),
            account_id: account_id.to_string(),
            github_id,
            name: name.to_string(),
            state: RepoState::Inactive,
            hook_id: None,
            secret: generate_secret(),
            fork,
            modified: now,
            created_at: now,
        }
    }
}

/// One renderable document bundle declared by a repository's manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    pub id: String,
    pub repository_id: String,
    pub name: String,
    /// Source path relative to the repository checkout.
    pub path: String,
    pub modified: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Presentation {
    #[must_use]
    pub fn new(repository_id: &str, name: &str, path: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            repository_id: repository_id.to_string(),
            name: name.to_string(),
            path: path.to_string(),
            modified: now,
            created_at: now,
        }
    }
}
