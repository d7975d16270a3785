use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("no {provider} credential linked to account '{username}'")]
    CredentialMissing { username: String, provider: String },

    #[error("repository '{0}' not found upstream")]
    UpstreamNotFound(String),

    #[error("webhook operation failed: {0}")]
    WebhookOperation(String),

    #[error("transition '{transition}' not allowed from state '{from}'")]
    InvalidTransition {
        transition: &'static str,
        from: &'static str,
    },

    #[error("path '{0}' escapes the checkout")]
    PathTraversal(String),

    #[error("renderer exited with {0}")]
    RendererFailed(String),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_yaml::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("provider api error: {0}")]
    Provider(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
