use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::HookRemoval;
use crate::types::{Presentation, Repository};

#[derive(Debug, Deserialize)]
pub struct CreateSynchronizationRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct TaskRef {
    pub id: Uuid,
    pub state: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub repository: Repository,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_removal: Option<HookRemoval>,
}

/// A presentation together with the routing context needed to link to it.
#[derive(Debug, Serialize)]
pub struct PresentationView {
    #[serde(flatten)]
    pub presentation: Presentation,
    pub repository: String,
    pub fullname: String,
    pub url: String,
}

impl PresentationView {
    #[must_use]
    pub fn new(
        presentation: Presentation,
        username: &str,
        repository: &str,
        external_url: &str,
    ) -> Self {
        let fullname = format!("{}/{}", repository, presentation.name);
        let url = format!(
            "{}/{}/{}/{}/",
            external_url, username, repository, presentation.name
        );
        Self {
            presentation,
            repository: repository.to_string(),
            fullname,
            url,
        }
    }
}
