//! Signed webhook receiver.
//!
//! Deliveries carry an `X-Hub-Signature: sha1=<hex>` header: an HMAC-SHA1 of
//! the raw body keyed with the repository's stored secret. Verification uses
//! a constant-time comparison. `ping` records the hook ID from the payload;
//! `push` enqueues a build and returns immediately with a task handle.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha1::Sha1;
use tracing::{info, warn};

use crate::server::AppState;
use crate::worker::Job;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Deserialize)]
struct PingPayload {
    hook_id: i64,
}

/// Verifies a `sha1=<hex>` signature header against the payload and secret.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(hex_sig) = signature_header.strip_prefix("sha1=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };

    let Ok(mut mac) = HmacSha1::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);

    // Constant-time comparison via the HMAC library
    mac.verify_slice(&expected).is_ok()
}

/// Computes a signature header value for a payload. Test helper and
/// documentation of the expected format.
#[must_use]
pub fn sign(payload: &[u8], secret: &[u8]) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
}

fn reject(reason: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, reason).into_response()
}

pub async fn receive(
    State(state): State<Arc<AppState>>,
    Path((username, repository)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers.get("x-hub-signature").and_then(|v| v.to_str().ok()) else {
        return reject("No X-Hub-Signature header found");
    };
    let Some(event) = headers.get("x-github-event").and_then(|v| v.to_str().ok()) else {
        return reject("No X-GitHub-Event header found");
    };

    let repo = match state.store.get_repository_by_route(&username, &repository) {
        Ok(Some(repo)) => repo,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!("Webhook repository lookup failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !signature.starts_with("sha1=") {
        return reject("Invalid X-Hub-Signature digest mode found");
    }
    if !verify_signature(&body, signature, repo.secret.as_bytes()) {
        warn!(
            "Rejected webhook for {}/{}: bad signature",
            username, repository
        );
        return reject("Invalid X-Hub-Signature header found");
    }

    match event {
        "ping" => {
            let payload: PingPayload = match serde_json::from_slice(&body) {
                Ok(payload) => payload,
                Err(_) => return reject("Malformed ping payload"),
            };
            if let Err(e) =
                state
                    .store
                    .set_repository_hook(&repo.id, repo.state, Some(payload.hook_id))
            {
                warn!("Could not record hook id for {}: {}", repo.name, e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            info!("Ping for {}: hook {}", repo.name, payload.hook_id);
            axum::Json(json!({})).into_response()
        }
        "push" => {
            let task = state.queue.enqueue(Job::Build {
                repository_id: repo.id.clone(),
            });
            info!("Push for {}: enqueued build {}", repo.name, task);
            axum::Json(json!({
                "uuid": repo.id,
                "state": repo.state,
                "task": task,
            }))
            .into_response()
        }
        _ => reject("Invalid X-GitHub-Event header found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let payload = b"{\"hook_id\": 1}";
        let secret = b"0123456789abcdef";
        let header = sign(payload, secret);
        assert!(header.starts_with("sha1="));
        assert!(verify_signature(payload, &header, secret));
    }

    #[test]
    fn test_flipped_body_byte_rejected() {
        let secret = b"0123456789abcdef";
        let header = sign(b"payload", secret);
        assert!(!verify_signature(b"paYload", &header, secret));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = sign(b"payload", b"right-secret");
        assert!(!verify_signature(b"payload", &header, b"wrong-secret"));
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let secret = b"s";
        assert!(!verify_signature(b"x", "", secret));
        assert!(!verify_signature(b"x", "sha1=", secret));
        assert!(!verify_signature(b"x", "sha1=zzzz", secret));
        assert!(!verify_signature(b"x", "sha256=abcd", secret));
    }
}
