//! Serves staged presentation output by path.

use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::server::AppState;

/// `GET /{username}/{repository}/{presentation}` — presentation index page.
pub async fn download_index(
    State(state): State<Arc<AppState>>,
    Path((username, repository, presentation)): Path<(String, String, String)>,
) -> Response {
    serve(&state, &username, &repository, &presentation, None).await
}

/// `GET /{username}/{repository}/{presentation}/{*path}`
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((username, repository, presentation, path)): Path<(String, String, String, String)>,
) -> Response {
    serve(&state, &username, &repository, &presentation, Some(&path)).await
}

async fn serve(
    state: &AppState,
    username: &str,
    repository: &str,
    presentation: &str,
    sub_path: Option<&str>,
) -> Response {
    let record = match state
        .store
        .get_presentation_by_route(username, repository, presentation)
    {
        Ok(Some(record)) => record,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!("Presentation lookup failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let relative = match sub_path {
        None | Some("") => PathBuf::from("index.html"),
        Some(requested) => match sanitize_sub_path(requested) {
            Some(relative) => relative,
            None => {
                warn!(
                    "Rejected download path for {}/{}/{}: {}",
                    username,
                    repository,
                    presentation,
                    sub_path.unwrap_or_default()
                );
                return (StatusCode::BAD_REQUEST, "Invalid path").into_response();
            }
        },
    };

    let full = state
        .config
        .public_root()
        .join(&record.id)
        .join(&relative);

    let file = match tokio::fs::File::open(&full).await {
        Ok(file) => file,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };
    let size = match file.metadata().await {
        Ok(metadata) if metadata.is_file() => metadata.len(),
        _ => return StatusCode::NOT_FOUND.into_response(),
    };

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type(&relative))
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CACHE_CONTROL,
            state.config.download_cache.header_value(),
        )
        .header("X-Content-Type-Options", "nosniff")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Keeps the requested sub-path inside the presentation's namespace: only
/// plain relative segments survive; `..`, root, and prefix components do not.
fn sanitize_sub_path(requested: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in FsPath::new(requested).components() {
        match component {
            Component::Normal(segment) => clean.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        return None;
    }
    Some(clean)
}

fn content_type(path: &FsPath) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
    {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "txt" | "rst" => "text/plain; charset=utf-8",
        "pdf" => "application/pdf",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_accepts_nested_paths() {
        assert_eq!(
            sanitize_sub_path("img/a.png"),
            Some(PathBuf::from("img/a.png"))
        );
        assert_eq!(
            sanitize_sub_path("./css/style.css"),
            Some(PathBuf::from("css/style.css"))
        );
    }

    #[test]
    fn test_sanitize_rejects_traversal() {
        assert_eq!(sanitize_sub_path("../secret"), None);
        assert_eq!(sanitize_sub_path("a/../../b"), None);
        assert_eq!(sanitize_sub_path("/etc/passwd"), None);
        assert_eq!(sanitize_sub_path("."), None);
    }

    #[test]
    fn test_content_type_guess() {
        assert_eq!(
            content_type(FsPath::new("index.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(content_type(FsPath::new("img/a.png")), "image/png");
        assert_eq!(
            content_type(FsPath::new("blob.bin")),
            "application/octet-stream"
        );
    }
}
