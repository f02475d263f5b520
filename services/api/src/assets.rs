use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

use crate::infra::ServiceState;

const INDEX_FILE: &str = "index.html";

/// Maps a request path onto a file under `root`, refusing anything that could
/// escape it.
pub(crate) fn resolve_asset(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    if relative.contains('\\') {
        return None;
    }

    let mut resolved = root.to_path_buf();
    let mut depth = 0;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(segment) => {
                resolved.push(segment);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if depth == 0 || relative.ends_with('/') {
        resolved.push(INDEX_FILE);
    }
    Some(resolved)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
}

pub(crate) async fn static_asset(State(state): State<ServiceState>, uri: Uri) -> Response {
    let Some(root) = state.static_dir.as_deref() else {
        return not_found();
    };

    let Some(path) = resolve_asset(root, uri.path()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid asset path" })),
        )
            .into_response();
    };

    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false);
    if !is_file {
        return not_found();
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.essence_str().to_string())],
                bytes,
            )
                .into_response()
        }
        Err(err) if err.kind() == ErrorKind::NotFound => not_found(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read static asset");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "asset unavailable" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_and_directories_map_to_index() {
        let root = Path::new("/srv/public");
        assert_eq!(resolve_asset(root, "/"), Some(root.join("index.html")));
        assert_eq!(resolve_asset(root, ""), Some(root.join("index.html")));
        assert_eq!(
            resolve_asset(root, "/docs/"),
            Some(root.join("docs").join("index.html"))
        );
        assert_eq!(
            resolve_asset(root, "/scripts/app.js"),
            Some(root.join("scripts").join("app.js"))
        );
    }

    #[test]
    fn traversal_is_rejected() {
        let root = Path::new("/srv/public");
        assert_eq!(resolve_asset(root, "/../secret.txt"), None);
        assert_eq!(resolve_asset(root, "/scripts/../../etc/passwd"), None);
        assert_eq!(resolve_asset(root, "/scripts\\..\\x"), None);
    }
}
