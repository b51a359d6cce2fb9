//! # Browser Delivery Server
//!
//! HTTP server for playing the rotation in a web browser. The browser asks for the
//! next item, plays it from the media endpoint, and asks again when it ends.
//!
//! ## Endpoints
//!
//! | Path | Description |
//! |------|-------------|
//! | `/` | Player page that drives the rotation |
//! | `/next` | Selects the next item, returns `{"path": "<collection>/<file>"}` |
//! | `/media/{*path}` | Streams a file from the base directory (Range requests supported) |
//! | `/health` | Liveness probe |
//!
//! Every `/next` request runs one selection under the selector lock, so
//! overlapping requests still observe the backoff rules in order.

use crate::selector::SharedSelector;
use anyhow::{Context, Result};
use axum::{
    extract::{Path as UrlPath, Request, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Default listen address for `serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[derive(Clone)]
struct AppState {
    selector: SharedSelector,
    base_dir: Arc<PathBuf>,
}

/// Body of a `/next` response.
#[derive(Debug, Serialize)]
struct NextItem {
    path: String,
}

/// Builds the application router.
///
/// # Errors
///
/// Returns an error if `base_dir` cannot be resolved.
pub fn router(selector: SharedSelector, base_dir: &Path) -> Result<Router> {
    let base_dir = base_dir
        .canonicalize()
        .with_context(|| format!("Media base directory {} not found", base_dir.display()))?;

    let state = AppState {
        selector,
        base_dir: Arc::new(base_dir),
    };

    Ok(Router::new()
        .route("/", get(player_page))
        .route("/next", get(next_item))
        .route("/media/{*path}", get(media))
        .route("/health", get(|| async { "OK" }))
        .with_state(state))
}

/// Serves `app` on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn player_page() -> Html<&'static str> {
    Html(PLAYER_PAGE)
}

async fn next_item(State(state): State<AppState>) -> Json<NextItem> {
    let selection = state.selector.select_next_detailed();
    info!(
        "Next: {} ({} attempt(s){})",
        selection.item.path,
        selection.attempts,
        if selection.fallback { ", fallback" } else { "" }
    );

    Json(NextItem {
        path: selection.item.path,
    })
}

async fn media(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
    request: Request,
) -> Response {
    let Some(file) = resolve_media_path(&state.base_dir, &path).await else {
        debug!("Rejected media request for '{path}'");
        return StatusCode::NOT_FOUND.into_response();
    };

    match ServeFile::new(file).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Resolves a request path to a regular file inside `base_dir`.
///
/// `base_dir` must already be canonical. Returns `None` for anything that does not
/// exist, escapes the base directory (including through symlinks), or is not a
/// regular file.
async fn resolve_media_path(base_dir: &Path, requested: &str) -> Option<PathBuf> {
    let resolved = tokio::fs::canonicalize(base_dir.join(requested)).await.ok()?;
    if !resolved.starts_with(base_dir) {
        warn!("Media request escapes base directory: '{requested}'");
        return None;
    }

    let metadata = tokio::fs::metadata(&resolved).await.ok()?;
    metadata.is_file().then_some(resolved)
}

const PLAYER_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>mediaspinner</title>
<style>
  html, body { margin: 0; height: 100%; background: #000; color: #ccc; font-family: sans-serif; }
  video { width: 100%; height: 100%; object-fit: contain; }
  #start { position: absolute; top: 50%; left: 50%; font-size: 2em;
           transform: translate(-50%, -50%); }
  #now { position: absolute; bottom: 0.5em; left: 0.5em; opacity: 0.6; }
</style>
</head>
<body>
<video id="player" playsinline></video>
<button id="start">Start</button>
<div id="now"></div>
<script>
  const player = document.getElementById("player");
  const now = document.getElementById("now");

  async function playNext() {
    try {
      const response = await fetch("/next", { cache: "no-store" });
      const item = await response.json();
      now.textContent = item.path;
      player.src = "/media/" + item.path.split("/").map(encodeURIComponent).join("/");
      await player.play();
    } catch (e) {
      console.error(e);
      setTimeout(playNext, 2000);
    }
  }

  player.addEventListener("ended", playNext);
  player.addEventListener("error", () => setTimeout(playNext, 1000));
  document.getElementById("start").addEventListener("click", (event) => {
    event.target.remove();
    playNext();
  });
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::CollectionIndex;
    use crate::config::PolicyConfig;
    use crate::selector::{HistoryCapacity, MediaSelector};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request as HttpRequest};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;
    use tempfile::TempDir;

    /// Layout: `<tmp>/secret.txt` outside the base, `<tmp>/media` as the base.
    fn setup() -> (TempDir, Router) {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("media");
        fs::create_dir_all(base.join("music")).unwrap();
        fs::create_dir_all(base.join("ads")).unwrap();
        fs::write(base.join("music/a.mp3"), b"track a").unwrap();
        fs::write(base.join("music/b.mp3"), b"track b").unwrap();
        fs::write(base.join("ads/x.mp3"), b"advert").unwrap();
        fs::write(temp_dir.path().join("secret.txt"), b"secret").unwrap();

        let index = CollectionIndex::from_dir(&base).unwrap();
        let policy = PolicyConfig::from_json(
            r#"{"same_item_backoff": 1,
                "collections": {"music": {"weight": 10}, "ads": {"backoff": 2}}}"#,
        )
        .unwrap();
        let selector = MediaSelector::with_rng(
            index,
            policy,
            HistoryCapacity::Dynamic,
            StdRng::seed_from_u64(3),
        )
        .unwrap();

        let app = router(SharedSelector::new(selector), &base).unwrap();
        (temp_dir, app)
    }

    async fn fetch(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_next_returns_member_path() {
        let (_temp_dir, app) = setup();

        for _ in 0..20 {
            let (status, body) = fetch(&app, "/next").await;
            assert_eq!(status, StatusCode::OK);

            let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
            let path = value["path"].as_str().unwrap();
            assert!(["music/a.mp3", "music/b.mp3", "ads/x.mp3"].contains(&path));
            assert!(value.get("collection").is_none());
        }
    }

    #[tokio::test]
    async fn test_media_streams_file() {
        let (_temp_dir, app) = setup();
        let (status, body) = fetch(&app, "/media/music/a.mp3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"track a");
    }

    #[tokio::test]
    async fn test_media_content_type() {
        let (_temp_dir, app) = setup();
        let response = app
            .oneshot(HttpRequest::builder().uri("/media/ads/x.mp3").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    }

    #[tokio::test]
    async fn test_media_range_request() {
        let (_temp_dir, app) = setup();
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/media/music/b.mp3")
                    .header(header::RANGE, "bytes=0-4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"track");
    }

    #[tokio::test]
    async fn test_media_rejects_traversal() {
        let (_temp_dir, app) = setup();
        let (status, _) = fetch(&app, "/media/../secret.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = fetch(&app, "/media/music/%2E%2E/%2E%2E/secret.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_media_rejects_directories_and_missing() {
        let (_temp_dir, app) = setup();
        let (status, _) = fetch(&app, "/media/music").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = fetch(&app, "/media/music/missing.mp3").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_and_page() {
        let (_temp_dir, app) = setup();
        let (status, body) = fetch(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");

        let (status, body) = fetch(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8_lossy(&body).contains("/next"));
    }

    #[tokio::test]
    async fn test_resolve_media_path() {
        let (temp_dir, _app) = setup();
        let base = temp_dir.path().join("media").canonicalize().unwrap();

        assert!(resolve_media_path(&base, "music/a.mp3").await.is_some());
        assert!(resolve_media_path(&base, "../secret.txt").await.is_none());
        assert!(resolve_media_path(&base, "ads").await.is_none());
        let absolute = temp_dir.path().join("secret.txt");
        assert!(resolve_media_path(&base, absolute.to_str().unwrap()).await.is_none());
    }
}
