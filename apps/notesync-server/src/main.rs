use std::net::SocketAddr;

use anyhow::Context;
use tracing::{error, info};

mod access_log;
mod api;
mod app_state;
mod auth;
mod config;
mod responses;
mod router;
mod security;

pub(crate) use app_state::AppState;

#[tokio::main]
async fn main() {
    let cfg = match config::ServerConfig::load() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    };
    notesync_otel::init_with_filter(cfg.logging.filter.as_deref());
    match &cfg.source {
        Some(path) => info!(path = %path.display(), "loaded server config"),
        None => info!("no config file discovered; using built-in defaults"),
    }

    if let Err(err) = run(cfg).await {
        error!("notesync-server failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cfg: config::ServerConfig) -> anyhow::Result<()> {
    let addr = cfg.addr()?;
    let kernel = notesync_kernel::Kernel::open(&cfg.storage.state_dir)
        .context("open note store")?;
    let app = router::build(AppState::new(kernel, cfg));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "notesync-server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("http server exited with error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                error!(%err, "failed to install SIGTERM handler; ctrl-c only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::router::paths;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine};
    use http_body_util::BodyExt;
    use notesync_kernel::Kernel;
    use serde_json::{json, Value};
    use std::path::Path;
    use tempfile::tempdir;
    use tower::util::ServiceExt;

    const NOTE_A: &str = "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa";
    const CONTENT_1: &str = "11111111-1111-4111-8111-111111111111";

    fn build_app(dir: &Path) -> (Router, Kernel) {
        let kernel = Kernel::open(dir).expect("init kernel for tests");
        kernel.create_user("ann", "pw").expect("seed user");
        let mut cfg = config::ServerConfig::default();
        cfg.storage.state_dir = dir.to_path_buf();
        cfg.http.body_limit_kb = 1;
        (router::build(AppState::new(kernel.clone(), cfg)), kernel)
    }

    fn basic(user: &str, pw: &str) -> String {
        format!("Basic {}", BASE64_STD.encode(format!("{user}:{pw}")))
    }

    fn push(auth: Option<String>, body: impl Into<Body>) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri(paths::NOTES)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            req = req.header(header::AUTHORIZATION, auth);
        }
        req.body(body.into()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn batch() -> Value {
        json!({
            "notes": [{"note_id": NOTE_A, "title": "t", "deleted": false, "date_modified": 1_500_000_000}],
            "note_contents": [{"note_content_id": CONTENT_1, "note": NOTE_A, "data": "hi", "date_created": 1_500_000_001}],
        })
    }

    #[tokio::test]
    async fn healthz_reports_ok_with_security_headers() {
        let dir = tempdir().unwrap();
        let (app, _) = build_app(dir.path());
        let res = app
            .oneshot(Request::get(paths::HEALTHZ).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-content-type-options"], "nosniff");
        assert_eq!(res.headers()["x-frame-options"], "DENY");
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(serde_json::from_slice::<Value>(&bytes).unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn push_full_success_returns_empty_object() {
        let dir = tempdir().unwrap();
        let (app, kernel) = build_app(dir.path());
        let (status, body) = send(&app, push(Some(basic("ann", "pw")), batch().to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
        let user_id = kernel.list_users().unwrap()[0].user_id;
        assert_eq!(kernel.list_note_contents_after(user_id, None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn push_partial_returns_accepted_with_failures() {
        let dir = tempdir().unwrap();
        let (app, _) = build_app(dir.path());
        let (status, _) = send(&app, push(Some(basic("ann", "pw")), batch().to_string())).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, push(Some(basic("ann", "pw")), batch().to_string())).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(
            body,
            json!({"note_contents": [{"note_content_id_errors": 32, "note_content_id": CONTENT_1}]})
        );
    }

    #[tokio::test]
    async fn push_auth_failures_are_unauthorized() {
        let dir = tempdir().unwrap();
        let (app, _) = build_app(dir.path());

        let (status, body) = send(&app, push(None, batch().to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"username_errors": 11}));

        let (status, body) = send(&app, push(Some(basic("ann", "nope")), batch().to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"password_errors": 42}));

        let (status, body) = send(&app, push(Some(basic("bob", "pw")), batch().to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"username_errors": 44}));
    }

    #[tokio::test]
    async fn json_auth_header_is_accepted() {
        let dir = tempdir().unwrap();
        let (app, _) = build_app(dir.path());
        let req = Request::post(paths::NOTES)
            .header(auth::AUTH_HEADER, r#"{"username":"ann","password":"pw"}"#)
            .body(Body::from(json!({"notes": [], "note_contents": []}).to_string()))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn malformed_batches_are_bad_requests() {
        let dir = tempdir().unwrap();
        let (app, _) = build_app(dir.path());

        let (status, body) =
            send(&app, push(Some(basic("ann", "pw")), json!({"notes": {}}).to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"notes_errors": 12, "note_contents_errors": 11}));

        let (status, body) = send(&app, push(Some(basic("ann", "pw")), "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], json!(400));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let dir = tempdir().unwrap();
        let (app, _) = build_app(dir.path());
        let big = json!({"notes": [], "note_contents": [], "pad": "x".repeat(4096)}).to_string();
        let res = app
            .oneshot(push(Some(basic("ann", "pw")), big))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn pull_returns_own_rows_in_push_shape() {
        let dir = tempdir().unwrap();
        let (app, _) = build_app(dir.path());
        send(&app, push(Some(basic("ann", "pw")), batch().to_string())).await;

        let req = Request::get(format!("{}?after=1400000000", paths::NOTES))
            .header(header::AUTHORIZATION, basic("ann", "pw"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "notes": [{"note_id": NOTE_A, "title": "t", "deleted": false, "date_modified": 1_500_000_000}],
                "note_contents": [{"note_content_id": CONTENT_1, "note": NOTE_A, "data": "hi", "date_created": 1_500_000_001}],
            })
        );

        let req = Request::get(format!("{}?after=1500000001", paths::NOTES))
            .header(header::AUTHORIZATION, basic("ann", "pw"))
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(&app, req).await;
        assert_eq!(body, json!({"notes": [], "note_contents": []}));

        let req = Request::get(paths::NOTES).body(Body::empty()).unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
