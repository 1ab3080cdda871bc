use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use once_cell::sync::Lazy;
use sha2::Digest as _;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Clone, Debug)]
struct Cfg {
    enabled: bool,
    sample_n: u64,
    ua_hash: bool,
    trust_forward: bool,
}

static CFG: Lazy<Cfg> = Lazy::new(|| Cfg {
    enabled: std::env::var("NOTESYNC_ACCESS_LOG").ok().as_deref() == Some("1"),
    sample_n: std::env::var("NOTESYNC_ACCESS_SAMPLE_N")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
        .max(1),
    ua_hash: std::env::var("NOTESYNC_ACCESS_UA_HASH").ok().as_deref() == Some("1"),
    trust_forward: std::env::var("NOTESYNC_TRUST_FORWARD_HEADERS").ok().as_deref() == Some("1"),
});

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn forwarded_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let v = headers.get("x-forwarded-for")?.to_str().ok()?;
    let ip = v.split(',').next()?.trim();
    (!ip.is_empty()).then(|| ip.to_string())
}

/// Every `sample_n`-th request is logged; 0 and 1 log everything.
fn sampled(n: u64, sample_n: u64) -> bool {
    sample_n <= 1 || n % sample_n == 0
}

/// One line per request on the `http.access` target; usernames and bodies are never logged.
pub async fn access_log_mw(req: Request<axum::body::Body>, next: Next) -> Response {
    if !CFG.enabled {
        return next.run(req).await;
    }
    let started = Instant::now();
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let forwarded = CFG.trust_forward.then(|| forwarded_ip(req.headers())).flatten();
    let remote = forwarded.or_else(|| {
        req.extensions()
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map(|c| c.0.ip().to_string())
    });
    let ua_hash = CFG
        .ua_hash
        .then(|| {
            req.headers()
                .get(axum::http::header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(|ua| hex::encode(sha2::Sha256::digest(ua.as_bytes())))
        })
        .flatten();
    let res = next.run(req).await;
    let n = COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    if !sampled(n, CFG.sample_n) {
        return res;
    }
    tracing::info!(
        target: notesync_otel::ACCESS_TARGET,
        method = %method,
        path = %path,
        status = res.status().as_u16(),
        dur_ms = started.elapsed().as_millis() as u64,
        remote = remote.as_deref().unwrap_or("-"),
        ua_hash = ua_hash.as_deref().unwrap_or("-"),
        "request"
    );
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    fn headers(xff: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("x-forwarded-for", HeaderValue::from_str(xff).unwrap());
        h
    }

    #[test]
    fn forwarded_ip_takes_the_first_hop() {
        assert_eq!(
            forwarded_ip(&headers("203.0.113.7, 10.0.0.1")).as_deref(),
            Some("203.0.113.7")
        );
        assert_eq!(forwarded_ip(&headers("  2001:db8::1 ")).as_deref(), Some("2001:db8::1"));
    }

    #[test]
    fn forwarded_ip_ignores_absent_or_blank_headers() {
        assert_eq!(forwarded_ip(&HeaderMap::new()), None);
        assert_eq!(forwarded_ip(&headers("")), None);
        assert_eq!(forwarded_ip(&headers(" , 10.0.0.1")), None);
    }

    #[test]
    fn sampling_keeps_every_nth_request() {
        assert!((1..=5).all(|n| sampled(n, 1)));
        assert!((1..=5).all(|n| sampled(n, 0)));
        let kept: Vec<u64> = (1..=10).filter(|n| sampled(*n, 3)).collect();
        assert_eq!(kept, vec![3, 6, 9]);
    }
}
