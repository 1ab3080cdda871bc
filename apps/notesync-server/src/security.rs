use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

fn add_hdr(h: &mut HeaderMap, name: HeaderName, val: &str) {
    if !h.contains_key(&name) {
        if let Ok(v) = HeaderValue::from_str(val) {
            h.insert(name, v);
        }
    }
}

pub async fn headers_mw(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut res = next.run(req).await;
    // Basic security headers (idempotent)
    let h = res.headers_mut();
    add_hdr(h, header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    add_hdr(h, header::X_FRAME_OPTIONS, "DENY");
    let refpol =
        std::env::var("NOTESYNC_REFERRER_POLICY").unwrap_or_else(|_| "no-referrer".into());
    add_hdr(h, header::REFERRER_POLICY, &refpol);
    // Note payloads are per-user
    add_hdr(h, header::CACHE_CONTROL, "no-store");
    if std::env::var("NOTESYNC_HSTS").ok().as_deref() == Some("1") {
        add_hdr(
            h,
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=31536000; includeSubDomains",
        );
    }
    res
}
