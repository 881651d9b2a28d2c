//! Request forwarding to a selected backend.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the backend base URL (single-slash join)
//! - Rewrite `Host`, strip hop-by-hop headers, append `x-forwarded-for`
//! - Stream the response back, holding the backend slot until the body ends

use std::net::IpAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Response, Uri, Version, header};
use hyper::body::{Body as _, Bytes, Frame, SizeHint};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use thiserror::Error;
use url::{Position, Url};

use crate::load_balancer::BackendGuard;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers that only apply to a single connection.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
];

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build upstream URI: {0}")]
    Uri(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

/// Join two path segments with exactly one slash between them.
pub fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// `host[:port]` of a backend base URL.
pub fn authority(base: &Url) -> &str {
    &base[Position::BeforeHost..Position::AfterPort]
}

/// Map an inbound request URI onto the backend, keeping the query string.
pub fn upstream_uri(base: &Url, original: &Uri) -> Result<Uri, axum::http::Error> {
    let mut path_and_query = join_path(base.path(), original.path());
    if let Some(query) = original.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }

    Uri::builder()
        .scheme(base.scheme())
        .authority(authority(base))
        .path_and_query(path_and_query)
        .build()
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in `Connection` are hop-by-hop as well.
    let named: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();
    for name in named {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, client),
        None => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Send `request` to the guarded backend and stream its response back.
///
/// The guard travels with the response body, so the slot is released once
/// the body has been fully sent or dropped. On error it is released
/// immediately.
pub async fn forward(
    client: &Client<HttpConnector, Body>,
    guard: BackendGuard,
    request: Request<Body>,
    client_ip: Option<IpAddr>,
) -> Result<Response<Body>, ForwardError> {
    let (mut parts, body) = request.into_parts();

    parts.uri = upstream_uri(guard.url(), &parts.uri)?;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    if let Ok(host) = HeaderValue::from_str(authority(guard.url())) {
        parts.headers.insert(header::HOST, host);
    }
    if let Some(ip) = client_ip {
        append_forwarded_for(&mut parts.headers, ip);
    }

    let response = client.request(Request::from_parts(parts, body)).await?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    let body = ReleaseOnEnd {
        inner: Body::new(body),
        _guard: guard,
    };
    Ok(Response::from_parts(parts, Body::new(body)))
}

/// Response body that keeps a backend slot claimed until it is dropped.
struct ReleaseOnEnd {
    inner: Body,
    _guard: BackendGuard,
}

impl hyper::body::Body for ReleaseOnEnd {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
