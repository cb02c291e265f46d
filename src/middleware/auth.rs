use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::Credentials;

const CHALLENGE: &str = r#"Basic realm="restricted", charset="UTF-8""#;

/// Rejects every request whose Basic credentials do not match.
pub async fn basic_auth(
    State(expected): State<Arc<Credentials>>,
    req: Request,
    next: Next,
) -> Response {
    match presented_credentials(req.headers()) {
        Some((username, password)) if matches(&expected, &username, &password) => {
            next.run(req).await
        }
        presented => {
            debug!(
                path = req.uri().path(),
                had_credentials = presented.is_some(),
                "rejected unauthenticated request"
            );
            unauthorized()
        }
    }
}

fn presented_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Both halves are always compared. Digests are compared instead of the
/// raw values so lengths never differ.
fn matches(expected: &Credentials, username: &str, password: &str) -> bool {
    let username_match = constant_time_eq(
        &Sha256::digest(username.as_bytes()),
        &Sha256::digest(expected.username.as_bytes()),
    );
    let password_match = constant_time_eq(
        &Sha256::digest(password.as_bytes()),
        &Sha256::digest(expected.password.as_bytes()),
    );
    username_match & password_match
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    let max_len = a.len().max(b.len());

    for i in 0..max_len {
        let left = *a.get(i).unwrap_or(&0);
        let right = *b.get(i).unwrap_or(&0);
        diff |= usize::from(left ^ right);
    }

    diff == 0
}

fn unauthorized() -> Response {
    let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
    response
}
