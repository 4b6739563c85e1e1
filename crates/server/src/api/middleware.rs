//! Request metrics, caller resolution and the `Caller` extractor.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use queueline_core::{AuthError, AuthRequest, Identity};

use super::error::ErrorResponse;
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Record duration, count and in-flight requests per normalized path.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();
    let response = next.run(request).await;
    HTTP_REQUESTS_IN_FLIGHT.dec();

    let status = response.status().as_u16().to_string();
    let labels = [method.as_str(), path.as_str(), status.as_str()];
    HTTP_REQUEST_DURATION
        .with_label_values(&labels)
        .observe(start.elapsed().as_secs_f64());
    HTTP_REQUESTS_TOTAL.with_label_values(&labels).inc();

    response
}

/// Resolve who is calling and attach the [`Identity`] to the request.
///
/// Presenting no credentials is fine: the caller is an anonymous customer.
/// Presenting wrong credentials is rejected with 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let auth_request = AuthRequest { headers, source_ip };

    let identity = match state.authenticator().resolve(&auth_request).await {
        Ok(identity) => identity,
        Err(AuthError::Rejected(reason)) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["rejected"])
                .inc();
            warn!(%source_ip, "Rejected credentials: {}", reason);
            return reject(StatusCode::UNAUTHORIZED, "invalid credentials", "unauthenticated");
        }
        Err(e) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["internal_error"]).inc();
            error!("Authentication failed: {}", e);
            return reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "authentication unavailable",
                "internal",
            );
        }
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn reject(status: StatusCode, error: &str, code: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        }),
    )
        .into_response()
}

/// The resolved caller. Anonymous when the auth middleware did not run.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or_else(Identity::anonymous);
        Ok(Caller(identity))
    }
}
