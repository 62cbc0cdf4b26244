//! Request-entry authentication middleware.
//!
//! State machine per request: extract the token (cookie first, then the
//! Authorization header), validate it through the token-review cache, warm
//! the shared and per-user caches, and attach the identity to the request.
//! Cache warm-up failures are logged but do not fail the request; an
//! unavailable snapshot means empty grants, which the planner compiles to a
//! predicate matching no rows.
use crate::api::types::MessageResponse;
use crate::app::AppState;
use crate::cluster::UserIdentity;
use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

pub const TOKEN_COOKIE: &str = "acm-access-token-cookie";

/// Identity attached to the request after authentication.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub token: String,
    pub identity: UserIdentity,
}

fn message(status: StatusCode, text: &str) -> Response {
    (
        status,
        Json(MessageResponse {
            message: text.to_string(),
        }),
    )
        .into_response()
}

/// Bearer token from the access-token cookie or the Authorization header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(cookies) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        for cookie in cookies.split(';') {
            if let Some((name, value)) = cookie.trim().split_once('=') {
                if name == TOKEN_COOKIE && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start_matches("Bearer ").trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_token(request.headers()) else {
        tracing::debug!("request didn't have an authentication token");
        metrics::counter!("searchapi_auth_rejected_total", "reason" => "missing_token").increment(1);
        return message(
            StatusCode::UNAUTHORIZED,
            "Request didn't have a valid authentication token.",
        );
    };

    let review = match state.cache.get_token_review(&token).await {
        Ok(review) => review,
        Err(err) => {
            tracing::warn!(error = %err, "unexpected error while authenticating the request token");
            metrics::counter!("searchapi_auth_rejected_total", "reason" => "review_error")
                .increment(1);
            return message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unexpected error while authenticating the request token.",
            );
        }
    };
    if !review.authenticated {
        tracing::debug!("rejecting request: invalid token");
        metrics::counter!("searchapi_auth_rejected_total", "reason" => "invalid_token").increment(1);
        return message(StatusCode::FORBIDDEN, "Invalid token");
    }

    // Warm the caches the planner depends on. Failures degrade to an empty
    // snapshot: the request proceeds and matches no rows.
    if let Err(err) = state.cache.populate_shared_cache().await {
        tracing::warn!(error = %err, "failed to populate shared cache");
        metrics::counter!("searchapi_authz_cache_errors_total").increment(1);
    }
    let identity = UserIdentity::from(&review);
    if let Err(err) = state.cache.get_user_data(&identity).await {
        tracing::warn!(error = %err, user = %identity.uid, "failed to build user access snapshot");
    }

    request
        .extensions_mut()
        .insert(AuthContext { token, identity });
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, value.parse().unwrap());
        headers
    }

    #[test]
    fn cookie_preferred_over_authorization_header() {
        let mut headers = headers_with(
            header::COOKIE,
            "other=1; acm-access-token-cookie=cookie-token",
        );
        headers.insert(header::AUTHORIZATION, "Bearer header-token".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("cookie-token"));
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        let headers = headers_with(header::AUTHORIZATION, "Bearer the-token");
        assert_eq!(extract_token(&headers).as_deref(), Some("the-token"));
    }

    #[test]
    fn missing_token_yields_none() {
        assert!(extract_token(&HeaderMap::new()).is_none());
        let headers = headers_with(header::AUTHORIZATION, "Bearer ");
        assert!(extract_token(&headers).is_none());
    }
}
