//! Search, count, federation, and operational handlers.
use crate::api::error::{ApiError, api_internal, api_internal_message, api_not_enabled};
use crate::api::types::{
    CountResponse, DisabledClustersResponse, ErrorResponse, FederatedResponse, MessageResponse,
    SearchRequest, SearchResponse,
};
use crate::app::AppState;
use crate::rbac::UserData;
use crate::rbac::middleware::AuthContext;
use crate::search::SearchResolver;
use axum::Json;
use axum::extract::{Extension, State};
use chrono::Utc;

// The access snapshot for the authenticated caller. An unavailable snapshot
// degrades to empty grants: the query runs and matches nothing.
async fn user_snapshot(state: &AppState, auth: &AuthContext) -> UserData {
    match state.cache.get_user_data(&auth.identity).await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!(error = %err, user = %auth.identity.uid, "proceeding with empty access snapshot");
            UserData::default()
        }
    }
}

#[utoipa::path(
    post,
    path = "/searchapi/search",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search results per input", body = SearchResponse),
        (status = 401, description = "Missing token", body = MessageResponse),
        (status = 403, description = "Authentication failed", body = MessageResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    )
)]
pub async fn search(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let user = user_snapshot(&state, &auth).await;
    let now = Utc::now();
    let mut results = Vec::with_capacity(body.input.len());
    for input in body.input {
        let resolver =
            SearchResolver::new(input, user.clone(), state.db.clone(), state.config.query_limit);
        let result = resolver
            .resolve(now)
            .await
            .map_err(|err| api_internal("failed to resolve search query", &err))?;
        results.push(result);
    }
    Ok(Json(SearchResponse { results }))
}

#[utoipa::path(
    post,
    path = "/searchapi/count",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Match count per input", body = CountResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    )
)]
pub async fn count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<CountResponse>, ApiError> {
    let user = user_snapshot(&state, &auth).await;
    let now = Utc::now();
    let mut counts = Vec::with_capacity(body.input.len());
    for input in body.input {
        let resolver =
            SearchResolver::new(input, user.clone(), state.db.clone(), state.config.query_limit);
        let count = resolver
            .count(now)
            .await
            .map_err(|err| api_internal("failed to resolve count query", &err))?;
        counts.push(count);
    }
    Ok(Json(CountResponse { counts }))
}

#[utoipa::path(
    post,
    path = "/searchapi/federated",
    tag = "federation",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Merged peer results; failures per peer in the error list", body = FederatedResponse),
        (status = 404, description = "Federation is not enabled", body = ErrorResponse)
    )
)]
pub async fn federated(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<FederatedResponse>, ApiError> {
    let Some(coordinator) = &state.federation else {
        return Err(api_not_enabled("federated search is not enabled"));
    };
    Ok(Json(coordinator.search(&auth.token, &body).await))
}

#[utoipa::path(
    get,
    path = "/searchapi/disabled-clusters",
    tag = "search",
    responses(
        (status = 200, description = "Managed clusters with the search addon disabled", body = DisabledClustersResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    )
)]
pub async fn disabled_clusters(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<DisabledClustersResponse>, ApiError> {
    let user = user_snapshot(&state, &auth).await;
    let disabled = state
        .cache
        .get_disabled_clusters(&user)
        .await
        .map_err(|err| api_internal("failed to resolve disabled clusters", &err))?;
    let mut clusters: Vec<String> = disabled.clusters.into_iter().collect();
    clusters.sort();
    Ok(Json(DisabledClustersResponse {
        clusters,
        user_has_access: disabled.user_has_access,
    }))
}

#[utoipa::path(
    get,
    path = "/searchapi/health",
    tag = "system",
    responses(
        (status = 200, description = "Service health", body = MessageResponse),
        (status = 500, description = "Database unavailable", body = ErrorResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(err) = state.db.ping().await {
        return Err(api_internal_message(&format!(
            "database unavailable: {err}"
        )));
    }
    Ok(Json(MessageResponse {
        message: "ok".to_string(),
    }))
}
