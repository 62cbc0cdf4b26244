//! Autocomplete handler.
use crate::api::error::{ApiError, api_validation_error};
use crate::api::types::{CompleteRequest, CompleteResponse, ErrorResponse};
use crate::app::AppState;
use crate::rbac::middleware::AuthContext;
use crate::search::complete::resolve_complete;
use axum::Json;
use axum::extract::{Extension, State};
use chrono::Utc;

#[utoipa::path(
    post,
    path = "/searchapi/complete",
    tag = "search",
    request_body = CompleteRequest,
    responses(
        (status = 200, description = "Suggested values for the property", body = CompleteResponse),
        (status = 400, description = "No property specified", body = ErrorResponse)
    )
)]
pub async fn complete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, ApiError> {
    if body.property.is_empty() {
        return Err(api_validation_error(
            "no property specified for autocomplete",
        ));
    }
    let user = match state.cache.get_user_data(&auth.identity).await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!(error = %err, "autocomplete proceeding with empty access snapshot");
            Default::default()
        }
    };
    let mut query = body.query.unwrap_or_default();
    if query.limit.is_none() {
        query.limit = body.limit;
    }
    // Storage failures degrade to an empty suggestion list.
    let values = match resolve_complete(
        state.db.as_ref(),
        &body.property,
        &query,
        &user,
        state.config.query_limit,
        Utc::now(),
    )
    .await
    {
        Ok(values) => values,
        Err(err) => {
            tracing::error!(error = %err, property = %body.property, "failed to fetch autocomplete values");
            Vec::new()
        }
    };
    Ok(Json(CompleteResponse { values }))
}
