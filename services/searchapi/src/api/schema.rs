//! Schema introspection handler.
use crate::api::error::ApiError;
use crate::api::types::{MessageResponse, SchemaResponse};
use crate::app::AppState;
use crate::rbac::middleware::AuthContext;
use crate::search::schema::resolve_schema;
use axum::extract::{Extension, State};
use axum::Json;

#[utoipa::path(
    get,
    path = "/searchapi/schema",
    tag = "search",
    responses(
        (status = 200, description = "All queryable properties", body = SchemaResponse),
        (status = 401, description = "Missing token", body = MessageResponse),
        (status = 403, description = "Authentication failed", body = MessageResponse)
    )
)]
pub async fn schema(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<SchemaResponse>, ApiError> {
    let user = match state.cache.get_user_data(&auth.identity).await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!(error = %err, "schema request proceeding with empty access snapshot");
            Default::default()
        }
    };
    // A storage failure degrades to an empty property list rather than a
    // request failure; clients treat the schema as advisory.
    let all_properties = match resolve_schema(state.db.as_ref(), &user, state.config.query_limit)
        .await
    {
        Ok(properties) => properties,
        Err(err) => {
            tracing::error!(error = %err, "failed to fetch search schema");
            Vec::new()
        }
    };
    Ok(Json(SchemaResponse { all_properties }))
}
