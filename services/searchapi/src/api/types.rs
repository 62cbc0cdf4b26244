//! Request and response shapes for the search HTTP surface.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A shaped result item: property name to stringified value.
pub type Item = serde_json::Map<String, serde_json::Value>;

/// One structured search query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchInput {
    pub filters: Vec<SearchFilter>,
    /// Free-text keywords, matched against every property value.
    pub keywords: Vec<String>,
    /// Row limit. Unset uses the configured default; negative disables it.
    pub limit: Option<i64>,
    /// When present, resolve relationships; non-empty restricts the
    /// related kinds returned.
    pub related_kinds: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilter {
    pub property: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub input: Vec<SearchInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    pub count: i64,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<Vec<SearchRelatedResult>>,
}

/// Resources one hop away from the matched set, grouped by kind.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchRelatedResult {
    pub kind: String,
    pub count: i64,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub counts: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaResponse {
    pub all_properties: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteRequest {
    pub property: String,
    pub query: Option<SearchInput>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompleteResponse {
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisabledClustersResponse {
    pub clusters: Vec<String>,
    /// False when the empty list is due to the caller having no
    /// managed-cluster access rather than no disabled clusters.
    pub user_has_access: bool,
}

/// Auth-middleware rejections and status payloads use a bare message shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Handler errors carry a machine-readable code alongside the message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FederatedError {
    /// Name of the peer that failed.
    pub hub: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FederatedResponse {
    pub results: Vec<SearchResult>,
    pub errors: Vec<FederatedError>,
}
