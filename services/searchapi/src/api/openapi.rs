//! OpenAPI document for the search surface.
use crate::api::types::{
    CompleteRequest, CompleteResponse, CountResponse, DisabledClustersResponse, ErrorResponse,
    FederatedError, FederatedResponse, MessageResponse, SchemaResponse, SearchFilter, SearchInput,
    SearchRequest, SearchRelatedResult, SearchResponse, SearchResult,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "searchapi",
        version = "v1",
        description = "Read-only search and discovery API over the cluster-resource store"
    ),
    paths(
        crate::api::search::search,
        crate::api::search::count,
        crate::api::search::federated,
        crate::api::search::disabled_clusters,
        crate::api::search::health,
        crate::api::schema::schema,
        crate::api::complete::complete
    ),
    components(schemas(
        SearchInput,
        SearchFilter,
        SearchRequest,
        SearchResult,
        SearchRelatedResult,
        SearchResponse,
        CountResponse,
        SchemaResponse,
        CompleteRequest,
        CompleteResponse,
        DisabledClustersResponse,
        FederatedError,
        FederatedResponse,
        MessageResponse,
        ErrorResponse
    )),
    tags(
        (name = "search", description = "Search, count, schema, and autocomplete"),
        (name = "federation", description = "Fan-out across peer search services"),
        (name = "system", description = "Operational endpoints")
    )
)]
pub struct ApiDoc;
