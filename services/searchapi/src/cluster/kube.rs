//! Kubernetes-backed cluster gateway.
//!
//! Token reviews and access reviews are create-only subresources, so they
//! go through `kube::Client::request` with hand-built requests; that is
//! also where the impersonation headers are attached. Listings use the
//! typed `Api` surface.
use super::{
    ClusterClient, ClusterError, ClusterResult, ManagedCluster, ResourceAttributes,
    TokenReviewStatus, UserIdentity,
};
use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::{TokenReview, TokenReviewSpec};
use k8s_openapi::api::authorization::v1::{
    self as authz, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec, SelfSubjectRulesReview,
    SelfSubjectRulesReviewSpec,
};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::{Client, ResourceExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const HUB_CLAIM: &str = "hub.open-cluster-management.io";

pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Build from the ambient kubeconfig or the in-cluster environment.
    pub async fn new() -> ClusterResult<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    // POST a review object, optionally impersonating the given user.
    async fn post_review<T>(
        &self,
        path: &str,
        body: &T,
        impersonate: Option<&UserIdentity>,
    ) -> ClusterResult<T>
    where
        T: Serialize + serde::de::DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|e| ClusterError::Api(e.to_string()))?;
        let mut request = http::Request::builder()
            .method("POST")
            .uri(path)
            .header(http::header::CONTENT_TYPE, "application/json");
        if let Some(user) = impersonate {
            request = request
                .header("Impersonate-User", &user.username)
                .header("Impersonate-Uid", &user.uid);
            for group in &user.groups {
                request = request.header("Impersonate-Group", group);
            }
        }
        let request = request
            .body(payload)
            .map_err(|e| ClusterError::Api(e.to_string()))?;
        self.client
            .request(request)
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn review_token(&self, token: &str) -> ClusterResult<TokenReviewStatus> {
        let review = TokenReview {
            spec: TokenReviewSpec {
                token: Some(token.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = self
            .post_review("/apis/authentication.k8s.io/v1/tokenreviews", &review, None)
            .await?;
        let status = result.status.unwrap_or_default();
        let user = status.user.unwrap_or_default();
        Ok(TokenReviewStatus {
            authenticated: status.authenticated.unwrap_or(false),
            user_uid: user.uid.unwrap_or_default(),
            username: user.username.unwrap_or_default(),
            groups: user.groups.unwrap_or_default(),
        })
    }

    async fn can_access(
        &self,
        user: &UserIdentity,
        attrs: &ResourceAttributes,
    ) -> ClusterResult<bool> {
        let review = SelfSubjectAccessReview {
            spec: SelfSubjectAccessReviewSpec {
                resource_attributes: Some(authz::ResourceAttributes {
                    group: Some(attrs.group.clone()),
                    resource: Some(attrs.resource.clone()),
                    namespace: Some(attrs.namespace.clone()),
                    name: Some(attrs.name.clone()),
                    verb: Some(attrs.verb.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = self
            .post_review(
                "/apis/authorization.k8s.io/v1/selfsubjectaccessreviews",
                &review,
                Some(user),
            )
            .await?;
        Ok(result.status.map(|s| s.allowed).unwrap_or(false))
    }

    async fn allowed_resources(
        &self,
        user: &UserIdentity,
        namespace: &str,
    ) -> ClusterResult<Vec<(String, String)>> {
        let review = SelfSubjectRulesReview {
            spec: SelfSubjectRulesReviewSpec {
                namespace: Some(namespace.to_string()),
            },
            ..Default::default()
        };
        let result = self
            .post_review(
                "/apis/authorization.k8s.io/v1/selfsubjectrulesreviews",
                &review,
                Some(user),
            )
            .await?;

        let mut pairs = Vec::new();
        for rule in result
            .status
            .map(|s| s.resource_rules)
            .unwrap_or_default()
        {
            let can_list = rule
                .verbs
                .iter()
                .any(|verb| verb == "list" || verb == "*");
            if !can_list {
                continue;
            }
            let groups = rule.api_groups.unwrap_or_else(|| vec![String::new()]);
            for resource in rule.resources.unwrap_or_default() {
                // Wildcards and subresources can't be matched against the
                // indexed kind_plural values.
                if resource == "*" || resource.contains('/') {
                    continue;
                }
                for group in &groups {
                    if group == "*" {
                        continue;
                    }
                    let pair = (group.clone(), resource.clone());
                    if !pairs.contains(&pair) {
                        pairs.push(pair);
                    }
                }
            }
        }
        Ok(pairs)
    }

    async fn list_namespaces(&self) -> ClusterResult<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;
        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_managed_clusters(&self) -> ClusterResult<Vec<ManagedCluster>> {
        let gvk = GroupVersionKind::gvk("cluster.open-cluster-management.io", "v1", "ManagedCluster");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "managedclusters");
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;

        Ok(list
            .items
            .iter()
            .map(|obj| {
                let managed_hub = obj
                    .data
                    .pointer("/status/clusterClaims")
                    .and_then(Value::as_array)
                    .map(|claims| {
                        claims.iter().any(|claim| {
                            claim["name"] == HUB_CLAIM && claim["value"] != "NotInstalled"
                        })
                    })
                    .unwrap_or(false);
                let url = obj
                    .data
                    .pointer("/spec/managedClusterClientConfigs/0/url")
                    .and_then(Value::as_str)
                    .map(String::from);
                ManagedCluster {
                    name: obj.name_any(),
                    managed_hub,
                    url,
                }
            })
            .collect())
    }

    async fn read_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<BTreeMap<String, Vec<u8>>>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get_opt(name)
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;
        Ok(secret.and_then(|s| s.data).map(|data| {
            data.into_iter()
                .map(|(key, bytes)| (key, bytes.0))
                .collect()
        }))
    }

    async fn read_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<BTreeMap<String, String>>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api
            .get_opt(name)
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;
        Ok(config_map.and_then(|cm| cm.data))
    }
}
