//! Access predicate injected into every search statement.
//!
//! A row is visible when it belongs to a managed cluster the user may read,
//! or it is a hub-cluster row covered by a cluster-scoped or namespaced
//! grant. Empty grant sets render as the literal NULL, which the enclosing
//! conjunction evaluates to no rows — fail closed, never open.
//!
//! Rendering is deterministic: managed clusters, namespaces, and the
//! `(apigroup, kind)` pairs inside each scope are sorted, so the SQL text is
//! a pure function of the snapshot.
use crate::rbac::{Resource, UserData};
use crate::search::builder::{Expr, array_literal};

fn pair_disjunction(resources: &[Resource]) -> Expr {
    let mut sorted: Vec<&Resource> = resources.iter().collect();
    sorted.sort();
    let pairs = sorted
        .into_iter()
        .map(|resource| {
            Expr::And(vec![
                Expr::comp(format!(
                    "COALESCE(data->>'apigroup', '') = '{}'",
                    resource.apigroup
                )),
                Expr::comp(format!("data->>'kind_plural' = '{}'", resource.kind)),
            ])
        })
        .collect::<Vec<_>>();
    Expr::Or(pairs)
}

// Cluster-scoped rows are the ones without a namespace key.
fn cluster_scoped_clause(resources: &[Resource]) -> Option<Expr> {
    if resources.is_empty() {
        return None;
    }
    Some(Expr::And(vec![
        Expr::comp("COALESCE(data->>'namespace', '') = ''"),
        pair_disjunction(resources),
    ]))
}

fn namespaced_clause(user: &UserData) -> Option<Expr> {
    if user.ns_resources.is_empty() {
        return None;
    }
    let mut namespaces: Vec<&String> = user.ns_resources.keys().collect();
    namespaces.sort();
    let per_namespace = namespaces
        .into_iter()
        .map(|namespace| {
            Expr::And(vec![
                Expr::comp(format!("data->>'namespace' = '{namespace}'")),
                pair_disjunction(&user.ns_resources[namespace]),
            ])
        })
        .collect::<Vec<_>>();
    Some(Expr::Or(per_namespace))
}

/// Build the access predicate for one snapshot.
pub fn rbac_clause(user: &UserData) -> Expr {
    let managed = if user.managed_clusters.is_empty() {
        "NULL".to_string()
    } else {
        let mut names: Vec<String> = user.managed_clusters.iter().cloned().collect();
        names.sort();
        array_literal(&names)
    };
    let managed_clause = Expr::comp(format!("\"cluster\" = ANY ({managed})"));

    let hub_clause = Expr::comp("data->>'_hubClusterResource' = 'true'");
    let hub_grants = match (cluster_scoped_clause(&user.cs_resources), namespaced_clause(user)) {
        (None, None) => Expr::Null,
        (Some(cs), None) => cs,
        (None, Some(ns)) => Expr::Or(vec![Expr::Null, ns]),
        (Some(cs), Some(ns)) => Expr::Or(vec![cs, ns]),
    };

    Expr::Or(vec![
        managed_clause,
        Expr::And(vec![hub_clause, hub_grants]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn cs_resources() -> Vec<Resource> {
        vec![
            Resource::new("", "nodes"),
            Resource::new("storage.k8s.io", "csinodes"),
        ]
    }

    fn ns_resources() -> HashMap<String, Vec<Resource>> {
        HashMap::from([
            (
                "default".to_string(),
                vec![Resource::new("", "configmaps"), Resource::new("v4", "services")],
            ),
            (
                "ocm".to_string(),
                vec![Resource::new("v1", "pods"), Resource::new("v2", "deployments")],
            ),
        ])
    }

    fn managed_clusters() -> HashSet<String> {
        HashSet::from(["managed1".to_string(), "managed2".to_string()])
    }

    #[test]
    fn empty_snapshot_fails_closed() {
        let clause = rbac_clause(&UserData::default()).render();
        assert_eq!(
            clause,
            r#"(("cluster" = ANY (NULL)) OR ((data->>'_hubClusterResource' = 'true') AND NULL))"#
        );
    }

    #[test]
    fn cluster_scoped_grants_only() {
        let user = UserData {
            cs_resources: cs_resources(),
            ..Default::default()
        };
        assert_eq!(
            rbac_clause(&user).render(),
            r#"(("cluster" = ANY (NULL)) OR ((data->>'_hubClusterResource' = 'true') AND ((COALESCE(data->>'namespace', '') = '') AND (((COALESCE(data->>'apigroup', '') = '') AND (data->>'kind_plural' = 'nodes')) OR ((COALESCE(data->>'apigroup', '') = 'storage.k8s.io') AND (data->>'kind_plural' = 'csinodes'))))))"#
        );
    }

    #[test]
    fn namespaced_grants_only() {
        let user = UserData {
            ns_resources: ns_resources(),
            ..Default::default()
        };
        assert_eq!(
            rbac_clause(&user).render(),
            r#"(("cluster" = ANY (NULL)) OR ((data->>'_hubClusterResource' = 'true') AND (NULL OR (((data->>'namespace' = 'default') AND (((COALESCE(data->>'apigroup', '') = '') AND (data->>'kind_plural' = 'configmaps')) OR ((COALESCE(data->>'apigroup', '') = 'v4') AND (data->>'kind_plural' = 'services')))) OR ((data->>'namespace' = 'ocm') AND (((COALESCE(data->>'apigroup', '') = 'v1') AND (data->>'kind_plural' = 'pods')) OR ((COALESCE(data->>'apigroup', '') = 'v2') AND (data->>'kind_plural' = 'deployments'))))))))"#
        );
    }

    #[test]
    fn full_snapshot_orders_namespaces_lexicographically() {
        let user = UserData {
            cs_resources: cs_resources(),
            ns_resources: ns_resources(),
            managed_clusters: managed_clusters(),
        };
        assert_eq!(
            rbac_clause(&user).render(),
            r#"(("cluster" = ANY ('{"managed1","managed2"}')) OR ((data->>'_hubClusterResource' = 'true') AND (((COALESCE(data->>'namespace', '') = '') AND (((COALESCE(data->>'apigroup', '') = '') AND (data->>'kind_plural' = 'nodes')) OR ((COALESCE(data->>'apigroup', '') = 'storage.k8s.io') AND (data->>'kind_plural' = 'csinodes')))) OR (((data->>'namespace' = 'default') AND (((COALESCE(data->>'apigroup', '') = '') AND (data->>'kind_plural' = 'configmaps')) OR ((COALESCE(data->>'apigroup', '') = 'v4') AND (data->>'kind_plural' = 'services')))) OR ((data->>'namespace' = 'ocm') AND (((COALESCE(data->>'apigroup', '') = 'v1') AND (data->>'kind_plural' = 'pods')) OR ((COALESCE(data->>'apigroup', '') = 'v2') AND (data->>'kind_plural' = 'deployments'))))))))"#
        );
    }

    #[test]
    fn rendering_is_stable_across_calls() {
        let user = UserData {
            cs_resources: cs_resources(),
            ns_resources: ns_resources(),
            managed_clusters: managed_clusters(),
        };
        assert_eq!(rbac_clause(&user).render(), rbac_clause(&user).render());
    }
}
