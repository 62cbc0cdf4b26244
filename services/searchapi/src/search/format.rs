//! Row shaping for search results.
//!
//! Normalizes the schemaless document of each row into flat string values:
//! strings are lower-cased, scalars are stringified, and nested label maps
//! are encoded as a sorted `key:value,key:value` list so output is
//! deterministic regardless of map ordering.
use crate::api::types::Item;
use serde_json::Value;
use std::collections::BTreeMap;

/// Encode a label map as `key1:value1,key2:value2`, keys sorted.
fn format_labels(labels: &serde_json::Map<String, Value>) -> String {
    let sorted: BTreeMap<&String, &Value> = labels.iter().collect();
    sorted
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.to_lowercase(),
                other => other.to_string().to_lowercase(),
            };
            format!("{}:{}", key.to_lowercase(), value)
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Shape one row's data document. Unknown value types are dropped.
pub fn format_data_map(data: &Value) -> Item {
    let mut item = Item::new();
    let Some(map) = data.as_object() else {
        return item;
    };
    for (key, value) in map {
        let shaped = match value {
            Value::String(s) => s.to_lowercase(),
            Value::Bool(b) => b.to_string(),
            // Counts are indexed as floats; render them as integers.
            Value::Number(n) => (n.as_f64().unwrap_or(0.0) as i64).to_string(),
            Value::Object(labels) => format_labels(labels),
            other => {
                tracing::debug!(key, value_type = ?other, "skipping property with unsupported type");
                continue;
            }
        };
        item.insert(key.clone(), Value::String(shaped));
    }
    item
}

/// Shape a full row: the data document plus promoted `_uid` and `cluster`.
pub fn format_row(uid: &str, cluster: &str, data: &Value) -> Item {
    let mut item = format_data_map(data);
    item.insert("_uid".to_string(), Value::String(uid.to_string()));
    item.insert("cluster".to_string(), Value::String(cluster.to_string()));
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_are_lowercased() {
        let item = format_data_map(&json!({"kind": "Pod", "name": "Sample-Name"}));
        assert_eq!(item["kind"], json!("pod"));
        assert_eq!(item["name"], json!("sample-name"));
    }

    #[test]
    fn scalars_become_strings() {
        let item = format_data_map(&json!({"ready": true, "current": 3.0}));
        assert_eq!(item["ready"], json!("true"));
        assert_eq!(item["current"], json!("3"));
    }

    #[test]
    fn labels_encode_sorted_pairs() {
        let item = format_data_map(&json!({"label": {"b": "Two", "a": "One"}}));
        assert_eq!(item["label"], json!("a:one,b:two"));
    }

    #[test]
    fn unsupported_types_are_dropped() {
        let item = format_data_map(&json!({"list": [1, 2], "kind": "Pod"}));
        assert!(!item.contains_key("list"));
        assert!(item.contains_key("kind"));
    }

    #[test]
    fn round_trip_preserves_keys_and_lowercases_strings() {
        let data = json!({
            "kind": "Deployment",
            "namespace": "Default",
            "ready": false,
            "replicas": 2.0,
            "label": {"App": "Search"}
        });
        let item = format_row("cluster1/abc", "cluster1", &data);
        assert_eq!(item.len(), data.as_object().unwrap().len() + 2);
        assert_eq!(item["_uid"], json!("cluster1/abc"));
        assert_eq!(item["cluster"], json!("cluster1"));
        for value in item.values() {
            let text = value.as_str().unwrap();
            assert_eq!(text, text.to_lowercase());
        }
    }
}
