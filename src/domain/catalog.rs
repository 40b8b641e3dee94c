// Dataset catalogue models
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub id: String,
    pub name: String,
    pub geometry_type: Option<String>,
}

fn first_string(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// The API answers with either a bare array or `{ "<key>": [...] }`.
fn list_items<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    match body {
        Value::Array(items) => items,
        other => other
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
    }
}

impl Dataset {
    pub fn from_json(item: &Value) -> Option<Self> {
        let id = first_string(item, &["dataset_id", "id"])?;
        Some(Self {
            name: first_string(item, &["name", "dataset_name"]).unwrap_or_else(|| id.clone()),
            description: first_string(item, &["description"]),
            id,
        })
    }

    pub fn list_from_json(body: &Value) -> Vec<Self> {
        list_items(body, "datasets").iter().filter_map(Self::from_json).collect()
    }
}

impl Layer {
    pub fn from_json(item: &Value) -> Option<Self> {
        let id = first_string(item, &["layer_id", "id"])?;
        Some(Self {
            name: first_string(item, &["name", "layer_name"]).unwrap_or_else(|| id.clone()),
            geometry_type: first_string(item, &["geometry_type"]),
            id,
        })
    }

    pub fn list_from_json(body: &Value) -> Vec<Self> {
        list_items(body, "layers").iter().filter_map(Self::from_json).collect()
    }
}
