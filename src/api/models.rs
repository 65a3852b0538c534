//! Typed views of the API payloads the state layer depends on.
//!
//! Everything else the tools return is passed through as JSON, so these
//! types keep unknown fields in `extra` to be echoed back verbatim.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Ids arrive as numbers for projects and as UUID strings for organizations.
/// Both are handled as strings from here on.
pub fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected id: {}", other))),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Paginated<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub distinct_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Organization {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Project {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiKeyInfo {
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub scoped_organizations: Vec<String>,
    #[serde(default)]
    pub scoped_teams: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_and_string_ids() {
        let project: Project =
            serde_json::from_str(r#"{"id": 42, "name": "Web", "api_token": "phc_x"}"#).unwrap();
        assert_eq!(project.id, "42");
        assert_eq!(project.extra.get("api_token").and_then(Value::as_str), Some("phc_x"));

        let org: Organization = serde_json::from_str(
            r#"{"id": "0188e7b6-0000-0000-0000-000000000000", "name": "Acme"}"#,
        )
        .unwrap();
        assert_eq!(org.id, "0188e7b6-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_rejects_object_id() {
        let res: Result<Project, _> = serde_json::from_str(r#"{"id": {}, "name": "x"}"#);
        assert!(res.is_err());
    }
}
