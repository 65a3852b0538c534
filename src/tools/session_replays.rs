//! Session recording search, expressed as a HogQL query.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::ToolResult;
use crate::context::Context;
use crate::error::ApiResultExt;

const DEFAULT_EVENT: &str = "$pageview";
const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// Only sessions that visited a URL containing this text (case insensitive)
    pub page_url_contains: Option<String>,
    /// Event used for URL matching (default `$pageview`)
    pub event_name: Option<String>,
    /// Minimum active time in the recording, in milliseconds
    pub min_active_milliseconds: Option<f64>,
    /// Maximum sessions to return, 1 to 1000 (default 100)
    pub limit: Option<i64>,
    /// Start of the date range, e.g. `-7d` or `2024-01-01`
    #[serde(rename = "date_from")]
    pub date_from: Option<String>,
    #[serde(rename = "date_to")]
    pub date_to: Option<String>,
    pub filter_test_accounts: Option<bool>,
}

fn escape_single_quotes(input: &str) -> String {
    input.replace('\'', "''")
}

pub fn build_sql(params: &QueryParams) -> String {
    let mut conditions = Vec::new();

    if let Some(ms) = params.min_active_milliseconds {
        let ms = ms.floor().max(0.0) as i64;
        conditions.push(format!("r.active_milliseconds >= {}", ms));
    }

    if let Some(needle) = params.page_url_contains.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let event = params.event_name.as_deref().unwrap_or(DEFAULT_EVENT);
        conditions.push(format!("e.event = '{}'", escape_single_quotes(event)));
        conditions.push(format!(
            "lower(e.properties[\"$current_url\"]) LIKE lower('%{}%')",
            escape_single_quotes(needle)
        ));
    }

    let where_sql = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    format!(
        "
SELECT
  r.session_id,
  r.active_milliseconds,
  any(r.click_count) AS click_count,
  any(r.keypress_count) AS keypress_count,
  any(r.start_time) AS start_time,
  any(r.end_time) AS end_time,
  any(s.$session_duration) AS session_duration,
  min(e.timestamp) AS first_event_time,
  max(e.timestamp) AS last_event_time
FROM raw_session_replay_events r
LEFT JOIN sessions s ON s.session_id = r.session_id
LEFT JOIN events e ON e.properties[\"$session_id\"] = r.session_id
{where_sql}
GROUP BY r.session_id, r.active_milliseconds
ORDER BY r.active_milliseconds DESC
LIMIT {limit}
"
    )
}

fn build_filters(params: &QueryParams) -> Value {
    let mut date_range = Map::new();
    if let Some(from) = &params.date_from {
        date_range.insert("date_from".to_string(), json!(from));
    }
    if let Some(to) = &params.date_to {
        date_range.insert("date_to".to_string(), json!(to));
    }
    let mut filters = Map::new();
    filters.insert("dateRange".to_string(), Value::Object(date_range));
    if let Some(flag) = params.filter_test_accounts {
        filters.insert("filterTestAccounts".to_string(), json!(flag));
    }
    Value::Object(filters)
}

pub async fn query(ctx: &Context, params: QueryParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let query = json!({
        "kind": "DataVisualizationNode",
        "source": {
            "kind": "HogQLQuery",
            "query": build_sql(&params),
            "filters": build_filters(&params),
        },
    });

    let result = ctx
        .api
        .query(&project_id)
        .run(&query)
        .await
        .context("query session replays")?;
    Ok(result.get("results").cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let sql = build_sql(&QueryParams::default());
        assert!(!sql.contains("WHERE"));
        assert!(sql.contains("LIMIT 100\n"));
    }

    #[test]
    fn test_url_filter_is_escaped() {
        let sql = build_sql(&QueryParams {
            page_url_contains: Some("  /pricing'--  ".to_string()),
            event_name: Some("o'clock".to_string()),
            ..Default::default()
        });
        assert!(sql.contains("e.event = 'o''clock'"));
        assert!(sql.contains("LIKE lower('%/pricing''--%')"));
    }

    #[test]
    fn test_blank_url_adds_no_condition() {
        let sql = build_sql(&QueryParams {
            page_url_contains: Some("   ".to_string()),
            ..Default::default()
        });
        assert!(!sql.contains("e.event ="));
    }

    #[test]
    fn test_limit_and_active_ms_clamped() {
        let sql = build_sql(&QueryParams {
            limit: Some(5000),
            min_active_milliseconds: Some(-20.7),
            ..Default::default()
        });
        assert!(sql.contains("LIMIT 1000\n"));
        assert!(sql.contains("WHERE r.active_milliseconds >= 0"));

        let sql = build_sql(&QueryParams {
            limit: Some(0),
            min_active_milliseconds: Some(1500.9),
            ..Default::default()
        });
        assert!(sql.contains("LIMIT 1\n"));
        assert!(sql.contains("r.active_milliseconds >= 1500"));
    }

    #[test]
    fn test_filters() {
        let filters = build_filters(&QueryParams {
            date_from: Some("-7d".to_string()),
            filter_test_accounts: Some(true),
            ..Default::default()
        });
        assert_eq!(
            filters,
            json!({"dateRange": {"date_from": "-7d"}, "filterTestAccounts": true})
        );
        assert_eq!(build_filters(&QueryParams::default()), json!({"dateRange": {}}));
    }
}
