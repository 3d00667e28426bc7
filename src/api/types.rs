//! Shared API response and query types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard response envelope: `{ success, data }` or `{ success, error }`.
///
/// Every endpoint uses it except the legacy status and health routes,
/// which return their payload directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn ok(data: impl Serialize) -> Self {
        Self {
            success: true,
            data: Some(serde_json::json!(data)),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// `?limit=N` for the recent-rows endpoints
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// `?timeRange=T` where T is like `30s`, `15m`, `6h`, `7d`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRangeQuery {
    pub time_range: Option<String>,
}

/// Query for the errors endpoint: time range plus optional severity filter
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorsQuery {
    pub time_range: Option<String>,
    pub severity: Option<String>,
}
