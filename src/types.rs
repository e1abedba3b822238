//! Persisted records and typed views over the server's response payloads.
//!
//! The service has shipped several generations with slightly different
//! response shapes, so most deserialized fields default when absent and the
//! answer/session-id fields are looked up under both historical casings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Profile snapshot as last observed from the server. Stale by design;
/// refreshed only on login, register or an explicit profile fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub tier_type: String,
}

/// Local account record. Both fields are required so that a partial file
/// fails to parse and reads as "not authenticated".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountState {
    pub token: String,
    pub user: UserProfile,
}

/// Local conversation record. `auxiliary_id` is kept verbatim even though
/// nothing local consumes it; some server variants expect it back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub context_id: String,
    #[serde(default)]
    pub auxiliary_id: Option<String>,
    pub last_used_at: DateTime<Utc>,
}

/// Registration payload. Field names are the server's own, including the
/// `FastName` spelling it expects for the last name.
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "FirstName")]
    pub first_name: String,
    #[serde(rename = "FastName")]
    pub last_name: String,
    #[serde(rename = "PreferredLanguage")]
    pub preferred_language: String,
}

/// Login payload.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Password")]
    pub password: String,
}

/// Usage counters some answers carry alongside the text.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageInfo {
    pub queries_used_today: i64,
    pub daily_limit: i64,
}

/// A successfully answered question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// New context id returned by the agent, if any.
    pub thread_id: Option<String>,
    pub usage: Option<UsageInfo>,
}

/// Result of the pre-flight quota check.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageLimit {
    #[serde(default = "default_true")]
    pub can_make_query: bool,
    #[serde(default)]
    pub current_usage: i64,
    #[serde(default)]
    pub daily_limit: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub date: String,
    #[serde(default)]
    pub queries_count: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    #[serde(default)]
    pub total_queries: i64,
    #[serde(default)]
    pub average_queries_per_day: f64,
    #[serde(default)]
    pub current_tier: String,
    #[serde(default)]
    pub daily_statistics: Vec<DailyStat>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TierFeatures {
    #[serde(default)]
    pub long_term_memory: bool,
    #[serde(default)]
    pub custom_commands: bool,
    #[serde(default)]
    pub ide_integration: bool,
    #[serde(default)]
    pub analytics: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TierConfig {
    #[serde(default)]
    pub tier_type: String,
    #[serde(default)]
    pub daily_query_limit: i64,
    #[serde(default)]
    pub supported_languages: Vec<String>,
    #[serde(default)]
    pub features: TierFeatures,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAccess {
    #[serde(default)]
    pub feature_name: String,
    #[serde(default)]
    pub has_access: bool,
    #[serde(default)]
    pub required_tier: String,
}

/// Answer from an optional endpoint: either the deployment supports it, or
/// it predates the feature. Distinct from a genuine failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability<T> {
    Available(T),
    Unsupported,
}

fn default_true() -> bool {
    true
}

/// First string value found under any of the given keys. Response variants
/// disagree on casing (`ThreadId` vs `threadId`), so lookups list every
/// historical spelling in preference order.
pub fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(k).and_then(Value::as_str))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_request_uses_the_server_field_names() {
        let req = RegisterRequest {
            email: "a@b.com".into(),
            password: "secret123".into(),
            first_name: "Ana".into(),
            last_name: "Silva".into(),
            preferred_language: "pt".into(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["Email"], "a@b.com");
        assert_eq!(v["FastName"], "Silva");
        assert_eq!(v["PreferredLanguage"], "pt");
    }

    #[test]
    fn session_state_round_trips_with_camel_case_keys() {
        let state = SessionState {
            context_id: "ctx-123".into(),
            auxiliary_id: Some("sess-9".into()),
            last_used_at: Utc::now(),
        };
        let v = serde_json::to_value(&state).unwrap();
        assert!(v.get("contextId").is_some());
        assert!(v.get("auxiliaryId").is_some());
        assert!(v.get("lastUsedAt").is_some());
        let back: SessionState = serde_json::from_value(v).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn first_string_prefers_earlier_keys() {
        let v = json!({"ThreadId": "upper", "threadId": "lower"});
        assert_eq!(
            first_string(&v, &["ThreadId", "threadId"]).as_deref(),
            Some("upper")
        );
        let v = json!({"threadId": "lower"});
        assert_eq!(
            first_string(&v, &["ThreadId", "threadId"]).as_deref(),
            Some("lower")
        );
        assert_eq!(first_string(&json!({}), &["ThreadId", "threadId"]), None);
    }

    #[test]
    fn usage_limit_defaults_to_allowing_queries() {
        let limit: UsageLimit = serde_json::from_value(json!({})).unwrap();
        assert!(limit.can_make_query);
        assert_eq!(limit.daily_limit, 0);
    }
}
