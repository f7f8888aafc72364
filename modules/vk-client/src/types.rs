use serde::{Deserialize, Deserializer};

/// Envelope around every VK method response. Exactly one of the two fields
/// is populated by a well-behaved server.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub response: Option<T>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error_code: i64,
    #[serde(default)]
    pub error_msg: String,
}

/// A single profile from `users.get`. Every field is optional: closed or
/// deleted accounts come back with most of them missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VkUser {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub followers_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub subscriptions: Option<u64>,
}

/// `{count, items}` payload shared by `friends.get`, `friends.getRequests`
/// and `groups.get`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdList {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub items: Vec<i64>,
}

/// A group from `groups.getById`.
#[derive(Debug, Clone, Deserialize)]
pub struct VkGroup {
    pub id: Option<i64>,
    pub name: Option<String>,
}

/// Counters arrive either as a bare number or as a `{count, items}` object
/// depending on the requested fields. Anything else is treated as unknown.
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::Object(map)) => map.get("count").and_then(|c| c.as_u64()),
        _ => None,
    })
}
