pub mod error;
pub mod types;

pub use error::{Result, VkError};
pub use types::{IdList, VkGroup, VkUser};

use serde::de::DeserializeOwned;
use types::Envelope;

const BASE_URL: &str = "https://api.vk.com/method";

/// API version every request is pinned to.
pub const API_VERSION: &str = "5.131";

/// Profile fields requested from `users.get`.
const USER_FIELDS: &str = "followers_count,subscriptions";

#[derive(Clone)]
pub struct VkClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl VkClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, BASE_URL)
    }

    /// Point the client at a different host. Used by tests and proxies.
    pub fn with_base_url(token: String, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Call a VK method and unwrap the `response` payload.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, method);
        let resp = self
            .client
            .get(&url)
            .query(&[("access_token", self.token.as_str()), ("v", API_VERSION)])
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VkError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        if let Some(err) = envelope.error {
            return Err(VkError::Api {
                code: err.error_code,
                message: err.error_msg,
            });
        }
        envelope
            .response
            .ok_or_else(|| VkError::Parse(format!("{method}: body has neither response nor error")))
    }

    /// Fetch a user's profile. `Ok(None)` when VK returns an empty list
    /// (unknown or deleted id).
    pub async fn get_user(&self, user_id: &str) -> Result<Option<VkUser>> {
        let users: Vec<VkUser> = self
            .call(
                "users.get",
                &[
                    ("user_ids", user_id.to_string()),
                    ("fields", USER_FIELDS.to_string()),
                ],
            )
            .await?;
        tracing::debug!(user_id, found = !users.is_empty(), "users.get");
        Ok(users.into_iter().next())
    }

    /// Confirmed friends of a user.
    pub async fn get_friends(&self, user_id: &str) -> Result<Vec<i64>> {
        let list: IdList = self
            .call("friends.get", &[("user_id", user_id.to_string())])
            .await?;
        tracing::debug!(user_id, count = list.items.len(), "friends.get");
        Ok(list.items)
    }

    /// Pending (unanswered) friend requests of a user.
    pub async fn get_friend_requests(&self, user_id: &str) -> Result<Vec<i64>> {
        let list: IdList = self
            .call("friends.getRequests", &[("user_id", user_id.to_string())])
            .await?;
        tracing::debug!(user_id, count = list.items.len(), "friends.getRequests");
        Ok(list.items)
    }

    /// Ids of the groups a user belongs to.
    pub async fn get_groups(&self, user_id: &str) -> Result<Vec<i64>> {
        let list: IdList = self
            .call("groups.get", &[("user_id", user_id.to_string())])
            .await?;
        tracing::debug!(user_id, count = list.items.len(), "groups.get");
        Ok(list.items)
    }

    /// Resolve group ids to `{id, name}` in a single batched call.
    /// An empty input returns immediately without touching the network.
    pub async fn get_groups_by_id(&self, group_ids: &[String]) -> Result<Vec<VkGroup>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let groups: Vec<VkGroup> = self
            .call(
                "groups.getById",
                &[
                    ("group_ids", group_ids.join(",")),
                    ("fields", "name".to_string()),
                ],
            )
            .await?;
        tracing::debug!(requested = group_ids.len(), returned = groups.len(), "groups.getById");
        Ok(groups)
    }
}
