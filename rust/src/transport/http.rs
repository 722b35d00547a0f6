use std::time::Duration;

use async_trait::async_trait;

use super::wire::{self, ReplyPayload, SendMessageBody, SendReplyBody};
use super::ChatApi;
use crate::error::{ChatError, ChatResult};
use crate::state::{ChatMessage, Notification};

/// REST client for the chat and notification endpoints.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatApi {
    pub fn new(base_url: &str, request_timeout: Duration) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}{path}/{segment}` with the segment percent-encoded.
    fn url_with_segment(&self, path: &str, segment: &str) -> ChatResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.url(path))
            .map_err(|e| ChatError::InvalidInput(format!("base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ChatError::InvalidInput(format!("base url {:?}", self.base_url)))?
            .push(segment);
        Ok(url)
    }

    async fn get_json(&self, path: &str) -> ChatResult<serde_json::Value> {
        self.get_json_at(path, self.url(path)).await
    }

    /// `endpoint` names the route in errors; `url` is what gets requested.
    async fn get_json_at(
        &self,
        endpoint: &str,
        url: impl reqwest::IntoUrl,
    ) -> ChatResult<serde_json::Value> {
        let resp = self.client.get(url).send().await?;
        let resp = check_status(endpoint, resp)?;
        Ok(resp.json::<serde_json::Value>().await?)
    }

    async fn post_json<B: serde::Serialize + Sync>(&self, path: &str, body: &B) -> ChatResult<()> {
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        check_status(path, resp)?;
        Ok(())
    }
}

fn check_status(path: &str, resp: reqwest::Response) -> ChatResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(ChatError::Status {
        endpoint: path.to_string(),
        status: status.as_u16(),
    })
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn fetch_messages(&self) -> ChatResult<Vec<ChatMessage>> {
        let body = self.get_json("/chat/messages").await?;
        wire::decode_message_list(body)
    }

    async fn send_message(&self, text: &str, sender: &str) -> ChatResult<()> {
        self.post_json(
            "/chat/send",
            &SendMessageBody {
                message: text,
                sender,
            },
        )
        .await
    }

    async fn send_reply(&self, message_id: &str, text: &str, sender: &str) -> ChatResult<()> {
        self.post_json(
            "/chat/reply",
            &SendReplyBody {
                message_id,
                reply: ReplyPayload { message: text },
                sender,
            },
        )
        .await
    }

    async fn fetch_notifications(&self, user_id: &str) -> ChatResult<Vec<Notification>> {
        if user_id.is_empty() || user_id.contains('/') {
            return Err(ChatError::InvalidInput(format!("user id {user_id:?}")));
        }
        let url = self.url_with_segment("/notifications", user_id)?;
        let body = self.get_json_at("/notifications", url).await?;
        wire::decode_notifications(body)
    }
}
