//! Yunhu open API client.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::{
        Client, Response,
        multipart::{Form, Part},
    },
    secrecy::{ExposeSecret, Secret},
    serde::de::DeserializeOwned,
    tracing::debug,
};

use crate::{
    config::YunhuAccountConfig,
    error::{Error, Result},
    lattice::MediaKind,
    resolver::{MentionResolver, MessageSender, QuoteResolver, SentMessage, UserProfile},
    wire::{
        ApiResponse, BotInfo, BotInfoData, BotInfoQuery, ChannelTarget, GroupInfo, GroupInfoData,
        GroupInfoQuery, MessageList, RawMessage, RecallPayload, SendData, SendPayload,
        UserHomepage,
    },
};

/// Response code the APIs use for success.
const CODE_OK: i64 = 1;

/// HTTP client for one bot account.
#[derive(Clone)]
pub struct YunhuApi {
    client: Client,
    token: Secret<String>,
    endpoint: String,
    web_endpoint: String,
}

impl std::fmt::Debug for YunhuApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YunhuApi")
            .field("token", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("web_endpoint", &self.web_endpoint)
            .finish()
    }
}

impl YunhuApi {
    pub fn new(config: &YunhuAccountConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.upload_timeout_secs.max(1)))
            .build()?;
        Ok(Self::with_client(
            client,
            config.token.clone(),
            &config.endpoint,
            &config.web_endpoint,
        ))
    }

    #[must_use]
    pub fn with_client(
        client: Client,
        token: Secret<String>,
        endpoint: &str,
        web_endpoint: &str,
    ) -> Self {
        Self {
            client,
            token,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            web_endpoint: web_endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Shared HTTP client, reused for fetching media.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    fn token(&self) -> (&'static str, &str) {
        ("token", self.token.expose_secret())
    }

    /// `POST /bot/send`.
    pub async fn send(&self, payload: &SendPayload) -> Result<SentMessage> {
        let response = self
            .client
            .post(self.url("bot/send"))
            .query(&[self.token()])
            .json(payload)
            .send()
            .await?;
        let data: Option<SendData> = parse(response).await?;
        let msg_id = data
            .and_then(|d| d.message_info)
            .map(|info| info.msg_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::message("send response carries no message id"))?;
        debug!(recv_id = %payload.recv_id, msg_id = %msg_id, "yunhu send accepted");
        Ok(SentMessage { msg_id })
    }

    /// `POST /bot/recall`.
    pub async fn recall(&self, channel_id: &str, msg_id: &str) -> Result<()> {
        let target = ChannelTarget::parse(channel_id)?;
        let body = RecallPayload {
            msg_id: msg_id.to_string(),
            chat_id: target.recv_id,
            chat_type: target.recv_type,
        };
        let response = self
            .client
            .post(self.url("bot/recall"))
            .query(&[self.token()])
            .json(&body)
            .send()
            .await?;
        let _: Option<serde_json::Value> = parse(response).await?;
        Ok(())
    }

    /// Public profile of a user, from the web API.
    pub async fn user(&self, user_id: &str) -> Result<UserProfile> {
        let response = self
            .client
            .get(format!("{}/user/homepage", self.web_endpoint))
            .query(&[("userId", user_id)])
            .send()
            .await?;
        let data: Option<UserHomepage> = parse(response).await?;
        let user = data
            .and_then(|d| d.user)
            .ok_or_else(|| Error::resolver(format!("user {user_id} not found")))?;
        Ok(UserProfile {
            id: if user.user_id.is_empty() {
                user_id.to_string()
            } else {
                user.user_id
            },
            name: user.nickname,
            avatar: (!user.avatar_url.is_empty()).then_some(user.avatar_url),
        })
    }

    /// Bot profile from the web API. Also serves as a reachability check.
    pub async fn bot_info(&self, bot_id: &str) -> Result<BotInfo> {
        let response = self
            .client
            .post(format!("{}/bot/bot-info", self.web_endpoint))
            .json(&BotInfoQuery { bot_id })
            .send()
            .await?;
        let data: Option<BotInfoData> = parse(response).await?;
        data.and_then(|d| d.bot)
            .ok_or_else(|| Error::resolver(format!("bot {bot_id} not found")))
    }

    /// Group profile from the web API.
    pub async fn group(&self, group_id: &str) -> Result<GroupInfo> {
        let response = self
            .client
            .post(format!("{}/group/group-info", self.web_endpoint))
            .json(&GroupInfoQuery { group_id })
            .send()
            .await?;
        let data: Option<GroupInfoData> = parse(response).await?;
        data.and_then(|d| d.group)
            .ok_or_else(|| Error::resolver(format!("group {group_id} not found")))
    }

    /// `GET /bot/messages`: up to `before` messages before and `after`
    /// messages after `message_id`.
    pub async fn messages(
        &self,
        channel_id: &str,
        message_id: &str,
        before: u32,
        after: u32,
    ) -> Result<Vec<RawMessage>> {
        let target = ChannelTarget::parse(channel_id)?;
        let (before, after) = (before.to_string(), after.to_string());
        let response = self
            .client
            .get(self.url("bot/messages"))
            .query(&[
                self.token(),
                ("chat-id", target.recv_id.as_str()),
                ("chat-type", target.recv_type.as_str()),
                ("message-id", message_id),
                ("before", before.as_str()),
                ("after", after.as_str()),
            ])
            .send()
            .await?;
        let data: Option<MessageList> = parse(response).await?;
        Ok(data.map(|d| d.list).unwrap_or_default())
    }

    /// Look one message up by id in the window around it.
    pub async fn message(&self, channel_id: &str, message_id: &str) -> Result<Option<RawMessage>> {
        let list = self.messages(channel_id, message_id, 1, 1).await?;
        Ok(list.into_iter().find(|m| m.msg_id == message_id))
    }

    /// Multipart `POST /{kind}/upload`, returning the `{kind}Key`.
    pub async fn upload(
        &self,
        kind: MediaKind,
        bytes: Vec<u8>,
        filename: &str,
        mime: &str,
    ) -> Result<String> {
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)?;
        let form = Form::new().part(kind.as_str(), part);
        let response = self
            .client
            .post(self.url(&format!("{kind}/upload")))
            .query(&[self.token()])
            .multipart(form)
            .send()
            .await?;
        let data: Option<serde_json::Value> = parse(response).await?;
        let field = format!("{kind}Key");
        let key = data
            .as_ref()
            .and_then(|d| d.get(&field))
            .and_then(|v| v.as_str())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::message(format!("upload response carries no {field}")))?;
        debug!(kind = %kind, size, filename, "yunhu upload accepted");
        Ok(key.to_string())
    }
}

/// Check the HTTP status and API code, returning the `data` member.
async fn parse<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Api {
            code: i64::from(status.as_u16()),
            msg: body,
        });
    }
    let body: ApiResponse<T> = response.json().await?;
    if body.code != CODE_OK {
        return Err(Error::Api {
            code: body.code,
            msg: body.msg,
        });
    }
    Ok(body.data)
}

#[async_trait]
impl MentionResolver for YunhuApi {
    async fn get_user(&self, user_id: &str) -> Result<UserProfile> {
        self.user(user_id).await
    }
}

#[async_trait]
impl QuoteResolver for YunhuApi {
    async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<Option<RawMessage>> {
        self.message(channel_id, message_id).await
    }
}

#[async_trait]
impl MessageSender for YunhuApi {
    async fn send_message(&self, payload: &SendPayload) -> Result<SentMessage> {
        self.send(payload).await
    }
}
