//! Yunhu open API wire types.

use {
    serde::{Deserialize, Deserializer, Serialize},
    std::fmt,
};

use yunhu_common::ButtonAction;

use crate::lattice::ContentType;

/// Receiver kind of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecvType {
    User,
    Group,
}

impl RecvType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

/// A Yunhu chat addressed by host channel id (`private:<id>` or `group:<id>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelTarget {
    pub recv_type: RecvType,
    pub recv_id: String,
}

impl ChannelTarget {
    pub fn parse(channel_id: &str) -> yunhu_channels::Result<Self> {
        let (prefix, id) = channel_id
            .split_once(':')
            .ok_or_else(|| yunhu_channels::Error::invalid_channel_id(channel_id))?;
        let recv_type = match prefix {
            "private" => RecvType::User,
            "group" => RecvType::Group,
            _ => return Err(yunhu_channels::Error::invalid_channel_id(channel_id)),
        };
        if id.is_empty() {
            return Err(yunhu_channels::Error::invalid_channel_id(channel_id));
        }
        Ok(Self {
            recv_type,
            recv_id: id.to_string(),
        })
    }

    #[must_use]
    pub fn private(user_id: impl Into<String>) -> Self {
        Self {
            recv_type: RecvType::User,
            recv_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn group(group_id: impl Into<String>) -> Self {
        Self {
            recv_type: RecvType::Group,
            recv_id: group_id.into(),
        }
    }
}

impl fmt::Display for ChannelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.recv_type {
            RecvType::User => write!(f, "private:{}", self.recv_id),
            RecvType::Group => write!(f, "group:{}", self.recv_id),
        }
    }
}

// ── Outbound ─────────────────────────────────────────────────────────────

/// Body of `POST /bot/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPayload {
    pub recv_id: String,
    pub recv_type: RecvType,
    pub content_type: ContentType,
    pub content: SendContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub at: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

/// A message button. `actionType` 1 opens `url`, 2 copies `value`, 3 reports
/// `value` back to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Button {
    pub text: String,
    pub action_type: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Button {
    #[must_use]
    pub fn new(text: impl Into<String>, action: &ButtonAction) -> Self {
        let text = text.into();
        match action {
            ButtonAction::Link { url } => Self {
                text,
                action_type: 1,
                url: Some(url.clone()),
                value: None,
            },
            ButtonAction::Copy { value } => Self {
                text,
                action_type: 2,
                url: None,
                value: Some(value.clone()),
            },
            ButtonAction::Callback { value } => Self {
                text,
                action_type: 3,
                url: None,
                value: Some(value.clone()),
            },
        }
    }
}

/// Body of `POST /bot/recall`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallPayload {
    pub msg_id: String,
    pub chat_id: String,
    pub chat_type: RecvType,
}

// ── Inbound ──────────────────────────────────────────────────────────────

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A message as delivered by webhooks and the message list API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(deserialize_with = "null_as_default")]
    pub msg_id: String,
    pub parent_id: Option<String>,
    pub sender_id: Option<String>,
    pub sender_nickname: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub send_time: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub chat_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub chat_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content: RawContent,
    pub command_name: Option<String>,
    pub command_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawContent {
    pub text: Option<String>,
    /// Ids of the mentioned users, in mention order.
    #[serde(deserialize_with = "null_as_default")]
    pub at: Vec<String>,
    pub image_url: Option<String>,
    pub image_name: Option<String>,
    pub file_key: Option<String>,
    pub file_name: Option<String>,
    pub video_key: Option<String>,
    /// Submitted form values; delivered either as an object or as a JSON
    /// string.
    pub form_json: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Sender {
    #[serde(deserialize_with = "null_as_default")]
    pub sender_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sender_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sender_user_level: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sender_nickname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Chat {
    #[serde(deserialize_with = "null_as_default")]
    pub chat_id: String,
    /// `bot` for private chats, `group` for groups.
    #[serde(deserialize_with = "null_as_default")]
    pub chat_type: String,
}

impl Chat {
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.chat_type != "group"
    }
}

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    pub header: EventHeader,
    #[serde(default, deserialize_with = "null_as_default")]
    pub event: EventBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventHeader {
    #[serde(deserialize_with = "null_as_default")]
    pub event_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub event_time: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub event_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Member {
    #[serde(deserialize_with = "null_as_default")]
    pub member_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub member_nickname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Inviter {
    #[serde(deserialize_with = "null_as_default")]
    pub inviter_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub inviter_nickname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Operator {
    #[serde(deserialize_with = "null_as_default")]
    pub operator_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub operator_nickname: String,
}

/// Union of every event body shape; each event type fills a subset.
///
/// Follow and membership events are also delivered in a flat form
/// (`userId`, `nickname`, `chatId` at the top level), which is accepted as a
/// fallback.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventBody {
    pub sender: Option<Sender>,
    pub chat: Option<Chat>,
    pub message: Option<RawMessage>,
    pub joined_member: Option<Member>,
    pub leaved_member: Option<Member>,
    pub invited_member: Option<Member>,
    pub kicked_member: Option<Member>,
    pub leave_type: Option<String>,
    pub inviter: Option<Inviter>,
    pub operator: Option<Operator>,
    pub user_id: Option<String>,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub chat_id: Option<String>,
}

// ── API responses ────────────────────────────────────────────────────────

/// Common response envelope of the open and web APIs.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub msg: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendData {
    pub message_info: Option<MessageInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub msg_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub recv_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub recv_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserHomepage {
    pub user: Option<UserInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub user_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub nickname: String,
    #[serde(deserialize_with = "null_as_default")]
    pub avatar_url: String,
}

/// Body of `POST /bot/bot-info`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotInfoQuery<'a> {
    pub bot_id: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotInfoData {
    pub bot: Option<BotInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BotInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub bot_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub nickname: String,
    #[serde(deserialize_with = "null_as_default")]
    pub avatar_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub introduction: String,
    /// Number of users who added the bot.
    #[serde(deserialize_with = "null_as_default")]
    pub headcount: i64,
}

/// Body of `POST /group/group-info`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfoQuery<'a> {
    pub group_id: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupInfoData {
    pub group: Option<GroupInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub group_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub avatar_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub introduction: String,
    #[serde(deserialize_with = "null_as_default")]
    pub headcount: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageList {
    #[serde(deserialize_with = "null_as_default")]
    pub list: Vec<RawMessage>,
    #[serde(deserialize_with = "null_as_default")]
    pub total: i64,
}
