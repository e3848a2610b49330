//! Host-side session model produced for every inbound event and outbound send.

use serde::{Deserialize, Serialize};

use crate::element::Element;

/// What a session describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionKind {
    /// A message was received.
    Message,
    /// The bot sent a message.
    Send,
    FriendAdded,
    GuildMemberAdded,
    GuildMemberRemoved,
    GuildDeleted,
}

/// A user as far as the host is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

impl User {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            avatar: None,
            is_bot: false,
        }
    }
}

/// Role of the sender inside a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Administrator,
    Member,
    #[default]
    Unknown,
}

impl MemberRole {
    /// Permission bits granted to the role.
    #[must_use]
    pub fn permissions(self) -> u64 {
        match self {
            Self::Owner => 0x1F_FFFF_FFFF,
            Self::Administrator => 0x8,
            Self::Member => 0x800,
            Self::Unknown => 0,
        }
    }
}

/// A decoded message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Normalized plain content (command prefix applied, markers stripped).
    pub content: String,
    pub elements: Vec<Element>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// The message this one replies to, resolved one level deep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Box<Message>>,
    /// Submitted form values, when the message carries a form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Message {
    /// A message known only by id.
    pub fn stub(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// One event delivered to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub kind: SessionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub platform: String,
    pub self_id: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub is_direct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MemberRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl Session {
    pub fn new(kind: SessionKind, platform: impl Into<String>, self_id: impl Into<String>) -> Self {
        Self {
            kind,
            subtype: None,
            platform: platform.into(),
            self_id: self_id.into(),
            timestamp: 0,
            channel_id: None,
            guild_id: None,
            is_direct: false,
            user: None,
            operator_id: None,
            role: None,
            message: None,
        }
    }

    /// Sender id, if the session has a user.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}
