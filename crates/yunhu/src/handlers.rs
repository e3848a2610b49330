//! Webhook event → host session adaptation.

use tracing::debug;

use yunhu_common::{MemberRole, Session, SessionKind, User};

use crate::{
    PLATFORM,
    decoder::{Decoder, channel_id},
    error::{Error, Result},
    wire::{ChannelTarget, EventBody, Member, WebhookEnvelope},
};

/// Role of a message sender from `senderUserLevel`.
#[must_use]
pub fn member_role(level: &str) -> MemberRole {
    match level {
        "owner" => MemberRole::Owner,
        "administrator" => MemberRole::Administrator,
        "member" => MemberRole::Member,
        _ => MemberRole::Unknown,
    }
}

/// Adapt one webhook event. Unknown event types yield `Ok(None)`.
pub async fn adapt_event(
    envelope: &WebhookEnvelope,
    decoder: &Decoder,
    self_id: &str,
) -> Result<Option<Session>> {
    let event = &envelope.event;
    let event_type = envelope.header.event_type.as_str();
    let mut session = match event_type {
        "message.receive.normal" | "message.receive.instruction" => {
            message_session(event, decoder, self_id).await?
        },
        "bot.followed" => {
            let user = event
                .sender
                .as_ref()
                .filter(|s| !s.sender_id.is_empty())
                .map(|s| User::new(&s.sender_id, non_empty(&s.sender_nickname)))
                .or_else(|| flat_user(event))
                .ok_or_else(|| Error::malformed("bot.followed without user"))?;
            let mut session = Session::new(SessionKind::FriendAdded, PLATFORM, self_id);
            session.channel_id = Some(ChannelTarget::private(&user.id).to_string());
            session.is_direct = true;
            session.user = Some(user);
            session
        },
        "group.member.joined" => member_session(
            event,
            SessionKind::GuildMemberAdded,
            None,
            event.joined_member.as_ref(),
            sender_id(event),
            self_id,
        )?,
        "group.member.leaved" => {
            let subtype = if event.leave_type.as_deref() == Some("self") {
                "leave"
            } else {
                "kick"
            };
            member_session(
                event,
                SessionKind::GuildMemberRemoved,
                Some(subtype),
                event.leaved_member.as_ref(),
                sender_id(event),
                self_id,
            )?
        },
        "group.member.invited" => member_session(
            event,
            SessionKind::GuildMemberAdded,
            Some("invite"),
            event.invited_member.as_ref(),
            event
                .inviter
                .as_ref()
                .and_then(|i| non_empty(&i.inviter_id)),
            self_id,
        )?,
        "group.member.kicked" => member_session(
            event,
            SessionKind::GuildMemberRemoved,
            Some("kick"),
            event.kicked_member.as_ref(),
            operator_id(event),
            self_id,
        )?,
        "group.disbanded" => {
            let guild_id =
                group_id(event).ok_or_else(|| Error::malformed("group.disbanded without chat"))?;
            let mut session = Session::new(SessionKind::GuildDeleted, PLATFORM, self_id);
            session.channel_id = Some(ChannelTarget::group(&guild_id).to_string());
            session.guild_id = Some(guild_id);
            session.operator_id = operator_id(event);
            session
        },
        other => {
            debug!(event_type = other, event_id = %envelope.header.event_id, "ignoring unhandled yunhu event");
            return Ok(None);
        },
    };
    if session.timestamp == 0 {
        session.timestamp = envelope.header.event_time;
    }
    Ok(Some(session))
}

async fn message_session(event: &EventBody, decoder: &Decoder, self_id: &str) -> Result<Session> {
    let sender = event.sender.clone().unwrap_or_default();
    let chat = event.chat.clone().unwrap_or_default();
    let mut message = decoder
        .decode(event.message.as_ref(), &sender, &chat)
        .await?;
    if let Some(author) = message.user.as_mut() {
        decoder.enrich_author(author).await;
    }

    let mut session = Session::new(SessionKind::Message, PLATFORM, self_id);
    session.channel_id = Some(channel_id(&chat, &sender, event.message.as_ref()));
    session.is_direct = !session
        .channel_id
        .as_deref()
        .is_some_and(|id| id.starts_with("group:"));
    if !session.is_direct {
        session.guild_id = session
            .channel_id
            .as_deref()
            .and_then(|id| id.strip_prefix("group:"))
            .map(str::to_string);
    }
    session.role = Some(member_role(&sender.sender_user_level));
    session.timestamp = message.timestamp.unwrap_or_default();
    session.user = message.user.clone();
    session.message = Some(message);
    Ok(session)
}

fn member_session(
    event: &EventBody,
    kind: SessionKind,
    subtype: Option<&str>,
    member: Option<&Member>,
    operator_id: Option<String>,
    self_id: &str,
) -> Result<Session> {
    let user = member
        .filter(|m| !m.member_id.is_empty())
        .map(|m| User::new(&m.member_id, non_empty(&m.member_nickname)))
        .or_else(|| flat_user(event))
        .ok_or_else(|| Error::malformed("membership event without member"))?;
    let guild_id =
        group_id(event).ok_or_else(|| Error::malformed("membership event without chat"))?;

    let mut session = Session::new(kind, PLATFORM, self_id);
    session.subtype = subtype.map(str::to_string);
    session.channel_id = Some(ChannelTarget::group(&guild_id).to_string());
    session.guild_id = Some(guild_id);
    session.user = Some(user);
    session.operator_id = operator_id;
    Ok(session)
}

fn flat_user(event: &EventBody) -> Option<User> {
    let id = event.user_id.as_deref().filter(|id| !id.is_empty())?;
    let mut user = User::new(id, event.nickname.clone().filter(|n| !n.is_empty()));
    user.avatar = event.avatar_url.clone().filter(|a| !a.is_empty());
    Some(user)
}

fn group_id(event: &EventBody) -> Option<String> {
    event
        .chat
        .as_ref()
        .and_then(|c| non_empty(&c.chat_id))
        .or_else(|| event.chat_id.clone().filter(|id| !id.is_empty()))
}

fn sender_id(event: &EventBody) -> Option<String> {
    event.sender.as_ref().and_then(|s| non_empty(&s.sender_id))
}

fn operator_id(event: &EventBody) -> Option<String> {
    event
        .operator
        .as_ref()
        .and_then(|o| non_empty(&o.operator_id))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::resolver::testing::FakeBackend,
        rstest::rstest,
        serde_json::{Value, json},
        std::sync::Arc,
        yunhu_common::Element,
    };

    fn decoder() -> Decoder {
        let backend = Arc::new(FakeBackend::default().with_user("u1", "neko"));
        Decoder::new(backend.resolvers(), "https://img.test/")
    }

    fn envelope(event_type: &str, event: Value) -> WebhookEnvelope {
        serde_json::from_value(json!({
            "version": "1.0",
            "header": { "eventId": "e1", "eventTime": 1_700_000_000_123_i64, "eventType": event_type },
            "event": event,
        }))
        .unwrap()
    }

    async fn adapt(event_type: &str, event: Value) -> Option<Session> {
        adapt_event(&envelope(event_type, event), &decoder(), "bot1")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn group_message() {
        let session = adapt(
            "message.receive.normal",
            json!({
                "sender": { "senderId": "u1", "senderType": "user", "senderUserLevel": "administrator", "senderNickname": "neko" },
                "chat": { "chatId": "g1", "chatType": "group" },
                "message": {
                    "msgId": "m1", "sendTime": 1_700_000_000_000_i64, "chatId": "g1",
                    "chatType": "group", "contentType": "text", "content": { "text": "hello" }
                }
            }),
        )
        .await
        .unwrap();

        assert_eq!(session.kind, SessionKind::Message);
        assert_eq!(session.platform, "yunhu");
        assert_eq!(session.self_id, "bot1");
        assert_eq!(session.channel_id.as_deref(), Some("group:g1"));
        assert_eq!(session.guild_id.as_deref(), Some("g1"));
        assert!(!session.is_direct);
        assert_eq!(session.role, Some(MemberRole::Administrator));
        assert_eq!(session.timestamp, 1_700_000_000_000);
        assert_eq!(session.user_id(), Some("u1"));
        let message = session.message.unwrap();
        assert_eq!(message.id, "m1");
        assert_eq!(message.content, "hello");
    }

    #[tokio::test]
    async fn message_author_is_enriched_from_profile() {
        let mut backend = FakeBackend::default().with_user("u1", "neko");
        backend
            .avatars
            .insert("u1".into(), "https://img.test/neko.png".into());
        let backend = Arc::new(backend);
        let decoder = Decoder::new(backend.resolvers(), "https://img.test/");
        let event = json!({
            "sender": { "senderId": "u1", "senderUserLevel": "member", "senderNickname": "old name" },
            "chat": { "chatId": "g1", "chatType": "group" },
            "message": {
                "msgId": "m1", "chatId": "g1", "chatType": "group",
                "contentType": "text", "content": { "text": "hi" }
            }
        });

        let session = adapt_event(&envelope("message.receive.normal", event), &decoder, "bot1")
            .await
            .unwrap()
            .unwrap();
        let user = session.user.unwrap();
        assert_eq!(user.name.as_deref(), Some("neko"));
        assert_eq!(user.avatar.as_deref(), Some("https://img.test/neko.png"));
        let author = session.message.unwrap().user.unwrap();
        assert_eq!(author.name.as_deref(), Some("neko"));
        assert_eq!(*backend.user_lookups.lock().unwrap(), vec!["u1"]);
    }

    #[tokio::test]
    async fn failed_profile_lookup_keeps_webhook_sender() {
        let session = adapt(
            "message.receive.normal",
            json!({
                "sender": { "senderId": "u9", "senderNickname": "stranger" },
                "chat": { "chatId": "bot1", "chatType": "bot" },
                "message": {
                    "msgId": "m3", "chatId": "bot1", "chatType": "bot",
                    "contentType": "text", "content": { "text": "hi" }
                }
            }),
        )
        .await
        .unwrap();
        let user = session.user.unwrap();
        assert_eq!(user.id, "u9");
        assert_eq!(user.name.as_deref(), Some("stranger"));
        assert!(user.avatar.is_none());
    }

    #[tokio::test]
    async fn private_instruction_message() {
        let session = adapt(
            "message.receive.instruction",
            json!({
                "sender": { "senderId": "u1", "senderUserLevel": "unknown", "senderNickname": "neko" },
                "chat": { "chatId": "bot1", "chatType": "bot" },
                "message": {
                    "msgId": "m2", "sendTime": 5, "chatId": "bot1", "chatType": "bot",
                    "contentType": "text", "content": { "text": "123" },
                    "commandName": "ping", "commandId": 7
                }
            }),
        )
        .await
        .unwrap();

        assert_eq!(session.channel_id.as_deref(), Some("private:u1"));
        assert!(session.is_direct);
        assert!(session.guild_id.is_none());
        assert_eq!(session.role, Some(MemberRole::Unknown));
        let message = session.message.unwrap();
        assert_eq!(message.content, "ping 123");
        assert_eq!(message.elements, vec![Element::Text {
            content: "ping 123".into()
        }]);
    }

    #[tokio::test]
    async fn message_event_without_message_is_malformed() {
        let err = adapt_event(
            &envelope(
                "message.receive.normal",
                json!({ "sender": { "senderId": "u1" }, "chat": { "chatId": "g1", "chatType": "group" } }),
            ),
            &decoder(),
            "bot1",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::MalformedInput { .. }));
    }

    #[tokio::test]
    async fn followed_nested_and_flat() {
        let nested = adapt(
            "bot.followed",
            json!({ "sender": { "senderId": "u7", "senderNickname": "kit" } }),
        )
        .await
        .unwrap();
        assert_eq!(nested.kind, SessionKind::FriendAdded);
        assert_eq!(nested.channel_id.as_deref(), Some("private:u7"));
        assert!(nested.is_direct);
        assert_eq!(nested.user.as_ref().unwrap().name.as_deref(), Some("kit"));
        assert_eq!(nested.timestamp, 1_700_000_000_123);

        let flat = adapt(
            "bot.followed",
            json!({ "userId": "u8", "nickname": "fox", "avatarUrl": "https://img.test/fox.png" }),
        )
        .await
        .unwrap();
        assert_eq!(flat.user_id(), Some("u8"));
        assert_eq!(
            flat.user.unwrap().avatar.as_deref(),
            Some("https://img.test/fox.png")
        );
    }

    #[rstest]
    #[case::joined(
        "group.member.joined",
        json!({ "joinedMember": { "memberId": "u2" }, "sender": { "senderId": "u2" } }),
        SessionKind::GuildMemberAdded, None, Some("u2")
    )]
    #[case::left_self(
        "group.member.leaved",
        json!({ "leavedMember": { "memberId": "u2" }, "leaveType": "self", "sender": { "senderId": "u2" } }),
        SessionKind::GuildMemberRemoved, Some("leave"), Some("u2")
    )]
    #[case::left_kicked(
        "group.member.leaved",
        json!({ "leavedMember": { "memberId": "u2" }, "leaveType": "kick", "sender": { "senderId": "admin" } }),
        SessionKind::GuildMemberRemoved, Some("kick"), Some("admin")
    )]
    #[case::invited(
        "group.member.invited",
        json!({ "invitedMember": { "memberId": "u2" }, "inviter": { "inviterId": "u3" } }),
        SessionKind::GuildMemberAdded, Some("invite"), Some("u3")
    )]
    #[case::kicked(
        "group.member.kicked",
        json!({ "kickedMember": { "memberId": "u2" }, "operator": { "operatorId": "owner" } }),
        SessionKind::GuildMemberRemoved, Some("kick"), Some("owner")
    )]
    #[tokio::test]
    async fn membership_events(
        #[case] event_type: &str,
        #[case] body: Value,
        #[case] kind: SessionKind,
        #[case] subtype: Option<&str>,
        #[case] operator: Option<&str>,
    ) {
        let mut body = body;
        body["chat"] = json!({ "chatId": "g1", "chatType": "group" });
        let session = adapt(event_type, body).await.unwrap();
        assert_eq!(session.kind, kind);
        assert_eq!(session.subtype.as_deref(), subtype);
        assert_eq!(session.operator_id.as_deref(), operator);
        assert_eq!(session.user_id(), Some("u2"));
        assert_eq!(session.guild_id.as_deref(), Some("g1"));
        assert_eq!(session.channel_id.as_deref(), Some("group:g1"));
    }

    #[tokio::test]
    async fn flat_membership_event() {
        let session = adapt(
            "group.member.joined",
            json!({ "userId": "u5", "nickname": "owl", "chatId": "g9" }),
        )
        .await
        .unwrap();
        assert_eq!(session.user_id(), Some("u5"));
        assert_eq!(session.guild_id.as_deref(), Some("g9"));
    }

    #[tokio::test]
    async fn disbanded() {
        let session = adapt(
            "group.disbanded",
            json!({ "chat": { "chatId": "g1", "chatType": "group" }, "operator": { "operatorId": "owner" } }),
        )
        .await
        .unwrap();
        assert_eq!(session.kind, SessionKind::GuildDeleted);
        assert_eq!(session.guild_id.as_deref(), Some("g1"));
        assert_eq!(session.operator_id.as_deref(), Some("owner"));
    }

    #[tokio::test]
    async fn unknown_event_is_ignored() {
        assert!(adapt("bot.shortcut.menu", json!({})).await.is_none());
    }

    #[tokio::test]
    async fn membership_without_member_is_malformed() {
        let err = adapt_event(
            &envelope("group.member.joined", json!({ "chat": { "chatId": "g1" } })),
            &decoder(),
            "bot1",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::MalformedInput { .. }));
    }

    #[rstest]
    #[case("owner", MemberRole::Owner)]
    #[case("administrator", MemberRole::Administrator)]
    #[case("member", MemberRole::Member)]
    #[case("", MemberRole::Unknown)]
    fn roles(#[case] level: &str, #[case] role: MemberRole) {
        assert_eq!(member_role(level), role);
    }
}
