//! Inbound decoder: Yunhu raw message → host element tree.

use {
    futures::future::join_all,
    tracing::{debug, warn},
};

use yunhu_common::{Element, Message, User};

use crate::{
    encoder::MENTION_ALL_ID,
    error::{Error, Result},
    markup::{EVERYONE_LABEL, MENTION_MARKER},
    resolver::Resolvers,
    wire::{Chat, ChannelTarget, RawMessage, Sender},
};

/// Host channel id of the chat a message arrived in.
#[must_use]
pub fn channel_id(chat: &Chat, sender: &Sender, raw: Option<&RawMessage>) -> String {
    let (chat_type, chat_id) = match raw {
        Some(raw) if chat.chat_id.is_empty() => (raw.chat_type.as_str(), raw.chat_id.as_str()),
        _ => (chat.chat_type.as_str(), chat.chat_id.as_str()),
    };
    if chat_type == "group" {
        ChannelTarget::group(chat_id).to_string()
    } else {
        let user_id = match raw {
            Some(raw) if sender.sender_id.is_empty() => raw.sender_id.as_deref().unwrap_or_default(),
            _ => sender.sender_id.as_str(),
        };
        ChannelTarget::private(user_id).to_string()
    }
}

/// Apply the command name of an instruction message to its text.
///
/// `/ping 123` → `ping 123`, `123` → `ping 123`, empty → `ping`. A slash
/// only counts when the whole command word follows it.
#[must_use]
pub fn normalize_command(text: &str, command: &str) -> String {
    if let Some(rest) = text
        .strip_prefix('/')
        .and_then(|t| t.strip_prefix(command))
        && (rest.is_empty() || rest.starts_with(char::is_whitespace))
    {
        format!("{command}{rest}")
    } else if text.trim().is_empty() {
        command.to_string()
    } else {
        format!("{command} {text}")
    }
}

#[derive(Debug)]
struct MentionSpan {
    start: usize,
    end: usize,
    element: Element,
}

/// Decodes raw messages for one account.
#[derive(Debug, Clone)]
pub struct Decoder {
    resolvers: Resolvers,
    resource_endpoint: String,
}

impl Decoder {
    /// `resource_endpoint` is the public base images are served from when a
    /// message only carries an image name.
    pub fn new(resolvers: Resolvers, resource_endpoint: impl Into<String>) -> Self {
        Self {
            resolvers,
            resource_endpoint: resource_endpoint.into(),
        }
    }

    /// Decode one message, resolving its mentions and, one level deep, the
    /// message it replies to. Only a missing message is an error.
    pub async fn decode(
        &self,
        raw: Option<&RawMessage>,
        sender: &Sender,
        chat: &Chat,
    ) -> Result<Message> {
        let raw = raw.ok_or_else(|| Error::malformed("event carries no message"))?;
        let mut message = self.decode_body(raw, sender).await;

        if let Some(parent_id) = raw.parent_id.as_deref().filter(|id| !id.is_empty()) {
            let channel_id = channel_id(chat, sender, Some(raw));
            message.quote = Some(Box::new(self.decode_quote(&channel_id, parent_id).await));
        }
        Ok(message)
    }

    /// Replace the webhook's sender name and avatar with the user's profile.
    /// A failed lookup keeps the webhook fields.
    pub async fn enrich_author(&self, user: &mut User) {
        let lookup = self
            .resolvers
            .bounded("user lookup", self.resolvers.mentions.get_user(&user.id))
            .await;
        match lookup {
            Ok(profile) => {
                if !profile.name.is_empty() {
                    user.name = Some(profile.name);
                }
                if profile.avatar.is_some() {
                    user.avatar = profile.avatar;
                }
            },
            Err(e) => {
                debug!(user_id = %user.id, error = %e, "author lookup failed, keeping webhook fields");
            },
        }
    }

    async fn decode_quote(&self, channel_id: &str, parent_id: &str) -> Message {
        let lookup = self
            .resolvers
            .bounded(
                "message lookup",
                self.resolvers.quotes.get_message(channel_id, parent_id),
            )
            .await;
        match lookup {
            Ok(Some(parent)) => {
                let sender = Sender {
                    sender_id: parent.sender_id.clone().unwrap_or_default(),
                    sender_nickname: parent.sender_nickname.clone().unwrap_or_default(),
                    ..Default::default()
                };
                let mut quote = self.decode_body(&parent, &sender).await;
                if quote.id.is_empty() {
                    quote.id = parent_id.to_string();
                }
                quote
            },
            Ok(None) => {
                debug!(channel_id, parent_id, "quoted message not found");
                Message::stub(parent_id)
            },
            Err(e) => {
                warn!(channel_id, parent_id, error = %e, "failed to resolve quoted message");
                Message::stub(parent_id)
            },
        }
    }

    /// Everything except the quote.
    async fn decode_body(&self, raw: &RawMessage, sender: &Sender) -> Message {
        let text = raw.content.text.as_deref().unwrap_or_default();
        let spans = self.locate_mentions(text, &raw.content.at).await;
        let mut elements = split_text(text, spans);

        if let Some(command) = raw.command_name.as_deref().filter(|c| !c.is_empty()) {
            match elements.first_mut() {
                Some(Element::Text { content }) => *content = normalize_command(content, command),
                Some(_) => elements.insert(0, Element::text(format!("{command} "))),
                None => elements.push(Element::text(command)),
            }
        }

        let content = plain_content(&elements);
        elements.extend(self.media_elements(raw));

        let form = raw.content.form_json.as_ref().and_then(|form| match form {
            serde_json::Value::String(json) => match serde_json::from_str(json) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(msg_id = %raw.msg_id, error = %e, "ignoring invalid form json");
                    None
                },
            },
            serde_json::Value::Null => None,
            other => Some(other.clone()),
        });

        let user_id = if sender.sender_id.is_empty() {
            raw.sender_id.clone().unwrap_or_default()
        } else {
            sender.sender_id.clone()
        };
        let user_name = if sender.sender_nickname.is_empty() {
            raw.sender_nickname.clone()
        } else {
            Some(sender.sender_nickname.clone())
        };

        Message {
            id: raw.msg_id.clone(),
            content,
            elements,
            user: (!user_id.is_empty()).then(|| User::new(user_id, user_name)),
            quote: None,
            form,
            timestamp: (raw.send_time != 0).then_some(raw.send_time),
        }
    }

    fn media_elements(&self, raw: &RawMessage) -> Vec<Element> {
        let mut media = Vec::new();
        let content = &raw.content;
        if let Some(url) = content.image_url.as_deref().filter(|u| !u.is_empty()) {
            media.push(Element::image(url));
        } else if let Some(name) = content.image_name.as_deref().filter(|n| !n.is_empty()) {
            media.push(Element::image(format!("{}{name}", self.resource_endpoint)));
        }
        if let Some(key) = content.file_key.as_deref().filter(|k| !k.is_empty()) {
            media.push(Element::File { src: key.into() });
        }
        if let Some(key) = content.video_key.as_deref().filter(|k| !k.is_empty()) {
            media.push(Element::Video { src: key.into() });
        }
        media
    }

    /// Resolve mentioned ids and find where each appears in `text`.
    async fn locate_mentions(&self, text: &str, ids: &[String]) -> Vec<MentionSpan> {
        let mut unique: Vec<&str> = Vec::new();
        for id in ids {
            if !id.is_empty() && !unique.contains(&id.as_str()) {
                unique.push(id);
            }
        }
        if unique.is_empty() {
            return Vec::new();
        }

        let lookups = unique.iter().map(|id| async move {
            if *id == MENTION_ALL_ID {
                return (*id, Some(EVERYONE_LABEL.to_string()));
            }
            let lookup = self
                .resolvers
                .bounded("user lookup", self.resolvers.mentions.get_user(id))
                .await;
            match lookup {
                Ok(profile) if !profile.name.is_empty() => (*id, Some(profile.name)),
                Ok(_) => (*id, None),
                Err(e) => {
                    warn!(user_id = %id, error = %e, "mention lookup failed, keeping literal text");
                    (*id, None)
                },
            }
        });
        let resolved = join_all(lookups).await;

        let mut spans: Vec<MentionSpan> = Vec::new();
        for (id, name) in &resolved {
            let Some(name) = name else {
                continue;
            };
            let ambiguous = resolved
                .iter()
                .any(|(other, other_name)| other != id && other_name.as_ref() == Some(name));
            if ambiguous {
                debug!(user_id = %id, name = %name, "ambiguous mention name, keeping literal text");
                continue;
            }

            let needle = format!("@{name}");
            let found = text.match_indices(&needle).find(|(start, _)| {
                let end = start + needle.len();
                let bounded = text[end..]
                    .chars()
                    .next()
                    .is_none_or(|c| c.is_whitespace() || c == MENTION_MARKER);
                bounded && !spans.iter().any(|s| *start < s.end && s.start < end)
            });
            if let Some((start, _)) = found {
                let element = if *id == MENTION_ALL_ID {
                    Element::AtAll
                } else {
                    Element::at(*id, Some(name.clone()))
                };
                spans.push(MentionSpan {
                    start,
                    end: start + needle.len(),
                    element,
                });
            }
        }
        spans.sort_by_key(|s| s.start);
        spans
    }
}

/// Split `text` around mention spans, dropping zero-width markers.
fn split_text(text: &str, spans: Vec<MentionSpan>) -> Vec<Element> {
    fn push_text(elements: &mut Vec<Element>, piece: &str) {
        let piece: String = piece.chars().filter(|c| *c != MENTION_MARKER).collect();
        if !piece.is_empty() {
            elements.push(Element::text(piece));
        }
    }

    let mut elements = Vec::new();
    let mut last = 0;
    for span in spans {
        push_text(&mut elements, &text[last..span.start]);
        elements.push(span.element);
        last = span.end;
    }
    push_text(&mut elements, &text[last..]);
    elements
}

/// Plain content of decoded elements: text as is, mentions as `@name`.
fn plain_content(elements: &[Element]) -> String {
    let mut out = String::new();
    for element in elements {
        match element {
            Element::Text { content } => out.push_str(content),
            Element::At { id, name } => {
                out.push('@');
                out.push_str(name.as_deref().unwrap_or(id));
            },
            Element::AtAll => {
                out.push('@');
                out.push_str(EVERYONE_LABEL);
            },
            _ => {},
        }
    }
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use {rstest::rstest, serde_json::json};

    use {
        super::*,
        crate::{resolver::testing::FakeBackend, wire::RawContent},
    };

    fn raw(text: &str) -> RawMessage {
        RawMessage {
            msg_id: "m1".into(),
            send_time: 1_700_000_000_000,
            chat_id: "g1".into(),
            chat_type: "group".into(),
            content_type: "text".into(),
            content: RawContent {
                text: Some(text.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn with_mentions(mut msg: RawMessage, ids: &[&str]) -> RawMessage {
        msg.content.at = ids.iter().map(|id| id.to_string()).collect();
        msg
    }

    fn sender() -> Sender {
        Sender {
            sender_id: "u0".into(),
            sender_nickname: "alice".into(),
            sender_user_level: "member".into(),
            ..Default::default()
        }
    }

    fn group() -> Chat {
        Chat {
            chat_id: "g1".into(),
            chat_type: "group".into(),
        }
    }

    fn decoder(backend: &Arc<FakeBackend>) -> Decoder {
        Decoder::new(backend.resolvers(), "https://img.test/")
    }

    #[rstest]
    #[case("/ping", "ping")]
    #[case("/ping 123", "ping 123")]
    #[case("123", "ping 123")]
    #[case("", "ping")]
    #[case("/pingpong", "ping /pingpong")]
    #[case("/pong 1", "ping /pong 1")]
    #[case("/ping\n2", "ping\n2")]
    fn command_normalization(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(normalize_command(text, "ping"), expected);
    }

    #[rstest]
    #[case("/ping", "ping")]
    #[case("/ping 123", "ping 123")]
    #[case("123", "ping 123")]
    #[case("/pingpong", "ping /pingpong")]
    #[tokio::test]
    async fn decodes_instruction_content(#[case] text: &str, #[case] expected: &str) {
        let backend = Arc::new(FakeBackend::default());
        let mut msg = raw(text);
        msg.command_name = Some("ping".into());
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(decoded.content, expected);
        assert_eq!(decoded.elements, vec![Element::text(expected)]);
    }

    #[tokio::test]
    async fn missing_message_is_malformed() {
        let backend = Arc::new(FakeBackend::default());
        let err = decoder(&backend)
            .decode(None, &sender(), &group())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput { .. }));
    }

    #[tokio::test]
    async fn plain_text_strips_markers() {
        let backend = Arc::new(FakeBackend::default());
        let decoded = decoder(&backend)
            .decode(Some(&raw("hi\u{200b} there")), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(decoded.content, "hi there");
        assert_eq!(decoded.elements, vec![Element::text("hi there")]);
        assert_eq!(decoded.user.unwrap().name.as_deref(), Some("alice"));
        assert_eq!(decoded.timestamp, Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn resolves_mentions_in_place() {
        let backend = Arc::new(
            FakeBackend::default()
                .with_user("u1", "neko")
                .with_user("u2", "inu"),
        );
        let msg = with_mentions(raw("@neko\u{200b} and @inu\u{200b} hi"), &["u1", "u2"]);
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(decoded.elements, vec![
            Element::at("u1", Some("neko".into())),
            Element::text(" and "),
            Element::at("u2", Some("inu".into())),
            Element::text(" hi"),
        ]);
        assert_eq!(decoded.content, "@neko and @inu hi");
    }

    #[tokio::test]
    async fn failed_mention_lookup_keeps_literal_text() {
        let backend = Arc::new(FakeBackend::default());
        let msg = with_mentions(raw("@bob\u{200b} hi"), &["u9"]);
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(decoded.elements, vec![Element::text("@bob hi")]);
        assert_eq!(decoded.content, "@bob hi");
    }

    #[tokio::test]
    async fn timed_out_mention_lookup_keeps_literal_text() {
        let backend = Arc::new(FakeBackend {
            hang_users: true,
            ..Default::default()
        });
        let decoder = Decoder::new(
            backend.resolvers().with_timeout(Duration::from_millis(20)),
            "https://img.test/",
        );
        let msg = with_mentions(raw("@neko hi"), &["u1"]);
        let decoded = decoder.decode(Some(&msg), &sender(), &group()).await.unwrap();
        assert_eq!(decoded.elements, vec![Element::text("@neko hi")]);
    }

    #[tokio::test]
    async fn ambiguous_names_stay_literal() {
        let backend = Arc::new(
            FakeBackend::default()
                .with_user("u1", "neko")
                .with_user("u2", "neko"),
        );
        let msg = with_mentions(raw("@neko @neko"), &["u1", "u2"]);
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(decoded.elements, vec![Element::text("@neko @neko")]);
    }

    #[tokio::test]
    async fn mention_needs_a_boundary() {
        let backend = Arc::new(FakeBackend::default().with_user("u1", "neko"));
        let msg = with_mentions(raw("@nekomata @neko"), &["u1"]);
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(decoded.elements, vec![
            Element::text("@nekomata "),
            Element::at("u1", Some("neko".into())),
        ]);
    }

    #[tokio::test]
    async fn mention_of_everyone() {
        let backend = Arc::new(FakeBackend::default());
        let msg = with_mentions(raw("@全体成员\u{200b} meeting"), &["all"]);
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(decoded.elements, vec![
            Element::AtAll,
            Element::text(" meeting")
        ]);
        assert!(backend.user_lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn command_prefix_before_leading_mention() {
        let backend = Arc::new(FakeBackend::default().with_user("u1", "neko"));
        let mut msg = with_mentions(raw("@neko\u{200b} 5"), &["u1"]);
        msg.command_name = Some("pat".into());
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(decoded.content, "pat @neko 5");
        assert_eq!(decoded.elements[0], Element::text("pat "));
    }

    #[tokio::test]
    async fn media_references_become_elements() {
        let backend = Arc::new(FakeBackend::default());
        let mut msg = raw("");
        msg.content.image_name = Some("abc.png".into());
        msg.content.file_key = Some("fk".into());
        msg.content.video_key = Some("vk".into());
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(decoded.elements, vec![
            Element::image("https://img.test/abc.png"),
            Element::File { src: "fk".into() },
            Element::Video { src: "vk".into() },
        ]);
        assert_eq!(decoded.content, "");
    }

    #[tokio::test]
    async fn direct_image_url_wins_over_name() {
        let backend = Arc::new(FakeBackend::default());
        let mut msg = raw("");
        msg.content.image_url = Some("https://cdn/x.jpg".into());
        msg.content.image_name = Some("x.jpg".into());
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(decoded.elements, vec![Element::image("https://cdn/x.jpg")]);
    }

    #[rstest]
    #[case(json!("{\"name\":\"neko\"}"), Some(json!({ "name": "neko" })))]
    #[case(json!({ "age": 3 }), Some(json!({ "age": 3 })))]
    #[case(json!("{not json"), None)]
    #[tokio::test]
    async fn form_json_is_parsed(
        #[case] form: serde_json::Value,
        #[case] expected: Option<serde_json::Value>,
    ) {
        let backend = Arc::new(FakeBackend::default());
        let mut msg = raw("submit");
        msg.content.form_json = Some(form);
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(decoded.form, expected);
        assert_eq!(decoded.content, "submit");
    }

    #[tokio::test]
    async fn quote_is_resolved_one_level() {
        let mut parent = with_mentions(raw("@neko\u{200b} original"), &["u1"]);
        parent.msg_id = "p1".into();
        parent.parent_id = Some("p0".into());
        parent.sender_id = Some("u1".into());
        parent.sender_nickname = Some("neko".into());
        let backend = Arc::new(
            FakeBackend::default()
                .with_user("u1", "neko")
                .with_message(parent),
        );

        let mut msg = raw("reply");
        msg.parent_id = Some("p1".into());
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();

        let quote = decoded.quote.unwrap();
        assert_eq!(quote.id, "p1");
        assert_eq!(quote.elements, vec![
            Element::at("u1", Some("neko".into())),
            Element::text(" original"),
        ]);
        assert_eq!(quote.user.unwrap().id, "u1");
        assert!(quote.quote.is_none());
    }

    #[tokio::test]
    async fn failed_quote_lookup_yields_stub() {
        let backend = Arc::new(FakeBackend {
            fail_quotes: true,
            ..Default::default()
        });
        let mut msg = raw("reply");
        msg.parent_id = Some("p1".into());
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(*decoded.quote.unwrap(), Message::stub("p1"));
        assert_eq!(decoded.elements, vec![Element::text("reply")]);
    }

    #[tokio::test]
    async fn missing_quote_yields_stub() {
        let backend = Arc::new(FakeBackend::default());
        let mut msg = raw("reply");
        msg.parent_id = Some("gone".into());
        let decoded = decoder(&backend)
            .decode(Some(&msg), &sender(), &group())
            .await
            .unwrap();
        assert_eq!(*decoded.quote.unwrap(), Message::stub("gone"));
    }

    #[rstest]
    #[case("group", "g1", "group:g1")]
    #[case("bot", "b1", "private:u0")]
    fn channel_ids(#[case] chat_type: &str, #[case] chat_id: &str, #[case] expected: &str) {
        let chat = Chat {
            chat_id: chat_id.into(),
            chat_type: chat_type.into(),
        };
        assert_eq!(channel_id(&chat, &sender(), None), expected);
    }
}
