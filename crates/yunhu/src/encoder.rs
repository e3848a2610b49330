//! Outbound encoder: element tree → Yunhu send payloads.
//!
//! The tree is walked depth-first once. Every element promotes the current
//! unit's content type through the lattice; when an element cannot share the
//! unit (a second media resource, video or file next to anything, an explicit
//! message boundary) the unit is flushed as one `/bot/send` call and a fresh
//! one is started. Lookup failures degrade the element they belong to and
//! never abort the walk; only a failed send is reported to the caller.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use {
    futures::future::BoxFuture,
    tracing::{debug, info, warn},
};

use {
    yunhu_channels::ChannelEventSink,
    yunhu_common::{Element, Message, Session, SessionKind, Style},
};

use crate::{
    PLATFORM,
    buffer::{ContentUnit, MediaRef},
    error::{Error, Result},
    lattice::{ContentType, MediaKind, Promotion, join, promote},
    markup::{Container, EVERYONE_LABEL, Inline},
    resolver::Resolvers,
    wire::{Button, ChannelTarget, RecvType, SendPayload},
};

/// Id recorded in `at[]` for a mention of every member.
pub const MENTION_ALL_ID: &str = "all";

/// Content type an inline style needs.
#[must_use]
pub fn style_requirement(style: Style) -> ContentType {
    match style {
        Style::Bold | Style::Italic | Style::Strikethrough | Style::Code => ContentType::Markdown,
        Style::Underline | Style::Superscript | Style::Subscript => ContentType::Html,
    }
}

#[derive(Debug, Clone, Copy)]
enum Upload {
    Video,
    File,
    Audio,
}

impl Upload {
    fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::File => "file",
            Self::Audio => "audio",
        }
    }

    fn kind(self) -> MediaKind {
        match self {
            Self::Video | Self::Audio => MediaKind::Video,
            Self::File => MediaKind::File,
        }
    }
}

/// Encodes one outbound element tree for one chat.
pub struct Encoder {
    resolvers: Resolvers,
    target: ChannelTarget,
    reply_to: Option<String>,
    event_sink: Option<Arc<dyn ChannelEventSink>>,
    self_id: String,
    log_payloads: bool,
    unit: ContentUnit,
    in_forward: bool,
    /// Text is markdown source while inside a markdown element.
    in_markdown: bool,
    sent: Vec<String>,
}

impl Encoder {
    pub fn new(resolvers: Resolvers, target: ChannelTarget) -> Self {
        Self {
            resolvers,
            target,
            reply_to: None,
            event_sink: None,
            self_id: String::new(),
            log_payloads: false,
            unit: ContentUnit::new(),
            in_forward: false,
            in_markdown: false,
            sent: Vec::new(),
        }
    }

    /// Message every unit replies to unless it carries its own quote.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: Option<String>) -> Self {
        self.reply_to = reply_to;
        self
    }

    /// Report every successful send as a `send` session.
    #[must_use]
    pub fn with_event_sink(
        mut self,
        sink: Arc<dyn ChannelEventSink>,
        self_id: impl Into<String>,
    ) -> Self {
        self.event_sink = Some(sink);
        self.self_id = self_id.into();
        self
    }

    #[must_use]
    pub fn with_payload_logging(mut self, enabled: bool) -> Self {
        self.log_payloads = enabled;
        self
    }

    /// Encode and send `elements`, returning the ids of the sent messages in
    /// order.
    pub async fn send(mut self, elements: &[Element]) -> Result<Vec<String>> {
        self.render(elements).await?;
        self.flush().await?;
        Ok(self.sent)
    }

    fn render<'a>(&'a mut self, children: &'a [Element]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for child in children {
                self.visit(child).await?;
            }
            Ok(())
        })
    }

    fn visit<'a>(&'a mut self, element: &'a Element) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match element {
                Element::Text { content } => {
                    self.require(ContentType::Text).await?;
                    self.unit.push(if self.in_markdown {
                        Inline::Source(content.clone())
                    } else {
                        Inline::Text(content.clone())
                    });
                },
                Element::Br => {
                    self.require(ContentType::Text).await?;
                    self.unit.push(Inline::Break);
                },
                Element::Paragraph { children } => {
                    self.container(Container::Paragraph, ContentType::Text, children)
                        .await?;
                },
                Element::Style { style, children } => {
                    self.container(Container::Style(*style), style_requirement(*style), children)
                        .await?;
                },
                Element::Heading { level, children } => {
                    self.container(Container::Heading(*level), ContentType::Markdown, children)
                        .await?;
                },
                Element::Link { href, children } => {
                    let link = Container::Link { href: href.clone() };
                    self.container(link, ContentType::Text, children).await?;
                },
                Element::At { id, name } => {
                    let name = match name {
                        Some(name) => name.clone(),
                        None => self.mention_name(id).await,
                    };
                    self.require(ContentType::Text).await?;
                    self.unit.add_mention(id.as_str());
                    self.unit.push(Inline::Mention { name });
                },
                Element::AtAll => {
                    self.require(ContentType::Text).await?;
                    self.unit.add_mention(MENTION_ALL_ID);
                    self.unit.push(Inline::Mention {
                        name: EVERYONE_LABEL.to_string(),
                    });
                },
                Element::Quote { id, children } => {
                    self.unit.set_quote(id.as_str());
                    self.render(children).await?;
                },
                Element::Image { src } => self.image(src).await?,
                Element::Video { src } => self.upload(Upload::Video, src).await?,
                Element::File { src } => self.upload(Upload::File, src).await?,
                Element::Audio { src } => self.upload(Upload::Audio, src).await?,
                Element::Message {
                    forward: true,
                    children,
                } => {
                    self.flush().await?;
                    let outer = std::mem::replace(&mut self.in_forward, true);
                    for child in children {
                        self.visit(child).await?;
                        self.flush().await?;
                    }
                    self.in_forward = outer;
                },
                Element::Message {
                    forward: false,
                    children,
                } => {
                    if self.in_forward {
                        self.render(children).await?;
                    } else {
                        self.flush().await?;
                        self.render(children).await?;
                        self.flush().await?;
                    }
                },
                Element::Author { id, name, children } => {
                    if self.unit.committed().is_some_and(|t| t.media_kind().is_some()) {
                        self.require(ContentType::Text).await?;
                    }
                    self.unit.push(Inline::Author {
                        id: id.clone(),
                        name: name.clone().unwrap_or_else(|| id.clone()),
                    });
                    self.render(children).await?;
                },
                Element::Markdown { children } => {
                    self.flush().await?;
                    self.unit.commit(ContentType::Markdown);
                    let outer = std::mem::replace(&mut self.in_markdown, true);
                    let rendered = self.render(children).await;
                    self.in_markdown = outer;
                    rendered?;
                    self.flush().await?;
                },
                Element::Html { content } => {
                    self.require(ContentType::Html).await?;
                    self.unit.push(Inline::RawHtml(content.clone()));
                },
                Element::Button { text, action } => {
                    self.unit.add_button(Button::new(text.as_str(), action));
                },
                Element::Fragment { children } => self.render(children).await?,
                Element::Unknown { tag, children } => {
                    warn!(tag = %tag, chat_id = %self.target, "unsupported element, rendering its children");
                    self.render(children).await?;
                },
            }
            Ok(())
        })
    }

    /// Promote the unit to admit an element needing `required`, flushing first
    /// when the two cannot share a unit.
    async fn require(&mut self, required: ContentType) -> Result<()> {
        let required = match self.unit.floor() {
            Some(floor) if required.media_kind().is_none() || required == ContentType::Image => {
                join(floor, required).unwrap_or(required)
            },
            _ => required,
        };
        let current = self
            .unit
            .committed()
            .or_else(|| self.unit.has_inline().then_some(ContentType::Text));
        match promote(current, required) {
            Promotion::Promote(next) => self.unit.commit(next),
            Promotion::FlushThen(next) => {
                self.flush().await?;
                self.unit.commit(next);
            },
        }
        Ok(())
    }

    async fn container(
        &mut self,
        container: Container,
        requirement: ContentType,
        children: &[Element],
    ) -> Result<()> {
        self.require(requirement).await?;
        self.unit.open(container, requirement);
        let result = self.render(children).await;
        self.unit.close();
        result
    }

    async fn mention_name(&self, user_id: &str) -> String {
        let lookup = self
            .resolvers
            .bounded("user lookup", self.resolvers.mentions.get_user(user_id))
            .await;
        match lookup {
            Ok(profile) if !profile.name.is_empty() => profile.name,
            Ok(_) => user_id.to_string(),
            Err(e) => {
                warn!(user_id, error = %e, "mention lookup failed, falling back to id");
                user_id.to_string()
            },
        }
    }

    async fn image(&mut self, src: &str) -> Result<()> {
        let uploaded = self
            .resolvers
            .bounded_upload("image upload", self.resolvers.media.upload_image(src))
            .await;
        match uploaded {
            Ok(image) => {
                if self.unit.media().is_some() {
                    self.flush().await?;
                }
                self.require(ContentType::Image).await?;
                self.unit.set_media(MediaRef {
                    kind: MediaKind::Image,
                    key: image.key,
                    url: Some(image.url.clone()),
                });
                self.unit.push(Inline::Image { url: image.url });
                Ok(())
            },
            Err(e) => {
                warn!(chat_id = %self.target, error = %e, "image upload failed");
                self.failure_marker("image", &e).await
            },
        }
    }

    async fn upload(&mut self, upload: Upload, src: &str) -> Result<()> {
        let media = &self.resolvers.media;
        let uploaded = match upload {
            Upload::Video => {
                self.resolvers
                    .bounded_upload("video upload", media.upload_video(src))
                    .await
            },
            Upload::File => {
                self.resolvers
                    .bounded_upload("file upload", media.upload_file(src))
                    .await
            },
            Upload::Audio => {
                self.resolvers
                    .bounded_upload("audio upload", media.upload_audio(src))
                    .await
            },
        };
        match uploaded {
            Ok(key) => {
                let kind = upload.kind();
                if self.unit.media().is_some() {
                    self.flush().await?;
                }
                self.require(ContentType::from(kind)).await?;
                self.unit.set_media(MediaRef {
                    kind,
                    key,
                    url: None,
                });
                Ok(())
            },
            Err(e) => {
                warn!(chat_id = %self.target, error = %e, "{} upload failed", upload.label());
                self.failure_marker(upload.label(), &e).await
            },
        }
    }

    /// Replace a failed media element with a bracketed text marker.
    async fn failure_marker(&mut self, label: &str, error: &Error) -> Result<()> {
        let marker = match error {
            Error::SizeLimitExceeded { .. } => format!("[{label} too large]"),
            _ => format!("[{label} upload failed]"),
        };
        self.require(ContentType::Text).await?;
        self.unit.push(Inline::Text(marker));
        Ok(())
    }

    /// Send the current unit, if it holds anything, and start a fresh one.
    async fn flush(&mut self) -> Result<()> {
        let unit = self.unit.take();
        let Some(payload) = unit.into_payload(&self.target, self.reply_to.as_deref()) else {
            return Ok(());
        };

        if self.log_payloads {
            info!(chat_id = %self.target, payload = ?payload, "yunhu send payload");
        } else {
            debug!(chat_id = %self.target, payload = ?payload, "yunhu send payload");
        }

        let sent = self
            .resolvers
            .sender
            .send_message(&payload)
            .await
            .map_err(|e| {
                warn!(chat_id = %self.target, content_type = %payload.content_type, error = %e, "yunhu send failed");
                Error::transport(e)
            })?;

        debug!(
            chat_id = %self.target,
            content_type = %payload.content_type,
            msg_id = %sent.msg_id,
            "yunhu message sent"
        );
        self.emit_sent(&payload, &sent.msg_id).await;
        self.sent.push(sent.msg_id);
        Ok(())
    }

    async fn emit_sent(&self, payload: &SendPayload, msg_id: &str) {
        let Some(sink) = &self.event_sink else {
            return;
        };
        let content = payload.content.text.clone().unwrap_or_default();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or_default();

        let mut session = Session::new(SessionKind::Send, PLATFORM, self.self_id.as_str());
        session.timestamp = timestamp;
        session.channel_id = Some(self.target.to_string());
        session.is_direct = self.target.recv_type == RecvType::User;
        if self.target.recv_type == RecvType::Group {
            session.guild_id = Some(self.target.recv_id.clone());
        }
        session.message = Some(Message {
            id: msg_id.to_string(),
            elements: if content.is_empty() {
                Vec::new()
            } else {
                vec![Element::text(content.as_str())]
            },
            content,
            timestamp: Some(timestamp),
            ..Default::default()
        });
        sink.emit(session).await;
    }
}
