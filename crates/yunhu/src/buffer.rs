//! Content buffer for one outbound flush unit.

use crate::{
    lattice::{ContentType, MediaKind, join},
    markup::{Container, Inline, render},
    wire::{Button, ChannelTarget, SendContent, SendPayload},
};

/// An uploaded media resource held by a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub key: String,
    /// Public URL, known for images only.
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
struct Frame {
    container: Container,
    requirement: ContentType,
    children: Vec<Inline>,
    /// Copy of a container that was open when the previous unit was flushed.
    reopened: bool,
}

/// One in-flight outbound unit: committed type, at most one media reference
/// and the inline tree, plus mentions, quote and buttons.
#[derive(Debug, Clone, Default)]
pub struct ContentUnit {
    committed: Option<ContentType>,
    media: Option<MediaRef>,
    root: Vec<Inline>,
    open: Vec<Frame>,
    mention_ids: Vec<String>,
    quote_id: Option<String>,
    buttons: Vec<Button>,
}

impl ContentUnit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn committed(&self) -> Option<ContentType> {
        self.committed
    }

    pub fn commit(&mut self, content_type: ContentType) {
        self.committed = Some(content_type);
    }

    /// Least type the open containers impose on anything placed inside them.
    #[must_use]
    pub fn floor(&self) -> Option<ContentType> {
        self.open
            .iter()
            .map(|frame| frame.requirement)
            .reduce(|a, b| join(a, b).unwrap_or(b))
    }

    #[must_use]
    pub fn media(&self) -> Option<&MediaRef> {
        self.media.as_ref()
    }

    pub fn set_media(&mut self, media: MediaRef) {
        self.media = Some(media);
    }

    /// Append a node at the current nesting level.
    pub fn push(&mut self, node: Inline) {
        match self.open.last_mut() {
            Some(frame) => frame.children.push(node),
            None => self.root.push(node),
        }
    }

    /// Open a container; nodes pushed until [`Self::close`] land inside it.
    pub fn open(&mut self, container: Container, requirement: ContentType) {
        self.open.push(Frame {
            container,
            requirement,
            children: Vec::new(),
            reopened: false,
        });
    }

    /// Close the innermost open container.
    pub fn close(&mut self) {
        if let Some(frame) = self.open.pop() {
            self.attach(frame);
        }
    }

    fn attach(&mut self, frame: Frame) {
        let keep = !frame.children.is_empty()
            || (!frame.reopened && matches!(frame.container, Container::Link { .. }));
        if keep {
            self.push(Inline::Node {
                container: frame.container,
                children: frame.children,
            });
        }
    }

    /// Whether any inline node has been placed, open containers included.
    #[must_use]
    pub fn has_inline(&self) -> bool {
        !self.root.is_empty() || self.open.iter().any(|frame| !frame.children.is_empty())
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Record a mentioned user id; repeated ids are kept once.
    pub fn add_mention(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.mention_ids.contains(&id) {
            self.mention_ids.push(id);
        }
    }

    #[must_use]
    pub fn mention_ids(&self) -> &[String] {
        &self.mention_ids
    }

    pub fn set_quote(&mut self, id: impl Into<String>) {
        self.quote_id = Some(id.into());
    }

    #[must_use]
    pub fn quote_id(&self) -> Option<&str> {
        self.quote_id.as_deref()
    }

    pub fn add_button(&mut self, button: Button) {
        self.buttons.push(button);
    }

    #[must_use]
    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    /// Finished inline tree. Only complete once every container is closed.
    #[must_use]
    pub fn nodes(&self) -> &[Inline] {
        &self.root
    }

    /// Detach the unit for sending and leave a fresh one in its place.
    ///
    /// Containers still open are closed in the detached unit and reopened,
    /// empty, in the fresh one so nesting stays balanced across both.
    pub fn take(&mut self) -> ContentUnit {
        let reopened = self
            .open
            .iter()
            .map(|frame| Frame {
                container: frame.container.clone(),
                requirement: frame.requirement,
                children: Vec::new(),
                reopened: true,
            })
            .collect();
        let mut finished = std::mem::replace(self, ContentUnit {
            open: reopened,
            ..Default::default()
        });
        while finished.depth() > 0 {
            finished.close();
        }
        finished
    }

    /// Build the wire payload for this unit, `None` when there is nothing to
    /// send. The unit's own quote wins over `reply_to`.
    #[must_use]
    pub fn into_payload(self, target: &ChannelTarget, reply_to: Option<&str>) -> Option<SendPayload> {
        let committed = self.committed.unwrap_or(ContentType::Text);
        let mut content = SendContent::default();

        let content_type = match (committed.media_kind(), &self.media) {
            (Some(kind), Some(media)) if media.kind == kind => {
                let key = Some(media.key.clone());
                match kind {
                    MediaKind::Image => content.image_key = key,
                    MediaKind::Video => content.video_key = key,
                    MediaKind::File => content.file_key = key,
                }
                committed
            },
            (Some(_), _) => ContentType::Text,
            (None, _) => committed,
        };

        if content_type.is_text_family() {
            let text = render(&self.root, content_type);
            if text.trim().is_empty() && self.buttons.is_empty() {
                return None;
            }
            content.text = Some(text);
        }

        content.at = self.mention_ids;
        content.buttons = self.buttons;

        Some(SendPayload {
            recv_id: target.recv_id.clone(),
            recv_type: target.recv_type,
            content_type,
            content,
            parent_id: self.quote_id.or_else(|| reply_to.map(str::to_string)),
        })
    }
}
