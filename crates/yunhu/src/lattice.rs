//! Content-type lattice for one outbound flush unit.
//!
//! Text-family types form a chain `text < markdown < html`. Media kinds sit
//! beside the chain: an image can join text by promoting the unit to markdown
//! (the only way the wire format carries "text with an inline image"), while
//! video and file never share a unit with anything.

use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Kind of an uploaded media resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    File,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::File => "file",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire `contentType` of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Markdown,
    Html,
    Image,
    Video,
    File,
}

impl ContentType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Image => "image",
            Self::Video => "video",
            Self::File => "file",
        }
    }

    /// Position on the text chain, `None` for media kinds.
    fn text_rank(self) -> Option<u8> {
        match self {
            Self::Text => Some(0),
            Self::Markdown => Some(1),
            Self::Html => Some(2),
            Self::Image | Self::Video | Self::File => None,
        }
    }

    #[must_use]
    pub fn is_text_family(self) -> bool {
        self.text_rank().is_some()
    }

    #[must_use]
    pub fn media_kind(self) -> Option<MediaKind> {
        match self {
            Self::Image => Some(MediaKind::Image),
            Self::Video => Some(MediaKind::Video),
            Self::File => Some(MediaKind::File),
            Self::Text | Self::Markdown | Self::Html => None,
        }
    }
}

impl From<MediaKind> for ContentType {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => Self::Image,
            MediaKind::Video => Self::Video,
            MediaKind::File => Self::File,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Least type able to carry both `a` and `b` in one unit, `None` when they
/// cannot share a unit.
#[must_use]
pub fn join(a: ContentType, b: ContentType) -> Option<ContentType> {
    use ContentType::*;

    match (a, b) {
        (Video | File, _) | (_, Video | File) => None,
        (Image, Image) => None,
        (Image, t) | (t, Image) => Some(max_text(Markdown, t)),
        (a, b) => Some(max_text(a, b)),
    }
}

fn max_text(a: ContentType, b: ContentType) -> ContentType {
    if a.text_rank() >= b.text_rank() {
        a
    } else {
        b
    }
}

/// Committed type of a unit holding every type in `types`, or `None` when
/// they cannot share a unit. An empty unit commits as text.
#[must_use]
pub fn least_upper_bound(types: impl IntoIterator<Item = ContentType>) -> Option<ContentType> {
    let mut iter = types.into_iter();
    let Some(first) = iter.next() else {
        return Some(ContentType::Text);
    };
    iter.try_fold(first, join)
}

/// Outcome of promoting a unit's committed type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// The unit can absorb the element at this type.
    Promote(ContentType),
    /// The unit must be flushed; the element starts a fresh unit at this type.
    FlushThen(ContentType),
}

/// Promote `current` (`None` = unset) to admit an element requiring `required`.
#[must_use]
pub fn promote(current: Option<ContentType>, required: ContentType) -> Promotion {
    match current {
        None => Promotion::Promote(required),
        Some(current) => match join(current, required) {
            Some(next) => Promotion::Promote(next),
            None => Promotion::FlushThen(required),
        },
    }
}
