//! Abstract message element tree exchanged with the host framework.
//!
//! Every platform adapter speaks this tree: the outbound encoder walks it and
//! the inbound decoder produces it. The set of kinds is closed; anything the
//! host sends that we do not model lands in [`Element::Unknown`] and is
//! rendered through its children.

use serde::{Deserialize, Serialize};

/// Inline formatting applied to a run of children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    Bold,
    Italic,
    Strikethrough,
    Code,
    Underline,
    Superscript,
    Subscript,
}

/// What happens when a button is pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ButtonAction {
    /// Open a URL.
    Link { url: String },
    /// Copy a value to the clipboard.
    Copy { value: String },
    /// Report the value back to the bot as an event.
    Callback { value: String },
}

/// One node of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Text {
        content: String,
    },
    Br,
    Paragraph {
        #[serde(default)]
        children: Vec<Element>,
    },
    Style {
        style: Style,
        #[serde(default)]
        children: Vec<Element>,
    },
    Heading {
        level: u8,
        #[serde(default)]
        children: Vec<Element>,
    },
    Link {
        href: String,
        #[serde(default)]
        children: Vec<Element>,
    },
    /// Mention of a single user. `name` is looked up when missing.
    At {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Mention of every member of the chat.
    AtAll,
    Quote {
        id: String,
        #[serde(default)]
        children: Vec<Element>,
    },
    Image {
        src: String,
    },
    Video {
        src: String,
    },
    File {
        src: String,
    },
    Audio {
        src: String,
    },
    /// A nested message. With `forward` set, each child is sent on its own.
    Message {
        #[serde(default)]
        forward: bool,
        #[serde(default)]
        children: Vec<Element>,
    },
    Author {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        children: Vec<Element>,
    },
    /// Children must be delivered as a standalone markdown message.
    Markdown {
        #[serde(default)]
        children: Vec<Element>,
    },
    /// Raw HTML markup, passed through verbatim.
    Html {
        content: String,
    },
    Button {
        text: String,
        action: ButtonAction,
    },
    /// Grouping with no meaning of its own (templates, i18n).
    Fragment {
        #[serde(default)]
        children: Vec<Element>,
    },
    Unknown {
        tag: String,
        #[serde(default)]
        children: Vec<Element>,
    },
}

impl Element {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn at(id: impl Into<String>, name: Option<String>) -> Self {
        Self::At {
            id: id.into(),
            name,
        }
    }

    pub fn image(src: impl Into<String>) -> Self {
        Self::Image { src: src.into() }
    }

    pub fn styled(style: Style, children: Vec<Element>) -> Self {
        Self::Style { style, children }
    }

    pub fn message(children: Vec<Element>) -> Self {
        Self::Message {
            forward: false,
            children,
        }
    }

    pub fn forward(children: Vec<Element>) -> Self {
        Self::Message {
            forward: true,
            children,
        }
    }

    /// Short tag name, used in logs.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Br => "br",
            Self::Paragraph { .. } => "p",
            Self::Style { style, .. } => match style {
                Style::Bold => "b",
                Style::Italic => "i",
                Style::Strikethrough => "s",
                Style::Code => "code",
                Style::Underline => "u",
                Style::Superscript => "sup",
                Style::Subscript => "sub",
            },
            Self::Heading { .. } => "h",
            Self::Link { .. } => "a",
            Self::At { .. } | Self::AtAll => "at",
            Self::Quote { .. } => "quote",
            Self::Image { .. } => "img",
            Self::Video { .. } => "video",
            Self::File { .. } => "file",
            Self::Audio { .. } => "audio",
            Self::Message { .. } => "message",
            Self::Author { .. } => "author",
            Self::Markdown { .. } => "markdown",
            Self::Html { .. } => "html",
            Self::Button { .. } => "button",
            Self::Fragment { .. } => "template",
            Self::Unknown { tag, .. } => tag,
        }
    }

    /// Child elements, empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Element] {
        match self {
            Self::Paragraph { children }
            | Self::Style { children, .. }
            | Self::Heading { children, .. }
            | Self::Link { children, .. }
            | Self::Quote { children, .. }
            | Self::Message { children, .. }
            | Self::Author { children, .. }
            | Self::Markdown { children }
            | Self::Fragment { children }
            | Self::Unknown { children, .. } => children,
            Self::Text { .. }
            | Self::Br
            | Self::At { .. }
            | Self::AtAll
            | Self::Image { .. }
            | Self::Video { .. }
            | Self::File { .. }
            | Self::Audio { .. }
            | Self::Html { .. }
            | Self::Button { .. } => &[],
        }
    }
}

/// Concatenate the text content of a tree, ignoring markup and media.
#[must_use]
pub fn plain_text(elements: &[Element]) -> String {
    let mut out = String::new();
    collect_text(elements, &mut out);
    out
}

fn collect_text(elements: &[Element], out: &mut String) {
    for element in elements {
        match element {
            Element::Text { content } => out.push_str(content),
            Element::Br => out.push('\n'),
            Element::At { id, name } => {
                out.push('@');
                out.push_str(name.as_deref().unwrap_or(id));
            },
            other => collect_text(other.children(), out),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn deserializes_tagged_tree() {
        let value = json!([
            { "type": "text", "content": "hi " },
            { "type": "style", "style": "bold", "children": [{ "type": "text", "content": "there" }] },
            { "type": "at", "id": "42" },
            { "type": "message", "forward": true, "children": [] },
            { "type": "button", "text": "open", "action": { "kind": "link", "url": "https://example.com" } }
        ]);
        let elements: Vec<Element> = serde_json::from_value(value).unwrap();
        assert_eq!(elements[0], Element::text("hi "));
        assert_eq!(
            elements[1],
            Element::styled(Style::Bold, vec![Element::text("there")])
        );
        assert_eq!(elements[2], Element::at("42", None));
        assert_eq!(elements[3], Element::forward(Vec::new()));
        assert!(matches!(
            &elements[4],
            Element::Button { action: ButtonAction::Link { url }, .. } if url == "https://example.com"
        ));
    }

    #[test]
    fn plain_text_flattens_markup() {
        let tree = vec![
            Element::text("a"),
            Element::styled(Style::Italic, vec![Element::text("b")]),
            Element::Br,
            Element::at("7", Some("neko".into())),
            Element::image("https://example.com/x.png"),
        ];
        assert_eq!(plain_text(&tree), "ab\n@neko");
    }

    #[test]
    fn unknown_kind_reports_its_tag() {
        let el = Element::Unknown {
            tag: "yunhu:card".into(),
            children: vec![Element::text("x")],
        };
        assert_eq!(el.kind(), "yunhu:card");
        assert_eq!(el.children().len(), 1);
    }
}
