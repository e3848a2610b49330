//! Inline markup tree of one flush unit and its renderers.
//!
//! The encoder builds a single [`Inline`] tree while walking the host
//! elements; the wire text is produced from it once, at flush time, for the
//! unit's final content type.

use yunhu_common::Style;

use crate::lattice::ContentType;

/// Suffix Yunhu clients expect after a mention name.
pub const MENTION_MARKER: char = '\u{200b}';

/// Label rendered for a mention of every chat member.
pub const EVERYONE_LABEL: &str = "全体成员";

/// An inline container that wraps children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    Paragraph,
    Style(Style),
    Heading(u8),
    Link { href: String },
}

/// One node of the inline tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    /// Markdown source, kept verbatim in markdown and text.
    Source(String),
    Break,
    Mention { name: String },
    Image { url: String },
    Author { id: String, name: String },
    RawHtml(String),
    Node {
        container: Container,
        children: Vec<Inline>,
    },
}

/// Render `nodes` in the text representation of `content_type`.
///
/// Media content types carry no text; they render as markdown so that a
/// caption-less media unit still has a sensible textual form in logs.
#[must_use]
pub fn render(nodes: &[Inline], content_type: ContentType) -> String {
    let mut out = String::new();
    match content_type {
        ContentType::Text => render_text(nodes, &mut out),
        ContentType::Html => render_html(nodes, &mut out),
        ContentType::Markdown | ContentType::Image | ContentType::Video | ContentType::File => {
            render_markdown(nodes, false, &mut out)
        },
    }
    out
}

/// Text form of a mention, shared by every representation.
#[must_use]
pub fn mention_text(name: &str) -> String {
    format!("@{name}{MENTION_MARKER} ")
}

fn render_text(nodes: &[Inline], out: &mut String) {
    for node in nodes {
        match node {
            Inline::Text(text) | Inline::Source(text) | Inline::RawHtml(text) => {
                out.push_str(text);
            },
            Inline::Break => out.push('\n'),
            Inline::Mention { name } => out.push_str(&mention_text(name)),
            Inline::Image { .. } => out.push_str("[image]"),
            Inline::Author { name, .. } => {
                out.push_str(name);
                out.push_str(":\n");
            },
            Inline::Node {
                container,
                children,
            } => match container {
                Container::Paragraph | Container::Heading(_) => {
                    render_text(children, out);
                    out.push('\n');
                },
                Container::Style(_) => render_text(children, out),
                Container::Link { href } => {
                    let mut label = String::new();
                    render_text(children, &mut label);
                    if label.is_empty() || label == *href {
                        out.push_str(href);
                    } else {
                        out.push_str(&format!("{label} ({href})"));
                    }
                },
            },
        }
    }
}

fn markdown_delimiter(style: Style) -> &'static str {
    match style {
        Style::Bold => "**",
        Style::Italic => "*",
        Style::Strikethrough => "~~",
        Style::Code => "`",
        // html-only styles never reach a markdown unit
        Style::Underline | Style::Superscript | Style::Subscript => "",
    }
}

/// Inside a code span (`code`) text is written as is.
fn render_markdown(nodes: &[Inline], code: bool, out: &mut String) {
    for node in nodes {
        match node {
            Inline::Text(text) if !code => out.push_str(&escape_markdown(text)),
            Inline::Text(text) | Inline::Source(text) | Inline::RawHtml(text) => {
                out.push_str(text);
            },
            Inline::Break => out.push('\n'),
            Inline::Mention { name } => out.push_str(&mention_text(name)),
            Inline::Image { url } => out.push_str(&format!("\n![image]({url})\n")),
            Inline::Author { id, name } => out.push_str(&format!("\n**{name}({id})**\n")),
            Inline::Node {
                container,
                children,
            } => match container {
                Container::Paragraph => {
                    render_markdown(children, code, out);
                    out.push('\n');
                },
                Container::Style(style) => {
                    let delimiter = markdown_delimiter(*style);
                    out.push_str(delimiter);
                    render_markdown(children, code || *style == Style::Code, out);
                    out.push_str(delimiter);
                },
                Container::Heading(level) => {
                    out.push_str(&"#".repeat(usize::from(clamp_heading(*level))));
                    out.push(' ');
                    render_markdown(children, code, out);
                    out.push('\n');
                },
                Container::Link { href } => {
                    let mut label = String::new();
                    render_markdown(children, code, &mut label);
                    if label.is_empty() {
                        label.push_str(href);
                    }
                    out.push_str(&format!("[{label}]({href})"));
                },
            },
        }
    }
}

fn html_tag(style: Style) -> &'static str {
    match style {
        Style::Bold => "b",
        Style::Italic => "em",
        Style::Strikethrough => "del",
        Style::Code => "code",
        Style::Underline => "u",
        Style::Superscript => "sup",
        Style::Subscript => "sub",
    }
}

fn render_html(nodes: &[Inline], out: &mut String) {
    for node in nodes {
        match node {
            Inline::Text(text) | Inline::Source(text) => out.push_str(&escape_html(text)),
            Inline::RawHtml(raw) => out.push_str(raw),
            Inline::Break => out.push_str("<br>"),
            Inline::Mention { name } => {
                out.push_str(&format!("<span>{}</span>", escape_html(&mention_text(name))));
            },
            Inline::Image { url } => {
                out.push_str(&format!("<img src=\"{}\">", escape_html(url)));
            },
            Inline::Author { id, name } => out.push_str(&format!(
                "<strong>{}</strong><sub>{}</sub><br>",
                escape_html(name),
                escape_html(id)
            )),
            Inline::Node {
                container,
                children,
            } => {
                let (open, close) = match container {
                    Container::Paragraph => ("<p>".to_string(), "</p>".to_string()),
                    Container::Style(style) => {
                        let tag = html_tag(*style);
                        (format!("<{tag}>"), format!("</{tag}>"))
                    },
                    Container::Heading(level) => {
                        let level = clamp_heading(*level);
                        (format!("<h{level}>"), format!("</h{level}>"))
                    },
                    Container::Link { href } => (
                        format!("<a href=\"{}\">", escape_html(href)),
                        "</a>".to_string(),
                    ),
                };
                out.push_str(&open);
                if children.is_empty()
                    && let Container::Link { href } = container
                {
                    out.push_str(&escape_html(href));
                } else {
                    render_html(children, out);
                }
                out.push_str(&close);
            },
        }
    }
}

fn clamp_heading(level: u8) -> u8 {
    level.clamp(1, 6)
}

/// Backslash-escape characters markdown would read as inline formatting.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']' | '~') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape HTML special characters.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
