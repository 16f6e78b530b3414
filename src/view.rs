//! HTML rendering of [`AppState`].
//!
//! Pure functions: state in, markup out. Class names match the stylesheet
//! served by the backend.

use crate::chat::SUGGESTIONS;
use crate::markdown::format_markdown;
use crate::overlay::Overlay;
use crate::state::{AppState, EntryKind, Sidebar, TranscriptEntry};
use crate::upload::{AttachmentKind, UploadProgress, UploadQueue};

pub const WELCOME_HEADING: &str = "What can MathMentor help with?";
pub const COMPOSER_PLACEHOLDER: &str = "Ask anything about math...";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const VOID_TAGS: &[&str] = &["img", "br", "input"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element {
        tag: &'static str,
        attrs: Vec<(&'static str, String)>,
        children: Vec<Node>,
    },
    Text(String),
    /// Already-rendered markup, inserted as is.
    Raw(String),
}

impl Node {
    pub fn el(tag: &'static str) -> Self {
        Node::Element {
            tag,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn raw(html: impl Into<String>) -> Self {
        Node::Raw(html.into())
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        if let Node::Element { attrs, .. } = &mut self {
            attrs.push((name, value.into()));
        }
        self
    }

    pub fn class(self, value: impl Into<String>) -> Self {
        self.attr("class", value)
    }

    pub fn child(mut self, node: Node) -> Self {
        if let Node::Element { children, .. } = &mut self {
            children.push(node);
        }
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        if let Node::Element { children, .. } = &mut self {
            children.extend(nodes);
        }
        self
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&escape_html(text)),
            Node::Raw(html) => out.push_str(html),
            Node::Element {
                tag,
                attrs,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
                }
                out.push('>');
                if VOID_TAGS.contains(tag) {
                    return;
                }
                for child in children {
                    child.write_html(out);
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
    }
}

fn classes(base: &str, extra: Option<&str>) -> String {
    match extra {
        Some(extra) => format!("{} {}", base, extra),
        None => base.to_string(),
    }
}

pub fn render_sidebar(state: &AppState) -> Node {
    let items = match &state.sidebar {
        Sidebar::Error(message) => {
            return Node::el("div")
                .class("chat-list")
                .child(Node::el("div").class("error-message").child(Node::text(message)));
        }
        Sidebar::Items(items) => items,
    };

    let rows = items.iter().map(|item| {
        let editing = state
            .title_edit
            .as_ref()
            .filter(|edit| edit.session_id == item.session_id);
        let title = match editing {
            Some(edit) => Node::el("div")
                .class("chat-title editing")
                .attr("contenteditable", "true")
                .child(Node::text(&edit.draft)),
            None => Node::el("div")
                .class("chat-title")
                .child(Node::text(&item.title)),
        };
        let menu_open = state
            .overlays
            .is_open(&Overlay::SessionMenu(item.session_id.clone()));

        Node::el("div")
            .class(classes("chat-item", item.active.then_some("active")))
            .attr("data-session-id", &item.session_id)
            .child(title)
            .child(
                Node::el("div")
                    .class("chat-actions")
                    .child(Node::el("button").class("more-btn").child(Node::text("⋯")))
                    .child(
                        Node::el("div")
                            .class(classes("more-menu", menu_open.then_some("active")))
                            .child(
                                Node::el("div")
                                    .class("menu-item edit-title")
                                    .child(Node::text("Rename")),
                            )
                            .child(
                                Node::el("div")
                                    .class("menu-item delete-chat")
                                    .child(Node::text("Delete")),
                            ),
                    ),
            )
    });

    Node::el("div").class("chat-list").children(rows)
}

pub fn render_welcome() -> Node {
    let cards = SUGGESTIONS.iter().enumerate().map(|(index, suggestion)| {
        Node::el("div")
            .class("suggestion-card")
            .attr("data-index", index.to_string())
            .child(
                Node::el("div")
                    .class("suggestion-title")
                    .child(Node::text(suggestion.title)),
            )
            .child(
                Node::el("div")
                    .class("suggestion-text")
                    .child(Node::text(suggestion.prompt)),
            )
    });

    Node::el("div")
        .class("welcome-container")
        .child(Node::el("h1").child(Node::text(WELCOME_HEADING)))
        .child(Node::el("div").class("suggestion-cards").children(cards))
}

fn render_entry(entry: &TranscriptEntry) -> Node {
    let (wrapper, message, content) = match entry.kind {
        EntryKind::User => (
            "user-message-wrapper",
            "message user-message",
            Node::raw(format_markdown(&entry.content, true)),
        ),
        EntryKind::Assistant => (
            "bot-message-wrapper",
            "message bot-message",
            Node::raw(format_markdown(&entry.content, false)),
        ),
        EntryKind::Error => (
            "bot-message-wrapper",
            "message bot-message error-message",
            Node::text(&entry.content),
        ),
        EntryKind::Notice => (
            "bot-message-wrapper",
            "message notice-message",
            Node::text(&entry.content),
        ),
        EntryKind::Loading => (
            "bot-message-wrapper",
            "message bot-message loading",
            Node::text(&entry.content),
        ),
    };

    Node::el("div")
        .class(format!("message-wrapper {}", wrapper))
        .attr("data-entry-id", entry.id.to_string())
        .child(
            Node::el("div")
                .class(message)
                .child(Node::el("div").class("message-content").child(content)),
        )
}

/// The message pane: welcome view or the transcript bubbles.
pub fn render_transcript(state: &AppState) -> Node {
    if state.transcript.is_welcome() {
        return render_welcome();
    }
    Node::el("div")
        .class("chat-messages")
        .children(state.transcript.entries().iter().map(render_entry))
}

pub fn render_upload_previews(queue: &UploadQueue) -> Node {
    let container = Node::el("div").class("image-preview-container");
    if queue.is_empty() {
        return container.attr("style", "display: none");
    }

    container.children(queue.items().iter().map(|item| {
        let preview = match (item.kind, &item.local_url) {
            (AttachmentKind::Image, Some(url)) => Node::el("img")
                .class("image-preview")
                .attr("src", url)
                .attr("alt", item.label()),
            _ => Node::el("div")
                .class("document-icon")
                .attr("style", format!("background-color: {}", item.icon_color()))
                .attr("title", &item.file.name)
                .child(Node::el("span").child(Node::text(item.extension_label()))),
        };
        Node::el("div")
            .class("image-preview-wrapper")
            .attr("data-id", &item.id)
            .child(preview)
            .child(
                Node::el("div")
                    .class("attachment-label")
                    .child(Node::text(item.label())),
            )
            .child(
                Node::el("button")
                    .class("remove-attachment")
                    .attr("data-id", &item.id)
                    .child(Node::text("×")),
            )
    }))
}

pub fn render_upload_progress(progress: Option<&UploadProgress>) -> Option<Node> {
    progress.map(|p| {
        Node::el("div")
            .class("upload-progress")
            .child(Node::text(p.label()))
    })
}

pub fn render_composer(state: &AppState) -> Node {
    let mut input = Node::el("textarea")
        .attr("id", "message-input")
        .attr("placeholder", COMPOSER_PLACEHOLDER);
    let mut send = Node::el("button").attr("id", "send-button");
    if state.composer.busy {
        input = input.attr("disabled", "disabled");
        send = send.attr("disabled", "disabled");
    }
    let input = input.child(Node::text(&state.composer.text));
    let send = send.child(Node::text("Send"));

    let mut composer = Node::el("div")
        .class("input-container")
        .child(render_upload_previews(&state.uploads));
    if let Some(progress) = render_upload_progress(state.upload_progress.as_ref()) {
        composer = composer.child(progress);
    }
    composer.child(input).child(send)
}

/// Sidebar, message pane and composer as one document fragment.
pub fn render_page(state: &AppState) -> String {
    Node::el("div")
        .class("app-container")
        .child(Node::el("aside").class("sidebar").child(render_sidebar(state)))
        .child(
            Node::el("main")
                .class("chat-container")
                .child(render_transcript(state))
                .child(render_composer(state)),
        )
        .to_html()
}
