use crate::models::{Preferences, SessionSummary};
use crate::overlay::OverlayState;
use crate::upload::{UploadProgress, UploadQueue};
use chrono::{DateTime, NaiveDateTime};

/// One sidebar row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionItem {
    pub session_id: String,
    pub title: String,
    pub active: bool,
}

impl SessionItem {
    pub fn from_summary(summary: &SessionSummary, current: Option<&str>) -> Self {
        Self {
            session_id: summary.session_id.clone(),
            title: display_title(summary),
            active: current == Some(summary.session_id.as_str()),
        }
    }
}

/// Server title, or `Chat - <date>` from `updated_at` when the title is blank.
pub fn display_title(summary: &SessionSummary) -> String {
    if let Some(title) = summary.title.as_deref().filter(|t| !t.trim().is_empty()) {
        return title.to_string();
    }
    summary
        .updated_at
        .as_deref()
        .and_then(parse_timestamp)
        .map(|ts| format!("Chat - {}", ts.format("%Y-%m-%d")))
        .unwrap_or_else(|| "Chat".to_string())
}

/// RFC 3339, or the offset-less ISO form the backend stores.
fn parse_timestamp(ts: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sidebar {
    Items(Vec<SessionItem>),
    Error(String),
}

impl Default for Sidebar {
    fn default() -> Self {
        Sidebar::Items(Vec::new())
    }
}

impl Sidebar {
    pub fn items(&self) -> &[SessionItem] {
        match self {
            Sidebar::Items(items) => items,
            Sidebar::Error(_) => &[],
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.items().iter().any(|item| item.session_id == session_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    User,
    Assistant,
    /// `Error: ...` bubble shown in place of a reply.
    Error,
    /// Client-side notice, e.g. dropped attachments.
    Notice,
    /// Transient `Thinking...` placeholder.
    Loading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub id: u64,
    pub kind: EntryKind,
    pub content: String,
}

pub const LOADING_TEXT: &str = "Thinking...";

/// The message pane: either the welcome view or a list of bubbles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    welcome: bool,
    entries: Vec<TranscriptEntry>,
    next_id: u64,
}

impl Default for Transcript {
    fn default() -> Self {
        Self {
            welcome: true,
            entries: Vec::new(),
            next_id: 1,
        }
    }
}

impl Transcript {
    pub fn is_welcome(&self) -> bool {
        self.welcome
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn show_welcome(&mut self) {
        self.entries.clear();
        self.welcome = true;
    }

    /// Empties the pane without showing the welcome view.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.welcome = false;
    }

    pub fn push(&mut self, kind: EntryKind, content: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.welcome = false;
        self.entries.push(TranscriptEntry {
            id,
            kind,
            content: content.into(),
        });
        id
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn push_error(&mut self, message: impl std::fmt::Display) -> u64 {
        self.push(EntryKind::Error, format!("Error: {}", message))
    }
}

/// Message input box and send button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    pub text: String,
    /// A send is in flight; input and button are disabled.
    pub busy: bool,
}

/// In-place title edit on a sidebar item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleEdit {
    pub session_id: String,
    pub original: String,
    pub draft: String,
}

/// Everything the chat page keeps between events, owned by one controller.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    current_session: Option<String>,
    preferences: Option<Preferences>,
    pub sidebar: Sidebar,
    pub transcript: Transcript,
    pub composer: Composer,
    pub title_edit: Option<TitleEdit>,
    pub overlays: OverlayState,
    pub uploads: UploadQueue,
    pub upload_progress: Option<UploadProgress>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_session(&self) -> Option<&str> {
        self.current_session.as_deref()
    }

    /// Makes `session_id` current and marks its sidebar row active.
    pub fn set_current_session(&mut self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        if let Sidebar::Items(items) = &mut self.sidebar {
            for item in items.iter_mut() {
                item.active = item.session_id == session_id;
            }
        }
        self.current_session = Some(session_id);
    }

    pub fn clear_current_session(&mut self) -> Option<String> {
        if let Sidebar::Items(items) = &mut self.sidebar {
            for item in items.iter_mut() {
                item.active = false;
            }
        }
        self.current_session.take()
    }

    pub fn preferences(&self) -> Option<&Preferences> {
        self.preferences.as_ref()
    }

    pub fn cache_preferences(&mut self, preferences: Preferences) {
        self.preferences = Some(preferences);
    }

    /// Replaces the sidebar wholesale from a fresh server list.
    pub fn replace_sessions(&mut self, sessions: &[SessionSummary]) {
        let current = self.current_session.as_deref();
        self.sidebar = Sidebar::Items(
            sessions
                .iter()
                .map(|summary| SessionItem::from_summary(summary, current))
                .collect(),
        );
    }

    pub fn set_session_title(&mut self, session_id: &str, title: &str) {
        if let Sidebar::Items(items) = &mut self.sidebar {
            if let Some(item) = items.iter_mut().find(|item| item.session_id == session_id) {
                item.title = title.to_string();
            }
        }
    }

    pub fn session_title(&self, session_id: &str) -> Option<&str> {
        self.sidebar
            .items()
            .iter()
            .find(|item| item.session_id == session_id)
            .map(|item| item.title.as_str())
    }
}
