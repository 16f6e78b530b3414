use crate::api::ApiClient;
use crate::models::{NewSessionResponse, Preferences, PreferencesResponse, Role, UploadFile};
use crate::overlay::{ModalKind, Overlay};
use crate::state::{AppState, EntryKind, TitleEdit, LOADING_TEXT};
use crate::upload::{attachment_label, compose_message};

pub const DELETE_CONFIRMATION: &str = "Are you sure you want to delete this chat?";
const NEW_SESSION_FAILED: &str = "Failed to create new chat session";

/// A predefined opener shown on the welcome view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suggestion {
    pub title: &'static str,
    pub prompt: &'static str,
}

pub const SUGGESTIONS: &[Suggestion] = &[
    Suggestion {
        title: "Solve an equation",
        prompt: "Help me solve x^2 + 6x - 7 = 0 step by step.",
    },
    Suggestion {
        title: "Explain a concept",
        prompt: "Explain what a derivative is with a simple example.",
    },
    Suggestion {
        title: "Geometry",
        prompt: "How do I find the area of a triangle from its three sides?",
    },
    Suggestion {
        title: "Probability",
        prompt: "What is the probability of rolling two sixes with two dice?",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleKey {
    Enter,
    Escape,
}

/// Drives the chat page: sidebar, transcript, composer and attachments.
///
/// Every operation catches its own failures and turns them into state (an
/// error bubble or a sidebar banner); nothing is returned to the caller.
/// Mutating operations always re-fetch the session list rather than patching
/// it locally.
pub struct ChatController {
    api: ApiClient,
    state: AppState,
}

impl ChatController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: AppState::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Page load: fetch the sidebar, then open the session named in the URL.
    pub async fn start(&mut self, initial_session: Option<&str>) {
        self.load_session_list().await;
        if let Some(session_id) = initial_session {
            self.open_session(session_id).await;
        }
    }

    pub async fn load_session_list(&mut self) {
        match self.api.list_sessions().await {
            Ok(Some(sessions)) => {
                log::info!("Loaded {} sessions", sessions.len());
                self.state.replace_sessions(&sessions);
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Failed to load chat sessions: {}", e);
                self.state.sidebar = crate::state::Sidebar::Error(format!("Error: {}", e));
            }
        }
    }

    pub async fn open_session(&mut self, session_id: &str) {
        log::info!("Opening session {}", session_id);
        self.state.overlays.click_outside();
        self.state.set_current_session(session_id);

        match self.api.history(session_id).await {
            Ok(Some(messages)) => {
                self.state.transcript.clear();
                for message in messages {
                    let kind = match message.role {
                        Role::User => EntryKind::User,
                        Role::Assistant => EntryKind::Assistant,
                        Role::System => continue,
                    };
                    self.state.transcript.push(kind, message.content);
                }
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Failed to load history for {}: {}", session_id, e);
                self.state.transcript.push_error(e);
            }
        }
    }

    pub fn set_composer_text(&mut self, text: impl Into<String>) {
        self.state.composer.text = text.into();
    }

    /// Queues files picked or dropped by the user.
    pub fn attach_files(&mut self, files: Vec<UploadFile>) -> Vec<String> {
        self.state.uploads.add_files(files)
    }

    pub fn remove_attachment(&mut self, id: &str) -> bool {
        self.state.uploads.remove(id).is_some()
    }

    /// Sends the composer text, uploading pending attachments first.
    ///
    /// Ignored while another send is in flight. Steps: upload and compose,
    /// create a session if none is current, show the user bubble, show a
    /// placeholder, then replace the placeholder with the reply or an error.
    pub async fn send_message(&mut self) {
        if self.state.composer.busy {
            log::warn!("Send ignored: a message is already in flight");
            return;
        }
        let text = self.state.composer.text.trim().to_string();
        if text.is_empty() && self.state.uploads.is_empty() {
            return;
        }

        self.state.composer.busy = true;
        self.send_composed(text).await;
        self.state.composer.busy = false;
    }

    pub async fn send_suggestion(&mut self, suggestion: &Suggestion) {
        self.set_composer_text(suggestion.prompt);
        self.send_message().await;
    }

    async fn send_composed(&mut self, text: String) {
        let mut dropped = Vec::new();
        let message = if self.state.uploads.is_empty() {
            text
        } else {
            match self.upload_attachments(&text).await {
                Some((message, failed)) => {
                    dropped = failed;
                    message
                }
                None => return,
            }
        };

        let session_id = match self.state.current_session() {
            Some(id) => id.to_string(),
            None => match self.start_session().await {
                Some(id) => id,
                None => return,
            },
        };

        if !dropped.is_empty() {
            let labels: Vec<String> = dropped.iter().map(|i| attachment_label(*i)).collect();
            self.state.transcript.push(
                EntryKind::Notice,
                format!("Not attached (upload failed): {}", labels.join(", ")),
            );
        }
        self.state.transcript.push(EntryKind::User, message.clone());
        self.state.composer.text.clear();
        let loading = self.state.transcript.push(EntryKind::Loading, LOADING_TEXT);

        let Some(preferences) = self.preferences_for_send().await else {
            self.state.transcript.remove(loading);
            return;
        };
        let result = self.api.send_chat(&session_id, &message, &preferences).await;
        self.state.transcript.remove(loading);

        match result {
            Ok(Some(reply)) => {
                self.state.transcript.push(EntryKind::Assistant, reply.response);
                if !self.state.sidebar.contains(&session_id) {
                    self.load_session_list().await;
                }
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Failed to send message to {}: {}", session_id, e);
                self.state.transcript.push_error(e);
            }
        }
    }

    /// Uploads the queue and returns the composed message plus the ordinals
    /// that were dropped. `None` means nothing should be sent.
    async fn upload_attachments(&mut self, text: &str) -> Option<(String, Vec<usize>)> {
        let mut queue = std::mem::take(&mut self.state.uploads);
        let progress = &mut self.state.upload_progress;
        let report = queue
            .upload_all(&self.api, |p| *progress = Some(p))
            .await;
        self.state.uploads = queue;
        self.state.upload_progress = None;

        if report.interrupted {
            return None;
        }
        let dropped = report.dropped();
        let attachments = report.markdown();
        if attachments.is_empty() && text.is_empty() {
            let labels: Vec<String> = dropped.iter().map(|i| attachment_label(*i)).collect();
            self.state
                .transcript
                .push_error(format!("Upload failed: {}", labels.join(", ")));
            return None;
        }

        let message = compose_message(&attachments, text);
        // Kept in the composer until the send goes through.
        self.state.composer.text = message.clone();
        Some((message, dropped))
    }

    /// Creates a session for the first message of a fresh page.
    async fn start_session(&mut self) -> Option<String> {
        match self.api.create_session().await {
            Ok(Some(NewSessionResponse {
                success: true,
                session_id: Some(session_id),
                ..
            })) => {
                log::info!("Created session {}", session_id);
                self.state.set_current_session(&session_id);
                self.api.host().push_url(&format!("/{}", session_id));
                self.load_session_list().await;
                self.state.transcript.clear();
                Some(session_id)
            }
            Ok(Some(response)) => {
                log::error!("Session creation refused: {:?}", response.error);
                self.state.transcript.push_error(NEW_SESSION_FAILED);
                None
            }
            Ok(None) => None,
            Err(e) => {
                log::error!("Failed to create new session: {}", e);
                self.state.transcript.push_error(NEW_SESSION_FAILED);
                None
            }
        }
    }

    /// Cached preferences, fetched once. `None` only when the session expired.
    async fn preferences_for_send(&mut self) -> Option<Preferences> {
        if let Some(preferences) = self.state.preferences() {
            return Some(preferences.clone());
        }
        match self.api.get_preferences().await {
            Ok(Some(PreferencesResponse {
                success: true,
                preferences: Some(preferences),
                ..
            })) => {
                self.state.cache_preferences(preferences.clone());
                Some(preferences)
            }
            Ok(None) => None,
            Ok(Some(_)) | Err(_) => {
                log::warn!("Unable to get user preferences, using defaults");
                Some(Preferences::default())
            }
        }
    }

    pub async fn new_chat(&mut self) {
        match self.api.create_session().await {
            Ok(Some(NewSessionResponse {
                success: true,
                session_id: Some(session_id),
                ..
            })) => {
                self.state.set_current_session(&session_id);
                self.api.host().push_url(&format!("/{}", session_id));
                self.load_session_list().await;
                self.open_session(&session_id).await;
            }
            Ok(Some(response)) => {
                let message = response.error.unwrap_or_else(|| NEW_SESSION_FAILED.to_string());
                self.state.transcript.push_error(message);
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Failed to create new chat: {}", e);
                self.state
                    .transcript
                    .push(EntryKind::Error, "Failed to create new chat.");
            }
        }
    }

    /// Deletes a session after confirmation. Deleting the current session
    /// returns the page to the welcome view at `/`.
    pub async fn delete_session(&mut self, session_id: &str) {
        self.state
            .overlays
            .close(&Overlay::SessionMenu(session_id.to_string()));
        if !self.api.host().confirm(DELETE_CONFIRMATION) {
            return;
        }

        match self.api.delete_session(session_id).await {
            Ok(Some(ack)) if ack.success => {
                log::info!("Deleted session {}", session_id);
                self.load_session_list().await;
                if self.state.current_session() == Some(session_id) {
                    self.state.clear_current_session();
                    self.state.transcript.show_welcome();
                    self.api.host().push_url("/");
                }
            }
            Ok(Some(ack)) => {
                let message = ack.error.unwrap_or_else(|| "Failed to delete chat".to_string());
                self.state.transcript.push_error(message);
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Failed to delete chat {}: {}", session_id, e);
                self.state
                    .transcript
                    .push(EntryKind::Error, "Failed to delete chat.");
            }
        }
    }

    // --- title editing ---

    pub fn start_title_edit(&mut self, session_id: &str) -> bool {
        let Some(original) = self.state.session_title(session_id).map(str::to_string) else {
            return false;
        };
        self.state.overlays.click_outside();
        self.state.title_edit = Some(TitleEdit {
            session_id: session_id.to_string(),
            draft: original.clone(),
            original,
        });
        true
    }

    pub fn edit_title_input(&mut self, text: &str) {
        if let Some(edit) = &mut self.state.title_edit {
            edit.draft = text.to_string();
        }
    }

    pub async fn title_key(&mut self, key: TitleKey) {
        match key {
            TitleKey::Enter => self.commit_title_edit().await,
            TitleKey::Escape => self.cancel_title_edit(),
        }
    }

    pub async fn title_blur(&mut self) {
        self.commit_title_edit().await;
    }

    pub fn cancel_title_edit(&mut self) {
        if let Some(edit) = self.state.title_edit.take() {
            self.state.set_session_title(&edit.session_id, &edit.original);
        }
    }

    /// Commits a blank or unchanged draft as a no-op. Otherwise the title is
    /// shown immediately and the list is re-fetched whatever the outcome, so a
    /// failed rename snaps back to the server's title.
    pub async fn commit_title_edit(&mut self) {
        let Some(edit) = self.state.title_edit.take() else {
            return;
        };
        let new_title = edit.draft.trim();
        if new_title.is_empty() || new_title == edit.original {
            self.state.set_session_title(&edit.session_id, &edit.original);
            return;
        }

        self.state.set_session_title(&edit.session_id, new_title);
        match self.api.update_title(&edit.session_id, new_title).await {
            Ok(Some(ack)) if !ack.success => {
                log::error!("Failed to update title: {:?}", ack.error);
            }
            Ok(Some(_)) => log::info!("Renamed {} to {}", edit.session_id, new_title),
            Ok(None) => return,
            Err(e) => log::error!("Failed to update title: {}", e),
        }
        self.load_session_list().await;
    }

    /// Edit, type, and commit in one go.
    pub async fn rename_session(&mut self, session_id: &str, title: &str) {
        if self.start_title_edit(session_id) {
            self.edit_title_input(title);
            self.commit_title_edit().await;
        }
    }

    // --- menus and modals ---

    pub fn toggle_session_menu(&mut self, session_id: &str) {
        self.state
            .overlays
            .toggle(Overlay::SessionMenu(session_id.to_string()));
    }

    pub fn mouse_leave_session(&mut self, session_id: &str) {
        self.state.overlays.mouse_leave(session_id);
    }

    pub fn click_outside(&mut self) {
        self.state.overlays.click_outside();
    }

    pub fn toggle_user_menu(&mut self) {
        self.state.overlays.toggle(Overlay::UserMenu);
    }

    pub fn open_modal(&mut self, kind: ModalKind) {
        self.state.overlays.open(Overlay::Modal(kind));
    }

    pub fn close_modal(&mut self, kind: ModalKind) {
        self.state.overlays.close(&Overlay::Modal(kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Method, RequestBody};
    use crate::host::RecordingHost;
    use crate::state::Sidebar;
    use crate::testing::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn controller() -> (ChatController, Arc<MockTransport>, Arc<RecordingHost>) {
        let transport = Arc::new(MockTransport::new());
        let host = Arc::new(RecordingHost::new());
        let api = ApiClient::new(transport.clone(), host.clone());
        (ChatController::new(api), transport, host)
    }

    fn prefs_ok(transport: &MockTransport) {
        transport.on(
            Method::Get,
            "/api/get-preferences",
            200,
            json!({"success": true, "preferences": {"language": "en", "math_topics": []}}),
        );
    }

    fn kinds(controller: &ChatController) -> Vec<EntryKind> {
        controller
            .state()
            .transcript
            .entries()
            .iter()
            .map(|e| e.kind)
            .collect()
    }

    #[tokio::test]
    async fn first_send_creates_session_and_renders_reply() {
        let (mut chat, transport, host) = controller();
        transport.on(Method::Post, "/api/new-session", 200, json!({"success": true, "session_id": "chat_1"}));
        transport.on(Method::Get, "/api/sessions", 200, json!([{"session_id": "chat_1", "title": "Chat 20250101-10:00"}]));
        prefs_ok(&transport);
        transport.on(Method::Post, "/api/chat", 200, json!({"response": "x = 1 or x = -7", "session_id": "chat_1"}));

        chat.set_composer_text("  solve x^2+6x-7=0  ");
        chat.send_message().await;

        assert_eq!(chat.state().current_session(), Some("chat_1"));
        assert_eq!(host.current_url().as_deref(), Some("/chat_1"));
        assert_eq!(kinds(&chat), vec![EntryKind::User, EntryKind::Assistant]);
        assert_eq!(chat.state().transcript.entries()[0].content, "solve x^2+6x-7=0");
        assert!(chat.state().composer.text.is_empty());
        assert!(!chat.state().composer.busy);
        assert!(chat.state().sidebar.items()[0].active);
        assert_eq!(
            transport.paths(),
            vec!["/api/new-session", "/api/sessions", "/api/get-preferences", "/api/chat"]
        );
    }

    #[tokio::test]
    async fn failed_reply_replaces_placeholder_with_error() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Get, "/api/history?session_id=chat_1", 200, json!([]));
        prefs_ok(&transport);
        transport.on(Method::Post, "/api/chat", 500, json!({"error": "Failed to get reply: timeout"}));

        chat.open_session("chat_1").await;
        chat.set_composer_text("hello");
        chat.send_message().await;

        assert_eq!(kinds(&chat), vec![EntryKind::User, EntryKind::Error]);
        assert_eq!(
            chat.state().transcript.entries()[1].content,
            "Error: Failed to get reply: timeout"
        );
    }

    #[tokio::test]
    async fn expired_session_during_send_redirects_once() {
        let (mut chat, transport, host) = controller();
        transport.on(Method::Get, "/api/history?session_id=chat_1", 200, json!([]));
        prefs_ok(&transport);
        transport.on(Method::Post, "/api/chat", 401, json!({"error": "Please login first"}));

        chat.open_session("chat_1").await;
        chat.set_composer_text("hello");
        chat.send_message().await;

        assert_eq!(host.navigations(), vec!["/auth".to_string()]);
        assert_eq!(kinds(&chat), vec![EntryKind::User]);
        assert!(!chat.state().composer.busy);
    }

    #[tokio::test]
    async fn empty_composer_sends_nothing() {
        let (mut chat, transport, _host) = controller();
        chat.set_composer_text("   ");
        chat.send_message().await;
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn in_flight_send_blocks_another() {
        let (mut chat, transport, _host) = controller();
        chat.set_composer_text("hello");
        chat.state_mut().composer.busy = true;
        chat.send_message().await;
        assert!(transport.requests().is_empty());
        assert_eq!(chat.state().composer.text, "hello");
    }

    #[tokio::test]
    async fn history_skips_system_messages() {
        let (mut chat, transport, _host) = controller();
        transport.on(
            Method::Get,
            "/api/history?session_id=chat_9",
            200,
            json!([
                {"role": "system", "content": "You are MathMentor."},
                {"role": "assistant", "content": "Hi! I'm MathMentor."},
                {"role": "user", "content": "2+2?"}
            ]),
        );

        chat.open_session("chat_9").await;

        assert_eq!(kinds(&chat), vec![EntryKind::Assistant, EntryKind::User]);
        assert!(!chat.state().transcript.is_welcome());
    }

    #[tokio::test]
    async fn session_list_failure_shows_banner() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Get, "/api/sessions", 500, json!({"error": "Server error: db down"}));
        chat.load_session_list().await;
        assert_eq!(
            chat.state().sidebar,
            Sidebar::Error("Error: Server error: db down".into())
        );
    }

    #[tokio::test]
    async fn deleting_active_session_returns_to_welcome() {
        let (mut chat, transport, host) = controller();
        transport.on(Method::Get, "/api/sessions", 200, json!([{"session_id": "chat_1", "title": "A"}, {"session_id": "chat_2", "title": "B"}]));
        transport.on(Method::Get, "/api/sessions", 200, json!([{"session_id": "chat_2", "title": "B"}]));
        transport.on(Method::Get, "/api/history?session_id=chat_1", 200, json!([{"role": "assistant", "content": "Hi"}]));
        transport.on(Method::Post, "/api/delete-session", 200, json!({"success": true}));

        chat.start(Some("chat_1")).await;
        chat.delete_session("chat_1").await;

        assert_eq!(chat.state().current_session(), None);
        assert!(chat.state().transcript.is_welcome());
        assert!(!chat.state().sidebar.contains("chat_1"));
        assert_eq!(host.current_url().as_deref(), Some("/"));

        chat.load_session_list().await;
        assert!(!chat.state().sidebar.contains("chat_1"));
    }

    #[tokio::test]
    async fn deleting_another_session_keeps_current() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Get, "/api/history?session_id=chat_2", 200, json!([]));
        transport.on(Method::Post, "/api/delete-session", 200, json!({"success": true}));
        transport.on(Method::Get, "/api/sessions", 200, json!([{"session_id": "chat_2"}]));

        chat.open_session("chat_2").await;
        chat.delete_session("chat_1").await;

        assert_eq!(chat.state().current_session(), Some("chat_2"));
        assert!(!chat.state().transcript.is_welcome());
    }

    #[tokio::test]
    async fn declined_confirmation_deletes_nothing() {
        let (mut chat, transport, host) = controller();
        host.answer_next(false);
        chat.delete_session("chat_1").await;
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn rename_commits_and_reloads() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Get, "/api/sessions", 200, json!([{"session_id": "chat_1", "title": "Old"}]));
        transport.on(Method::Get, "/api/sessions", 200, json!([{"session_id": "chat_1", "title": "Quadratics"}]));
        transport.on(Method::Post, "/api/update-title", 200, json!({"success": true}));

        chat.load_session_list().await;
        assert!(chat.start_title_edit("chat_1"));
        chat.edit_title_input("  Quadratics ");
        chat.title_key(TitleKey::Enter).await;

        assert_eq!(chat.state().session_title("chat_1"), Some("Quadratics"));
        assert!(chat.state().title_edit.is_none());
        let update = transport
            .requests()
            .into_iter()
            .find(|r| r.path == "/api/update-title")
            .unwrap();
        assert_eq!(
            update.body,
            RequestBody::Json(json!({"session_id": "chat_1", "title": "Quadratics"}))
        );
        assert_eq!(transport.count("/api/sessions"), 2);
    }

    #[tokio::test]
    async fn failed_rename_resyncs_to_server_title() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Get, "/api/sessions", 200, json!([{"session_id": "chat_1", "title": "Old"}]));
        transport.on(Method::Post, "/api/update-title", 500, json!({"error": "Failed to update title"}));

        chat.load_session_list().await;
        chat.rename_session("chat_1", "New").await;

        assert_eq!(chat.state().session_title("chat_1"), Some("Old"));
        assert_eq!(transport.count("/api/sessions"), 2);
    }

    #[tokio::test]
    async fn escape_and_unchanged_titles_send_nothing() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Get, "/api/sessions", 200, json!([{"session_id": "chat_1", "title": "Old"}]));
        chat.load_session_list().await;

        chat.start_title_edit("chat_1");
        chat.edit_title_input("Something else");
        chat.title_key(TitleKey::Escape).await;
        assert_eq!(chat.state().session_title("chat_1"), Some("Old"));

        chat.start_title_edit("chat_1");
        chat.edit_title_input("   ");
        chat.title_blur().await;

        chat.start_title_edit("chat_1");
        chat.title_blur().await;

        assert_eq!(chat.state().session_title("chat_1"), Some("Old"));
        assert_eq!(transport.count("/api/update-title"), 0);
    }

    #[tokio::test]
    async fn send_with_attachments_drops_failed_upload_and_warns() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Get, "/api/history?session_id=chat_1", 200, json!([]));
        transport.on(Method::Post, "/api/upload/image", 200, json!({"success": true, "file_url": "/u/1.png"}));
        transport.on(Method::Post, "/api/upload/image", 500, json!({"error": "too large"}));
        transport.on(Method::Post, "/api/upload/image", 200, json!({"success": true, "file_url": "/u/3.png"}));
        prefs_ok(&transport);
        transport.on(Method::Post, "/api/chat", 200, json!({"response": "Nice graphs."}));

        chat.open_session("chat_1").await;
        chat.attach_files(vec![
            UploadFile::new("1.png", "image/png", vec![1]),
            UploadFile::new("2.png", "image/png", vec![2]),
            UploadFile::new("3.png", "image/png", vec![3]),
        ]);
        chat.set_composer_text("what do these show?");
        chat.send_message().await;

        let sent = transport
            .requests()
            .into_iter()
            .find(|r| r.path == "/api/chat")
            .unwrap();
        let RequestBody::Json(body) = sent.body else {
            panic!("chat body must be JSON");
        };
        assert_eq!(
            body["message"],
            "![Attachment-1](/u/1.png) ![Attachment-3](/u/3.png)\n\nwhat do these show?"
        );
        assert!(chat.state().uploads.is_empty());
        assert!(chat.state().upload_progress.is_none());
        assert_eq!(
            kinds(&chat),
            vec![EntryKind::Notice, EntryKind::User, EntryKind::Assistant]
        );
        assert!(chat.state().transcript.entries()[0].content.contains("Attachment-2"));
    }

    #[tokio::test]
    async fn all_uploads_failing_without_text_sends_nothing() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Post, "/api/upload/document", 500, json!({"error": "bad type"}));

        chat.attach_files(vec![UploadFile::from_name("a.pdf", vec![1])]);
        chat.send_message().await;

        assert_eq!(transport.paths(), vec!["/api/upload/document".to_string()]);
        assert_eq!(kinds(&chat), vec![EntryKind::Error]);
        assert!(chat.state().uploads.is_empty());
    }

    #[tokio::test]
    async fn preferences_fall_back_to_defaults() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Get, "/api/history?session_id=chat_1", 200, json!([]));
        transport.on(Method::Get, "/api/get-preferences", 500, json!({}));
        transport.on(Method::Post, "/api/chat", 200, json!({"response": "ok"}));

        chat.open_session("chat_1").await;
        chat.set_composer_text("hi");
        chat.send_message().await;

        let sent = transport
            .requests()
            .into_iter()
            .find(|r| r.path == "/api/chat")
            .unwrap();
        let RequestBody::Json(body) = sent.body else {
            panic!("chat body must be JSON");
        };
        assert_eq!(body["user_preferences"], json!({"language": "zh", "math_topics": []}));
        assert_eq!(transport.paths().last().map(String::as_str), Some("/api/sessions"));
    }

    #[tokio::test]
    async fn new_chat_opens_the_created_session() {
        let (mut chat, transport, host) = controller();
        transport.on(Method::Post, "/api/new-session", 200, json!({"success": true, "session_id": "chat_7"}));
        transport.on(Method::Get, "/api/sessions", 200, json!([{"session_id": "chat_7", "title": "Chat"}]));
        transport.on(Method::Get, "/api/history?session_id=chat_7", 200, json!([
            {"role": "system", "content": "rules"},
            {"role": "assistant", "content": "Hi! I'm MathMentor."}
        ]));

        chat.new_chat().await;

        assert_eq!(chat.state().current_session(), Some("chat_7"));
        assert_eq!(host.current_url().as_deref(), Some("/chat_7"));
        assert_eq!(kinds(&chat), vec![EntryKind::Assistant]);
    }

    #[test]
    fn menus_are_exclusive() {
        let (mut chat, _transport, _host) = controller();
        chat.toggle_session_menu("chat_1");
        chat.toggle_user_menu();
        assert!(chat.state().overlays.is_open(&Overlay::UserMenu));
        chat.open_modal(ModalKind::Profile);
        chat.click_outside();
        assert!(chat
            .state()
            .overlays
            .is_open(&Overlay::Modal(ModalKind::Profile)));
        chat.close_modal(ModalKind::Profile);
        assert_eq!(chat.state().overlays.active(), None);
    }
}
