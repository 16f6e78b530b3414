//! User menu modals: preferences, profile and password.

use crate::auth::FormMessage;
use crate::chat::ChatController;
use crate::models::{PasswordChange, Preferences, PreferencesResponse, PreferencesUpdate, ProfileUpdate};
use crate::overlay::ModalKind;
use crate::theme::Theme;
use std::collections::BTreeMap;

/// Response languages offered by the preferences form.
pub const LANGUAGES: &[(&str, &str)] = &[("zh", "中文"), ("en", "English"), ("ms", "Bahasa Melayu")];

/// Contents of the preferences modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferencesView {
    pub language: String,
    pub math_topics: Vec<String>,
    pub theme: Theme,
    pub message: Option<FormMessage>,
}

impl PreferencesView {
    fn new(preferences: &Preferences, theme: Theme) -> Self {
        Self {
            language: preferences.language.clone(),
            math_topics: preferences.math_topics.clone(),
            theme,
            message: None,
        }
    }

    /// Display name of the selected language, or its code when unknown.
    pub fn language_name(&self) -> &str {
        LANGUAGES
            .iter()
            .find(|(code, _)| *code == self.language)
            .map(|(_, name)| *name)
            .unwrap_or(self.language.as_str())
    }

    pub fn is_topic_checked(&self, topic: &str) -> bool {
        self.math_topics.iter().any(|t| t == topic)
    }
}

impl ChatController {
    /// Fetches preferences and opens the modal. `None` when the session has
    /// expired.
    pub async fn load_preferences(&mut self, theme: Theme) -> Option<PreferencesView> {
        let view = match self.api().get_preferences().await {
            Ok(Some(PreferencesResponse {
                success: true,
                preferences: Some(preferences),
                ..
            })) => {
                self.state_mut().cache_preferences(preferences.clone());
                PreferencesView::new(&preferences, theme)
            }
            Ok(Some(_)) => self.cached_view(theme),
            Ok(None) => return None,
            Err(e) => {
                log::error!("Failed to load preferences: {}", e);
                let mut view = self.cached_view(theme);
                view.message = Some(FormMessage::error(format!("load preferences failed: {}", e)));
                view
            }
        };
        self.open_modal(ModalKind::Preferences);
        Some(view)
    }

    fn cached_view(&self, theme: Theme) -> PreferencesView {
        let preferences = self.state().preferences().cloned().unwrap_or_default();
        PreferencesView::new(&preferences, theme)
    }

    pub async fn save_preferences(
        &mut self,
        language: &str,
        math_topics: Vec<String>,
    ) -> Option<FormMessage> {
        let update = PreferencesUpdate {
            preferred_language: language.to_string(),
            math_topics,
        };
        match self.api().update_preferences(&update).await {
            Ok(Some(ack)) if ack.success => {
                log::info!("Preferences saved ({})", update.preferred_language);
                self.state_mut().cache_preferences(Preferences {
                    language: update.preferred_language,
                    math_topics: update.math_topics,
                });
                self.close_modal(ModalKind::Preferences);
                Some(FormMessage::success("preferences updated!"))
            }
            Ok(Some(ack)) => Some(FormMessage::error(
                ack.error.unwrap_or_else(|| "update failed".to_string()),
            )),
            Ok(None) => None,
            Err(e) => {
                log::error!("Preference update error: {}", e);
                Some(FormMessage::error(format!("update failed: {}", e)))
            }
        }
    }

    pub async fn update_profile(&mut self, username: &str, email: &str) -> Option<FormMessage> {
        let update = ProfileUpdate {
            username: username.to_string(),
            email: email.to_string(),
        };
        match self.api().update_profile(&update).await {
            Ok(Some(ack)) if ack.success => {
                self.close_modal(ModalKind::Profile);
                Some(FormMessage::success("Profile updated successfully!"))
            }
            Ok(Some(ack)) => Some(FormMessage::error(
                ack.error.unwrap_or_else(|| "Update failed".to_string()),
            )),
            Ok(None) => None,
            Err(e) => {
                log::error!("Profile update error: {}", e);
                Some(FormMessage::error(format!("Update failed: {}", e)))
            }
        }
    }

    /// A mismatched confirmation is reported without contacting the server.
    pub async fn change_password(
        &mut self,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Option<FormMessage> {
        if new != confirm {
            return Some(FormMessage::error("New passwords do not match"));
        }
        let change = PasswordChange {
            current_password: current.to_string(),
            new_password: new.to_string(),
        };
        match self.api().change_password(&change).await {
            Ok(Some(ack)) if ack.success => {
                self.close_modal(ModalKind::Password);
                Some(FormMessage::success("Password changed successfully!"))
            }
            Ok(Some(ack)) => Some(FormMessage::error(
                ack.error
                    .unwrap_or_else(|| "Password change failed".to_string()),
            )),
            Ok(None) => None,
            Err(e) => {
                log::error!("Password change error: {}", e);
                Some(FormMessage::error(format!("Password change failed: {}", e)))
            }
        }
    }

    /// Topic key to display name for `lang`; empty when unavailable.
    pub async fn math_topics(&self, lang: &str) -> BTreeMap<String, String> {
        match self.api().math_topics(lang).await {
            Ok(Some(topics)) => topics,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                log::warn!("Failed to load math topics for {}: {}", lang, e);
                BTreeMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiClient, Method, RequestBody};
    use crate::auth::MessageKind;
    use crate::host::RecordingHost;
    use crate::overlay::Overlay;
    use crate::testing::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn controller() -> (ChatController, Arc<MockTransport>, Arc<RecordingHost>) {
        let transport = Arc::new(MockTransport::new());
        let host = Arc::new(RecordingHost::new());
        let api = ApiClient::new(transport.clone(), host.clone());
        (ChatController::new(api), transport, host)
    }

    #[tokio::test]
    async fn load_fills_form_and_opens_modal() {
        let (mut chat, transport, _host) = controller();
        transport.on(
            Method::Get,
            "/api/get-preferences",
            200,
            json!({"success": true, "preferences": {"language": "ms", "math_topics": ["geometry", "calculus"]}}),
        );

        let view = chat.load_preferences(Theme::Dark).await.unwrap();
        assert_eq!(view.language, "ms");
        assert_eq!(view.language_name(), "Bahasa Melayu");
        assert!(view.is_topic_checked("calculus"));
        assert!(!view.is_topic_checked("algebra"));
        assert_eq!(view.theme, Theme::Dark);
        assert!(chat
            .state()
            .overlays
            .is_open(&Overlay::Modal(ModalKind::Preferences)));
        assert_eq!(chat.state().preferences().unwrap().language, "ms");
    }

    #[tokio::test]
    async fn load_failure_shows_message_over_defaults() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Get, "/api/get-preferences", 500, json!({"error": "Failed to get preferences"}));

        let view = chat.load_preferences(Theme::Light).await.unwrap();
        assert_eq!(view.language, "zh");
        assert_eq!(view.language_name(), "中文");
        assert_eq!(
            view.message,
            Some(FormMessage::error("load preferences failed: Failed to get preferences"))
        );
    }

    #[tokio::test]
    async fn save_posts_preferred_language_and_updates_cache() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Post, "/api/update-preferences", 200, json!({"success": true}));
        chat.open_modal(ModalKind::Preferences);

        let message = chat
            .save_preferences("en", vec!["algebra".into()])
            .await
            .unwrap();

        assert_eq!(message.kind, MessageKind::Success);
        assert_eq!(
            transport.requests()[0].body,
            RequestBody::Json(json!({"preferred_language": "en", "math_topics": ["algebra"]}))
        );
        assert_eq!(chat.state().preferences().unwrap().language, "en");
        assert_eq!(chat.state().overlays.active(), None);
    }

    #[tokio::test]
    async fn save_failure_reports_server_error() {
        let (mut chat, transport, _host) = controller();
        transport.on(
            Method::Post,
            "/api/update-preferences",
            400,
            json!({"error": "Language preference cannot be empty"}),
        );
        let message = chat.save_preferences("", vec![]).await.unwrap();
        assert_eq!(
            message,
            FormMessage::error("update failed: Language preference cannot be empty")
        );
        assert!(chat.state().preferences().is_none());
    }

    #[tokio::test]
    async fn password_mismatch_sends_nothing() {
        let (mut chat, transport, _host) = controller();
        let message = chat.change_password("old1", "new123", "new124").await;
        assert_eq!(message, Some(FormMessage::error("New passwords do not match")));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn expired_session_yields_no_message() {
        let (mut chat, transport, host) = controller();
        transport.fallback_status(401);

        assert_eq!(chat.update_profile("ann", "a@b.co").await, None);
        assert_eq!(chat.change_password("a1", "b2c3d4", "b2c3d4").await, None);
        assert_eq!(chat.load_preferences(Theme::Light).await, None);
        assert_eq!(host.navigations().len(), 3);
    }

    #[tokio::test]
    async fn profile_and_password_success() {
        let (mut chat, transport, _host) = controller();
        transport.on(Method::Post, "/api/update-profile", 200, json!({"success": true}));
        transport.on(Method::Post, "/api/change-password", 200, json!({"success": true}));

        assert_eq!(
            chat.update_profile("ann", "a@b.co").await,
            Some(FormMessage::success("Profile updated successfully!"))
        );
        assert_eq!(
            chat.change_password("old123", "new123", "new123").await,
            Some(FormMessage::success("Password changed successfully!"))
        );
    }

    #[tokio::test]
    async fn topics_come_from_the_catalogue_endpoint() {
        let (chat, transport, _host) = controller();
        transport.on(
            Method::Get,
            "/api/math_topics/en",
            200,
            json!({"algebra": "Algebra", "discrete_math": "Discrete Mathematics"}),
        );
        let topics = chat.math_topics("en").await;
        assert_eq!(topics.get("discrete_math").map(String::as_str), Some("Discrete Mathematics"));
        assert!(chat.math_topics("xx").await.is_empty());
    }
}
