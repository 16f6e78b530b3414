// Declare the modules
pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod host;
pub mod markdown;
pub mod models;
pub mod overlay;
pub mod preferences;
pub mod shell;
pub mod state;
pub mod storage;
pub mod theme;
pub mod upload;
pub mod validate;
pub mod view;

#[cfg(test)]
mod testing;

use anyhow::Context;
use api::{ApiClient, HttpTransport};
use auth::AuthForms;
use chat::ChatController;
use config::ClientConfig;
use host::UiHost;
use shell::TerminalHost;
use std::sync::Arc;
use storage::{LocalStore, StorageManager};
use theme::ThemeManager;

/// The wired-up client: chat page, auth forms and theme, sharing one backend
/// connection, host and local store.
pub struct App {
    pub chat: ChatController,
    pub auth: AuthForms,
    pub theme: ThemeManager,
}

impl App {
    pub async fn bootstrap(config: &ClientConfig, host: Arc<dyn UiHost>) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config.base_url.as_str())
            .context("Failed to build HTTP client")?;
        let store: Arc<dyn LocalStore> = Arc::new(StorageManager::open(&config.data_dir).await?);
        let api = ApiClient::new(Arc::new(transport), host);

        let theme = ThemeManager::new(store.clone());
        let view = theme.init().await.context("Failed to initialise theme")?;
        log::info!("Using {} theme", view.theme);

        Ok(Self {
            chat: ChatController::new(api.clone()),
            auth: AuthForms::new(api, store, config.redirect_delay),
            theme,
        })
    }
}

pub fn run() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let config = ClientConfig::from_env()?;
    log::info!("Connecting to {}", config.base_url);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let host = Arc::new(TerminalHost::new());
    let mut app = runtime.block_on(App::bootstrap(&config, host.clone()))?;

    // An optional session id plays the role of the `/<session_id>` page URL.
    let initial_session = std::env::args().nth(1);
    if let Some(session_id) = &initial_session {
        host.push_url(&format!("/{}", session_id));
    }
    runtime.block_on(app.chat.start(initial_session.as_deref()));

    shell::run_shell(&runtime, &mut app, &host)
}
