use crate::error::Result;
use crate::storage::LocalStore;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const THEME_KEY: &str = "theme";
pub const CSS_VERSION_KEY: &str = "css-version";
pub const CSS_VERSION: &str = "1.1";

/// Keys left behind by clients that cached stylesheet text locally.
const LEGACY_KEYS: &[&str] = &["theme-loaded", "light-theme-css", "dark-theme-css"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

/// What the page applies for a theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeView {
    pub theme: Theme,
    pub body_class: String,
    pub stylesheet: String,
    /// The toggle shows a sun (switch to light) while dark is active.
    pub show_sun_icon: bool,
}

impl ThemeView {
    pub fn for_theme(theme: Theme) -> Self {
        Self {
            theme,
            body_class: format!("{}-theme", theme),
            stylesheet: format!("/static/css/{}-theme.css", theme),
            show_sun_icon: theme == Theme::Dark,
        }
    }
}

pub struct ThemeManager {
    store: Arc<dyn LocalStore>,
}

impl ThemeManager {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Clears legacy cache keys once per stylesheet version, then applies the
    /// saved theme.
    pub async fn init(&self) -> Result<ThemeView> {
        let cached = self.store.get(CSS_VERSION_KEY).await?;
        if cached.as_deref() != Some(CSS_VERSION) {
            log::info!("Stylesheet version changed, clearing cached theme data");
            for key in LEGACY_KEYS {
                self.store.remove(key).await?;
            }
            self.store.set(CSS_VERSION_KEY, CSS_VERSION).await?;
        }
        let theme = self.current().await?;
        self.apply(theme).await
    }

    /// The saved theme; missing or unrecognised values read as light.
    pub async fn current(&self) -> Result<Theme> {
        Ok(self
            .store
            .get(THEME_KEY)
            .await?
            .and_then(|value| value.parse().ok())
            .unwrap_or_default())
    }

    pub async fn toggle(&self) -> Result<ThemeView> {
        let next = self.current().await?.toggled();
        self.apply(next).await
    }

    pub async fn apply(&self, theme: Theme) -> Result<ThemeView> {
        self.store.set(THEME_KEY, theme.as_str()).await?;
        log::debug!("Applied {} theme", theme);
        Ok(ThemeView::for_theme(theme))
    }
}
