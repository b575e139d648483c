//! Display preferences kept in cookies.
//!
//! The `theme` cookie is authoritative for the theme; the `preferences`
//! cookie holds everything else. Both live for a year.

use serde::{Deserialize, Serialize};

use crate::hooks::DEFAULT_PAGE_SIZE;
use crate::storage::{CookieJar, StorageError};
use crate::telemetry::log_error;

pub const THEME_COOKIE: &str = "theme";
pub const PREFERENCES_COOKIE: &str = "preferences";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    /// Unknown values fall back to following the system.
    pub fn from_string(s: &str) -> Self {
        match s {
            "light" => Theme::Light,
            "dark" => Theme::Dark,
            _ => Theme::System,
        }
    }
}

/// Resolve `System` to the theme actually shown.
pub fn resolve_effective_theme(
    theme: Theme,
    system_prefers_dark: bool,
) -> Theme {
    match theme {
        Theme::System if system_prefers_dark => Theme::Dark,
        Theme::System => Theme::Light,
        theme => theme,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
    pub language: String,
    pub timezone: String,
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub compact_view: bool,
    pub events_per_page: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            language: "fr".into(),
            timezone: "Europe/Paris".into(),
            email_notifications: true,
            push_notifications: false,
            compact_view: false,
            events_per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A partial change to [`Preferences`]. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesUpdate {
    pub theme: Option<Theme>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub compact_view: Option<bool>,
    pub events_per_page: Option<u32>,
}

impl PreferencesUpdate {
    pub fn theme(theme: Theme) -> Self {
        Self {
            theme: Some(theme),
            ..Default::default()
        }
    }

    fn apply(self, preferences: &mut Preferences) {
        if let Some(theme) = self.theme {
            preferences.theme = theme;
        }
        if let Some(language) = self.language {
            preferences.language = language;
        }
        if let Some(timezone) = self.timezone {
            preferences.timezone = timezone;
        }
        if let Some(email_notifications) = self.email_notifications {
            preferences.email_notifications = email_notifications;
        }
        if let Some(push_notifications) = self.push_notifications {
            preferences.push_notifications = push_notifications;
        }
        if let Some(compact_view) = self.compact_view {
            preferences.compact_view = compact_view;
        }
        if let Some(events_per_page) = self.events_per_page {
            preferences.events_per_page = events_per_page.max(1);
        }
    }
}

#[derive(Clone)]
pub struct PreferenceStore {
    jar: CookieJar,
}

impl PreferenceStore {
    pub fn new(jar: CookieJar) -> Self {
        Self { jar }
    }

    pub fn theme(&self) -> Theme {
        match self.jar.get(THEME_COOKIE) {
            Ok(Some(theme)) => Theme::from_string(&theme),
            Ok(None) => Theme::System,
            Err(e) => {
                log_error(e);
                Theme::System
            }
        }
    }

    /// Store the theme. Following the system is the default, so it clears
    /// the cookie instead.
    pub fn set_theme(&self, theme: Theme) -> Result<(), StorageError> {
        match theme {
            Theme::System => self.jar.remove(THEME_COOKIE),
            theme => self.jar.set(THEME_COOKIE, theme.as_str().to_string()),
        }
    }

    /// Stored preferences merged over the defaults.
    pub fn preferences(&self) -> Preferences {
        let mut preferences = match self.jar.get(PREFERENCES_COOKIE) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("ignoring malformed preferences cookie: {e}");
                Preferences::default()
            }),
            Ok(None) => Preferences::default(),
            Err(e) => {
                log_error(e);
                Preferences::default()
            }
        };
        preferences.theme = self.theme();
        preferences
    }

    pub fn update_preferences(
        &self,
        update: PreferencesUpdate,
    ) -> Result<Preferences, StorageError> {
        let mut preferences = self.preferences();
        let theme_changed = update.theme.is_some();
        update.apply(&mut preferences);

        self.jar
            .set(PREFERENCES_COOKIE, serde_json::to_string(&preferences)?)?;
        if theme_changed {
            self.set_theme(preferences.theme)?;
        }
        Ok(preferences)
    }

    pub fn reset_preferences(&self) -> Result<Preferences, StorageError> {
        self.jar.remove(PREFERENCES_COOKIE)?;
        self.jar.remove(THEME_COOKIE)?;
        Ok(Preferences::default())
    }
}
