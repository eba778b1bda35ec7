//! Display preferences, persisted key by key

use slowcore::storage::KeyValueStore;
use tracing::warn;

const THEME_KEY: &str = "app-theme";
const SHOW_TRANSLATION_KEY: &str = "app-showTranslation";
const ONLY_TRANSLATION_KEY: &str = "app-onlyTranslation";
const FONT_SIZE_KEY: &str = "app-fontSize";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Font size level, 1 (smallest) to 5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FontSize(u8);

impl FontSize {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(level: i64) -> Self {
        Self(level.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn step(self, delta: i64) -> Self {
        Self::new(self.0 as i64 + delta)
    }

    /// Characters per line in a text console: larger type, shorter lines.
    pub fn columns(self) -> usize {
        120 - 16 * usize::from(self.0)
    }
}

impl Default for FontSize {
    fn default() -> Self {
        Self(3)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Preferences {
    pub theme: Theme,
    pub show_translation: bool,
    pub only_translation: bool,
    pub font_size: FontSize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            show_translation: true,
            only_translation: false,
            font_size: FontSize::default(),
        }
    }
}

impl Preferences {
    /// Read each preference on its own; missing or unreadable values keep
    /// their default.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        Self {
            theme: store
                .get(THEME_KEY)
                .and_then(|v| Theme::parse(&v))
                .unwrap_or(defaults.theme),
            show_translation: read_flag(store, SHOW_TRANSLATION_KEY, defaults.show_translation),
            only_translation: read_flag(store, ONLY_TRANSLATION_KEY, defaults.only_translation),
            font_size: store
                .get(FONT_SIZE_KEY)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .map(FontSize::new)
                .unwrap_or(defaults.font_size),
        }
    }

    pub fn set_theme(&mut self, store: &dyn KeyValueStore, theme: Theme) {
        self.theme = theme;
        write(store, THEME_KEY, theme.as_str());
    }

    pub fn set_show_translation(&mut self, store: &dyn KeyValueStore, on: bool) {
        self.show_translation = on;
        write(store, SHOW_TRANSLATION_KEY, if on { "true" } else { "false" });
    }

    pub fn set_only_translation(&mut self, store: &dyn KeyValueStore, on: bool) {
        self.only_translation = on;
        write(store, ONLY_TRANSLATION_KEY, if on { "true" } else { "false" });
    }

    pub fn set_font_size(&mut self, store: &dyn KeyValueStore, size: FontSize) {
        self.font_size = size;
        write(store, FONT_SIZE_KEY, &size.level().to_string());
    }

    /// The Arabic text is hidden only in translation-only mode.
    pub fn shows_arabic(&self) -> bool {
        !self.only_translation
    }

    pub fn shows_translation(&self) -> bool {
        self.show_translation || self.only_translation
    }
}

fn read_flag(store: &dyn KeyValueStore, key: &str, default: bool) -> bool {
    match store.get(key).as_deref().map(str::trim) {
        Some("true") => true,
        Some(_) => false,
        None => default,
    }
}

fn write(store: &dyn KeyValueStore, key: &str, value: &str) {
    if let Err(e) = store.set(key, value) {
        warn!("failed to save {key}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slowcore::storage::MemoryStore;

    #[test]
    fn test_defaults_on_empty_store() {
        let prefs = Preferences::load(&MemoryStore::new());
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.theme, Theme::Light);
        assert!(prefs.show_translation);
        assert!(!prefs.only_translation);
        assert_eq!(prefs.font_size.level(), 3);
    }

    #[test]
    fn test_each_value_persists_independently() {
        let store = MemoryStore::new();
        let mut prefs = Preferences::load(&store);
        prefs.set_theme(&store, Theme::Dark);
        prefs.set_font_size(&store, FontSize::new(5));
        assert_eq!(store.len(), 2);

        let restored = Preferences::load(&store);
        assert_eq!(restored.theme, Theme::Dark);
        assert_eq!(restored.font_size.level(), 5);
        assert!(restored.show_translation);

        prefs.set_show_translation(&store, false);
        prefs.set_only_translation(&store, true);
        let restored = Preferences::load(&store);
        assert!(!restored.show_translation);
        assert!(restored.only_translation);
    }

    #[test]
    fn test_unreadable_values_fall_back() {
        let store = MemoryStore::new();
        store.set("app-theme", "sepia").unwrap();
        store.set("app-fontSize", "huge").unwrap();
        store.set("app-showTranslation", "false").unwrap();
        let prefs = Preferences::load(&store);
        assert_eq!(prefs.theme, Theme::Light);
        assert_eq!(prefs.font_size.level(), 3);
        assert!(!prefs.show_translation);
    }

    #[test]
    fn test_font_size_is_clamped() {
        assert_eq!(FontSize::new(9).level(), 5);
        assert_eq!(FontSize::new(-2).level(), 1);
        assert_eq!(FontSize::default().step(1).level(), 4);
        assert_eq!(FontSize::new(1).step(-1).level(), 1);
        assert_eq!(FontSize::default().columns(), 72);
        assert!(FontSize::new(5).columns() < FontSize::new(1).columns());

        let store = MemoryStore::new();
        store.set("app-fontSize", "12").unwrap();
        assert_eq!(Preferences::load(&store).font_size.level(), 5);
    }

    #[test]
    fn test_display_mode() {
        let mut prefs = Preferences::default();
        assert!(prefs.shows_arabic() && prefs.shows_translation());
        prefs.show_translation = false;
        assert!(prefs.shows_arabic() && !prefs.shows_translation());
        prefs.only_translation = true;
        assert!(!prefs.shows_arabic() && prefs.shows_translation());
    }
}
