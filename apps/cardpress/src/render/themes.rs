//! Card color themes, looked up by style id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    /// CSS background for the cover card.
    pub cover_bg: String,
    /// CSS background behind body cards.
    pub card_bg: String,
    pub accent_color: String,
    /// Secondary text color; themes on light backgrounds override it.
    #[serde(default = "default_text_light")]
    pub text_light: String,
}

fn default_text_light() -> String {
    "#666666".to_string()
}

/// Immutable set of themes, injected into renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeCatalog {
    themes: BTreeMap<String, Theme>,
}

impl ThemeCatalog {
    pub const DEFAULT_STYLE: &'static str = "purple";

    pub fn new(themes: BTreeMap<String, Theme>) -> Self {
        Self { themes }
    }

    pub fn builtin() -> Self {
        let mut themes = BTreeMap::new();
        let mut add = |id: &str, name: &str, from: &str, to: &str, accent: &str| {
            themes.insert(
                id.to_string(),
                Theme {
                    name: name.to_string(),
                    cover_bg: format!("linear-gradient(180deg, {from} 0%, {to} 100%)"),
                    card_bg: format!("linear-gradient(135deg, {from} 0%, {to} 100%)"),
                    accent_color: accent.to_string(),
                    text_light: default_text_light(),
                },
            );
        };
        add("xiaohongshu", "小红书红", "#FF2442", "#FF6B81", "#FF2442");
        add("mint", "清新薄荷", "#43e97b", "#38f9d7", "#43e97b");
        add("sunset", "日落橙", "#fa709a", "#fee140", "#fa709a");
        add("ocean", "深海蓝", "#4facfe", "#00f2fe", "#4facfe");
        add("dark", "暗黑模式", "#1a1a2e", "#16213e", "#e94560");

        // Cover and card gradients differ for these two.
        themes.insert(
            "purple".to_string(),
            Theme {
                name: "紫韵".to_string(),
                cover_bg: "linear-gradient(180deg, #3450E4 0%, #D266DA 100%)".to_string(),
                card_bg: "linear-gradient(135deg, #667eea 0%, #764ba2 100%)".to_string(),
                accent_color: "#6366f1".to_string(),
                text_light: default_text_light(),
            },
        );
        themes.insert(
            "elegant".to_string(),
            Theme {
                name: "优雅白".to_string(),
                cover_bg: "linear-gradient(180deg, #f5f5f5 0%, #e0e0e0 100%)".to_string(),
                card_bg: "linear-gradient(135deg, #f5f5f5 0%, #e8e8e8 100%)".to_string(),
                accent_color: "#333333".to_string(),
                text_light: "#555555".to_string(),
            },
        );

        Self { themes }
    }

    pub fn get(&self, style_id: &str) -> Option<&Theme> {
        self.themes.get(style_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.themes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_all_seven_styles() {
        let catalog = ThemeCatalog::builtin();
        let ids: Vec<&str> = catalog.ids().collect();
        assert_eq!(
            ids,
            vec!["dark", "elegant", "mint", "ocean", "purple", "sunset", "xiaohongshu"]
        );
        assert!(catalog.get(ThemeCatalog::DEFAULT_STYLE).is_some());
    }

    #[test]
    fn test_purple_cover_differs_from_card() {
        let purple = ThemeCatalog::builtin().get("purple").cloned().unwrap();
        assert_ne!(purple.cover_bg, purple.card_bg);
        assert!(purple.cover_bg.contains("#3450E4"));
    }

    #[test]
    fn test_elegant_overrides_text_light() {
        let catalog = ThemeCatalog::builtin();
        assert_eq!(catalog.get("elegant").unwrap().text_light, "#555555");
        assert_eq!(catalog.get("mint").unwrap().text_light, "#666666");
    }

    #[test]
    fn test_unknown_style_is_none() {
        assert!(ThemeCatalog::builtin().get("neon").is_none());
    }

    #[test]
    fn test_theme_json_defaults_text_light() {
        let theme: Theme = serde_json::from_str(
            r##"{"name":"x","cover_bg":"#000","card_bg":"#111","accent_color":"#f00"}"##,
        )
        .unwrap();
        assert_eq!(theme.text_light, "#666666");
    }
}
