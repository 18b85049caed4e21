//! Custom emoji catalog offered by the graph creation picker alongside the
//! standard unicode set.

use crate::models::GraphIcon;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomEmoji {
    pub id: &'static str,
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub shortcode: &'static str,
    pub src: &'static str,
}

impl CustomEmoji {
    pub fn icon(&self) -> GraphIcon {
        GraphIcon::image(self.src)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmojiCategory {
    pub id: &'static str,
    pub name: &'static str,
    pub emojis: &'static [CustomEmoji],
}

pub const CUSTOM_EMOJI_CATEGORIES: &[EmojiCategory] = &[EmojiCategory {
    id: "exercise",
    name: "Exercise",
    emojis: &[CustomEmoji {
        id: "pushup",
        name: "Pushup",
        keywords: &["pushup", "exercise"],
        shortcode: ":pushup:",
        src: "/emojis/pushup.png",
    }],
}];

pub fn custom_emojis() -> impl Iterator<Item = &'static CustomEmoji> {
    CUSTOM_EMOJI_CATEGORIES
        .iter()
        .flat_map(|category| category.emojis.iter())
}

/// Looks up a custom emoji by id or shortcode.
pub fn find_custom(key: &str) -> Option<&'static CustomEmoji> {
    let key = key.trim();
    custom_emojis().find(|emoji| emoji.id == key || emoji.shortcode == key)
}

/// Case-insensitive keyword/name search for the picker.
pub fn search(query: &str) -> Vec<&'static CustomEmoji> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return custom_emojis().collect();
    }
    custom_emojis()
        .filter(|emoji| {
            emoji.name.to_lowercase().contains(&query)
                || emoji.keywords.iter().any(|keyword| keyword.contains(&query))
        })
        .collect()
}
