use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::emoji;
use crate::error::{LibError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for UserId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Timestamp-derived graph identifier, unique within one user's graphs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(pub String);

impl GraphId {
    /// Picks the current millisecond timestamp, stepping forward past any id
    /// already taken in `existing`.
    pub fn generate<'a>(existing: impl IntoIterator<Item = &'a GraphId>) -> Self {
        Self::generate_at(Utc::now().timestamp_millis(), existing)
    }

    pub fn generate_at<'a>(millis: i64, existing: impl IntoIterator<Item = &'a GraphId>) -> Self {
        let taken: HashSet<&str> = existing.into_iter().map(|id| id.as_str()).collect();
        let mut candidate = millis;
        while taken.contains(candidate.to_string().as_str()) {
            candidate += 1;
        }
        Self(candidate.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GraphId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Icon shown next to a graph title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GraphIcon {
    Glyph { value: String },
    Image { url: String },
}

impl GraphIcon {
    pub fn glyph(value: impl Into<String>) -> Self {
        Self::Glyph {
            value: value.into(),
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::Image { url: url.into() }
    }

    /// Converts the untagged string form, where asset paths and URLs were told
    /// apart from glyphs by their prefix.
    pub fn from_legacy(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.starts_with('/') || raw.starts_with("http://") || raw.starts_with("https://") {
            Some(Self::image(raw))
        } else {
            Some(Self::glyph(raw))
        }
    }

    fn normalize(self) -> Result<Self> {
        match self {
            GraphIcon::Glyph { value } => {
                let value = value.trim().to_string();
                if value.is_empty() {
                    return Err(LibError::invalid(
                        "Emoji cannot be empty",
                        anyhow!("empty glyph icon"),
                    ));
                }
                if value.chars().count() > MAX_GLYPH_CHARS {
                    return Err(LibError::invalid(
                        "Emoji must be a single glyph",
                        anyhow!("glyph icon too long: {value}"),
                    ));
                }
                Ok(GraphIcon::Glyph { value })
            }
            GraphIcon::Image { url } => {
                let url = url.trim().to_string();
                if url.is_empty() {
                    return Err(LibError::invalid(
                        "Image reference cannot be empty",
                        anyhow!("empty image icon"),
                    ));
                }
                Ok(GraphIcon::Image { url })
            }
        }
    }
}

// Keycap and ZWJ family sequences run to about ten scalar values.
const MAX_GLYPH_CHARS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub graph_id: GraphId,
    pub title: String,
    #[serde(alias = "xValue")]
    pub x_label: String,
    #[serde(alias = "yValue")]
    pub y_label: String,
    #[serde(
        default,
        deserialize_with = "icon_or_legacy",
        skip_serializing_if = "Option::is_none"
    )]
    pub emoji: Option<GraphIcon>,
    #[serde(default)]
    pub data: Vec<f64>,
    #[serde(default)]
    pub revision: u64,
    /// Exported documents predate timestamps; those load as "now".
    #[serde(default = "now")]
    pub created_at: NaiveDateTime,
    #[serde(default = "now")]
    pub updated_at: NaiveDateTime,
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl Graph {
    pub fn new(graph_id: GraphId, definition: GraphDefinition) -> Self {
        let now = now();
        Self {
            graph_id,
            title: definition.title,
            x_label: definition.x_label,
            y_label: definition.y_label,
            emoji: definition.emoji,
            data: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_point(&mut self, value: f64) {
        self.data.push(value);
        self.touch();
    }

    pub fn apply_metadata(&mut self, patch: &MetadataPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(x_label) = &patch.x_label {
            self.x_label = x_label.clone();
        }
        if let Some(y_label) = &patch.y_label {
            self.y_label = y_label.clone();
        }
        if let Some(emoji) = &patch.emoji {
            self.emoji = emoji.clone();
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = now();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub graphs: Vec<Graph>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserPayload {
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGraphPayload {
    pub title: String,
    #[serde(default, alias = "xValue")]
    pub x_label: String,
    #[serde(default, alias = "yValue")]
    pub y_label: String,
    #[serde(default, deserialize_with = "icon_or_legacy")]
    pub emoji: Option<GraphIcon>,
}

/// Partial metadata update. Absent fields are left as stored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMetadataPayload {
    pub title: Option<String>,
    #[serde(alias = "xValue")]
    pub x_label: Option<String>,
    #[serde(alias = "yValue")]
    pub y_label: Option<String>,
    /// `null` clears the icon; an absent key leaves it alone.
    #[serde(default, deserialize_with = "patched_icon")]
    pub emoji: Option<Option<GraphIcon>>,
    pub expected_revision: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendPointPayload {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphDefinition {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub emoji: Option<GraphIcon>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub emoji: Option<Option<GraphIcon>>,
    pub expected_revision: Option<u64>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.x_label.is_none()
            && self.y_label.is_none()
            && self.emoji.is_none()
    }
}

/// Icons arrive either tagged or as the bare string older clients stored.
#[derive(Deserialize)]
#[serde(untagged)]
enum IconRepr {
    Tagged(GraphIcon),
    Legacy(String),
}

fn icon_or_legacy<'de, D>(deserializer: D) -> std::result::Result<Option<GraphIcon>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<IconRepr>::deserialize(deserializer)? {
        Some(IconRepr::Tagged(icon)) => Some(icon),
        Some(IconRepr::Legacy(raw)) => GraphIcon::from_legacy(&raw),
        None => None,
    })
}

// Present-but-null clears the icon, so the outer `Some` marks the key as given.
fn patched_icon<'de, D>(deserializer: D) -> std::result::Result<Option<Option<GraphIcon>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    icon_or_legacy(deserializer).map(Some)
}

impl CreateGraphPayload {
    pub fn normalize(self) -> Result<GraphDefinition> {
        Ok(GraphDefinition {
            title: normalize_title(self.title)?,
            x_label: self.x_label.trim().to_string(),
            y_label: self.y_label.trim().to_string(),
            emoji: self.emoji.map(normalize_icon).transpose()?,
        })
    }
}

impl UpdateMetadataPayload {
    pub fn normalize(self) -> Result<MetadataPatch> {
        let patch = MetadataPatch {
            title: self.title.map(normalize_title).transpose()?,
            x_label: self.x_label.map(|label| label.trim().to_string()),
            y_label: self.y_label.map(|label| label.trim().to_string()),
            emoji: self
                .emoji
                .map(|icon| icon.map(normalize_icon).transpose())
                .transpose()?,
            expected_revision: self.expected_revision,
        };
        if patch.is_empty() {
            return Err(LibError::invalid(
                "Nothing to update",
                anyhow!("metadata update carried no fields"),
            ));
        }
        Ok(patch)
    }
}

impl AppendPointPayload {
    pub fn normalize(self) -> Result<f64> {
        validate_point(self.value)
    }
}

pub fn validate_point(value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(LibError::invalid(
            "Point value must be a finite number",
            anyhow!("non-finite point value {value}"),
        ))
    }
}

fn normalize_title(title: String) -> Result<String> {
    let title = title.trim().to_string();
    if title.is_empty() {
        return Err(LibError::invalid(
            "Graph title is required",
            anyhow!("empty graph title"),
        ));
    }
    Ok(title)
}

// Custom catalog ids (`:pushup:` or `pushup`) resolve to their image asset.
fn normalize_icon(icon: GraphIcon) -> Result<GraphIcon> {
    if let GraphIcon::Glyph { value } = &icon {
        if let Some(custom) = emoji::find_custom(value) {
            return Ok(custom.icon());
        }
    }
    icon.normalize()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn generate_steps_past_taken_ids() {
        let taken = [GraphId::from("1000"), GraphId::from("1001")];
        let id = GraphId::generate_at(1000, taken.iter());
        assert_eq!(id.as_str(), "1002");

        let free = GraphId::generate_at(2000, taken.iter());
        assert_eq!(free.as_str(), "2000");
    }

    #[test]
    fn legacy_icon_strings_become_tagged() {
        assert_eq!(
            GraphIcon::from_legacy("/emojis/pushup.png"),
            Some(GraphIcon::image("/emojis/pushup.png"))
        );
        assert_eq!(
            GraphIcon::from_legacy("https://cdn.example/run.png"),
            Some(GraphIcon::image("https://cdn.example/run.png"))
        );
        assert_eq!(GraphIcon::from_legacy("🏃"), Some(GraphIcon::glyph("🏃")));
        assert_eq!(GraphIcon::from_legacy("  "), None);
    }

    #[test]
    fn icon_serializes_with_kind_tag() {
        let value = serde_json::to_value(GraphIcon::image("/emojis/pushup.png"))
            .expect("icon should serialize");
        assert_eq!(value, json!({"kind": "image", "url": "/emojis/pushup.png"}));

        let glyph: GraphIcon = serde_json::from_value(json!({"kind": "glyph", "value": "💧"}))
            .expect("glyph should deserialize");
        assert_eq!(glyph, GraphIcon::glyph("💧"));
    }

    #[test]
    fn create_payload_trims_and_requires_title() {
        let definition = CreateGraphPayload {
            title: "  Pushups ".to_string(),
            x_label: " Day ".to_string(),
            y_label: "Reps".to_string(),
            emoji: None,
        }
        .normalize()
        .expect("payload should normalize");
        assert_eq!(definition.title, "Pushups");
        assert_eq!(definition.x_label, "Day");

        let err = CreateGraphPayload {
            title: "   ".to_string(),
            ..Default::default()
        }
        .normalize()
        .expect_err("blank title should fail");
        assert_eq!(err.public, "Graph title is required");
    }

    #[test]
    fn create_payload_resolves_custom_emoji() {
        let definition = CreateGraphPayload {
            title: "Pushups".to_string(),
            emoji: Some(GraphIcon::glyph(":pushup:")),
            ..Default::default()
        }
        .normalize()
        .expect("payload should normalize");
        assert_eq!(
            definition.emoji,
            Some(GraphIcon::image("/emojis/pushup.png"))
        );
    }

    #[test]
    fn create_payload_accepts_axis_value_aliases() {
        let payload: CreateGraphPayload = serde_json::from_value(json!({
            "title": "Water",
            "xValue": "Day",
            "yValue": "Glasses"
        }))
        .expect("payload should deserialize");
        assert_eq!(payload.x_label, "Day");
        assert_eq!(payload.y_label, "Glasses");
    }

    #[test]
    fn update_payload_distinguishes_null_and_absent_emoji() {
        let cleared: UpdateMetadataPayload = serde_json::from_value(json!({"emoji": null}))
            .expect("payload should deserialize");
        assert_eq!(cleared.emoji, Some(None));

        let untouched: UpdateMetadataPayload = serde_json::from_value(json!({"title": "Runs"}))
            .expect("payload should deserialize");
        assert_eq!(untouched.emoji, None);
    }

    #[test]
    fn empty_update_is_rejected() {
        let err = UpdateMetadataPayload::default()
            .normalize()
            .expect_err("empty update should fail");
        assert_eq!(err.public, "Nothing to update");
    }

    #[test]
    fn non_finite_points_are_rejected() {
        assert!(validate_point(f64::NAN).is_err());
        assert!(validate_point(f64::INFINITY).is_err());
        assert_eq!(validate_point(-2.5).expect("finite value"), -2.5);
    }

    #[test]
    fn metadata_patch_leaves_data_and_id_alone() {
        let mut graph = Graph::new(
            GraphId::from("42"),
            GraphDefinition {
                title: "Runs".to_string(),
                x_label: "Week".to_string(),
                y_label: "Km".to_string(),
                emoji: None,
            },
        );
        graph.push_point(5.0);
        graph.apply_metadata(&MetadataPatch {
            title: Some("Long runs".to_string()),
            ..Default::default()
        });

        assert_eq!(graph.title, "Long runs");
        assert_eq!(graph.graph_id, GraphId::from("42"));
        assert_eq!(graph.data, vec![5.0]);
        assert_eq!(graph.x_label, "Week");
        assert_eq!(graph.revision, 2);
    }

    #[test]
    fn exported_graph_record_loads() {
        let graph: Graph = serde_json::from_value(json!({
            "graphId": "1718000000000",
            "title": "Runs",
            "xValue": "Day",
            "yValue": "Km",
            "emoji": "🏃",
            "data": [1, 2]
        }))
        .expect("exported record should deserialize");
        assert_eq!(graph.graph_id, GraphId::from("1718000000000"));
        assert_eq!(graph.x_label, "Day");
        assert_eq!(graph.y_label, "Km");
        assert_eq!(graph.emoji, Some(GraphIcon::glyph("🏃")));
        assert_eq!(graph.data, vec![1.0, 2.0]);
        assert_eq!(graph.revision, 0);

        let custom: Graph = serde_json::from_value(json!({
            "graphId": "1718000000001",
            "title": "Pushups",
            "xValue": "Day",
            "yValue": "Reps",
            "emoji": "/emojis/pushup.png"
        }))
        .expect("image path should deserialize");
        assert_eq!(custom.emoji, Some(GraphIcon::image("/emojis/pushup.png")));
        assert!(custom.data.is_empty());
    }

    #[test]
    fn tagged_and_legacy_icons_both_accepted_in_payloads() {
        let create: CreateGraphPayload = serde_json::from_value(json!({
            "title": "Water",
            "emoji": {"kind": "glyph", "value": "💧"}
        }))
        .expect("tagged icon should deserialize");
        assert_eq!(create.emoji, Some(GraphIcon::glyph("💧")));

        let update: UpdateMetadataPayload = serde_json::from_value(json!({"emoji": "💧"}))
            .expect("legacy icon should deserialize");
        assert_eq!(update.emoji, Some(Some(GraphIcon::glyph("💧"))));
    }
}
