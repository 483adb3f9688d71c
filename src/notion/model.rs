//! Typed view over the Notion JSON payloads the blog cares about.
//!
//! Blocks and properties are decoded into closed enums. Any type we do not
//! model, or a payload whose shape does not match, lands in an `Unknown`
//! variant that keeps the raw JSON so converters can still salvage text.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

// ── Shared pieces ──

/// One run of rich text. Only the rendered plain text is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub href: Option<String>,
}

/// Concatenate the plain text of every run, in order, with no separator.
pub fn plain_text(runs: &[RichText]) -> String {
    runs.iter().map(|r| r.plain_text.as_str()).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UrlRef {
    #[serde(default)]
    pub url: String,
}

/// A Notion file object: either hosted by Notion (`file`) or linked (`external`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileSource {
    #[serde(default)]
    pub file: Option<UrlRef>,
    #[serde(default)]
    pub external: Option<UrlRef>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub caption: Vec<RichText>,
}

impl FileSource {
    /// Notion-hosted URL first, external URL second; empty strings count as absent.
    pub fn url(&self) -> Option<&str> {
        let hosted = self.file.as_ref().map(|f| f.url.as_str());
        let external = self.external.as_ref().map(|f| f.url.as_str());
        hosted
            .filter(|u| !u.is_empty())
            .or(external.filter(|u| !u.is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DateValue {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

// ── Blocks ──

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub has_children: bool,
    pub kind: BlockKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Paragraph(Vec<RichText>),
    Heading { level: u8, text: Vec<RichText> },
    BulletedListItem(Vec<RichText>),
    NumberedListItem(Vec<RichText>),
    Code { language: String, text: Vec<RichText> },
    Quote(Vec<RichText>),
    Divider,
    Toggle(Vec<RichText>),
    ToDo { checked: bool, text: Vec<RichText> },
    Callout { icon: Option<String>, text: Vec<RichText> },
    Image(FileSource),
    Video(FileSource),
    File(FileSource),
    Embed { url: Option<String> },
    Bookmark { url: Option<String>, caption: Vec<RichText> },
    Table,
    Unknown { kind: String, payload: Value },
}

#[derive(Deserialize)]
struct TextPayload {
    #[serde(default)]
    rich_text: Vec<RichText>,
}

#[derive(Deserialize)]
struct CodePayload {
    #[serde(default)]
    rich_text: Vec<RichText>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Deserialize)]
struct ToDoPayload {
    #[serde(default)]
    rich_text: Vec<RichText>,
    #[serde(default)]
    checked: bool,
}

#[derive(Deserialize)]
struct Icon {
    #[serde(default)]
    emoji: Option<String>,
}

#[derive(Deserialize)]
struct CalloutPayload {
    #[serde(default)]
    rich_text: Vec<RichText>,
    #[serde(default)]
    icon: Option<Icon>,
}

#[derive(Deserialize)]
struct LinkPayload {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    caption: Vec<RichText>,
}

impl BlockKind {
    fn decode(kind: &str, payload: Value) -> serde_json::Result<Self> {
        let text = |p: Value| serde_json::from_value::<TextPayload>(p).map(|t| t.rich_text);

        Ok(match kind {
            "paragraph" => Self::Paragraph(text(payload)?),
            "heading_1" => Self::Heading { level: 1, text: text(payload)? },
            "heading_2" => Self::Heading { level: 2, text: text(payload)? },
            "heading_3" => Self::Heading { level: 3, text: text(payload)? },
            "bulleted_list_item" => Self::BulletedListItem(text(payload)?),
            "numbered_list_item" => Self::NumberedListItem(text(payload)?),
            "quote" => Self::Quote(text(payload)?),
            "toggle" => Self::Toggle(text(payload)?),
            "code" => {
                let c: CodePayload = serde_json::from_value(payload)?;
                Self::Code {
                    language: c.language.unwrap_or_default(),
                    text: c.rich_text,
                }
            }
            "to_do" => {
                let t: ToDoPayload = serde_json::from_value(payload)?;
                Self::ToDo {
                    checked: t.checked,
                    text: t.rich_text,
                }
            }
            "callout" => {
                let c: CalloutPayload = serde_json::from_value(payload)?;
                Self::Callout {
                    icon: c.icon.and_then(|i| i.emoji),
                    text: c.rich_text,
                }
            }
            "image" => Self::Image(serde_json::from_value(payload)?),
            "video" => Self::Video(serde_json::from_value(payload)?),
            "file" => Self::File(serde_json::from_value(payload)?),
            "embed" => {
                let l: LinkPayload = serde_json::from_value(payload)?;
                Self::Embed { url: l.url }
            }
            "bookmark" => {
                let l: LinkPayload = serde_json::from_value(payload)?;
                Self::Bookmark {
                    url: l.url,
                    caption: l.caption,
                }
            }
            "divider" => Self::Divider,
            "table" => Self::Table,
            other => Self::Unknown {
                kind: other.to_string(),
                payload,
            },
        })
    }

    /// Notion type name this variant was decoded from.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Paragraph(_) => "paragraph",
            Self::Heading { level: 1, .. } => "heading_1",
            Self::Heading { level: 2, .. } => "heading_2",
            Self::Heading { .. } => "heading_3",
            Self::BulletedListItem(_) => "bulleted_list_item",
            Self::NumberedListItem(_) => "numbered_list_item",
            Self::Code { .. } => "code",
            Self::Quote(_) => "quote",
            Self::Divider => "divider",
            Self::Toggle(_) => "toggle",
            Self::ToDo { .. } => "to_do",
            Self::Callout { .. } => "callout",
            Self::Image(_) => "image",
            Self::Video(_) => "video",
            Self::File(_) => "file",
            Self::Embed { .. } => "embed",
            Self::Bookmark { .. } => "bookmark",
            Self::Table => "table",
            Self::Unknown { kind, .. } => kind.as_str(),
        }
    }
}

impl Block {
    /// Decode a raw block object. Never fails: unexpected shapes become
    /// `BlockKind::Unknown` carrying the raw payload.
    pub fn from_value(raw: Value) -> Self {
        let id = str_field(&raw, "id");
        let has_children = raw
            .get("has_children")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let kind_name = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let payload = raw.get(&kind_name).cloned().unwrap_or(Value::Null);

        let kind = match BlockKind::decode(&kind_name, payload.clone()) {
            Ok(kind) => kind,
            Err(e) => {
                warn!(block_id = %id, kind = %kind_name, error = %e, "malformed block payload");
                BlockKind::Unknown {
                    kind: kind_name,
                    payload,
                }
            }
        };

        Block {
            id,
            has_children,
            kind,
        }
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Block::from_value)
    }
}

// ── Properties ──

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Title(Vec<RichText>),
    RichText(Vec<RichText>),
    Select(Option<SelectOption>),
    MultiSelect(Vec<SelectOption>),
    Date(Option<DateValue>),
    Checkbox(bool),
    Number(Option<f64>),
    Url(Option<String>),
    Email(Option<String>),
    PhoneNumber(Option<String>),
    Files(Vec<FileSource>),
    People(Vec<Person>),
    Unknown { kind: String, payload: Value },
}

impl Property {
    fn decode(kind: &str, payload: Value) -> serde_json::Result<Self> {
        use serde_json::from_value;

        Ok(match kind {
            "title" => Self::Title(from_value(payload)?),
            "rich_text" => Self::RichText(from_value(payload)?),
            "select" => Self::Select(from_value(payload)?),
            "multi_select" => Self::MultiSelect(from_value(payload)?),
            "date" => Self::Date(from_value(payload)?),
            "checkbox" => Self::Checkbox(from_value(payload)?),
            "number" => Self::Number(from_value(payload)?),
            "url" => Self::Url(from_value(payload)?),
            "email" => Self::Email(from_value(payload)?),
            "phone_number" => Self::PhoneNumber(from_value(payload)?),
            "files" => Self::Files(from_value(payload)?),
            "people" => Self::People(from_value(payload)?),
            other => Self::Unknown {
                kind: other.to_string(),
                payload,
            },
        })
    }

    /// Decode a raw property object. Malformed payloads become `Unknown`.
    pub fn from_value(raw: Value) -> Self {
        let kind_name = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let payload = raw.get(&kind_name).cloned().unwrap_or(Value::Null);

        match Property::decode(&kind_name, payload.clone()) {
            Ok(p) => p,
            Err(e) => {
                warn!(kind = %kind_name, error = %e, "malformed property payload");
                Property::Unknown {
                    kind: kind_name,
                    payload,
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for Property {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Property::from_value)
    }
}

// ── Pages, databases, list envelopes ──

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub last_edited_time: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseInfo {
    pub id: String,
    #[serde(default)]
    pub title: Vec<RichText>,
    #[serde(default)]
    pub properties: BTreeMap<String, DatabaseProperty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseProperty {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Cursor-paginated list envelope shared by query and children endpoints.
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Error body Notion sends with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_heading_levels() {
        let b = Block::from_value(json!({
            "id": "b1", "type": "heading_2",
            "heading_2": { "rich_text": [{ "plain_text": "Setup" }] }
        }));
        assert!(matches!(&b.kind, BlockKind::Heading { level: 2, text } if plain_text(text) == "Setup"));
        assert_eq!(b.kind.type_name(), "heading_2");
    }

    #[test]
    fn unmodelled_block_keeps_payload() {
        let b = Block::from_value(json!({
            "id": "b2", "type": "equation",
            "equation": { "expression": "e=mc^2" }
        }));
        match b.kind {
            BlockKind::Unknown { kind, payload } => {
                assert_eq!(kind, "equation");
                assert_eq!(payload["expression"], "e=mc^2");
            }
            other => panic!("expected unknown, got {:?}", other),
        }
    }

    #[test]
    fn malformed_block_degrades_to_unknown() {
        let b = Block::from_value(json!({
            "id": "b3", "type": "paragraph",
            "paragraph": { "rich_text": "not a list" }
        }));
        assert!(matches!(b.kind, BlockKind::Unknown { ref kind, .. } if kind == "paragraph"));
    }

    #[test]
    fn file_source_prefers_hosted_url() {
        let f: FileSource = serde_json::from_value(json!({
            "file": { "url": "https://s3/hosted.png" },
            "external": { "url": "https://cdn/ext.png" }
        }))
        .unwrap();
        assert_eq!(f.url(), Some("https://s3/hosted.png"));

        let f: FileSource = serde_json::from_value(json!({
            "file": { "url": "" },
            "external": { "url": "https://cdn/ext.png" }
        }))
        .unwrap();
        assert_eq!(f.url(), Some("https://cdn/ext.png"));

        assert_eq!(FileSource::default().url(), None);
    }

    #[test]
    fn page_fixture_decodes() {
        let raw = std::fs::read_to_string("tests/fixtures/page.json").unwrap();
        let page: Page = serde_json::from_str(&raw).unwrap();
        assert_eq!(page.id, "4f1c2a9e-1b2c-4d3e-8f90-a1b2c3d4e5f6");
        assert!(matches!(page.properties.get("标题"), Some(Property::Title(_))));
        assert!(matches!(page.properties.get("标签"), Some(Property::MultiSelect(v)) if v.len() == 2));
        assert!(matches!(page.properties.get("阅读量"), Some(Property::Unknown { .. })));
    }

    #[test]
    fn list_response_cursor() {
        let raw = std::fs::read_to_string("tests/fixtures/blocks.json").unwrap();
        let list: ListResponse<Block> = serde_json::from_str(&raw).unwrap();
        assert!(!list.results.is_empty());
        assert!(!list.has_more);
        assert!(list.next_cursor.is_none());
    }
}
