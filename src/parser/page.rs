use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use super::blocks::render_blocks;
use super::properties::{extract, PropertyValue};
use crate::config::SchemaSettings;
use crate::notion::model::{Block, Page};
use crate::post::{Post, Status};

static SLUG_STRIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_\s-]").unwrap());
static SLUG_SEP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_-]+").unwrap());

/// Characters read per minute; tuned for Chinese text, not word counts.
const CHARS_PER_MINUTE: usize = 500;

/// Everything normalization needs besides the page itself.
pub struct NormalizeContext<'a> {
    pub schema: &'a SchemaSettings,
    /// Stand-in publish date for pages without one.
    pub today: NaiveDate,
}

/// Assemble one Post from a page and its ordered child blocks.
pub fn normalize(page: &Page, blocks: &[Block], ctx: &NormalizeContext) -> Post {
    let schema = ctx.schema;
    let value = |name: &str| {
        page.properties
            .get(name)
            .map(extract)
            .unwrap_or(PropertyValue::Null)
    };

    let title = value(&schema.title)
        .as_text()
        .unwrap_or(&schema.untitled)
        .to_string();
    let summary = value(&schema.summary).as_text().unwrap_or_default().to_string();

    let mut content = render_blocks(blocks);
    if content.is_empty() {
        content = if !summary.is_empty() {
            format!("# {}\n\n{}", title, summary)
        } else {
            value(&schema.content).as_text().unwrap_or_default().to_string()
        };
    }

    let url_slug = value(&schema.slug)
        .as_text()
        .map(str::to_string)
        .unwrap_or_else(|| slugify(&title));

    let status = if value(&schema.status).as_text() == Some(schema.published_value.as_str()) {
        Status::Published
    } else {
        Status::Draft
    };

    Post {
        id: page.id.clone(),
        reading_time: reading_time(&content),
        summary,
        tags: value(&schema.tags).into_list(),
        category: value(&schema.category)
            .as_text()
            .unwrap_or(&schema.uncategorized)
            .to_string(),
        publish_date: publish_date(value(&schema.publish_date).as_text(), ctx.today),
        last_edit_time: page.last_edited_time.clone(),
        status,
        cover_image: value(&schema.cover).as_text().map(str::to_string),
        url_slug,
        seo_keywords: value(&schema.seo_keywords).to_display().unwrap_or_default(),
        author: value(&schema.author)
            .to_display()
            .unwrap_or_else(|| schema.unknown_author.clone()),
        title,
        content,
    }
}

/// Minutes to read `content`: ceil(chars / 500), 0 for empty content.
pub fn reading_time(content: &str) -> u32 {
    content.chars().count().div_ceil(CHARS_PER_MINUTE) as u32
}

/// URL token derived from a title. Only ASCII letters, digits, `_` and
/// separators survive, so titles in other scripts can reduce to "".
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = SLUG_STRIP_RE.replace_all(&lower, "");
    let joined = SLUG_SEP_RE.replace_all(&stripped, "-");
    joined.trim_matches('-').to_string()
}

/// Calendar date from a Notion date start: `YYYY-MM-DD` or an RFC 3339
/// timestamp (taken in UTC). Anything else falls back to `today`.
pub fn publish_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    let Some(raw) = raw else { return today };
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .unwrap_or(today)
}
