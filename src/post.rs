use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Published,
    Draft,
}

/// One normalized blog post, as persisted in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: String,
    pub publish_date: NaiveDate,
    #[serde(default)]
    pub last_edit_time: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub reading_time: u32,
    pub url_slug: String,
    #[serde(default)]
    pub seo_keywords: String,
    #[serde(default)]
    pub author: String,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == Status::Published
    }

    /// Lowercased `title summary category tags…`, the text search matches against.
    pub fn searchable_text(&self) -> String {
        let mut parts = vec![self.title.as_str(), self.summary.as_str(), self.category.as_str()];
        parts.extend(self.tags.iter().map(String::as_str));
        parts.join(" ").to_lowercase()
    }
}
