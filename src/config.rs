//! Layered settings: optional config file, `BLOG_*` env vars, legacy Notion env names.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::cache;
use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.notion.com/v1";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub notion: NotionSettings,
    pub ingest: IngestSettings,
    pub schema: SchemaSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotionSettings {
    pub token: Option<String>,
    pub database_id: Option<String>,
    pub api_base: String,
    pub version: String,
    /// Page size for database queries and block listings (Notion caps this at 100).
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for NotionSettings {
    fn default() -> Self {
        Self {
            token: None,
            database_id: None,
            api_base: DEFAULT_API_BASE.to_string(),
            version: DEFAULT_NOTION_VERSION.to_string(),
            page_size: 100,
            timeout_secs: 30,
        }
    }
}

impl NotionSettings {
    /// Token and database id, both required for any upstream call.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let token = self
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Config("NOTION_API_KEY (or notion.token) is not set".into()))?;
        let database_id = self
            .database_id
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                Error::Config("NOTION_DATABASE_ID (or notion.database_id) is not set".into())
            })?;
        Ok((token, database_id))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Directory receiving the four snapshot artifacts.
    pub data_dir: PathBuf,
    /// Minimum gap between consecutive page fetches.
    pub request_delay_ms: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            request_delay_ms: 100,
        }
    }
}

impl IngestSettings {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Property names of the Notion database plus the sentinel values used
/// while normalizing. Defaults match the Chinese blog template.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaSettings {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub tags: String,
    pub category: String,
    pub publish_date: String,
    pub status: String,
    pub cover: String,
    pub slug: String,
    pub seo_keywords: String,
    pub author: String,

    /// Status value that marks a page as published.
    pub published_value: String,
    pub untitled: String,
    pub uncategorized: String,
    pub unknown_author: String,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            title: "标题".into(),
            content: "内容".into(),
            summary: "摘要".into(),
            tags: "标签".into(),
            category: "分类".into(),
            publish_date: "发布日期".into(),
            status: "发布状态".into(),
            cover: "封面图片".into(),
            slug: "URL别名".into(),
            seo_keywords: "SEO关键词".into(),
            author: "作者".into(),
            published_value: "已发布".into(),
            untitled: "无标题".into(),
            uncategorized: "未分类".into(),
            unknown_author: "未知作者".into(),
        }
    }
}

impl SchemaSettings {
    /// Every property name the normalizer reads, paired with its role.
    pub fn fields(&self) -> [(&'static str, &str); 11] {
        [
            ("title", self.title.as_str()),
            ("content", self.content.as_str()),
            ("summary", self.summary.as_str()),
            ("tags", self.tags.as_str()),
            ("category", self.category.as_str()),
            ("publish_date", self.publish_date.as_str()),
            ("status", self.status.as_str()),
            ("cover", self.cover.as_str()),
            ("slug", self.slug.as_str()),
            ("seo_keywords", self.seo_keywords.as_str()),
            ("author", self.author.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub facet_ttl_secs: u64,
    pub search_ttl_secs: u64,
    pub max_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            facet_ttl_secs: cache::ttl::FACETS.as_secs(),
            search_ttl_secs: cache::ttl::SEARCH.as_secs(),
            max_capacity: cache::DEFAULT_CAPACITY,
        }
    }
}

impl CacheSettings {
    pub fn facet_ttl(&self) -> Duration {
        Duration::from_secs(self.facet_ttl_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }
}

impl Settings {
    /// Load settings from `config_file` (optional, any format `config` understands),
    /// then `BLOG_`-prefixed env vars (`BLOG_NOTION__DATABASE_ID`), then the
    /// legacy `NOTION_API_KEY` / `NOTION_TOKEN` / `NOTION_DATABASE_ID` names.
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(name) = config_file {
            builder = builder.add_source(config::File::with_name(name).required(false));
        }

        let legacy_token = std::env::var("NOTION_API_KEY")
            .or_else(|_| std::env::var("NOTION_TOKEN"))
            .ok();
        let legacy_database = std::env::var("NOTION_DATABASE_ID").ok();

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix("BLOG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("notion.token", legacy_token)?
            .set_override_option("notion.database_id", legacy_database)?
            .build()?
            .try_deserialize()?;

        info!(
            data_dir = %settings.ingest.data_dir.display(),
            api_base = %settings.notion.api_base,
            has_token = settings.notion.token.is_some(),
            has_database = settings.notion.database_id.is_some(),
            "settings loaded"
        );

        Ok(settings)
    }
}
