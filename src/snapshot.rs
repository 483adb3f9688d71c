//! The persisted snapshot: four JSON artifacts written together by one
//! ingestion run and read by the query layer.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::post::Post;

pub const POSTS_FILE: &str = "posts.json";
pub const PUBLISHED_FILE: &str = "published-posts.json";
pub const STATS_FILE: &str = "stats.json";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub name: String,
    pub count: usize,
}

/// Aggregate counts over every post, published or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub categories: Vec<LabelCount>,
    pub tags: Vec<LabelCount>,
    pub total_posts: usize,
    pub published_posts: usize,
    pub draft_posts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub last_updated: DateTime<Utc>,
    pub total_posts: usize,
    pub published_posts: usize,
    pub draft_posts: usize,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub posts: Vec<Post>,
    pub published: Vec<Post>,
    pub stats: Stats,
    pub metadata: Metadata,
}

impl Snapshot {
    /// Derive the published view, stats and metadata from the full post list.
    pub fn build(posts: Vec<Post>, now: DateTime<Utc>) -> Self {
        let published: Vec<Post> = posts.iter().filter(|p| p.is_published()).cloned().collect();
        let stats = compute_stats(&posts);
        let metadata = Metadata {
            last_updated: now,
            total_posts: stats.total_posts,
            published_posts: stats.published_posts,
            draft_posts: stats.draft_posts,
        };

        Self {
            posts,
            published,
            stats,
            metadata,
        }
    }

    /// Write all four artifacts into `dir`. Every file is first written to a
    /// temporary sibling; the renames happen only once all writes succeeded,
    /// so a failed write leaves the previous snapshot untouched.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let artifacts = [
            (POSTS_FILE, serde_json::to_string_pretty(&self.posts)?),
            (PUBLISHED_FILE, serde_json::to_string_pretty(&self.published)?),
            (STATS_FILE, serde_json::to_string_pretty(&self.stats)?),
            (METADATA_FILE, serde_json::to_string_pretty(&self.metadata)?),
        ];

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(artifacts.len());
        for (name, body) in &artifacts {
            let tmp = dir.join(format!(".{}.tmp", name));
            if let Err(e) = fs::write(&tmp, body) {
                for (written, _) in &staged {
                    let _ = fs::remove_file(written);
                }
                return Err(Error::io(tmp, e));
            }
            staged.push((tmp, dir.join(name)));
        }

        for (tmp, target) in &staged {
            fs::rename(tmp, target).map_err(|e| Error::io(target, e))?;
        }

        info!(
            dir = %dir.display(),
            posts = self.posts.len(),
            published = self.published.len(),
            "snapshot saved"
        );
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let posts: Vec<Post> = read_json(&dir.join(POSTS_FILE))?;
        let published: Vec<Post> = read_json(&dir.join(PUBLISHED_FILE))?;
        let stats: Stats = read_json(&dir.join(STATS_FILE))?;
        let metadata: Metadata = read_json(&dir.join(METADATA_FILE))?;

        let ids: HashSet<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        let stray = published.iter().filter(|p| !ids.contains(p.id.as_str())).count();
        if stray > 0 {
            warn!(stray, "published posts missing from posts.json, snapshot may be mixed");
        }

        Ok(Self {
            posts,
            published,
            stats,
            metadata,
        })
    }
}

/// Category and tag counts plus totals. Labels keep first-appearance order.
pub fn compute_stats(posts: &[Post]) -> Stats {
    let published_posts = posts.iter().filter(|p| p.is_published()).count();

    let mut categories = Counter::default();
    let mut tags = Counter::default();
    for post in posts {
        if !post.category.is_empty() {
            categories.add(&post.category);
        }
        for tag in &post.tags {
            tags.add(tag);
        }
    }

    Stats {
        categories: categories.into_counts(),
        tags: tags.into_counts(),
        total_posts: posts.len(),
        published_posts,
        draft_posts: posts.len() - published_posts,
    }
}

#[derive(Default)]
struct Counter {
    index: HashMap<String, usize>,
    counts: Vec<LabelCount>,
}

impl Counter {
    fn add(&mut self, label: &str) {
        match self.index.get(label) {
            Some(&i) => self.counts[i].count += 1,
            None => {
                self.index.insert(label.to_string(), self.counts.len());
                self.counts.push(LabelCount {
                    name: label.to_string(),
                    count: 1,
                });
            }
        }
    }

    fn into_counts(self) -> Vec<LabelCount> {
        self.counts
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::Status;
    use chrono::{NaiveDate, TimeZone};

    fn post(id: &str, status: Status, category: &str, tags: &[&str]) -> Post {
        Post {
            id: id.into(),
            title: format!("Post {}", id),
            content: "body".into(),
            summary: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            category: category.into(),
            publish_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            last_edit_time: "2024-01-01T00:00:00.000Z".into(),
            status,
            cover_image: None,
            reading_time: 1,
            url_slug: format!("post-{}", id),
            seo_keywords: String::new(),
            author: "me".into(),
        }
    }

    fn sample() -> Vec<Post> {
        vec![
            post("a", Status::Published, "tech", &["rust", "go"]),
            post("b", Status::Draft, "life", &["rust"]),
            post("c", Status::Published, "tech", &[]),
        ]
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn stats_cover_all_posts() {
        let stats = compute_stats(&sample());
        assert_eq!(stats.total_posts, 3);
        assert_eq!(stats.published_posts, 2);
        assert_eq!(stats.draft_posts, 1);
        assert_eq!(
            stats.categories,
            vec![
                LabelCount { name: "tech".into(), count: 2 },
                LabelCount { name: "life".into(), count: 1 },
            ]
        );
        assert_eq!(
            stats.tags,
            vec![
                LabelCount { name: "rust".into(), count: 2 },
                LabelCount { name: "go".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn build_partitions_by_status() {
        let snap = Snapshot::build(sample(), now());
        let ids: Vec<&str> = snap.published.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(snap.metadata.total_posts, 3);
        assert_eq!(snap.metadata.published_posts + snap.metadata.draft_posts, 3);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let snap = Snapshot::build(sample(), now());
        snap.save(dir.path()).unwrap();

        for name in [POSTS_FILE, PUBLISHED_FILE, STATS_FILE, METADATA_FILE] {
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }

        let loaded = Snapshot::load(dir.path()).unwrap();
        assert_eq!(loaded.posts, snap.posts);
        assert_eq!(loaded.published, snap.published);
        assert_eq!(loaded.stats, snap.stats);
        assert_eq!(loaded.metadata, snap.metadata);

        let stats: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(STATS_FILE)).unwrap()).unwrap();
        assert_eq!(stats["totalPosts"], 3);
        assert_eq!(stats["categories"][0]["name"], "tech");
    }

    #[test]
    fn failed_write_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        Snapshot::build(sample(), now()).save(dir.path()).unwrap();
        let before = fs::read_to_string(dir.path().join(POSTS_FILE)).unwrap();

        // a directory squatting on the stats temp path makes that write fail
        fs::create_dir(dir.path().join(format!(".{}.tmp", STATS_FILE))).unwrap();

        let replacement = Snapshot::build(vec![post("z", Status::Draft, "x", &[])], now());
        assert!(matches!(replacement.save(dir.path()), Err(Error::Io { .. })));

        assert_eq!(fs::read_to_string(dir.path().join(POSTS_FILE)).unwrap(), before);
        assert!(!dir.path().join(format!(".{}.tmp", POSTS_FILE)).exists());
        assert_eq!(Snapshot::load(dir.path()).unwrap().posts.len(), 3);
    }

    #[test]
    fn load_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Snapshot::load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
