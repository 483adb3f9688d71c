//! Read-side queries over a loaded snapshot, with TTL memoization of the
//! derived views (facet lists, label counts, search results).

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::cache::TtlCache;
use crate::config::CacheSettings;
use crate::error::Result;
use crate::post::Post;
use crate::snapshot::Snapshot;

const ALL_CATEGORIES_KEY: &str = "all_categories";
const ALL_TAGS_KEY: &str = "all_tags";
const CATEGORY_STATS_KEY: &str = "category_stats";
const TAG_STATS_KEY: &str = "tag_stats";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogStats {
    pub total_posts: usize,
    pub published_posts: usize,
    pub draft_posts: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub size: usize,
    pub keys: Vec<String>,
}

/// One page of a longer list. Pages are 1-based.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}

/// Slice `items` into page `page` (1-based) of `page_size` entries.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Paginated<T> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1).saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());

    Paginated {
        data: items[start..end].to_vec(),
        total: items.len(),
        page,
        page_size,
        has_more: end < items.len(),
    }
}

pub struct BlogStore {
    snapshot: Snapshot,
    labels: TtlCache<Vec<String>>,
    counts: TtlCache<BTreeMap<String, usize>>,
    /// Indices into the published list, in ranked order.
    search: TtlCache<Vec<usize>>,
}

impl BlogStore {
    pub fn new(snapshot: Snapshot, settings: &CacheSettings) -> Self {
        Self {
            snapshot,
            labels: TtlCache::new("labels", settings.facet_ttl(), settings.max_capacity),
            counts: TtlCache::new("counts", settings.facet_ttl(), settings.max_capacity),
            search: TtlCache::new("search", settings.search_ttl(), settings.max_capacity),
        }
    }

    /// Load the snapshot in `dir` and wrap it.
    pub fn open(dir: &Path, settings: &CacheSettings) -> Result<Self> {
        let snapshot = Snapshot::load(dir)?;
        debug!(
            dir = %dir.display(),
            posts = snapshot.posts.len(),
            published = snapshot.published.len(),
            "store opened"
        );
        Ok(Self::new(snapshot, settings))
    }

    // ── Direct reads ──

    pub fn all_posts(&self) -> &[Post] {
        &self.snapshot.posts
    }

    pub fn published_posts(&self) -> &[Post] {
        &self.snapshot.published
    }

    pub fn post_by_id(&self, id: &str) -> Option<&Post> {
        if id.is_empty() {
            return None;
        }
        self.snapshot.posts.iter().find(|p| p.id == id)
    }

    /// Published posts, newest first, at most `n`.
    pub fn latest_posts(&self, n: usize) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self.snapshot.published.iter().collect();
        posts.sort_by_key(|p| Reverse(p.publish_date));
        posts.truncate(n);
        posts
    }

    pub fn posts_by_category(&self, category: &str) -> Vec<&Post> {
        if category.is_empty() {
            return Vec::new();
        }
        self.snapshot
            .published
            .iter()
            .filter(|p| p.category == category)
            .collect()
    }

    pub fn posts_by_tag(&self, tag: &str) -> Vec<&Post> {
        if tag.is_empty() {
            return Vec::new();
        }
        self.snapshot
            .published
            .iter()
            .filter(|p| p.tags.iter().any(|t| t == tag))
            .collect()
    }

    pub fn blog_stats(&self) -> BlogStats {
        let meta = &self.snapshot.metadata;
        BlogStats {
            total_posts: meta.total_posts,
            published_posts: meta.published_posts,
            draft_posts: meta.draft_posts,
            last_updated: meta.last_updated,
        }
    }

    // ── Memoized views ──

    /// Distinct categories of published posts, sorted.
    pub fn all_categories(&self) -> Arc<Vec<String>> {
        self.labels.get_or_compute(ALL_CATEGORIES_KEY, || {
            let set: BTreeSet<&str> = self
                .snapshot
                .published
                .iter()
                .map(|p| p.category.as_str())
                .filter(|c| !c.is_empty())
                .collect();
            set.into_iter().map(str::to_string).collect()
        })
    }

    /// Distinct tags of published posts, sorted.
    pub fn all_tags(&self) -> Arc<Vec<String>> {
        self.labels.get_or_compute(ALL_TAGS_KEY, || {
            let set: BTreeSet<&str> = self
                .snapshot
                .published
                .iter()
                .flat_map(|p| p.tags.iter().map(String::as_str))
                .collect();
            set.into_iter().map(str::to_string).collect()
        })
    }

    /// Published post count per category.
    pub fn category_stats(&self) -> Arc<BTreeMap<String, usize>> {
        self.counts.get_or_compute(CATEGORY_STATS_KEY, || {
            let mut stats = BTreeMap::new();
            for post in self.snapshot.published.iter().filter(|p| !p.category.is_empty()) {
                *stats.entry(post.category.clone()).or_insert(0) += 1;
            }
            stats
        })
    }

    /// Published post count per tag.
    pub fn tag_stats(&self) -> Arc<BTreeMap<String, usize>> {
        self.counts.get_or_compute(TAG_STATS_KEY, || {
            let mut stats = BTreeMap::new();
            for tag in self.snapshot.published.iter().flat_map(|p| &p.tags) {
                *stats.entry(tag.clone()).or_insert(0) += 1;
            }
            stats
        })
    }

    /// Published posts containing every whitespace-separated term of `query`
    /// (case-insensitive) in their title, summary, category or tags.
    /// Posts whose title contains the whole query come first, then newest first.
    /// A blank query matches nothing.
    pub fn search_posts(&self, query: &str) -> Vec<&Post> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let lower = query.to_lowercase();
        let key = format!("search_{}", lower);
        let ranked = self.search.get_or_compute(&key, || self.rank(&lower));

        ranked
            .iter()
            .filter_map(|&i| self.snapshot.published.get(i))
            .collect()
    }

    fn rank(&self, lower: &str) -> Vec<usize> {
        let terms: Vec<&str> = lower.split_whitespace().collect();
        let published = &self.snapshot.published;

        let mut hits: Vec<(usize, bool)> = published
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                let text = p.searchable_text();
                terms.iter().all(|t| text.contains(t))
            })
            .map(|(i, p)| (i, p.title.to_lowercase().contains(lower)))
            .collect();

        hits.sort_by_key(|&(i, title_hit)| (Reverse(title_hit), Reverse(published[i].publish_date)));
        hits.into_iter().map(|(i, _)| i).collect()
    }

    // ── Cache control ──

    pub fn clear_cache(&self) {
        self.labels.clear();
        self.counts.clear();
        self.search.clear();
        debug!("cache cleared");
    }

    pub fn cache_status(&self) -> CacheStatus {
        let mut keys = self.labels.keys();
        keys.extend(self.counts.keys());
        keys.extend(self.search.keys());
        keys.sort();
        CacheStatus {
            size: keys.len(),
            keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::Status;
    use chrono::{NaiveDate, TimeZone};
    use std::time::Duration;

    fn post(id: &str, title: &str, date: (i32, u32, u32), category: &str, tags: &[&str]) -> Post {
        Post {
            id: id.into(),
            title: title.into(),
            content: format!("# {}", title),
            summary: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            category: category.into(),
            publish_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            last_edit_time: String::new(),
            status: Status::Published,
            cover_image: None,
            reading_time: 1,
            url_slug: id.into(),
            seo_keywords: String::new(),
            author: "me".into(),
        }
    }

    fn store_with(posts: Vec<Post>) -> BlogStore {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        BlogStore::new(Snapshot::build(posts, now), &CacheSettings::default())
    }

    fn sample() -> BlogStore {
        let mut draft = post("d", "Secret draft about rust", (2024, 4, 1), "hidden", &["draft-only"]);
        draft.status = Status::Draft;
        store_with(vec![
            post("a", "Learning Rust", (2024, 1, 1), "tech", &["rust"]),
            post("b", "Cooking notes", (2024, 2, 1), "life", &["food"]),
            post("c", "Async in practice", (2024, 3, 1), "tech", &["rust", "async"]),
            draft,
        ])
    }

    fn ids(posts: &[&Post]) -> Vec<String> {
        posts.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn latest_two_newest_first() {
        let store = store_with(vec![
            post("jan", "Jan", (2024, 1, 1), "x", &[]),
            post("feb", "Feb", (2024, 2, 1), "x", &[]),
            post("mar", "Mar", (2024, 3, 1), "x", &[]),
        ]);
        assert_eq!(ids(&store.latest_posts(2)), vec!["mar", "feb"]);
        assert_eq!(store.latest_posts(10).len(), 3);
        assert!(store.latest_posts(0).is_empty());
    }

    #[test]
    fn lookup_by_id_includes_drafts() {
        let store = sample();
        assert_eq!(store.post_by_id("d").map(|p| p.title.as_str()), Some("Secret draft about rust"));
        assert!(store.post_by_id("missing").is_none());
        assert!(store.post_by_id("").is_none());
    }

    #[test]
    fn filters_only_published() {
        let store = sample();
        assert_eq!(ids(&store.posts_by_category("tech")), vec!["a", "c"]);
        assert!(store.posts_by_category("hidden").is_empty());
        assert_eq!(ids(&store.posts_by_tag("rust")), vec!["a", "c"]);
        assert!(store.posts_by_tag("draft-only").is_empty());
        assert!(store.posts_by_tag("").is_empty());
    }

    #[test]
    fn facets_are_distinct_sorted_published() {
        let store = sample();
        assert_eq!(*store.all_categories(), vec!["life", "tech"]);
        assert_eq!(*store.all_tags(), vec!["async", "food", "rust"]);

        let by_cat = store.category_stats();
        assert_eq!(by_cat.get("tech"), Some(&2));
        assert_eq!(by_cat.get("hidden"), None);
        assert_eq!(store.tag_stats().get("rust"), Some(&2));
    }

    #[test]
    fn blank_search_matches_nothing() {
        let store = sample();
        assert!(store.search_posts("").is_empty());
        assert!(store.search_posts("   ").is_empty());
        assert!(store.cache_status().keys.iter().all(|k| !k.starts_with("search_")));
    }

    #[test]
    fn search_requires_every_term() {
        let store = sample();
        assert_eq!(ids(&store.search_posts("RUST")), vec!["a", "c"]);
        assert_eq!(ids(&store.search_posts("rust async")), vec!["c"]);
        assert!(store.search_posts("rust food").is_empty());
        // drafts never show up
        assert!(store.search_posts("secret").is_empty());
    }

    #[test]
    fn title_matches_rank_first() {
        let store = store_with(vec![
            post("old-title", "Rust tips", (2023, 1, 1), "tech", &[]),
            post("new-tag", "Weekly log", (2024, 5, 1), "tech", &["rust"]),
            post("newer-tag", "Monthly log", (2024, 6, 1), "tech", &["rust"]),
        ]);
        assert_eq!(ids(&store.search_posts("rust")), vec!["old-title", "newer-tag", "new-tag"]);
    }

    #[test]
    fn search_results_are_cached_per_query() {
        let store = sample();
        store.search_posts("Rust");
        store.search_posts("tech");
        store.all_tags();

        let status = store.cache_status();
        assert_eq!(status.size, 3);
        assert!(status.keys.contains(&"search_rust".to_string()));
        assert!(status.keys.contains(&"search_tech".to_string()));
        assert!(status.keys.contains(&"all_tags".to_string()));

        store.clear_cache();
        assert_eq!(store.cache_status().size, 0);
    }

    #[test]
    fn facet_entries_expire() {
        let settings = CacheSettings {
            facet_ttl_secs: 1,
            ..CacheSettings::default()
        };
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let store = BlogStore::new(
            Snapshot::build(vec![post("a", "A", (2024, 1, 1), "x", &[])], now),
            &settings,
        );
        store.all_categories();
        std::thread::sleep(Duration::from_millis(1200));
        assert!(!store.cache_status().keys.contains(&"all_categories".to_string()));
    }

    #[test]
    fn search_entries_expire() {
        let settings = CacheSettings {
            search_ttl_secs: 1,
            ..CacheSettings::default()
        };
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let store = BlogStore::new(
            Snapshot::build(vec![post("a", "Rust notes", (2024, 1, 1), "x", &[])], now),
            &settings,
        );
        assert_eq!(ids(&store.search_posts("rust")), vec!["a"]);
        store.all_categories();
        std::thread::sleep(Duration::from_millis(1200));

        let keys = store.cache_status().keys;
        assert!(!keys.contains(&"search_rust".to_string()));
        assert!(keys.contains(&"all_categories".to_string()));
        assert_eq!(ids(&store.search_posts("rust")), vec!["a"]);
    }

    #[test]
    fn blog_stats_from_metadata() {
        let stats = sample().blog_stats();
        assert_eq!(stats.total_posts, 4);
        assert_eq!(stats.published_posts, 3);
        assert_eq!(stats.draft_posts, 1);
    }

    #[test]
    fn pagination() {
        let items: Vec<u32> = (1..=7).collect();
        let first = paginate(&items, 1, 3);
        assert_eq!(first.data, vec![1, 2, 3]);
        assert!(first.has_more);

        let last = paginate(&items, 3, 3);
        assert_eq!(last.data, vec![7]);
        assert!(!last.has_more);

        let beyond = paginate(&items, 9, 3);
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total, 7);

        let v = serde_json::to_value(&first).unwrap();
        assert_eq!(v["pageSize"], 3);
        assert_eq!(v["hasMore"], true);
    }
}
