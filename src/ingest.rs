use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{SchemaSettings, Settings};
use crate::error::{Error, Result};
use crate::notion::model::{plain_text, Page};
use crate::notion::ContentSource;
use crate::parser::blocks::render_blocks;
use crate::parser::page::NormalizeContext;
use crate::parser::properties::{extract, PropertyValue};
use crate::parser::{process_page, FetchedPage};
use crate::post::Post;
use crate::snapshot::{Metadata, Snapshot};
use crate::throttle::Throttle;

/// Fetch counters returned after the block-fetch phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub fetch: IngestStats,
    pub metadata: Metadata,
}

/// Fetch child blocks for each page, one at a time, waiting on `throttle`
/// before every request. Pages whose blocks cannot be fetched are dropped.
pub async fn fetch_pages(
    source: &dyn ContentSource,
    throttle: &mut dyn Throttle,
    pages: Vec<Page>,
) -> (Vec<FetchedPage>, IngestStats) {
    let total = pages.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut fetched = Vec::with_capacity(total);
    let mut errors = 0usize;

    for page in pages {
        throttle.ready().await;
        match source.list_children(&page.id).await {
            Ok(blocks) => fetched.push(FetchedPage { page, blocks }),
            Err(e) => {
                errors += 1;
                warn!(page_id = %page.id, error = %e, "skipping page, block fetch failed");
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    let stats = IngestStats {
        total,
        ok: fetched.len(),
        errors,
    };
    info!("Fetched {} pages ({} ok, {} errors)", stats.total, stats.ok, stats.errors);
    (fetched, stats)
}

/// Normalize fetched pages in parallel. Output order matches input order.
pub fn normalize_pages(fetched: &[FetchedPage], ctx: &NormalizeContext) -> Vec<Post> {
    fetched.par_iter().map(|f| process_page(f, ctx)).collect()
}

/// Full refresh: query → fetch blocks → normalize → snapshot → persist.
///
/// A failed query, a failed write, or a run where every listed page failed
/// to fetch is returned as an error and leaves the previous snapshot on disk
/// untouched.
pub async fn run(
    source: &dyn ContentSource,
    throttle: &mut dyn Throttle,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<IngestReport> {
    let schema = &settings.schema;
    let pages = source.query_pages(&schema.publish_date).await?;
    info!(pages = pages.len(), "database queried");

    let (fetched, fetch) = fetch_pages(source, throttle, pages).await;
    if fetch.total > 0 && fetch.ok == 0 {
        return Err(Error::NoPagesFetched { failed: fetch.errors });
    }

    let ctx = NormalizeContext {
        schema,
        today: now.date_naive(),
    };
    let posts = normalize_pages(&fetched, &ctx);

    let snapshot = Snapshot::build(posts, now);
    snapshot.save(&settings.ingest.data_dir)?;

    info!(
        total = snapshot.metadata.total_posts,
        published = snapshot.metadata.published_posts,
        drafts = snapshot.metadata.draft_posts,
        skipped = fetch.errors,
        "ingestion complete"
    );

    Ok(IngestReport {
        fetch,
        metadata: snapshot.metadata,
    })
}

// ── Single-page inspection ──

/// Everything known about one page: raw metadata, each property's
/// extracted value, the converted Markdown and the resulting Post.
#[derive(Debug, Clone)]
pub struct PageInspection {
    pub page: Page,
    pub properties: BTreeMap<String, PropertyValue>,
    pub markdown: String,
    pub block_count: usize,
    pub post: Post,
}

pub async fn inspect_page(
    source: &dyn ContentSource,
    page_id: &str,
    schema: &SchemaSettings,
    today: NaiveDate,
) -> Result<PageInspection> {
    let page = source.retrieve_page(page_id).await?;
    let blocks = source.list_children(page_id).await?;

    let properties = page
        .properties
        .iter()
        .map(|(name, prop)| (name.clone(), extract(prop)))
        .collect();
    let markdown = render_blocks(&blocks);
    let ctx = NormalizeContext { schema, today };
    let fetched = FetchedPage { page, blocks };
    let post = process_page(&fetched, &ctx);

    Ok(PageInspection {
        properties,
        markdown,
        block_count: fetched.blocks.len(),
        page: fetched.page,
        post,
    })
}

// ── Schema check ──

#[derive(Debug, Clone)]
pub struct SchemaCheck {
    pub title: String,
    /// Property name → Notion type, as the database declares them.
    pub properties: BTreeMap<String, String>,
    /// Configured roles whose property name the database lacks.
    pub missing: Vec<(&'static str, String)>,
}

impl SchemaCheck {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Retrieve the database and compare its properties with the configured names.
pub async fn check_schema(source: &dyn ContentSource, schema: &SchemaSettings) -> Result<SchemaCheck> {
    let db = source.retrieve_database().await?;
    let properties: BTreeMap<String, String> = db
        .properties
        .into_iter()
        .map(|(name, p)| (name, p.kind))
        .collect();

    let missing = schema
        .fields()
        .into_iter()
        .filter(|(_, name)| !properties.contains_key(*name))
        .map(|(role, name)| (role, name.to_string()))
        .collect();

    Ok(SchemaCheck {
        title: plain_text(&db.title),
        properties,
        missing,
    })
}
