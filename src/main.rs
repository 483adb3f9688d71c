use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use notion_blog::ingest;
use notion_blog::notion::{parse_page_id, NotionClient};
use notion_blog::store::{paginate, BlogStore};
use notion_blog::throttle::FixedInterval;
use notion_blog::{Post, Settings};

#[derive(Parser)]
#[command(name = "notion_blog", about = "Notion blog ingestion and snapshot queries")]
struct Cli {
    /// Config file (extension optional; json, toml and yaml are understood)
    #[arg(long, global = true, default_value = "blog")]
    config: String,

    /// Env file loaded before reading settings
    #[arg(long, global = true, env = "DOTENV_PATH", default_value = ".env.local")]
    dotenv: String,

    /// Snapshot directory (overrides ingest.data_dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull every page from the Notion database and rewrite the snapshot
    Fetch,
    /// Show one page's properties and converted Markdown
    Page {
        /// Notion page URL or id
        reference: String,
    },
    /// Compare the database's properties with the configured schema
    Check,
    /// Snapshot totals plus category and tag counts
    Stats,
    /// Most recent published posts
    Latest {
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
    },
    /// Published posts, optionally filtered, one page at a time
    List {
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        tag: Option<String>,
        #[arg(short, long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "10")]
        page_size: usize,
    },
    /// Search published posts (every term must match)
    Search {
        #[arg(required = true)]
        terms: Vec<String>,
    },
    /// Print one post by id
    Show { id: String },
    /// Categories of published posts
    Categories,
    /// Tags of published posts
    Tags,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let dotenv_loaded = Path::new(&cli.dotenv).exists();
    if dotenv_loaded {
        dotenvy::from_path(&cli.dotenv)
            .with_context(|| format!("failed to load {}", cli.dotenv))?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if dotenv_loaded {
        info!(path = %cli.dotenv, "environment loaded");
    }

    let t0 = Instant::now();
    let mut settings = Settings::load(Some(cli.config.as_str()))?;
    if let Some(dir) = cli.data_dir {
        settings.ingest.data_dir = dir;
    }

    match cli.command {
        Commands::Fetch => {
            let client = NotionClient::new(&settings.notion)?;
            let mut throttle = FixedInterval::new(settings.ingest.request_delay());

            println!("Fetching posts from Notion...");
            let report = ingest::run(&client, &mut throttle, &settings, Utc::now()).await?;
            let m = &report.metadata;
            println!(
                "Fetched {} pages ({} ok, {} errors).",
                report.fetch.total, report.fetch.ok, report.fetch.errors
            );
            println!(
                "Saved {} posts ({} published, {} drafts) to {}",
                m.total_posts,
                m.published_posts,
                m.draft_posts,
                settings.ingest.data_dir.display()
            );
            println!("Updated:   {}", m.last_updated.to_rfc3339());
        }
        Commands::Page { reference } => {
            let page_id = parse_page_id(&reference)?;
            let client = NotionClient::new(&settings.notion)?;
            let today = Utc::now().date_naive();
            let info = ingest::inspect_page(&client, &page_id, &settings.schema, today).await?;

            println!("ID:          {}", info.page.id);
            println!("Created:     {}", info.page.created_time.as_deref().unwrap_or("-"));
            println!("Last edited: {}", info.page.last_edited_time);
            println!("URL:         {}", info.page.url.as_deref().unwrap_or("-"));

            println!("\n--- Properties ---");
            for (name, value) in &info.properties {
                println!("  {}: {}", name, serde_json::to_string(value)?);
            }

            println!("\n--- Content ({} blocks) ---", info.block_count);
            if info.markdown.is_empty() {
                println!("(empty)");
            } else {
                println!("{}", info.markdown);
            }

            let post = &info.post;
            println!("\n--- Post ---");
            println!("Title:   {}", post.title);
            println!("Status:  {:?}", post.status);
            println!("Date:    {}", post.publish_date);
            println!("Slug:    {}", post.url_slug);
            println!("Reading: {} min", post.reading_time);
        }
        Commands::Check => {
            let client = NotionClient::new(&settings.notion)?;
            let check = ingest::check_schema(&client, &settings.schema).await?;

            println!("Database: {}", check.title);
            println!("{:<24} | {:<16}", "Property", "Type");
            println!("{}", "-".repeat(43));
            for (name, kind) in &check.properties {
                println!("{:<24} | {:<16}", truncate(name, 24), kind);
            }

            if check.is_complete() {
                println!("\nAll configured properties are present.");
            } else {
                println!("\n--- Missing ---");
                for (role, name) in &check.missing {
                    println!("  {} (schema.{})", name, role);
                }
            }
        }
        Commands::Stats => {
            let store = open_store(&settings)?;
            let s = store.blog_stats();
            println!("Total:     {}", s.total_posts);
            println!("Published: {}", s.published_posts);
            println!("Drafts:    {}", s.draft_posts);
            println!("Updated:   {}", s.last_updated.to_rfc3339());

            println!("\n--- Categories ---");
            for (name, count) in store.category_stats().iter() {
                println!("  {:<24} {:>4}", truncate(name, 24), count);
            }
            println!("\n--- Tags ---");
            for (name, count) in store.tag_stats().iter() {
                println!("  {:<24} {:>4}", truncate(name, 24), count);
            }
        }
        Commands::Latest { limit } => {
            let store = open_store(&settings)?;
            print_posts(&store.latest_posts(limit));
        }
        Commands::List {
            category,
            tag,
            page,
            page_size,
        } => {
            let store = open_store(&settings)?;
            let mut posts: Vec<&Post> = match &category {
                Some(c) => store.posts_by_category(c),
                None => store.published_posts().iter().collect(),
            };
            if let Some(t) = &tag {
                posts.retain(|p| p.tags.iter().any(|x| x == t));
            }

            let listing = paginate(&posts, page, page_size);
            print_posts(&listing.data);
            println!(
                "\nPage {} | {} posts{}",
                listing.page,
                listing.total,
                if listing.has_more { " | more with --page <next>" } else { "" }
            );
        }
        Commands::Search { terms } => {
            let store = open_store(&settings)?;
            let query = terms.join(" ");
            let hits = store.search_posts(&query);
            if hits.is_empty() {
                println!("No posts match \"{}\".", query);
            } else {
                print_posts(&hits);
            }
        }
        Commands::Show { id } => {
            let store = open_store(&settings)?;
            match store.post_by_id(&id) {
                Some(post) => {
                    println!("{}", post.title);
                    println!(
                        "{} | {} | {:?} | {} min",
                        post.publish_date, post.category, post.status, post.reading_time
                    );
                    if !post.tags.is_empty() {
                        println!("Tags: {}", post.tags.join(", "));
                    }
                    println!("Slug: {}", post.url_slug);
                    println!("\n{}", post.content);
                }
                None => println!("Post not found: {}", id),
            }
        }
        Commands::Categories => {
            let store = open_store(&settings)?;
            let counts = store.category_stats();
            for name in store.all_categories().iter() {
                println!("{:<24} {:>4}", truncate(name, 24), counts.get(name).copied().unwrap_or(0));
            }
        }
        Commands::Tags => {
            let store = open_store(&settings)?;
            let counts = store.tag_stats();
            for name in store.all_tags().iter() {
                println!("{:<24} {:>4}", truncate(name, 24), counts.get(name).copied().unwrap_or(0));
            }
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    Ok(())
}

fn open_store(settings: &Settings) -> anyhow::Result<BlogStore> {
    let dir = &settings.ingest.data_dir;
    BlogStore::open(dir, &settings.cache)
        .with_context(|| format!("no usable snapshot in {}; run `fetch` first", dir.display()))
}

fn print_posts(posts: &[&Post]) {
    if posts.is_empty() {
        println!("No posts.");
        return;
    }

    println!(
        "{:>3} | {:<10} | {:<32} | {:<12} | {:<24}",
        "#", "Date", "Title", "Category", "Slug"
    );
    println!("{}", "-".repeat(92));
    for (i, p) in posts.iter().enumerate() {
        println!(
            "{:>3} | {:<10} | {:<32} | {:<12} | {:<24}",
            i + 1,
            p.publish_date,
            truncate(&p.title, 32),
            truncate(&p.category, 12),
            truncate(&p.url_slug, 24)
        );
    }
}

/// Cut `s` to `width` characters for a table column, marking the cut with `…`.
fn truncate(s: &str, width: usize) -> String {
    match s.char_indices().nth(width) {
        Some((end, _)) => format!("{}…", &s[..end]),
        None => s.to_string(),
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let total = d.as_secs();
    let (h, m, sec) = (total / 3600, total / 60 % 60, total % 60);
    match (h, m) {
        (0, 0) => format!("{:.1}s", d.as_secs_f64()),
        (0, _) => format!("{m}m {sec:02}s"),
        _ => format!("{h}h {m:02}m {sec:02}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("技术分享", 2), "技术…");
        assert_eq!(truncate("rust", 4), "rust");
        assert_eq!(truncate("", 3), "");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 05s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 02m 05s");
    }
}
