pub mod blocks;
pub mod page;
pub mod properties;

use crate::notion::model::{Block, Page};
use crate::post::Post;
use page::NormalizeContext;

/// A page together with its child blocks, as fetched from Notion.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub page: Page,
    pub blocks: Vec<Block>,
}

/// Two passes: blocks → Markdown, properties → fields, merged into one Post.
pub fn process_page(fetched: &FetchedPage, ctx: &NormalizeContext) -> Post {
    page::normalize(&fetched.page, &fetched.blocks, ctx)
}
