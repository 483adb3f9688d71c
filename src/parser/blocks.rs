use serde_json::Value;
use tracing::debug;

use crate::notion::model::{plain_text, Block, BlockKind, RichText};

const DEFAULT_CALLOUT_ICON: &str = "💡";
const IMAGE_ALT: &str = "图片";
const VIDEO_LABEL: &str = "视频链接";
const FILE_LABEL: &str = "文件";
const EMBED_LABEL: &str = "嵌入内容";
const TABLE_PLACEHOLDER: &str = "[表格内容]";

/// List flavours that are joined densely (single newline between items).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bulleted,
    Numbered,
    ToDo,
}

fn list_kind(kind: &BlockKind) -> Option<ListKind> {
    match kind {
        BlockKind::BulletedListItem(_) => Some(ListKind::Bulleted),
        BlockKind::NumberedListItem(_) => Some(ListKind::Numbered),
        BlockKind::ToDo { .. } => Some(ListKind::ToDo),
        _ => None,
    }
}

/// Convert one block to its Markdown fragment; empty when nothing renders.
///
/// Numbered items always emit a literal `1.`, Markdown renderers renumber.
pub fn to_markdown(block: &Block) -> String {
    match &block.kind {
        BlockKind::Paragraph(text) | BlockKind::Toggle(text) => plain_text(text),
        BlockKind::Heading { level, text } => {
            prefixed(&format!("{} ", "#".repeat(*level as usize)), text)
        }
        BlockKind::BulletedListItem(text) => prefixed("- ", text),
        BlockKind::NumberedListItem(text) => prefixed("1. ", text),
        BlockKind::Quote(text) => prefixed("> ", text),
        BlockKind::ToDo { checked, text } => {
            prefixed(if *checked { "[x] " } else { "[ ] " }, text)
        }
        BlockKind::Callout { icon, text } => {
            let icon = icon.as_deref().unwrap_or(DEFAULT_CALLOUT_ICON);
            prefixed(&format!("> {} ", icon), text)
        }
        BlockKind::Code { language, text } => {
            let code = plain_text(text);
            if code.is_empty() {
                String::new()
            } else {
                format!("```{}\n{}\n```", language, code)
            }
        }
        BlockKind::Divider => "---".to_string(),
        BlockKind::Image(src) => match src.url() {
            Some(url) => {
                let caption = plain_text(&src.caption);
                let alt: &str = if caption.is_empty() { IMAGE_ALT } else { caption.as_str() };
                format!("![{}]({})", alt, url)
            }
            None => String::new(),
        },
        BlockKind::Video(src) => src
            .url()
            .map(|url| format!("[{}]({})", VIDEO_LABEL, url))
            .unwrap_or_default(),
        BlockKind::File(src) => src
            .url()
            .map(|url| {
                let name = src.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(FILE_LABEL);
                format!("[{}]({})", name, url)
            })
            .unwrap_or_default(),
        BlockKind::Embed { url } => non_empty(url)
            .map(|url| format!("[{}]({})", EMBED_LABEL, url))
            .unwrap_or_default(),
        BlockKind::Bookmark { url, caption } => non_empty(url)
            .map(|url| {
                let caption = plain_text(caption);
                let text: &str = if caption.is_empty() { url } else { caption.as_str() };
                format!("[{}]({})", text, url)
            })
            .unwrap_or_default(),
        BlockKind::Table => TABLE_PLACEHOLDER.to_string(),
        BlockKind::Unknown { kind, payload } => {
            debug!(block_id = %block.id, kind = %kind, "unhandled block type, using its rich_text");
            fallback_text(payload)
        }
    }
}

/// Convert a page's blocks, in order, into one Markdown document.
///
/// Fragments are separated by a blank line, except consecutive list items
/// of the same kind which are separated by a single newline.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    let mut prev: Option<Option<ListKind>> = None;

    for block in blocks {
        let fragment = to_markdown(block);
        if fragment.is_empty() {
            continue;
        }
        let kind = list_kind(&block.kind);

        match prev {
            None => {}
            Some(p) if p.is_some() && p == kind => out.push('\n'),
            Some(_) => out.push_str("\n\n"),
        }
        out.push_str(&fragment);
        prev = Some(kind);
    }

    out
}

fn prefixed(prefix: &str, text: &[RichText]) -> String {
    let text = plain_text(text);
    if text.is_empty() {
        String::new()
    } else {
        format!("{}{}", prefix, text)
    }
}

fn non_empty(url: &Option<String>) -> Option<&str> {
    url.as_deref().filter(|u| !u.is_empty())
}

/// Plain text from an unmodelled payload's `rich_text` array, if it has one.
fn fallback_text(payload: &Value) -> String {
    payload
        .get("rich_text")
        .cloned()
        .and_then(|rt| serde_json::from_value::<Vec<RichText>>(rt).ok())
        .map(|runs| plain_text(&runs))
        .unwrap_or_default()
}
