use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use super::model::{ApiErrorBody, Block, DatabaseInfo, ListResponse, Page};
use super::ContentSource;
use crate::config::NotionSettings;
use crate::error::{Error, Result};

static PAGE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([a-f0-9]{32}|[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12})$")
        .unwrap()
});

/// Notion REST client bound to one database.
pub struct NotionClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    database_id: String,
    version: String,
    page_size: u32,
}

impl NotionClient {
    pub fn new(settings: &NotionSettings) -> Result<Self> {
        let (token, database_id) = settings.credentials()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            database_id: database_id.to_string(),
            version: settings.version.clone(),
            page_size: settings.page_size.clamp(1, 100),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.api_base, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", self.version.as_str())
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body: ApiErrorBody = resp.json().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                code: body.code,
                message: body.message,
            });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ContentSource for NotionClient {
    async fn query_pages(&self, sort_property: &str) -> Result<Vec<Page>> {
        let path = format!("databases/{}/query", self.database_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "page_size": self.page_size,
                "sorts": [{ "property": sort_property, "direction": "descending" }],
            });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }

            let batch: ListResponse<Page> =
                self.send(self.request(Method::POST, &path).json(&body)).await?;
            debug!(count = batch.results.len(), has_more = batch.has_more, "database query batch");
            pages.extend(batch.results);

            match (batch.has_more, batch.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        info!(pages = pages.len(), "database query complete");
        Ok(pages)
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Page> {
        self.send(self.request(Method::GET, &format!("pages/{}", page_id)))
            .await
    }

    async fn list_children(&self, block_id: &str) -> Result<Vec<Block>> {
        let path = format!("blocks/{}/children", block_id);
        let page_size = self.page_size.to_string();
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = vec![("page_size", page_size.as_str())];
            if let Some(c) = &cursor {
                query.push(("start_cursor", c.as_str()));
            }

            let batch: ListResponse<Block> =
                self.send(self.request(Method::GET, &path).query(&query)).await?;
            blocks.extend(batch.results);

            match (batch.has_more, batch.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!(block_id, blocks = blocks.len(), "children listed");
        Ok(blocks)
    }

    async fn retrieve_database(&self) -> Result<DatabaseInfo> {
        self.send(self.request(Method::GET, &format!("databases/{}", self.database_id)))
            .await
    }
}

/// Resolve a page id from a bare id or a Notion URL such as
/// `https://www.notion.so/post-4-249c5a0ebbe68017867afe54d8fe8f2e`.
/// Undashed 32-hex ids are returned in dashed UUID form.
pub fn parse_page_id(input: &str) -> Result<String> {
    let trimmed = input
        .trim()
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');

    let id = PAGE_ID_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .ok_or_else(|| Error::InvalidPageRef(input.to_string()))?;

    if id.len() == 32 {
        Ok(format!(
            "{}-{}-{}-{}-{}",
            &id[..8],
            &id[8..12],
            &id[12..16],
            &id[16..20],
            &id[20..]
        ))
    } else {
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_id_from_url() {
        let id = parse_page_id("https://www.notion.so/post-4-249c5a0ebbe68017867afe54d8fe8f2e").unwrap();
        assert_eq!(id, "249c5a0e-bbe6-8017-867a-fe54d8fe8f2e");
    }

    #[test]
    fn page_id_ignores_query_string() {
        let id = parse_page_id("https://www.notion.so/249c5a0ebbe68017867afe54d8fe8f2e?pvs=4").unwrap();
        assert_eq!(id, "249c5a0e-bbe6-8017-867a-fe54d8fe8f2e");
    }

    #[test]
    fn dashed_id_passes_through() {
        let id = parse_page_id("249C5A0E-BBE6-8017-867A-FE54D8FE8F2E").unwrap();
        assert_eq!(id, "249c5a0e-bbe6-8017-867a-fe54d8fe8f2e");
    }

    #[test]
    fn rejects_non_ids() {
        assert!(matches!(
            parse_page_id("https://www.notion.so/my-post"),
            Err(Error::InvalidPageRef(_))
        ));
    }

    #[test]
    fn client_requires_credentials() {
        let settings = NotionSettings::default();
        assert!(matches!(NotionClient::new(&settings), Err(Error::Config(_))));
    }
}
