// src/ingest/providers/wikipedia.rs
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::http::{clean_extract, fetch_json, within_source_bounds};
use crate::ingest::types::{RawRecord, SourceProvider};

pub const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const ARTICLE_BASE: &str = "https://en.wikipedia.org/wiki/";

pub const SEED_CATEGORIES: [&str; 13] = [
    "Science",
    "Technology",
    "History",
    "Geography",
    "Arts",
    "Culture",
    "Sports",
    "Entertainment",
    "Politics",
    "Business",
    "Education",
    "Health",
    "Environment",
];

#[derive(Debug, Deserialize)]
struct MembersResponse {
    #[serde(default)]
    query: Option<MembersQuery>,
}
#[derive(Debug, Deserialize)]
struct MembersQuery {
    #[serde(default)]
    categorymembers: Vec<Member>,
}
#[derive(Debug, Deserialize)]
struct Member {
    title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PagesResponse {
    #[serde(default)]
    query: Option<PagesQuery>,
}
#[derive(Debug, Deserialize)]
struct PagesQuery {
    #[serde(default)]
    pages: BTreeMap<String, Page>,
}
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    categories: Vec<PageCategory>,
}
#[derive(Debug, Deserialize)]
struct PageCategory {
    title: String,
}

/// Random-ish encyclopedia extracts: a few member pages per seed category.
pub struct WikipediaSource {
    client: reqwest::Client,
    api_url: String,
    categories: Vec<String>,
    pages_per_category: usize,
}

impl WikipediaSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            categories: SEED_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            pages_per_category: 3,
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_categories<I, S>(mut self, cats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = cats.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pages_per_category(mut self, n: usize) -> Self {
        self.pages_per_category = n;
        self
    }

    async fn member_titles(&self, category: &str) -> Result<Vec<String>> {
        let cmtitle = format!("Category:{category}");
        let resp: MembersResponse = fetch_json(
            &self.client,
            &self.api_url,
            &[
                ("action", "query"),
                ("format", "json"),
                ("list", "categorymembers"),
                ("cmtitle", cmtitle.as_str()),
                ("cmtype", "page"),
                ("cmlimit", "50"),
            ],
        )
        .await?;
        Ok(resp
            .query
            .map(|q| q.categorymembers.into_iter().map(|m| m.title).collect())
            .unwrap_or_default())
    }

    async fn page(&self, title: &str) -> Result<PagesResponse> {
        fetch_json(
            &self.client,
            &self.api_url,
            &[
                ("action", "query"),
                ("format", "json"),
                ("prop", "extracts|categories"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("cllimit", "20"),
                ("titles", title),
            ],
        )
        .await
    }
}

/// Turn a page-extract response into records for `seed_category`.
pub(crate) fn records_from_pages(seed_category: &str, resp: PagesResponse) -> Vec<RawRecord> {
    let pages = resp.query.map(|q| q.pages).unwrap_or_default();
    let mut out = Vec::with_capacity(pages.len());
    for page in pages.into_values() {
        let content = clean_extract(&page.extract);
        if !within_source_bounds(&content) {
            continue;
        }

        let tags = page
            .categories
            .iter()
            .map(|c| c.title.trim_start_matches("Category:").trim().to_string())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>();

        out.push(
            RawRecord::new("Wikipedia", content)
                .category(seed_category)
                .tags(tags)
                .url(format!("{ARTICLE_BASE}{}", page.title.replace(' ', "_")))
                .meta("title", page.title)
                .meta("language", "en"),
        );
    }
    out
}

#[async_trait]
impl SourceProvider for WikipediaSource {
    async fn fetch_facts(&self) -> Result<Vec<RawRecord>> {
        let mut out = Vec::new();
        let mut listed_any = false;

        for cat in &self.categories {
            let titles = match self.member_titles(cat).await {
                Ok(t) => {
                    listed_any = true;
                    t
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, category = %cat, "wikipedia category listing failed");
                    continue;
                }
            };

            for title in titles.iter().take(self.pages_per_category) {
                match self.page(title).await {
                    Ok(resp) => out.extend(records_from_pages(cat, resp)),
                    Err(e) => {
                        tracing::debug!(target: "ingest", error = ?e, %title, "wikipedia page fetch failed");
                    }
                }
            }
        }

        if !listed_any && !self.categories.is_empty() {
            bail!("wikipedia: every category listing failed");
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "Wikipedia"
    }
}
