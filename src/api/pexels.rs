use super::StockSearch;
use crate::error::{CallResult, FailureReason};
use crate::media::Orientation;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const SEARCH_URL: &str = "https://api.pexels.com/videos/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    link: String,
}

fn first_links(body: SearchResponse) -> Vec<String> {
    body.videos
        .into_iter()
        .filter_map(|v| v.video_files.into_iter().next().map(|f| f.link))
        .collect()
}

pub struct PexelsSearch {
    client: Client,
    api_key: String,
}

impl PexelsSearch {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl StockSearch for PexelsSearch {
    async fn search(&self, query: &str, per_page: usize, orientation: Orientation) -> CallResult<Vec<String>> {
        if self.api_key.is_empty() {
            return Err(FailureReason::MissingApiKey("pexels"));
        }
        if per_page == 0 {
            return Ok(Vec::new());
        }

        let per_page = per_page.to_string();
        let resp = self
            .client
            .get(SEARCH_URL)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("per_page", per_page.as_str()),
                ("orientation", orientation.as_str()),
            ])
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(FailureReason::Http {
                service: "pexels",
                status: resp.status().as_u16(),
            });
        }

        let body: SearchResponse = resp.json().await?;
        Ok(first_links(body))
    }
}
