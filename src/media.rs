use crate::api::StockSearch;
use crate::style::StyleProfile;
use crate::{logi, logw};
use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

const STOCK_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
/// Files sampled from the stock folder when no filename matches the query.
const UNMATCHED_SAMPLE: usize = 2;
const KEYWORD_STOPWORDS: &[&str] = &["action", "visual", "voice", "values", "matters", "documentary"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn for_vertical(vertical: bool) -> Self {
        if vertical {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    LocalStock,
    RemoteStock,
    AiGenerated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Local(PathBuf),
    Remote(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub location: SourceLocation,
    pub orientation: Orientation,
    pub origin: Origin,
}

impl MediaSource {
    pub fn local(path: PathBuf, orientation: Orientation, origin: Origin) -> Self {
        Self {
            location: SourceLocation::Local(path),
            orientation,
            origin,
        }
    }

    pub fn is_still_image(&self) -> bool {
        match &self.location {
            SourceLocation::Local(path) => has_extension(path, IMAGE_EXTENSIONS),
            SourceLocation::Remote(url) => {
                let clean = url.split(['?', '#']).next().unwrap_or(url);
                has_extension(Path::new(clean), IMAGE_EXTENSIONS)
            }
        }
    }
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// Up to `limit` visual keywords: lower-cased words of six or more word
/// characters, stopwords removed, in first-occurrence order.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in text.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        if word.chars().count() < 6 {
            continue;
        }
        let lower = word.to_lowercase();
        if KEYWORD_STOPWORDS.contains(&lower.as_str()) || out.contains(&lower) {
            continue;
        }
        out.push(lower);
        if out.len() == limit {
            break;
        }
    }
    out
}

pub(crate) async fn list_files_with_ext(dir: &Path, exts: &[&str]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if fs::metadata(dir).await.map(|m| !m.is_dir()).unwrap_or(true) {
        return Ok(out);
    }

    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_file = fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false);
        if is_file && has_extension(&path, exts) {
            out.push(path);
        }
    }

    out.sort();
    Ok(out)
}

/// Stock files whose name contains any query word; a random sample of the
/// folder when nothing matches.
pub async fn search_local_stock(stock_dir: &Path, query: &str) -> Vec<PathBuf> {
    let files = match list_files_with_ext(stock_dir, STOCK_EXTENSIONS).await {
        Ok(files) => files,
        Err(err) => {
            logw(format!("Local stock scan failed: {:#}", err));
            return Vec::new();
        }
    };

    let words: Vec<String> = query.split_whitespace().map(|w| w.to_lowercase()).collect();
    let matched: Vec<PathBuf> = files
        .iter()
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            words.iter().any(|w| name.contains(w.as_str()))
        })
        .cloned()
        .collect();

    if !matched.is_empty() || files.is_empty() {
        return matched;
    }

    let mut rng = rand::thread_rng();
    files
        .choose_multiple(&mut rng, UNMATCHED_SAMPLE.min(files.len()))
        .cloned()
        .collect()
}

/// Visual source lookup: local stock first, then remote stock search.
/// Never fails; every problem just means fewer sources.
pub struct MediaResolver {
    stock_dir: PathBuf,
    remote: Option<Arc<dyn StockSearch>>,
}

impl MediaResolver {
    pub fn new(stock_dir: PathBuf, remote: Option<Arc<dyn StockSearch>>) -> Self {
        Self { stock_dir, remote }
    }

    pub async fn resolve_sources(
        &self,
        query: &str,
        count: usize,
        style: &StyleProfile,
        orientation: Orientation,
    ) -> Vec<MediaSource> {
        if count == 0 {
            return Vec::new();
        }

        let mut sources: Vec<MediaSource> = search_local_stock(&self.stock_dir, query)
            .await
            .into_iter()
            .map(|p| MediaSource::local(p, orientation, Origin::LocalStock))
            .collect();
        logi(format!("Local stock: {} candidate(s) for '{}'", sources.len(), query));

        if sources.len() >= count {
            sources.truncate(count);
            return sources;
        }

        if let Some(remote) = &self.remote {
            let enhanced = format!("{} {}", query, style.aesthetic);
            let wanted = count - sources.len();
            match remote.search(enhanced.trim(), wanted, orientation).await {
                Ok(urls) => {
                    logi(format!("Remote stock: {} result(s)", urls.len()));
                    sources.extend(urls.into_iter().map(|url| MediaSource {
                        location: SourceLocation::Remote(url),
                        orientation,
                        origin: Origin::RemoteStock,
                    }));
                }
                Err(err) => logw(format!("Remote stock search failed: {}", err)),
            }
        }

        sources.truncate(count);
        sources
    }
}

/// Downloads a remote source into `dest`.
pub async fn download_to(client: &reqwest::Client, url: &str, dest: &Path) -> Result<PathBuf> {
    let resp = client
        .get(url)
        .timeout(Duration::from_secs(300))
        .send()
        .await
        .with_context(|| format!("Download request failed: {}", url))?;
    if !resp.status().is_success() {
        anyhow::bail!("Download HTTP {} for {}", resp.status().as_u16(), url);
    }
    let bytes = resp.bytes().await.context("Download body read failed")?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(dest, &bytes).await?;
    Ok(dest.to_path_buf())
}
