use crate::directive::{Script, strip_directives};
use crate::error::CallResult;
use crate::logok;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const LOG_FILE: &str = "publishing_log.json";
const DESCRIPTION_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub platform: String,
    pub status: String,
    pub published_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub title: String,
    pub file: String,
    #[serde(default)]
    pub description: String,
    /// Production cues carried by the script, e.g. `SFX: Bass Drop`.
    #[serde(default)]
    pub cues: Vec<String>,
    pub distribution: Vec<Distribution>,
}

/// Post-render distribution step.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, title: &str, video: &Path, script: &str) -> CallResult<PublishReceipt>;
}

/// Records a distribution entry per platform in the output folder's
/// publishing log. Nothing is uploaded.
pub struct PublishLog {
    output_dir: PathBuf,
    platforms: Vec<String>,
}

impl PublishLog {
    pub fn new(output_dir: PathBuf, platforms: Vec<String>) -> Self {
        Self { output_dir, platforms }
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(LOG_FILE)
    }

    async fn append(&self, receipt: &PublishReceipt) -> CallResult<()> {
        let path = self.log_path();
        let mut entries: Vec<serde_json::Value> = match fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        entries.push(serde_json::to_value(receipt)?);

        fs::create_dir_all(&self.output_dir).await?;
        fs::write(&path, serde_json::to_string_pretty(&entries)?).await?;
        Ok(())
    }
}

fn description_of(script: &str) -> String {
    strip_directives(script).chars().take(DESCRIPTION_CHARS).collect()
}

pub fn cues_of(script: &str) -> Vec<String> {
    Script::parse(script)
        .directives()
        .map(|(label, body)| match label {
            Some(label) => format!("{}: {}", label, body),
            None => body.to_string(),
        })
        .collect()
}

#[async_trait]
impl Publisher for PublishLog {
    async fn publish(&self, title: &str, video: &Path, script: &str) -> CallResult<PublishReceipt> {
        let now = chrono::Utc::now().to_rfc3339();
        let receipt = PublishReceipt {
            title: title.to_string(),
            file: video.display().to_string(),
            description: description_of(script),
            cues: cues_of(script),
            distribution: self
                .platforms
                .iter()
                .map(|platform| Distribution {
                    platform: platform.clone(),
                    status: "Published".to_string(),
                    published_at: now.clone(),
                })
                .collect(),
        };

        self.append(&receipt).await?;
        logok(format!("Logged '{}' for {} platform(s)", title, receipt.distribution.len()));
        Ok(receipt)
    }
}
