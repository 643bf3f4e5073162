use super::{Narrator, stem_with_ext};
use crate::config::VoiceEngine;
use crate::error::{CallResult, FailureReason};
use crate::logi;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Local offline narration through the `piper` CLI.
pub struct PiperNarrator {
    model: PathBuf,
}

impl PiperNarrator {
    pub fn new(model: PathBuf) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Narrator for PiperNarrator {
    fn name(&self) -> &'static str {
        "piper"
    }

    fn engine(&self) -> Option<VoiceEngine> {
        Some(VoiceEngine::Piper)
    }

    async fn synthesize(&self, text: &str, _voice: &str, out_stem: &Path) -> CallResult<PathBuf> {
        let out = stem_with_ext(out_stem, "wav");
        logi(format!("Generating local voice (piper {})...", self.model.display()));

        let mut child = Command::new("piper")
            .arg("--model")
            .arg(&self.model)
            .arg("--output_file")
            .arg(&out)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| FailureReason::Tool(format!("spawn piper: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(FailureReason::Tool(format!("piper exited with {}", status)));
        }
        if tokio::fs::metadata(&out).await.is_err() {
            return Err(FailureReason::Empty);
        }
        Ok(out)
    }
}
