use super::{Narrator, stem_with_ext};
use crate::config::{Config, VoiceEngine};
use crate::error::{CallResult, FailureReason};
use crate::logi;
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

pub struct ElevenLabsNarrator {
    client: Client,
    cfg: Arc<Config>,
}

impl ElevenLabsNarrator {
    pub fn new(client: Client, cfg: Arc<Config>) -> Self {
        Self { client, cfg }
    }

    /// Preset-specific voice id, or the configured default.
    fn voice_id(&self, voice: &str) -> &str {
        self.cfg
            .voice(voice)
            .and_then(|preset| preset.eleven_voice_id.as_deref())
            .unwrap_or(self.cfg.eleven_voice_id.as_str())
    }
}

#[async_trait]
impl Narrator for ElevenLabsNarrator {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    fn engine(&self) -> Option<VoiceEngine> {
        Some(VoiceEngine::Elevenlabs)
    }

    async fn synthesize(&self, text: &str, voice: &str, out_stem: &Path) -> CallResult<PathBuf> {
        if self.cfg.elevenlabs_key.is_empty() {
            return Err(FailureReason::MissingApiKey("elevenlabs"));
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}?output_format=mp3_44100_128",
            self.voice_id(voice)
        );
        logi(format!("Generating ElevenLabs voice ({})...", self.voice_id(voice)));

        let body = serde_json::json!({
            "text": text,
            "model_id": self.cfg.eleven_model_id,
        });

        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("xi-api-key", &self.cfg.elevenlabs_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(300))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(FailureReason::Http {
                service: "elevenlabs",
                status: resp.status().as_u16(),
            });
        }

        let bytes = resp.bytes().await?;
        let out = stem_with_ext(out_stem, "mp3");
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&out, &bytes).await?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{VoiceEngine, VoicePreset};

    #[test]
    fn preset_voice_id_overrides_default() {
        let mut cfg = Config::default();
        cfg.voices.insert(
            "narrator_uk".to_string(),
            VoicePreset {
                engine: VoiceEngine::Elevenlabs,
                desc: String::new(),
                eleven_voice_id: Some("uk-voice-id".to_string()),
            },
        );
        let narrator = ElevenLabsNarrator::new(Client::new(), Arc::new(cfg));
        assert_eq!(narrator.voice_id("narrator_uk"), "uk-voice-id");
        assert_eq!(narrator.voice_id("onyx"), "JBFqnCBsd6RMkjVDRZzb");
    }
}
