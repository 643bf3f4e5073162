use super::{ImageSynth, Narrator, ScriptWriter, stem_with_ext};
use crate::config::{Config, VoiceEngine};
use crate::error::{CallResult, FailureReason};
use crate::{logi, logw};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";
const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";
const MAX_PROMPT_CHARS: usize = 80_000;

pub const KNOWN_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];
pub const DEFAULT_VOICE: &str = "onyx";

fn trim_copy_utf8_safe(input: &str, max_bytes: usize) -> String {
    if input.len() <= max_bytes {
        return input.to_string();
    }

    let mut cut = max_bytes.min(input.len());
    while cut > 0 && !input.is_char_boundary(cut) {
        cut -= 1;
    }
    input[..cut].to_string()
}

/// Pulls the first `output_text` block out of a Responses API body, logging
/// any `error` object instead.
fn extract_output_text(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;

    if let Some(err) = root.get("error").filter(|e| !e.is_null()) {
        if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error message: {}", msg));
        }
        if let Some(code) = err.get("code").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error code: {}", code));
        }
        return None;
    }

    let output = root.get("output")?.as_array()?;
    for item in output {
        let Some(content) = item.get("content").and_then(|v| v.as_array()) else {
            continue;
        };
        for entry in content {
            let typ = entry.get("type").and_then(|v| v.as_str());
            let text = entry.get("text").and_then(|v| v.as_str());
            if let (Some("output_text"), Some(text)) = (typ, text) {
                return Some(text.to_string());
            }
        }
    }

    None
}

/// Voice name accepted by the speech endpoint.
pub fn speech_voice(voice: &str) -> &str {
    if KNOWN_VOICES.contains(&voice) {
        voice
    } else {
        DEFAULT_VOICE
    }
}

fn require_key(cfg: &Config) -> CallResult<&str> {
    if cfg.openai_key.is_empty() {
        Err(FailureReason::MissingApiKey("openai"))
    } else {
        Ok(&cfg.openai_key)
    }
}

async fn complete(client: &Client, cfg: &Config, prompt: &str) -> CallResult<String> {
    let key = require_key(cfg)?;
    let body = json!({
        "model": cfg.text_model,
        "input": [
            {"role": "user", "content": trim_copy_utf8_safe(prompt, MAX_PROMPT_CHARS)},
        ],
    });

    let resp = client
        .post(RESPONSES_URL)
        .bearer_auth(key)
        .json(&body)
        .timeout(Duration::from_secs(600))
        .send()
        .await?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        if !raw.is_empty() {
            let snippet = raw.chars().take(800).collect::<String>();
            logw(format!("OpenAI raw body: {}", snippet));
        }
        return Err(FailureReason::Http {
            service: "openai",
            status: status.as_u16(),
        });
    }

    extract_output_text(&raw)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| FailureReason::Parse("no output_text in OpenAI response".to_string()))
}

fn script_prompt(topic: &str, style_prompt: &str, structure: &str) -> String {
    if structure == "value_driven" {
        format!(
            "Write a high-retention, educational video script for the topic: {topic}.\n\n\
             Follow this EXACT scaffold:\n\
             1. THE HOOK (0-15s): Stop the scroll. Promise exactly what the viewer will gain.\n\
             2. THE TRANSITION: Briefly explain why this information is critical right now.\n\
             3. THE MEAT: Deliver the value as three distinct, actionable points.\n\
             4. THE CTA: Recommend a specific related video to watch next and why.\n\n\
             Style: {style_prompt}\nTone: Authoritative, clear, consistent.\n\
             Format: Include [Visual] descriptions for b-roll.\nReturn ONLY the script content."
        )
    } else {
        format!(
            "Write a high-retention, cinematic documentary script for the topic: {topic}.\n\n\
             Rules:\n\
             1. CURIOSITY HOOK: Open with a high-stakes question that establishes legitimacy immediately.\n\
             2. NON-OBVIOUS TAKE: Provide a fresh, counter-intuitive perspective.\n\
             3. OPEN LOOPS: Raise information gaps early and keep new ones opening.\n\
             4. PACING: Use short, punchy sentences.\n\
             5. Use clear, emotional language suitable for narration.\n\n\
             Style: {style_prompt}\nReturn ONLY the script content."
        )
    }
}

pub struct OpenAiScriptWriter {
    client: Client,
    cfg: Arc<Config>,
}

impl OpenAiScriptWriter {
    pub fn new(client: Client, cfg: Arc<Config>) -> Self {
        Self { client, cfg }
    }

    fn has_key(&self) -> bool {
        !self.cfg.openai_key.is_empty()
    }
}

#[async_trait]
impl ScriptWriter for OpenAiScriptWriter {
    async fn generate(&self, topic: &str, style_prompt: &str, structure: &str) -> String {
        if !self.has_key() {
            return format!(
                "The mystery of {} remains unsolved. A journey into the depths of values that matters.",
                topic
            );
        }
        let prompt = script_prompt(topic, style_prompt, structure);
        match complete(&self.client, &self.cfg, &prompt).await {
            Ok(script) => script,
            Err(err) => {
                logw(format!("Script generation failed: {}", err));
                format!("Error generating script for {}", topic)
            }
        }
    }

    async fn enhance(&self, script: &str) -> String {
        if !self.has_key() {
            return format!("{}\n\n[SFX: Dramatic Bass Drop]", script);
        }
        let prompt = format!(
            "Analyze the following documentary script and insert dramatic sound effect [SFX] cues and \
             visual [Action] markers to make it more cinematic. Keep every spoken line. \
             Return ONLY the script.\n\nScript: {}",
            script
        );
        match complete(&self.client, &self.cfg, &prompt).await {
            Ok(enhanced) => enhanced,
            Err(err) => {
                logw(format!("Enhancement failed: {}", err));
                script.to_string()
            }
        }
    }

    async fn analyze_tone(&self, script: &str) -> String {
        if !self.has_key() {
            return DEFAULT_VOICE.to_string();
        }
        let prompt = format!(
            "Analyze the tone of this documentary script and pick the best voice from this list: \
             [{}]. Return ONLY the name of the voice.\n\nScript: {}",
            KNOWN_VOICES.join(", "),
            script
        );
        match complete(&self.client, &self.cfg, &prompt).await {
            Ok(answer) => speech_voice(answer.trim().to_lowercase().as_str()).to_string(),
            Err(err) => {
                logw(format!("Tone analysis failed: {}", err));
                DEFAULT_VOICE.to_string()
            }
        }
    }

    async fn slogan(&self, title: &str) -> String {
        if !self.has_key() {
            return format!("{}: Truth Unveiled.", self.cfg.brand_name);
        }
        let prompt = format!(
            "Generate a short, powerful, high-stakes cinematic slogan for a documentary series centered on: {}. \
             It should be pithy and evoke mystery, power, or deep human values. Return ONLY the slogan.",
            title
        );
        match complete(&self.client, &self.cfg, &prompt).await {
            Ok(slogan) => slogan.replace('"', ""),
            Err(err) => {
                logw(format!("Slogan generation failed: {}", err));
                format!("{}: The Core of Everything.", self.cfg.brand_name)
            }
        }
    }
}

pub struct OpenAiNarrator {
    client: Client,
    cfg: Arc<Config>,
}

impl OpenAiNarrator {
    pub fn new(client: Client, cfg: Arc<Config>) -> Self {
        Self { client, cfg }
    }
}

#[async_trait]
impl Narrator for OpenAiNarrator {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn engine(&self) -> Option<VoiceEngine> {
        Some(VoiceEngine::Openai)
    }

    async fn synthesize(&self, text: &str, voice: &str, out_stem: &Path) -> CallResult<PathBuf> {
        let key = require_key(&self.cfg)?;
        logi(format!("Generating OpenAI voice ({})...", speech_voice(voice)));

        let body = json!({
            "model": self.cfg.tts_model,
            "voice": speech_voice(voice),
            "input": text,
        });
        let resp = self
            .client
            .post(SPEECH_URL)
            .bearer_auth(key)
            .json(&body)
            .timeout(Duration::from_secs(300))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(FailureReason::Http {
                service: "openai-tts",
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

pub struct OpenAiImageSynth {
    client: Client,
    cfg: Arc<Config>,
}

impl OpenAiImageSynth {
    pub fn new(client: Client, cfg: Arc<Config>) -> Self {
        Self { client, cfg }
    }
}

pub fn cinematic_image_prompt(prompt: &str) -> String {
    format!(
        "Cinematic documentary shot, {}, hyper-realistic, 8k, moody lighting, wide angle.",
        prompt
    )
}

#[async_trait]
impl ImageSynth for OpenAiImageSynth {
    async fn generate(&self, prompt: &str, out_path: &Path) -> CallResult<PathBuf> {
        let key = require_key(&self.cfg)?;
        logi(format!("Generating AI synthesis: {}", prompt));

        let body = json!({
            "model": self.cfg.image_model,
            "prompt": cinematic_image_prompt(prompt),
            "n": 1,
            "size": "1024x1024",
        });
        let resp = self
            .client
            .post(IMAGES_URL)
            .bearer_auth(key)
            .json(&body)
            .timeout(Duration::from_secs(300))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(FailureReason::Http {
                service: "openai-images",
                status: resp.status().as_u16(),
            });
        }

        let root: serde_json::Value = resp.json().await?;
        let url = root
            .pointer("/data/0/url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FailureReason::Parse("image response without data[0].url".to_string()))?;

        let image = self.client.get(url).send().await?;
        if !image.status().is_success() {
            return Err(FailureReason::Http {
                service: "openai-images",
                status: image.status().as_u16(),
            });
        }
        let bytes = image.bytes().await?;
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(out_path, &bytes).await?;
        Ok(out_path.to_path_buf())
    }
}
