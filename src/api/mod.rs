//! Thin clients over hosted generative APIs and local tools, each behind a
//! capability trait so the orchestrator can be driven by fakes in tests.

use crate::config::VoiceEngine;
use crate::error::{CallResult, FailureReason};
use crate::media::Orientation;
use crate::logw;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod elevenlabs;
pub mod openai;
pub mod pexels;
pub mod piper;

/// Text-to-speech provider.
#[async_trait]
pub trait Narrator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Engine the provider speaks for; `None` for composite providers.
    fn engine(&self) -> Option<VoiceEngine> {
        None
    }

    /// Writes narration for `text` to `out_stem` plus the provider's
    /// extension (see [`stem_with_ext`]) and returns the written path.
    async fn synthesize(&self, text: &str, voice: &str, out_stem: &Path) -> CallResult<PathBuf>;
}

/// `<stem>.<ext>`, keeping any dots already in the stem.
pub fn stem_with_ext(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Ordered provider list; the first success wins.
///
/// A voice's preset engine is tried first. OpenAI is only tried for voices
/// whose engine is OpenAI; voices without a preset count as OpenAI.
pub struct NarrationCascade {
    providers: Vec<Box<dyn Narrator>>,
    engines: BTreeMap<String, VoiceEngine>,
}

impl NarrationCascade {
    pub fn new(providers: Vec<Box<dyn Narrator>>) -> Self {
        Self {
            providers,
            engines: BTreeMap::new(),
        }
    }

    /// Voice name to preferred engine.
    pub fn with_voice_engines(mut self, engines: BTreeMap<String, VoiceEngine>) -> Self {
        self.engines = engines;
        self
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Indices into `providers` in the order they are tried for `voice`.
    fn order(&self, voice: &str) -> Vec<usize> {
        let preferred = self.engines.get(voice).copied().unwrap_or(VoiceEngine::Openai);
        let (first, rest): (Vec<usize>, Vec<usize>) =
            (0..self.providers.len()).partition(|&i| self.providers[i].engine() == Some(preferred));
        first
            .into_iter()
            .chain(rest.into_iter().filter(|&i| {
                preferred == VoiceEngine::Openai || self.providers[i].engine() != Some(VoiceEngine::Openai)
            }))
            .collect()
    }

    /// Provider names in the order they are tried for `voice`.
    pub fn order_for(&self, voice: &str) -> Vec<&'static str> {
        self.order(voice).into_iter().map(|i| self.providers[i].name()).collect()
    }
}

#[async_trait]
impl Narrator for NarrationCascade {
    fn name(&self) -> &'static str {
        "cascade"
    }

    async fn synthesize(&self, text: &str, voice: &str, out_stem: &Path) -> CallResult<PathBuf> {
        if text.trim().is_empty() {
            return Err(FailureReason::Empty);
        }
        for provider in self.order(voice).into_iter().map(|i| &self.providers[i]) {
            match provider.synthesize(text, voice, out_stem).await {
                Ok(path) => return Ok(path),
                Err(err) => logw(format!("{} narration failed: {}", provider.name(), err)),
            }
        }
        Err(FailureReason::Empty)
    }
}

/// Script generation and rewriting. Every method degrades to a fallback
/// string instead of failing.
#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn generate(&self, topic: &str, style_prompt: &str, structure: &str) -> String;
    async fn enhance(&self, script: &str) -> String;
    /// Recommends a voice name for the script's tone.
    async fn analyze_tone(&self, script: &str) -> String;
    async fn slogan(&self, title: &str) -> String;
}

/// Remote stock-footage search returning direct media URLs.
#[async_trait]
pub trait StockSearch: Send + Sync {
    async fn search(&self, query: &str, per_page: usize, orientation: Orientation) -> CallResult<Vec<String>>;
}

/// AI image generation written to `out_path`.
#[async_trait]
pub trait ImageSynth: Send + Sync {
    async fn generate(&self, prompt: &str, out_path: &Path) -> CallResult<PathBuf>;
}
