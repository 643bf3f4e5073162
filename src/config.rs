use crate::logi;
use crate::naming;
use crate::style::{self, StyleProfile};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Which synthesis engine a voice preset prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceEngine {
    Openai,
    Elevenlabs,
    Piper,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoicePreset {
    pub engine: VoiceEngine,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub eleven_voice_id: Option<String>,
}

/// Style, voice and script structure used for every topic of a niche batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NichePreset {
    pub style: String,
    pub voice: String,
    #[serde(default = "default_structure")]
    pub structure: String,
}

fn default_structure() -> String {
    "cinematic".to_string()
}

/// Immutable configuration snapshot. Components take an `Arc<Config>` at
/// construction; a settings change means building a new `Studio`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "open_api_key")]
    pub openai_key: String,
    #[serde(rename = "pexels_api_key")]
    pub pexels_key: String,
    #[serde(rename = "elevenlabs_api_key")]
    pub elevenlabs_key: String,
    pub eleven_voice_id: String,
    pub eleven_model_id: String,
    pub text_model: String,
    pub image_model: String,
    pub tts_model: String,
    pub piper_model: Option<PathBuf>,
    pub assets_dir: PathBuf,
    pub output_dir: PathBuf,
    pub stock_dir: PathBuf,
    pub music_dir: PathBuf,
    pub brand_name: String,
    pub watermark: String,
    pub sign_off: String,
    pub words_per_chapter: usize,
    pub publish_platforms: Vec<String>,
    pub styles: BTreeMap<String, StyleProfile>,
    pub voices: BTreeMap<String, VoicePreset>,
    pub niches: BTreeMap<String, NichePreset>,
}

const ENV_OVERRIDES: &[&str] = &[
    "OPENAI_API_KEY",
    "PEXELS_API_KEY",
    "ELEVENLABS_API_KEY",
    "OUTPUT_DIR",
    "ASSETS_DIR",
    "STOCK_DIR",
    "MUSIC_DIR",
];

fn default_voices() -> BTreeMap<String, VoicePreset> {
    [
        ("onyx", "Deep/Mystery"),
        ("alloy", "Finance/Neutral"),
        ("echo", "Viral/Energetic"),
        ("shimmer", "Peaceful/Calm"),
        ("nova", "Upbeat/Female"),
    ]
    .into_iter()
    .map(|(name, desc)| {
        (
            name.to_string(),
            VoicePreset {
                engine: VoiceEngine::Openai,
                desc: desc.to_string(),
                eleven_voice_id: None,
            },
        )
    })
    .collect()
}

fn default_niches() -> BTreeMap<String, NichePreset> {
    [
        ("mystery", "cinematic_documentary", "onyx"),
        ("finance", "finance_wealth", "alloy"),
        ("viral", "breaking_viral", "echo"),
        ("motivational", "motivational", "shimmer"),
    ]
    .into_iter()
    .map(|(niche, style, voice)| {
        (
            niche.to_string(),
            NichePreset {
                style: style.to_string(),
                voice: voice.to_string(),
                structure: default_structure(),
            },
        )
    })
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_key: String::new(),
            pexels_key: String::new(),
            elevenlabs_key: String::new(),
            eleven_voice_id: "JBFqnCBsd6RMkjVDRZzb".to_string(),
            eleven_model_id: "eleven_multilingual_v2".to_string(),
            text_model: "gpt-4o".to_string(),
            image_model: "dall-e-3".to_string(),
            tts_model: "tts-1".to_string(),
            piper_model: None,
            assets_dir: PathBuf::from("assets"),
            output_dir: PathBuf::from("output"),
            stock_dir: PathBuf::from("assets/stock"),
            music_dir: PathBuf::from("assets/music"),
            brand_name: "Matters of Value".to_string(),
            watermark: "@ValuesThatMatters".to_string(),
            sign_off: "This is Matters of Value.".to_string(),
            words_per_chapter: 500,
            publish_platforms: ["youtube", "tiktok", "twitter", "instagram", "facebook", "whatsapp"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            styles: style::default_styles(),
            voices: default_voices(),
            niches: default_niches(),
        }
    }
}

impl Config {
    /// Reads `path` if it exists (defaults otherwise), then applies
    /// environment overrides.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if fs::metadata(path).await.is_ok() {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config JSON: {}", path.display()))?
        } else {
            logi(format!("No config at {}; using defaults", path.display()));
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in ENV_OVERRIDES {
            let Some(value) = lookup(key).filter(|v| !v.is_empty()) else {
                continue;
            };
            match *key {
                "OPENAI_API_KEY" => self.openai_key = value,
                "PEXELS_API_KEY" => self.pexels_key = value,
                "ELEVENLABS_API_KEY" => self.elevenlabs_key = value,
                "OUTPUT_DIR" => self.output_dir = PathBuf::from(value),
                "ASSETS_DIR" => self.assets_dir = PathBuf::from(value),
                "STOCK_DIR" => self.stock_dir = PathBuf::from(value),
                "MUSIC_DIR" => self.music_dir = PathBuf::from(value),
                _ => continue,
            }
            logi(format!("Loaded '{}' from environment", key));
        }
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    pub fn style(&self, name: &str) -> Cow<'_, StyleProfile> {
        style::lookup(&self.styles, name)
    }

    pub fn niche(&self, name: &str) -> Option<&NichePreset> {
        self.niches.get(name)
    }

    pub fn voice(&self, name: &str) -> Option<&VoicePreset> {
        self.voices.get(name)
    }

    /// Scratch directory owned by one job. Errors unless `prefix` resolves
    /// to a direct child of `<assets>/work`.
    pub fn work_dir(&self, prefix: &str) -> Result<PathBuf> {
        anyhow::ensure!(naming::is_safe_prefix(prefix), "Unsafe job prefix {:?}", prefix);
        let root = self.assets_dir.join("work");
        let dir = root.join(prefix);
        anyhow::ensure!(
            dir.parent() == Some(root.as_path()),
            "Job prefix {:?} escapes {}",
            prefix,
            root.display()
        );
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_take_precedence() {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(|key| match key {
            "PEXELS_API_KEY" => Some("px-123".to_string()),
            "OUTPUT_DIR" => Some("/tmp/renders".to_string()),
            "OPENAI_API_KEY" => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.pexels_key, "px-123");
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/renders"));
        assert!(cfg.openai_key.is_empty());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"open_api_key":"sk-test","words_per_chapter":300}"#).unwrap();
        assert_eq!(cfg.openai_key, "sk-test");
        assert_eq!(cfg.words_per_chapter, 300);
        assert_eq!(cfg.output_dir, PathBuf::from("output"));
        assert!(cfg.styles.contains_key("finance_wealth"));
    }

    #[tokio::test]
    async fn save_then_load_preserves_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config/settings.json");
        let mut cfg = Config::default();
        cfg.watermark = "@elsewhere".to_string();
        cfg.save(&path).await.unwrap();

        let loaded = Config::load(&path).await.unwrap();
        assert_eq!(loaded.watermark, "@elsewhere");
        assert_eq!(loaded.styles, cfg.styles);
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(dir.path().join("absent.json")).await.unwrap();
        assert_eq!(cfg.words_per_chapter, 500);
        assert_eq!(
            Config::default().work_dir("job1").unwrap(),
            PathBuf::from("assets/work/job1")
        );
    }

    #[test]
    fn niche_presets_point_at_known_styles() {
        let cfg = Config::default();
        assert_eq!(cfg.niches.len(), 4);
        for (name, preset) in &cfg.niches {
            assert!(cfg.styles.contains_key(&preset.style), "{} uses unknown style", name);
            assert!(cfg.voices.contains_key(&preset.voice), "{} uses unknown voice", name);
        }
        assert_eq!(cfg.niche("finance").map(|n| n.voice.as_str()), Some("alloy"));
        assert!(cfg.niche("gardening").is_none());

        let preset: NichePreset = serde_json::from_str(r#"{"style":"motivational","voice":"nova"}"#).unwrap();
        assert_eq!(preset.structure, "cinematic");
    }

    #[test]
    fn work_dir_rejects_prefixes_outside_the_work_root() {
        let cfg = Config::default();
        for prefix in ["", ".", "..", "../assets", "a/b", "/tmp"] {
            assert!(cfg.work_dir(prefix).is_err(), "{:?} accepted", prefix);
        }
    }
}
