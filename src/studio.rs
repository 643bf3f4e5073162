use crate::api::elevenlabs::ElevenLabsNarrator;
use crate::api::openai::{OpenAiImageSynth, OpenAiNarrator, OpenAiScriptWriter};
use crate::api::pexels::PexelsSearch;
use crate::api::piper::PiperNarrator;
use crate::api::{ImageSynth, NarrationCascade, Narrator, ScriptWriter, StockSearch};
use crate::audio;
use crate::captions;
use crate::compositor::{Compositor, RenderJob};
use crate::config::Config;
use crate::directive::Script;
use crate::ffmpeg;
use crate::media::{self, MediaResolver, MediaSource, Orientation, Origin};
use crate::music;
use crate::naming;
use crate::publish::{PublishLog, Publisher};
use crate::style::{DEFAULT_STYLE, StyleProfile};
use crate::thumbnail::{BrandedThumbnailer, Thumbnailer};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use walkdir::WalkDir;

/// Stock results requested per production.
const SOURCES_PER_VIDEO: usize = 10;
const KEYWORD_LIMIT: usize = 3;
const SLUG_CHARS: usize = 10;
const LONG_FORM_VOICE: &str = "onyx";
const DEFAULT_STRUCTURE: &str = "cinematic";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Voice {
    /// Chosen from the script's tone.
    Auto,
    Named(String),
}

impl Voice {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("auto") {
            Voice::Auto
        } else {
            Voice::Named(value.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductionRequest {
    pub title: String,
    pub script: String,
    pub output_prefix: String,
    pub style: String,
    pub voice: Voice,
    pub sign_off: bool,
    pub generate_thumb: bool,
    pub enhance_script: bool,
    pub publish: bool,
    pub vertical: bool,
}

impl ProductionRequest {
    pub fn new(title: impl Into<String>, script: impl Into<String>, output_prefix: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            script: script.into(),
            output_prefix: output_prefix.into(),
            style: DEFAULT_STYLE.to_string(),
            voice: Voice::Auto,
            sign_off: true,
            generate_thumb: true,
            enhance_script: false,
            publish: false,
            vertical: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LongFormRequest {
    pub title: String,
    pub script: String,
    pub style: String,
    pub voice: Voice,
    pub generate_thumb: bool,
    pub enhance_script: bool,
    pub publish: bool,
}

impl LongFormRequest {
    pub fn new(title: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            script: script.into(),
            style: DEFAULT_STYLE.to_string(),
            voice: Voice::Named(LONG_FORM_VOICE.to_string()),
            generate_thumb: true,
            enhance_script: false,
            publish: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    BrandedIntroPrepended,
    VoiceSelected,
    MusicSelected,
    ScriptEnhanced,
    SignoffAppended,
    AudioSynthesized,
    SourcesResolved,
    VideoComposed,
    ThumbnailGenerated,
    Published,
}

impl Stage {
    fn label(self) -> &'static str {
        match self {
            Stage::BrandedIntroPrepended => "BRANDED_INTRO_PREPENDED",
            Stage::VoiceSelected => "VOICE_SELECTED",
            Stage::MusicSelected => "MUSIC_SELECTED",
            Stage::ScriptEnhanced => "SCRIPT_ENHANCED",
            Stage::SignoffAppended => "SIGNOFF_APPENDED",
            Stage::AudioSynthesized => "AUDIO_SYNTHESIZED",
            Stage::SourcesResolved => "SOURCES_RESOLVED",
            Stage::VideoComposed => "VIDEO_COMPOSED",
            Stage::ThumbnailGenerated => "THUMBNAIL_GENERATED",
            Stage::Published => "PUBLISHED",
        }
    }
}

fn reached(prefix: &str, stage: Stage, detail: impl AsRef<str>) {
    logi(format!("[{}] {}: {}", prefix, stage.label(), detail.as_ref()));
}

pub fn branded_intro(title: &str, slogan: &str) -> String {
    format!("[Action: Cinematic Title Overlay: {}]\n[{}]\n\n", title, slogan)
}

/// Appends the brand signature unless the script already carries it.
pub fn append_sign_off(script: &str, sign_off: &str) -> String {
    let signature = format!("\n\n[Action: Brand Logo Appears]\n{}", sign_off);
    if script.contains(&signature) {
        script.to_string()
    } else {
        format!("{}{}", script, signature)
    }
}

/// Groups blank-line separated paragraphs into chapters of at least
/// `words_per_chapter` words; the last chapter takes the remainder.
pub fn split_chapters(script: &str, words_per_chapter: usize) -> Vec<String> {
    let mut chapters = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut count = 0;

    for paragraph in script.split("\n\n") {
        if paragraph.trim().is_empty() {
            continue;
        }
        current.push(paragraph);
        count += paragraph.split_whitespace().count();
        if count >= words_per_chapter {
            chapters.push(current.join("\n\n"));
            current.clear();
            count = 0;
        }
    }
    if !current.is_empty() {
        chapters.push(current.join("\n\n"));
    }
    chapters
}

/// Title for a script file: its leading `#` heading, else `fallback`.
pub fn title_from_script(content: &str, fallback: &str) -> String {
    let first = content.trim().lines().next().unwrap_or("");
    if first.starts_with('#') {
        first.replace('#', "").trim().to_string()
    } else {
        fallback.to_string()
    }
}

async fn clear_directory_contents(dir_path: &Path) -> Result<bool> {
    if fs::metadata(dir_path).await.map(|m| !m.is_dir()).unwrap_or(true) {
        return Ok(true);
    }

    for entry in WalkDir::new(dir_path).min_depth(1).contents_first(true) {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            fs::remove_dir(path).await.ok();
        } else {
            fs::remove_file(path).await.ok();
        }
    }

    Ok(true)
}

/// External capabilities the pipeline drives.
pub struct Collaborators {
    pub writer: Arc<dyn ScriptWriter>,
    pub narrator: Arc<dyn Narrator>,
    pub stock: Option<Arc<dyn StockSearch>>,
    pub images: Arc<dyn ImageSynth>,
    pub thumbnailer: Arc<dyn Thumbnailer>,
    pub publisher: Arc<dyn Publisher>,
}

pub struct Studio {
    cfg: Arc<Config>,
    client: reqwest::Client,
    tools: Collaborators,
}

impl Studio {
    pub fn new(cfg: Arc<Config>, client: reqwest::Client, tools: Collaborators) -> Self {
        Self { cfg, client, tools }
    }

    /// Builds the hosted-provider graph for one configuration snapshot.
    pub fn from_config(cfg: Arc<Config>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        let mut voices: Vec<Box<dyn Narrator>> = vec![
            Box::new(OpenAiNarrator::new(client.clone(), Arc::clone(&cfg))),
            Box::new(ElevenLabsNarrator::new(client.clone(), Arc::clone(&cfg))),
        ];
        if let Some(model) = &cfg.piper_model {
            voices.push(Box::new(PiperNarrator::new(model.clone())));
        }
        let engines = cfg
            .voices
            .iter()
            .map(|(name, preset)| (name.clone(), preset.engine))
            .collect();
        let narrator = NarrationCascade::new(voices).with_voice_engines(engines);
        logi(format!("Narration providers: {}", narrator.provider_names().join(" -> ")));

        let stock: Option<Arc<dyn StockSearch>> = if cfg.pexels_key.is_empty() {
            logw("No Pexels key; remote stock search disabled.");
            None
        } else {
            Some(Arc::new(PexelsSearch::new(client.clone(), cfg.pexels_key.clone())))
        };

        let images: Arc<dyn ImageSynth> = Arc::new(OpenAiImageSynth::new(client.clone(), Arc::clone(&cfg)));
        let thumbnailer = Arc::new(BrandedThumbnailer::new(
            Arc::clone(&images),
            cfg.assets_dir.join("work").join("thumbnails"),
            cfg.output_dir.clone(),
            cfg.brand_name.clone(),
        ));
        let publisher = Arc::new(PublishLog::new(cfg.output_dir.clone(), cfg.publish_platforms.clone()));

        let tools = Collaborators {
            writer: Arc::new(OpenAiScriptWriter::new(client.clone(), Arc::clone(&cfg))),
            narrator: Arc::new(narrator),
            stock,
            images,
            thumbnailer,
            publisher,
        };
        Ok(Self::new(cfg, client, tools))
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn output_path(&self, prefix: &str) -> PathBuf {
        self.cfg.output_dir.join(format!("{}_final.mp4", prefix))
    }

    /// Runs one production end to end. Every failure is logged and
    /// reported as `None`.
    pub async fn produce_video(&self, req: &ProductionRequest) -> Option<PathBuf> {
        logi(format!("Producing '{}' (prefix {}, vertical {})", req.title, req.output_prefix, req.vertical));
        match self.run_production(req).await {
            Ok(Some(path)) => Some(path),
            Ok(None) => {
                logw(format!("Production '{}' produced no video.", req.title));
                None
            }
            Err(err) => {
                logw(format!("Production '{}' failed: {:#}", req.title, err));
                None
            }
        }
    }

    async fn run_production(&self, req: &ProductionRequest) -> Result<Option<PathBuf>> {
        let prefix = req.output_prefix.as_str();
        let style = self.cfg.style(&req.style).into_owned();
        let work_dir = self.cfg.work_dir(prefix)?;
        clear_directory_contents(&work_dir).await?;
        fs::create_dir_all(&work_dir)
            .await
            .with_context(|| format!("Failed to create {}", work_dir.display()))?;

        let slogan = self.tools.writer.slogan(&req.title).await;
        let mut script = format!("{}{}", branded_intro(&req.title, &slogan), req.script);
        reached(prefix, Stage::BrandedIntroPrepended, &slogan);

        let voice = match &req.voice {
            Voice::Auto => self.tools.writer.analyze_tone(&script).await,
            Voice::Named(name) => name.clone(),
        };
        reached(prefix, Stage::VoiceSelected, &voice);

        let music = music::select_music(&self.cfg.music_dir, &voice).await;
        reached(
            prefix,
            Stage::MusicSelected,
            music.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "none".to_string()),
        );

        if req.enhance_script {
            script = self.tools.writer.enhance(&script).await;
            reached(prefix, Stage::ScriptEnhanced, format!("{} chars", script.len()));
        }

        if req.sign_off {
            script = append_sign_off(&script, &self.cfg.sign_off);
            reached(prefix, Stage::SignoffAppended, &self.cfg.sign_off);
        }

        let parsed = Script::parse(&script);
        let spoken = parsed.spoken();
        if spoken.is_empty() {
            logw(format!("[{}] Script has no spoken text.", prefix));
            return Ok(None);
        }

        let stem = self.cfg.assets_dir.join(format!("voiceover_{}", prefix));
        let narration = match self.tools.narrator.synthesize(&spoken, &voice, &stem).await {
            Ok(path) => path,
            Err(err) => {
                logw(format!("[{}] Narration failed: {}", prefix, err));
                return Ok(None);
            }
        };
        let track = match audio::compose_audio(&narration, music.as_deref(), &work_dir).await {
            Ok(track) => track,
            Err(err) => {
                logw(format!("[{}] Audio unusable: {:#}", prefix, err));
                return Ok(None);
            }
        };
        reached(prefix, Stage::AudioSynthesized, format!("{:.1}s", track.duration));

        let keywords = media::extract_keywords(&spoken, KEYWORD_LIMIT);
        let query = if keywords.is_empty() {
            req.title.clone()
        } else {
            keywords.join(" ")
        };
        let orientation = Orientation::for_vertical(req.vertical);
        let sources = self.resolve_visuals(&query, prefix, &style, orientation).await;
        reached(prefix, Stage::SourcesResolved, format!("{} source(s) for '{}'", sources.len(), query));
        if sources.is_empty() {
            logw(format!("[{}] No visuals available.", prefix));
            return Ok(None);
        }

        let chunks = captions::compute_captions(&spoken, track.duration);
        let output = self.output_path(prefix);
        let compositor = Compositor::new(self.client.clone(), work_dir.clone());
        let job = RenderJob {
            audio: &track,
            sources: &sources,
            captions: &chunks,
            style: &style,
            vertical: req.vertical,
            watermark: &self.cfg.watermark,
            output: &output,
        };
        let Some(video) = compositor.compose_video(&job).await else {
            return Ok(None);
        };
        reached(prefix, Stage::VideoComposed, video.display().to_string());

        if req.generate_thumb {
            match self.tools.thumbnailer.generate(&req.title, &style).await {
                Ok(thumb) => reached(prefix, Stage::ThumbnailGenerated, thumb.display().to_string()),
                Err(err) => logw(format!("[{}] Thumbnail failed: {}", prefix, err)),
            }
        }

        if req.publish {
            match self.tools.publisher.publish(&req.title, &video, &script).await {
                Ok(receipt) => reached(
                    prefix,
                    Stage::Published,
                    format!("{} platform(s)", receipt.distribution.len()),
                ),
                Err(err) => logw(format!("[{}] Publishing failed: {}", prefix, err)),
            }
        }

        logok(format!("[{}] Finished: {}", prefix, video.display()));
        Ok(Some(video))
    }

    /// Stock sources for `query`, or a single generated image when no
    /// stock is found.
    pub async fn resolve_visuals(
        &self,
        query: &str,
        prefix: &str,
        style: &StyleProfile,
        orientation: Orientation,
    ) -> Vec<MediaSource> {
        let resolver = MediaResolver::new(self.cfg.stock_dir.clone(), self.tools.stock.clone());
        let sources = resolver.resolve_sources(query, SOURCES_PER_VIDEO, style, orientation).await;
        if !sources.is_empty() {
            return sources;
        }

        logi(format!("[{}] No stock footage; synthesizing an image.", prefix));
        let target = self.cfg.assets_dir.join(format!("ai_synthesis_{}.png", prefix));
        match self.tools.images.generate(query, &target).await {
            Ok(path) => vec![MediaSource::local(path, orientation, Origin::AiGenerated)],
            Err(err) => {
                logw(format!("[{}] Image synthesis failed: {}", prefix, err));
                Vec::new()
            }
        }
    }

    /// Renders a long script chapter by chapter and merges the chapters
    /// that rendered into one feature.
    pub async fn produce_long_form(&self, req: &LongFormRequest) -> Option<PathBuf> {
        match self.run_long_form(req).await {
            Ok(out) => out,
            Err(err) => {
                logw(format!("Long-form '{}' failed: {:#}", req.title, err));
                None
            }
        }
    }

    async fn run_long_form(&self, req: &LongFormRequest) -> Result<Option<PathBuf>> {
        logi(format!("Long-form production: {}", req.title));
        let script = if req.enhance_script {
            self.tools.writer.enhance(&req.script).await
        } else {
            req.script.clone()
        };

        let chapters = split_chapters(&script, self.cfg.words_per_chapter);
        let slug = naming::file_slug(&req.title, SLUG_CHARS);
        logi(format!("{} chapter(s) at ~{} words", chapters.len(), self.cfg.words_per_chapter));

        let mut rendered = Vec::new();
        for (i, chapter) in chapters.iter().enumerate() {
            let mut chapter_req = ProductionRequest::new(
                format!("{} - Part {}", req.title, i + 1),
                chapter.clone(),
                format!("long_{}_ch{}", slug, i),
            );
            chapter_req.style = req.style.clone();
            chapter_req.voice = req.voice.clone();
            chapter_req.sign_off = i + 1 == chapters.len();
            chapter_req.generate_thumb = false;
            chapter_req.publish = false;

            match self.produce_video(&chapter_req).await {
                Some(path) => rendered.push(path),
                None => logw(format!("Chapter {} missing from the feature.", i + 1)),
            }
        }

        if rendered.is_empty() {
            logw("No chapters rendered; nothing to merge.");
            return Ok(None);
        }

        let merge_dir = self.cfg.work_dir(&format!("long_{}", slug))?;
        fs::create_dir_all(&merge_dir).await?;
        let list = merge_dir.join("chapters.txt");
        ffmpeg::write_concat_list(&list, &rendered).await?;

        fs::create_dir_all(&self.cfg.output_dir).await?;
        let final_path = self
            .cfg
            .output_dir
            .join(format!("FEATURE_{}.mp4", naming::underscored(&req.title)));
        let partial = final_path.with_extension("partial.mp4");
        let merged = match ffmpeg::ffmpeg_concat_videos(&list, &partial).await {
            Ok(ok) => ok,
            Err(err) => {
                let _ = fs::remove_file(&partial).await;
                return Err(err.context("Chapter merge failed"));
            }
        };
        if !merged {
            return Ok(None);
        }
        fs::rename(&partial, &final_path).await?;
        logok(format!("Feature merged from {} chapter(s): {}", rendered.len(), final_path.display()));

        let style = self.cfg.style(&req.style).into_owned();
        if req.generate_thumb {
            if let Err(err) = self.tools.thumbnailer.generate(&req.title, &style).await {
                logw(format!("Feature thumbnail failed: {}", err));
            }
        }
        if req.publish {
            if let Err(err) = self.tools.publisher.publish(&req.title, &final_path, &script).await {
                logw(format!("Feature publishing failed: {}", err));
            }
        }

        Ok(Some(final_path))
    }

    /// Writes a script for `topic` and produces it.
    pub async fn documentary(&self, topic: &str, style: &str, structure: Option<&str>) -> Option<PathBuf> {
        logi(format!("Documentary pipeline: {}", topic));
        let profile = self.cfg.style(style).into_owned();
        let script = self
            .tools
            .writer
            .generate(topic, &profile.prompt, structure.unwrap_or(DEFAULT_STRUCTURE))
            .await;
        if script.trim().is_empty() {
            logw("Script writer returned nothing.");
            return None;
        }

        let mut req = ProductionRequest::new(topic, script, format!("doc_{}", naming::file_slug(topic, SLUG_CHARS)));
        req.style = style.to_string();
        self.produce_video(&req).await
    }

    /// Writes and produces one video per topic with a niche's preset style,
    /// voice and structure. Returns the videos that rendered.
    pub async fn niche(&self, niche: &str, topics: &[String]) -> Vec<PathBuf> {
        let Some(preset) = self.cfg.niche(niche).cloned() else {
            logw(format!("Niche '{}' not recognized.", niche));
            return Vec::new();
        };
        logi(format!("{} batch: {} topic(s)", niche.to_uppercase(), topics.len()));

        let profile = self.cfg.style(&preset.style).into_owned();
        let mut produced = Vec::new();
        for (i, topic) in topics.iter().enumerate() {
            logi(format!("[Video {}/{}] {}", i + 1, topics.len(), topic));
            let script = self
                .tools
                .writer
                .generate(topic, &profile.prompt, &preset.structure)
                .await;
            if script.trim().is_empty() {
                logw(format!("No script for '{}'; skipping.", topic));
                continue;
            }

            let mut req = ProductionRequest::new(topic.as_str(), script, format!("niche_{}_{}", niche, i));
            req.style = preset.style.clone();
            req.voice = Voice::Named(preset.voice.clone());
            if let Some(video) = self.produce_video(&req).await {
                produced.push(video);
            }
        }
        produced
    }

    /// Produces a video from a script file on disk.
    pub async fn produce_script_file(&self, path: &Path, style: &str, vertical: bool) -> Option<PathBuf> {
        let content = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(err) => {
                logw(format!("Cannot read script {}: {}", path.display(), err));
                return None;
            }
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "script".to_string());
        let stem = file_name.split('.').next().unwrap_or("script");
        let mut req = ProductionRequest::new(
            title_from_script(&content, &file_name),
            content.clone(),
            format!("custom_{}", naming::underscored(stem)),
        );
        req.style = style.to_string();
        req.vertical = vertical;
        self.produce_video(&req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_parsing() {
        assert_eq!(Voice::parse("auto"), Voice::Auto);
        assert_eq!(Voice::parse(" AUTO "), Voice::Auto);
        assert_eq!(Voice::parse(""), Voice::Auto);
        assert_eq!(Voice::parse("shimmer"), Voice::Named("shimmer".to_string()));
    }

    #[test]
    fn request_defaults() {
        let req = ProductionRequest::new("Gold", "text", "gold");
        assert_eq!(req.style, "cinematic_documentary");
        assert_eq!(req.voice, Voice::Auto);
        assert!(req.sign_off && req.generate_thumb);
        assert!(!req.enhance_script && !req.publish && !req.vertical);

        let long = LongFormRequest::new("Gold", "text");
        assert_eq!(long.voice, Voice::Named("onyx".to_string()));
    }

    #[test]
    fn intro_and_sign_off_format() {
        assert_eq!(
            branded_intro("Gold", "Truth Unveiled."),
            "[Action: Cinematic Title Overlay: Gold]\n[Truth Unveiled.]\n\n"
        );
        let once = append_sign_off("Body.", "This is Matters of Value.");
        assert_eq!(once, "Body.\n\n[Action: Brand Logo Appears]\nThis is Matters of Value.");
        assert_eq!(append_sign_off(&once, "This is Matters of Value."), once);
    }

    #[test]
    fn chapters_close_once_budget_is_reached() {
        let p = |n: usize| vec!["word"; n].join(" ");
        let script = [p(300), p(250), p(100), p(600), p(10)].join("\n\n");
        let chapters = split_chapters(&script, 500);
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].split_whitespace().count(), 550);
        assert_eq!(chapters[1].split_whitespace().count(), 700);
        assert_eq!(chapters[2].split_whitespace().count(), 10);
        assert!(chapters[0].contains("\n\n"));
    }

    #[test]
    fn blank_paragraphs_do_not_make_chapters() {
        assert!(split_chapters("\n\n  \n\n", 500).is_empty());
        assert_eq!(split_chapters("short one", 500), vec!["short one".to_string()]);
    }

    #[test]
    fn script_titles() {
        assert_eq!(title_from_script("# The Vault\nBody", "vault.txt"), "The Vault");
        assert_eq!(title_from_script("Body first", "vault.txt"), "vault.txt");
    }

    #[tokio::test]
    async fn clearing_keeps_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        fs::create_dir_all(work.join("clips")).await.unwrap();
        fs::write(work.join("clips/n_0.mp4"), b"x").await.unwrap();
        fs::write(work.join("list.txt"), b"x").await.unwrap();

        assert!(clear_directory_contents(&work).await.unwrap());
        assert!(work.is_dir());
        assert!(fs::read_dir(&work).await.unwrap().next_entry().await.unwrap().is_none());
        assert!(clear_directory_contents(&dir.path().join("absent")).await.unwrap());
    }
}
