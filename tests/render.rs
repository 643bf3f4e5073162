//! Rendering tests against a real ffmpeg. Inputs are generated with the
//! lavfi `sine` and `color` sources; every test returns early when the
//! tools it needs are not installed.

use async_trait::async_trait;
use faceless_shorts::api::{ImageSynth, Narrator, ScriptWriter, stem_with_ext};
use faceless_shorts::audio::{self, AudioTrack};
use faceless_shorts::compositor::{Compositor, RenderJob};
use faceless_shorts::config::Config;
use faceless_shorts::ffmpeg::{ffprobe_duration_seconds, ffprobe_video_dimensions};
use faceless_shorts::init;
use faceless_shorts::media::{MediaSource, Orientation, Origin};
use faceless_shorts::publish::{PublishReceipt, Publisher};
use faceless_shorts::studio::{Collaborators, LongFormRequest, ProductionRequest, Studio, Voice};
use faceless_shorts::style::StyleProfile;
use faceless_shorts::thumbnail::Thumbnailer;
use faceless_shorts::{CallResult, FailureReason};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::process::Command;

const TOLERANCE: f64 = 0.3;

async fn tool_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().await.ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn ffmpeg_ready() -> bool {
    if !init::check_ffmpeg().await || tool_stdout("ffprobe", &["-version"]).await.is_none() {
        eprintln!("ffmpeg/ffprobe not on PATH; skipping");
        return false;
    }
    let encoders = tool_stdout("ffmpeg", &["-hide_banner", "-encoders"]).await.unwrap_or_default();
    if !encoders.contains("libx264") {
        eprintln!("ffmpeg lacks libx264; skipping");
        return false;
    }
    true
}

/// Captions and the watermark need drawtext with fontconfig.
async fn drawtext_ready() -> bool {
    if !ffmpeg_ready().await {
        return false;
    }
    let filters = tool_stdout("ffmpeg", &["-hide_banner", "-filters"]).await.unwrap_or_default();
    let build = tool_stdout("ffmpeg", &["-hide_banner", "-version"]).await.unwrap_or_default();
    let ready = filters.contains(" drawtext ") && build.contains("--enable-libfontconfig");
    if !ready {
        eprintln!("ffmpeg lacks drawtext with fontconfig; skipping");
    }
    ready
}

async fn lavfi(source: String, codec: &[&str], out: &Path) {
    std::fs::create_dir_all(out.parent().unwrap()).unwrap();
    let status = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i"])
        .arg(source)
        .args(codec)
        .arg(out)
        .status()
        .await
        .unwrap();
    assert!(status.success(), "could not generate {}", out.display());
}

async fn tone(out: &Path, secs: f64) {
    lavfi(format!("sine=frequency=440:duration={}", secs), &["-c:a", "aac"], out).await;
}

async fn color_clip(out: &Path, w: u32, h: u32, secs: f64) {
    lavfi(
        format!("color=c=blue:s={}x{}:d={}:r=24", w, h, secs),
        &["-c:v", "libx264", "-pix_fmt", "yuv420p"],
        out,
    )
    .await;
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= TOLERANCE,
        "duration {:.3}s, expected {:.3}s",
        actual,
        expected
    );
}

#[tokio::test]
async fn narration_without_music_is_returned_unchanged() {
    if !ffmpeg_ready().await {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let narration = dir.path().join("narration.m4a");
    tone(&narration, 3.0).await;

    let track = audio::compose_audio(&narration, None, &dir.path().join("work")).await.unwrap();
    assert_eq!(track.path, narration);
    assert_close(track.duration, 3.0);
}

#[tokio::test]
async fn short_music_is_looped_under_the_whole_narration() {
    if !ffmpeg_ready().await {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let narration = dir.path().join("narration.m4a");
    let music = dir.path().join("music.m4a");
    tone(&narration, 3.0).await;
    lavfi("sine=frequency=220:duration=1".to_string(), &["-c:a", "aac"], &music).await;

    let work = dir.path().join("work");
    let track = audio::compose_audio(&narration, Some(&music), &work).await.unwrap();
    assert_eq!(track.path, work.join("mixed_audio.m4a"));
    let narration_secs = ffprobe_duration_seconds(&narration).await.unwrap();
    assert_eq!(track.duration, narration_secs);
    assert_close(ffprobe_duration_seconds(&track.path).await.unwrap(), narration_secs);
}

#[tokio::test]
async fn portrait_render_matches_frame_and_narration_length() {
    if !ffmpeg_ready().await {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let narration = dir.path().join("narration.m4a");
    let stock = dir.path().join("stock/wide.mp4");
    tone(&narration, 3.0).await;
    color_clip(&stock, 640, 360, 1.0).await;

    let track = AudioTrack {
        duration: ffprobe_duration_seconds(&narration).await.unwrap(),
        path: narration,
    };
    let sources = vec![MediaSource::local(stock, Orientation::Portrait, Origin::LocalStock)];
    let output = dir.path().join("output/wide_final.mp4");
    let mut style = StyleProfile::standard();
    style.grain = true;
    let job = RenderJob {
        audio: &track,
        sources: &sources,
        captions: &[],
        style: &style,
        vertical: true,
        watermark: "",
        output: &output,
    };

    let compositor = Compositor::new(reqwest::Client::new(), dir.path().join("work"));
    assert_eq!(compositor.compose_video(&job).await, Some(output.clone()));
    assert_eq!(ffprobe_video_dimensions(&output).await.unwrap(), (1080, 1920));
    assert_close(ffprobe_duration_seconds(&output).await.unwrap(), track.duration);
    assert!(output.with_extension("srt").is_file());
    assert!(!output.with_extension("partial.mp4").exists());
}

#[derive(Default)]
struct Counts {
    narrations: usize,
    thumbnails: usize,
    publishes: usize,
}

type Shared = Arc<Mutex<Counts>>;

struct PlainWriter;

#[async_trait]
impl ScriptWriter for PlainWriter {
    async fn generate(&self, _topic: &str, _style_prompt: &str, _structure: &str) -> String {
        String::new()
    }

    async fn enhance(&self, script: &str) -> String {
        script.to_string()
    }

    async fn analyze_tone(&self, _script: &str) -> String {
        "onyx".to_string()
    }

    async fn slogan(&self, _title: &str) -> String {
        "Truth Unveiled".to_string()
    }
}

/// Speaks every text as a copy of a pre-rendered tone.
struct ToneNarrator {
    tone: PathBuf,
    calls: Shared,
}

#[async_trait]
impl Narrator for ToneNarrator {
    fn name(&self) -> &'static str {
        "tone"
    }

    async fn synthesize(&self, _text: &str, _voice: &str, out_stem: &Path) -> CallResult<PathBuf> {
        self.calls.lock().unwrap().narrations += 1;
        let out = stem_with_ext(out_stem, "m4a");
        tokio::fs::copy(&self.tone, &out).await?;
        Ok(out)
    }
}

struct NoImages;

#[async_trait]
impl ImageSynth for NoImages {
    async fn generate(&self, _prompt: &str, _out_path: &Path) -> CallResult<PathBuf> {
        Err(FailureReason::MissingApiKey("openai"))
    }
}

struct CountingThumbs(Shared);

#[async_trait]
impl Thumbnailer for CountingThumbs {
    async fn generate(&self, _title: &str, _style: &StyleProfile) -> CallResult<PathBuf> {
        self.0.lock().unwrap().thumbnails += 1;
        Ok(PathBuf::from("thumb.png"))
    }
}

struct CountingPublisher(Shared);

#[async_trait]
impl Publisher for CountingPublisher {
    async fn publish(&self, title: &str, video: &Path, _script: &str) -> CallResult<PublishReceipt> {
        self.0.lock().unwrap().publishes += 1;
        Ok(PublishReceipt {
            title: title.to_string(),
            file: video.display().to_string(),
            description: String::new(),
            cues: Vec::new(),
            distribution: Vec::new(),
        })
    }
}

async fn rendering_studio(root: &Path, narration_secs: f64, words_per_chapter: usize) -> (Studio, Shared) {
    let tone_file = root.join("fixtures/tone.m4a");
    tone(&tone_file, narration_secs).await;
    color_clip(&root.join("assets/stock/glaciers.mp4"), 1280, 720, 1.0).await;

    let mut cfg = Config::default();
    cfg.assets_dir = root.join("assets");
    cfg.output_dir = root.join("output");
    cfg.stock_dir = root.join("assets/stock");
    cfg.music_dir = root.join("assets/music");
    cfg.words_per_chapter = words_per_chapter;

    let calls: Shared = Arc::new(Mutex::new(Counts::default()));
    let tools = Collaborators {
        writer: Arc::new(PlainWriter),
        narrator: Arc::new(ToneNarrator {
            tone: tone_file,
            calls: Arc::clone(&calls),
        }),
        stock: None,
        images: Arc::new(NoImages),
        thumbnailer: Arc::new(CountingThumbs(Arc::clone(&calls))),
        publisher: Arc::new(CountingPublisher(Arc::clone(&calls))),
    };
    (Studio::new(Arc::new(cfg), reqwest::Client::new(), tools), calls)
}

#[tokio::test]
async fn finished_render_runs_thumbnail_and_publish_only_when_asked() {
    if !drawtext_ready().await {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (studio, calls) = rendering_studio(dir.path(), 3.0, 500).await;

    let mut req = ProductionRequest::new("Polar Nights", "Glaciers shimmer beneath northern lights.", "polar");
    req.voice = Voice::Named("onyx".to_string());
    req.publish = true;
    let video = studio.produce_video(&req).await.unwrap();
    assert_eq!(video, studio.output_path("polar"));
    assert_eq!(ffprobe_video_dimensions(&video).await.unwrap(), (1920, 1080));
    assert_close(ffprobe_duration_seconds(&video).await.unwrap(), 3.0);
    {
        let calls = calls.lock().unwrap();
        assert_eq!((calls.thumbnails, calls.publishes), (1, 1));
    }

    let mut quiet = ProductionRequest::new("Polar Nights", "Glaciers shimmer beneath northern lights.", "polar_quiet");
    quiet.generate_thumb = false;
    assert!(studio.produce_video(&quiet).await.is_some());
    let calls = calls.lock().unwrap();
    assert_eq!(calls.narrations, 2);
    assert_eq!((calls.thumbnails, calls.publishes), (1, 1));
}

#[tokio::test]
async fn long_form_merges_every_rendered_chapter() {
    if !drawtext_ready().await {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let (studio, calls) = rendering_studio(dir.path(), 2.0, 3).await;

    let script = "Glaciers shimmer brightly.\n\nNorthern lights dance overhead.";
    let mut req = LongFormRequest::new("Polar Nights", script);
    req.publish = true;
    let feature = studio.produce_long_form(&req).await.unwrap();

    assert_eq!(feature, dir.path().join("output/FEATURE_Polar_Nights.mp4"));
    assert_close(ffprobe_duration_seconds(&feature).await.unwrap(), 4.0);
    assert!(studio.output_path("long_Polar_Nigh_ch0").is_file());
    assert!(studio.output_path("long_Polar_Nigh_ch1").is_file());
    let calls = calls.lock().unwrap();
    assert_eq!(calls.narrations, 2);
    assert_eq!((calls.thumbnails, calls.publishes), (1, 1));
}
