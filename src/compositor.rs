use crate::audio::AudioTrack;
use crate::captions::{self, CaptionChunk};
use crate::ffmpeg::{self, OUTPUT_FPS};
use crate::media::{self, MediaSource, SourceLocation};
use crate::style::StyleProfile;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const VERTICAL_FRAME: (u32, u32) = (1080, 1920);
pub const HORIZONTAL_FRAME: (u32, u32) = (1920, 1080);
/// How long a still image is held before the base track loops.
const STILL_SECONDS: f64 = 5.0;
const GRAIN_FILTER: &str = "noise=alls=12:allf=t+u";
const WATERMARK_FONT_SIZE: u32 = 30;

pub fn target_frame(vertical: bool) -> (u32, u32) {
    if vertical { VERTICAL_FRAME } else { HORIZONTAL_FRAME }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub w: u32,
    pub h: u32,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    Crop(Crop),
    /// Letterbox offset from the top.
    Pad(u32),
}

/// Geometry that turns a source frame into the target frame: an optional
/// aspect crop, a scale, then an optional fit to the exact frame height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePlan {
    pub crop: Option<Crop>,
    pub scale: (u32, u32),
    pub fit: Option<Fit>,
    pub target: (u32, u32),
}

fn even(v: f64) -> u32 {
    let v = v.round().max(2.0) as u32;
    v - v % 2
}

pub fn plan_frame(src_w: u32, src_h: u32, vertical: bool) -> FramePlan {
    let target = target_frame(vertical);

    if vertical {
        let ratio = target.0 as f64 / target.1 as f64;
        let src_ratio = src_w as f64 / src_h as f64;
        let crop = if src_ratio > ratio {
            let w = even(src_h as f64 * ratio).min(src_w);
            Crop { w, h: src_h, x: (src_w - w) / 2, y: 0 }
        } else {
            let h = even(src_w as f64 / ratio).min(src_h);
            Crop { w: src_w, h, x: 0, y: (src_h - h) / 2 }
        };
        return FramePlan {
            crop: Some(crop),
            scale: target,
            fit: None,
            target,
        };
    }

    let scaled_h = even(src_h as f64 * target.0 as f64 / src_w as f64);
    let fit = if scaled_h > target.1 {
        Some(Fit::Crop(Crop {
            w: target.0,
            h: target.1,
            x: 0,
            y: (scaled_h - target.1) / 2,
        }))
    } else if scaled_h < target.1 {
        Some(Fit::Pad((target.1 - scaled_h) / 2))
    } else {
        None
    };

    FramePlan {
        crop: None,
        scale: (target.0, scaled_h),
        fit,
        target,
    }
}

impl FramePlan {
    pub fn filter(&self) -> String {
        let mut steps = Vec::new();
        if let Some(c) = self.crop {
            steps.push(format!("crop={}:{}:{}:{}", c.w, c.h, c.x, c.y));
        }
        steps.push(format!("scale={}:{}", self.scale.0, self.scale.1));
        match self.fit {
            Some(Fit::Crop(c)) => steps.push(format!("crop={}:{}:{}:{}", c.w, c.h, c.x, c.y)),
            Some(Fit::Pad(y)) => steps.push(format!("pad={}:{}:0:{}:black", self.target.0, self.target.1, y)),
            None => {}
        }
        steps.push("setsar=1".to_string());
        steps.push(format!("fps={}", OUTPUT_FPS));
        steps.join(",")
    }
}

fn caption_wrap_width(vertical: bool) -> usize {
    if vertical { 20 } else { 40 }
}

/// Overlay chain in fixed order: grain, then captions, then watermark.
/// `caption_files` pairs each chunk with the text file drawtext reads.
pub fn overlay_filter(
    style: &StyleProfile,
    caption_files: &[(PathBuf, &CaptionChunk)],
    watermark_file: Option<&Path>,
) -> String {
    let mut layers = Vec::new();
    if style.grain {
        layers.push(GRAIN_FILTER.to_string());
    }

    let font = ffmpeg::escape_filter_value(&style.font);
    for (file, chunk) in caption_files {
        layers.push(format!(
            "drawtext=font={}:textfile={}:expansion=none:fontsize={}:fontcolor={}:borderw=2:bordercolor=black:x=(w-text_w)/2:y={}:enable='gte(t,{:.3})*lt(t,{:.3})'",
            font,
            ffmpeg::escape_filter_value(&file.display().to_string()),
            style.font_size,
            style.ffmpeg_color(),
            style.position.y_expr(),
            chunk.start_time,
            chunk.end_time(),
        ));
    }

    if let Some(file) = watermark_file {
        layers.push(format!(
            "drawtext=textfile={}:expansion=none:fontsize={}:fontcolor=white@0.4:borderw=1:bordercolor=black:x=w-250:y=h-50",
            ffmpeg::escape_filter_value(&file.display().to_string()),
            WATERMARK_FONT_SIZE,
        ));
    }

    if layers.is_empty() {
        "null".to_string()
    } else {
        layers.join(",")
    }
}

pub struct RenderJob<'a> {
    pub audio: &'a AudioTrack,
    pub sources: &'a [MediaSource],
    pub captions: &'a [CaptionChunk],
    pub style: &'a StyleProfile,
    pub vertical: bool,
    pub watermark: &'a str,
    pub output: &'a Path,
}

fn partial_path(output: &Path) -> PathBuf {
    output.with_extension("partial.mp4")
}

pub struct Compositor {
    client: reqwest::Client,
    work_dir: PathBuf,
}

impl Compositor {
    pub fn new(client: reqwest::Client, work_dir: PathBuf) -> Self {
        Self { client, work_dir }
    }

    /// Renders the job. Any failure is logged and yields `None`; a partial
    /// render never survives.
    pub async fn compose_video(&self, job: &RenderJob<'_>) -> Option<PathBuf> {
        match self.render(job).await {
            Ok(out) => out,
            Err(err) => {
                logw(format!("Composition failed for {}: {:#}", job.output.display(), err));
                let _ = fs::remove_file(partial_path(job.output)).await;
                None
            }
        }
    }

    async fn local_copy(&self, idx: usize, source: &MediaSource) -> Option<PathBuf> {
        match &source.location {
            SourceLocation::Local(path) => {
                if fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false) {
                    Some(path.clone())
                } else {
                    logw(format!("Source missing: {}", path.display()));
                    None
                }
            }
            SourceLocation::Remote(url) => {
                let ext = if source.is_still_image() { "jpg" } else { "mp4" };
                let dest = self.work_dir.join(format!("remote_{}.{}", idx, ext));
                match media::download_to(&self.client, url, &dest).await {
                    Ok(p) => Some(p),
                    Err(err) => {
                        logw(format!("Download failed, skipping source: {:#}", err));
                        None
                    }
                }
            }
        }
    }

    async fn normalize_sources(&self, job: &RenderJob<'_>, clips_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut clips = Vec::new();
        for (idx, source) in job.sources.iter().enumerate() {
            let Some(input) = self.local_copy(idx, source).await else {
                continue;
            };
            let (w, h) = match ffmpeg::ffprobe_video_dimensions(&input).await {
                Ok(dims) => dims,
                Err(err) => {
                    logw(format!("Skipping unreadable source {}: {}", input.display(), err));
                    continue;
                }
            };

            let plan = plan_frame(w, h, job.vertical);
            let still = source.is_still_image().then_some(STILL_SECONDS);
            let out = clips_dir.join(format!("n_{}.mp4", idx));
            if ffmpeg::ffmpeg_normalize_clip(&input, &plan.filter(), still, &out).await? {
                clips.push(out);
            }
        }
        Ok(clips)
    }

    async fn write_caption_files<'c>(
        &self,
        captions: &'c [CaptionChunk],
        vertical: bool,
    ) -> Result<Vec<(PathBuf, &'c CaptionChunk)>> {
        let dir = self.work_dir.join("captions");
        fs::create_dir_all(&dir).await?;

        let mut out = Vec::with_capacity(captions.len());
        for (idx, chunk) in captions.iter().enumerate() {
            let file = dir.join(format!("cap_{}.txt", idx));
            let wrapped = captions::wrap_lines(&chunk.text, caption_wrap_width(vertical)).join("\n");
            fs::write(&file, wrapped).await?;
            out.push((file, chunk));
        }
        Ok(out)
    }

    async fn render(&self, job: &RenderJob<'_>) -> Result<Option<PathBuf>> {
        let clips_dir = self.work_dir.join("clips");
        fs::create_dir_all(&clips_dir)
            .await
            .with_context(|| format!("Failed to create {}", clips_dir.display()))?;

        let (tw, th) = target_frame(job.vertical);
        logi(format!("Normalizing {} source(s) to {}x{}", job.sources.len(), tw, th));
        let clips = self.normalize_sources(job, &clips_dir).await?;
        if clips.is_empty() {
            logw("No usable visual sources; nothing to compose.");
            return Ok(None);
        }

        let list = self.work_dir.join("concat_list.txt");
        ffmpeg::write_concat_list(&list, &clips).await?;
        let base = self.work_dir.join("base.mp4");
        if !ffmpeg::ffmpeg_concat_silent(&list, &base).await? {
            anyhow::bail!("Concat produced no base track");
        }

        let caption_files = self.write_caption_files(job.captions, job.vertical).await?;
        let watermark_file = if job.watermark.trim().is_empty() {
            None
        } else {
            let file = self.work_dir.join("watermark.txt");
            fs::write(&file, job.watermark).await?;
            Some(file)
        };
        let filter = overlay_filter(job.style, &caption_files, watermark_file.as_deref());

        if let Some(parent) = job.output.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(job.output);
        logi(format!("Rendering {:.1}s at {} fps...", job.audio.duration, OUTPUT_FPS));
        if !ffmpeg::ffmpeg_render_composite(&base, &job.audio.path, &filter, job.audio.duration, &partial).await? {
            anyhow::bail!("Render produced no output");
        }
        fs::rename(&partial, job.output)
            .await
            .with_context(|| format!("Failed to finalize {}", job.output.display()))?;

        let srt = job.output.with_extension("srt");
        if let Err(err) = fs::write(&srt, captions::to_srt(job.captions)).await {
            logw(format!("Caption sidecar not written: {}", err));
        }

        logok(format!("Rendered {}", job.output.display()));
        Ok(Some(job.output.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{Orientation, Origin};
    use crate::style::CaptionPosition;

    #[test]
    fn wide_source_is_cropped_to_portrait() {
        let plan = plan_frame(1920, 1080, true);
        assert_eq!(plan.crop, Some(Crop { w: 608, h: 1080, x: 656, y: 0 }));
        assert_eq!(plan.scale, (1080, 1920));
        assert_eq!(plan.target, (1080, 1920));
        assert_eq!(plan.filter(), "crop=608:1080:656:0,scale=1080:1920,setsar=1,fps=24");
    }

    #[test]
    fn tall_source_crops_height_for_portrait() {
        let plan = plan_frame(720, 1600, true);
        assert_eq!(plan.crop, Some(Crop { w: 720, h: 1280, x: 0, y: 160 }));
        assert_eq!(plan.scale, (1080, 1920));
    }

    #[test]
    fn landscape_scales_to_full_width() {
        let exact = plan_frame(1280, 720, false);
        assert_eq!(exact.scale, (1920, 1080));
        assert_eq!(exact.fit, None);

        let square = plan_frame(1024, 1024, false);
        assert_eq!(square.scale, (1920, 1920));
        assert_eq!(square.fit, Some(Fit::Crop(Crop { w: 1920, h: 1080, x: 0, y: 420 })));

        let ultrawide = plan_frame(2560, 1080, false);
        assert_eq!(ultrawide.scale, (1920, 810));
        assert_eq!(ultrawide.fit, Some(Fit::Pad(135)));
        assert!(ultrawide.filter().contains("pad=1920:1080:0:135:black"));
    }

    #[test]
    fn overlay_layers_keep_their_order() {
        let mut style = StyleProfile::standard();
        style.grain = true;
        style.position = CaptionPosition::Top;
        let chunk = CaptionChunk {
            text: "hello there".to_string(),
            start_time: 1.0,
            duration: 0.8,
        };
        let files = vec![(PathBuf::from("work/cap_0.txt"), &chunk)];
        let filter = overlay_filter(&style, &files, Some(Path::new("work/watermark.txt")));

        let grain = filter.find("noise=").unwrap();
        let caption = filter.find("textfile=work/cap_0.txt").unwrap();
        let mark = filter.find("textfile=work/watermark.txt").unwrap();
        assert!(grain < caption && caption < mark);
        assert!(filter.contains("enable='gte(t,1.000)*lt(t,1.800)'"));
        assert!(filter.contains("y=h*0.08"));
        assert!(filter.contains("fontcolor=white@0.4"));
    }

    #[test]
    fn bare_overlay_is_passthrough() {
        assert_eq!(overlay_filter(&StyleProfile::standard(), &[], None), "null");
    }

    #[tokio::test]
    async fn no_surviving_sources_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = Compositor::new(reqwest::Client::new(), dir.path().join("work"));
        let audio = AudioTrack {
            path: dir.path().join("voice.mp3"),
            duration: 3.0,
        };
        let sources = vec![MediaSource::local(
            dir.path().join("missing.mp4"),
            Orientation::Landscape,
            Origin::LocalStock,
        )];
        let output = dir.path().join("out/job_final.mp4");
        let job = RenderJob {
            audio: &audio,
            sources: &sources,
            captions: &[],
            style: &StyleProfile::standard(),
            vertical: false,
            watermark: "@brand",
            output: &output,
        };

        assert_eq!(compositor.compose_video(&job).await, None);
        assert!(!output.exists());
    }
}
