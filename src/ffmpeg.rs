use crate::logw;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use tokio::process::Command;

pub const OUTPUT_FPS: u32 = 24;
pub const VIDEO_CODEC: &str = "libx264";
pub const AUDIO_CODEC: &str = "aac";

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let status = cmd.status().await.context("Command execution failed")?;
    if !status.success() {
        return Err(anyhow::anyhow!("Command failed: {:?}", args));
    }

    Ok(())
}

fn ffmpeg_args() -> Vec<String> {
    ["ffmpeg", "-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn push_all(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

fn push_video_encode(args: &mut Vec<String>) {
    push_all(
        args,
        &["-c:v", VIDEO_CODEC, "-pix_fmt", "yuv420p", "-preset", "veryfast", "-crf", "22"],
    );
    args.push("-r".to_string());
    args.push(OUTPUT_FPS.to_string());
}

fn push_audio_encode(args: &mut Vec<String>) {
    push_all(args, &["-c:a", AUDIO_CODEC, "-b:a", "192k"]);
}

/// Escapes a path or text value for use as a filter option inside a
/// filtergraph (option level first, then graph level).
pub fn escape_filter_value(value: &str) -> String {
    let mut option_level = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(ch);
    }

    let mut out = String::with_capacity(option_level.len());
    for ch in option_level.chars() {
        if matches!(ch, '\\' | '\'' | '[' | ']' | ',' | ';') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

pub async fn ffprobe_video_dimensions(path: &Path) -> Result<(u32, u32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe execution failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let mut parts = text.split('x');
    let w = parts.next().and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(0);
    let h = parts.next().and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(0);

    if w == 0 || h == 0 {
        return Err(anyhow::anyhow!("Invalid dimensions for {}", path.display()));
    }

    Ok((w, h))
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.0 {
        return Err(anyhow::anyhow!("Invalid duration for {}", path.display()));
    }
    Ok(duration)
}

/// Writes an ffmpeg concat-demuxer list. Entries are relative to the list
/// file's directory where possible.
pub async fn write_concat_list(list_txt: &Path, files: &[impl AsRef<Path>]) -> Result<()> {
    let base = list_txt.parent().unwrap_or_else(|| Path::new("."));
    let base_abs = std::path::absolute(base).unwrap_or_else(|_| base.to_path_buf());

    let mut body = String::new();
    for file in files {
        let file = file.as_ref();
        let abs = std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
        let entry = pathdiff::diff_paths(&abs, &base_abs).unwrap_or(abs);
        let escaped = entry.display().to_string().replace('\'', "'\\''");
        body.push_str(&format!("file '{}'\n", escaped));
    }

    fs::write(list_txt, body)
        .await
        .with_context(|| format!("Failed to write concat list {}", list_txt.display()))?;
    Ok(())
}

pub async fn ffmpeg_concat_videos(list_txt: &Path, out_mp4: &Path) -> Result<bool> {
    let mut args = ffmpeg_args();
    push_all(&mut args, &["-f", "concat", "-safe", "0", "-i"]);
    args.push(list_txt.display().to_string());
    push_video_encode(&mut args);
    push_audio_encode(&mut args);
    push_all(&mut args, &["-movflags", "+faststart"]);
    args.push(out_mp4.display().to_string());
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

/// Video-only concat of clips that already share size, codec and frame rate.
pub async fn ffmpeg_concat_silent(list_txt: &Path, out_mp4: &Path) -> Result<bool> {
    let mut args = ffmpeg_args();
    push_all(&mut args, &["-f", "concat", "-safe", "0", "-i"]);
    args.push(list_txt.display().to_string());
    push_all(&mut args, &["-an", "-c", "copy"]);
    args.push(out_mp4.display().to_string());
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

/// Re-encodes one source (video, or a still image held for `still_secs`)
/// through `filter` into a silent clip at the output frame rate.
pub async fn ffmpeg_normalize_clip(
    input: &Path,
    filter: &str,
    still_secs: Option<f64>,
    out_mp4: &Path,
) -> Result<bool> {
    let mut args = ffmpeg_args();
    if still_secs.is_some() {
        push_all(&mut args, &["-loop", "1"]);
    }
    args.push("-i".to_string());
    args.push(input.display().to_string());
    if let Some(secs) = still_secs {
        args.push("-t".to_string());
        args.push(format!("{:.3}", secs));
    }
    push_all(&mut args, &["-vf", filter, "-an"]);
    push_video_encode(&mut args);
    args.push(out_mp4.display().to_string());

    if let Err(err) = run_cmd(&args).await {
        logw(format!("Normalize failed for {}: {}", input.display(), err));
        return Ok(false);
    }
    Ok(out_mp4.exists())
}

/// Mixes narration with music. The music input is looped when `loop_music`
/// is set, cut at `music_secs`, attenuated to `music_volume` and summed with
/// the narration; the result is cut at `narration_secs`.
pub async fn ffmpeg_mix_music(
    narration: &Path,
    music: &Path,
    loop_music: bool,
    music_secs: f64,
    music_volume: f64,
    narration_secs: f64,
    out_m4a: &Path,
) -> Result<bool> {
    let mut args = ffmpeg_args();
    args.push("-i".to_string());
    args.push(narration.display().to_string());
    if loop_music {
        push_all(&mut args, &["-stream_loop", "-1"]);
    }
    args.push("-t".to_string());
    args.push(format!("{:.3}", music_secs));
    args.push("-i".to_string());
    args.push(music.display().to_string());
    args.push("-filter_complex".to_string());
    args.push(format!(
        "[1:a]volume={:.2}[bg];[0:a][bg]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[a]",
        music_volume
    ));
    push_all(&mut args, &["-map", "[a]"]);
    args.push("-t".to_string());
    args.push(format!("{:.3}", narration_secs));
    push_audio_encode(&mut args);
    args.push(out_m4a.display().to_string());
    run_cmd(&args).await?;
    Ok(out_m4a.exists())
}

/// Loops `base_mp4` over `duration_secs`, applies `video_filter` to it and
/// muxes `audio`. Output is exactly `duration_secs` long.
pub async fn ffmpeg_render_composite(
    base_mp4: &Path,
    audio: &Path,
    video_filter: &str,
    duration_secs: f64,
    out_mp4: &Path,
) -> Result<bool> {
    let mut args = ffmpeg_args();
    push_all(&mut args, &["-stream_loop", "-1", "-i"]);
    args.push(base_mp4.display().to_string());
    args.push("-i".to_string());
    args.push(audio.display().to_string());
    args.push("-filter_complex".to_string());
    args.push(format!("[0:v]{}[v]", video_filter));
    push_all(&mut args, &["-map", "[v]", "-map", "1:a"]);
    args.push("-t".to_string());
    args.push(format!("{:.3}", duration_secs));
    push_video_encode(&mut args);
    push_audio_encode(&mut args);
    push_all(&mut args, &["-movflags", "+faststart", "-f", "mp4"]);
    args.push(out_mp4.display().to_string());
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

/// Renders a single frame of `input` through `filter` to an image file.
pub async fn ffmpeg_render_still(input: &Path, filter: &str, out_png: &Path) -> Result<bool> {
    let mut args = ffmpeg_args();
    args.push("-i".to_string());
    args.push(input.display().to_string());
    push_all(&mut args, &["-vf", filter, "-frames:v", "1"]);
    args.push(out_png.display().to_string());
    run_cmd(&args).await?;
    Ok(out_png.exists())
}
