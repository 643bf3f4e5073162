use crate::ffmpeg;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Music level relative to its source.
pub const MUSIC_VOLUME: f64 = 0.1;
/// Music is prepared this far past the narration end.
pub const MUSIC_PAD_SECONDS: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicPlan {
    /// Loop the music input because it is shorter than the narration.
    pub looped: bool,
    /// Length the music is cut to before mixing.
    pub span: f64,
}

pub fn plan_music(narration_secs: f64, music_secs: f64) -> MusicPlan {
    MusicPlan {
        looped: music_secs < narration_secs,
        span: narration_secs + MUSIC_PAD_SECONDS,
    }
}

/// Lays optional background music under the narration. Without usable
/// music the narration comes back unchanged. The result always lasts as
/// long as the narration.
pub async fn compose_audio(narration: &Path, music: Option<&Path>, work_dir: &Path) -> Result<AudioTrack> {
    let duration = ffmpeg::ffprobe_duration_seconds(narration)
        .await
        .with_context(|| format!("Unreadable narration {}", narration.display()))?;
    let unchanged = AudioTrack {
        path: narration.to_path_buf(),
        duration,
    };

    let Some(music) = music else {
        return Ok(unchanged);
    };
    if !tokio::fs::metadata(music).await.map(|m| m.is_file()).unwrap_or(false) {
        logw(format!("Music file missing, using narration only: {}", music.display()));
        return Ok(unchanged);
    }

    let music_secs = match ffmpeg::ffprobe_duration_seconds(music).await {
        Ok(v) => v,
        Err(err) => {
            logw(format!("Unreadable music {}: {}", music.display(), err));
            return Ok(unchanged);
        }
    };

    let plan = plan_music(duration, music_secs);
    logi(format!(
        "Mixing music ({:.1}s{}) under {:.1}s narration",
        music_secs,
        if plan.looped { ", looped" } else { "" },
        duration
    ));

    tokio::fs::create_dir_all(work_dir).await?;
    let out = work_dir.join("mixed_audio.m4a");
    let ok = ffmpeg::ffmpeg_mix_music(narration, music, plan.looped, plan.span, MUSIC_VOLUME, duration, &out).await?;
    if !ok {
        anyhow::bail!("Music mix produced no output");
    }

    logok(format!("Mixed audio: {}", out.display()));
    Ok(AudioTrack { path: out, duration })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_music_is_looped_past_narration() {
        let plan = plan_music(60.0, 25.0);
        assert!(plan.looped);
        assert_eq!(plan.span, 62.0);
    }

    #[test]
    fn long_music_is_trimmed_to_padded_span() {
        let plan = plan_music(30.0, 180.0);
        assert!(!plan.looped);
        assert_eq!(plan.span, 32.0);

        let equal = plan_music(45.0, 45.0);
        assert!(!equal.looped);
    }
}
