use crate::logi;
use crate::media::list_files_with_ext;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

pub const DEFAULT_TRACK: &str = "default_background.mp3";

fn now_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Mood folder for a narration voice.
pub fn category_for_voice(voice: &str) -> &'static str {
    match voice.to_ascii_lowercase().as_str() {
        "onyx" | "fable" => "mystery",
        "alloy" => "finance",
        "echo" => "action",
        "nova" | "shimmer" => "peaceful",
        _ => "mystery",
    }
}

/// Random track from the voice's mood folder, else the default track,
/// else nothing.
pub async fn select_music(music_dir: &Path, voice: &str) -> Option<PathBuf> {
    let category = category_for_voice(voice);
    let tracks = list_files_with_ext(&music_dir.join(category), &["mp3"])
        .await
        .unwrap_or_default();

    let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());
    if let Some(track) = tracks.choose(&mut rng) {
        logi(format!("Music ({}): {}", category, track.display()));
        return Some(track.clone());
    }

    let fallback = music_dir.join(DEFAULT_TRACK);
    if fs::metadata(&fallback).await.map(|m| m.is_file()).unwrap_or(false) {
        logi(format!("Music ({}): default track", category));
        return Some(fallback);
    }

    logi(format!("No music found for '{}'", category));
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voices_map_to_moods() {
        assert_eq!(category_for_voice("onyx"), "mystery");
        assert_eq!(category_for_voice("Fable"), "mystery");
        assert_eq!(category_for_voice("alloy"), "finance");
        assert_eq!(category_for_voice("echo"), "action");
        assert_eq!(category_for_voice("shimmer"), "peaceful");
        assert_eq!(category_for_voice("narrator_uk"), "mystery");
    }

    #[tokio::test]
    async fn picks_from_the_mood_folder() {
        let dir = tempfile::tempdir().unwrap();
        let finance = dir.path().join("finance");
        std::fs::create_dir_all(&finance).unwrap();
        std::fs::write(finance.join("a.mp3"), b"x").unwrap();
        std::fs::write(finance.join("b.MP3"), b"x").unwrap();
        std::fs::write(finance.join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join(DEFAULT_TRACK), b"x").unwrap();

        let track = select_music(dir.path(), "alloy").await.unwrap();
        assert_eq!(track.parent(), Some(finance.as_path()));
        assert_ne!(track.file_name().unwrap(), "notes.txt");
    }

    #[tokio::test]
    async fn mood_folder_subdirectories_are_not_tracks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("action/stems.mp3")).unwrap();
        assert_eq!(select_music(dir.path(), "echo").await, None);
    }

    #[tokio::test]
    async fn falls_back_to_default_then_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(select_music(dir.path(), "echo").await, None);

        std::fs::write(dir.path().join(DEFAULT_TRACK), b"x").unwrap();
        assert_eq!(select_music(dir.path(), "echo").await, Some(dir.path().join(DEFAULT_TRACK)));
    }
}
