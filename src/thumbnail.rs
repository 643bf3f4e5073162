use crate::api::ImageSynth;
use crate::error::{CallResult, FailureReason};
use crate::ffmpeg;
use crate::naming;
use crate::style::StyleProfile;
use crate::{logi, logok};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

const TITLE_WORDS: usize = 5;
const TITLE_FONT_SIZE: u32 = 120;
const BADGE_COLOR: &str = "0xC5A059";

#[async_trait]
pub trait Thumbnailer: Send + Sync {
    async fn generate(&self, title: &str, style: &StyleProfile) -> CallResult<PathBuf>;
}

pub fn headline(title: &str) -> String {
    title
        .split_whitespace()
        .take(TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub fn backdrop_prompt(title: &str, style: &StyleProfile) -> String {
    format!(
        "{}. {}. Bold, high-contrast, professional YouTube thumbnail style.",
        title, style.aesthetic
    )
}

/// Shade box over the lower half, the headline in the style color, then the
/// gold brand badge in the top-left corner.
pub fn branding_filter(headline_file: &Path, badge_file: &Path, style: &StyleProfile) -> String {
    [
        "drawbox=x=0:y=ih/2:w=iw:h=ih/2:color=black@0.6:t=fill".to_string(),
        format!(
            "drawtext=textfile={}:expansion=none:fontsize={}:fontcolor={}:borderw=4:bordercolor=black:x=(w-text_w)/2:y=h*0.62",
            ffmpeg::escape_filter_value(&headline_file.display().to_string()),
            TITLE_FONT_SIZE,
            style.ffmpeg_color(),
        ),
        format!("drawbox=x=50:y=50:w=400:h=60:color={}:t=fill", BADGE_COLOR),
        format!(
            "drawtext=textfile={}:expansion=none:fontsize=32:fontcolor=black:x=70:y=64",
            ffmpeg::escape_filter_value(&badge_file.display().to_string()),
        ),
    ]
    .join(",")
}

pub struct BrandedThumbnailer {
    images: Arc<dyn ImageSynth>,
    work_dir: PathBuf,
    output_dir: PathBuf,
    brand: String,
}

impl BrandedThumbnailer {
    pub fn new(images: Arc<dyn ImageSynth>, work_dir: PathBuf, output_dir: PathBuf, brand: String) -> Self {
        Self {
            images,
            work_dir,
            output_dir,
            brand,
        }
    }

    pub fn output_path(&self, title: &str) -> PathBuf {
        self.output_dir.join(format!("THUMB_{}.png", naming::underscored(title)))
    }
}

#[async_trait]
impl Thumbnailer for BrandedThumbnailer {
    async fn generate(&self, title: &str, style: &StyleProfile) -> CallResult<PathBuf> {
        let stem = naming::underscored(title);
        fs::create_dir_all(&self.work_dir).await?;
        fs::create_dir_all(&self.output_dir).await?;

        logi(format!("Generating thumbnail backdrop for '{}'", title));
        let backdrop = self.work_dir.join(format!("thumb_bg_{}.png", stem));
        let backdrop = self.images.generate(&backdrop_prompt(title, style), &backdrop).await?;

        let headline_file = self.work_dir.join(format!("thumb_title_{}.txt", stem));
        let badge_file = self.work_dir.join("thumb_badge.txt");
        fs::write(&headline_file, headline(title)).await?;
        fs::write(&badge_file, self.brand.to_uppercase()).await?;

        let out = self.output_path(title);
        let filter = branding_filter(&headline_file, &badge_file, style);
        let rendered = ffmpeg::ffmpeg_render_still(&backdrop, &filter, &out)
            .await
            .map_err(|e| FailureReason::Tool(format!("{:#}", e)))?;
        if !rendered {
            return Err(FailureReason::Empty);
        }

        logok(format!("Thumbnail: {}", out.display()));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoImages;

    #[async_trait]
    impl ImageSynth for NoImages {
        async fn generate(&self, _prompt: &str, _out: &Path) -> CallResult<PathBuf> {
            Err(FailureReason::MissingApiKey("openai"))
        }
    }

    #[test]
    fn headline_is_five_words_upper() {
        assert_eq!(headline("the quiet  rise of digital gold"), "THE QUIET RISE OF DIGITAL");
        assert_eq!(headline("Gold"), "GOLD");
    }

    #[test]
    fn filter_draws_shade_before_text() {
        let mut style = StyleProfile::standard();
        style.color = "#FFD700".to_string();
        let filter = branding_filter(Path::new("t.txt"), Path::new("b.txt"), &style);
        assert!(filter.starts_with("drawbox=x=0:y=ih/2"));
        assert!(filter.contains("fontcolor=0xFFD700"));
        assert!(filter.contains("drawbox=x=50:y=50:w=400:h=60:color=0xC5A059"));
    }

    #[tokio::test]
    async fn backdrop_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let thumbs = BrandedThumbnailer::new(
            Arc::new(NoImages),
            dir.path().join("work"),
            dir.path().join("out"),
            "Matters of Value".to_string(),
        );
        assert_eq!(thumbs.output_path("Gold Rush"), dir.path().join("out/THUMB_Gold_Rush.png"));
        let err = thumbs.generate("Gold Rush", &StyleProfile::standard()).await.unwrap_err();
        assert!(matches!(err, FailureReason::MissingApiKey(_)));
    }
}
