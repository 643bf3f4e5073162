use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_STYLE: &str = "cinematic_documentary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPosition {
    Top,
    Center,
    Bottom,
}

impl CaptionPosition {
    /// drawtext `y` expression for a caption block.
    pub fn y_expr(self) -> &'static str {
        match self {
            CaptionPosition::Top => "h*0.08",
            CaptionPosition::Center => "(h-text_h)/2",
            CaptionPosition::Bottom => "h-text_h-h*0.08",
        }
    }
}

/// Named visual preset applied to a production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub font: String,
    #[serde(rename = "fontsize")]
    pub font_size: u32,
    pub color: String,
    #[serde(rename = "pos")]
    pub position: CaptionPosition,
    #[serde(default)]
    pub grain: bool,
    #[serde(default = "default_aesthetic")]
    pub aesthetic: String,
    /// Writing brief handed to the script writer.
    #[serde(default)]
    pub prompt: String,
}

fn default_aesthetic() -> String {
    "cinematic".to_string()
}

impl StyleProfile {
    /// Profile used whenever a style name is unknown.
    pub fn standard() -> Self {
        Self {
            font: "Arial-Bold".to_string(),
            font_size: 60,
            color: "white".to_string(),
            position: CaptionPosition::Bottom,
            grain: false,
            aesthetic: default_aesthetic(),
            prompt: String::new(),
        }
    }

    fn preset(font: &str, size: u32, color: &str, pos: CaptionPosition, grain: bool, prompt: &str, aesthetic: &str) -> Self {
        Self {
            font: font.to_string(),
            font_size: size,
            color: color.to_string(),
            position: pos,
            grain,
            aesthetic: aesthetic.to_string(),
            prompt: prompt.to_string(),
        }
    }

    /// drawtext `fontcolor` value; `#RRGGBB` becomes `0xRRGGBB`.
    pub fn ffmpeg_color(&self) -> String {
        match self.color.strip_prefix('#') {
            Some(hex) => format!("0x{}", hex),
            None => self.color.clone(),
        }
    }
}

pub fn default_styles() -> BTreeMap<String, StyleProfile> {
    use CaptionPosition::*;

    let mut styles = BTreeMap::new();
    styles.insert(
        "cinematic_documentary".to_string(),
        StyleProfile::preset(
            "Courier-Bold",
            60,
            "white",
            Bottom,
            true,
            "Write a 90-second professional documentary script. Short sentences. High suspense.",
            "cinematic moody lighting, tech server, mysterious dark technology",
        ),
    );
    styles.insert(
        "finance_wealth".to_string(),
        StyleProfile::preset(
            "Georgia-Bold",
            75,
            "#FFD700",
            Top,
            false,
            "Professional finance script. Sophisticated and wealth-focused.",
            "luxury office, stock market charts, gold bars, city skyline",
        ),
    );
    styles.insert(
        "breaking_viral".to_string(),
        StyleProfile::preset(
            "Impact",
            70,
            "#FF4500",
            Top,
            false,
            "Breaking news script. High urgency. Short punchy lines.",
            "breaking news studio, flashing red alerts, global map background",
        ),
    );
    styles.insert(
        "motivational".to_string(),
        StyleProfile::preset(
            "Arial-Bold",
            65,
            "#FFFFFF",
            Center,
            false,
            "Inspirational motivational script. Action-driving. Emotional peaks.",
            "sunrise mountain, athlete running, golden hour light",
        ),
    );
    styles.insert(
        "music_video".to_string(),
        StyleProfile::preset(
            "Impact",
            80,
            "#00FF00",
            Center,
            true,
            "",
            "neon city, fast cars, abstract glitch, rave party, strobe lights",
        ),
    );
    styles
}

/// Looks up `name`, falling back to [`StyleProfile::standard`].
pub fn lookup<'a>(styles: &'a BTreeMap<String, StyleProfile>, name: &str) -> std::borrow::Cow<'a, StyleProfile> {
    match styles.get(name) {
        Some(style) => std::borrow::Cow::Borrowed(style),
        None => std::borrow::Cow::Owned(StyleProfile::standard()),
    }
}
