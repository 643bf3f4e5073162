use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use faceless_shorts::captions;
use faceless_shorts::config::Config;
use faceless_shorts::init;
use faceless_shorts::studio::{LongFormRequest, ProductionRequest, Studio, Voice};

#[derive(Parser, Debug)]
#[clap(name = "faceless-shorts", about = "Narrated stock-footage video production")]
struct Args {
    /// Configuration file (defaults are used when it does not exist)
    #[clap(long, global = true, default_value = "config.json")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create working directories and a default config file
    Init,
    /// Produce one video from a script
    Produce {
        title: String,
        /// Script file; read from --text when absent
        #[clap(long)]
        script_file: Option<PathBuf>,
        #[clap(long)]
        text: Option<String>,
        #[clap(long, default_value = "video")]
        prefix: String,
        #[clap(long, default_value = "cinematic_documentary")]
        style: String,
        /// Voice name, or "auto" to pick from the script's tone
        #[clap(long, default_value = "auto")]
        voice: String,
        #[clap(long)]
        no_sign_off: bool,
        #[clap(long)]
        no_thumb: bool,
        #[clap(long)]
        enhance: bool,
        #[clap(long)]
        publish: bool,
        #[clap(long)]
        vertical: bool,
    },
    /// Split a long script into chapters and merge them into one feature
    LongForm {
        title: String,
        script_file: PathBuf,
        #[clap(long, default_value = "cinematic_documentary")]
        style: String,
        #[clap(long, default_value = "onyx")]
        voice: String,
        #[clap(long)]
        no_thumb: bool,
        #[clap(long)]
        enhance: bool,
        #[clap(long)]
        publish: bool,
    },
    /// Write a script for a topic and produce it
    Documentary {
        topic: String,
        #[clap(long, default_value = "cinematic_documentary")]
        style: String,
        /// cinematic or value_driven
        #[clap(long)]
        structure: Option<String>,
    },
    /// Write and produce one video per topic with a niche preset
    Niche {
        /// mystery, finance, viral, motivational, or any configured niche
        niche: String,
        #[clap(required = true)]
        topics: Vec<String>,
    },
    /// Produce a video from a script file, titled by its leading # heading
    Script {
        path: PathBuf,
        #[clap(long, default_value = "cinematic_documentary")]
        style: String,
        #[clap(long)]
        vertical: bool,
    },
    /// Print caption timing for a text and narration length
    Captions {
        #[clap(long)]
        text: String,
        #[clap(long)]
        duration: f64,
        /// Print SRT instead of JSON
        #[clap(long)]
        srt: bool,
    },
}

async fn read_script(file: Option<&Path>, text: Option<String>) -> Result<String> {
    match (file, text) {
        (Some(path), _) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read script {}", path.display())),
        (None, Some(text)) => Ok(text),
        (None, None) => anyhow::bail!("Provide --script-file or --text"),
    }
}

async fn studio(cfg: Config) -> Result<Studio> {
    init::ensure_directories(&cfg).await?;
    if !init::check_ffmpeg().await {
        warn!("FFmpeg not found in PATH. Please install FFmpeg.");
    }
    Studio::from_config(Arc::new(cfg))
}

fn report(result: Option<PathBuf>) -> i32 {
    match result {
        Some(path) => {
            info!("Output: {}", path.display());
            0
        }
        None => {
            error!("Production failed; no output written.");
            1
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config).await?;

    let code = match args.command {
        Command::Init => {
            if !args.config.exists() {
                cfg.save(&args.config).await?;
                info!("Wrote default config to {}", args.config.display());
            }
            init::ensure_directories(&cfg).await?;
            if init::check_ffmpeg().await {
                info!("FFmpeg found.");
                0
            } else {
                warn!("FFmpeg not found in PATH. Please install FFmpeg.");
                1
            }
        }
        Command::Produce {
            title,
            script_file,
            text,
            prefix,
            style,
            voice,
            no_sign_off,
            no_thumb,
            enhance,
            publish,
            vertical,
        } => {
            let script = read_script(script_file.as_deref(), text).await?;
            let studio = studio(cfg).await?;
            let mut req = ProductionRequest::new(title, script, prefix);
            req.style = style;
            req.voice = Voice::parse(&voice);
            req.sign_off = !no_sign_off;
            req.generate_thumb = !no_thumb;
            req.enhance_script = enhance;
            req.publish = publish;
            req.vertical = vertical;
            report(studio.produce_video(&req).await)
        }
        Command::LongForm {
            title,
            script_file,
            style,
            voice,
            no_thumb,
            enhance,
            publish,
        } => {
            let script = read_script(Some(script_file.as_path()), None).await?;
            let studio = studio(cfg).await?;
            let mut req = LongFormRequest::new(title, script);
            req.style = style;
            req.voice = Voice::parse(&voice);
            req.generate_thumb = !no_thumb;
            req.enhance_script = enhance;
            req.publish = publish;
            report(studio.produce_long_form(&req).await)
        }
        Command::Documentary { topic, style, structure } => {
            let studio = studio(cfg).await?;
            report(studio.documentary(&topic, &style, structure.as_deref()).await)
        }
        Command::Niche { niche, topics } => {
            let studio = studio(cfg).await?;
            let produced = studio.niche(&niche, &topics).await;
            info!("{}/{} video(s) produced.", produced.len(), topics.len());
            for path in &produced {
                info!("Output: {}", path.display());
            }
            if produced.is_empty() { 1 } else { 0 }
        }
        Command::Script { path, style, vertical } => {
            let studio = studio(cfg).await?;
            report(studio.produce_script_file(&path, &style, vertical).await)
        }
        Command::Captions { text, duration, srt } => {
            let chunks = captions::compute_captions(&text, duration);
            if srt {
                print!("{}", captions::to_srt(&chunks));
            } else {
                println!("{}", serde_json::to_string_pretty(&chunks)?);
            }
            0
        }
    };

    std::process::exit(code);
}
