use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

pub mod api;
pub mod audio;
pub mod captions;
pub mod compositor;
pub mod config;
pub mod directive;
pub mod error;
pub mod ffmpeg;
pub mod init;
pub mod media;
pub mod music;
pub mod naming;
pub mod publish;
pub mod studio;
pub mod style;
pub mod thumbnail;

pub use error::{CallResult, FailureReason};
pub use studio::{ProductionRequest, Studio};

pub type StudioLogHook = Arc<Mutex<dyn Fn(&str) + Send + Sync + 'static>>;

static LOG_HOOK: Lazy<Mutex<Option<StudioLogHook>>> = Lazy::new(|| Mutex::new(None));

/// Installs a callback that receives every tagged log line, e.g. so a
/// background task runner can keep a per-job transcript.
pub fn set_log_hook(hook: Option<StudioLogHook>) {
    if let Ok(mut guard) = LOG_HOOK.lock() {
        *guard = hook;
    }
}

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!("{}", message),
        _ => tracing::info!("[{}] {}", tag, message),
    }

    if let Ok(guard) = LOG_HOOK.lock() {
        if let Some(hook) = guard.as_ref() {
            if let Ok(callback) = hook.lock() {
                let line = format!("[{}] {}", tag, message);
                callback(&line);
            }
        }
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
