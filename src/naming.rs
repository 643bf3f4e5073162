use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::{Component, Path};

fn unsafe_chars_regex() -> Result<&'static Regex> {
    static UNSAFE_RE: OnceCell<Regex> = OnceCell::new();
    UNSAFE_RE.get_or_try_init(|| {
        Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).context("failed to compile file name regex")
    })
}

fn sanitize(name: &str) -> String {
    match unsafe_chars_regex() {
        Ok(re) => re.replace_all(name, "").into_owned(),
        Err(_) => name.chars().filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-').collect(),
    }
}

/// Title as a file name: spaces become underscores, path-hostile
/// characters are dropped.
pub fn underscored(title: &str) -> String {
    sanitize(&title.trim().replace(' ', "_"))
}

/// Job prefix fragment: the first `max_chars` characters of `text`,
/// underscored.
pub fn file_slug(text: &str, max_chars: usize) -> String {
    let head: String = text.trim().chars().take(max_chars).collect();
    underscored(&head)
}

/// True when `prefix` names exactly one plain directory entry, so that
/// `<parent>/<prefix>` stays a direct child of `<parent>`.
pub fn is_safe_prefix(prefix: &str) -> bool {
    if prefix.trim().is_empty() || prefix.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(prefix).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
