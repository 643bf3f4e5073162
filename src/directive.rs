//! Script tokenizer.
//!
//! A script interleaves narration with bracketed production cues
//! (`[VISUAL: city at night]`, `[PAUSE]`, `[SFX: bass drop]`) and bare
//! screenplay labels (`INT:`, `VOICE:`). Parsing classifies spans up front so
//! narration can be synthesized from the spoken spans while the cues stay
//! available to later stages.

const LABELS: &[&str] = &["VISUAL", "VOICE", "AUDIO", "SOUND", "INT", "EXT"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Spoken(String),
    /// `[label: body]` or `[body]`.
    Directive { label: Option<String>, body: String },
    /// Bare `LABEL:` prefix outside brackets.
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    raw: String,
    spans: Vec<Span>,
}

impl Script {
    pub fn parse(text: &str) -> Self {
        let mut spans = Vec::new();
        let mut rest = text;

        while !rest.is_empty() {
            let Some(open) = rest.find('[') else {
                push_spoken(&mut spans, rest);
                break;
            };
            let Some(close_rel) = rest[open..].find(']') else {
                // unterminated bracket reads as narration
                push_spoken(&mut spans, rest);
                break;
            };
            push_spoken(&mut spans, &rest[..open]);
            let close = open + close_rel;
            spans.push(directive_span(&rest[open + 1..close]));
            rest = &rest[close + 1..];
        }

        Self {
            raw: text.to_string(),
            spans,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn directives(&self) -> impl Iterator<Item = (Option<&str>, &str)> {
        self.spans.iter().filter_map(|span| match span {
            Span::Directive { label, body } => Some((label.as_deref(), body.as_str())),
            _ => None,
        })
    }

    /// Narration text: spoken spans only, whitespace collapsed.
    pub fn spoken(&self) -> String {
        let mut joined = String::new();
        for span in &self.spans {
            if let Span::Spoken(text) = span {
                joined.push_str(text);
            }
        }
        collapse_whitespace(&remove_labels(&joined))
    }
}

fn push_spoken(spans: &mut Vec<Span>, text: &str) {
    let mut rest = text;
    let mut i = 0;
    while i < rest.len() {
        if let Some(n) = label_at(&rest[i..]) {
            if i > 0 {
                spans.push(Span::Spoken(rest[..i].to_string()));
            }
            spans.push(Span::Label(rest[i..i + n - 1].to_string()));
            rest = &rest[i + n..];
            i = 0;
            continue;
        }
        i += rest[i..].chars().next().map(char::len_utf8).unwrap_or(1);
    }
    if !rest.is_empty() {
        spans.push(Span::Spoken(rest.to_string()));
    }
}

fn directive_span(inner: &str) -> Span {
    match inner.split_once(':') {
        Some((label, body)) if !label.trim().is_empty() => Span::Directive {
            label: Some(label.trim().to_string()),
            body: body.trim().to_string(),
        },
        _ => Span::Directive {
            label: None,
            body: inner.trim().to_string(),
        },
    }
}

/// Byte length of a directive label (including the colon) at the start of `s`.
fn label_at(s: &str) -> Option<usize> {
    LABELS.iter().find_map(|label| {
        let n = label.len();
        let head = s.get(..n)?;
        if head.eq_ignore_ascii_case(label) && s[n..].starts_with(':') {
            Some(n + 1)
        } else {
            None
        }
    })
}

/// Removing one label can splice a new one together ("VISVISUAL:UAL:"),
/// so strip until nothing changes.
fn remove_labels(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut next = String::with_capacity(current.len());
        let mut i = 0;
        while i < current.len() {
            if let Some(n) = label_at(&current[i..]) {
                i += n;
                continue;
            }
            let ch = current[i..].chars().next().unwrap_or(' ');
            next.push(ch);
            i += ch.len_utf8();
        }
        if next == current {
            return next;
        }
        current = next;
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Directive-free narration text for `text`.
pub fn strip_directives(text: &str) -> String {
    Script::parse(text).spoken()
}
