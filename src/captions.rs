use crate::directive::strip_directives;
use serde::Serialize;
use std::fmt::Write as _;

pub const MAX_WORDS_PER_CHUNK: usize = 7;
/// Chunks at or below this length are not shown.
pub const MIN_CHUNK_SECONDS: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionChunk {
    pub text: String,
    pub start_time: f64,
    pub duration: f64,
}

impl CaptionChunk {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Sentences of `text`, split after `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let Some(&(next_idx, next)) = chars.peek() else {
            continue;
        };
        if next.is_whitespace() {
            sentences.push(text[start..next_idx].trim().to_string());
            start = next_idx;
        }
    }
    sentences.push(text[start..].trim().to_string());
    sentences.retain(|s| !s.is_empty());
    sentences
}

/// Splits narration into timed caption chunks under a uniform
/// seconds-per-word rate derived from `total_duration`.
pub fn compute_captions(text: &str, total_duration: f64) -> Vec<CaptionChunk> {
    if !(total_duration > 0.0) {
        return Vec::new();
    }

    let spoken = strip_directives(text);
    let sentences = split_sentences(&spoken);
    let word_count: usize = sentences.iter().map(|s| s.split_whitespace().count()).sum();
    if word_count == 0 {
        return Vec::new();
    }

    let seconds_per_word = total_duration / word_count as f64;
    let mut chunks = Vec::new();
    let mut current = 0.0_f64;

    for sentence in &sentences {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        for group in words.chunks(MAX_WORDS_PER_CHUNK) {
            let mut duration = group.len() as f64 * seconds_per_word;
            if current + duration > total_duration {
                duration = total_duration - current;
            }
            if duration > MIN_CHUNK_SECONDS {
                chunks.push(CaptionChunk {
                    text: group.join(" "),
                    start_time: current,
                    duration,
                });
            }
            current += duration.max(0.0);
        }
    }

    chunks
}

/// Greedy word wrap for on-screen display.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let s = total_sec % 60;
    let total_min = total_sec / 60;
    let m = total_min % 60;
    let h = total_min / 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

pub fn to_srt(chunks: &[CaptionChunk]) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let _ = writeln!(out, "{}", i + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_srt_time(chunk.start_time),
            format_srt_time(chunk.end_time())
        );
        let _ = writeln!(out, "{}", chunk.text);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn nine_words_over_three_point_six_seconds() {
        let chunks = compute_captions("This is a test sentence with eight words total.", 3.6);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "This is a test sentence with eight");
        assert!(approx(chunks[0].start_time, 0.0));
        assert!(approx(chunks[0].duration, 2.8));
        assert_eq!(chunks[1].text, "words total.");
        assert!(approx(chunks[1].start_time, 2.8));
        assert!(approx(chunks[1].duration, 0.8));
        let total: f64 = chunks.iter().map(|c| c.duration).sum();
        assert!(total <= 3.6);
    }

    #[test]
    fn chunks_never_cross_sentence_boundaries() {
        let chunks = compute_captions("One two three. Four five! Six?", 6.0);
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["One two three.", "Four five!", "Six?"]);
    }

    #[test]
    fn directives_do_not_count_as_words() {
        let chunks = compute_captions("[VISUAL: skyline] Hello there. [PAUSE] VOICE: Bye now.", 4.0);
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello there.", "Bye now."]);
        assert!(approx(chunks[1].duration, 2.0));
    }

    #[test]
    fn durations_stay_within_budget_and_ordered() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta iota kappa. \
                    Lambda mu nu xi omicron pi rho sigma tau! Upsilon phi chi psi omega? \
                    A short tail.";
        for &duration in &[0.35, 1.0, 2.5, 7.3, 19.0, 61.2, 240.0] {
            let chunks = compute_captions(text, duration);
            let sum: f64 = chunks.iter().map(|c| c.duration).sum();
            assert!(sum <= duration + 1e-9, "duration {duration}: sum {sum}");
            for pair in chunks.windows(2) {
                assert!(pair[0].end_time() <= pair[1].start_time + 1e-9);
            }
            for chunk in &chunks {
                assert!(chunk.duration > MIN_CHUNK_SECONDS);
                assert!(chunk.text.split_whitespace().count() <= MAX_WORDS_PER_CHUNK);
            }
        }
    }

    #[test]
    fn same_input_same_output() {
        let text = "Deterministic captions. Every single time, without exception, no matter what.";
        assert_eq!(compute_captions(text, 5.5), compute_captions(text, 5.5));
    }

    #[test]
    fn degenerate_durations_produce_nothing() {
        assert!(compute_captions("Some words here.", 0.0).is_empty());
        assert!(compute_captions("Some words here.", -2.0).is_empty());
        assert!(compute_captions("Word.", 0.05).is_empty());
        assert!(compute_captions("[only a cue]", 10.0).is_empty());
    }

    #[test]
    fn sentence_split_requires_trailing_whitespace() {
        assert_eq!(
            split_sentences("v1.2 shipped. Next!"),
            vec!["v1.2 shipped.".to_string(), "Next!".to_string()]
        );
    }

    #[test]
    fn srt_has_millisecond_timestamps() {
        let chunks = vec![CaptionChunk {
            text: "Hello world".to_string(),
            start_time: 61.25,
            duration: 1.5,
        }];
        assert_eq!(to_srt(&chunks), "1\n00:01:01,250 --> 00:01:02,750\nHello world\n\n");
    }

    #[test]
    fn wrap_respects_width() {
        assert_eq!(
            wrap_lines("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
    }
}
