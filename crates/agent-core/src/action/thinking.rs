use once_cell::sync::Lazy;
use regex::Regex;

struct TagSet {
    think_open: &'static str,
    think_close: &'static str,
    answer_open: &'static str,
    answer_close: &'static str,
}

const TAG_SETS: [TagSet; 2] = [
    TagSet {
        think_open: "<think>",
        think_close: "</think>",
        answer_open: "<answer>",
        answer_close: "</answer>",
    },
    TagSet {
        think_open: "[THINK-START]",
        think_close: "[THINK-END]",
        answer_open: "[ANSWER-START]",
        answer_close: "[ANSWER-END]",
    },
];

static ACTION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^A-Za-z0-9_])(do|finish)\s*\(").expect("marker regex"));

/// Separate the model's free-form reasoning from the part holding the call.
///
/// Explicit think/answer tags win. Without tags, everything before the first
/// `do(`/`finish(` marker is treated as thinking. The answer is never empty
/// unless the reply itself is.
pub fn split_thinking_and_answer(text: &str) -> (Option<String>, String) {
    for tags in &TAG_SETS {
        if let Some(split) = split_tagged(text, tags) {
            return split;
        }
    }

    if let Some(marker) = ACTION_MARKER.captures(text).and_then(|caps| caps.get(1)) {
        let (thinking, answer) = text.split_at(marker.start());
        return (non_empty(thinking), answer.trim().to_string());
    }

    (None, text.trim().to_string())
}

fn split_tagged(text: &str, tags: &TagSet) -> Option<(Option<String>, String)> {
    if let Some(answer_start) = text.find(tags.answer_open) {
        let body = &text[answer_start + tags.answer_open.len()..];
        let answer = body
            .find(tags.answer_close)
            .map_or(body, |end| &body[..end]);

        let before = &text[..answer_start];
        let thinking = match before.find(tags.think_open) {
            Some(open) => {
                let inner = &before[open + tags.think_open.len()..];
                inner.find(tags.think_close).map_or(inner, |end| &inner[..end])
            }
            None => before.strip_suffix(tags.think_close).unwrap_or(before),
        };
        return Some((non_empty(thinking), answer.trim().to_string()));
    }

    let close = text.find(tags.think_close)?;
    let before = &text[..close];
    let thinking = before
        .find(tags.think_open)
        .map_or(before, |open| &before[open + tags.think_open.len()..]);
    let answer = &text[close + tags.think_close.len()..];
    Some((non_empty(thinking), answer.trim().to_string()))
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
