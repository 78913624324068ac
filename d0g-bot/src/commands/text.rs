//! Mention tokens and reason and quote normalization

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest reason kept, in characters, before the ellipsis
pub const MAX_REASON_CHARS: usize = 100;
/// Longest quote kept, in characters, before the ellipsis
pub const MAX_QUOTE_CHARS: usize = 500;
const ELLIPSIS: &str = "...";

static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<@!?(\d+)>$").unwrap());

/// Extract the user id from `<@123>` or `<@!123>` (nickname form).
/// Returns None when the token is not a mention.
pub fn uid_from_mention(token: &str) -> Option<&str> {
    MENTION_RE
        .captures(token.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Split off the first whitespace-delimited token, returning it and the rest
pub fn next_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(end) => Some((&input[..end], &input[end..])),
        None => Some((input, "")),
    }
}

/// Whitespace at either end and backslashes at the end, which would
/// otherwise escape whatever markup the reason is wrapped in
fn trim_reason(input: &str) -> &str {
    input
        .trim_start()
        .trim_end_matches(|c: char| c.is_whitespace() || c == '\\')
}

/// Carriage returns are dropped and every other control character becomes a space
fn strip_controls(input: &str, drop: impl Fn(char) -> bool) -> String {
    input
        .chars()
        .filter(|&c| c != '\r' && !drop(c))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Cut `cleaned` to `max` characters and mark the cut with `...`. A trailing
/// `...` does not count toward the limit, so cutting twice is a no-op.
fn cap_length(cleaned: &str, max: usize, trim: fn(&str) -> &str) -> String {
    let body = cleaned.strip_suffix(ELLIPSIS).unwrap_or(cleaned);
    if body.chars().count() <= max {
        return cleaned.to_string();
    }

    let truncated: String = body.chars().take(max).collect();
    format!("{}{}", trim(&truncated), ELLIPSIS)
}

/// Make a reason safe to show inside inline code and to use as a key.
///
/// Backticks and carriage returns are dropped, newlines and other control
/// characters become spaces, and anything past [`MAX_REASON_CHARS`] is cut
/// and marked with `...`. Normalizing twice is a no-op.
pub fn normalize_reason(input: &str) -> String {
    let cleaned = strip_controls(input, |c| c == '`');
    cap_length(trim_reason(&cleaned), MAX_REASON_CHARS, trim_reason)
}

/// Quote text as stored: one line with no control characters, trimmed, and
/// at most [`MAX_QUOTE_CHARS`] characters before the `...` marker.
pub fn normalize_quote(input: &str) -> String {
    let cleaned = strip_controls(input, |_| false);
    cap_length(cleaned.trim(), MAX_QUOTE_CHARS, str::trim)
}
