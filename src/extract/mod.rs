//! Prompt extraction for mixed-purpose script text
//!
//! Inbound prompts often arrive as full shooting scripts: labeled sections,
//! dialogue, timing cues, and UI context markers. These modules derive a
//! medium-focused prompt (image-only or video-only) from that text by
//! pattern matching; everything non-visual is dropped.

pub mod image;
pub mod video;

pub use image::extract_image_prompt;
pub use video::extract_video_prompt;

use regex::Regex;
use std::sync::OnceLock;

/// Bracketed UI context markers injected by the node editor.
pub const UPSTREAM_MARKER: &str = "[UPSTREAM CONTEXT]";
pub const NODE_MARKER: &str = "[NODE PROMPT]";
pub const EXECUTION_MARKER: &str = "[EXECUTION]";

/// Lines containing any of these are audio/timing/editing directions,
/// not visual content.
const DENY_TERMS: [&str; 14] = [
    "dialogue",
    "dialog",
    "narration",
    "voiceover",
    "voice-over",
    "sound",
    "bgm",
    "sfx",
    "audio",
    "music",
    "timecode",
    "timestamp",
    "fade in",
    "fade out",
];

pub(crate) fn style_section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*style\s*:").expect("style regex should compile"))
}

pub(crate) fn is_denied_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    DENY_TERMS.iter().any(|term| lower.contains(term))
}

/// Remove the bracketed UI marker tags, keeping the surrounding text.
pub(crate) fn strip_markers(text: &str) -> String {
    text.replace(UPSTREAM_MARKER, " ")
        .replace(NODE_MARKER, " ")
        .replace(EXECUTION_MARKER, " ")
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters without splitting a code point.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_lines() {
        assert!(is_denied_line("Dialogue: hello there"));
        assert!(is_denied_line("  BGM: soft jazz"));
        assert!(is_denied_line("fade in from black"));
        assert!(!is_denied_line("a rainy street at night"));
    }

    #[test]
    fn test_strip_markers_removes_tags_only() {
        let stripped = strip_markers("[NODE PROMPT] a cat [EXECUTION] runs");
        assert!(!stripped.contains("[NODE PROMPT]"));
        assert!(stripped.contains("a cat"));
        assert!(stripped.contains("runs"));
    }

    #[test]
    fn test_truncate_chars_respects_multibyte() {
        let text = "가나다라마";
        assert_eq!(truncate_chars(text, 3), "가나다");
        assert_eq!(truncate_chars(text, 10), text);
    }

    #[test]
    fn test_style_section_re_is_case_insensitive() {
        assert!(style_section_re().is_match("STYLE: noir"));
        assert!(style_section_re().is_match("  style : gritty"));
        assert!(!style_section_re().is_match("lifestyle: modern"));
    }
}
