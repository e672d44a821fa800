//! Video-path prompt extraction
//!
//! Unlike the image path, multi-scene structure is preserved: the
//! execution region is segmented into discrete scenes, each scene is
//! stripped of non-visual lines, and the scenes are distributed evenly
//! across the target duration as timestamped directives.

use super::{
    is_denied_line, normalize_whitespace, style_section_re, truncate_chars, EXECUTION_MARKER,
    NODE_MARKER, UPSTREAM_MARKER,
};
use crate::prompts;
use regex::Regex;
use std::sync::OnceLock;

pub const MAX_VIDEO_PROMPT_CHARS: usize = 2500;

/// More scenes than this overload the model; the excess is dropped.
const MAX_SCENES: usize = 6;

fn scene_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Numbered markers ("1.", "2)"), bullets, and localized scene labels.
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:\d+\s*[.):]|[-*•]|scene\s*\d+|장면\s*\d*|씬\s*\d*)")
            .expect("scene marker regex should compile")
    })
}

/// The three context regions delimited by the UI marker tags.
#[derive(Debug, Default)]
struct Regions {
    upstream: String,
    node: String,
    execution: String,
}

fn region_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.split(marker).nth(1)
}

fn region_before_markers(text: &str) -> &str {
    let mut end = text.len();
    for marker in [UPSTREAM_MARKER, NODE_MARKER, EXECUTION_MARKER] {
        if let Some(idx) = text.find(marker) {
            end = end.min(idx);
        }
    }
    &text[..end]
}

fn split_regions(text: &str) -> Regions {
    let mut regions = Regions::default();

    if let Some(tail) = region_after(text, UPSTREAM_MARKER) {
        regions.upstream = region_before_markers(tail).to_string();
    }
    if let Some(tail) = region_after(text, NODE_MARKER) {
        regions.node = region_before_markers(tail).to_string();
    }
    match region_after(text, EXECUTION_MARKER) {
        Some(tail) => regions.execution = tail.to_string(),
        // With no execution marker the whole unmarked text is the execution
        // region; marked upstream/node regions were already pulled out.
        None => regions.execution = region_before_markers(text).to_string(),
    }

    regions
}

/// Segment the execution text into scenes by line-prefix markers.
fn split_scenes(text: &str) -> Vec<String> {
    let mut scenes: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if scene_marker_re().is_match(line) {
            if !current.trim().is_empty() {
                scenes.push(current.clone());
            }
            current.clear();
            current.push_str(scene_marker_re().replace(line, "").trim());
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    if !current.trim().is_empty() {
        scenes.push(current);
    }

    scenes
}

/// Fallback segmentation: treat each `style:` occurrence as a scene start.
fn split_on_style(text: &str) -> Vec<String> {
    let starts: Vec<usize> = style_section_re()
        .find_iter(text)
        .map(|m| m.start())
        .collect();
    if starts.len() < 2 {
        return vec![text.to_string()];
    }

    let mut scenes = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        scenes.push(text[start..end].to_string());
    }
    scenes
}

fn clean_scene(scene: &str) -> String {
    let kept: Vec<&str> = scene
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_denied_line(line))
        .collect();
    normalize_whitespace(&kept.join(" "))
}

/// Derive a multi-scene video prompt with timestamped scene windows
/// covering `[0, duration_secs]` contiguously.
pub fn extract_video_prompt(raw: &str, duration_secs: u32) -> String {
    let regions = split_regions(raw);

    let mut scenes = split_scenes(&regions.execution);
    if scenes.len() < 2 {
        scenes = split_on_style(&regions.execution);
    }

    let mut cleaned: Vec<String> = scenes
        .iter()
        .map(|scene| clean_scene(scene))
        .filter(|scene| !scene.is_empty())
        .collect();
    cleaned.truncate(MAX_SCENES);

    if cleaned.is_empty() {
        return truncate_chars(raw.trim(), MAX_VIDEO_PROMPT_CHARS);
    }

    let count = cleaned.len() as u32;
    let window = (duration_secs / count).max(1);

    let mut directives: Vec<String> = Vec::with_capacity(cleaned.len());
    for (i, scene) in cleaned.iter().enumerate() {
        let i = i as u32;
        let start = (i * window).min(duration_secs);
        let end = if i + 1 == count {
            duration_secs
        } else {
            ((i + 1) * window).min(duration_secs)
        };
        directives.push(format!("[{}s-{}s] {}", start, end, scene));
    }

    let context = normalize_whitespace(&format!("{} {}", regions.upstream, regions.node));
    let mut prompt = String::new();
    if !context.is_empty() {
        prompt.push_str(&prompts::render(
            prompts::CONSISTENCY_GUARD,
            &[("context", &context)],
        ));
        prompt.push('\n');
    }
    prompt.push_str(&directives.join("\n"));

    truncate_chars(prompt.trim(), MAX_VIDEO_PROMPT_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive_windows(prompt: &str) -> Vec<(u32, u32)> {
        let re = Regex::new(r"\[(\d+)s-(\d+)s\]").unwrap();
        re.captures_iter(prompt)
            .map(|c| (c[1].parse().unwrap(), c[2].parse().unwrap()))
            .collect()
    }

    #[test]
    fn test_numbered_scenes_get_contiguous_windows() {
        let raw = "1. a knight rides out\n2. a storm gathers\n3. the castle gate falls";
        let prompt = extract_video_prompt(raw, 12);

        let windows = directive_windows(&prompt);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].0, 0);
        assert_eq!(windows.last().unwrap().1, 12);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn test_scene_cap_at_six() {
        let raw = (1..=9)
            .map(|i| format!("{}. scene number {}", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = extract_video_prompt(&raw, 8);

        let windows = directive_windows(&prompt);
        assert_eq!(windows.len(), 6);
        assert_eq!(windows[0].0, 0);
        assert_eq!(windows.last().unwrap().1, 8);
        assert!(!prompt.contains("scene number 7"));
    }

    #[test]
    fn test_style_fallback_when_no_numbered_scenes() {
        let raw = "Style: noir\na dark alley\nStyle: pastel\na sunny meadow";
        let prompt = extract_video_prompt(raw, 8);

        let windows = directive_windows(&prompt);
        assert_eq!(windows.len(), 2);
        assert!(prompt.contains("dark alley"));
        assert!(prompt.contains("sunny meadow"));
    }

    #[test]
    fn test_single_scene_spans_full_duration() {
        let raw = "a lighthouse in a storm";
        let prompt = extract_video_prompt(raw, 8);

        let windows = directive_windows(&prompt);
        assert_eq!(windows, vec![(0, 8)]);
    }

    #[test]
    fn test_audio_lines_filtered_from_scenes() {
        let raw = "1. a parade downtown\nBGM: brass band\n2. confetti falls";
        let prompt = extract_video_prompt(raw, 8);

        assert!(prompt.contains("parade"));
        assert!(prompt.contains("confetti"));
        assert!(!prompt.contains("brass band"));
    }

    #[test]
    fn test_global_context_prepended_with_consistency_rule() {
        let raw = "[UPSTREAM CONTEXT] a red-haired detective [EXECUTION]\n1. she enters the bar\n2. she spots the suspect";
        let prompt = extract_video_prompt(raw, 8);

        assert!(prompt.contains("red-haired detective"));
        assert!(prompt.contains("consistent with the global context"));
        let windows = directive_windows(&prompt);
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn test_fully_filtered_input_falls_back_to_raw() {
        let raw = "BGM: strings\nSFX: thunder";
        let prompt = extract_video_prompt(raw, 8);
        assert_eq!(prompt, raw);
    }

    #[test]
    fn test_output_truncated_to_limit() {
        let raw = (1..=6)
            .map(|i| format!("{}. {}", i, "long scene description ".repeat(50)))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = extract_video_prompt(&raw, 8);
        assert!(prompt.chars().count() <= MAX_VIDEO_PROMPT_CHARS);
    }

    #[test]
    fn test_localized_scene_markers() {
        let raw = "장면 1 광장의 아침\n장면 2 해질녘의 항구";
        let prompt = extract_video_prompt(raw, 8);
        assert_eq!(directive_windows(&prompt).len(), 2);
    }
}
