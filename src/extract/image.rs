//! Image-path prompt extraction
//!
//! Collapses a multi-section script into a single still-image prompt:
//! only visually relevant sections survive, dialogue and sound are
//! dropped, and a fixed no-text instruction is prepended.

use super::{
    is_denied_line, normalize_whitespace, strip_markers, style_section_re, truncate_chars,
};
use crate::prompts;
use regex::Regex;
use std::sync::OnceLock;

pub const MAX_IMAGE_PROMPT_CHARS: usize = 1800;

/// Section labels that describe visual content.
const ALLOWED_SECTIONS: [&str; 5] = ["style", "scene", "cinematography", "action", "actions"];

/// Explicit multi-panel requests.
const GRID_TERMS: [&str; 5] = ["multi-shot", "multishot", "multi shot", "split image", "grid"];

/// Cues that the user wants exactly four panels.
const FOUR_PANEL_TERMS: [&str; 6] = ["2x2", "2×2", "4분할", "4 panel", "4 panels", "four panels"];

fn numbered_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // e.g. "4분할" / "4 분할" (Korean "N-way split")
    RE.get_or_init(|| Regex::new(r"\d+\s*분할").expect("split-count regex should compile"))
}

fn section_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*([A-Za-z][A-Za-z \-]{0,30}?)\s*:\s*(.*)$")
            .expect("section header regex should compile")
    })
}

fn grid_requested(text: &str) -> bool {
    let lower = text.to_lowercase();
    GRID_TERMS.iter().any(|term| lower.contains(term)) || numbered_split_re().is_match(text)
}

fn four_panels_requested(text: &str) -> bool {
    let lower = text.to_lowercase();
    FOUR_PANEL_TERMS.iter().any(|term| lower.contains(term))
}

/// Keep only the first scenario block when the script repeats `style:`.
fn truncate_to_first_scenario(text: &str) -> String {
    let mut starts = style_section_re().find_iter(text);
    starts.next();
    match starts.next() {
        Some(second) => text[..second.start()].to_string(),
        None => text.to_string(),
    }
}

/// Extract content of allow-listed labeled sections, in order of appearance.
/// Returns `None` when the text has no labeled sections at all.
fn extract_sections(text: &str) -> Option<Vec<String>> {
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut found_any = false;

    for line in text.lines() {
        if let Some(caps) = section_header_re().captures(line) {
            found_any = true;
            let label = caps[1].trim().to_lowercase();
            let content = caps[2].trim().to_string();
            sections.push((label, content));
        } else if let Some((_, content)) = sections.last_mut() {
            // Continuation line of the current section.
            if !line.trim().is_empty() {
                content.push(' ');
                content.push_str(line.trim());
            }
        }
    }

    if !found_any {
        return None;
    }

    let kept: Vec<String> = sections
        .into_iter()
        .filter(|(label, content)| {
            ALLOWED_SECTIONS.contains(&label.as_str()) && !content.is_empty()
        })
        .map(|(_, content)| content)
        .collect();

    Some(kept)
}

/// Keyword fallback for unlabeled text: drop audio/timing/editing lines.
fn filter_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_denied_line(line))
        .map(str::to_string)
        .collect()
}

/// Derive a still-image prompt from a possibly mixed-purpose script.
///
/// Non-empty input never yields an empty prompt: when filtering removes
/// everything, the raw text is passed through truncated.
pub fn extract_image_prompt(raw: &str) -> String {
    let stripped = strip_markers(raw);
    let grid = grid_requested(&stripped);

    let scoped = if !grid && style_section_re().find_iter(&stripped).count() > 1 {
        truncate_to_first_scenario(&stripped)
    } else {
        stripped
    };

    let parts = match extract_sections(&scoped) {
        Some(sections) if !sections.is_empty() => sections,
        _ => filter_lines(&scoped),
    };

    let body = normalize_whitespace(&parts.join(", "));
    if body.is_empty() {
        return truncate_chars(raw.trim(), MAX_IMAGE_PROMPT_CHARS);
    }

    let mut prompt = String::new();
    if grid {
        let grid_instruction = if four_panels_requested(&scoped) {
            prompts::GRID_2X2
        } else {
            prompts::GRID_MULTI
        };
        prompt.push_str(grid_instruction.trim());
        prompt.push(' ');
    }
    prompt.push_str(prompts::NO_TEXT_GUARD.trim());
    prompt.push(' ');
    prompt.push_str(&body);

    truncate_chars(&normalize_whitespace(&prompt), MAX_IMAGE_PROMPT_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_style_section_keeps_visuals_drops_dialogue() {
        let raw = "Style: noir\nScene: rainy street\nDialogue: hello";
        let prompt = extract_image_prompt(raw);

        assert!(!prompt.is_empty());
        assert!(prompt.chars().count() <= MAX_IMAGE_PROMPT_CHARS);
        assert!(prompt.contains("noir"));
        assert!(prompt.contains("rainy street"));
        assert!(!prompt.contains("hello"));
    }

    #[test]
    fn test_multiple_styles_truncate_to_first_scenario() {
        let raw = "Style: noir\nScene: rainy street\nStyle: pastel\nScene: sunny beach";
        let prompt = extract_image_prompt(raw);

        assert!(prompt.contains("noir"));
        assert!(prompt.contains("rainy street"));
        assert!(!prompt.contains("pastel"));
        assert!(!prompt.contains("sunny beach"));
    }

    #[test]
    fn test_grid_keyword_keeps_all_scenarios() {
        let raw = "multi-shot\nStyle: noir\nScene: street\nStyle: pastel\nScene: beach";
        let prompt = extract_image_prompt(raw);

        assert!(prompt.contains("noir"));
        assert!(prompt.contains("pastel"));
        assert!(prompt.contains("multi-shot grid"));
    }

    #[test]
    fn test_korean_split_count_triggers_four_panel_grid() {
        let raw = "4분할\nStyle: watercolor\nScene: a garden";
        let prompt = extract_image_prompt(raw);

        assert!(prompt.contains("exactly four panels"));
        assert!(prompt.contains("watercolor"));
    }

    #[test]
    fn test_unlabeled_text_uses_line_filter() {
        let raw = "a fox in the snow\nBGM: orchestral swell\ndetailed fur";
        let prompt = extract_image_prompt(raw);

        assert!(prompt.contains("a fox in the snow"));
        assert!(prompt.contains("detailed fur"));
        assert!(!prompt.contains("orchestral"));
    }

    #[test]
    fn test_fully_filtered_input_falls_back_to_raw() {
        let raw = "BGM: drums\nSFX: rain";
        let prompt = extract_image_prompt(raw);

        assert!(!prompt.is_empty());
        assert_eq!(prompt, raw);
    }

    #[test]
    fn test_output_truncated_to_limit() {
        let raw = format!("Scene: {}", "very long description ".repeat(200));
        let prompt = extract_image_prompt(&raw);
        assert!(prompt.chars().count() <= MAX_IMAGE_PROMPT_CHARS);
    }

    #[test]
    fn test_no_text_guard_always_prepended() {
        let prompt = extract_image_prompt("Scene: a quiet harbor");
        assert!(prompt.contains("watermarks"));
    }

    #[test]
    fn test_dialogue_section_dropped_even_multiline() {
        let raw = "Scene: a castle\nDialogue: we ride at dawn\nmore spoken lines\nStyle: epic";
        let prompt = extract_image_prompt(raw);

        assert!(prompt.contains("castle"));
        assert!(prompt.contains("epic"));
        assert!(!prompt.contains("we ride at dawn"));
        assert!(!prompt.contains("more spoken lines"));
    }
}
