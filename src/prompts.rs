pub const NO_TEXT_GUARD: &str = include_str!("data/prompts/no_text_guard.txt");
pub const GRID_MULTI: &str = include_str!("data/prompts/grid_multi.txt");
pub const GRID_2X2: &str = include_str!("data/prompts/grid_2x2.txt");
pub const CONSISTENCY_GUARD: &str = include_str!("data/prompts/consistency_guard.txt");
pub const INPAINTING: &str = include_str!("data/prompts/inpainting.txt");
pub const IMAGE_PROMPT_SYSTEM: &str = include_str!("data/prompts/image_prompt_system.txt");
pub const VIDEO_PROMPT_SYSTEM: &str = include_str!("data/prompts/video_prompt_system.txt");
pub const PROMPT_USER: &str = include_str!("data/prompts/prompt_user.txt");
pub const MERGE_SYSTEM: &str = include_str!("data/prompts/merge_system.txt");
pub const MERGE_USER: &str = include_str!("data/prompts/merge_user.txt");

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}
