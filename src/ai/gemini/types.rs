//! Shared Gemini payload types used across the image, video, and prompt modules.

use serde::{Deserialize, Serialize};

/// Gemini content container used in both requests and responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

/// Untagged union of text and inline media content parts.
///
/// Variant order matters for `#[serde(untagged)]` decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

/// Base64 inline payload used for image/reference parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Tool declarations attached to a `generateContent` request. Only the
/// web-search grounding tool is used here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct GoogleSearch {}

/// Top-level `generateContent` response envelope.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

/// Candidate completion item returned by Gemini.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRating {
    pub category: String,
    #[serde(default)]
    pub probability: Option<String>,
}

/// Prompt-level feedback attached when the request itself was blocked.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Long-running operation envelope returned by `predictLongRunning`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<OperationResponse>,
}

#[derive(Debug, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    #[serde(default)]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSample {
    #[serde(default)]
    pub video: Option<Video>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub bytes_base64_encoded: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl GenerateContentResponse {
    /// First inline media part across all candidates, if any.
    pub fn first_inline_data(&self) -> Option<&InlineData> {
        self.candidates.iter().find_map(|c| {
            c.content.as_ref().and_then(|content| {
                content.parts.iter().find_map(|p| match p {
                    Part::InlineData { inline_data } => Some(inline_data),
                    _ => None,
                })
            })
        })
    }

    /// First text part across all candidates, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates.iter().find_map(|c| {
            c.content.as_ref().and_then(|content| {
                content.parts.iter().find_map(|p| match p {
                    Part::Text { text } => Some(text.as_str()),
                    _ => None,
                })
            })
        })
    }

    /// Decoder-level diagnostics for failure messages: finish reasons,
    /// flagged safety categories, and the prompt-feedback block reason.
    pub fn diagnostics(&self) -> String {
        let mut notes = Vec::new();
        for candidate in &self.candidates {
            if let Some(reason) = &candidate.finish_reason {
                notes.push(format!("finish_reason={}", reason));
            }
            for rating in &candidate.safety_ratings {
                if let Some(probability) = &rating.probability {
                    if probability != "NEGLIGIBLE" {
                        notes.push(format!("safety {}={}", rating.category, probability));
                    }
                }
            }
        }
        if let Some(feedback) = &self.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                notes.push(format!("prompt blocked: {}", reason));
            }
        }
        notes.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_untagged_decoding() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "hello" },
                        { "inlineData": { "mimeType": "image/png", "data": "QUJD" } }
                    ]
                }
            }]
        }))
        .unwrap();

        assert_eq!(response.first_text(), Some("hello"));
        assert_eq!(response.first_inline_data().unwrap().mime_type, "image/png");
    }

    #[test]
    fn test_diagnostics_collects_finish_and_safety() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "parts": [] },
                "finishReason": "SAFETY",
                "safetyRatings": [
                    { "category": "HARM_CATEGORY_VIOLENCE", "probability": "HIGH" },
                    { "category": "HARM_CATEGORY_HATE", "probability": "NEGLIGIBLE" }
                ]
            }],
            "promptFeedback": { "blockReason": "OTHER" }
        }))
        .unwrap();

        let diag = response.diagnostics();
        assert!(diag.contains("finish_reason=SAFETY"));
        assert!(diag.contains("HARM_CATEGORY_VIOLENCE=HIGH"));
        assert!(!diag.contains("HARM_CATEGORY_HATE"));
        assert!(diag.contains("prompt blocked: OTHER"));
    }

    #[test]
    fn test_empty_response_decodes() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(response.candidates.is_empty());
        assert!(response.first_inline_data().is_none());
    }

    #[test]
    fn test_operation_envelope_decodes() {
        let op: Operation = serde_json::from_value(serde_json::json!({
            "name": "models/veo-3.1-generate-preview/operations/abc123",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [
                        { "video": { "uri": "https://example.com/video.mp4" } }
                    ]
                }
            }
        }))
        .unwrap();

        assert!(op.done);
        let sample = &op.response.unwrap().generate_video_response.unwrap().generated_samples[0];
        assert_eq!(
            sample.video.as_ref().unwrap().uri.as_deref(),
            Some("https://example.com/video.mp4")
        );
    }
}
