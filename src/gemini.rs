use crate::{config::Ask, log_internal};
use anyhow::{anyhow, Result};

/// Discord allows 2000 characters per message.  Leave some slack.
pub const MESSAGE_CHUNK_CHARS: usize = 1900;

#[derive(serde::Serialize)]
pub struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(serde::Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateRequest {
    pub fn new(question: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: question.to_owned(),
                }],
            }],
        }
    }

    /// The generated text, or None if the model produced nothing.
    pub async fn post(&self, settings: &Ask) -> Result<Option<String>> {
        let url = format!(
            "{}/models/{}:generateContent",
            settings.api_url.trim_end_matches('/'),
            settings.model
        );

        log_internal!("Sending question to {}... ", settings.model);
        let response = reqwest::Client::new()
            .post(&url)
            .query(&[("key", settings.api_key.as_str())])
            .json(self)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Text generation request failed: {}", status));
        }

        let response = response.json::<GenerateResponse>().await?;
        log_internal!("Sending question to {}... done", settings.model);

        Ok(response.text())
    }
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Split text into pieces of at most `max_chars` characters, never inside a character.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for c in text.chars() {
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(c);
        count += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape() {
        let body = serde_json::to_value(GenerateRequest::new("why?")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"contents": [{"parts": [{"text": "why?"}]}]})
        );
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let response: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "Hello "}, {"text": "world"}], "role": "model"}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello world"));
    }

    #[test]
    fn blocked_response_has_no_text() {
        let response: GenerateResponse =
            serde_json::from_value(serde_json::json!({"promptFeedback": {}})).unwrap();
        assert_eq!(response.text(), None);

        let response: GenerateResponse =
            serde_json::from_value(serde_json::json!({"candidates": [{"finishReason": "SAFETY"}]}))
                .unwrap();
        assert_eq!(response.text(), None);
    }

    #[test]
    fn split_respects_limit_and_characters() {
        assert!(split_message("", 5).is_empty());
        assert_eq!(split_message("abcdefg", 3), ["abc", "def", "g"]);
        assert_eq!(split_message("ééé", 2), ["éé", "é"]);

        let long = "x".repeat(MESSAGE_CHUNK_CHARS * 2 + 1);
        let chunks = split_message(&long, MESSAGE_CHUNK_CHARS);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "x");
    }
}
