use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::env;

use crate::error::{Error, Result};

const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";
const FALLBACK_REPLY: &str = "Sorry, I couldn't process that request.";

#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationOptions {
    pub fn chat() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 500,
        }
    }

    /// The insights flow asks for five sections; give it room.
    pub fn insights() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 2000,
        }
    }
}

#[async_trait]
pub trait GeminiApi: Send + Sync {
    async fn ask(&self, prompt: &str, options: GenerationOptions) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn from_env() -> Self {
        Self {
            client: Client::new(),
            api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

#[async_trait]
impl GeminiApi for GeminiClient {
    async fn ask(&self, prompt: &str, options: GenerationOptions) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(Error::Configuration("GEMINI_API_KEY"))?;
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": options.temperature,
                "maxOutputTokens": options.max_output_tokens,
            }
        });
        let res = self
            .client
            .post(format!("{GEMINI_ENDPOINT}?key={api_key}"))
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(Error::Provider(format!("{status}: {text}")));
        }
        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Provider(format!("bad response body: {e}")))?;
        let answer = first_candidate_text(parsed)
            .ok_or_else(|| Error::Provider("response carried no candidate text".to_string()))?;
        if answer.trim().is_empty() {
            return Ok(FALLBACK_REPLY.to_string());
        }
        Ok(answer)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn first_candidate_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts?
        .into_iter()
        .next()?
        .text
}

pub fn insights_prompt(title: &str, year: &str) -> String {
    format!(
        "Tell me about the movie \"{title}\" ({year}). Structure the answer in five sections:\n\
         1. Background: production history and where the film came from.\n\
         2. Achievements: awards, nominations and box office milestones.\n\
         3. Reception: what critics and audiences made of it.\n\
         4. Interesting facts: behind-the-scenes trivia.\n\
         5. Recommendation: who should watch it and why."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_a_configuration_error() {
        let client = GeminiClient {
            client: Client::new(),
            api_key: None,
        };
        let err = client.ask("hi", GenerationOptions::chat()).await.unwrap_err();
        assert!(matches!(err, Error::Configuration("GEMINI_API_KEY")));
    }

    #[test]
    fn candidate_text_extraction_handles_sparse_shapes() {
        let full: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"An answer."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(first_candidate_text(full).as_deref(), Some("An answer."));

        let empty: GenerateResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(first_candidate_text(empty).is_none());

        let no_parts: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{}}]}"#).unwrap();
        assert!(first_candidate_text(no_parts).is_none());
    }

    #[test]
    fn insights_prompt_names_all_five_sections() {
        let prompt = insights_prompt("The Matrix", "1999");
        assert!(prompt.contains("The Matrix"));
        assert!(prompt.contains("(1999)"));
        for section in [
            "Background",
            "Achievements",
            "Reception",
            "Interesting facts",
            "Recommendation",
        ] {
            assert!(prompt.contains(section), "missing section: {section}");
        }
    }

    #[test]
    fn option_presets_differ_in_ceiling() {
        assert!(GenerationOptions::insights().max_output_tokens > GenerationOptions::chat().max_output_tokens);
    }
}
