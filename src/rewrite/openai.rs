//! Переписывание текста через OpenAI Chat Completions

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;
use crate::error::{NarrationError, OracleError, Result};
use crate::rewrite::{RewriteRequest, TextAdapter};
use crate::tts::openai::api_error_message;
use crate::tts::text::clean_rewritten_text;

// Chat message structure for OpenAI API
#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

const SYSTEM_PROMPT: &str = "You are a dubbing editor. \
    You rewrite a single line of narration so that, when spoken, it fits a fixed time slot. \
    Preserve the meaning, the language and the tone of the original line. \
    Do not add explanations, quotes or numbering. \
    ONLY reply with the rewritten line.";

/// Текст запроса к LLM
pub fn build_user_prompt(request: &RewriteRequest) -> String {
    let direction = if request.needs_shortening() {
        "shorten"
    } else {
        "lengthen"
    };
    format!(
        "Line: {text}\n\
        The line currently takes {current:.2}s to speak, the slot is {slot:.2}s \
        (speed factor {speed:.2}). \
        {direction} it so that it takes about {desired:.2}s at normal pace \
        (speed factor {target:.2}), roughly {chars} characters.",
        text = request.text,
        current = request.current_duration,
        slot = request.target_duration,
        speed = request.current_speed,
        direction = capitalize(direction),
        desired = request.desired_duration(),
        target = request.target_speed,
        chars = request.target_char_count(),
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Клиент OpenAI `/chat/completions` для переписывания текста
#[derive(Debug, Clone)]
pub struct OpenAiTextAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiTextAdapter {
    pub fn new(config: &OpenAiConfig, timeout: Duration) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(NarrationError::config("OpenAI API key is required for text adaptation"));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OracleError::from)?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl TextAdapter for OpenAiTextAdapter {
    async fn rewrite(&self, request: &RewriteRequest) -> std::result::Result<String, OracleError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: build_user_prompt(request),
                },
            ],
            temperature: self.temperature,
        };

        debug!("Sending rewrite request to OpenAI API");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = api_error_message(&error_text);
            error!("OpenAI API error: HTTP {}, body: {}", status, message);
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletion = response.json().await?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| clean_rewritten_text(&choice.message.content))
            .unwrap_or_default();

        if reply.is_empty() {
            return Err(OracleError::EmptyResponse("rewrite returned no text".to_string()));
        }
        Ok(reply)
    }
}
