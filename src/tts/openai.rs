//! Модуль для интеграции с OpenAI TTS API

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::OpenAiConfig;
use crate::error::{NarrationError, OracleError, Result};
use crate::segment::AudioBytes;
use crate::tts::SpeechSynthesizer;

/// Параметры запроса к API OpenAI TTS
#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
}

/// Клиент OpenAI `/audio/speech`
#[derive(Debug, Clone)]
pub struct OpenAiSpeech {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiSpeech {
    /// Создать клиент; `timeout` ограничивает каждый HTTP запрос
    pub fn new(config: &OpenAiConfig, timeout: Duration) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            error!("OpenAI API key is empty");
            return Err(NarrationError::config("OpenAI API key is required for TTS generation"));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OracleError::from)?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.tts_model.as_str().to_string(),
        })
    }
}

/// Извлечь текст ошибки из тела ответа OpenAI
pub(crate) fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
    ) -> std::result::Result<AudioBytes, OracleError> {
        debug!("Sending TTS request ({} chars, voice {})", text.chars().count(), voice);

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.model,
                input: text,
                voice,
                response_format: "mp3",
                speed: 1.0,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
            let message = api_error_message(&body);
            error!("OpenAI TTS error (status {}): {}", status, message);
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(OracleError::EmptyResponse("TTS returned no audio".to_string()));
        }

        info!("Received {} bytes of TTS audio", bytes.len());
        Ok(bytes)
    }
}
