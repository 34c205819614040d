//! Поддельные внешние сервисы для тестов конвейера
//!
//! «Аудио» здесь - строка вида `dur=12.5`, длительность которой читает
//! [`FakeDurationOracle`]. Длительность озвучки задаётся по тексту.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::FitConfig;
use crate::error::{MeasurementError, OracleError, StretchError};
use crate::media::{DurationOracle, TimeStretch};
use crate::pipeline::orchestrator::PipelineOracles;
use crate::rewrite::{RewriteRequest, TextAdapter};
use crate::segment::AudioBytes;
use crate::tts::SpeechSynthesizer;

pub fn fake_audio(duration: f64) -> AudioBytes {
    AudioBytes::from(format!("dur={}", duration))
}

/// TTS, длительность которого определяется текстом
#[derive(Default)]
pub struct ScriptedSynthesizer {
    durations: Mutex<HashMap<String, f64>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn speaks(self, text: &str, duration: f64) -> Self {
        self.durations.lock().insert(text.to_string(), duration);
        self
    }

    pub fn fails_on(self, text: &str) -> Self {
        self.failing.lock().insert(text.to_string());
        self
    }

    pub fn calls_for(&self, text: &str) -> usize {
        self.calls.lock().iter().filter(|t| t.as_str() == text).count()
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<AudioBytes, OracleError> {
        self.calls.lock().push(text.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().contains(text) {
            return Err(OracleError::Api {
                status: 429,
                message: "quota exceeded".to_string(),
            });
        }
        let duration = self.durations.lock().get(text).copied();
        // По умолчанию 0.1 с на символ
        let duration = duration.unwrap_or(text.chars().count() as f64 * 0.1);
        Ok(fake_audio(duration))
    }
}

/// Читает длительность из `dur=<секунды>`
#[derive(Default)]
pub struct FakeDurationOracle;

#[async_trait]
impl DurationOracle for FakeDurationOracle {
    async fn measure(&self, clip: &AudioBytes) -> Result<f64, MeasurementError> {
        if clip.is_empty() {
            return Err(MeasurementError::EmptyPayload);
        }
        let text = std::str::from_utf8(clip).map_err(|e| MeasurementError::Probe(e.to_string()))?;
        text.strip_prefix("dur=")
            .and_then(|value| value.parse::<f64>().ok())
            .ok_or_else(|| MeasurementError::Probe(format!("not a fake clip: {}", text)))
    }
}

/// Переписывание по таблице «текст -> новый текст»
#[derive(Default)]
pub struct ScriptedAdapter {
    rewrites: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    pub requests: Mutex<Vec<RewriteRequest>>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn rewrites(self, from: &str, to: &str) -> Self {
        self.rewrites.lock().insert(from.to_string(), to.to_string());
        self
    }

    pub fn fails_on(self, text: &str) -> Self {
        self.failing.lock().insert(text.to_string());
        self
    }

    pub fn requests_for(&self, text: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.text == text).count()
    }
}

#[async_trait]
impl TextAdapter for ScriptedAdapter {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<String, OracleError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(&request.text) {
            return Err(OracleError::Other("llm unavailable".to_string()));
        }
        let rewritten = self.rewrites.lock().get(&request.text).cloned();
        Ok(rewritten.unwrap_or_else(|| request.text.clone()))
    }
}

/// Примитив изменения темпа, записывающий коэффициенты
#[derive(Default)]
pub struct RecordingStretch {
    pub calls: Mutex<Vec<f64>>,
}

#[async_trait]
impl TimeStretch for RecordingStretch {
    async fn stretch(&self, clip: &AudioBytes, factor: f64) -> Result<AudioBytes, StretchError> {
        if !(0.5..=2.0).contains(&factor) {
            return Err(StretchError::OutOfDomain { factor, min: 0.5, max: 2.0 });
        }
        self.calls.lock().push(factor);
        let mut data = clip.to_vec();
        data.extend_from_slice(format!("|x{}", factor).as_bytes());
        Ok(AudioBytes::from(data))
    }
}

/// Конфигурация без пауз между пакетами
pub fn test_config() -> FitConfig {
    FitConfig {
        inter_batch_delay_ms: 0,
        oracle_timeout_secs: 5,
        ..FitConfig::default()
    }
}

pub struct Harness {
    pub synthesizer: Arc<ScriptedSynthesizer>,
    pub adapter: Arc<ScriptedAdapter>,
    pub stretch: Arc<RecordingStretch>,
}

impl Harness {
    pub fn new(synthesizer: ScriptedSynthesizer, adapter: ScriptedAdapter) -> Self {
        Self {
            synthesizer: Arc::new(synthesizer),
            adapter: Arc::new(adapter),
            stretch: Arc::new(RecordingStretch::default()),
        }
    }

    pub fn oracles(&self) -> PipelineOracles {
        PipelineOracles {
            synthesizer: self.synthesizer.clone(),
            adapter: self.adapter.clone(),
            duration: Arc::new(FakeDurationOracle),
            stretch: self.stretch.clone(),
        }
    }
}
