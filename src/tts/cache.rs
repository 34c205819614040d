//! Модуль для кэширования результатов TTS
//!
//! Повторный синтез одного и того же текста тем же голосом (например, когда
//! LLM вернула текст без изменений) берётся из памяти.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::OracleError;
use crate::segment::AudioBytes;
use crate::tts::SpeechSynthesizer;

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, AudioBytes>,
    /// Порядок добавления для вытеснения старых записей
    order: VecDeque<String>,
}

/// Кэширующая обёртка над сервисом синтеза
pub struct CachedSynthesizer {
    inner: Arc<dyn SpeechSynthesizer>,
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl CachedSynthesizer {
    pub fn new(inner: Arc<dyn SpeechSynthesizer>, max_entries: usize) -> Self {
        Self {
            inner,
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Генерировать ключ для кэша
    fn cache_key(text: &str, voice: &str) -> String {
        let mut hasher = md5::Context::new();
        hasher.consume(text.as_bytes());
        hasher.consume([0u8]);
        hasher.consume(voice.as_bytes());
        format!("{:x}", hasher.compute())
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }

    fn insert(&self, key: String, audio: AudioBytes) {
        let mut state = self.state.lock();
        if state.entries.insert(key.clone(), audio).is_none() {
            state.order.push_back(key);
        }
        while state.entries.len() > self.max_entries {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CachedSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<AudioBytes, OracleError> {
        let key = Self::cache_key(text, voice);
        let cached = self.state.lock().entries.get(&key).cloned();
        if let Some(cached) = cached {
            log::debug!("Using cached TTS audio for key {}", key);
            return Ok(cached);
        }

        // Ошибки не кэшируются
        let audio = self.inner.synthesize(text, voice).await?;
        self.insert(key, audio.clone());
        Ok(audio)
    }
}
