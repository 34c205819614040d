//! Основной файл библиотеки narration-sync
//!
//! Библиотека озвучивает переведённые сегменты субтитров и подгоняет каждый
//! фрагмент под его временной слот в видео: сначала переписыванием текста
//! через LLM, затем изменением темпа без изменения высоты тона.

pub mod config;
pub mod error;
pub mod media;
pub mod notification;
pub mod pipeline;
pub mod progress;
pub mod rewrite;
pub mod segment;
pub mod tts;
pub mod utils;

use std::sync::Arc;

use crate::config::NarrationSyncConfig;
use crate::error::Result;
use crate::media::{FfmpegTempoStretch, SymphoniaDurationOracle};
use crate::pipeline::{NarrationPipeline, PipelineOracles, PipelineOutcome};
use crate::progress::ProgressSender;
use crate::rewrite::OpenAiTextAdapter;
use crate::segment::Segment;
use crate::tts::{CachedSynthesizer, OpenAiSpeech, SpeechSynthesizer};

pub use crate::error::NarrationError;
pub use crate::segment::SegmentStatus;

/// Основная структура для работы с библиотекой
pub struct NarrationSync {
    config: NarrationSyncConfig,
    pipeline: NarrationPipeline,
}

impl NarrationSync {
    /// Создать экземпляр с сервисами OpenAI, Symphonia и FFmpeg
    pub fn new(config: NarrationSyncConfig) -> Result<Self> {
        config.validate()?;

        let timeout = config.fit.oracle_timeout();
        let speech: Arc<dyn SpeechSynthesizer> =
            Arc::new(OpenAiSpeech::new(&config.openai, timeout)?);
        let synthesizer: Arc<dyn SpeechSynthesizer> = if config.use_caching {
            Arc::new(CachedSynthesizer::new(speech, config.max_cache_entries))
        } else {
            speech
        };

        let oracles = PipelineOracles {
            synthesizer,
            adapter: Arc::new(OpenAiTextAdapter::new(&config.openai, timeout)?),
            duration: Arc::new(SymphoniaDurationOracle),
            stretch: Arc::new(FfmpegTempoStretch::default()),
        };
        Self::with_oracles(config, oracles)
    }

    /// Создать экземпляр с произвольными внешними сервисами
    pub fn with_oracles(config: NarrationSyncConfig, oracles: PipelineOracles) -> Result<Self> {
        config.validate()?;
        let voice = config.openai.tts_voice.as_str();
        let pipeline = NarrationPipeline::new(config.fit.clone(), voice, oracles)?;
        Ok(Self { config, pipeline })
    }

    pub fn config(&self) -> &NarrationSyncConfig {
        &self.config
    }

    /// Озвучить сегменты и подогнать их под слоты
    pub async fn process(
        &self,
        segments: Vec<Segment>,
        progress: Option<&ProgressSender>,
    ) -> Result<PipelineOutcome> {
        log::info!("Starting narration sync for {} segment(s)", segments.len());
        self.pipeline.run(segments, progress).await
    }
}

/// Публичный API для удобного использования
pub async fn fit_narration(
    segments: Vec<Segment>,
    openai_api_key: &str,
) -> Result<PipelineOutcome> {
    let mut config = NarrationSyncConfig::default();
    config.openai.api_key = openai_api_key.to_string();

    NarrationSync::new(config)?.process(segments, None).await
}
