//! Пакетный синтез речи
//!
//! Сегменты делятся на последовательные пакеты фиксированного размера.
//! Внутри пакета все запросы к TTS выполняются одновременно; ошибка одного
//! запроса не прерывает ни пакет, ни весь синтез. Между пакетами делается
//! пауза, чтобы не упираться в лимиты внешнего сервиса.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};

use crate::config::FitConfig;
use crate::error::{NarrationError, OracleError, Result};
use crate::media::DurationOracle;
use crate::progress::{send_progress, ProgressSender, ProgressUpdate};
use crate::segment::{AudioClip, Segment, SegmentId, SynthesisResult};
use crate::tts::text::prepare_text_for_tts;
use crate::tts::SpeechSynthesizer;

/// Планировщик пакетного синтеза
pub struct BatchScheduler {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    duration_oracle: Arc<dyn DurationOracle>,
    voice: String,
    inter_batch_delay: Duration,
    oracle_timeout: Duration,
}

impl BatchScheduler {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        duration_oracle: Arc<dyn DurationOracle>,
        voice: impl Into<String>,
        config: &FitConfig,
    ) -> Self {
        Self {
            synthesizer,
            duration_oracle,
            voice: voice.into(),
            inter_batch_delay: config.inter_batch_delay(),
            oracle_timeout: config.oracle_timeout(),
        }
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Синтезирует речь для всех сегментов пакетами по `batch_size`.
    ///
    /// Результаты возвращаются в порядке входных сегментов. Синтезируется
    /// `current_text` каждого сегмента. После каждого пакета в канал уходит
    /// `ProgressUpdate::Batch`.
    ///
    /// # Ошибки
    ///
    /// Только `NarrationError::Config` при нулевом размере пакета; ошибки
    /// отдельных сегментов попадают в соответствующий `SynthesisResult`.
    pub async fn synthesize_all(
        &self,
        segments: &[Segment],
        batch_size: usize,
        progress: Option<&ProgressSender>,
    ) -> Result<Vec<SynthesisResult>> {
        if batch_size == 0 {
            return Err(NarrationError::config("batch_size must be at least 1"));
        }

        let total = segments.len();
        let batch_count = total.div_ceil(batch_size);
        let mut results = Vec::with_capacity(total);
        let mut completed = 0;

        for (batch_index, chunk) in segments.chunks(batch_size).enumerate() {
            debug!(
                "Synthesizing batch {}/{} ({} segments)",
                batch_index + 1,
                batch_count,
                chunk.len()
            );

            let batch_results = join_all(
                chunk
                    .iter()
                    .map(|segment| self.synthesize_one(segment.id.clone(), &segment.current_text)),
            )
            .await;

            let failed = batch_results.iter().filter(|r| r.clip.is_none()).count();
            if failed == chunk.len() {
                warn!("Every segment in batch {}/{} failed", batch_index + 1, batch_count);
            } else if failed > 0 {
                warn!(
                    "{} of {} segments failed in batch {}/{}",
                    failed,
                    chunk.len(),
                    batch_index + 1,
                    batch_count
                );
            }

            completed += chunk.len();
            results.extend(batch_results);

            send_progress(
                progress,
                ProgressUpdate::Batch {
                    completed,
                    total,
                    message: format!("Synthesized batch {}/{}", batch_index + 1, batch_count),
                },
            )
            .await;

            if batch_index + 1 < batch_count && !self.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.inter_batch_delay).await;
            }
        }

        let produced = results.iter().filter(|r| r.clip.is_some()).count();
        info!("Synthesis finished: {}/{} segments produced audio", produced, total);
        Ok(results)
    }

    /// Синтез и измерение одного сегмента
    async fn synthesize_one(&self, segment_id: SegmentId, text: &str) -> SynthesisResult {
        let text = prepare_text_for_tts(text);
        if text.is_empty() {
            warn!("Segment {} has no text to synthesize", segment_id);
            return SynthesisResult::failed(segment_id, "segment text is empty");
        }

        let request = self.synthesizer.synthesize(&text, &self.voice);
        let audio = match tokio::time::timeout(self.oracle_timeout, request).await {
            Ok(Ok(audio)) => audio,
            Ok(Err(e)) => {
                warn!("TTS failed for segment {}: {}", segment_id, e);
                return SynthesisResult::failed(segment_id, e.to_string());
            }
            Err(_) => {
                let e = OracleError::Timeout(self.oracle_timeout);
                warn!("TTS failed for segment {}: {}", segment_id, e);
                return SynthesisResult::failed(segment_id, e.to_string());
            }
        };

        match self.duration_oracle.measure(&audio).await {
            Ok(duration) if duration > 0.0 => {
                debug!("Segment {} synthesized: {:.3}s", segment_id, duration);
                SynthesisResult::succeeded(segment_id, AudioClip::new(audio, duration))
            }
            Ok(duration) => {
                warn!("Segment {} produced a clip of {:.3}s", segment_id, duration);
                let reason = format!("clip duration {} is not positive", duration);
                SynthesisResult::failed(segment_id, reason)
            }
            Err(e) => {
                warn!("Failed to measure clip for segment {}: {}", segment_id, e);
                SynthesisResult::failed(segment_id, e.to_string())
            }
        }
    }
}
