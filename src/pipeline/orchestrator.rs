//! Оркестратор конвейера подгонки озвучки
//!
//! Последовательность: пакетный синтез всех сегментов -> классификация по
//! диапазону первичного прохода -> коррекция текста для сегментов вне
//! диапазона -> подгонка темпа принятых сегментов под слот.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;

use crate::config::FitConfig;
use crate::error::{NarrationError, Result};
use crate::media::{DurationOracle, SpeedNormalizer, TimeStretch};
use crate::pipeline::classifier::classify;
use crate::pipeline::corrector::{fit_to_slot, TextFitCorrector};
use crate::pipeline::scheduler::BatchScheduler;
use crate::progress::{send_progress, ProgressSender, ProgressTracker, ProgressUpdate};
use crate::rewrite::TextAdapter;
use crate::segment::{Segment, SegmentStatus};
use crate::tts::SpeechSynthesizer;

/// Внешние сервисы, от которых зависит конвейер
#[derive(Clone)]
pub struct PipelineOracles {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub adapter: Arc<dyn TextAdapter>,
    pub duration: Arc<dyn DurationOracle>,
    pub stretch: Arc<dyn TimeStretch>,
}

/// Итог запуска конвейера
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// Все сегменты в порядке начала слота
    pub segments: Vec<Segment>,
}

/// Краткая сводка по итогам
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub total: usize,
    pub fitted: usize,
    pub forced_fit: usize,
    pub failed: usize,
}

impl PipelineOutcome {
    /// Сегменты, пригодные для сборки дорожки (`Fitted` и `ForcedFit`)
    pub fn assemblable(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.status.is_assemblable())
    }

    /// Сегменты, которые не удалось озвучить
    pub fn failed(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.status == SegmentStatus::Failed)
    }

    pub fn get(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn summary(&self) -> OutcomeSummary {
        let count =
            |status: SegmentStatus| self.segments.iter().filter(|s| s.status == status).count();
        OutcomeSummary {
            total: self.segments.len(),
            fitted: count(SegmentStatus::Fitted),
            forced_fit: count(SegmentStatus::ForcedFit),
            failed: count(SegmentStatus::Failed),
        }
    }
}

/// Конвейер подгонки озвучки
pub struct NarrationPipeline {
    config: FitConfig,
    scheduler: Arc<BatchScheduler>,
    corrector: TextFitCorrector,
    normalizer: SpeedNormalizer,
}

impl NarrationPipeline {
    pub fn new(
        config: FitConfig,
        voice: impl Into<String>,
        oracles: PipelineOracles,
    ) -> Result<Self> {
        config.validate()?;

        let scheduler = Arc::new(BatchScheduler::new(
            oracles.synthesizer,
            oracles.duration,
            voice,
            &config,
        ));
        let normalizer = SpeedNormalizer::new(oracles.stretch);
        let corrector = TextFitCorrector::new(
            oracles.adapter,
            scheduler.clone(),
            normalizer.clone(),
            config.clone(),
        );

        Ok(Self {
            config,
            scheduler,
            corrector,
            normalizer,
        })
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Проверка входных сегментов до запуска
    fn validate_segments(segments: &[Segment]) -> Result<()> {
        let mut ids = HashSet::with_capacity(segments.len());
        for segment in segments {
            if !segment.slot_start.is_finite()
                || !segment.slot_end.is_finite()
                || segment.slot_duration() <= 0.0
            {
                return Err(NarrationError::config(format!(
                    "segment {} has an invalid slot [{}, {}]",
                    segment.id, segment.slot_start, segment.slot_end
                )));
            }
            if !ids.insert(segment.id.as_str()) {
                return Err(NarrationError::config(format!("duplicate segment id {}", segment.id)));
            }
        }
        Ok(())
    }

    /// Запустить конвейер над набором сегментов.
    ///
    /// Ошибки отдельных сегментов не прерывают запуск: такие сегменты
    /// возвращаются в состоянии `Failed`.
    ///
    /// # Ошибки
    ///
    /// `NarrationError::Config`, если у сегмента неположительная длительность
    /// слота или идентификаторы повторяются.
    pub async fn run(
        &self,
        segments: Vec<Segment>,
        progress: Option<&ProgressSender>,
    ) -> Result<PipelineOutcome> {
        Self::validate_segments(&segments)?;

        let total = segments.len();
        let tracker = ProgressTracker::new(total);
        info!("Starting narration fit for {} segment(s)", total);

        let input_order: HashMap<String, usize> = segments
            .iter()
            .enumerate()
            .map(|(index, segment)| (segment.id.clone(), index))
            .collect();

        let mut segments = segments;
        for segment in &mut segments {
            segment.status = SegmentStatus::Synthesizing;
            segment.attempts = 0;
        }

        // Первичный проход по исходному тексту
        let results = self
            .scheduler
            .synthesize_all(&segments, self.config.batch_size, progress)
            .await?;
        let mut results: HashMap<String, _> = results
            .into_iter()
            .map(|result| (result.segment_id.clone(), result))
            .collect();

        let mut settled = Vec::with_capacity(total);
        let mut accepted = Vec::new();
        let mut needs_fix = Vec::new();

        for mut segment in segments {
            let clip = match results.remove(&segment.id) {
                Some(result) => match result.clip {
                    Some(clip) => clip,
                    None => {
                        let reason = result.error.unwrap_or_else(|| "synthesis failed".to_string());
                        segment.fail(reason);
                        settled.push(segment);
                        continue;
                    }
                },
                None => {
                    segment.fail("no synthesis result");
                    settled.push(segment);
                    continue;
                }
            };

            let band = self.config.initial_band;
            let classification = match classify(clip.duration, segment.slot_duration(), band) {
                Ok(classification) => classification,
                Err(e) => {
                    segment.fail(e.to_string());
                    settled.push(segment);
                    continue;
                }
            };

            segment.audio = Some(clip);
            segment.speed_factor = Some(classification.speed_factor);
            if classification.in_band {
                accepted.push(segment);
            } else {
                segment.status = SegmentStatus::ReProcessing;
                needs_fix.push(segment);
            }
        }

        info!(
            "Initial pass: {} accepted, {} need correction, {} failed",
            accepted.len(),
            needs_fix.len(),
            settled.len()
        );
        send_progress(
            progress,
            tracker.overall_update(
                settled.len() + accepted.len(),
                format!("Initial pass done, {} segment(s) need correction", needs_fix.len()),
            ),
        )
        .await;

        let settled_before = settled.len() + accepted.len();
        let corrected = self
            .corrector
            .run(needs_fix, progress, &tracker, settled_before)
            .await;
        settled.extend(corrected);

        // Подгонка темпа для сегментов, принятых без коррекции
        let fitted = join_all(
            accepted
                .into_iter()
                .map(|segment| fit_to_slot(&self.normalizer, segment, SegmentStatus::Fitted)),
        )
        .await;
        settled.extend(fitted);

        settled.sort_by(|a, b| {
            a.slot_start
                .total_cmp(&b.slot_start)
                .then_with(|| input_order.get(&a.id).cmp(&input_order.get(&b.id)))
        });

        let outcome = PipelineOutcome { segments: settled };
        let summary = outcome.summary();
        if summary.total > 0 && summary.failed == summary.total {
            warn!("Every segment failed; check the TTS service");
        }
        info!(
            "Narration fit finished: {} fitted, {} forced, {} failed",
            summary.fitted, summary.forced_fit, summary.failed
        );

        send_progress(progress, tracker.overall_update(total, "Narration fit finished")).await;
        send_progress(progress, ProgressUpdate::Finished).await;

        Ok(outcome)
    }
}
