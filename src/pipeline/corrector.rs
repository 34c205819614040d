//! Итеративная подгонка текста под слот
//!
//! Для сегментов, чья скорость после первичного синтеза вне диапазона, текст
//! переписывается LLM, заново озвучивается и классифицируется по диапазону
//! коррекции. Каждый сегмент получает не больше одной попытки за цикл и не
//! больше `max_attempts` попыток всего; не сошедшиеся сегменты принудительно
//! подгоняются изменением темпа.
//!
//! Каждая задача владеет своим сегментом и возвращает его обновлённую копию,
//! общего изменяемого состояния между задачами нет.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};

use crate::config::FitConfig;
use crate::error::OracleError;
use crate::media::SpeedNormalizer;
use crate::pipeline::classifier::classify;
use crate::pipeline::scheduler::BatchScheduler;
use crate::progress::{send_progress, ProgressSender, ProgressTracker};
use crate::rewrite::{RewriteRequest, TextAdapter};
use crate::segment::{Segment, SegmentStatus};

/// Подгоняет фрагмент сегмента под длительность слота и переводит сегмент в `status`.
///
/// Ошибка изменения темпа переводит сегмент в `Failed`.
pub async fn fit_to_slot(
    normalizer: &SpeedNormalizer,
    mut segment: Segment,
    status: SegmentStatus,
) -> Segment {
    let prepared = match (&segment.audio, segment.speed_factor) {
        (Some(clip), Some(speed_factor)) => Some((clip.bytes.clone(), speed_factor)),
        _ => None,
    };
    let Some((clip, speed_factor)) = prepared else {
        segment.fail("no synthesized audio to fit");
        return segment;
    };

    match normalizer.fit(&clip, speed_factor).await {
        Ok((fitted, stages)) => {
            debug!(
                "Segment {} fitted with stages {:?} (speed {:.3})",
                segment.id, stages, speed_factor
            );
            segment.fitted_audio = Some(fitted);
            segment.stretch_stages = stages;
            segment.status = status;
        }
        Err(e) => {
            warn!("Failed to stretch segment {}: {}", segment.id, e);
            segment.fail(format!("stretch failed: {}", e));
        }
    }
    segment
}

/// Корректор текста
pub struct TextFitCorrector {
    adapter: Arc<dyn TextAdapter>,
    scheduler: Arc<BatchScheduler>,
    normalizer: SpeedNormalizer,
    config: FitConfig,
}

impl TextFitCorrector {
    pub fn new(
        adapter: Arc<dyn TextAdapter>,
        scheduler: Arc<BatchScheduler>,
        normalizer: SpeedNormalizer,
        config: FitConfig,
    ) -> Self {
        Self {
            adapter,
            scheduler,
            normalizer,
            config,
        }
    }

    fn oracle_timeout(&self) -> Duration {
        self.config.oracle_timeout()
    }

    /// Выполняет циклы коррекции для сегментов вне диапазона.
    ///
    /// Возвращает сегменты в конечных состояниях (`Fitted`, `ForcedFit`,
    /// `Failed`). `settled_before` - число сегментов, уже завершённых до
    /// коррекции, нужно для общего процента.
    pub async fn run(
        &self,
        mut needs_fix: Vec<Segment>,
        progress: Option<&ProgressSender>,
        tracker: &ProgressTracker,
        settled_before: usize,
    ) -> Vec<Segment> {
        let mut settled = Vec::with_capacity(needs_fix.len());

        for cycle in 1..=self.config.max_cycles {
            if needs_fix.is_empty() {
                break;
            }
            info!(
                "Correction cycle {}/{}: {} segment(s) out of band",
                cycle,
                self.config.max_cycles,
                needs_fix.len()
            );

            let processed =
                join_all(needs_fix.into_iter().map(|segment| self.correct(segment))).await;
            let (done, remaining): (Vec<Segment>, Vec<Segment>) =
                processed.into_iter().partition(|segment| segment.status.is_terminal());

            settled.extend(done);
            needs_fix = remaining;

            send_progress(
                progress,
                tracker.overall_update(
                    settled_before + settled.len(),
                    format!(
                        "Correction cycle {}/{} done, {} segment(s) still out of band",
                        cycle,
                        self.config.max_cycles,
                        needs_fix.len()
                    ),
                ),
            )
            .await;
        }

        // Ни один сегмент не выходит из коррекции в состоянии ReProcessing
        if !needs_fix.is_empty() {
            info!("Forcing {} segment(s) that did not converge", needs_fix.len());
            let forced =
                join_all(needs_fix.into_iter().map(|segment| self.force_fit(segment))).await;
            settled.extend(forced);

            send_progress(
                progress,
                tracker.overall_update(
                    settled_before + settled.len(),
                    "Forced remaining segments to fit",
                ),
            )
            .await;
        }

        settled
    }

    /// Одна попытка коррекции сегмента
    pub async fn correct(&self, mut segment: Segment) -> Segment {
        if segment.attempts >= self.config.max_attempts {
            return self.force_fit(segment).await;
        }

        let measured = (segment.clip_duration(), segment.speed_factor);
        let (current_duration, current_speed) = match measured {
            (Some(duration), Some(speed)) => (duration, speed),
            _ => {
                segment.fail("no synthesized audio to correct");
                return segment;
            }
        };

        segment.attempts += 1;
        segment.status = SegmentStatus::Synthesizing;

        let request = RewriteRequest {
            text: segment.current_text.clone(),
            current_duration,
            target_duration: segment.slot_duration(),
            current_speed,
            target_speed: self.config.target_speed,
        };

        let pending = self.adapter.rewrite(&request);
        let rewrite = match tokio::time::timeout(self.oracle_timeout(), pending).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.oracle_timeout())),
        };

        match rewrite {
            Ok(text) => {
                debug!(
                    "Segment {} attempt {}: rewritten {} -> {} chars",
                    segment.id,
                    segment.attempts,
                    segment.current_text.chars().count(),
                    text.chars().count()
                );
                segment.current_text = text;
            }
            Err(e) => {
                // Текст остаётся прежним, попытка считается израсходованной
                warn!(
                    "Rewrite failed for segment {} (attempt {}): {}",
                    segment.id, segment.attempts, e
                );
                segment.last_error = Some(format!("rewrite failed: {}", e));
                segment.status = SegmentStatus::ReProcessing;
                return segment;
            }
        }

        let result = match self
            .scheduler
            .synthesize_all(std::slice::from_ref(&segment), 1, None)
            .await
        {
            Ok(mut results) => results.pop(),
            Err(e) => {
                segment.fail(e.to_string());
                return segment;
            }
        };

        let clip = match result {
            Some(result) => match result.clip {
                Some(clip) => clip,
                None => {
                    segment.fail(result.error.unwrap_or_else(|| "synthesis failed".to_string()));
                    return segment;
                }
            },
            None => {
                segment.fail("synthesis returned no result");
                return segment;
            }
        };

        let band = self.config.correction_band;
        let classification = match classify(clip.duration, segment.slot_duration(), band) {
            Ok(classification) => classification,
            Err(e) => {
                segment.fail(e.to_string());
                return segment;
            }
        };

        segment.audio = Some(clip);
        segment.speed_factor = Some(classification.speed_factor);

        if classification.in_band {
            info!(
                "Segment {} converged after {} attempt(s): speed {:.3}",
                segment.id, segment.attempts, classification.speed_factor
            );
            fit_to_slot(&self.normalizer, segment, SegmentStatus::Fitted).await
        } else {
            debug!(
                "Segment {} still out of band after attempt {}: speed {:.3}",
                segment.id, segment.attempts, classification.speed_factor
            );
            segment.status = SegmentStatus::ReProcessing;
            segment
        }
    }

    /// Принудительная подгонка по последнему измеренному коэффициенту
    pub async fn force_fit(&self, segment: Segment) -> Segment {
        info!(
            "Segment {} forced to fit after {} attempt(s), speed {:?}",
            segment.id, segment.attempts, segment.speed_factor
        );
        fit_to_slot(&self.normalizer, segment, SegmentStatus::ForcedFit).await
    }
}
