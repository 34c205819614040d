//! # Tempo stretching
//!
//! Изменение темпа фрагмента без изменения высоты тона.
//!
//! Примитив изменения темпа (фильтр `atempo` в FFmpeg) корректно работает
//! только с коэффициентами из диапазона `[0.5, 2.0]`. Произвольный
//! коэффициент раскладывается в цепочку ступеней из этого диапазона,
//! произведение которых равно исходному коэффициенту.
//!
//! Коэффициент больше 1 ускоряет речь (фрагмент становится короче),
//! меньше 1 замедляет.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use crate::error::StretchError;
use crate::segment::AudioBytes;
use crate::utils::{ffmpeg, temp::TempFileManager};

/// Минимальный коэффициент одной ступени
pub const MIN_STAGE: f64 = 0.5;

/// Максимальный коэффициент одной ступени
pub const MAX_STAGE: f64 = 2.0;

/// Допустимая абсолютная погрешность произведения ступеней
pub const PRODUCT_TOLERANCE: f64 = 1e-4;

/// Раскладывает коэффициент скорости в цепочку ступеней из `[0.5, 2.0]`.
///
/// Число ступеней растёт как `O(log factor)`. Остаток после ступеней 2.0 и
/// 0.5 отбрасывается, только если без него произведение отличается от
/// `factor` не больше чем на [`PRODUCT_TOLERANCE`]. Для коэффициента, равного
/// 1.0, возвращается `[1.0]`, так что результат никогда не пуст.
///
/// # Ошибки
///
/// `StretchError::InvalidFactor` для нуля, отрицательных и нечисловых значений.
///
/// # Примеры
///
/// ```rust
/// use narration_sync::media::stretch::decompose;
///
/// assert_eq!(decompose(3.0).unwrap(), vec![2.0, 1.5]);
/// assert_eq!(decompose(0.2).unwrap(), vec![0.5, 0.5, 0.8]);
/// ```
pub fn decompose(factor: f64) -> Result<Vec<f64>, StretchError> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(StretchError::InvalidFactor(factor));
    }

    let mut remaining = factor;
    let mut prefix = 1.0;
    let mut stages = Vec::new();

    while remaining > MAX_STAGE {
        stages.push(MAX_STAGE);
        prefix *= MAX_STAGE;
        remaining /= MAX_STAGE;
    }
    while remaining < MIN_STAGE {
        stages.push(MIN_STAGE);
        prefix *= MIN_STAGE;
        remaining /= MIN_STAGE;
    }
    // Погрешность считается по всему произведению, а не по остатку
    if (prefix * (remaining - 1.0)).abs() > PRODUCT_TOLERANCE {
        stages.push(remaining);
    }

    if stages.is_empty() {
        stages.push(1.0);
    }
    Ok(stages)
}

/// Является ли ступень тождественной (не требует обработки)
pub fn is_identity(stage: f64) -> bool {
    stage == 1.0
}

/// Примитив изменения темпа
#[async_trait]
pub trait TimeStretch: Send + Sync {
    /// Изменить темп фрагмента на `factor` из `[0.5, 2.0]`
    async fn stretch(&self, clip: &AudioBytes, factor: f64) -> Result<AudioBytes, StretchError>;
}

/// Применяет цепочку ступеней к фрагменту по порядку.
///
/// Тождественные ступени пропускаются; ступень вне `[0.5, 2.0]` приводит к
/// ошибке до обращения к примитиву.
pub async fn apply(
    primitive: &dyn TimeStretch,
    clip: &AudioBytes,
    stages: &[f64],
) -> Result<AudioBytes, StretchError> {
    if let Some(&bad) = stages
        .iter()
        .find(|stage| !stage.is_finite() || **stage < MIN_STAGE || **stage > MAX_STAGE)
    {
        return Err(StretchError::OutOfDomain {
            factor: bad,
            min: MIN_STAGE,
            max: MAX_STAGE,
        });
    }

    let mut current = clip.clone();
    for (index, &stage) in stages.iter().enumerate() {
        if is_identity(stage) {
            continue;
        }
        debug!("Applying stretch stage {}/{}: {:.4}", index + 1, stages.len(), stage);
        current = primitive.stretch(&current, stage).await?;
    }
    Ok(current)
}

/// Подгонка фрагментов под длительность слота
#[derive(Clone)]
pub struct SpeedNormalizer {
    primitive: Arc<dyn TimeStretch>,
}

impl SpeedNormalizer {
    pub fn new(primitive: Arc<dyn TimeStretch>) -> Self {
        Self { primitive }
    }

    /// Изменить темп фрагмента на `speed_factor`, вернув результат и цепочку ступеней
    pub async fn fit(
        &self,
        clip: &AudioBytes,
        speed_factor: f64,
    ) -> Result<(AudioBytes, Vec<f64>), StretchError> {
        let stages = decompose(speed_factor)?;
        let stretched = apply(self.primitive.as_ref(), clip, &stages).await?;
        Ok((stretched, stages))
    }
}

/// Изменение темпа через фильтр `atempo` FFmpeg
#[derive(Debug, Clone)]
pub struct FfmpegTempoStretch {
    /// Расширение (и формат) выходного файла
    output_format: String,
}

impl FfmpegTempoStretch {
    pub fn new(output_format: impl Into<String>) -> Self {
        Self {
            output_format: output_format.into(),
        }
    }
}

impl Default for FfmpegTempoStretch {
    fn default() -> Self {
        Self::new("mp3")
    }
}

#[async_trait]
impl TimeStretch for FfmpegTempoStretch {
    async fn stretch(&self, clip: &AudioBytes, factor: f64) -> Result<AudioBytes, StretchError> {
        if !(MIN_STAGE..=MAX_STAGE).contains(&factor) {
            return Err(StretchError::OutOfDomain {
                factor,
                min: MIN_STAGE,
                max: MAX_STAGE,
            });
        }

        let mut temp = TempFileManager::new()?;
        let input = temp.write_temp_file("stretch_in", &self.output_format, clip).await?;
        let output = temp.reserve_path("stretch_out", &self.output_format);

        let filter = ffmpeg::atempo_filter(factor);
        let input_str = input.to_string_lossy().to_string();
        let output_str = output.to_string_lossy().to_string();
        ffmpeg::run_ffmpeg_command(&[
            "-y",
            "-i",
            &input_str,
            "-filter:a",
            &filter,
            &output_str,
        ])
        .await?;

        let data = tokio::fs::read(&output).await?;
        if data.is_empty() {
            return Err(StretchError::Primitive("ffmpeg produced an empty file".to_string()));
        }
        info!("Stretched clip by {:.4} ({} -> {} bytes)", factor, clip.len(), data.len());
        Ok(AudioBytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::fakes::RecordingStretch;

    fn product(stages: &[f64]) -> f64 {
        stages.iter().product()
    }

    fn assert_valid_chain(factor: f64) {
        let stages = decompose(factor).unwrap();
        assert!(!stages.is_empty(), "empty chain for {}", factor);
        assert!(
            (product(&stages) - factor).abs() < 1e-3,
            "product {} != {} for {:?}",
            product(&stages),
            factor,
            stages
        );
        assert!(
            stages.iter().all(|s| (MIN_STAGE..=MAX_STAGE).contains(s)),
            "stage out of domain for {}: {:?}",
            factor,
            stages
        );
    }

    #[test]
    fn test_decompose_properties_over_range() {
        let mut factor = 0.01;
        while factor < 100.0 {
            assert_valid_chain(factor);
            factor *= 1.07;
        }
    }

    /// Остаток чуть больше 1 после многих ступеней 2.0 не теряется
    #[test]
    fn test_decompose_keeps_small_residual_near_powers_of_two() {
        assert_valid_chain(64.005);
        assert_valid_chain(4.0002);

        let stages = decompose(64.005).unwrap();
        assert_eq!(stages.len(), 7);
        assert!((product(&stages) - 64.005).abs() <= PRODUCT_TOLERANCE);

        for power in 0..20 {
            let base = 2f64.powi(power);
            for drift in [1.0 + 5e-5, 1.0 - 5e-5, 1.0 + 2e-6] {
                assert_valid_chain(base * drift);
                assert_valid_chain(drift / base);
            }
        }
    }

    #[test]
    fn test_decompose_known_values() {
        assert_eq!(decompose(1.3).unwrap(), vec![1.3]);
        assert_eq!(decompose(4.0).unwrap(), vec![2.0, 2.0]);
        assert_eq!(decompose(3.0).unwrap(), vec![2.0, 1.5]);
        assert_eq!(decompose(0.25).unwrap(), vec![0.5, 0.5]);
        assert_eq!(decompose(1.0).unwrap(), vec![1.0]);
        assert_eq!(decompose(2.0).unwrap(), vec![2.0]);
        assert_eq!(decompose(0.5).unwrap(), vec![0.5]);
    }

    #[test]
    fn test_decompose_stage_count_is_logarithmic() {
        assert_eq!(decompose(1024.0).unwrap().len(), 10);
        assert!(decompose(1e6).unwrap().len() <= 21);
    }

    #[test]
    fn test_decompose_rejects_invalid() {
        assert!(matches!(decompose(0.0), Err(StretchError::InvalidFactor(_))));
        assert!(matches!(decompose(-1.5), Err(StretchError::InvalidFactor(_))));
        assert!(decompose(f64::NAN).is_err());
        assert!(decompose(f64::INFINITY).is_err());
    }

    #[tokio::test]
    async fn test_apply_chains_stages_in_order() {
        let primitive = RecordingStretch::default();
        let clip = AudioBytes::from_static(b"clip");

        let out = apply(&primitive, &clip, &[2.0, 1.0, 1.75]).await.unwrap();

        // Тождественная ступень пропущена
        assert_eq!(*primitive.calls.lock(), vec![2.0, 1.75]);
        assert_eq!(&out[..], b"clip|x2|x1.75");
    }

    #[tokio::test]
    async fn test_apply_keeps_near_identity_stage() {
        let primitive = RecordingStretch::default();
        let stages = decompose(64.005).unwrap();

        apply(&primitive, &AudioBytes::from_static(b"clip"), &stages).await.unwrap();

        assert_eq!(primitive.calls.lock().len(), stages.len());
    }

    #[tokio::test]
    async fn test_apply_rejects_out_of_domain_stage() {
        let primitive = RecordingStretch::default();
        let clip = AudioBytes::from_static(b"clip");

        let result = apply(&primitive, &clip, &[1.5, 2.5]).await;
        assert!(matches!(result, Err(StretchError::OutOfDomain { .. })));
        assert!(primitive.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_normalizer_fit_returns_stages() {
        let primitive = Arc::new(RecordingStretch::default());
        let normalizer = SpeedNormalizer::new(primitive.clone());

        let (out, stages) = normalizer
            .fit(&AudioBytes::from_static(b"x"), 3.5)
            .await
            .unwrap();

        assert_eq!(stages, vec![2.0, 1.75]);
        assert!((product(&stages) - 3.5).abs() < 1e-9);
        assert_eq!(&out[..], b"x|x2|x1.75");
    }

    #[tokio::test]
    async fn test_ffmpeg_stretch_rejects_out_of_domain() {
        let stretch = FfmpegTempoStretch::default();
        let result = stretch.stretch(&AudioBytes::from_static(b"x"), 3.0).await;
        assert!(matches!(result, Err(StretchError::OutOfDomain { .. })));
    }
}
