//! # Duration measurement
//!
//! Определение длительности воспроизведения синтезированного фрагмента.
//! Сначала используется число кадров из заголовка контейнера, если его нет
//! (типично для MP3 без Xing-заголовка), пакеты декодируются и кадры
//! подсчитываются.

use async_trait::async_trait;
use log::{debug, warn};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::MeasurementError;
use crate::segment::AudioBytes;

/// Источник длительности аудиофрагментов
#[async_trait]
pub trait DurationOracle: Send + Sync {
    /// Длительность воспроизведения в секундах
    async fn measure(&self, clip: &AudioBytes) -> Result<f64, MeasurementError>;
}

/// Измерение длительности с помощью symphonia
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDurationOracle;

#[async_trait]
impl DurationOracle for SymphoniaDurationOracle {
    async fn measure(&self, clip: &AudioBytes) -> Result<f64, MeasurementError> {
        let clip = clip.clone();
        // Декодирование блокирует поток, уводим его с рантайма
        tokio::task::spawn_blocking(move || measure_duration(&clip))
            .await
            .map_err(|e| MeasurementError::Decode(format!("measurement task failed: {}", e)))?
    }
}

/// Вычисляет длительность сжатого аудио в секундах.
///
/// # Ошибки
///
/// * `MeasurementError::EmptyPayload` - пустые данные
/// * `MeasurementError::Probe` - формат не распознан
/// * `MeasurementError::NoTrack` - в контейнере нет аудио-трека
/// * `MeasurementError::Decode` - не удалось декодировать ни одного кадра
pub fn measure_duration(data: &[u8]) -> Result<f64, MeasurementError> {
    if data.is_empty() {
        return Err(MeasurementError::EmptyPayload);
    }

    let cursor = std::io::Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe()
        .format(&Hint::new(), mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MeasurementError::Probe(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(MeasurementError::NoTrack)?;

    let track_id = track.id;
    let params = track.codec_params.clone();

    if let (Some(n_frames), Some(time_base)) = (params.n_frames, params.time_base) {
        let time = time_base.calc_time(n_frames);
        let seconds = time.seconds as f64 + time.frac;
        if seconds > 0.0 {
            debug!("Duration from container header: {:.3}s", seconds);
            return Ok(seconds);
        }
    }
    if let (Some(n_frames), Some(sample_rate)) = (params.n_frames, params.sample_rate) {
        if n_frames > 0 && sample_rate > 0 {
            return Ok(n_frames as f64 / sample_rate as f64);
        }
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| MeasurementError::Decode(e.to_string()))?;

    let mut sample_rate = params.sample_rate;
    let mut frames: u64 = 0;

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                frames += decoded.frames() as u64;
                if sample_rate.is_none() {
                    sample_rate = Some(decoded.spec().rate);
                }
            }
            // Повреждённый пакет пропускаем, остальные ошибки фатальны
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(MeasurementError::Decode(e.to_string())),
        }
    }

    let sample_rate = sample_rate
        .filter(|rate| *rate > 0)
        .ok_or(MeasurementError::UnknownSampleRate)?;
    if frames == 0 {
        return Err(MeasurementError::Decode("no audio frames decoded".to_string()));
    }

    let seconds = frames as f64 / sample_rate as f64;
    debug!("Duration from decoded frames: {:.3}s ({} frames)", seconds, frames);
    Ok(seconds)
}
