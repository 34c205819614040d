//! Сегменты озвучки и их состояние
//!
//! Сегмент проходит путь `Pending -> Synthesizing -> {Fitted | ReProcessing |
//! ForcedFit | Failed}`; из конвейера он выходит только в одном из конечных
//! состояний `Fitted`, `ForcedFit` или `Failed`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Идентификатор сегмента, уникальный в пределах одного запуска
pub type SegmentId = String;

/// Сжатые аудиоданные (mp3, wav и т.п.)
pub type AudioBytes = Bytes;

/// Состояние сегмента
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SegmentStatus {
    #[default]
    Pending,
    Synthesizing,
    /// Скорость в допустимом диапазоне, фрагмент подогнан под слот
    Fitted,
    /// Попытки исчерпаны, фрагмент принудительно растянут/сжат под слот
    ForcedFit,
    /// Синтез не удался, фрагмент не участвует в сборке
    Failed,
    ReProcessing,
}

impl SegmentStatus {
    /// Конечное ли это состояние
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fitted | Self::ForcedFit | Self::Failed)
    }

    /// Можно ли использовать фрагмент при сборке дорожки
    pub fn is_assemblable(&self) -> bool {
        matches!(self, Self::Fitted | Self::ForcedFit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synthesizing => "synthesizing",
            Self::Fitted => "fitted",
            Self::ForcedFit => "forced-fit",
            Self::Failed => "failed",
            Self::ReProcessing => "re-processing",
        }
    }
}

/// Синтезированный фрагмент с измеренной длительностью
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub bytes: AudioBytes,
    /// Длительность воспроизведения в секундах
    pub duration: f64,
}

impl AudioClip {
    pub fn new(bytes: impl Into<AudioBytes>, duration: f64) -> Self {
        Self {
            bytes: bytes.into(),
            duration,
        }
    }
}

/// Единица работы по озвучке
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    /// Исходный текст (не меняется)
    pub source_text: String,
    /// Текст, который сейчас озвучивается
    pub current_text: String,
    /// Начало слота, с
    pub slot_start: f64,
    /// Конец слота, с
    pub slot_end: f64,
    #[serde(default)]
    pub status: SegmentStatus,
    /// Число израсходованных циклов коррекции
    #[serde(default)]
    pub attempts: u32,
    #[serde(skip)]
    pub audio: Option<AudioClip>,
    /// Отношение длительности фрагмента к длительности слота
    #[serde(default)]
    pub speed_factor: Option<f64>,
    /// Цепочка ступеней изменения темпа, применённая при подгонке
    #[serde(default)]
    pub stretch_stages: Vec<f64>,
    /// Фрагмент, подогнанный точно под слот
    #[serde(skip)]
    pub fitted_audio: Option<AudioBytes>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Segment {
    /// Создать сегмент со случайным идентификатором
    pub fn new(text: impl Into<String>, slot_start: f64, slot_end: f64) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), text, slot_start, slot_end)
    }

    pub fn with_id(
        id: impl Into<SegmentId>,
        text: impl Into<String>,
        slot_start: f64,
        slot_end: f64,
    ) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            current_text: text.clone(),
            source_text: text,
            slot_start,
            slot_end,
            status: SegmentStatus::Pending,
            attempts: 0,
            audio: None,
            speed_factor: None,
            stretch_stages: Vec::new(),
            fitted_audio: None,
            last_error: None,
        }
    }

    /// Длительность слота в секундах
    pub fn slot_duration(&self) -> f64 {
        self.slot_end - self.slot_start
    }

    pub fn clip_duration(&self) -> Option<f64> {
        self.audio.as_ref().map(|clip| clip.duration)
    }

    /// Перевести сегмент в `Failed`, сохранив причину
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = SegmentStatus::Failed;
        self.audio = None;
        self.fitted_audio = None;
        self.last_error = Some(reason.into());
    }
}

/// Результат синтеза одного сегмента в пакете
#[derive(Debug)]
pub struct SynthesisResult {
    pub segment_id: SegmentId,
    /// Отсутствует, если синтез или измерение не удались
    pub clip: Option<AudioClip>,
    pub error: Option<String>,
}

impl SynthesisResult {
    pub fn succeeded(segment_id: SegmentId, clip: AudioClip) -> Self {
        Self {
            segment_id,
            clip: Some(clip),
            error: None,
        }
    }

    pub fn failed(segment_id: SegmentId, error: impl Into<String>) -> Self {
        Self {
            segment_id,
            clip: None,
            error: Some(error.into()),
        }
    }
}
