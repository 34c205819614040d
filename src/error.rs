//! Модуль обработки ошибок библиотеки narration-sync
//!
//! Ошибки разделены по источнику: внешние сервисы (TTS и переписывание текста),
//! измерение длительности, изменение темпа и некорректная конфигурация.
//! Все они сводятся к [`NarrationError`].

use std::time::Duration;
use thiserror::Error;

/// Ошибки внешних сервисов (TTS и LLM)
#[derive(Debug, Error)]
pub enum OracleError {
    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Сервис ответил статусом, отличным от успешного
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Пустой ответ сервиса
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// Превышено время ожидания ответа
    #[error("Oracle call timed out after {0:?}")]
    Timeout(Duration),

    /// Другая ошибка сервиса
    #[error("Oracle error: {0}")]
    Other(String),
}

/// Ошибки измерения длительности аудио
#[derive(Debug, Error)]
pub enum MeasurementError {
    #[error("Audio payload is empty")]
    EmptyPayload,

    #[error("Failed to probe audio format: {0}")]
    Probe(String),

    #[error("No audio track found")]
    NoTrack,

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Sample rate is unknown")]
    UnknownSampleRate,
}

/// Ошибки изменения темпа
#[derive(Debug, Error)]
pub enum StretchError {
    /// Коэффициент ступени вне допустимого диапазона примитива
    #[error("Stretch stage {factor} is outside of [{min}, {max}]")]
    OutOfDomain { factor: f64, min: f64, max: f64 },

    /// Некорректный общий коэффициент (ноль, отрицательный, NaN)
    #[error("Invalid speed factor: {0}")]
    InvalidFactor(f64),

    /// Ошибка внешнего инструмента (ffmpeg)
    #[error("Stretch primitive failed: {0}")]
    Primitive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ошибки библиотеки narration-sync
#[derive(Debug, Error)]
pub enum NarrationError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Measurement(#[from] MeasurementError),

    #[error(transparent)]
    Stretch(#[from] StretchError),

    /// Ошибка конфигурации или входных данных
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NarrationError {
    /// Создать ошибку конфигурации
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Тип Result для библиотеки narration-sync
pub type Result<T> = std::result::Result<T, NarrationError>;
