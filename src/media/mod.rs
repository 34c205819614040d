//! Модуль для работы с аудио
//!
//! Измерение длительности фрагментов и изменение их темпа.

pub mod duration;
pub mod stretch;

pub use duration::{DurationOracle, SymphoniaDurationOracle};
pub use stretch::{decompose, FfmpegTempoStretch, SpeedNormalizer, TimeStretch};
