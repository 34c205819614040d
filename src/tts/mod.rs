//! Модуль для работы с TTS
//!
//! Синтез речи скрыт за трейтом [`SpeechSynthesizer`]; конвейер не знает,
//! какой сервис стоит за ним.

pub mod cache;
pub mod openai;
pub mod text;

use async_trait::async_trait;

use crate::error::OracleError;
use crate::segment::AudioBytes;

pub use cache::CachedSynthesizer;
pub use openai::OpenAiSpeech;

/// Сервис синтеза речи
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Озвучить текст указанным голосом
    async fn synthesize(&self, text: &str, voice: &str) -> Result<AudioBytes, OracleError>;
}
