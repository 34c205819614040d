//! Переписывание текста под длительность слота
//!
//! Если озвученный фрагмент не укладывается в слот, LLM переписывает текст
//! так, чтобы при целевой скорости он занимал нужное время.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

pub use openai::OpenAiTextAdapter;

/// Запрос на переписывание текста
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteRequest {
    /// Текущий текст сегмента
    pub text: String,
    /// Длительность текущего фрагмента, с
    pub current_duration: f64,
    /// Длительность слота, с
    pub target_duration: f64,
    /// Текущий коэффициент скорости
    pub current_speed: f64,
    /// Желаемый коэффициент скорости
    pub target_speed: f64,
}

impl RewriteRequest {
    /// Длительность озвучки, к которой нужно прийти: слот, умноженный на целевую скорость
    pub fn desired_duration(&self) -> f64 {
        self.target_duration * self.target_speed
    }

    /// Оценка длины нового текста в символах
    ///
    /// Считается, что длительность речи пропорциональна числу символов.
    pub fn target_char_count(&self) -> usize {
        let chars = self.text.chars().count() as f64;
        if self.current_duration <= 0.0 {
            return chars as usize;
        }
        (chars * self.desired_duration() / self.current_duration).round().max(1.0) as usize
    }

    /// Нужно ли сократить текст (иначе удлинить)
    pub fn needs_shortening(&self) -> bool {
        self.current_speed > self.target_speed
    }
}

/// Сервис переписывания текста
#[async_trait]
pub trait TextAdapter: Send + Sync {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<String, OracleError>;
}
