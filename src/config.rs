//! Модуль конфигурации библиотеки narration-sync
//!
//! Все числовые параметры сходимости (число попыток, целевая скорость, границы
//! диапазонов) собраны здесь, чтобы их можно было тестировать и настраивать.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NarrationError, Result};

/// Переменная окружения с ключом OpenAI
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Модель TTS для использования с OpenAI API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TtsModel {
    /// Стандартная модель
    #[default]
    Standard,
    /// Модель высокого качества
    HighDefinition,
}

impl TtsModel {
    /// Получить строковое представление модели
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "tts-1",
            Self::HighDefinition => "tts-1-hd",
        }
    }
}

/// Голос для использования с OpenAI API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TtsVoice {
    Alloy,
    Echo,
    Fable,
    Onyx,
    #[default]
    Nova,
    Shimmer,
}

impl TtsVoice {
    /// Получить строковое представление голоса
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Shimmer => "shimmer",
        }
    }
}

/// Диапазон допустимого коэффициента скорости (границы включительно)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpeedBand {
    pub min: f64,
    pub max: f64,
}

impl SpeedBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Диапазон первичного прохода: замедление не требуется
    pub const INITIAL: SpeedBand = SpeedBand::new(1.0, 1.5);

    /// Диапазон после коррекции текста: только ускорение
    pub const CORRECTION: SpeedBand = SpeedBand::new(1.1, 1.5);

    pub fn contains(&self, speed_factor: f64) -> bool {
        speed_factor >= self.min && speed_factor <= self.max
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite())
            || self.min <= 0.0
            || self.min > self.max
        {
            return Err(NarrationError::config(format!(
                "{} band [{}, {}] must be finite, positive and ordered",
                name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Параметры подгонки длительности
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Максимальное число попыток переписать текст одного сегмента
    pub max_attempts: u32,
    /// Максимальное число циклов коррекции
    pub max_cycles: u32,
    /// Целевой коэффициент скорости, передаваемый в LLM
    pub target_speed: f64,
    /// Диапазон, принимаемый после первичного синтеза
    pub initial_band: SpeedBand,
    /// Диапазон, принимаемый после коррекции текста
    pub correction_band: SpeedBand,
    /// Размер пакета одновременных запросов к TTS
    pub batch_size: usize,
    /// Пауза между пакетами, мс
    pub inter_batch_delay_ms: u64,
    /// Таймаут одного обращения к внешнему сервису, с
    pub oracle_timeout_secs: u64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_cycles: 3,
            target_speed: 1.2,
            initial_band: SpeedBand::INITIAL,
            correction_band: SpeedBand::CORRECTION,
            batch_size: 10,
            inter_batch_delay_ms: 1000,
            oracle_timeout_secs: 60,
        }
    }
}

impl FitConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    /// Проверить согласованность параметров
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(NarrationError::config("batch_size must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(NarrationError::config("max_attempts must be at least 1"));
        }
        // Сегмент, не сошедшийся за все циклы, должен успеть исчерпать попытки
        if self.max_cycles < self.max_attempts {
            return Err(NarrationError::config(format!(
                "max_cycles ({}) must not be less than max_attempts ({})",
                self.max_cycles, self.max_attempts
            )));
        }
        if self.oracle_timeout_secs == 0 {
            return Err(NarrationError::config("oracle_timeout_secs must be positive"));
        }
        if !self.target_speed.is_finite() || self.target_speed <= 0.0 {
            return Err(NarrationError::config(format!(
                "target_speed must be positive, got {}",
                self.target_speed
            )));
        }
        self.initial_band.validate("initial")?;
        self.correction_band.validate("correction")?;
        Ok(())
    }
}

/// Настройки доступа к OpenAI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API ключ для OpenAI
    pub api_key: String,
    /// Базовый адрес API
    pub base_url: String,
    /// Модель TTS
    pub tts_model: TtsModel,
    /// Голос TTS
    pub tts_voice: TtsVoice,
    /// Модель для переписывания текста
    pub chat_model: String,
    /// Температура генерации при переписывании
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            tts_model: TtsModel::default(),
            tts_voice: TtsVoice::default(),
            chat_model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
        }
    }
}

/// Конфигурация библиотеки
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationSyncConfig {
    pub openai: OpenAiConfig,
    pub fit: FitConfig,
    /// Использовать кэширование синтезированных фрагментов
    pub use_caching: bool,
    /// Максимальное число фрагментов в кэше
    pub max_cache_entries: usize,
}

impl Default for NarrationSyncConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig::default(),
            fit: FitConfig::default(),
            use_caching: true,
            max_cache_entries: 512,
        }
    }
}

impl NarrationSyncConfig {
    /// Загрузить конфигурацию из JSON файла
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        log::debug!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Подставить ключ из окружения, если он не задан в файле
    pub fn with_env_overrides(mut self) -> Self {
        if self.openai.api_key.trim().is_empty() {
            if let Ok(key) = std::env::var(OPENAI_API_KEY_ENV) {
                self.openai.api_key = key;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.fit.validate()?;
        if self.use_caching && self.max_cache_entries == 0 {
            return Err(NarrationError::config(
                "max_cache_entries must be positive when caching is enabled",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NarrationSyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fit.max_attempts, 3);
        assert_eq!(config.fit.batch_size, 10);
        assert_eq!(config.fit.target_speed, 1.2);
        assert_eq!(config.fit.initial_band, SpeedBand::new(1.0, 1.5));
        assert_eq!(config.fit.correction_band, SpeedBand::new(1.1, 1.5));
    }

    #[test]
    fn test_band_bounds_are_inclusive() {
        let band = SpeedBand::CORRECTION;
        assert!(band.contains(1.1));
        assert!(band.contains(1.5));
        assert!(!band.contains(1.09));
        assert!(!band.contains(1.51));
    }

    #[test]
    fn test_invalid_fit_config() {
        let zero_batch = FitConfig { batch_size: 0, ..FitConfig::default() };
        assert!(matches!(zero_batch.validate(), Err(NarrationError::Config(_))));

        let few_cycles = FitConfig { max_cycles: 2, ..FitConfig::default() };
        assert!(few_cycles.validate().is_err());

        let inverted = FitConfig {
            correction_band: SpeedBand::new(1.5, 1.1),
            ..FitConfig::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "openai": { "tts_voice": "Onyx" }, "fit": { "batch_size": 4 } }"#,
        )
        .unwrap();

        let config = NarrationSyncConfig::from_json_file(&path).unwrap();
        assert_eq!(config.openai.tts_voice, TtsVoice::Onyx);
        assert_eq!(config.openai.tts_voice.as_str(), "onyx");
        assert_eq!(config.fit.batch_size, 4);
        assert_eq!(config.fit.max_cycles, 3);
        assert!(config.use_caching);
    }
}
