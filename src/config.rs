//! Модуль конфигурации библиотеки voiceover-sync
//!
//! Этот модуль содержит структуры и перечисления для настройки библиотеки.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoiceSyncError};

/// Адрес Voice API по умолчанию
pub const DEFAULT_API_BASE_URL: &str = "https://voiceapi.csv666.ru";

/// Размер чанка по умолчанию, если чанки включены
pub const DEFAULT_CHUNK_SIZE: u32 = 1000;

/// Допустимый диапазон размера чанка
pub const CHUNK_SIZE_RANGE: std::ops::RangeInclusive<u32> = 500..=5000;

/// Метод подгонки длительности видео под озвучку
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FitPolicy {
    /// Ускорение/замедление видео под длину аудио
    #[default]
    #[serde(alias = "fit")]
    Stretch,
    /// Обрезка более длинного клипа
    Trim,
    /// Без изменений
    None,
}

impl FitPolicy {
    /// Получить строковое представление метода
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stretch => "stretch",
            Self::Trim => "trim",
            Self::None => "none",
        }
    }
}

/// Что делать с оригинальной звуковой дорожкой видео
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AudioMix {
    /// Озвучка полностью заменяет оригинал
    ReplaceOnly,
    /// Оригинал подмешивается с указанной громкостью (0-100%)
    MixOriginal { volume_percent: u8 },
}

impl Default for AudioMix {
    fn default() -> Self {
        Self::MixOriginal { volume_percent: 30 }
    }
}

impl AudioMix {
    /// Коэффициент усиления оригинала, если он подмешивается
    pub fn original_gain(&self) -> Option<f32> {
        match self {
            Self::ReplaceOnly => None,
            Self::MixOriginal { volume_percent } => Some(f32::from(*volume_percent) / 100.0),
        }
    }
}

/// Режим озвучивания
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMode {
    /// Весь текст одной задачей
    #[default]
    FullText,
    /// Каждая непустая строка отдельной задачей
    LineByLine,
}

/// Настройки подключения к Voice API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Базовый адрес сервиса
    pub base_url: String,
    /// Ключ API (заголовок `X-API-Key`)
    pub api_key: String,
    pub submit_timeout_secs: u64,
    pub status_timeout_secs: u64,
    pub result_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: String::new(),
            submit_timeout_secs: 30,
            status_timeout_secs: 10,
            result_timeout_secs: 60,
        }
    }
}

impl ApiConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    pub fn result_timeout(&self) -> Duration {
        Duration::from_secs(self.result_timeout_secs)
    }
}

/// Настройки озвучивания
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// UUID шаблона голоса
    pub template_id: String,
    /// Размер чанка; `None` - весь текст целиком
    pub chunk_size: Option<u32>,
    /// Папка для аудиофайлов
    pub output_dir: PathBuf,
    /// Пауза в конце каждого файла, секунды
    pub trailing_pause_secs: f64,
    /// Целевая длительность аудио (изменение скорости), секунды
    pub target_duration_secs: Option<f64>,
    /// Интервал опроса статуса задачи, секунды
    pub poll_interval_secs: f64,
    /// Лимит опросов в режиме целого текста
    pub full_max_attempts: u32,
    /// Лимит опросов в построчном режиме
    pub line_max_attempts: u32,
    /// Сколько строк озвучивать одновременно (1 - последовательно)
    pub max_concurrent_units: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            template_id: String::new(),
            chunk_size: None,
            output_dir: PathBuf::from("output_audio"),
            trailing_pause_secs: 0.0,
            target_duration_secs: None,
            poll_interval_secs: 1.0,
            full_max_attempts: 300,
            line_max_attempts: 120,
            max_concurrent_units: 1,
        }
    }
}

impl SynthesisConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs.max(0.0))
    }
}

/// Настройки замены звука в видео
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub fit_policy: FitPolicy,
    pub audio_mix: AudioMix,
    /// Папка для готовых видео
    pub output_dir: PathBuf,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            fit_policy: FitPolicy::default(),
            audio_mix: AudioMix::default(),
            output_dir: PathBuf::from("output_video"),
        }
    }
}

/// Вид перехода между роликами при монтаже
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Плавное затухание одного клипа в другой
    #[default]
    Crossfade,
    /// Затухание через чёрный
    Fade,
    Dissolve,
    Wipe,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
}

impl TransitionKind {
    /// Имя перехода в фильтре `xfade`
    pub fn xfade_name(&self) -> &'static str {
        match self {
            Self::Crossfade => "fade",
            Self::Fade => "fadeblack",
            Self::Dissolve => "dissolve",
            Self::Wipe => "wipeleft",
            Self::SlideLeft => "slideleft",
            Self::SlideRight => "slideright",
            Self::SlideUp => "slideup",
            Self::SlideDown => "slidedown",
        }
    }
}

/// Переход между соседними роликами
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Transition {
    pub kind: TransitionKind,
    /// Длительность перехода, секунды
    pub duration_secs: f64,
}

impl Default for Transition {
    fn default() -> Self {
        Self {
            kind: TransitionKind::default(),
            duration_secs: 0.5,
        }
    }
}

/// Настройки монтажа
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MontageConfig {
    /// `None` - склейка без перекодирования
    pub transition: Option<Transition>,
}

/// Конфигурация библиотеки
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSyncConfig {
    pub api: ApiConfig,
    pub synthesis: SynthesisConfig,
    pub merge: MergeConfig,
    pub montage: MontageConfig,
    /// Явный путь к ffmpeg (иначе ищется в PATH)
    pub ffmpeg_path: Option<PathBuf>,
    /// Явный путь к ffprobe (иначе ищется в PATH)
    pub ffprobe_path: Option<PathBuf>,
}

impl VoiceSyncConfig {
    /// Загрузить конфигурацию из JSON-файла; отсутствующие ключи берутся по умолчанию
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        log::debug!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Проверить согласованность настроек
    pub fn validate(&self) -> Result<()> {
        let synthesis = &self.synthesis;

        if synthesis.template_id.trim().is_empty() {
            return Err(VoiceSyncError::Configuration(
                "Voice template id is required".to_string(),
            ));
        }
        if let Some(size) = synthesis.chunk_size {
            if !CHUNK_SIZE_RANGE.contains(&size) {
                return Err(VoiceSyncError::Configuration(format!(
                    "Chunk size {} is outside {}..={}",
                    size,
                    CHUNK_SIZE_RANGE.start(),
                    CHUNK_SIZE_RANGE.end()
                )));
            }
        }
        if !synthesis.trailing_pause_secs.is_finite() || synthesis.trailing_pause_secs < 0.0 {
            return Err(VoiceSyncError::Configuration(format!(
                "Trailing pause must be non-negative, got {}",
                synthesis.trailing_pause_secs
            )));
        }
        if let Some(target) = synthesis.target_duration_secs {
            if !target.is_finite() || target <= 0.0 {
                return Err(VoiceSyncError::Configuration(format!(
                    "Target duration must be positive, got {}",
                    target
                )));
            }
        }
        if synthesis.full_max_attempts == 0 || synthesis.line_max_attempts == 0 {
            return Err(VoiceSyncError::Configuration(
                "Poll attempt limits must be at least 1".to_string(),
            ));
        }
        if synthesis.max_concurrent_units == 0 {
            return Err(VoiceSyncError::Configuration(
                "max_concurrent_units must be at least 1".to_string(),
            ));
        }
        if let AudioMix::MixOriginal { volume_percent } = self.merge.audio_mix {
            if volume_percent > 100 {
                return Err(VoiceSyncError::Configuration(format!(
                    "Original audio volume {}% is above 100%",
                    volume_percent
                )));
            }
        }
        self.validate_montage()
    }

    /// Проверить настройки монтажа (ключ API и шаблон для него не нужны)
    pub fn validate_montage(&self) -> Result<()> {
        if let Some(transition) = &self.montage.transition {
            if !transition.duration_secs.is_finite() || transition.duration_secs <= 0.0 {
                return Err(VoiceSyncError::Configuration(format!(
                    "Transition duration must be positive, got {}",
                    transition.duration_secs
                )));
            }
        }
        Ok(())
    }
}
