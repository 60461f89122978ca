//! Модуль обработки ошибок библиотеки voiceover-sync
//! 
//! Этот модуль содержит типы ошибок, которые могут возникнуть при работе библиотеки.

use thiserror::Error;

/// Ошибки библиотеки voiceover-sync
#[derive(Debug, Error)]
pub enum VoiceSyncError {
    /// Сетевая ошибка или обрыв соединения
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Сервис ответил не-2xx статусом
    #[error("Service rejected request: {0}")]
    ServiceRejected(String),

    /// Задача не дошла до терминального статуса за отведённое число опросов
    #[error("Task did not finish after {attempts} polls")]
    TimedOut { attempts: u32 },

    /// Остановлено пользователем
    #[error("Cancelled by user")]
    Cancelled,

    /// Сервис завершил задачу со статусом `error`
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// Исходный медиафайл не читается или повреждён
    #[error("Unreadable media: {0}")]
    UnreadableMedia(String),

    /// Ошибка кодировщика
    #[error("Encode failure: {0}")]
    EncodeFailure(String),

    /// Не найдено ни одной пары видео/аудио
    #[error("No video/audio pairs found")]
    NoPairsFound,

    /// Не удалось создать резервную копию перед переименованием
    #[error("Backup failed: {0}")]
    BackupFailed(String),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl VoiceSyncError {
    /// Остановка пользователем, а не сбой
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for VoiceSyncError {
    fn from(err: reqwest::Error) -> Self {
        VoiceSyncError::Transport(err.to_string())
    }
}

/// Тип Result для библиотеки voiceover-sync
pub type Result<T> = std::result::Result<T, VoiceSyncError>;
