//! Модуль для работы с медиафайлами
//!
//! Пробинг длительностей, постобработка озвучки, подгонка видео под аудио и
//! склейка роликов. Внешний кодировщик (ffmpeg) скрыт за трейтами
//! [`MediaBackend`] и [`AudioEditor`].

pub mod audio;
pub mod concat;
pub mod ffmpeg;
pub mod probe;
pub mod reconcile;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

pub use ffmpeg::FfmpegBackend;
pub use reconcile::{MediaDurationReconciler, ReconciliationPlan, RenderJob};

/// Тип медиафайла по расширению
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    /// Допустимые расширения (в нижнем регистре, без точки)
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Video => &["mp4", "avi", "mov", "mkv"],
            Self::Audio => &["mp3", "wav", "aac"],
            Self::Image => &["jpg", "jpeg", "png"],
        }
    }

    /// Подходит ли файл по расширению (без учёта регистра)
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions().contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}

/// Что известно о медиафайле после пробинга
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    /// Длительность в секундах
    pub duration_secs: f64,
    /// Есть ли звуковая дорожка
    pub has_audio: bool,
}

/// Пробинг и финальное кодирование пары видео/аудио
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Прочитать длительность и состав дорожек
    async fn probe(&self, path: &Path, kind: MediaKind) -> Result<MediaInfo>;

    /// Закодировать результат по плану в `job.output`
    async fn render(&self, job: &RenderJob<'_>) -> Result<()>;
}

/// Постобработка аудиофайла на месте
#[async_trait]
pub trait AudioEditor: Send + Sync {
    /// Дописать тишину в конец файла
    async fn append_silence(&self, path: &Path, seconds: f64) -> Result<()>;

    /// Изменить скорость так, чтобы длительность стала `target_secs`
    async fn retime(&self, path: &Path, target_secs: f64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_matches() {
        assert!(MediaKind::Video.matches(Path::new("1.MP4")));
        assert!(MediaKind::Video.matches(Path::new("dir/2. Closeup.mkv")));
        assert!(!MediaKind::Video.matches(Path::new("1.mp3")));
        assert!(MediaKind::Audio.matches(Path::new("3.wav")));
        assert!(MediaKind::Image.matches(Path::new("4.JPEG")));
        assert!(!MediaKind::Audio.matches(Path::new("noext")));
    }
}
