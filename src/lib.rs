//! Основной файл библиотеки voiceover-sync
//!
//! Пакетное производство озвучки: синтез речи через удалённый сервис задач,
//! подгонка видео под озвучку, склейка роликов и проверка нумерованных
//! последовательностей файлов. Прогресс всех пакетных операций доступен через
//! наблюдателей [`progress::ProgressObserver`].

pub mod api;
pub mod config;
pub mod error;
pub mod files;
pub mod logger;
pub mod media;
pub mod naming;
pub mod notification;
pub mod progress;
pub mod synthesis;
pub mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::models::{Balance, VoiceTemplate};
use crate::api::RemoteTaskClient;
use crate::config::{SynthesisMode, VoiceSyncConfig};
use crate::error::Result;
use crate::files::GapReport;
use crate::media::{FfmpegBackend, MediaDurationReconciler};
use crate::progress::{BatchSummary, ProgressObserver, ProgressReporter};
use crate::synthesis::{BatchReport, SynthesisOrchestrator};

pub use crate::error::VoiceSyncError;

/// Основная структура для работы с библиотекой
pub struct VoiceSync {
    /// Конфигурация библиотеки
    config: VoiceSyncConfig,
    /// Наблюдатели прогресса, общие для всех операций
    reporter: Arc<ProgressReporter>,
}

impl VoiceSync {
    /// Создать новый экземпляр с указанной конфигурацией
    pub fn new(config: VoiceSyncConfig) -> Self {
        Self {
            config,
            reporter: Arc::new(ProgressReporter::new()),
        }
    }

    pub fn config(&self) -> &VoiceSyncConfig {
        &self.config
    }

    pub fn reporter(&self) -> Arc<ProgressReporter> {
        Arc::clone(&self.reporter)
    }

    /// Добавить наблюдателя прогресса
    pub fn add_observer(&self, observer: Box<dyn ProgressObserver>) -> usize {
        self.reporter.add_observer(observer)
    }

    /// Удалить наблюдателя прогресса
    pub fn remove_observer(&self, id: usize) -> bool {
        self.reporter.remove_observer(id).is_some()
    }

    pub fn client(&self) -> Result<RemoteTaskClient> {
        RemoteTaskClient::new(&self.config.api)
    }

    /// ffmpeg/ffprobe из конфигурации или PATH
    pub fn media_backend(&self) -> Result<FfmpegBackend> {
        FfmpegBackend::locate(&self.config)
    }

    /// Баланс аккаунта
    pub async fn check_balance(&self) -> Result<Balance> {
        self.client()?.balance().await
    }

    /// Доступные шаблоны голосов
    pub async fn list_templates(&self) -> Result<Vec<VoiceTemplate>> {
        self.client()?.templates().await
    }

    /// Озвучить текст в выбранном режиме
    pub async fn synthesize(&self, text: &str, mode: SynthesisMode, cancel: &CancellationToken) -> Result<BatchReport> {
        self.config.validate()?;
        log::info!("Starting synthesis ({:?})", mode);

        let orchestrator = SynthesisOrchestrator::new(
            self.client()?,
            self.audio_editor()?,
            self.config.synthesis.clone(),
            self.reporter(),
        );
        orchestrator.run(text, mode, cancel).await
    }

    /// ffmpeg нужен синтезу только для постобработки
    fn audio_editor(&self) -> Result<FfmpegBackend> {
        let synthesis = &self.config.synthesis;
        let needs_ffmpeg = synthesis.trailing_pause_secs > 0.0 || synthesis.target_duration_secs.is_some();
        if needs_ffmpeg {
            return self.media_backend();
        }
        Ok(self
            .media_backend()
            .unwrap_or_else(|_| FfmpegBackend::new("ffmpeg", "ffprobe")))
    }

    /// Свести все пары папок в `merge.output_dir`
    pub async fn merge_directory(
        &self,
        video_dir: &Path,
        audio_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary> {
        let reconciler = MediaDurationReconciler::from_config(self.media_backend()?, &self.config.merge);
        reconciler
            .merge_directory(video_dir, audio_dir, &self.config.merge.output_dir, cancel, &self.reporter)
            .await
    }

    /// Склеить ролики папки в один файл (переходы из `montage.transition`)
    pub async fn montage(&self, dir: &Path, output: &Path) -> Result<PathBuf> {
        self.config.validate_montage()?;
        let transition = self.config.montage.transition.as_ref();
        media::concat::concat_videos(dir, output, transition, &self.media_backend()?).await
    }

    /// Найти картинки без роликов и подготовить отчёт
    pub fn audit(&self, video_dir: &Path, image_dir: &Path, report_dir: &Path) -> Result<GapReport> {
        files::audit_gaps(video_dir, image_dir, report_dir)
    }

    /// Убрать дублированные номера из имён (с резервной копией)
    pub fn normalize_names(&self, dir: &Path) -> Result<usize> {
        files::normalize_names(dir)
    }

    /// Перенумеровать файлы подряд (с резервной копией)
    pub fn renumber(&self, dir: &Path) -> Result<usize> {
        files::renumber_sequential(dir)
    }
}

impl Default for VoiceSync {
    fn default() -> Self {
        Self::new(VoiceSyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::MemoryProgressObserver;

    #[tokio::test]
    async fn test_synthesize_requires_template() {
        let voice_sync = VoiceSync::default();
        let result = voice_sync
            .synthesize("text", SynthesisMode::FullText, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(VoiceSyncError::Configuration(_))));
    }

    #[test]
    fn test_observers_are_shared() {
        let voice_sync = VoiceSync::default();
        let id = voice_sync.add_observer(Box::new(MemoryProgressObserver::new()));
        assert!(voice_sync.remove_observer(id));
        assert!(!voice_sync.remove_observer(id));
    }

    #[tokio::test]
    async fn test_check_balance() {
        let mut server = mockito::Server::new_async().await;
        let _balance = server
            .mock("GET", "/balance")
            .with_status(200)
            .with_body(r#"{"balance": 42.5}"#)
            .create_async()
            .await;

        let mut config = VoiceSyncConfig::default();
        config.api.base_url = server.url();
        let balance = VoiceSync::new(config).check_balance().await.unwrap();
        assert_eq!(balance.balance, 42.5);
    }

    #[test]
    fn test_audit_through_facade() {
        let videos = tempfile::tempdir().unwrap();
        let images = tempfile::tempdir().unwrap();
        let report = tempfile::tempdir().unwrap();
        std::fs::write(images.path().join("1.png"), b"").unwrap();

        let gaps = VoiceSync::default()
            .audit(videos.path(), images.path(), report.path())
            .unwrap();
        assert_eq!(gaps.missing, vec![1]);
    }
}
