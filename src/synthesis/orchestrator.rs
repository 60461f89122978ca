//! Оркестратор озвучивания
//!
//! Два режима: весь текст одной задачей или каждая строка отдельной задачей.
//! Ошибка одной строки не прерывает пакет; остановка пользователем помечает
//! оставшиеся строки как необработанные.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::units::{split_lines, summarize, BatchReport, SynthesisUnit, UnitOutcome};
use crate::api::{PayloadKind, PollOptions, SubmitRequest, SynthesisTask, TaskService};
use crate::config::{SynthesisConfig, SynthesisMode};
use crate::error::{Result, VoiceSyncError};
use crate::media::AudioEditor;
use crate::progress::{ProgressPhase, ProgressReporter, ProgressUpdate};
use crate::utils::temp::StagedFile;

/// Базовое имя файла в режиме целого текста
const FULL_OUTPUT_STEM: &str = "output";

/// Куда и как сохранять результат единицы
#[derive(Debug, Clone, Copy)]
enum Destination {
    /// `output.<ext>` без перезаписи существующих файлов
    Full,
    /// `<index>.mp3`
    Line(usize),
}

/// Оркестратор озвучивания
pub struct SynthesisOrchestrator<S: TaskService, E: AudioEditor> {
    service: S,
    editor: E,
    config: SynthesisConfig,
    reporter: Arc<ProgressReporter>,
}

impl<S: TaskService, E: AudioEditor> SynthesisOrchestrator<S, E> {
    pub fn new(service: S, editor: E, config: SynthesisConfig, reporter: Arc<ProgressReporter>) -> Self {
        Self {
            service,
            editor,
            config,
            reporter,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Озвучить текст в выбранном режиме
    pub async fn run(&self, text: &str, mode: SynthesisMode, cancel: &CancellationToken) -> Result<BatchReport> {
        match mode {
            SynthesisMode::FullText => self.synthesize_full(text, cancel).await,
            SynthesisMode::LineByLine => self.synthesize_lines(text, cancel).await,
        }
    }

    /// Весь текст одной задачей в `output.<ext>`
    pub async fn synthesize_full(&self, text: &str, cancel: &CancellationToken) -> Result<BatchReport> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceSyncError::Configuration("Text is empty".to_string()));
        }
        std::fs::create_dir_all(&self.config.output_dir)?;

        let mut unit = SynthesisUnit::new(None, text);
        let outcome = if cancel.is_cancelled() {
            UnitOutcome::NotAttempted
        } else {
            let result = self
                .process_unit(1, 1, text, self.config.full_max_attempts, Destination::Full, cancel)
                .await;
            match result {
                Ok(path) => UnitOutcome::Succeeded(path),
                Err(e) if e.is_cancelled() => UnitOutcome::Cancelled,
                Err(e) => {
                    log::error!("Synthesis failed: {}", e);
                    UnitOutcome::Failed(e.to_string())
                }
            }
        };
        unit.settle(outcome);

        Ok(self.finish(vec![unit], cancel))
    }

    /// Каждая непустая строка отдельной задачей в `<номер>.mp3`
    pub async fn synthesize_lines(&self, text: &str, cancel: &CancellationToken) -> Result<BatchReport> {
        let mut units = split_lines(text);
        if units.is_empty() {
            return Err(VoiceSyncError::Configuration("Text has no lines".to_string()));
        }
        std::fs::create_dir_all(&self.config.output_dir)?;
        log::info!(
            "Synthesizing {} lines into {}",
            units.len(),
            self.config.output_dir.display()
        );

        let outcomes = if self.config.max_concurrent_units > 1 {
            self.run_lines_concurrently(&units, cancel).await
        } else {
            self.run_lines_sequentially(&units, cancel).await
        };
        for (unit, outcome) in units.iter_mut().zip(outcomes) {
            unit.settle(outcome);
        }

        Ok(self.finish(units, cancel))
    }

    async fn run_lines_sequentially(&self, units: &[SynthesisUnit], cancel: &CancellationToken) -> Vec<UnitOutcome> {
        let total = units.len();
        let mut outcomes = Vec::with_capacity(total);

        for (position, unit) in units.iter().enumerate() {
            if cancel.is_cancelled() {
                log::warn!("Stopped before line {}, {} lines skipped", position + 1, total - position);
                outcomes.resize(total, UnitOutcome::NotAttempted);
                break;
            }
            outcomes.push(self.run_line(position + 1, total, &unit.text, cancel).await);
        }

        outcomes
    }

    async fn run_lines_concurrently(&self, units: &[SynthesisUnit], cancel: &CancellationToken) -> Vec<UnitOutcome> {
        let total = units.len();
        let semaphore = Semaphore::new(self.config.max_concurrent_units);
        log::info!("Running up to {} lines at once", self.config.max_concurrent_units);

        let tasks = units.iter().enumerate().map(|(position, unit)| {
            let semaphore = &semaphore;
            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return UnitOutcome::NotAttempted;
                };
                if cancel.is_cancelled() {
                    return UnitOutcome::NotAttempted;
                }
                self.run_line(position + 1, total, &unit.text, cancel).await
            }
        });

        join_all(tasks).await
    }

    async fn run_line(&self, number: usize, total: usize, text: &str, cancel: &CancellationToken) -> UnitOutcome {
        let result = self
            .process_unit(number, total, text, self.config.line_max_attempts, Destination::Line(number), cancel)
            .await;
        match result {
            Ok(path) => UnitOutcome::Succeeded(path),
            Err(e) if e.is_cancelled() => UnitOutcome::Cancelled,
            Err(e) => {
                log::error!("Line {} failed: {}", number, e);
                UnitOutcome::Failed(format!("Line {}: {}", number, e))
            }
        }
    }

    /// Отправка, ожидание, загрузка и сохранение одной единицы
    async fn process_unit(
        &self,
        number: usize,
        total: usize,
        text: &str,
        max_attempts: u32,
        destination: Destination,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        self.notify(number, total, "Submitting", None, ProgressPhase::UnitStarted);

        let result = async {
            let payload = self.synthesize(number, total, text, max_attempts, cancel).await?;
            self.store(&payload, destination).await
        }
        .await;

        let label = match &result {
            Ok(_) => "Done",
            Err(e) if e.is_cancelled() => "Cancelled",
            Err(_) => "Failed",
        };
        self.notify(number, total, label, None, ProgressPhase::UnitFinished);
        result
    }

    async fn synthesize(
        &self,
        number: usize,
        total: usize,
        text: &str,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let request = SubmitRequest {
            template_uuid: &self.config.template_id,
            text,
            chunk_size: self.config.chunk_size,
        };
        let mut task = SynthesisTask::new(self.service.submit(&request).await?);
        let task_id = task.id.clone();
        log::debug!("Task {} submitted for unit {}/{}", task_id, number, total);

        let options = PollOptions::new(self.config.poll_interval(), max_attempts);
        let outcome = crate::api::await_completion(&self.service, &task_id, &options, cancel, |status, attempt| {
            task.update(status);
            self.notify(number, total, task.status.label(), Some(attempt), ProgressPhase::Polling);
        })
        .await;
        log::info!(
            "Task {} stopped waiting at '{}' after {}s",
            task.id,
            task.status.label(),
            task.elapsed_secs()
        );
        outcome.into_result()?;

        self.service.fetch_result(&task_id).await
    }

    /// Записать результат во временный файл, обработать и перенести на место
    async fn store(&self, payload: &[u8], destination: Destination) -> Result<PathBuf> {
        let kind = PayloadKind::sniff(payload);
        let target = match destination {
            Destination::Full => full_output_path(&self.config.output_dir, kind.extension()),
            Destination::Line(number) => self.config.output_dir.join(format!("{}.mp3", number)),
        };

        let staged = StagedFile::for_target(&target)?;
        tokio::fs::write(staged.path(), payload).await?;

        if kind == PayloadKind::Mp3 {
            self.post_process(staged.path()).await?;
        } else {
            log::warn!("Result for {} is an archive, post-processing skipped", target.display());
        }

        let path = match destination {
            Destination::Full => staged.commit_new()?,
            Destination::Line(_) => staged.commit()?,
        };
        log::info!("Saved {}", path.display());
        Ok(path)
    }

    async fn post_process(&self, path: &Path) -> Result<()> {
        if self.config.trailing_pause_secs > 0.0 {
            self.editor
                .append_silence(path, self.config.trailing_pause_secs)
                .await?;
        }
        if let Some(target) = self.config.target_duration_secs {
            self.editor.retime(path, target).await?;
        }
        Ok(())
    }

    fn notify(&self, number: usize, total: usize, label: &str, attempt: Option<u32>, phase: ProgressPhase) {
        self.reporter
            .notify_progress(&ProgressUpdate::new(number, total, label, attempt, phase));
    }

    fn finish(&self, units: Vec<SynthesisUnit>, cancel: &CancellationToken) -> BatchReport {
        let summary = summarize(&units, cancel.is_cancelled());
        log::info!("{}", summary.headline());
        if !summary.failures.is_empty() {
            log::warn!("Failures:\n{}", summary.failure_digest());
        }
        self.reporter.notify_batch_complete(&summary);
        BatchReport { units, summary }
    }
}

/// `output.<ext>`, а если он занят - `output_<unix time>.<ext>`
fn full_output_path(dir: &Path, extension: &str) -> PathBuf {
    let plain = dir.join(format!("{}.{}", FULL_OUTPUT_STEM, extension));
    if !plain.exists() {
        return plain;
    }

    let stamp = chrono::Utc::now().timestamp();
    let stamped = dir.join(format!("{}_{}.{}", FULL_OUTPUT_STEM, stamp, extension));
    if !stamped.exists() {
        return stamped;
    }

    (1u32..)
        .map(|n| dir.join(format!("{}_{}_{}.{}", FULL_OUTPUT_STEM, stamp, n, extension)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(stamped)
}
