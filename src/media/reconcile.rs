//! Подгонка длительности видео под озвучку
//!
//! Сначала по длительностям и политике строится [`ReconciliationPlan`],
//! затем бэкенд кодирует результат по плану во временный файл, который
//! переносится на место только после успешного кодирования.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use super::{MediaBackend, MediaInfo, MediaKind};
use crate::config::{AudioMix, FitPolicy, MergeConfig};
use crate::error::{Result, VoiceSyncError};
use crate::files::pairing::{self, MediaPair};
use crate::progress::{BatchSummary, ProgressPhase, ProgressReporter, ProgressUpdate};
use crate::utils::temp::StagedFile;

/// Разница длительностей, ниже которой Stretch не трогает видео
pub const STRETCH_THRESHOLD_SECS: f64 = 0.1;

/// Что нужно сделать с дорожками пары
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationPlan {
    pub video_duration: f64,
    pub audio_duration: f64,
    /// Ускорение видео: новая длительность = `video_duration / speed`
    pub video_speed: Option<f64>,
    /// Обрезать видео до этой длительности
    pub video_trim: Option<f64>,
    /// Обрезать озвучку до этой длительности
    pub audio_trim: Option<f64>,
    /// Громкость исходной дорожки видео при подмешивании
    pub original_gain: Option<f32>,
    /// Длительность итогового файла
    pub output_duration: f64,
}

impl ReconciliationPlan {
    pub fn new(policy: FitPolicy, mix: AudioMix, video: MediaInfo, audio: MediaInfo) -> Result<Self> {
        let v = video.duration_secs;
        let a = audio.duration_secs;
        if !v.is_finite() || v <= 0.0 {
            return Err(VoiceSyncError::UnreadableMedia(format!("invalid video duration {}", v)));
        }
        if !a.is_finite() || a <= 0.0 {
            return Err(VoiceSyncError::UnreadableMedia(format!("invalid audio duration {}", a)));
        }

        let mut plan = Self {
            video_duration: v,
            audio_duration: a,
            video_speed: None,
            video_trim: None,
            audio_trim: None,
            original_gain: mix.original_gain().filter(|_| video.has_audio),
            output_duration: v,
        };

        match policy {
            FitPolicy::Stretch => {
                if (v - a).abs() > STRETCH_THRESHOLD_SECS {
                    plan.video_speed = Some(v / a);
                    plan.output_duration = a;
                }
            }
            FitPolicy::Trim => {
                if a > v {
                    plan.audio_trim = Some(v);
                } else if v > a {
                    plan.video_trim = Some(a);
                }
                plan.output_duration = v.min(a);
            }
            FitPolicy::None => {}
        }

        Ok(plan)
    }

    /// Длительность видеодорожки после обработки
    pub fn video_duration_after(&self) -> f64 {
        match (self.video_speed, self.video_trim) {
            (Some(speed), _) => self.video_duration / speed,
            (None, Some(trim)) => trim,
            (None, None) => self.video_duration,
        }
    }

    /// Длительность озвучки после обработки
    pub fn audio_duration_after(&self) -> f64 {
        self.audio_trim.unwrap_or(self.audio_duration)
    }
}

/// Граф фильтров ffmpeg и метки выходов
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGraph {
    pub filter_complex: String,
    pub video_label: String,
    pub audio_label: String,
}

/// Построить `-filter_complex` для плана.
///
/// Вход 0 - видео, вход 1 - озвучка.
pub fn build_filter_graph(plan: &ReconciliationPlan) -> FilterGraph {
    let mut chains = Vec::new();

    let video = match (plan.video_speed, plan.video_trim) {
        (Some(speed), _) => format!("[0:v]setpts=PTS/{:.6}[v]", speed),
        (None, Some(trim)) => format!("[0:v]trim=duration={:.3},setpts=PTS-STARTPTS[v]", trim),
        (None, None) => "[0:v]null[v]".to_string(),
    };
    chains.push(video);

    let narration_out = if plan.original_gain.is_some() { "[narr]" } else { "[a]" };
    let narration = match plan.audio_trim {
        Some(trim) => format!("[1:a]atrim=duration={:.3},asetpts=PTS-STARTPTS{}", trim, narration_out),
        None => format!("[1:a]anull{}", narration_out),
    };
    chains.push(narration);

    if let Some(gain) = plan.original_gain {
        let mut filters = Vec::new();
        if let Some(chain) = plan.video_speed.and_then(super::audio::atempo_chain) {
            filters.push(chain);
        }
        if let Some(trim) = plan.video_trim {
            filters.push(format!("atrim=duration={:.3},asetpts=PTS-STARTPTS", trim));
        }
        filters.push(format!("volume={:.2}", gain));
        chains.push(format!("[0:a]{}[orig]", filters.join(",")));
        // Длину итогового файла задаёт `-t`, смесь не должна обрываться раньше
        chains.push("[narr][orig]amix=inputs=2:duration=longest:dropout_transition=0:normalize=0[a]".to_string());
    }

    FilterGraph {
        filter_complex: chains.join(";"),
        video_label: "[v]".to_string(),
        audio_label: "[a]".to_string(),
    }
}

/// Задание на кодирование одной пары
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    pub video: &'a Path,
    pub audio: &'a Path,
    pub plan: &'a ReconciliationPlan,
    /// Куда писать (временный файл рядом с итоговым)
    pub output: &'a Path,
}

/// Склейка видео с озвучкой с подгонкой длительностей
pub struct MediaDurationReconciler<B: MediaBackend> {
    backend: B,
    policy: FitPolicy,
    mix: AudioMix,
}

impl<B: MediaBackend> MediaDurationReconciler<B> {
    pub fn new(backend: B, policy: FitPolicy, mix: AudioMix) -> Self {
        Self { backend, policy, mix }
    }

    pub fn from_config(backend: B, config: &MergeConfig) -> Self {
        Self::new(backend, config.fit_policy, config.audio_mix)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Свести одну пару в `output`.
    ///
    /// При ошибке кодирования `output` не создаётся и не изменяется.
    pub async fn reconcile(&self, video: &Path, audio: &Path, output: &Path) -> Result<ReconciliationPlan> {
        let video_info = self.backend.probe(video, MediaKind::Video).await?;
        let audio_info = self.backend.probe(audio, MediaKind::Audio).await?;
        let plan = ReconciliationPlan::new(self.policy, self.mix, video_info, audio_info)?;

        log::info!(
            "Merging {} ({:.2}s) with {} ({:.2}s), policy {}",
            video.display(),
            plan.video_duration,
            audio.display(),
            plan.audio_duration,
            self.policy.as_str()
        );

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let staged = StagedFile::for_target(output)?;
        let job = RenderJob {
            video,
            audio,
            plan: &plan,
            output: staged.path(),
        };
        self.backend.render(&job).await?;
        staged.commit()?;

        Ok(plan)
    }

    /// Свести все пары двух папок в `<output_dir>/<index>.mp4`
    pub async fn merge_directory(
        &self,
        video_dir: &Path,
        audio_dir: &Path,
        output_dir: &Path,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
    ) -> Result<BatchSummary> {
        let pairs = pairing::pair(video_dir, audio_dir)?;
        if pairs.is_empty() {
            return Err(VoiceSyncError::NoPairsFound);
        }
        std::fs::create_dir_all(output_dir)?;

        let total = pairs.len();
        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };
        log::info!("Merging {} pairs into {}", total, output_dir.display());

        for (position, pair) in pairs.iter().enumerate() {
            if cancel.is_cancelled() {
                log::warn!("Merge stopped before pair {}", pair.index);
                summary.cancelled = true;
                summary.not_attempted = total - position;
                break;
            }

            let unit = position + 1;
            reporter.notify_progress(&ProgressUpdate::new(
                unit,
                total,
                format!("Merging {}", pair.index),
                None,
                ProgressPhase::UnitStarted,
            ));

            let label = match self.merge_pair(pair, output_dir).await {
                Ok(()) => {
                    summary.succeeded += 1;
                    "Done".to_string()
                }
                Err(e) => {
                    log::error!("Pair {} failed: {}", pair.index, e);
                    summary.failures.push(format!("Pair {}: {}", pair.index, e));
                    "Failed".to_string()
                }
            };
            reporter.notify_progress(&ProgressUpdate::new(unit, total, label, None, ProgressPhase::UnitFinished));
        }

        log::info!("{}", summary.headline());
        reporter.notify_batch_complete(&summary);
        Ok(summary)
    }

    async fn merge_pair(&self, pair: &MediaPair, output_dir: &Path) -> Result<()> {
        let output = output_dir.join(format!("{}.mp4", pair.index));
        self.reconcile(&pair.video_path, &pair.audio_path, &output).await?;
        Ok(())
    }
}
