//! Модуль для работы с FFmpeg
//!
//! Запуск ffmpeg/ffprobe и реализация [`MediaBackend`] поверх них.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::reconcile::{build_filter_graph, RenderJob};
use super::{probe, MediaBackend, MediaInfo, MediaKind};
use crate::config::VoiceSyncConfig;
use crate::error::{Result, VoiceSyncError};

/// Сколько последних строк stderr включать в сообщение об ошибке
const STDERR_TAIL_LINES: usize = 8;

/// Бэкенд на внешних ffmpeg и ffprobe
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegBackend {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Найти программы: явные пути из конфигурации или поиск в PATH
    pub fn locate(config: &VoiceSyncConfig) -> Result<Self> {
        let ffmpeg = resolve_tool("ffmpeg", config.ffmpeg_path.as_deref())?;
        let ffprobe = resolve_tool("ffprobe", config.ffprobe_path.as_deref())?;
        log::debug!("Using {} and {}", ffmpeg.display(), ffprobe.display());
        Ok(Self::new(ffmpeg, ffprobe))
    }

    /// Запуск ffmpeg; ненулевой код выхода - `EncodeFailure`
    pub async fn run_ffmpeg(&self, args: &[String]) -> Result<()> {
        log::debug!("ffmpeg {}", args.join(" "));
        let output = Command::new(&self.ffmpeg)
            .arg("-hide_banner")
            .arg("-nostdin")
            .args(args)
            .output()
            .await
            .map_err(|e| VoiceSyncError::EncodeFailure(format!("failed to start ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceSyncError::EncodeFailure(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&stderr)
            )));
        }

        Ok(())
    }

    /// Запуск ffprobe; ошибка означает нечитаемый файл
    pub async fn run_ffprobe(&self, args: &[&str], path: &Path) -> Result<String> {
        let output = Command::new(&self.ffprobe)
            .args(args)
            .arg(path)
            .output()
            .await
            .map_err(|e| VoiceSyncError::UnreadableMedia(format!("failed to start ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceSyncError::UnreadableMedia(format!(
                "{}: {}",
                path.display(),
                stderr_tail(&stderr)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Длительность контейнера по ffprobe
    pub async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let raw = self
            .run_ffprobe(
                &["-v", "error", "-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"],
                path,
            )
            .await?;
        parse_duration(&raw).ok_or_else(|| {
            VoiceSyncError::UnreadableMedia(format!(
                "{}: failed to parse duration '{}'",
                path.display(),
                raw.trim()
            ))
        })
    }

    /// Есть ли в файле хотя бы одна звуковая дорожка
    pub async fn has_audio_stream(&self, path: &Path) -> Result<bool> {
        let raw = self
            .run_ffprobe(
                &["-v", "error", "-select_streams", "a", "-show_entries", "stream=index", "-of", "csv=p=0"],
                path,
            )
            .await?;
        Ok(!raw.trim().is_empty())
    }
}

fn resolve_tool(name: &str, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    which::which(name)
        .map_err(|e| VoiceSyncError::Configuration(format!("{} not found in PATH: {}", name, e)))
}

fn parse_duration(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|duration| duration.is_finite() && *duration > 0.0)
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|line| !line.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn probe(&self, path: &Path, kind: MediaKind) -> Result<MediaInfo> {
        if !path.is_file() {
            return Err(VoiceSyncError::UnreadableMedia(format!(
                "{} does not exist",
                path.display()
            )));
        }

        match kind {
            MediaKind::Audio => {
                let owned = path.to_path_buf();
                let native = tokio::task::spawn_blocking(move || probe::audio_duration(&owned))
                    .await
                    .map_err(|e| VoiceSyncError::UnreadableMedia(e.to_string()))?;
                let duration = match native {
                    Ok(duration) => duration,
                    Err(e) => {
                        log::debug!("Native probe failed ({}), falling back to ffprobe", e);
                        self.probe_duration(path).await?
                    }
                };
                Ok(MediaInfo {
                    duration_secs: duration,
                    has_audio: true,
                })
            }
            MediaKind::Video | MediaKind::Image => Ok(MediaInfo {
                duration_secs: self.probe_duration(path).await?,
                has_audio: self.has_audio_stream(path).await?,
            }),
        }
    }

    async fn render(&self, job: &RenderJob<'_>) -> Result<()> {
        let graph = build_filter_graph(job.plan);

        let mut args: Vec<String> = vec![
            "-y".into(),
            "-i".into(),
            job.video.to_string_lossy().into_owned(),
            "-i".into(),
            job.audio.to_string_lossy().into_owned(),
            "-filter_complex".into(),
            graph.filter_complex,
        ];
        args.extend(["-map".into(), graph.video_label, "-map".into(), graph.audio_label]);
        args.extend([
            "-t".into(),
            format!("{:.3}", job.plan.output_duration),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "medium".into(),
            "-c:a".into(),
            "aac".into(),
            "-threads".into(),
            "4".into(),
            job.output.to_string_lossy().into_owned(),
        ]);

        self.run_ffmpeg(&args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12.480000\n"), Some(12.48));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration("0.000"), None);
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr: String = (1..=20).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 13"));
        assert!(tail.ends_with("line 20"));
    }

    #[test]
    fn test_explicit_tool_path_wins() {
        let mut config = VoiceSyncConfig::default();
        config.ffmpeg_path = Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        config.ffprobe_path = Some(PathBuf::from("/opt/ffmpeg/bin/ffprobe"));

        let backend = FfmpegBackend::locate(&config).unwrap();
        assert_eq!(backend.ffmpeg, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(backend.ffprobe, PathBuf::from("/opt/ffmpeg/bin/ffprobe"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_encode_failure() {
        let backend = FfmpegBackend::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        assert!(matches!(
            backend.run_ffmpeg(&["-version".to_string()]).await,
            Err(VoiceSyncError::EncodeFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let backend = FfmpegBackend::new("ffmpeg", "ffprobe");
        assert!(matches!(
            backend.probe(Path::new("/nonexistent/1.mp4"), MediaKind::Video).await,
            Err(VoiceSyncError::UnreadableMedia(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_wav_without_ffprobe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.wav");
        crate::media::probe::tests::write_silent_wav(&path, 1.5);

        let backend = FfmpegBackend::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let info = backend.probe(&path, MediaKind::Audio).await.unwrap();
        assert!((info.duration_secs - 1.5).abs() < 0.01);
        assert!(info.has_audio);
    }
}
