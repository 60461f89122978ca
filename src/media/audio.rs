//! Модуль для работы с аудио
//!
//! Постобработка озвучки: пауза в конце и подгонка темпа под целевую
//! длительность. Обработка идёт во временный файл рядом с исходным, который
//! затем атомарно заменяет оригинал.

use std::path::Path;

use async_trait::async_trait;

use super::ffmpeg::FfmpegBackend;
use super::{AudioEditor, MediaBackend, MediaKind};
use crate::error::{Result, VoiceSyncError};
use crate::utils::temp::StagedFile;

/// Границы одного фильтра atempo
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

/// Отклонение темпа, которое считаем несущественным
const TEMPO_EPSILON: f64 = 0.005;

/// Разбить коэффициент темпа на цепочку множителей в пределах 0.5..=2.0.
///
/// Возвращает пустой вектор для коэффициента, близкого к единице.
pub fn atempo_factors(factor: f64) -> Vec<f64> {
    let mut factors = Vec::new();
    if !factor.is_finite() || factor <= 0.0 || (factor - 1.0).abs() < TEMPO_EPSILON {
        return factors;
    }

    let mut remaining = factor;
    while remaining > ATEMPO_MAX {
        factors.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        factors.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    factors.push(remaining);
    factors
}

/// Цепочка фильтров `atempo=..,atempo=..` или `None`, если темп не меняется
pub fn atempo_chain(factor: f64) -> Option<String> {
    let factors = atempo_factors(factor);
    if factors.is_empty() {
        return None;
    }
    Some(
        factors
            .iter()
            .map(|f| format!("atempo={:.6}", f))
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Фильтр добавления тишины в конец
pub fn silence_filter(seconds: f64) -> String {
    format!("apad=pad_dur={:.3}", seconds)
}

impl FfmpegBackend {
    /// Прогнать аудиофайл через фильтр и заменить оригинал результатом
    async fn filter_in_place(&self, path: &Path, filter: &str) -> Result<()> {
        let staged = StagedFile::for_target(path)?;
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            path.to_string_lossy().into_owned(),
            "-filter:a".to_string(),
            filter.to_string(),
            "-c:a".to_string(),
            "libmp3lame".to_string(),
            "-q:a".to_string(),
            "2".to_string(),
            staged.path().to_string_lossy().into_owned(),
        ];
        self.run_ffmpeg(&args).await?;
        staged.commit()?;
        Ok(())
    }
}

#[async_trait]
impl AudioEditor for FfmpegBackend {
    async fn append_silence(&self, path: &Path, seconds: f64) -> Result<()> {
        if seconds <= 0.0 {
            return Ok(());
        }
        log::debug!("Appending {:.2}s of silence to {}", seconds, path.display());
        self.filter_in_place(path, &silence_filter(seconds)).await
    }

    async fn retime(&self, path: &Path, target_secs: f64) -> Result<()> {
        if !target_secs.is_finite() || target_secs <= 0.0 {
            return Err(VoiceSyncError::Configuration(format!(
                "Invalid target duration: {}",
                target_secs
            )));
        }

        let current = self.probe(path, MediaKind::Audio).await?.duration_secs;
        let factor = current / target_secs;
        let Some(chain) = atempo_chain(factor) else {
            log::debug!("{} already matches {:.2}s", path.display(), target_secs);
            return Ok(());
        };

        log::info!(
            "Retiming {} from {:.2}s to {:.2}s (x{:.3})",
            path.display(),
            current,
            target_secs,
            factor
        );
        self.filter_in_place(path, &chain).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(factors: &[f64]) -> f64 {
        factors.iter().product()
    }

    #[test]
    fn test_atempo_factors_in_range() {
        assert_eq!(atempo_factors(1.25), vec![1.25]);

        let fast = atempo_factors(5.0);
        assert!(fast.iter().all(|f| (ATEMPO_MIN..=ATEMPO_MAX).contains(f)));
        assert!((product(&fast) - 5.0).abs() < 1e-9);

        let slow = atempo_factors(0.2);
        assert!(slow.iter().all(|f| (ATEMPO_MIN..=ATEMPO_MAX).contains(f)));
        assert!((product(&slow) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_atempo_identity_and_invalid() {
        assert!(atempo_factors(1.0).is_empty());
        assert!(atempo_factors(1.001).is_empty());
        assert!(atempo_factors(0.0).is_empty());
        assert!(atempo_factors(f64::NAN).is_empty());
        assert_eq!(atempo_chain(1.0), None);
    }

    #[test]
    fn test_atempo_chain_format() {
        assert_eq!(atempo_chain(1.5).as_deref(), Some("atempo=1.500000"));
        assert_eq!(
            atempo_chain(3.0).as_deref(),
            Some("atempo=2.000000,atempo=1.500000")
        );
    }

    #[test]
    fn test_silence_filter() {
        assert_eq!(silence_filter(1.5), "apad=pad_dur=1.500");
    }

    #[tokio::test]
    async fn test_zero_pause_is_noop() {
        let backend = FfmpegBackend::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        backend
            .append_silence(Path::new("/nonexistent/1.mp3"), 0.0)
            .await
            .unwrap();
    }
}
