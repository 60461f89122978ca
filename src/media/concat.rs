//! Монтаж: склейка всех роликов папки в один файл
//!
//! Без переходов ролики склеиваются concat-демультиплексором без
//! перекодирования, с переходами строится граф `xfade`/`acrossfade`.

use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::ffmpeg::FfmpegBackend;
use super::{MediaBackend, MediaInfo, MediaKind};
use crate::config::Transition;
use crate::error::{Result, VoiceSyncError};
use crate::naming::natural_sort_key;
use crate::utils::temp::StagedFile;

/// Видеофайлы папки в естественном порядке имён
pub fn collect_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut videos: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| MediaKind::Video.matches(path))
        .filter(|path| !is_hidden(path))
        .collect();

    videos.sort_by_cached_key(|path| {
        natural_sort_key(&path.file_name().unwrap_or_default().to_string_lossy())
    });
    Ok(videos)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Список для concat-демультиплексора ffmpeg
pub fn concat_list(videos: &[PathBuf]) -> String {
    videos
        .iter()
        .map(|path| {
            let escaped = path.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

/// Кадровая частота, к которой приводятся ролики перед `xfade`
const TRANSITION_FPS: u32 = 30;

/// Граф склейки с переходами
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionGraph {
    pub filter_complex: String,
    /// Звук склеивается, только если он есть у каждого ролика
    pub with_audio: bool,
    /// Длительность результата: сумма роликов минус перекрытия
    pub duration_secs: f64,
}

/// Построить цепочку `xfade` (и `acrossfade` для звука) для роликов по порядку
pub fn build_transition_graph(clips: &[MediaInfo], transition: &Transition) -> Result<TransitionGraph> {
    if clips.len() < 2 {
        return Err(VoiceSyncError::Configuration(
            "Transitions need at least two clips".to_string(),
        ));
    }
    if let Some(bad) = clips
        .iter()
        .find(|clip| !clip.duration_secs.is_finite() || clip.duration_secs <= 0.0)
    {
        return Err(VoiceSyncError::UnreadableMedia(format!(
            "invalid clip duration {}",
            bad.duration_secs
        )));
    }

    let fade = transition.duration_secs;
    let shortest = clips.iter().map(|clip| clip.duration_secs).fold(f64::INFINITY, f64::min);
    if !fade.is_finite() || fade <= 0.0 || fade >= shortest {
        return Err(VoiceSyncError::Configuration(format!(
            "Transition of {:.2}s does not fit the shortest clip ({:.2}s)",
            fade, shortest
        )));
    }

    let with_audio = clips.iter().all(|clip| clip.has_audio);
    let last = clips.len() - 1;

    let mut chains: Vec<String> = (0..clips.len())
        .map(|i| format!("[{}:v]settb=AVTB,fps={},format=yuv420p[v{}]", i, TRANSITION_FPS, i))
        .collect();

    let mut video_in = "[v0]".to_string();
    let mut audio_in = "[0:a]".to_string();
    let mut length = clips[0].duration_secs;
    for (i, clip) in clips.iter().enumerate().skip(1) {
        let video_out = if i == last { "[v]".to_string() } else { format!("[x{}]", i) };
        chains.push(format!(
            "{}[v{}]xfade=transition={}:duration={:.3}:offset={:.3}{}",
            video_in,
            i,
            transition.kind.xfade_name(),
            fade,
            length - fade,
            video_out
        ));
        video_in = video_out;

        if with_audio {
            let audio_out = if i == last { "[a]".to_string() } else { format!("[c{}]", i) };
            chains.push(format!("{}[{}:a]acrossfade=d={:.3}{}", audio_in, i, fade, audio_out));
            audio_in = audio_out;
        }

        length += clip.duration_secs - fade;
    }

    Ok(TransitionGraph {
        filter_complex: chains.join(";"),
        with_audio,
        duration_secs: length,
    })
}

/// Склеить ролики из `dir` в `output`.
///
/// Без `transition` ролики склеиваются без перекодирования; с ним
/// результат перекодируется в libx264/aac. Единственный ролик просто
/// копируется.
pub async fn concat_videos(
    dir: &Path,
    output: &Path,
    transition: Option<&Transition>,
    backend: &FfmpegBackend,
) -> Result<PathBuf> {
    let videos: Vec<PathBuf> = collect_videos(dir)?
        .into_iter()
        .filter(|path| path != output)
        .collect();

    if videos.is_empty() {
        return Err(VoiceSyncError::UnreadableMedia(format!(
            "no video files in {}",
            dir.display()
        )));
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let staged = StagedFile::for_target(output)?;

    if let [single] = videos.as_slice() {
        log::info!("Single video, copying {} to {}", single.display(), output.display());
        std::fs::copy(single, staged.path())?;
        return staged.commit();
    }

    if let Some(transition) = transition {
        render_with_transitions(&videos, transition, staged.path(), backend).await?;
        return staged.commit();
    }

    let mut list = tempfile::Builder::new().suffix(".txt").tempfile()?;
    list.write_all(concat_list(&videos).as_bytes())?;
    list.flush()?;

    log::info!("Concatenating {} videos into {}", videos.len(), output.display());
    let args = vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list.path().to_string_lossy().into_owned(),
        "-c".to_string(),
        "copy".to_string(),
        staged.path().to_string_lossy().into_owned(),
    ];
    backend.run_ffmpeg(&args).await?;

    staged.commit()
}

async fn render_with_transitions(
    videos: &[PathBuf],
    transition: &Transition,
    output: &Path,
    backend: &FfmpegBackend,
) -> Result<()> {
    let mut clips = Vec::with_capacity(videos.len());
    for video in videos {
        clips.push(backend.probe(video, MediaKind::Video).await?);
    }
    let graph = build_transition_graph(&clips, transition)?;

    log::info!(
        "Joining {} videos with {:?} transitions ({:.2}s), {:.1}s total",
        videos.len(),
        transition.kind,
        transition.duration_secs,
        graph.duration_secs
    );

    let mut args = vec!["-y".to_string()];
    for video in videos {
        args.push("-i".to_string());
        args.push(video.to_string_lossy().into_owned());
    }
    args.extend(["-filter_complex".to_string(), graph.filter_complex, "-map".to_string(), "[v]".to_string()]);
    if graph.with_audio {
        args.extend(["-map".to_string(), "[a]".to_string(), "-c:a".to_string(), "aac".to_string()]);
    } else {
        args.push("-an".to_string());
    }
    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-threads".to_string(),
        "4".to_string(),
        output.to_string_lossy().into_owned(),
    ]);

    backend.run_ffmpeg(&args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransitionKind;

    #[test]
    fn test_collect_videos_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10.mp4", "2.mp4", "1.mov", "notes.txt", "3.mp3", ".staging-x.mp4"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let names: Vec<String> = collect_videos(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["1.mov", "2.mp4", "10.mp4"]);
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/v/1.mp4"), PathBuf::from("/v/it's.mp4")]);
        assert_eq!(list, "file '/v/1.mp4'\nfile '/v/it'\\''s.mp4'\n");
    }

    fn clip(duration_secs: f64, has_audio: bool) -> MediaInfo {
        MediaInfo { duration_secs, has_audio }
    }

    #[test]
    fn test_transition_graph_chains_clips() {
        let transition = Transition { kind: TransitionKind::Crossfade, duration_secs: 0.5 };
        let graph =
            build_transition_graph(&[clip(4.0, true), clip(3.0, true), clip(5.0, true)], &transition).unwrap();

        assert_eq!(
            graph.filter_complex,
            "[0:v]settb=AVTB,fps=30,format=yuv420p[v0];\
             [1:v]settb=AVTB,fps=30,format=yuv420p[v1];\
             [2:v]settb=AVTB,fps=30,format=yuv420p[v2];\
             [v0][v1]xfade=transition=fade:duration=0.500:offset=3.500[x1];\
             [0:a][1:a]acrossfade=d=0.500[c1];\
             [x1][v2]xfade=transition=fade:duration=0.500:offset=6.000[v];\
             [c1][2:a]acrossfade=d=0.500[a]"
        );
        assert!(graph.with_audio);
        assert!((graph.duration_secs - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_transition_graph_without_audio() {
        let transition = Transition { kind: TransitionKind::Fade, duration_secs: 1.0 };
        let graph = build_transition_graph(&[clip(4.0, true), clip(3.0, false)], &transition).unwrap();

        assert!(!graph.with_audio);
        assert!(!graph.filter_complex.contains("acrossfade"));
        assert!(graph
            .filter_complex
            .ends_with("[v0][v1]xfade=transition=fadeblack:duration=1.000:offset=3.000[v]"));
    }

    #[test]
    fn test_transition_longer_than_clip_is_rejected() {
        let transition = Transition { kind: TransitionKind::Dissolve, duration_secs: 3.0 };
        assert!(matches!(
            build_transition_graph(&[clip(4.0, true), clip(3.0, true)], &transition),
            Err(VoiceSyncError::Configuration(_))
        ));
        assert!(matches!(
            build_transition_graph(&[clip(4.0, true)], &Transition::default()),
            Err(VoiceSyncError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_transition_probe_failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.mp4"), b"a").unwrap();
        std::fs::write(dir.path().join("2.mp4"), b"b").unwrap();
        let output = dir.path().join("out").join("final.mp4");

        let backend = FfmpegBackend::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let transition = Transition::default();
        assert!(matches!(
            concat_videos(dir.path(), &output, Some(&transition), &backend).await,
            Err(VoiceSyncError::UnreadableMedia(_))
        ));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_single_video_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.mp4"), b"clip").unwrap();
        let output = dir.path().join("montage").join("final.mp4");

        let backend = FfmpegBackend::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let written = concat_videos(dir.path(), &output, None, &backend).await.unwrap();
        assert_eq!(written, output);
        assert_eq!(std::fs::read(&output).unwrap(), b"clip");
    }

    #[tokio::test]
    async fn test_empty_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FfmpegBackend::new("ffmpeg", "ffprobe");
        assert!(concat_videos(dir.path(), &dir.path().join("out.mp4"), None, &backend)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_encoder_failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.mp4"), b"a").unwrap();
        std::fs::write(dir.path().join("2.mp4"), b"b").unwrap();
        let output = dir.path().join("out").join("final.mp4");

        let backend = FfmpegBackend::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        assert!(matches!(
            concat_videos(dir.path(), &output, None, &backend).await,
            Err(VoiceSyncError::EncodeFailure(_))
        ));
        assert!(!output.exists());
    }
}
