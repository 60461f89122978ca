//! Сопоставление видео и озвучки по номеру

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::scan::scan;
use crate::error::Result;
use crate::media::MediaKind;
use crate::naming::FileIndex;

/// Видео и озвучка с одинаковым номером
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPair {
    pub index: FileIndex,
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
}

/// Пары по возрастанию номера.
///
/// Номера, которые есть только в одной папке, в результат не попадают.
pub fn pair(video_dir: &Path, audio_dir: &Path) -> Result<Vec<MediaPair>> {
    let videos = scan(video_dir, MediaKind::Video)?;
    let mut audios = scan(audio_dir, MediaKind::Audio)?;

    let pairs: Vec<MediaPair> = videos
        .entries
        .into_iter()
        .filter_map(|(index, video_path)| {
            audios.entries.remove(&index).map(|audio_path| MediaPair {
                index,
                video_path,
                audio_path,
            })
        })
        .collect();

    log::info!(
        "Paired {} files ({} audio without video)",
        pairs.len(),
        audios.entries.len()
    );
    Ok(pairs)
}
