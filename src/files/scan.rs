//! Сканирование папки в карту "номер -> файл"

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;
use crate::media::MediaKind;
use crate::naming::{extract_index, natural_sort_key, FileIndex};

/// Нумерованные файлы одной папки.
///
/// Строится заново при каждом вызове [`scan`], файловая система остаётся
/// единственным источником правды.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumberedFileSet {
    pub entries: BTreeMap<FileIndex, PathBuf>,
    /// Файлы, вытесненные другим файлом с тем же номером
    pub duplicates: Vec<PathBuf>,
}

impl NumberedFileSet {
    pub fn indices(&self) -> impl Iterator<Item = FileIndex> + '_ {
        self.entries.keys().copied()
    }

    pub fn get(&self, index: FileIndex) -> Option<&Path> {
        self.entries.get(&index).map(PathBuf::as_path)
    }

    pub fn contains(&self, index: FileIndex) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Собрать файлы нужного типа из папки (без подпапок).
///
/// При совпадении номеров побеждает последний в естественном порядке имён,
/// остальные попадают в `duplicates`.
pub fn scan(dir: &Path, kind: MediaKind) -> Result<NumberedFileSet> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("directory not found: {}", dir.display()),
        )
        .into());
    }

    let mut candidates: Vec<(String, PathBuf)> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| kind.matches(entry.path()))
        .map(|entry| (entry.file_name().to_string_lossy().to_string(), entry.into_path()))
        .collect();
    candidates.sort_by_cached_key(|(name, _)| natural_sort_key(name));

    let mut set = NumberedFileSet::default();
    for (name, path) in candidates {
        let Some(index) = extract_index(&name) else {
            continue;
        };
        if let Some(shadowed) = set.entries.insert(index, path) {
            log::warn!(
                "Duplicate index {} in {}: {} is ignored in favour of {}",
                index,
                dir.display(),
                shadowed.display(),
                name
            );
            set.duplicates.push(shadowed);
        }
    }

    log::debug!("Found {} numbered files in {}", set.len(), dir.display());
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoiceSyncError;
    use std::fs;

    #[test]
    fn test_scan_filters_by_kind_and_index() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.mp4", "2. Closeup.MOV", "intro.mp4", "3.mp3", "10.mkv"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("4.mp4")).unwrap();

        let set = scan(dir.path(), MediaKind::Video).unwrap();
        assert_eq!(set.indices().collect::<Vec<_>>(), vec![1, 2, 10]);
        assert!(set.get(2).unwrap().ends_with("2. Closeup.MOV"));
        assert!(set.duplicates.is_empty());
    }

    #[test]
    fn test_duplicate_index_last_wins() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["5. b.mp4", "5. c.mp4", "5. a.mp4"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let set = scan(dir.path(), MediaKind::Video).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get(5).unwrap().ends_with("5. c.mp4"));
        assert_eq!(set.duplicates.len(), 2);
    }

    #[test]
    fn test_scan_is_fresh_each_call() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.mp3"), b"").unwrap();
        assert_eq!(scan(dir.path(), MediaKind::Audio).unwrap().len(), 1);

        fs::write(dir.path().join("2.mp3"), b"").unwrap();
        assert_eq!(scan(dir.path(), MediaKind::Audio).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_directory() {
        assert!(matches!(
            scan(Path::new("/nonexistent/videos"), MediaKind::Video),
            Err(VoiceSyncError::Io(_))
        ));
    }
}
