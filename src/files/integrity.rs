//! Проверка целостности нумерованных последовательностей
//!
//! Поиск пропусков между двумя наборами номеров и массовые переименования.
//! Любое переименование выполняется только после резервной копии папки.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{Result, VoiceSyncError};
use crate::media::MediaKind;
use crate::naming::{natural_sort_key, split_extension, FileIndex};

/// Префикс папок резервных копий
pub const BACKUP_PREFIX: &str = "_backup_";

lazy_static! {
    /// `175. 177_Name`: устаревший номер, настоящий номер, остаток имени
    static ref DUPLICATED_PREFIX: Regex =
        Regex::new(r"^(\d+)\.\s*(\d+)[_.\s]+(.+)$").expect("valid duplicated-prefix pattern");
    static ref LEADING_NUMBER: Regex =
        Regex::new(r"^\d+[.\s_]*").expect("valid leading-number pattern");
}

/// Номера из `a`, которых нет в `b`, по возрастанию
pub fn find_gaps<A, B>(a: A, b: B) -> Vec<FileIndex>
where
    A: IntoIterator<Item = FileIndex>,
    B: IntoIterator<Item = FileIndex>,
{
    let present: BTreeSet<FileIndex> = b.into_iter().collect();
    a.into_iter()
        .filter(|index| !present.contains(index))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Обычные файлы папки, кроме резервных копий и скрытых файлов
fn regular_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("directory not found: {}", dir.display()),
        )
        .into());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| VoiceSyncError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(BACKUP_PREFIX) || name.starts_with('.') {
            continue;
        }
        files.push((name, entry.into_path()));
    }
    Ok(files)
}

/// Скопировать все файлы папки в `_backup_<YYYYmmdd_HHMMSS>`.
///
/// Если такая папка уже есть, к имени добавляется числовой суффикс.
pub fn create_backup(dir: &Path) -> Result<PathBuf> {
    let backup_failed =
        |reason: String| VoiceSyncError::BackupFailed(format!("{}: {}", dir.display(), reason));

    let files = regular_files(dir).map_err(|e| backup_failed(e.to_string()))?;

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let base = format!("{}{}", BACKUP_PREFIX, stamp);
    let mut backup_dir = dir.join(&base);
    let mut suffix = 1;
    while backup_dir.exists() {
        backup_dir = dir.join(format!("{}_{}", base, suffix));
        suffix += 1;
    }
    fs::create_dir(&backup_dir).map_err(|e| backup_failed(e.to_string()))?;

    for (name, path) in &files {
        fs::copy(path, backup_dir.join(name))
            .map_err(|e| backup_failed(format!("failed to copy {}: {}", name, e)))?;
    }

    log::info!("Backed up {} files to {}", files.len(), backup_dir.display());
    Ok(backup_dir)
}

/// Новое имя для файла с дублированным номером, если оно нужно.
///
/// Устаревшие номера снимаются все сразу: `3. 3. 3_Slow` -> `3. Slow`.
fn normalized_name(filename: &str) -> Option<String> {
    let (stem, ext) = split_extension(filename);
    let mut current = stem.to_string();
    loop {
        // Каждая замена укорачивает имя, цикл конечен
        let next = match DUPLICATED_PREFIX.captures(&current) {
            Some(captures) => format!("{}. {}", &captures[2], &captures[3]),
            None => break,
        };
        current = next;
    }
    let renamed = format!("{}{}", current, ext);
    (renamed != filename).then_some(renamed)
}

/// Убрать устаревший номер: `175. 177_Name.mp4` -> `177. Name.mp4`.
///
/// Перед первым переименованием делается резервная копия папки; если её не
/// удалось создать, ничего не переименовывается. Возвращает число
/// переименованных файлов.
pub fn normalize_names(dir: &Path) -> Result<usize> {
    let planned: Vec<(PathBuf, String)> = regular_files(dir)?
        .into_iter()
        .filter_map(|(name, path)| normalized_name(&name).map(|renamed| (path, renamed)))
        .collect();

    if planned.is_empty() {
        log::info!("Nothing to normalize in {}", dir.display());
        return Ok(0);
    }

    create_backup(dir)?;

    let mut renamed = 0;
    for (path, new_name) in planned {
        let target = dir.join(&new_name);
        if target.exists() {
            log::warn!("Skipping {}: {} already exists", path.display(), new_name);
            continue;
        }
        match fs::rename(&path, &target) {
            Ok(()) => {
                log::debug!("{} -> {}", path.display(), new_name);
                renamed += 1;
            }
            Err(e) => log::error!("Failed to rename {}: {}", path.display(), e),
        }
    }

    log::info!("Normalized {} files in {}", renamed, dir.display());
    Ok(renamed)
}

/// Имя без старого номера: `10. Closeup` -> `Closeup`
fn strip_leading_number(stem: &str) -> &str {
    match LEADING_NUMBER.find(stem) {
        Some(found) => &stem[found.end()..],
        None => stem,
    }
}

/// Видео, аудио и картинки; остальные файлы папки не нумеруются
fn is_numbered_media(path: &Path) -> bool {
    [MediaKind::Video, MediaKind::Audio, MediaKind::Image]
        .iter()
        .any(|kind| kind.matches(path))
}

/// Исходный путь, временный путь и итоговое имя файла
type StagedRename = (PathBuf, PathBuf, String);

/// Вернуть файлы из временных имён на исходные места
fn restore_originals(staged: &[StagedRename]) {
    for (original, temp, _) in staged.iter().rev() {
        if let Err(e) = fs::rename(temp, original) {
            log::error!("Failed to restore {}: {}", original.display(), e);
        }
    }
}

/// Перенумеровать медиафайлы подряд `1..N` в естественном порядке имён.
///
/// Сначала все файлы получают уникальные временные имена, затем итоговые,
/// поэтому обмен номерами между файлами не приводит к коллизиям. Если
/// какой-то файл не удалось переименовать, все файлы возвращаются к исходным
/// именам и возвращается ошибка.
pub fn renumber_sequential(dir: &Path) -> Result<usize> {
    let mut files: Vec<(String, PathBuf)> = regular_files(dir)?
        .into_iter()
        .filter(|(_, path)| is_numbered_media(path))
        .collect();
    if files.is_empty() {
        return Ok(0);
    }

    create_backup(dir)?;
    files.sort_by_cached_key(|(name, _)| natural_sort_key(name));

    let mut staged: Vec<StagedRename> = Vec::with_capacity(files.len());
    for (position, (name, path)) in files.iter().enumerate() {
        let (stem, ext) = split_extension(name);
        let clean = strip_leading_number(stem).trim();
        let number = position + 1;
        let final_name = if clean.is_empty() {
            format!("{}{}", number, ext)
        } else {
            format!("{}. {}{}", number, clean, ext)
        };

        let temp = dir.join(format!(".renumber-{}{}", uuid::Uuid::new_v4(), ext));
        if let Err(e) = fs::rename(path, &temp) {
            restore_originals(&staged);
            return Err(e.into());
        }
        staged.push((path.clone(), temp, final_name));
    }

    for (done, (original, temp, final_name)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(temp, dir.join(final_name)) {
            log::error!("Failed to rename {} to {}: {}", original.display(), final_name, e);
            // Уже переименованные файлы снова во временные имена, затем все на место
            for (_, temp, final_name) in staged[..done].iter().rev() {
                if let Err(undo) = fs::rename(dir.join(final_name), temp) {
                    log::error!("Failed to undo rename to {}: {}", final_name, undo);
                }
            }
            restore_originals(&staged);
            return Err(e.into());
        }
        log::debug!("{} -> {}", original.display(), final_name);
    }

    log::info!("Renumbered {} files in {}", staged.len(), dir.display());
    Ok(staged.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().unwrap().is_file())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn backups(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(BACKUP_PREFIX))
            .map(|e| e.path())
            .collect()
    }

    #[test]
    fn test_find_gaps() {
        assert_eq!(find_gaps([1, 2, 3, 5], [1, 2, 5]), vec![3]);
        assert_eq!(find_gaps([9, 4, 4, 7], [7]), vec![4, 9]);
        assert!(find_gaps([1, 2], [1, 2, 3]).is_empty());
    }

    #[test]
    fn test_normalized_name() {
        assert_eq!(normalized_name("175. 177_Name.mp4").as_deref(), Some("177. Name.mp4"));
        assert_eq!(normalized_name("24. 24_Intro.jpg").as_deref(), Some("24. Intro.jpg"));
        assert_eq!(normalized_name("3.4 Shot.mp4").as_deref(), Some("4. Shot.mp4"));
        assert_eq!(normalized_name("3. 3. 3_Slow.mp4").as_deref(), Some("3. Slow.mp4"));
        assert_eq!(normalized_name("177. Name.mp4"), None);
        assert_eq!(normalized_name("notes.txt"), None);
    }

    #[test]
    fn test_normalize_is_idempotent_with_single_backup() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["175. 177_Name.mp4", "24. 24_Intro.mp4", "3. Done.mp4", "5. 5. 5_Slow.mp4"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        assert_eq!(normalize_names(dir.path()).unwrap(), 3);
        assert_eq!(
            names(dir.path()),
            vec!["177. Name.mp4", "24. Intro.mp4", "3. Done.mp4", "5. Slow.mp4"]
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("177. Name.mp4")).unwrap(),
            "175. 177_Name.mp4"
        );

        let first_backups = backups(dir.path());
        assert_eq!(first_backups.len(), 1);
        assert_eq!(names(&first_backups[0]).len(), 4);

        assert_eq!(normalize_names(dir.path()).unwrap(), 0);
        assert_eq!(backups(dir.path()).len(), 1);
    }

    #[test]
    fn test_normalize_skips_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1. 2_A.mp4"), "dup").unwrap();
        fs::write(dir.path().join("2. A.mp4"), "original").unwrap();

        assert_eq!(normalize_names(dir.path()).unwrap(), 0);
        assert_eq!(fs::read_to_string(dir.path().join("2. A.mp4")).unwrap(), "original");
        assert!(dir.path().join("1. 2_A.mp4").exists());
    }

    #[test]
    fn test_create_backup_twice() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.mp4"), "x").unwrap();

        let first = create_backup(dir.path()).unwrap();
        let second = create_backup(dir.path()).unwrap();
        assert_ne!(first, second);
        assert_eq!(names(&first), vec!["1.mp4"]);
        // Вторая копия не включает первую
        assert_eq!(names(&second), vec!["1.mp4"]);
        assert_eq!(fs::read_dir(&second).unwrap().count(), 1);
    }

    #[test]
    fn test_backup_of_missing_directory_fails() {
        assert!(matches!(
            create_backup(Path::new("/nonexistent/videos")),
            Err(VoiceSyncError::BackupFailed(_))
        ));
    }

    #[test]
    fn test_strip_leading_number() {
        assert_eq!(strip_leading_number("10. Closeup"), "Closeup");
        assert_eq!(strip_leading_number("7_intro"), "intro");
        assert_eq!(strip_leading_number("12"), "");
        assert_eq!(strip_leading_number("b-roll"), "b-roll");
    }

    #[test]
    fn test_renumber_sequential() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["3. c.mp4", "10. z.mp4", "1. a.mp4", "b.mp4", "7.mp4"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        assert_eq!(renumber_sequential(dir.path()).unwrap(), 5);
        assert_eq!(
            names(dir.path()),
            vec!["1. a.mp4", "2. c.mp4", "3.mp4", "4. z.mp4", "5. b.mp4"]
        );
        assert_eq!(fs::read_to_string(dir.path().join("2. c.mp4")).unwrap(), "3. c.mp4");
        assert_eq!(fs::read_to_string(dir.path().join("3.mp4")).unwrap(), "7.mp4");
        assert_eq!(backups(dir.path()).len(), 1);
    }

    #[test]
    fn test_renumber_swaps_without_collision() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1. x.mp4"), "first").unwrap();
        fs::write(dir.path().join("01. x.mp4"), "second").unwrap();

        assert_eq!(renumber_sequential(dir.path()).unwrap(), 2);
        let contents: Vec<String> = ["1. x.mp4", "2. x.mp4"]
            .iter()
            .map(|n| fs::read_to_string(dir.path().join(n)).unwrap())
            .collect();
        let mut sorted = contents.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["first", "second"]);
    }

    #[test]
    fn test_renumber_leaves_other_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.mp4", "2.mp4", "prompts_video.txt"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        assert_eq!(renumber_sequential(dir.path()).unwrap(), 2);
        assert_eq!(names(dir.path()), vec!["1.mp4", "2.mp4", "prompts_video.txt"]);
    }

    #[test]
    fn test_renumber_failure_restores_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), "a").unwrap();
        fs::write(dir.path().join("b.mp4"), "b").unwrap();
        // Каталог на месте итогового имени второго файла
        let blocker = dir.path().join("2. b.mp4");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();

        assert!(matches!(renumber_sequential(dir.path()), Err(VoiceSyncError::Io(_))));
        assert_eq!(names(dir.path()), vec!["a.mp4", "b.mp4"]);
        assert_eq!(fs::read_to_string(dir.path().join("a.mp4")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dir.path().join("b.mp4")).unwrap(), "b");
        assert!(blocker.join("keep").exists());
    }

    #[test]
    fn test_renumber_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(renumber_sequential(dir.path()).unwrap(), 0);
        assert!(backups(dir.path()).is_empty());
    }
}
