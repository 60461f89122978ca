//! Модуль для работы с временными файлами
//!
//! Результат сначала пишется во временный файл рядом с целевым, а на место
//! переносится одним переименованием. Читатель папки никогда не видит
//! недописанный файл, а при ошибке временный файл удаляется.

use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::error::{Result, VoiceSyncError};

/// Временный файл, который станет `target` после [`StagedFile::commit`]
#[derive(Debug)]
pub struct StagedFile {
    temp: TempPath,
    target: PathBuf,
}

impl StagedFile {
    /// Создать временный файл в папке назначения с тем же расширением
    pub fn for_target(target: &Path) -> Result<Self> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let suffix = target
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let temp = tempfile::Builder::new()
            .prefix(".staging-")
            .suffix(&suffix)
            .tempfile_in(dir)?
            .into_temp_path();

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// Путь, по которому нужно писать данные
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Перенести файл на место, заменив существующий
    pub fn commit(self) -> Result<PathBuf> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| VoiceSyncError::Io(e.error))?;
        Ok(target)
    }

    /// Перенести файл на место, только если там ещё ничего нет
    pub fn commit_new(self) -> Result<PathBuf> {
        let target = self.target;
        self.temp
            .persist_noclobber(&target)
            .map_err(|e| VoiceSyncError::Io(e.error))?;
        Ok(target)
    }
}
