//! Аудит пропущенных видео по картинкам
//!
//! Для каждой картинки должен существовать ролик с тем же номером. Картинки
//! без ролика копируются в папку отчёта вместе со списком промптов, чтобы их
//! можно было перегенерировать.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::integrity::{find_gaps, normalize_names};
use super::scan::scan;
use crate::error::Result;
use crate::media::MediaKind;
use crate::naming::FileIndex;

/// Файл с промптами в папке видео
pub const PROMPTS_FILE: &str = "prompts_video.txt";
/// Отчёт о пропусках в папке отчёта
pub const FAILED_PROMPTS_FILE: &str = "failed_video_prompts.txt";

lazy_static! {
    static ref PROMPT_LINE: Regex = Regex::new(r"^(\d+)\.\s*(.+)").expect("valid prompt pattern");
}

/// Результат аудита
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    pub normalized_videos: usize,
    pub normalized_images: usize,
    pub image_count: usize,
    pub video_count: usize,
    /// Номера картинок без ролика
    pub missing: Vec<FileIndex>,
    pub copied_images: usize,
    /// Путь к списку промптов, если пропуски найдены
    pub prompts_file: Option<PathBuf>,
}

impl GapReport {
    /// Доля картинок, для которых есть ролик, в процентах
    pub fn success_rate(&self) -> f64 {
        if self.image_count == 0 {
            return 100.0;
        }
        let done = self.image_count.saturating_sub(self.missing.len());
        done as f64 * 100.0 / self.image_count as f64
    }
}

fn read_prompts(path: &Path) -> Result<HashMap<FileIndex, String>> {
    let mut prompts = HashMap::new();
    if !path.is_file() {
        log::warn!("{} not found, prompts will be left blank", path.display());
        return Ok(prompts);
    }

    for line in fs::read_to_string(path)?.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(captures) = PROMPT_LINE.captures(line) {
            if let Ok(index) = captures[1].parse::<FileIndex>() {
                prompts.insert(index, line.to_string());
            }
        }
    }
    Ok(prompts)
}

/// Нормализовать имена в обеих папках, найти картинки без роликов и
/// подготовить отчёт в `report_dir`.
pub fn audit_gaps(video_dir: &Path, image_dir: &Path, report_dir: &Path) -> Result<GapReport> {
    let mut report = GapReport {
        normalized_videos: normalize_names(video_dir)?,
        normalized_images: normalize_names(image_dir)?,
        ..GapReport::default()
    };

    let videos = scan(video_dir, MediaKind::Video)?;
    let images = scan(image_dir, MediaKind::Image)?;
    report.video_count = videos.len();
    report.image_count = images.len();
    report.missing = find_gaps(images.indices(), videos.indices());

    if report.missing.is_empty() {
        log::info!("No gaps: {} images, {} videos", report.image_count, report.video_count);
        return Ok(report);
    }
    log::warn!("{} images have no video: {:?}", report.missing.len(), report.missing);

    fs::create_dir_all(report_dir)?;
    for index in &report.missing {
        let Some(source) = images.get(*index) else {
            continue;
        };
        let Some(name) = source.file_name() else {
            continue;
        };
        match fs::copy(source, report_dir.join(name)) {
            Ok(_) => report.copied_images += 1,
            Err(e) => log::error!("Failed to copy {}: {}", source.display(), e),
        }
    }

    let prompts = read_prompts(&video_dir.join(PROMPTS_FILE))?;
    let mut listing = format!(
        "# Missing videos: {}\n# Created: {}\n\n",
        report.missing.len(),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    for index in &report.missing {
        let line = match prompts.get(index) {
            Some(prompt) => prompt.clone(),
            None => format!("{}. [prompt not found]", index),
        };
        listing.push_str(&line);
        listing.push('\n');
    }

    let prompts_path = report_dir.join(FAILED_PROMPTS_FILE);
    fs::write(&prompts_path, listing)?;
    report.prompts_file = Some(prompts_path);

    log::info!(
        "Gap report written to {} ({:.1}% complete)",
        report_dir.display(),
        report.success_rate()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), name).unwrap();
        }
    }

    #[test]
    fn test_audit_reports_missing_videos() {
        let videos = tempfile::tempdir().unwrap();
        let images = tempfile::tempdir().unwrap();
        let report_dir = tempfile::tempdir().unwrap();

        touch(videos.path(), &["1. a.mp4", "2. 5_e.mp4"]);
        touch(images.path(), &["1.jpg", "3.png", "4.jpeg", "5.jpg"]);
        fs::write(
            videos.path().join(PROMPTS_FILE),
            "# prompts\n1. calm sea\n3. city at night\n\n",
        )
        .unwrap();

        let report = audit_gaps(videos.path(), images.path(), report_dir.path()).unwrap();
        assert_eq!(report.normalized_videos, 1);
        assert_eq!(report.normalized_images, 0);
        assert_eq!(report.missing, vec![3, 4]);
        assert_eq!(report.copied_images, 2);
        assert!(report_dir.path().join("3.png").exists());
        assert!(report_dir.path().join("4.jpeg").exists());
        assert!((report.success_rate() - 50.0).abs() < 1e-9);

        let listing = fs::read_to_string(report.prompts_file.unwrap()).unwrap();
        let body: Vec<&str> = listing.lines().filter(|l| !l.starts_with('#') && !l.is_empty()).collect();
        assert_eq!(body, vec!["3. city at night", "4. [prompt not found]"]);
    }

    #[test]
    fn test_audit_without_gaps() {
        let videos = tempfile::tempdir().unwrap();
        let images = tempfile::tempdir().unwrap();
        let report_dir = tempfile::tempdir().unwrap();
        touch(videos.path(), &["1.mp4", "2.mp4"]);
        touch(images.path(), &["1.png", "2.png"]);

        let report = audit_gaps(videos.path(), images.path(), report_dir.path()).unwrap();
        assert!(report.missing.is_empty());
        assert_eq!(report.prompts_file, None);
        assert_eq!(report.success_rate(), 100.0);
        assert_eq!(fs::read_dir(report_dir.path()).unwrap().count(), 0);
    }
}
