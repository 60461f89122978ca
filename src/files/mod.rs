//! Модуль для работы с нумерованными файлами
//!
//! Сканирование папок по ведущему номеру, сопоставление видео с озвучкой,
//! поиск пропусков и массовые переименования с резервной копией.

pub mod audit;
pub mod integrity;
pub mod pairing;
pub mod scan;

pub use audit::{audit_gaps, GapReport};
pub use integrity::{create_backup, find_gaps, normalize_names, renumber_sequential};
pub use pairing::{pair, MediaPair};
pub use scan::{scan, NumberedFileSet};
