//! Модуль для работы с номерами в именах файлов
//!
//! Номер - ведущая последовательность цифр в имени (`7. Closeup.mp4` -> 7).
//! По нему сопоставляются картинки, видео и аудио из разных папок.

use std::cmp::Ordering;

/// Номер файла в последовательности
pub type FileIndex = u64;

/// Извлечь ведущий номер из имени файла.
///
/// Возвращает `None`, только если имя не начинается с цифры.
/// Слишком длинные номера насыщаются до `FileIndex::MAX`.
pub fn extract_index(filename: &str) -> Option<FileIndex> {
    let digits: &str = leading_digits(filename);
    if digits.is_empty() {
        return None;
    }

    Some(digits.parse::<FileIndex>().unwrap_or(FileIndex::MAX))
}

fn leading_digits(text: &str) -> &str {
    let end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}

/// Разделить имя на основу и расширение (расширение включает точку)
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => filename.split_at(pos),
        _ => (filename, ""),
    }
}

/// Фрагмент ключа естественной сортировки
#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk {
    Text(String),
    /// Цифры без ведущих нулей
    Number(String),
}

impl Ord for Chunk {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Chunk::Text(a), Chunk::Text(b)) => a.cmp(b),
            (Chunk::Number(a), Chunk::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Chunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ключ естественной сортировки: "2.mp4" < "10.mp4".
///
/// Имя разбивается на чередующиеся текстовые и цифровые участки (первым
/// всегда идёт текстовый, возможно пустой). Цифры сравниваются как числа
/// любой длины, текст - без учёта регистра.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey(Vec<Chunk>);

/// Построить ключ естественной сортировки для имени
pub fn natural_sort_key(filename: &str) -> NaturalKey {
    let mut chunks = Vec::new();
    let mut text = String::new();
    let mut digits = String::new();

    for c in filename.chars() {
        if c.is_ascii_digit() {
            if digits.is_empty() {
                chunks.push(Chunk::Text(std::mem::take(&mut text).to_lowercase()));
            }
            digits.push(c);
        } else {
            if !digits.is_empty() {
                chunks.push(number_chunk(&std::mem::take(&mut digits)));
            }
            text.push(c);
        }
    }

    if !digits.is_empty() {
        chunks.push(number_chunk(&digits));
    } else {
        chunks.push(Chunk::Text(text.to_lowercase()));
    }

    NaturalKey(chunks)
}

fn number_chunk(digits: &str) -> Chunk {
    let trimmed = digits.trim_start_matches('0');
    Chunk::Number(if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() })
}

/// Сравнить два имени в естественном порядке
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_sort_key(a).cmp(&natural_sort_key(b))
}
