//! Единицы работы и итоговый отчёт пакета

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::progress::BatchSummary;

/// Результат обработки единицы
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOutcome {
    Pending,
    Succeeded(PathBuf),
    Failed(String),
    /// Остановлена пользователем во время ожидания
    Cancelled,
    /// Очередь не дошла из-за остановки
    NotAttempted,
}

impl UnitOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Фрагмент текста, озвучиваемый одной задачей
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisUnit {
    /// Номер строки (с 1) в построчном режиме
    pub index: Option<usize>,
    pub text: String,
    outcome: UnitOutcome,
}

impl SynthesisUnit {
    pub fn new(index: Option<usize>, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            outcome: UnitOutcome::Pending,
        }
    }

    pub fn outcome(&self) -> &UnitOutcome {
        &self.outcome
    }

    /// Зафиксировать результат. Повторная запись игнорируется.
    pub fn settle(&mut self, outcome: UnitOutcome) -> bool {
        if self.outcome.is_terminal() || !outcome.is_terminal() {
            log::debug!("Ignoring outcome {:?} for settled unit {:?}", outcome, self.index);
            return false;
        }
        self.outcome = outcome;
        true
    }

    /// Путь к результату, если единица озвучена
    pub fn artifact(&self) -> Option<&Path> {
        match &self.outcome {
            UnitOutcome::Succeeded(path) => Some(path),
            _ => None,
        }
    }
}

/// Разбить текст на непустые строки с номерами `1..N`
pub fn split_lines(text: &str) -> Vec<SynthesisUnit> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| SynthesisUnit::new(Some(i + 1), line))
        .collect()
}

/// Сводка по единицам в исходном порядке
pub fn summarize(units: &[SynthesisUnit], cancelled: bool) -> BatchSummary {
    let mut summary = BatchSummary {
        total: units.len(),
        cancelled,
        ..BatchSummary::default()
    };
    for unit in units {
        match unit.outcome() {
            UnitOutcome::Succeeded(_) => summary.succeeded += 1,
            UnitOutcome::Failed(reason) => summary.failures.push(reason.clone()),
            UnitOutcome::NotAttempted => summary.not_attempted += 1,
            UnitOutcome::Cancelled | UnitOutcome::Pending => {}
        }
    }
    summary
}

/// Результат запуска: единицы и сводка
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub units: Vec<SynthesisUnit>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn artifacts(&self) -> Vec<&Path> {
        self.units.iter().filter_map(SynthesisUnit::artifact).collect()
    }
}
