//! Модуль для отслеживания прогресса выполнения операций
//!
//! Этот модуль предоставляет реализацию паттерна Observer: оркестратор и
//! пакетная склейка сообщают о каждом тике опроса и о границах единиц работы,
//! а внешнее приложение получает всё необходимое для отображения
//! "номер/всего" и "статус (попытка)" без доступа к внутреннему состоянию.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Сколько ошибок показывать в итоговой сводке
pub const MAX_REPORTED_FAILURES: usize = 10;

/// Фаза обработки единицы работы
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPhase {
    /// Единица взята в работу
    UnitStarted,
    /// Очередной опрос статуса удалённой задачи
    Polling,
    /// Единица получила окончательный результат
    UnitFinished,
}

/// Информация о прогрессе выполнения операции
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Номер единицы (с 1)
    pub unit_index: usize,
    /// Всего единиц в пакете
    pub total_units: usize,
    /// Человекочитаемый статус
    pub status_label: String,
    /// Номер попытки опроса, если это тик опроса
    pub poll_attempt: Option<u32>,
    pub phase: ProgressPhase,
}

impl ProgressUpdate {
    pub fn new(
        unit_index: usize,
        total_units: usize,
        status_label: impl Into<String>,
        poll_attempt: Option<u32>,
        phase: ProgressPhase,
    ) -> Self {
        Self {
            unit_index,
            total_units,
            status_label: status_label.into(),
            poll_attempt,
            phase,
        }
    }

    /// Строка вида `2/10: Синтез (5)`
    pub fn display(&self) -> String {
        match self.poll_attempt {
            Some(attempt) => format!(
                "{}/{}: {} ({})",
                self.unit_index, self.total_units, self.status_label, attempt
            ),
            None => format!("{}/{}: {}", self.unit_index, self.total_units, self.status_label),
        }
    }
}

/// Итог пакетной операции
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub total: usize,
    /// Причины ошибок в порядке входных данных
    pub failures: Vec<String>,
    /// Единицы, до которых не дошла очередь из-за остановки
    pub not_attempted: usize,
    /// Пакет был остановлен пользователем
    pub cancelled: bool,
}

impl BatchSummary {
    /// Первые [`MAX_REPORTED_FAILURES`] ошибок и суффикс `+N more`
    pub fn failure_digest(&self) -> String {
        let mut lines: Vec<String> = self
            .failures
            .iter()
            .take(MAX_REPORTED_FAILURES)
            .cloned()
            .collect();
        if self.failures.len() > MAX_REPORTED_FAILURES {
            lines.push(format!("+{} more", self.failures.len() - MAX_REPORTED_FAILURES));
        }
        lines.join("\n")
    }

    /// Короткая строка `Done: 2/3`
    pub fn headline(&self) -> String {
        if self.cancelled {
            format!("Stopped: {}/{}", self.succeeded, self.total)
        } else {
            format!("Done: {}/{}", self.succeeded, self.total)
        }
    }
}

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    /// Метод, вызываемый при каждом тике опроса и на границах единиц
    fn on_progress(&self, update: &ProgressUpdate);

    /// Метод, вызываемый один раз по завершении пакета
    fn on_batch_complete(&self, _summary: &BatchSummary) {}
}

/// Реестр наблюдателей, рассылающий им уведомления
pub struct ProgressReporter {
    /// Список наблюдателей
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    /// Счетчик для генерации уникальных идентификаторов наблюдателей
    next_id: AtomicUsize,
}

impl ProgressReporter {
    /// Создать пустой репортер
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Добавить наблюдателя
    ///
    /// Возвращает идентификатор, по которому наблюдателя можно удалить.
    pub fn add_observer(&self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        observers.insert(id, observer);
        id
    }

    /// Удалить наблюдателя по идентификатору
    pub fn remove_observer(&self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        observers.remove(&id)
    }

    /// Уведомить всех наблюдателей о прогрессе
    pub fn notify_progress(&self, update: &ProgressUpdate) {
        log::debug!("Progress: {}", update.display());
        let observers = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for observer in observers.values() {
            observer.on_progress(update);
        }
    }

    /// Уведомить всех наблюдателей о завершении пакета
    pub fn notify_batch_complete(&self, summary: &BatchSummary) {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for observer in observers.values() {
            observer.on_batch_complete(summary);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct TestObserver {
        updates: Arc<Mutex<Vec<ProgressUpdate>>>,
        summaries: Arc<Mutex<Vec<BatchSummary>>>,
    }

    impl ProgressObserver for TestObserver {
        fn on_progress(&self, update: &ProgressUpdate) {
            self.updates.lock().unwrap().push(update.clone());
        }

        fn on_batch_complete(&self, summary: &BatchSummary) {
            self.summaries.lock().unwrap().push(summary.clone());
        }
    }

    #[test]
    fn test_reporter_fan_out_and_removal() {
        let reporter = ProgressReporter::new();
        let updates = Arc::new(Mutex::new(Vec::new()));
        let summaries = Arc::new(Mutex::new(Vec::new()));

        let id = reporter.add_observer(Box::new(TestObserver {
            updates: updates.clone(),
            summaries: summaries.clone(),
        }));

        reporter.notify_progress(&ProgressUpdate::new(1, 3, "Queued", Some(1), ProgressPhase::Polling));
        reporter.notify_batch_complete(&BatchSummary {
            succeeded: 1,
            total: 3,
            ..Default::default()
        });

        assert_eq!(updates.lock().unwrap().len(), 1);
        assert_eq!(summaries.lock().unwrap()[0].total, 3);

        assert!(reporter.remove_observer(id).is_some());
        reporter.notify_progress(&ProgressUpdate::new(2, 3, "Queued", None, ProgressPhase::UnitStarted));
        assert_eq!(updates.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_update_display() {
        let tick = ProgressUpdate::new(2, 10, "Processing", Some(5), ProgressPhase::Polling);
        assert_eq!(tick.display(), "2/10: Processing (5)");

        let start = ProgressUpdate::new(1, 10, "Submitting", None, ProgressPhase::UnitStarted);
        assert_eq!(start.display(), "1/10: Submitting");
    }

    #[test]
    fn test_failure_digest_truncates() {
        let summary = BatchSummary {
            succeeded: 0,
            total: 13,
            failures: (1..=13).map(|i| format!("Line {i}: timeout")).collect(),
            ..Default::default()
        };

        let digest = summary.failure_digest();
        let lines: Vec<&str> = digest.lines().collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "Line 1: timeout");
        assert_eq!(lines[9], "Line 10: timeout");
        assert_eq!(lines[10], "+3 more");
    }

    #[test]
    fn test_headline() {
        let mut summary = BatchSummary { succeeded: 2, total: 3, ..Default::default() };
        assert_eq!(summary.headline(), "Done: 2/3");
        summary.cancelled = true;
        assert_eq!(summary.headline(), "Stopped: 2/3");
    }
}
