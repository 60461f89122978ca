//! Модуль для реализации системы уведомлений
//!
//! Этот модуль предоставляет конкретные реализации наблюдателей для
//! системы прогресса библиотеки voiceover-sync.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::progress::{BatchSummary, ProgressObserver, ProgressUpdate};

/// Наблюдатель, выводящий информацию о прогрессе в лог
pub struct ConsoleProgressObserver {
    /// Префикс для вывода (опционально)
    prefix: Option<String>,
}

impl ConsoleProgressObserver {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl Default for ConsoleProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleProgressObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        let prefix = self.prefix.as_deref().unwrap_or("");
        log::info!("{}{}", prefix, update.display());
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        let prefix = self.prefix.as_deref().unwrap_or("");
        log::info!("{}{}", prefix, summary.headline());
        if !summary.failures.is_empty() {
            log::warn!("{}Errors:\n{}", prefix, summary.failure_digest());
        }
    }
}

/// Наблюдатель, сохраняющий историю уведомлений в памяти
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressUpdate>>>,
    summaries: Arc<Mutex<Vec<BatchSummary>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Получить историю обновлений прогресса
    pub fn history(&self) -> Vec<ProgressUpdate> {
        self.history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    /// Получить полученные итоговые сводки
    pub fn summaries(&self) -> Vec<BatchSummary> {
        self.summaries
            .lock()
            .map(|summaries| summaries.clone())
            .unwrap_or_default()
    }

    /// Очистить историю
    pub fn clear_history(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
        if let Ok(mut summaries) = self.summaries.lock() {
            summaries.clear();
        }
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        if let Ok(mut history) = self.history.lock() {
            history.push(update.clone());
        }
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        if let Ok(mut summaries) = self.summaries.lock() {
            summaries.push(summary.clone());
        }
    }
}

/// Событие для передачи через канал
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Update(ProgressUpdate),
    BatchComplete(BatchSummary),
}

/// Наблюдатель, отправляющий события через канал Tokio
///
/// Использует `try_send`: при переполненном канале событие теряется, а
/// пакет не блокируется медленным получателем.
pub struct ChannelProgressObserver {
    sender: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgressObserver {
    pub fn new(sender: mpsc::Sender<ProgressEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: ProgressEvent) {
        if let Err(e) = self.sender.try_send(event) {
            log::debug!("Dropped progress event: {}", e);
        }
    }
}

impl ProgressObserver for ChannelProgressObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.send(ProgressEvent::Update(update.clone()));
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.send(ProgressEvent::BatchComplete(summary.clone()));
    }
}

/// Наблюдатель, вызывающий функцию обратного вызова при обновлении прогресса
pub struct CallbackProgressObserver<F>
where
    F: Fn(&ProgressUpdate) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackProgressObserver<F>
where
    F: Fn(&ProgressUpdate) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressObserver for CallbackProgressObserver<F>
where
    F: Fn(&ProgressUpdate) + Send + Sync + 'static,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        (self.callback)(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressPhase;

    fn tick(index: usize) -> ProgressUpdate {
        ProgressUpdate::new(index, 3, "Processing", Some(1), ProgressPhase::Polling)
    }

    #[test]
    fn test_console_observer() {
        let observer = ConsoleProgressObserver::with_prefix("[Test] ");

        // Этот тест просто проверяет, что методы не вызывают панику
        observer.on_progress(&tick(1));
        observer.on_batch_complete(&BatchSummary {
            succeeded: 1,
            total: 2,
            failures: vec!["Line 2: timeout".to_string()],
            ..Default::default()
        });
    }

    #[test]
    fn test_memory_observer() {
        let observer = MemoryProgressObserver::new();

        observer.on_progress(&tick(1));
        observer.on_progress(&tick(2));
        observer.on_batch_complete(&BatchSummary::default());

        let history = observer.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].unit_index, 2);
        assert_eq!(observer.summaries().len(), 1);

        observer.clear_history();
        assert!(observer.history().is_empty());
        assert!(observer.summaries().is_empty());
    }

    #[test]
    fn test_callback_observer() {
        let counter = Arc::new(Mutex::new(0));
        let counter_clone = counter.clone();

        let observer = CallbackProgressObserver::new(move |_| {
            *counter_clone.lock().unwrap() += 1;
        });

        observer.on_progress(&tick(1));
        observer.on_progress(&tick(2));
        observer.on_batch_complete(&BatchSummary::default());

        assert_eq!(*counter.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_channel_observer() {
        let (tx, mut rx) = mpsc::channel(8);
        let observer = ChannelProgressObserver::new(tx);

        observer.on_progress(&tick(1));
        observer.on_batch_complete(&BatchSummary { succeeded: 3, total: 3, ..Default::default() });

        match rx.recv().await {
            Some(ProgressEvent::Update(update)) => assert_eq!(update.unit_index, 1),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await {
            Some(ProgressEvent::BatchComplete(summary)) => assert_eq!(summary.succeeded, 3),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_channel_observer_drops_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let observer = ChannelProgressObserver::new(tx);

        observer.on_progress(&tick(1));
        observer.on_progress(&tick(2));
    }
}
