//! Ожидание завершения удалённой задачи
//!
//! Фиксированный интервал, ограниченное число опросов, обратный вызов на каждый
//! успешный опрос и четыре различимых исхода.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::models::{TaskState, TaskStatus};
use super::TaskService;
use crate::error::{Result, VoiceSyncError};

/// Параметры цикла опроса
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollOptions {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self { interval, max_attempts }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 300,
        }
    }
}

/// Чем закончилось ожидание
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Сервис сообщил `ending`
    Completed,
    /// Сервис сообщил `error`
    Failed { label: String },
    /// Лимит опросов исчерпан
    TimedOut { attempts: u32 },
    /// Остановлено пользователем
    Cancelled,
}

impl TaskOutcome {
    /// Преобразовать исход в `Result`, где всё кроме `Completed` - ошибка
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Completed => Ok(()),
            Self::Failed { label } => Err(VoiceSyncError::TaskFailed(label)),
            Self::TimedOut { attempts } => Err(VoiceSyncError::TimedOut { attempts }),
            Self::Cancelled => Err(VoiceSyncError::Cancelled),
        }
    }
}

/// Ждать терминального статуса задачи.
///
/// Каждая итерация: проверка токена, пауза `interval` (прерывается токеном),
/// один опрос. Неудачный опрос не считается провалом задачи, но расходует
/// попытку. `on_progress` получает статус и номер попытки после каждого
/// успешного опроса.
pub async fn await_completion<S, F>(
    service: &S,
    task_id: &str,
    options: &PollOptions,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> TaskOutcome
where
    S: TaskService + ?Sized,
    F: FnMut(&TaskStatus, u32),
{
    for attempt in 1..=options.max_attempts {
        if cancel.is_cancelled() {
            log::info!("Waiting for task {} cancelled before poll {}", task_id, attempt);
            return TaskOutcome::Cancelled;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::info!("Waiting for task {} cancelled during poll interval", task_id);
                return TaskOutcome::Cancelled;
            }
            _ = tokio::time::sleep(options.interval) => {}
        }

        let status = match service.poll_status(task_id).await {
            Ok(status) => status,
            Err(e) => {
                log::warn!("Status poll {} for task {} failed: {}", attempt, task_id, e);
                continue;
            }
        };

        log::debug!("Task {} poll {}: {}", task_id, attempt, status.label());
        on_progress(&status, attempt);

        match status.status {
            TaskState::Ending => return TaskOutcome::Completed,
            TaskState::Error => {
                return TaskOutcome::Failed {
                    label: status.label().to_string(),
                }
            }
            _ => {}
        }
    }

    log::warn!("Task {} not finished after {} polls", task_id, options.max_attempts);
    TaskOutcome::TimedOut {
        attempts: options.max_attempts,
    }
}
