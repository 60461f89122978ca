//! Модуль для работы с удалённым сервисом озвучивания (Voice API)
//!
//! Жизненный цикл задачи: создание -> опрос статуса -> получение результата.

pub mod client;
pub mod models;
pub mod polling;


use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use client::RemoteTaskClient;
pub use models::{PayloadKind, SubmitRequest, SynthesisTask, TaskState, TaskStatus};
pub use polling::{await_completion, PollOptions, TaskOutcome};

/// Контракт сервиса задач синтеза
///
/// Реализуется HTTP-клиентом; оркестратор работает только через этот трейт.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Создать задачу, вернуть её идентификатор
    async fn submit(&self, request: &SubmitRequest<'_>) -> Result<String>;

    /// Однократно прочитать статус задачи
    async fn poll_status(&self, task_id: &str) -> Result<TaskStatus>;

    /// Скачать результат завершённой задачи
    async fn fetch_result(&self, task_id: &str) -> Result<Bytes>;
}
