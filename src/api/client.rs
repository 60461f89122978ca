//! HTTP-клиент Voice API
//!
//! Отвечает только за сетевой контракт: ключ в заголовке `X-API-Key`,
//! таймауты на каждый вызов, разбор `{"detail": ...}` из не-2xx ответов.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use tokio_util::sync::CancellationToken;

use super::models::{Balance, ErrorBody, SubmitRequest, SubmitResponse, TaskStatus, VoiceTemplate};
use super::polling::{self, PollOptions, TaskOutcome};
use super::TaskService;
use crate::config::ApiConfig;
use crate::error::{Result, VoiceSyncError};

/// Таймаут запросов баланса и шаблонов
const ACCOUNT_TIMEOUT: Duration = Duration::from_secs(10);

/// Клиент сервиса задач синтеза
#[derive(Debug, Clone)]
pub struct RemoteTaskClient {
    http: Client,
    base_url: String,
    api_key: String,
    submit_timeout: Duration,
    status_timeout: Duration,
    result_timeout: Duration,
}

impl RemoteTaskClient {
    /// Создать клиент по настройкам API
    pub fn new(config: &ApiConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(VoiceSyncError::Configuration("API base URL is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent(concat!("voiceover-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            submit_timeout: config.submit_timeout(),
            status_timeout: config.status_timeout(),
            result_timeout: config.result_timeout(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder, timeout: Duration) -> RequestBuilder {
        request.header("X-API-Key", &self.api_key).timeout(timeout)
    }

    /// Отправить запрос и превратить не-2xx ответ в `ServiceRejected`
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|body| body.message())
            .unwrap_or_else(|_| format!("HTTP {}", status));
        log::error!("Voice API responded {}: {}", status, detail);
        Err(VoiceSyncError::ServiceRejected(detail))
    }

    /// Баланс аккаунта
    pub async fn balance(&self) -> Result<Balance> {
        let request = self.authorized(self.http.get(self.url("balance")), ACCOUNT_TIMEOUT);
        let response = self.send(request).await?;
        Ok(response.json::<Balance>().await?)
    }

    /// Доступные шаблоны голосов
    pub async fn templates(&self) -> Result<Vec<VoiceTemplate>> {
        let request = self.authorized(self.http.get(self.url("templates")), ACCOUNT_TIMEOUT);
        let response = self.send(request).await?;
        Ok(response.json::<Vec<VoiceTemplate>>().await?)
    }

    /// Ждать завершения задачи (см. [`polling::await_completion`])
    pub async fn await_completion<F>(
        &self,
        task_id: &str,
        options: &PollOptions,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> TaskOutcome
    where
        F: FnMut(&TaskStatus, u32),
    {
        polling::await_completion(self, task_id, options, cancel, on_progress).await
    }
}

#[async_trait]
impl TaskService for RemoteTaskClient {
    async fn submit(&self, request: &SubmitRequest<'_>) -> Result<String> {
        log::info!(
            "Creating synthesis task ({} chars, template {})",
            request.text.chars().count(),
            request.template_uuid
        );
        let builder = self
            .authorized(self.http.post(self.url("tasks")), self.submit_timeout)
            .json(request);
        let response = self.send(builder).await?;
        let task_id = response.json::<SubmitResponse>().await?.into_task_id();
        log::info!("Task {} created", task_id);
        Ok(task_id)
    }

    async fn poll_status(&self, task_id: &str) -> Result<TaskStatus> {
        let url = self.url(&format!("tasks/{}/status", task_id));
        let response = self
            .send(self.authorized(self.http.get(url), self.status_timeout))
            .await?;
        Ok(response.json::<TaskStatus>().await?)
    }

    async fn fetch_result(&self, task_id: &str) -> Result<Bytes> {
        let url = self.url(&format!("tasks/{}/result", task_id));
        let response = self
            .send(self.authorized(self.http.get(url), self.result_timeout))
            .await?;
        let payload = response.bytes().await?;
        if payload.is_empty() {
            return Err(VoiceSyncError::ServiceRejected(format!(
                "Task {} returned an empty result",
                task_id
            )));
        }
        log::debug!("Fetched {} bytes for task {}", payload.len(), task_id);
        Ok(payload)
    }
}
