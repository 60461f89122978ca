use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Состояние задачи на стороне сервиса
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Processing,
    /// Успешное завершение
    Ending,
    /// Завершение с ошибкой
    Error,
    /// Состояние, которого клиент не знает; считается промежуточным
    #[serde(other)]
    Unknown,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ending | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Ending => "ending",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

/// Ответ `GET /tasks/{id}/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub status: TaskState,
    #[serde(default)]
    pub status_label: Option<String>,
}

impl TaskStatus {
    pub fn new(status: TaskState, status_label: Option<&str>) -> Self {
        Self {
            status,
            status_label: status_label.map(str::to_string),
        }
    }

    /// Подпись для пользователя; без неё - код состояния
    pub fn label(&self) -> &str {
        self.status_label
            .as_deref()
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| self.status.as_str())
    }
}

/// Задача синтеза, пока оркестратор ждёт её результата
#[derive(Debug, Clone)]
pub struct SynthesisTask {
    pub id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl SynthesisTask {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::new(TaskState::Queued, None),
            created_at: Utc::now(),
        }
    }

    pub fn update(&mut self, status: &TaskStatus) {
        self.status = status.clone();
    }

    /// Секунд с момента создания задачи
    pub fn elapsed_secs(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds()
    }
}

/// Тело `POST /tasks`
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest<'a> {
    pub template_uuid: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u32>,
}

/// Идентификатор задачи приходит то строкой, то числом
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTaskId {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    task_id: RawTaskId,
}

impl SubmitResponse {
    pub(crate) fn into_task_id(self) -> String {
        match self.task_id {
            RawTaskId::Text(id) => id,
            RawTaskId::Number(id) => id.to_string(),
        }
    }
}

/// Тело ошибки: `{"detail": ...}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    detail: serde_json::Value,
}

impl ErrorBody {
    pub(crate) fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Ответ `GET /balance`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub balance_text: Option<String>,
}

impl Balance {
    pub fn display(&self) -> String {
        self.balance_text
            .clone()
            .unwrap_or_else(|| self.balance.to_string())
    }
}

/// Шаблон голоса из `GET /templates`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceTemplate {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    /// Прочие поля, которые сервис может вернуть
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Формат результата, определённый по сигнатуре
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Mp3,
    /// Архив с несколькими файлами (сервис нарезал текст на чанки)
    Zip,
}

impl PayloadKind {
    /// Определить формат по первым байтам
    pub fn sniff(payload: &[u8]) -> Self {
        if payload.starts_with(b"PK\x03\x04") || payload.starts_with(b"PK\x05\x06") {
            Self::Zip
        } else {
            Self::Mp3
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Zip => "zip",
        }
    }
}
