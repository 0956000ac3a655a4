use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::json::{JsonObject, JsonValue};

/// Key of the board that always exists and that the page shows by default.
pub const DEFAULT_BOARD_KEY: &str = "default";
/// Display name given to the default board when none was supplied.
pub const DEFAULT_BOARD_NAME: &str = "My Kanban Board";

/// Workflow stage of a task. Declaration order is display order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Todo,
        Status::InProgress,
        Status::Review,
        Status::Done,
    ];

    /// The wire spelling, e.g. `IN_PROGRESS`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "TODO",
            Status::InProgress => "IN_PROGRESS",
            Status::Review => "REVIEW",
            Status::Done => "DONE",
        }
    }

    /// Column heading shown on the page.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Todo => "To do",
            Status::InProgress => "In progress",
            Status::Review => "Review",
            Status::Done => "Done",
        }
    }

    /// Reads a wire status, falling back to [`Status::Todo`] for anything unknown.
    pub fn parse_or_default(text: &str) -> Status {
        text.parse().unwrap_or_else(|err: UnknownStatus| {
            tracing::warn!("{}, defaulting to TODO", err);
            Status::Todo
        })
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == text.trim())
            .ok_or_else(|| UnknownStatus(text.to_string()))
    }
}

/// Why a JSON record could not be turned into a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TaskRecordError {
    #[error("task record is not an object")]
    NotObject,
    #[error("task record has no integer id")]
    MissingId,
}

/// A single card on a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub status: Status,
    pub due_date: String,
    pub participants: String,
    pub hashtags: String,
}

impl Task {
    /// Creates a task with empty descriptive fields.
    pub fn new(id: i64, title: impl Into<String>, status: Status) -> Self {
        Self {
            id,
            title: title.into(),
            body: String::new(),
            status,
            due_date: String::new(),
            participants: String::new(),
            hashtags: String::new(),
        }
    }

    /// Decodes a task record.
    ///
    /// The id must be a JSON integer or a string holding one. Other fields are
    /// lenient: missing or non-scalar text becomes empty and an unknown status
    /// becomes `TODO`.
    pub fn from_json(value: &JsonValue) -> Result<Task, TaskRecordError> {
        let record = value.as_object().ok_or(TaskRecordError::NotObject)?;
        let id = record
            .get("id")
            .and_then(integer_field)
            .ok_or(TaskRecordError::MissingId)?;
        let status = match text_field(record, "status") {
            text if text.trim().is_empty() => Status::Todo,
            text => Status::parse_or_default(&text),
        };

        Ok(Task {
            id,
            title: text_field(record, "title"),
            body: text_field(record, "body"),
            status,
            due_date: text_field(record, "dueDate"),
            participants: text_field(record, "participants"),
            hashtags: text_field(record, "hashtags"),
        })
    }

    pub fn to_json(&self) -> JsonValue {
        JsonObject::new()
            .with("id", self.id)
            .with("title", self.title.as_str())
            .with("body", self.body.as_str())
            .with("status", self.status.as_str())
            .with("dueDate", self.due_date.as_str())
            .with("participants", self.participants.as_str())
            .with("hashtags", self.hashtags.as_str())
            .into()
    }
}

/// A keyed, named, ordered list of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub key: String,
    pub name: String,
    pub tasks: Vec<Task>,
}

impl Board {
    pub fn new(key: impl Into<String>, name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            tasks,
        }
    }

    /// The default board with one sample task per status.
    pub fn seeded_default() -> Self {
        Self::new(DEFAULT_BOARD_KEY, DEFAULT_BOARD_NAME, seed_tasks())
    }

    /// Name used for a board created without one.
    pub fn fallback_name(key: &str) -> String {
        if key == DEFAULT_BOARD_KEY {
            DEFAULT_BOARD_NAME.to_string()
        } else {
            key.to_string()
        }
    }

    /// Groups tasks into one column per status, in status order.
    /// Tasks keep their board order within a column.
    pub fn columns(&self) -> Vec<(Status, Vec<&Task>)> {
        Status::ALL
            .into_iter()
            .map(|status| {
                let tasks = self
                    .tasks
                    .iter()
                    .filter(|task| task.status == status)
                    .collect();
                (status, tasks)
            })
            .collect()
    }

    pub fn to_json(&self) -> JsonValue {
        let tasks: Vec<JsonValue> = self.tasks.iter().map(Task::to_json).collect();
        JsonObject::new()
            .with("key", self.key.as_str())
            .with("name", self.name.as_str())
            .with("tasks", tasks)
            .into()
    }
}

/// Reads a text field, treating null, missing and non-scalar values as empty.
pub(crate) fn text_field(record: &JsonObject, key: &str) -> String {
    record
        .get(key)
        .and_then(JsonValue::to_text)
        .unwrap_or_default()
}

/// Accepts integers and strings that hold an integer.
fn integer_field(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::String(text) => text.trim().parse().ok(),
        other => other.as_i64(),
    }
}

fn seed_tasks() -> Vec<Task> {
    vec![
        Task {
            id: 1,
            title: "Сделать макет главной страницы".to_string(),
            body: "Нарисовать макет и согласовать с заказчиком.".to_string(),
            status: Status::Todo,
            due_date: "2025-10-20".to_string(),
            participants: "Никита".to_string(),
            hashtags: "#дизайн #главная".to_string(),
        },
        Task {
            id: 2,
            title: "Сверстать канбан-доску".to_string(),
            body: "Сделать 4 колонки и кликабельные карточки.".to_string(),
            status: Status::InProgress,
            due_date: "2025-10-22".to_string(),
            participants: "Никита, Иван".to_string(),
            hashtags: "#frontend #kanban".to_string(),
        },
        Task {
            id: 3,
            title: "Подготовить демо для заказчика".to_string(),
            body: "Показать рабочий прототип преподавателю.".to_string(),
            status: Status::Review,
            due_date: "2025-10-23".to_string(),
            participants: "Никита".to_string(),
            hashtags: "#демо".to_string(),
        },
        Task {
            id: 4,
            title: "Написать отчёт по практике".to_string(),
            body: "Скриншоты, описание архитектуры, выводы.".to_string(),
            status: Status::Done,
            due_date: "2025-10-25".to_string(),
            participants: "Никита".to_string(),
            hashtags: "#отчёт".to_string(),
        },
    ]
}
