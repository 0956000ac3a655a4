use std::collections::HashSet;

use crate::board::{DEFAULT_BOARD_KEY, Task, TaskRecordError, text_field};
use crate::json::JsonValue;

/// Well-formed JSON that is not a usable edit payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("edit payload is not a JSON object")]
    RootNotObject,
    #[error("edit payload has no tasks")]
    TasksMissing,
    #[error("edit payload tasks is not an array")]
    TasksNotArray,
    #[error("task #{0} is not an object")]
    TaskNotObject(usize),
    #[error("task #{0} has no integer id")]
    TaskMissingId(usize),
    #[error("task #{0} has a non-integer order")]
    TaskBadOrder(usize),
    #[error("task id {0} appears more than once")]
    DuplicateTaskId(i64),
}

impl ValidationError {
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::RootNotObject => "root_not_object",
            ValidationError::TasksMissing => "tasks_missing",
            ValidationError::TasksNotArray => "tasks_not_array",
            ValidationError::TaskNotObject(_) => "task_not_object",
            ValidationError::TaskMissingId(_) => "task_missing_id",
            ValidationError::TaskBadOrder(_) => "task_bad_order",
            ValidationError::DuplicateTaskId(_) => "duplicate_task_id",
        }
    }
}

/// A whole-board update sent by the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub board_key: String,
    pub board_name: String,
    pub reason: Option<String>,
    pub updated_at: Option<String>,
    /// Tasks in the order the board should show them.
    pub tasks: Vec<Task>,
}

impl EditRequest {
    /// Validates a parsed payload of the shape
    /// `{boardKey, boardName, reason, updatedAt, tasks: [{id, ..., order}]}`.
    ///
    /// Either every task is accepted or the whole payload is rejected.
    pub fn from_json(value: &JsonValue) -> Result<Self, ValidationError> {
        let root = value.as_object().ok_or(ValidationError::RootNotObject)?;

        let board_key = match text_field(root, "boardKey") {
            key if key.trim().is_empty() => DEFAULT_BOARD_KEY.to_string(),
            key => key,
        };
        let records = match root.get("tasks") {
            None | Some(JsonValue::Null) => return Err(ValidationError::TasksMissing),
            Some(JsonValue::Array(records)) => records,
            Some(_) => return Err(ValidationError::TasksNotArray),
        };

        let mut seen = HashSet::with_capacity(records.len());
        let mut ordered = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let task = Task::from_json(record).map_err(|err| match err {
                TaskRecordError::NotObject => ValidationError::TaskNotObject(index),
                TaskRecordError::MissingId => ValidationError::TaskMissingId(index),
            })?;
            if !seen.insert(task.id) {
                return Err(ValidationError::DuplicateTaskId(task.id));
            }
            let order = match record.as_object().and_then(|object| object.get("order")) {
                None | Some(JsonValue::Null) => index as i64,
                Some(order) => order
                    .as_i64()
                    .ok_or(ValidationError::TaskBadOrder(index))?,
            };
            ordered.push((order, task));
        }
        // Stable, so equal orders keep their array order.
        ordered.sort_by_key(|(order, _)| *order);

        Ok(Self {
            board_key,
            board_name: text_field(root, "boardName"),
            reason: root.get("reason").and_then(JsonValue::to_text),
            updated_at: root.get("updatedAt").and_then(JsonValue::to_text),
            tasks: ordered.into_iter().map(|(_, task)| task).collect(),
        })
    }
}
