use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt::{self, Display, Formatter};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::board::{Board, Task, text_field};
use crate::json::{self, JsonObject, JsonValue, ParseError};

/// Suffix of the scratch file a save writes before renaming it into place.
pub const TEMP_SUFFIX: &str = ".tmp";

/// The persisted state file could not be turned back into boards.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read state file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("state file is not valid JSON: {0}")]
    Parse(#[from] ParseError),
    #[error("state file root is not a JSON object")]
    RootNotObject,
}

/// Step of a save that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStage {
    WriteTemp,
    Overwrite,
}

impl Display for SaveStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SaveStage::WriteTemp => "write temporary copy of",
            SaveStage::Overwrite => "overwrite",
        })
    }
}

/// Writing the state file failed. The previous file content is left intact
/// unless the stage is [`SaveStage::Overwrite`].
#[derive(Debug, thiserror::Error)]
#[error("failed to {stage} state file {}", .path.display())]
pub struct PersistenceError {
    pub stage: SaveStage,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Where the board store keeps its durable copy.
#[cfg_attr(test, mockall::automock)]
pub trait StateRepository: Send + Sync {
    /// Reads persisted boards. `Ok(None)` means nothing has been persisted yet.
    fn load(&self) -> Result<Option<Vec<Board>>, LoadError>;

    /// Durably replaces the persisted boards with `boards`.
    fn save(&self, boards: &[Board]) -> Result<(), PersistenceError>;
}

/// Keeps the whole store as one JSON document on disk.
///
/// Saves go to `<path>.tmp` first and are then renamed over `path`, so a reader
/// of `path` sees either the previous document or the new one in full.
#[derive(Debug, Clone)]
pub struct FileStateRepository {
    path: PathBuf,
}

impl FileStateRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> PathBuf {
        let mut temp: OsString = self.path.clone().into_os_string();
        temp.push(TEMP_SUFFIX);
        PathBuf::from(temp)
    }

    /// Writes `document` to the temporary file and flushes it to disk.
    pub fn write_temp(&self, document: &str) -> Result<PathBuf, PersistenceError> {
        let temp = self.temp_path();
        let written = File::create(&temp).and_then(|mut file| {
            file.write_all(document.as_bytes())?;
            file.sync_all()
        });
        written.map_err(|source| self.error(SaveStage::WriteTemp, source))?;
        Ok(temp)
    }

    /// Moves a fully written temporary file onto the state path.
    ///
    /// Falls back to copying over the state path, retried once, where an atomic
    /// rename is refused.
    pub fn commit(&self, temp: &Path) -> Result<(), PersistenceError> {
        match fs::rename(temp, &self.path) {
            Ok(()) => {
                self.sync_parent_dir();
                Ok(())
            }
            Err(rename_error) => {
                tracing::warn!(
                    "Atomic rename onto {} failed ({}), overwriting in place",
                    self.path.display(),
                    rename_error
                );
                self.overwrite_from(temp)
            }
        }
    }

    fn overwrite_from(&self, temp: &Path) -> Result<(), PersistenceError> {
        let copied = fs::copy(temp, &self.path).or_else(|first_error| {
            tracing::warn!("Overwrite failed ({}), retrying once", first_error);
            fs::copy(temp, &self.path)
        });
        copied.map_err(|source| self.error(SaveStage::Overwrite, source))?;
        if let Err(err) = fs::remove_file(temp) {
            tracing::debug!("Could not remove {}: {}", temp.display(), err);
        }
        Ok(())
    }

    fn sync_parent_dir(&self) {
        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    fn error(&self, stage: SaveStage, source: io::Error) -> PersistenceError {
        PersistenceError {
            stage,
            path: self.path.clone(),
            source,
        }
    }
}

impl StateRepository for FileStateRepository {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Option<Vec<Board>>, LoadError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LoadError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        decode_boards(&text).map(Some)
    }

    #[tracing::instrument(skip(self, boards), fields(path = %self.path.display()))]
    fn save(&self, boards: &[Board]) -> Result<(), PersistenceError> {
        let document = encode_boards(boards);
        let temp = self.write_temp(&document)?;
        self.commit(&temp)
    }
}

/// Serialises boards to the persisted document `{"boards":[...]}`.
///
/// Output depends only on the boards and their order.
pub fn encode_boards(boards: &[Board]) -> String {
    let boards: Vec<JsonValue> = boards.iter().map(Board::to_json).collect();
    JsonValue::from(JsonObject::new().with("boards", boards)).to_json()
}

/// Parses a persisted document.
///
/// Boards without a key and tasks without an integer id are skipped, as are
/// repeated board keys and repeated task ids within a board; the first
/// occurrence wins. Only unparseable text or a non-object root fails the load.
pub fn decode_boards(text: &str) -> Result<Vec<Board>, LoadError> {
    let root = json::parse(text)?;
    let root = root.as_object().ok_or(LoadError::RootNotObject)?;

    let records: &[JsonValue] = match root.get("boards") {
        Some(JsonValue::Array(records)) => records.as_slice(),
        Some(_) => {
            tracing::warn!("State file \"boards\" is not an array, ignoring it");
            &[]
        }
        None => &[],
    };

    let mut boards: Vec<Board> = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let Some(record) = record.as_object() else {
            tracing::warn!("Skipping board #{}: not an object", index);
            continue;
        };
        let key = text_field(record, "key");
        if key.trim().is_empty() {
            tracing::warn!("Skipping board #{}: missing key", index);
            continue;
        }
        if boards.iter().any(|board| board.key == key) {
            tracing::warn!("Skipping board #{}: duplicate key {:?}", index, key);
            continue;
        }
        let name = record
            .get("name")
            .and_then(JsonValue::to_text)
            .unwrap_or_else(|| key.clone());
        let tasks = decode_tasks(&key, record.get("tasks"));
        boards.push(Board { key, name, tasks });
    }
    Ok(boards)
}

fn decode_tasks(board_key: &str, value: Option<&JsonValue>) -> Vec<Task> {
    let records = value.and_then(JsonValue::as_array).unwrap_or_default();
    let mut seen = HashSet::with_capacity(records.len());
    let mut tasks = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match Task::from_json(record) {
            Ok(task) if seen.insert(task.id) => tasks.push(task),
            Ok(task) => tracing::warn!(
                "Skipping task #{} on board {:?}: duplicate id {}",
                index,
                board_key,
                task.id
            ),
            Err(err) => tracing::warn!("Skipping task #{} on board {:?}: {}", index, board_key, err),
        }
    }
    tasks
}
