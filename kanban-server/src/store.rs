use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::board::{Board, DEFAULT_BOARD_KEY, Task};
use crate::persistence::{PersistenceError, StateRepository, encode_boards};

/// Key and display name of a board, for listing boards without their tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSummary {
    pub key: String,
    pub name: String,
    pub task_count: usize,
}

/// All boards of the process, guarded by a single lock.
///
/// Every read hands out a copy and every write replaces a board wholesale and
/// saves the whole store before the lock is released, so saves happen in the
/// same order as the mutations they reflect.
pub struct BoardStore {
    boards: Mutex<Vec<Board>>,
    repository: Box<dyn StateRepository>,
}

impl BoardStore {
    /// Builds the store from persisted state.
    ///
    /// Nothing persisted yet: the default board is seeded and saved right away.
    /// Unreadable state: the default board is seeded in memory only, so the
    /// broken file stays on disk until the first successful edit replaces it.
    #[tracing::instrument(skip(repository))]
    pub fn open(repository: impl StateRepository + 'static) -> Self {
        let (boards, needs_save) = match repository.load() {
            Ok(Some(mut boards)) if !boards.is_empty() => {
                let has_default = boards.iter().any(|board| board.key == DEFAULT_BOARD_KEY);
                if !has_default {
                    tracing::warn!("Saved state has no default board, seeding one");
                    boards.push(Board::seeded_default());
                }
                tracing::info!("Loaded {} board(s) from saved state", boards.len());
                (boards, !has_default)
            }
            Ok(_) => {
                tracing::info!("No saved state found, seeding the default board");
                (vec![Board::seeded_default()], true)
            }
            Err(err) => {
                tracing::warn!("Could not load saved state ({}), seeding the default board", err);
                (vec![Board::seeded_default()], false)
            }
        };

        if needs_save {
            if let Err(err) = repository.save(&boards) {
                tracing::error!("Failed to persist initial state: {}", err);
            }
        }

        Self {
            boards: Mutex::new(boards),
            repository: Box::new(repository),
        }
    }

    /// Returns a copy of the tasks of `board_key`, in board order.
    ///
    /// Only the default board is ever created by a read.
    pub fn snapshot(&self, board_key: &str) -> Option<Vec<Task>> {
        self.snapshot_board(board_key).map(|board| board.tasks)
    }

    /// Returns a copy of the whole board, name included.
    pub fn snapshot_board(&self, board_key: &str) -> Option<Board> {
        find_or_seed(&mut self.lock(), board_key)
    }

    /// Lists every board in store order.
    pub fn summaries(&self) -> Vec<BoardSummary> {
        summarize(&self.lock())
    }

    /// The board a page shows plus the list of every board, read under one lock.
    ///
    /// Falls back to the default board when `board_key` is absent or unknown.
    pub fn page_view(&self, board_key: Option<&str>) -> (Board, Vec<BoardSummary>) {
        let mut boards = self.lock();
        let board = board_key
            .and_then(|key| find_or_seed(&mut boards, key))
            .or_else(|| find_or_seed(&mut boards, DEFAULT_BOARD_KEY))
            .unwrap_or_else(Board::seeded_default);
        (board, summarize(&boards))
    }

    /// Replaces the tasks of `board_key` with `tasks`, creating the board if needed,
    /// then saves the store.
    ///
    /// A blank `board_name` keeps the current name. The in-memory change stays
    /// applied when the save fails; the error is returned to the caller.
    #[tracing::instrument(skip(self, tasks), fields(task_count = tasks.len()))]
    pub fn replace_board(
        &self,
        board_key: &str,
        board_name: &str,
        tasks: Vec<Task>,
    ) -> Result<(), PersistenceError> {
        let board_key = if board_key.trim().is_empty() {
            DEFAULT_BOARD_KEY
        } else {
            board_key
        };
        let has_name = !board_name.trim().is_empty();

        let mut boards = self.lock();
        match boards.iter_mut().find(|board| board.key == board_key) {
            Some(board) => {
                if has_name {
                    board.name = board_name.to_string();
                }
                board.tasks = tasks;
            }
            None => {
                let name = if has_name {
                    board_name.to_string()
                } else {
                    Board::fallback_name(board_key)
                };
                tracing::info!("Creating board {:?}", board_key);
                boards.push(Board::new(board_key, name, tasks));
            }
        }

        self.repository.save(&boards).inspect_err(|err| {
            tracing::error!("Board {:?} updated in memory but not saved: {}", board_key, err);
        })
    }

    /// Serialises the whole store as `{"boards":[...]}`.
    pub fn export_all(&self) -> String {
        encode_boards(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Board>> {
        // Mutations are single assignments, so a poisoned guard still holds consistent state.
        self.boards.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Copies out `board_key`; only the default board is created when missing.
fn find_or_seed(boards: &mut Vec<Board>, board_key: &str) -> Option<Board> {
    if let Some(board) = boards.iter().find(|board| board.key == board_key) {
        return Some(board.clone());
    }
    if board_key == DEFAULT_BOARD_KEY {
        let board = Board::seeded_default();
        boards.push(board.clone());
        return Some(board);
    }
    None
}

fn summarize(boards: &[Board]) -> Vec<BoardSummary> {
    boards
        .iter()
        .map(|board| BoardSummary {
            key: board.key.clone(),
            name: board.name.clone(),
            task_count: board.tasks.len(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{DEFAULT_BOARD_NAME, Status};
    use crate::json::{ParseError, ParseErrorKind};
    use crate::persistence::{LoadError, MockStateRepository, SaveStage};
    use std::io;
    use std::sync::Arc;

    fn repository_with(boards: Option<Vec<Board>>) -> MockStateRepository {
        let mut repository = MockStateRepository::new();
        repository
            .expect_load()
            .times(1)
            .return_once(move || Ok(boards));
        repository
    }

    fn seeded_store() -> BoardStore {
        let mut repository = repository_with(None);
        repository.expect_save().returning(|_| Ok(()));
        BoardStore::open(repository)
    }

    fn disk_full() -> PersistenceError {
        PersistenceError {
            stage: SaveStage::WriteTemp,
            path: "kanban_state.json".into(),
            source: io::Error::other("disk full"),
        }
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|task| task.id).collect()
    }

    #[test]
    fn can_seed_and_persist_when_nothing_was_saved() {
        let mut repository = repository_with(None);
        repository
            .expect_save()
            .withf(|boards: &[Board]| *boards == [Board::seeded_default()])
            .times(1)
            .returning(|_| Ok(()));

        let store = BoardStore::open(repository);

        assert_eq!(store.snapshot(DEFAULT_BOARD_KEY).unwrap(), Board::seeded_default().tasks);
    }

    #[test]
    fn can_treat_empty_saved_state_as_nothing_saved() {
        let mut repository = repository_with(Some(vec![]));
        repository.expect_save().times(1).returning(|_| Ok(()));

        let store = BoardStore::open(repository);

        assert_eq!(store.summaries().len(), 1);
    }

    #[test]
    fn can_reseed_without_overwriting_unreadable_state() {
        let mut repository = MockStateRepository::new();
        repository.expect_load().times(1).returning(|| {
            Err(LoadError::Parse(ParseError::new(ParseErrorKind::TrailingChars, 2)))
        });
        repository.expect_save().times(0);

        let store = BoardStore::open(repository);

        assert_eq!(ids(&store.snapshot(DEFAULT_BOARD_KEY).unwrap()), vec![1, 2, 3, 4]);
    }

    #[test]
    fn can_load_saved_boards_without_saving_again() {
        let saved = vec![
            Board::new(DEFAULT_BOARD_KEY, "Mine", vec![Task::new(9, "kept", Status::Done)]),
            Board::new("side", "Side", vec![]),
        ];
        let mut repository = repository_with(Some(saved.clone()));
        repository.expect_save().times(0);

        let store = BoardStore::open(repository);

        assert_eq!(store.snapshot_board(DEFAULT_BOARD_KEY), Some(saved[0].clone()));
        assert_eq!(store.snapshot_board("side"), Some(saved[1].clone()));
    }

    #[test]
    fn can_add_missing_default_board_to_saved_state() {
        let saved = vec![Board::new("side", "Side", vec![])];
        let mut repository = repository_with(Some(saved));
        repository
            .expect_save()
            .withf(|boards: &[Board]| boards.len() == 2 && boards[1].key == DEFAULT_BOARD_KEY)
            .times(1)
            .returning(|_| Ok(()));

        let store = BoardStore::open(repository);

        let keys: Vec<String> = store.summaries().into_iter().map(|summary| summary.key).collect();
        assert_eq!(keys, vec!["side".to_string(), DEFAULT_BOARD_KEY.to_string()]);
    }

    #[test]
    fn can_return_none_for_unknown_board_without_creating_it() {
        let store = seeded_store();

        assert_eq!(store.snapshot("missing"), None);
        assert_eq!(store.summaries().len(), 1);
    }

    #[test]
    fn can_read_page_board_and_board_list_together() {
        let store = seeded_store();
        store
            .replace_board("ops", "Ops", vec![Task::new(8, "page", Status::Review)])
            .unwrap();

        let (board, summaries) = store.page_view(Some("ops"));
        assert_eq!(board.tasks, vec![Task::new(8, "page", Status::Review)]);
        let keys: Vec<&str> = summaries.iter().map(|summary| summary.key.as_str()).collect();
        assert_eq!(keys, vec![DEFAULT_BOARD_KEY, "ops"]);

        let (fallback, summaries) = store.page_view(Some("nowhere"));
        assert_eq!(fallback.key, DEFAULT_BOARD_KEY);
        assert_eq!(summaries.len(), 2);
        assert_eq!(store.page_view(None).0.key, DEFAULT_BOARD_KEY);
    }

    #[test]
    fn can_hand_out_copies_not_live_references() {
        let store = seeded_store();

        let mut snapshot = store.snapshot(DEFAULT_BOARD_KEY).unwrap();
        snapshot.clear();

        assert_eq!(store.snapshot(DEFAULT_BOARD_KEY).unwrap().len(), 4);
    }

    #[test]
    fn can_upsert_new_board_then_replace_its_tasks_entirely() {
        let store = seeded_store();

        store
            .replace_board(
                "newkey",
                "Name",
                vec![Task::new(1, "a", Status::Todo), Task::new(2, "b", Status::Review)],
            )
            .unwrap();
        assert_eq!(store.summaries().len(), 2);
        let board = store.snapshot_board("newkey").unwrap();
        assert_eq!(board.name, "Name");
        assert_eq!(ids(&board.tasks), vec![1, 2]);

        store
            .replace_board("newkey", "Name", vec![Task::new(3, "c", Status::Done)])
            .unwrap();
        assert_eq!(ids(&store.snapshot("newkey").unwrap()), vec![3]);

        store.replace_board("newkey", "Name", vec![]).unwrap();
        assert_eq!(store.snapshot("newkey"), Some(vec![]));
        assert_eq!(store.summaries().len(), 2);
    }

    #[test]
    fn keeps_existing_name_when_replacing_with_blank_name() {
        let store = seeded_store();
        store.replace_board("k", "Original", vec![]).unwrap();

        store.replace_board("k", "", vec![]).unwrap();
        store.replace_board("k", "   ", vec![]).unwrap();

        assert_eq!(store.snapshot_board("k").unwrap().name, "Original");
    }

    #[test]
    fn can_rename_board_when_name_is_supplied() {
        let store = seeded_store();

        store.replace_board(DEFAULT_BOARD_KEY, "Renamed", vec![]).unwrap();

        assert_eq!(store.snapshot_board(DEFAULT_BOARD_KEY).unwrap().name, "Renamed");
    }

    #[test]
    fn can_name_unnamed_new_boards_after_their_key() {
        let store = seeded_store();

        store.replace_board("sprint-7", "", vec![]).unwrap();

        assert_eq!(store.snapshot_board("sprint-7").unwrap().name, "sprint-7");
    }

    #[test]
    fn can_treat_blank_key_as_default_board() {
        let store = seeded_store();

        store
            .replace_board(" ", "", vec![Task::new(8, "x", Status::Todo)])
            .unwrap();

        let board = store.snapshot_board(DEFAULT_BOARD_KEY).unwrap();
        assert_eq!(board.name, DEFAULT_BOARD_NAME);
        assert_eq!(ids(&board.tasks), vec![8]);
    }

    #[test]
    fn can_preserve_client_task_order() {
        let store = seeded_store();

        store
            .replace_board(
                DEFAULT_BOARD_KEY,
                "",
                vec![
                    Task::new(4, "d", Status::Todo),
                    Task::new(1, "a", Status::Todo),
                    Task::new(3, "c", Status::Todo),
                ],
            )
            .unwrap();

        assert_eq!(ids(&store.snapshot(DEFAULT_BOARD_KEY).unwrap()), vec![4, 1, 3]);
    }

    #[test]
    fn can_save_the_state_produced_by_the_replacement() {
        let mut repository = repository_with(None);
        repository.expect_save().times(1).returning(|_| Ok(()));
        repository
            .expect_save()
            .withf(|boards: &[Board]| {
                boards.len() == 1 && boards[0].tasks == vec![Task::new(1, "X", Status::Done)]
            })
            .times(1)
            .returning(|_| Ok(()));
        let store = BoardStore::open(repository);

        store
            .replace_board(DEFAULT_BOARD_KEY, "", vec![Task::new(1, "X", Status::Done)])
            .unwrap();
    }

    #[test]
    fn keeps_in_memory_update_when_save_fails() {
        let mut repository = repository_with(None);
        repository.expect_save().times(1).returning(|_| Ok(()));
        repository.expect_save().returning(|_| Err(disk_full()));
        let store = BoardStore::open(repository);

        let result = store.replace_board(DEFAULT_BOARD_KEY, "", vec![Task::new(1, "X", Status::Done)]);

        let err = result.unwrap_err();
        assert_eq!(err.stage, SaveStage::WriteTemp);
        assert_eq!(ids(&store.snapshot(DEFAULT_BOARD_KEY).unwrap()), vec![1]);
        assert!(store.export_all().contains(r#""title":"X""#));
    }

    #[test]
    fn can_export_boards_in_store_order() {
        let store = seeded_store();
        store.replace_board("second", "Second", vec![]).unwrap();

        let exported = store.export_all();

        let default_at = exported.find(r#""key":"default""#).unwrap();
        let second_at = exported.find(r#""key":"second""#).unwrap();
        assert!(default_at < second_at);
        assert!(exported.ends_with(r#"{"key":"second","name":"Second","tasks":[]}]}"#));
    }

    #[test]
    fn can_serialise_concurrent_replacements() {
        let store = Arc::new(seeded_store());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for round in 0..25 {
                        let tasks = (0..=worker)
                            .map(|id| Task::new(id, format!("w{worker} r{round}"), Status::Todo))
                            .collect();
                        store.replace_board(DEFAULT_BOARD_KEY, "", tasks).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let tasks = store.snapshot(DEFAULT_BOARD_KEY).unwrap();
        let worker = tasks.len() as i64 - 1;
        assert!((0..8).contains(&worker));
        assert!(tasks.iter().all(|task| task.title == tasks[0].title));
        assert_eq!(ids(&tasks), (0..=worker).collect::<Vec<_>>());
    }
}
