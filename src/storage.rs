/// Storage for the persisted task record (chrome.storage.local in the extension)

use crate::error::{Result, SidebarError};
use crate::identity::resolve_id;
use crate::notes::{self, NoteEdit};
use crate::tab_data::{Note, Task};
use serde::Deserialize;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Async key-value storage holding one JSON record per key
pub trait KeyValueStore {
    /// A missing key reads as `None`
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>>;

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>>;

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// In-memory store; clones share the same records
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Rc<RefCell<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move { Ok(self.records.borrow().get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.records.borrow_mut().insert(key.to_string(), value);
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.records.borrow_mut().remove(key);
            Ok(())
        })
    }
}

/// Lenient shape of a stored task; unknown fields (legacy `key`, `taskId`) are ignored
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    #[serde(default)]
    title: String,
    #[serde(default, alias = "meta")]
    summary: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    tab_id: Option<i32>,
    #[serde(default)]
    notes: Value,
}

/// The `tasks` record: an ordered list of tasks, unique by id
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskList {
    pub tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        TaskList { tasks: Vec::new() }
    }

    /// Parse a stored record, repairing what can be repaired
    ///
    /// Ids are re-derived from (title, url), notes are normalized, entries
    /// without a url are dropped, and duplicate ids keep the first entry.
    pub fn from_value(value: &Value) -> TaskList {
        let items = match value {
            Value::Array(items) => items,
            Value::Null => return TaskList::new(),
            other => {
                let err = SidebarError::StorageCorruption(format!("tasks is not a list: {}", other));
                log::warn!("{}", err);
                return TaskList::new();
            }
        };

        let mut seen = HashSet::new();
        let tasks = items
            .iter()
            .filter_map(|item| match TaskRecord::deserialize(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::warn!("{}", SidebarError::StorageCorruption(format!("{}: {}", e, item)));
                    None
                }
            })
            .filter(|record| !record.url.is_empty())
            .map(|record| Task {
                id: resolve_id(&record.title, &record.url),
                title: record.title,
                summary: record.summary,
                url: record.url,
                tab_id: record.tab_id,
                notes: notes::notes_from_value(&record.notes),
            })
            .filter(|task| seen.insert(task.id.clone()))
            .collect();

        TaskList { tasks }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.tasks)?)
    }

    /// Add a task unless one with the same id exists
    pub fn add_task(&mut self, task: Task) -> bool {
        if self.contains(&task.id) {
            return false;
        }
        self.tasks.push(task);
        true
    }

    pub fn remove_task(&mut self, task_id: &str) -> bool {
        let original_len = self.tasks.len();
        self.tasks.retain(|t| t.id != task_id);
        self.tasks.len() < original_len
    }

    pub fn get_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn get_task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.get_task(task_id).is_some()
    }
}

/// Read-modify-write access to the task record
///
/// The record is loaded once and kept in memory. Each mutation is applied
/// to that snapshot synchronously and the whole record is written back, so
/// edits issued before an earlier write resolves are not lost. A reload
/// never replaces the snapshot while a write is in flight or after a
/// mutation happened during the read.
pub struct TaskRepository<S> {
    store: S,
    key: String,
    cache: RefCell<Option<TaskList>>,
    /// Bumped by every applied mutation
    version: Cell<u64>,
    pending_writes: Cell<usize>,
}

impl<S: KeyValueStore> TaskRepository<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        TaskRepository {
            store,
            key: key.into(),
            cache: RefCell::new(None),
            version: Cell::new(0),
            pending_writes: Cell::new(0),
        }
    }

    /// Reload the record from the store
    ///
    /// While local edits are unsaved the in-memory snapshot is newer than
    /// the store, so it is returned as is.
    pub async fn refresh(&self) -> Result<TaskList> {
        if self.pending_writes.get() > 0 {
            log::debug!("Skipping reload, {} write(s) pending", self.pending_writes.get());
            return self.tasks().await;
        }

        let version = self.version.get();
        let list = self.load().await?;
        if self.pending_writes.get() > 0 || self.version.get() != version {
            log::debug!("Discarding reload, tasks changed while reading");
            return self.tasks().await;
        }

        self.cache.replace(Some(list.clone()));
        Ok(list)
    }

    pub async fn tasks(&self) -> Result<TaskList> {
        self.ensure_loaded().await?;
        Ok(self.cache.borrow().clone().unwrap_or_default())
    }

    pub async fn add_task(&self, task: Task) -> Result<TaskList> {
        let (tasks, added) = self.mutate(|list| list.add_task(task).then_some(())).await?;
        if added.is_some() {
            log::info!("Saved task ({} total)", tasks.tasks.len());
        }
        Ok(tasks)
    }

    pub async fn remove_task(&self, task_id: &str) -> Result<TaskList> {
        let (tasks, _) = self
            .mutate(|list| list.remove_task(task_id).then_some(()))
            .await?;
        Ok(tasks)
    }

    /// Add the task when absent, remove it when present; returns whether it is now bookmarked
    pub async fn toggle_bookmark(&self, task: Task) -> Result<(TaskList, bool)> {
        let (tasks, bookmarked) = self
            .mutate(|list| {
                if list.remove_task(&task.id) {
                    Some(false)
                } else {
                    list.add_task(task);
                    Some(true)
                }
            })
            .await?;
        Ok((tasks, bookmarked.unwrap_or(false)))
    }

    pub async fn clear(&self) -> Result<TaskList> {
        self.store.remove(&self.key).await?;
        self.cache.replace(Some(TaskList::new()));
        self.version.set(self.version.get() + 1);
        log::info!("Cleared all tasks");
        Ok(TaskList::new())
    }

    pub async fn set_note_text(&self, task_id: &str, index: usize, text: &str) -> Result<TaskList> {
        let (tasks, _) = self
            .mutate(|list| {
                let task = list.get_task_mut(task_id)?;
                task.notes = notes::set_text(&task.notes, index, text)?;
                Some(())
            })
            .await?;
        Ok(tasks)
    }

    pub async fn toggle_note(&self, task_id: &str, index: usize, checked: bool) -> Result<TaskList> {
        let (tasks, _) = self
            .mutate(|list| {
                let task = list.get_task_mut(task_id)?;
                task.notes = notes::toggle_checked(&task.notes, index, checked)?;
                Some(())
            })
            .await?;
        Ok(tasks)
    }

    /// Returns the index to focus when a new line was opened
    pub async fn commit_note_line(
        &self,
        task_id: &str,
        index: usize,
        current_text: &str,
    ) -> Result<(TaskList, Option<usize>)> {
        self.structural_edit(task_id, |notes| {
            notes::commit_new_line(notes, index, current_text)
        })
        .await
    }

    /// Returns the index to focus when an item was deleted
    pub async fn delete_note(
        &self,
        task_id: &str,
        index: usize,
        current_text: &str,
    ) -> Result<(TaskList, Option<usize>)> {
        self.structural_edit(task_id, |notes| notes::delete_at(notes, index, current_text))
            .await
    }

    async fn structural_edit(
        &self,
        task_id: &str,
        edit: impl FnOnce(&[Note]) -> Option<NoteEdit>,
    ) -> Result<(TaskList, Option<usize>)> {
        self.mutate(|list| {
            let task = list.get_task_mut(task_id)?;
            let NoteEdit { notes, focus } = edit(&task.notes)?;
            task.notes = notes;
            Some(focus)
        })
        .await
    }

    async fn load(&self) -> Result<TaskList> {
        let value = self.store.get(&self.key).await?;
        Ok(value
            .map(|value| TaskList::from_value(&value))
            .unwrap_or_default())
    }

    async fn ensure_loaded(&self) -> Result<()> {
        if self.cache.borrow().is_some() {
            return Ok(());
        }

        let list = self.load().await?;
        let mut cache = self.cache.borrow_mut();
        // A concurrent load may have finished first; keep its (possibly mutated) state
        if cache.is_none() {
            *cache = Some(list);
        }
        Ok(())
    }

    /// Apply `apply` to the in-memory record; `None` means nothing changed and nothing is written
    async fn mutate<R>(
        &self,
        apply: impl FnOnce(&mut TaskList) -> Option<R>,
    ) -> Result<(TaskList, Option<R>)> {
        self.ensure_loaded().await?;

        let (snapshot, outcome) = {
            let mut cache = self.cache.borrow_mut();
            let list = cache.get_or_insert_with(TaskList::new);
            let outcome = apply(list);
            (list.clone(), outcome)
        };

        if outcome.is_some() {
            self.version.set(self.version.get() + 1);
            let value = snapshot.to_value()?;

            self.pending_writes.set(self.pending_writes.get() + 1);
            let written = self.store.set(&self.key, value).await;
            self.pending_writes.set(self.pending_writes.get() - 1);

            if let Err(e) = written {
                // Force a reload so memory does not drift from what was persisted
                self.cache.replace(None);
                return Err(e);
            }
        }

        Ok((snapshot, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_task(title: &str, url: &str) -> Task {
        Task {
            id: resolve_id(title, url),
            title: title.to_string(),
            summary: format!("About {}", title),
            url: url.to_string(),
            tab_id: Some(1),
            notes: Vec::new(),
        }
    }

    /// Store whose reads yield to the scheduler before completing
    #[derive(Default)]
    struct SlowStore {
        inner: MemoryStore,
    }

    impl KeyValueStore for SlowStore {
        fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
            Box::pin(async move {
                tokio::task::yield_now().await;
                self.inner.get(key).await
            })
        }

        fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
            self.inner.set(key, value)
        }

        fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
            self.inner.remove(key)
        }
    }

    /// Store whose reads and writes both yield before touching the records
    #[derive(Default)]
    struct YieldingStore {
        inner: MemoryStore,
    }

    impl KeyValueStore for YieldingStore {
        fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
            Box::pin(async move {
                tokio::task::yield_now().await;
                self.inner.get(key).await
            })
        }

        fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                tokio::task::yield_now().await;
                self.inner.set(key, value).await
            })
        }

        fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
            self.inner.remove(key)
        }
    }

    fn stored_titles(store: &MemoryStore) -> Vec<String> {
        let value = store.records.borrow().get("tasks").cloned().unwrap_or_default();
        TaskList::from_value(&value)
            .tasks
            .into_iter()
            .map(|task| task.title)
            .collect()
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
            Box::pin(async { Ok(None) })
        }

        fn set<'a>(&'a self, _key: &'a str, _value: Value) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Err(SidebarError::Storage("quota exceeded".to_string())) })
        }

        fn remove<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn test_task_list_new() {
        let list = TaskList::new();
        assert_eq!(list.tasks.len(), 0);
    }

    #[test]
    fn test_add_task_is_write_if_absent() {
        let mut list = TaskList::new();
        assert!(list.add_task(create_test_task("A", "https://a.com")));
        assert!(!list.add_task(create_test_task("A", "https://a.com")));
        assert!(list.add_task(create_test_task("B", "https://a.com")));
        assert_eq!(list.tasks.len(), 2);
    }

    #[test]
    fn test_remove_task() {
        let mut list = TaskList::new();
        let task = create_test_task("A", "https://a.com");
        let id = task.id.clone();
        list.add_task(task);
        list.add_task(create_test_task("B", "https://b.com"));

        assert!(list.remove_task(&id));
        assert!(!list.remove_task(&id));
        assert_eq!(list.tasks.len(), 1);
        assert_eq!(list.tasks[0].title, "B");
    }

    #[test]
    fn test_from_value_repairs_legacy_record() {
        let value = json!([
            {
                "taskId": "task-1698508200000",
                "key": "Google-https://google.com",
                "title": "Google",
                "summary": "Search",
                "url": "https://google.com",
                "tabId": 4
            },
            {
                "id": "something-else",
                "title": "Docs",
                "meta": "Read the docs",
                "url": "https://docs.rs",
                "notes": ["first", {"text": "second", "checked": true}, ""]
            },
            {"title": "Google", "summary": "duplicate", "url": "https://google.com"},
            {"title": "no url"},
            "garbage",
            {"title": 5, "url": "https://bad.types"}
        ]);

        let list = TaskList::from_value(&value);

        assert_eq!(list.tasks.len(), 2);
        assert_eq!(list.tasks[0].id, resolve_id("Google", "https://google.com"));
        assert_eq!(list.tasks[0].summary, "Search");
        assert_eq!(list.tasks[0].tab_id, Some(4));
        assert!(list.tasks[0].notes.is_empty());

        assert_eq!(list.tasks[1].id, resolve_id("Docs", "https://docs.rs"));
        assert_eq!(list.tasks[1].summary, "Read the docs");
        assert_eq!(
            list.tasks[1].notes,
            vec![
                Note::new("first"),
                Note {
                    text: "second".to_string(),
                    checked: true
                },
                Note::placeholder(),
            ]
        );
    }

    #[test]
    fn test_from_value_not_a_list() {
        assert_eq!(TaskList::from_value(&json!({"tasks": []})), TaskList::new());
        assert_eq!(TaskList::from_value(&Value::Null), TaskList::new());
    }

    #[test]
    fn test_serialization() {
        let mut list = TaskList::new();
        list.add_task(create_test_task("Test", "https://test.com"));

        let value = list.to_value().unwrap();
        let restored = TaskList::from_value(&value);

        assert_eq!(restored, list);
    }

    #[tokio::test]
    async fn test_repository_defaults_to_empty() {
        let repo = TaskRepository::new(MemoryStore::new(), "tasks");
        assert!(repo.tasks().await.unwrap().tasks.is_empty());
    }

    #[tokio::test]
    async fn test_repository_add_and_remove_persist() {
        let store = MemoryStore::new();
        let repo = TaskRepository::new(store.clone(), "tasks");
        let task = create_test_task("A", "https://a.com");
        let id = task.id.clone();

        repo.add_task(task.clone()).await.unwrap();
        repo.add_task(task).await.unwrap();

        let stored = store.get("tasks").await.unwrap().unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 1);

        let tasks = repo.remove_task(&id).await.unwrap();
        assert!(tasks.tasks.is_empty());
        assert_eq!(store.get("tasks").await.unwrap(), Some(json!([])));
    }

    #[tokio::test]
    async fn test_repository_toggle_bookmark() {
        let repo = TaskRepository::new(MemoryStore::new(), "tasks");
        let task = create_test_task("A", "https://a.com");

        let (tasks, bookmarked) = repo.toggle_bookmark(task.clone()).await.unwrap();
        assert!(bookmarked);
        assert_eq!(tasks.tasks.len(), 1);

        let (tasks, bookmarked) = repo.toggle_bookmark(task).await.unwrap();
        assert!(!bookmarked);
        assert!(tasks.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_repository_clear_removes_record() {
        let store = MemoryStore::new();
        let repo = TaskRepository::new(store.clone(), "tasks");
        repo.add_task(create_test_task("A", "https://a.com")).await.unwrap();

        let tasks = repo.clear().await.unwrap();

        assert!(tasks.tasks.is_empty());
        assert_eq!(store.get("tasks").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_repository_note_round_trip() {
        let store = MemoryStore::new();
        let repo = TaskRepository::new(store.clone(), "tasks");
        let task = create_test_task("A", "https://a.com");
        let id = task.id.clone();
        repo.add_task(task).await.unwrap();

        repo.set_note_text(&id, 0, "first").await.unwrap();
        repo.toggle_note(&id, 0, true).await.unwrap();
        repo.set_note_text(&id, 0, "first, edited").await.unwrap();

        // Read back through a fresh repository to go through storage
        let fresh = TaskRepository::new(store, "tasks");
        let tasks = fresh.tasks().await.unwrap();
        assert_eq!(
            tasks.get_task(&id).unwrap().notes,
            vec![Note {
                text: "first, edited".to_string(),
                checked: true
            }]
        );
    }

    #[tokio::test]
    async fn test_repository_structural_note_edits() {
        let repo = TaskRepository::new(MemoryStore::new(), "tasks");
        let task = create_test_task("A", "https://a.com");
        let id = task.id.clone();
        repo.add_task(task).await.unwrap();
        repo.set_note_text(&id, 0, "a").await.unwrap();

        let (tasks, focus) = repo.commit_note_line(&id, 0, "a").await.unwrap();
        assert_eq!(focus, Some(1));
        assert_eq!(
            tasks.get_task(&id).unwrap().notes,
            vec![Note::new("a"), Note::placeholder()]
        );

        repo.set_note_text(&id, 1, "b").await.unwrap();
        let (tasks, focus) = repo.delete_note(&id, 1, "").await.unwrap();
        assert_eq!(focus, Some(0));
        assert_eq!(tasks.get_task(&id).unwrap().notes, vec![Note::new("a")]);

        // Guards leave the record untouched
        let (_, focus) = repo.delete_note(&id, 0, "a").await.unwrap();
        assert_eq!(focus, None);
    }

    #[tokio::test]
    async fn test_repository_unknown_task_is_noop() {
        let store = MemoryStore::new();
        let repo = TaskRepository::new(store.clone(), "tasks");

        let tasks = repo.set_note_text("task-missing", 0, "x").await.unwrap();

        assert!(tasks.tasks.is_empty());
        assert_eq!(store.get("tasks").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_repository_concurrent_edits_are_not_lost() {
        let store = SlowStore::default();
        let backing = store.inner.clone();
        let repo = TaskRepository::new(store, "tasks");

        let (first, second) = tokio::join!(
            repo.add_task(create_test_task("A", "https://a.com")),
            repo.add_task(create_test_task("B", "https://b.com")),
        );
        first.unwrap();
        second.unwrap();

        let stored = TaskList::from_value(&backing.get("tasks").await.unwrap().unwrap());
        assert_eq!(stored.tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_during_write_keeps_edit() {
        let store = YieldingStore::default();
        let backing = store.inner.clone();
        let repo = TaskRepository::new(store, "tasks");

        repo.add_task(create_test_task("A", "https://a.com")).await.unwrap();
        let (added, refreshed) = tokio::join!(
            repo.add_task(create_test_task("B", "https://b.com")),
            repo.refresh(),
        );
        added.unwrap();
        assert_eq!(refreshed.unwrap().tasks.len(), 2);
        repo.add_task(create_test_task("C", "https://c.com")).await.unwrap();

        assert_eq!(stored_titles(&backing), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_write_during_refresh_keeps_edit() {
        let store = YieldingStore::default();
        let backing = store.inner.clone();
        let repo = TaskRepository::new(store, "tasks");

        repo.add_task(create_test_task("A", "https://a.com")).await.unwrap();
        let (refreshed, added) = tokio::join!(
            repo.refresh(),
            repo.add_task(create_test_task("B", "https://b.com")),
        );
        refreshed.unwrap();
        added.unwrap();
        repo.add_task(create_test_task("C", "https://c.com")).await.unwrap();

        assert_eq!(stored_titles(&backing), vec!["A", "B", "C"]);
        assert_eq!(repo.tasks().await.unwrap().tasks.len(), 3);
    }

    #[tokio::test]
    async fn test_refresh_picks_up_external_changes() {
        let store = MemoryStore::new();
        let repo = TaskRepository::new(store.clone(), "tasks");
        repo.add_task(create_test_task("A", "https://a.com")).await.unwrap();

        store.set("tasks", json!([{"title": "B", "url": "https://b.com"}])).await.unwrap();
        let tasks = repo.refresh().await.unwrap();

        assert_eq!(tasks.tasks.len(), 1);
        assert_eq!(tasks.tasks[0].title, "B");
    }

    #[tokio::test]
    async fn test_repository_failed_write_reloads() {
        let repo = TaskRepository::new(FailingStore, "tasks");

        let result = repo.add_task(create_test_task("A", "https://a.com")).await;

        assert!(matches!(result, Err(SidebarError::Storage(_))));
        assert!(repo.tasks().await.unwrap().tasks.is_empty());
    }
}
