use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::datetime::to_millis_precision;
use crate::error::{DocketError, Result};
use crate::task::{Category, Priority, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

/// Ordered collection of live tasks. Order is the user's order, not
/// creation order, once anything has been reordered.
#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    tasks: Vec<Task>,
    last_issued: u64,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrates from previously persisted tasks. Duplicate ids keep the
    /// first occurrence.
    #[instrument(skip(tasks), fields(count = tasks.len()))]
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut seen = HashSet::with_capacity(tasks.len());
        let before = tasks.len();
        let tasks: Vec<Task> = tasks
            .into_iter()
            .filter(|task| seen.insert(task.id))
            .collect();
        if tasks.len() != before {
            info!(
                dropped = before - tasks.len(),
                "dropped tasks with duplicate ids"
            );
        }

        let last_issued = tasks.iter().map(|t| t.id.0).max().unwrap_or(0);
        Self { tasks, last_issued }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id).collect()
    }

    pub fn stats(&self) -> Stats {
        let total = self.tasks.len();
        let completed = self.tasks.iter().filter(|t| t.completed).count();
        Stats {
            total,
            completed,
            pending: total - completed,
        }
    }

    /// Millisecond timestamp of `now`, bumped past the last id handed out
    /// so two creations in the same millisecond never collide.
    fn next_id(&mut self, now: DateTime<Utc>) -> Result<TaskId> {
        let stamp = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let floor = self
            .last_issued
            .checked_add(1)
            .ok_or(DocketError::IdsExhausted)?;
        let id = stamp.max(floor);
        self.last_issued = id;
        Ok(TaskId(id))
    }

    #[instrument(skip(self, text, now))]
    pub fn create(
        &mut self,
        text: &str,
        category: Category,
        priority: Priority,
        due_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<&Task> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            debug!("rejected blank task text");
            return Err(DocketError::Validation);
        }

        let id = self.next_id(now)?;
        let task = Task::new_pending(
            id,
            trimmed.to_string(),
            category,
            priority,
            due_date,
            to_millis_precision(now),
        );
        self.tasks.push(task);
        debug!(%id, count = self.tasks.len(), "task created");

        let idx = self.tasks.len() - 1;
        Ok(&self.tasks[idx])
    }

    /// Flips `completed`, returning the new value.
    #[instrument(skip(self), fields(id = %id))]
    pub fn toggle_complete(&mut self, id: TaskId) -> Result<bool> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(DocketError::NotFound(id))?;
        task.completed = !task.completed;
        debug!(completed = task.completed, "task toggled");
        Ok(task.completed)
    }

    /// Removes the task if present; absent ids are a no-op.
    #[instrument(skip(self), fields(id = %id))]
    pub fn delete(&mut self, id: TaskId) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| t.id == id)?;
        let removed = self.tasks.remove(idx);
        debug!(count = self.tasks.len(), "task deleted");
        Some(removed)
    }

    /// Replaces the order with `order`, which must name every live task
    /// exactly once.
    #[instrument(skip(self, order), fields(count = order.len()))]
    pub fn reorder(&mut self, order: &[TaskId]) -> Result<()> {
        if order.len() != self.tasks.len() {
            return Err(DocketError::InvalidReorder {
                reason: format!(
                    "expected {} ids, got {}",
                    self.tasks.len(),
                    order.len()
                ),
            });
        }

        let mut seen = HashSet::with_capacity(order.len());
        for id in order {
            if !seen.insert(*id) {
                return Err(DocketError::InvalidReorder {
                    reason: format!("duplicate id {id}"),
                });
            }
        }

        let mut slots: Vec<Option<Task>> = self.tasks.iter().cloned().map(Some).collect();
        let mut reordered = Vec::with_capacity(order.len());
        for id in order {
            let slot = slots
                .iter_mut()
                .find(|slot| slot.as_ref().map(|t| t.id) == Some(*id))
                .and_then(Option::take)
                .ok_or_else(|| DocketError::InvalidReorder {
                    reason: format!("unknown id {id}"),
                })?;
            reordered.push(slot);
        }

        self.tasks = reordered;
        debug!("tasks reordered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::TaskStore;
    use crate::error::DocketError;
    use crate::task::{Category, Priority, TaskId};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0)
            .single()
            .expect("valid now")
    }

    fn seeded(texts: &[&str]) -> (TaskStore, Vec<TaskId>) {
        let mut store = TaskStore::new();
        let mut ids = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let id = store
                .create(
                    text,
                    Category::Work,
                    Priority::Medium,
                    None,
                    now() + Duration::seconds(i as i64),
                )
                .expect("create")
                .id;
            ids.push(id);
        }
        (store, ids)
    }

    #[test]
    fn create_appends_pending_trimmed_task() {
        let mut store = TaskStore::new();
        let task = store
            .create("  Buy Milk  ", Category::Shopping, Priority::Low, None, now())
            .expect("create");
        assert_eq!(task.text, "Buy Milk");
        assert!(!task.completed);
        assert_eq!(task.id, TaskId(now().timestamp_millis() as u64));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn blank_text_is_rejected_without_change() {
        let (mut store, _) = seeded(&["a"]);
        let err = store
            .create(" \t ", Category::Work, Priority::High, None, now())
            .expect_err("blank text must fail");
        assert!(matches!(err, DocketError::Validation));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn same_millisecond_creations_get_distinct_ids() {
        let mut store = TaskStore::new();
        let a = store
            .create("a", Category::Work, Priority::Low, None, now())
            .expect("a")
            .id;
        let b = store
            .create("b", Category::Work, Priority::Low, None, now())
            .expect("b")
            .id;
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn ids_stay_ahead_of_hydrated_tasks() {
        let (store, ids) = seeded(&["a", "b"]);
        let mut hydrated = TaskStore::from_tasks(store.tasks().to_vec());
        let earlier = now() - Duration::days(1);
        let id = hydrated
            .create("c", Category::Personal, Priority::Low, None, earlier)
            .expect("c")
            .id;
        assert!(id > ids[1]);
    }

    #[test]
    fn exhausted_id_space_rejects_create() {
        let (store, _) = seeded(&["a"]);
        let mut task = store.tasks()[0].clone();
        task.id = TaskId(u64::MAX);
        let mut hydrated = TaskStore::from_tasks(vec![task]);

        let err = hydrated
            .create("b", Category::Work, Priority::Low, None, now())
            .expect_err("no id left");
        assert!(matches!(err, DocketError::IdsExhausted));
        assert_eq!(hydrated.len(), 1);
    }

    #[test]
    fn toggle_twice_is_identity() {
        let (mut store, ids) = seeded(&["a"]);
        assert!(store.toggle_complete(ids[0]).expect("toggle"));
        assert!(!store.toggle_complete(ids[0]).expect("toggle back"));
        assert!(!store.get(ids[0]).expect("present").completed);
    }

    #[test]
    fn toggle_missing_is_not_found() {
        let (mut store, _) = seeded(&["a"]);
        let err = store.toggle_complete(TaskId(42)).expect_err("missing");
        assert!(matches!(err, DocketError::NotFound(TaskId(42))));
    }

    #[test]
    fn delete_only_shrinks_when_present() {
        let (mut store, ids) = seeded(&["a", "b"]);
        assert!(store.delete(TaskId(7)).is_none());
        assert_eq!(store.len(), 2);

        let removed = store.delete(ids[0]).expect("removed");
        assert_eq!(removed.text, "a");
        assert_eq!(store.len(), 1);
        assert!(store.get(ids[0]).is_none());
    }

    #[test]
    fn reorder_applies_full_permutation() {
        let (mut store, ids) = seeded(&["one", "two", "three"]);
        store.toggle_complete(ids[1]).expect("toggle");
        let before = store.tasks().to_vec();

        store
            .reorder(&[ids[2], ids[0], ids[1]])
            .expect("reorder");

        assert_eq!(store.ids(), vec![ids[2], ids[0], ids[1]]);
        assert_eq!(store.tasks()[0], before[2]);
        assert_eq!(store.tasks()[1], before[0]);
        assert_eq!(store.tasks()[2], before[1]);
    }

    #[test]
    fn reorder_rejects_mismatched_sets() {
        let (mut store, ids) = seeded(&["one", "two", "three"]);

        let short = store.reorder(&[ids[1], ids[0]]);
        assert!(matches!(short, Err(DocketError::InvalidReorder { .. })));

        let dup = store.reorder(&[ids[1], ids[1], ids[0]]);
        assert!(matches!(dup, Err(DocketError::InvalidReorder { .. })));

        let unknown = store.reorder(&[ids[1], ids[0], TaskId(1)]);
        assert!(matches!(unknown, Err(DocketError::InvalidReorder { .. })));

        assert_eq!(store.ids(), ids);
    }

    #[test]
    fn stats_count_completed_and_pending() {
        let (mut store, ids) = seeded(&["a", "b", "c"]);
        store.toggle_complete(ids[1]).expect("toggle");
        let stats = store.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 2);
    }
}
