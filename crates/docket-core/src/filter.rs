use tracing::trace;

use crate::task::{
  Category,
  Priority,
  Task
};

/// Combined filter state. Category,
/// priority and search compose with AND
/// so changing one never resets the
/// others.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct ViewFilter {
  pub category: Option<Category>,
  pub priority: Option<Priority>,
  pub query:    String
}

impl ViewFilter {
  pub fn is_active(&self) -> bool {
    self.category.is_some()
      || self.priority.is_some()
      || !self.query.trim().is_empty()
  }

  pub fn clear(&mut self) {
    *self = Self::default();
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    if let Some(category) =
      self.category
      && task.category != category
    {
      return false;
    }

    if let Some(priority) =
      self.priority
      && task.priority != priority
    {
      return false;
    }

    matches_query(task, &self.query)
  }

  #[tracing::instrument(skip(
    self, tasks
  ))]
  pub fn apply<'a>(
    &self,
    tasks: &'a [Task]
  ) -> Vec<&'a Task> {
    let out: Vec<&Task> = tasks
      .iter()
      .filter(|task| self.matches(task))
      .collect();
    trace!(
      total = tasks.len(),
      visible = out.len(),
      "applied view filter"
    );
    out
  }
}

/// Store-ordered subset of `tasks`
/// passing every supplied filter.
pub fn view<'a>(
  tasks: &'a [Task],
  category: Option<Category>,
  priority: Option<Priority>,
  query: &str
) -> Vec<&'a Task> {
  ViewFilter {
    category,
    priority,
    query: query.to_string()
  }
  .apply(tasks)
}

fn matches_query(
  task: &Task,
  query: &str
) -> bool {
  let needle =
    query.trim().to_lowercase();
  if needle.is_empty() {
    return true;
  }

  task
    .text
    .to_lowercase()
    .contains(&needle)
    || task
      .category
      .as_str()
      .contains(&needle)
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::{
    ViewFilter,
    view
  };
  use crate::task::{
    Category,
    Priority,
    Task,
    TaskId
  };

  fn task(
    id: u64,
    text: &str,
    category: Category,
    priority: Priority
  ) -> Task {
    let now = Utc
      .with_ymd_and_hms(
        2026, 10, 19, 8, 0, 0
      )
      .single()
      .expect("valid now");
    Task::new_pending(
      TaskId(id),
      text.to_string(),
      category,
      priority,
      None,
      now
    )
  }

  fn sample() -> Vec<Task> {
    vec![
      task(
        1,
        "Write report",
        Category::Work,
        Priority::High
      ),
      task(
        2,
        "Buy Milk",
        Category::Shopping,
        Priority::Low
      ),
      task(
        3,
        "Call mom",
        Category::Personal,
        Priority::Medium
      ),
      task(
        4,
        "Review PR",
        Category::Work,
        Priority::Low
      ),
    ]
  }

  fn ids(tasks: &[&Task]) -> Vec<u64> {
    tasks.iter().map(|t| t.id.0).collect()
  }

  #[test]
  fn category_filter_keeps_store_order()
  {
    let tasks = sample();
    let out = view(
      &tasks,
      Some(Category::Work),
      None,
      ""
    );
    assert_eq!(ids(&out), vec![1, 4]);
  }

  #[test]
  fn search_is_case_insensitive() {
    let tasks = sample();
    let out =
      view(&tasks, None, None, "milk");
    assert_eq!(ids(&out), vec![2]);

    let out =
      view(&tasks, None, None, "MILK");
    assert_eq!(ids(&out), vec![2]);
  }

  #[test]
  fn search_matches_category_name() {
    let tasks = sample();
    let out =
      view(&tasks, None, None, "shop");
    assert_eq!(ids(&out), vec![2]);
  }

  #[test]
  fn filters_compose_conjunctively() {
    let tasks = sample();
    let out = view(
      &tasks,
      Some(Category::Work),
      Some(Priority::Low),
      ""
    );
    assert_eq!(ids(&out), vec![4]);

    let out = view(
      &tasks,
      Some(Category::Work),
      None,
      "report"
    );
    assert_eq!(ids(&out), vec![1]);

    let out = view(
      &tasks,
      Some(Category::Personal),
      None,
      "report"
    );
    assert!(out.is_empty());
  }

  #[test]
  fn empty_filter_is_identity() {
    let tasks = sample();
    let filter = ViewFilter::default();
    assert!(!filter.is_active());
    assert_eq!(
      ids(&filter.apply(&tasks)),
      vec![1, 2, 3, 4]
    );

    let blank = ViewFilter {
      query: "   ".to_string(),
      ..ViewFilter::default()
    };
    assert!(!blank.is_active());
    assert_eq!(
      blank.apply(&tasks).len(),
      4
    );
  }
}
