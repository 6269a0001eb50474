use std::io;

use chrono::NaiveDate;
use serde::Serialize;

use crate::datetime::format_date;
use crate::filter::ViewFilter;
use crate::i18n::{Labels, Localizer};
use crate::store::{Stats, TaskStore};
use crate::task::{Category, Priority, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn storage_value(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Anything other than `"dark"` reads as light.
    pub fn from_storage(raw: &str) -> Self {
        match raw.trim() {
            "dark" => Theme::Dark,
            _ => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Complete,
    Delete,
}

/// What an item affordance emits; the session routes it by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemAction {
    pub id: TaskId,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    pub id: TaskId,
    pub text: String,
    pub category: Category,
    pub category_label: String,
    pub priority: Priority,
    pub priority_label: String,
    pub due_date: Option<NaiveDate>,
    pub due_label: Option<String>,
    pub completed: bool,
    pub overdue: bool,
    pub actions: [ItemAction; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsView {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub total_label: String,
    pub completed_label: String,
    pub pending_label: String,
}

impl StatsView {
    pub fn lines(&self) -> [String; 3] {
        [
            format!("{}: {}", self.total_label, self.total),
            format!("{}: {}", self.completed_label, self.completed),
            format!("{}: {}", self.pending_label, self.pending),
        ]
    }
}

/// Static text around the list: headings, placeholders and selector
/// options in the active language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chrome {
    pub title: String,
    pub task_placeholder: String,
    pub category_prompt: String,
    pub priority_prompt: String,
    pub date_label: String,
    pub add_button: String,
    pub category_options: Vec<(Category, String)>,
    pub priority_options: Vec<(Priority, String)>,
    pub all_categories: String,
    pub all_priorities: String,
    pub search_placeholder: String,
    pub theme_toggle: String,
}

impl Chrome {
    fn from_labels(labels: &Labels) -> Self {
        Self {
            title: labels.title.clone(),
            task_placeholder: labels.add_task.clone(),
            category_prompt: labels.category.clone(),
            priority_prompt: labels.priority.clone(),
            date_label: labels.date.clone(),
            add_button: labels.add.clone(),
            category_options: Category::ALL
                .iter()
                .map(|c| (*c, labels.category(*c).to_string()))
                .collect(),
            priority_options: Priority::ALL
                .iter()
                .map(|p| (*p, labels.priority(*p).to_string()))
                .collect(),
            all_categories: labels.all_categories.clone(),
            all_priorities: labels.all_priorities.clone(),
            search_placeholder: labels.search.clone(),
            theme_toggle: labels.change_theme.clone(),
        }
    }
}

/// One complete projection. Each frame replaces the previous one; nothing
/// is diffed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub language: String,
    pub theme: Theme,
    pub chrome: Chrome,
    pub filter_active: bool,
    pub items: Vec<ItemView>,
    pub stats: StatsView,
}

impl Frame {
    /// Item ids in display order, as a drag controller would read them back.
    pub fn order(&self) -> Vec<TaskId> {
        self.items.iter().map(|item| item.id).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub localizer: &'a Localizer,
    pub theme: Theme,
    pub today: NaiveDate,
}

/// Projects `visible` into a frame. Stats cover the whole store, not just
/// the visible subset.
#[tracing::instrument(skip_all, fields(visible = visible.len()))]
pub fn render(store: &TaskStore, visible: &[&Task], filter: &ViewFilter, ctx: RenderContext<'_>) -> Frame {
    let labels = ctx.localizer.labels();
    let items = visible
        .iter()
        .map(|task| item_view(task, labels, ctx.today))
        .collect();

    Frame {
        language: ctx.localizer.current().to_string(),
        theme: ctx.theme,
        chrome: Chrome::from_labels(labels),
        filter_active: filter.is_active(),
        items,
        stats: stats_view(store.stats(), labels),
    }
}

fn item_view(task: &Task, labels: &Labels, today: NaiveDate) -> ItemView {
    let due_label = task
        .due_date
        .map(|due| format!("{}: {}", labels.date, format_date(due, &labels.date_format)));

    ItemView {
        id: task.id,
        text: task.text.clone(),
        category: task.category,
        category_label: labels.category(task.category).to_string(),
        priority: task.priority,
        priority_label: labels.priority(task.priority).to_string(),
        due_date: task.due_date,
        due_label,
        completed: task.completed,
        overdue: task.is_overdue(today),
        actions: [
            ItemAction {
                id: task.id,
                kind: ActionKind::Complete,
            },
            ItemAction {
                id: task.id,
                kind: ActionKind::Delete,
            },
        ],
    }
}

fn stats_view(stats: Stats, labels: &Labels) -> StatsView {
    StatsView {
        total: stats.total,
        completed: stats.completed,
        pending: stats.pending,
        total_label: labels.total_tasks.clone(),
        completed_label: labels.completed.clone(),
        pending_label: labels.pending.clone(),
    }
}

/// Mount point for frames.
pub trait Presenter {
    fn present(&mut self, frame: &Frame) -> io::Result<()>;
}

/// Visual transition played before a task's data is removed.
pub trait RemovalEffect {
    fn before_remove(&mut self, id: TaskId);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateRemoval;

impl RemovalEffect for ImmediateRemoval {
    fn before_remove(&mut self, _id: TaskId) {}
}
