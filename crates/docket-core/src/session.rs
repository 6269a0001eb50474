use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::datetime::DisplayZone;
use crate::error::{DocketError, Result};
use crate::filter::ViewFilter;
use crate::i18n::{Catalog, Localizer};
use crate::persist::{SlotStore, TaskRepository};
use crate::render::{
    ActionKind, Frame, ImmediateRemoval, ItemAction, Presenter, RemovalEffect, RenderContext,
    Theme, render,
};
use crate::store::TaskStore;
use crate::task::{Category, Priority, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub text: String,
    pub category: Category,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

/// Discrete inputs from the host. Each one runs to completion before the
/// next is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Submit(NewTask),
    Action(ItemAction),
    FilterChanged {
        category: Option<Category>,
        priority: Option<Priority>,
    },
    SearchChanged(String),
    FiltersCleared,
    Reordered(Vec<TaskId>),
    LanguageChanged(String),
    ThemeToggled,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub catalog: Catalog,
    pub default_language: Option<String>,
    pub zone: Option<DisplayZone>,
}

/// Owns one task store and everything needed to keep its projection in
/// sync: persistence, the combined filter, language and theme.
pub struct Session<S, P, E = ImmediateRemoval> {
    store: TaskStore,
    repo: TaskRepository<S>,
    filter: ViewFilter,
    localizer: Localizer,
    theme: Theme,
    zone: DisplayZone,
    presenter: P,
    effect: E,
}

impl<S: SlotStore, P: Presenter> Session<S, P> {
    /// Hydrates the store, theme and language from `slots`. A persisted
    /// language wins over `options.default_language`.
    #[instrument(skip_all)]
    pub fn open(slots: S, presenter: P, options: SessionOptions) -> Self {
        let repo = TaskRepository::new(slots);
        let store = TaskStore::from_tasks(repo.load());
        let theme = repo.load_theme();
        let language = repo.load_language().or(options.default_language);
        let localizer = Localizer::new(options.catalog, language.as_deref());

        info!(
            tasks = store.len(),
            theme = theme.storage_value(),
            language = localizer.current(),
            "session opened"
        );

        Self {
            store,
            repo,
            filter: ViewFilter::default(),
            localizer,
            theme,
            zone: options.zone.unwrap_or(DisplayZone::Local),
            presenter,
            effect: ImmediateRemoval,
        }
    }
}

impl<S: SlotStore, P: Presenter, E: RemovalEffect> Session<S, P, E> {
    pub fn with_removal_effect<E2: RemovalEffect>(self, effect: E2) -> Session<S, P, E2> {
        Session {
            store: self.store,
            repo: self.repo,
            filter: self.filter,
            localizer: self.localizer,
            theme: self.theme,
            zone: self.zone,
            presenter: self.presenter,
            effect,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn filter(&self) -> &ViewFilter {
        &self.filter
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn language(&self) -> &str {
        self.localizer.current()
    }

    pub fn localizer(&self) -> &Localizer {
        &self.localizer
    }

    pub fn repository(&self) -> &TaskRepository<S> {
        &self.repo
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn effect(&self) -> &E {
        &self.effect
    }

    /// Calendar date of `now` in the display zone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.zone.date_of(now)
    }

    /// Replaces the whole filter state and renders once.
    #[instrument(skip(self, now))]
    pub fn replace_filter(&mut self, filter: ViewFilter, now: DateTime<Utc>) -> Result<()> {
        self.filter = filter;
        self.refresh(now)
    }

    /// Current projection through the active filter.
    pub fn frame(&self, now: DateTime<Utc>) -> Frame {
        let visible = self.filter.apply(self.store.tasks());
        render(
            &self.store,
            &visible,
            &self.filter,
            RenderContext {
                localizer: &self.localizer,
                theme: self.theme,
                today: self.zone.date_of(now),
            },
        )
    }

    /// Rebuilds the frame and hands it to the presenter.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Result<()> {
        let frame = self.frame(now);
        self.presenter
            .present(&frame)
            .map_err(DocketError::Present)
    }

    #[instrument(skip(self, now))]
    pub fn handle(&mut self, event: Event, now: DateTime<Utc>) -> Result<()> {
        match event {
            Event::Submit(new_task) => {
                let id = self
                    .store
                    .create(
                        &new_task.text,
                        new_task.category,
                        new_task.priority,
                        new_task.due_date,
                        now,
                    )?
                    .id;
                debug!(%id, "submitted task stored");
                self.persist_tasks()?;
            }
            Event::Action(action) => self.dispatch(action)?,
            Event::FilterChanged { category, priority } => {
                self.filter.category = category;
                self.filter.priority = priority;
            }
            Event::SearchChanged(query) => {
                self.filter.query = query;
            }
            Event::FiltersCleared => self.filter.clear(),
            Event::Reordered(order) => {
                self.store.reorder(&order)?;
                self.persist_tasks()?;
            }
            Event::LanguageChanged(code) => {
                self.localizer.set_language(&code)?;
                self.repo.save_language(self.localizer.current())?;
            }
            Event::ThemeToggled => {
                self.theme = self.theme.toggled();
                self.repo.save_theme(self.theme)?;
            }
        }

        self.refresh(now)
    }

    /// Routes an item affordance to the store by id.
    #[instrument(skip(self))]
    fn dispatch(&mut self, action: ItemAction) -> Result<()> {
        match action.kind {
            ActionKind::Complete => {
                self.store.toggle_complete(action.id)?;
            }
            ActionKind::Delete => {
                if self.store.get(action.id).is_none() {
                    debug!(id = %action.id, "delete of absent task ignored");
                    return Ok(());
                }
                self.effect.before_remove(action.id);
                self.store.delete(action.id);
            }
        }
        self.persist_tasks()
    }

    fn persist_tasks(&mut self) -> Result<()> {
        self.repo.save(self.store.tasks())
    }
}
