//! TUI application state and logic.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::{
    ActionDispatcher, AddOutcome, Engine, EngineError, ExistenceResolver, ExpandState,
    HistoryAction, HistoryStore, PathCheck, QueueStore,
};
use crate::core::{HistoryRecord, Job};

/// Results and signals posted back to the UI loop by background tasks.
#[derive(Debug)]
pub enum AppEvent {
    QueueChanged,
    QueueLoaded(Result<Vec<Job>, EngineError>),
    HistoryLoaded(Result<Vec<HistoryRecord>, EngineError>),
    PathChecked(PathCheck, Result<bool, EngineError>),
}

/// Current view being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Queue,
    History,
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddField {
    #[default]
    ContentId,
    DisplayName,
}

#[derive(Debug, Default)]
pub struct AddForm {
    pub content_id: String,
    pub display_name: String,
    pub field: AddField,
}

impl AddForm {
    fn active_mut(&mut self) -> &mut String {
        match self.field {
            AddField::ContentId => &mut self.content_id,
            AddField::DisplayName => &mut self.display_name,
        }
    }
}

/// Actions that can be triggered by user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    SwitchTab,
    OpenAdd,
    Select,
    OpenFolder,
    Delete,
    ClearAll,
    Refresh,
    Back,
    Input(char),
    Backspace,
    NextField,
}

/// Main TUI application state.
pub struct TuiApp {
    dispatcher: ActionDispatcher,
    events: mpsc::UnboundedSender<AppEvent>,
    pub queue: QueueStore,
    pub history: HistoryStore,
    pub existence: ExistenceResolver,
    pub expand: ExpandState,
    pub view: View,
    pub queue_selected: usize,
    pub history_selected: usize,
    pub form: AddForm,
    pub running: bool,
    /// Last failed write, shown in the footer until the next action.
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl TuiApp {
    pub fn new(engine: Arc<dyn Engine>, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            dispatcher: ActionDispatcher::new(engine),
            events,
            queue: QueueStore::new(),
            history: HistoryStore::new(),
            existence: ExistenceResolver::new(),
            expand: ExpandState::default(),
            view: View::default(),
            queue_selected: 0,
            history_selected: 0,
            form: AddForm::default(),
            running: true,
            error: None,
            notice: None,
        }
    }

    /// Subscribe to queue changes and start the first fetches.
    pub async fn init(&mut self) {
        let events = self.events.clone();
        if let Err(e) = self
            .queue
            .subscribe_to_changes(self.dispatcher.engine(), move || {
                let _ = events.send(AppEvent::QueueChanged);
            })
            .await
        {
            warn!(error = %e, "Could not subscribe to queue changes");
        }

        self.spawn_queue_refresh();
        self.spawn_history_fetch();
    }

    /// Tear down the change subscription.
    pub fn shutdown(&mut self) {
        self.queue.unsubscribe();
    }

    pub fn selected_job(&self) -> Option<&Job> {
        self.queue.jobs().get(self.queue_selected)
    }

    pub fn selected_record(&self) -> Option<&HistoryRecord> {
        self.history.records().get(self.history_selected)
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::QueueChanged => self.spawn_queue_refresh(),
            AppEvent::QueueLoaded(result) => {
                if self.queue.apply(result) {
                    self.expand
                        .retain(self.queue.jobs().iter().map(|j| j.id.as_str()));
                    self.queue_selected = clamp(self.queue_selected, self.queue.jobs().len());
                }
            }
            AppEvent::HistoryLoaded(result) => {
                if self.history.apply(result) {
                    self.after_history_change();
                }
            }
            AppEvent::PathChecked(check, result) => self.existence.apply(&check, result),
        }
    }

    /// Handle an action and update state accordingly.
    pub async fn handle_action(&mut self, action: Action) {
        if action != Action::Quit {
            self.error = None;
            self.notice = None;
        }

        match self.view {
            View::Add => self.handle_form_action(action).await,
            _ => self.handle_list_action(action).await,
        }
    }

    async fn handle_list_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::Up => match self.view {
                View::History => self.history_selected = self.history_selected.saturating_sub(1),
                _ => self.queue_selected = self.queue_selected.saturating_sub(1),
            },
            Action::Down => match self.view {
                View::History => {
                    self.history_selected =
                        clamp(self.history_selected + 1, self.history.records().len())
                }
                _ => self.queue_selected = clamp(self.queue_selected + 1, self.queue.jobs().len()),
            },
            Action::SwitchTab => {
                self.view = match self.view {
                    View::Queue => {
                        self.spawn_history_fetch();
                        View::History
                    }
                    _ => View::Queue,
                };
            }
            Action::OpenAdd => {
                self.form = AddForm::default();
                self.view = View::Add;
            }
            Action::Select => match self.view {
                View::History => self.activate_record().await,
                _ => self.toggle_failure_log(),
            },
            Action::OpenFolder => {
                let path = match self.view {
                    View::History => self.selected_record().map(|r| r.install_path.clone()),
                    _ => self.selected_job().and_then(|j| j.install_path.clone()),
                };
                if let Some(path) = path {
                    self.dispatcher.open_folder(&path).await;
                }
            }
            Action::Delete if self.view == View::History => self.delete_selected().await,
            Action::ClearAll if self.view == View::History => self.clear_history().await,
            Action::Refresh => {
                self.spawn_queue_refresh();
                self.existence.invalidate();
                self.spawn_history_fetch();
            }
            Action::Back => self.expand = ExpandState::default(),
            _ => {}
        }
    }

    async fn handle_form_action(&mut self, action: Action) {
        match action {
            Action::Back => self.view = View::Queue,
            Action::Quit => self.running = false,
            Action::NextField | Action::Up | Action::Down | Action::SwitchTab => {
                self.form.field = match self.form.field {
                    AddField::ContentId => AddField::DisplayName,
                    AddField::DisplayName => AddField::ContentId,
                };
            }
            Action::Input(c) => self.form.active_mut().push(c),
            Action::Backspace => {
                self.form.active_mut().pop();
            }
            Action::Select => self.submit_form().await,
            _ => {}
        }
    }

    async fn submit_form(&mut self) {
        let name = self.form.display_name.clone();
        match self.dispatcher.add(&self.form.content_id, Some(&name)).await {
            Ok(AddOutcome::Submitted { display_name, .. }) => {
                self.notice = Some(format!("Queued {}", display_name));
                self.form = AddForm::default();
                self.view = View::Queue;
            }
            Ok(AddOutcome::Ignored) => {
                self.notice = Some("Enter a content id".to_string());
                self.form.field = AddField::ContentId;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    fn toggle_failure_log(&mut self) {
        let Some(job) = self.selected_job() else {
            return;
        };
        if job.status.failure_log().is_some() {
            let id = job.id.clone();
            self.expand.toggle(&id);
        }
    }

    async fn activate_record(&mut self) {
        let Some(record) = self.selected_record().cloned() else {
            return;
        };

        match self.existence.action_for(&record) {
            HistoryAction::Open => self.dispatcher.open_folder(&record.install_path).await,
            HistoryAction::Retry => {
                match self
                    .history
                    .retry(
                        self.dispatcher.engine(),
                        &record.content_id,
                        &record.display_name,
                    )
                    .await
                {
                    Ok(()) => self.notice = Some(format!("Retrying {}", record.display_name)),
                    Err(e) => self.error = Some(e.to_string()),
                }
            }
        }
    }

    async fn delete_selected(&mut self) {
        let Some(id) = self.selected_record().map(|r| r.id.clone()) else {
            return;
        };
        match self.history.remove(self.dispatcher.engine(), &id).await {
            Ok(()) => self.after_history_change(),
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    async fn clear_history(&mut self) {
        match self.history.clear_all(self.dispatcher.engine()).await {
            Ok(()) => self.after_history_change(),
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    fn after_history_change(&mut self) {
        self.history_selected = clamp(self.history_selected, self.history.records().len());
        for check in self.existence.sync(self.history.records()) {
            self.spawn_path_check(check);
        }
    }

    fn spawn_queue_refresh(&self) {
        let engine = self.dispatcher.shared_engine();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = engine.get_queue().await;
            if events.send(AppEvent::QueueLoaded(result)).is_err() {
                debug!("UI closed, dropping queue snapshot");
            }
        });
    }

    fn spawn_history_fetch(&self) {
        let engine = self.dispatcher.shared_engine();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = engine.get_history().await;
            let _ = events.send(AppEvent::HistoryLoaded(result));
        });
    }

    fn spawn_path_check(&self, check: PathCheck) {
        let engine = self.dispatcher.shared_engine();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = check.run(engine.as_ref()).await;
            let _ = events.send(AppEvent::PathChecked(check, result));
        });
    }
}

/// Keep a list selection inside `0..len`.
fn clamp(selected: usize, len: usize) -> usize {
    selected.min(len.saturating_sub(1))
}
