/// Sidebar page: open tabs and saved tasks

use crate::batch::{BatchReport, TabInfoBatch};
use crate::config::{CONFIG_KEY, SidebarConfig};
use crate::error::SidebarError;
use crate::reconcile::reconcile;
use crate::storage::{KeyValueStore, TaskList, TaskRepository};
use crate::tab_data::OpenTab;
use crate::ui::bridge::{self, ChromeStore};
use crate::ui::components::{CardAction, TaskCard, note_input_id};
use patternfly_yew::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

#[derive(Debug, Clone, PartialEq)]
enum ViewState {
    Loading,
    Idle,
    Notice(String),
    Error(String),
}

impl ViewState {
    /// State after a refresh published its tabs; notices stay until replaced
    fn after_refresh(&self) -> ViewState {
        match self {
            ViewState::Loading | ViewState::Error(_) => ViewState::Idle,
            other => other.clone(),
        }
    }
}

/// Input to move focus to after a structural note edit
#[derive(Clone, PartialEq)]
struct FocusRequest {
    task_id: String,
    index: usize,
    seq: u64,
}

/// Long-lived state shared by callbacks and tab listeners
struct Session {
    config: SidebarConfig,
    repo: TaskRepository<ChromeStore>,
    generation: Cell<u64>,
}

impl Session {
    fn next_generation(&self) -> u64 {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.get() == generation
    }
}

#[derive(Clone)]
struct Handles {
    open_tabs: UseStateHandle<Vec<OpenTab>>,
    tasks: UseStateHandle<TaskList>,
    state: UseStateHandle<ViewState>,
    /// Live copy of `state`; the handle only sees the value of the render it was taken in
    status: Rc<RefCell<ViewState>>,
}

impl Handles {
    fn set_state(&self, state: ViewState) {
        *self.status.borrow_mut() = state.clone();
        self.state.set(state);
    }

    fn report_error(&self, err: SidebarError) {
        log::warn!("{}", err);
        let message = match &err {
            SidebarError::StaleReference { .. } => "That tab is no longer open.".to_string(),
            other => other.to_string(),
        };
        self.set_state(ViewState::Notice(message));
    }
}

#[function_component(Sidebar)]
pub fn sidebar() -> Html {
    let session = use_state(|| None::<Rc<Session>>);
    let open_tabs = use_state_eq(Vec::<OpenTab>::new);
    let tasks = use_state_eq(TaskList::new);
    let state = use_state(|| ViewState::Loading);
    let focus = use_state(|| None::<FocusRequest>);
    let focus_seq = use_mut_ref(|| 0u64);
    let status = use_mut_ref(|| ViewState::Loading);

    let handles = Handles {
        open_tabs: open_tabs.clone(),
        tasks: tasks.clone(),
        state: state.clone(),
        status,
    };

    // Load config, then the first reconciliation; re-run on tab lifecycle events
    {
        let session = session.clone();
        let handles = handles.clone();

        use_effect_with((), move |_| {
            spawn_local(async move {
                let stored = match ChromeStore.get(CONFIG_KEY).await {
                    Ok(value) => value,
                    Err(e) => {
                        log::warn!("Could not read config: {}", e);
                        None
                    }
                };
                let config = SidebarConfig::from_value(stored);
                log::info!("Sidebar starting with {:?}", config);

                let current = Rc::new(Session {
                    repo: TaskRepository::new(ChromeStore, config.storage_key.clone()),
                    config,
                    generation: Cell::new(0),
                });
                session.set(Some(current.clone()));

                {
                    let current = current.clone();
                    let handles = handles.clone();
                    bridge::on_tabs_changed(move || {
                        spawn_local(refresh(current.clone(), handles.clone()));
                    });
                }

                refresh(current, handles).await;
            });
            || ()
        });
    }

    // Move focus once the edited list has rendered
    use_effect_with((*focus).clone(), |request| {
        if let Some(request) = request {
            focus_element(&note_input_id(&request.task_id, request.index));
        }
        || ()
    });

    let on_action = {
        let session = session.clone();
        let handles = handles.clone();
        let focus = focus.clone();

        Callback::from(move |action: CardAction| {
            let Some(current) = (*session).clone() else {
                return;
            };
            let handles = handles.clone();
            let focus = focus.clone();
            let focus_seq = focus_seq.clone();

            spawn_local(async move {
                let request_focus = |task_id: &str, index: Option<usize>| {
                    if let Some(index) = index {
                        let seq = {
                            let mut seq = focus_seq.borrow_mut();
                            *seq += 1;
                            *seq
                        };
                        focus.set(Some(FocusRequest {
                            task_id: task_id.to_string(),
                            index,
                            seq,
                        }));
                    }
                };

                let result = match action {
                    CardAction::ToggleBookmark(card) => current
                        .repo
                        .toggle_bookmark(card.to_task())
                        .await
                        .map(|(list, bookmarked)| {
                            log::debug!("{} bookmarked: {}", card.id, bookmarked);
                            handles.tasks.set(list);
                        }),
                    CardAction::Open(url) => bridge::open_tab(&url).await,
                    CardAction::Close(tab_id) => bridge::close_tab(tab_id).await,
                    CardAction::NoteInput { task_id, index, text } => current
                        .repo
                        .set_note_text(&task_id, index, &text)
                        .await
                        .map(|list| handles.tasks.set(list)),
                    CardAction::NoteToggle { task_id, index, checked } => current
                        .repo
                        .toggle_note(&task_id, index, checked)
                        .await
                        .map(|list| handles.tasks.set(list)),
                    CardAction::NoteCommit { task_id, index, text } => current
                        .repo
                        .commit_note_line(&task_id, index, &text)
                        .await
                        .map(|(list, target)| {
                            handles.tasks.set(list);
                            request_focus(&task_id, target);
                        }),
                    CardAction::NoteDelete { task_id, index, text } => current
                        .repo
                        .delete_note(&task_id, index, &text)
                        .await
                        .map(|(list, target)| {
                            handles.tasks.set(list);
                            request_focus(&task_id, target);
                        }),
                };

                if let Err(e) = result {
                    handles.report_error(e);
                }
            });
        })
    };

    let on_clear = {
        let session = session.clone();
        let handles = handles.clone();

        Callback::from(move |_: MouseEvent| {
            let Some(current) = (*session).clone() else {
                return;
            };
            let handles = handles.clone();
            spawn_local(async move {
                match current.repo.clear().await {
                    Ok(list) => {
                        handles.tasks.set(list);
                        handles.set_state(ViewState::Idle);
                    }
                    Err(e) => handles.report_error(e),
                }
            });
        })
    };

    let on_refresh = {
        let session = session.clone();
        let handles = handles.clone();

        Callback::from(move |_: MouseEvent| {
            if let Some(current) = (*session).clone() {
                spawn_local(refresh(current, handles.clone()));
            }
        })
    };

    let cards = match &*session {
        Some(current) => reconcile(&open_tabs, &tasks.tasks, current.config.features),
        None => Vec::new(),
    };
    let open_count = cards.iter().filter(|card| !card.closed).count();

    html! {
        <div class="sidebar">
            <div class="header">
                <h1 class="main-title">{"Tab Tasks"}</h1>
                <div class="header-actions">
                    <Button onclick={on_refresh} variant={ButtonVariant::Secondary} size={ButtonSize::Small}>
                        {"⟳"}
                    </Button>
                    <Button
                        onclick={on_clear}
                        variant={ButtonVariant::Danger}
                        size={ButtonSize::Small}
                        disabled={tasks.tasks.is_empty()}
                    >
                        {"Clear tasks"}
                    </Button>
                </div>
            </div>

            // Status display
            {match &*state {
                ViewState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{"Reading open tabs..."}</p>
                    </div>
                },
                ViewState::Notice(msg) => html! {
                    <Alert r#type={AlertType::Warning} title={msg.clone()} inline={true}>
                    </Alert>
                },
                ViewState::Error(err) => html! {
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {err.clone()}
                    </Alert>
                },
                ViewState::Idle => html! {}
            }}

            if cards.is_empty() && *state != ViewState::Loading {
                <div class="empty-state">
                    <p>{"No tabs to show."}</p>
                </div>
            } else {
                <div class="cards-list">
                    {for cards.into_iter().map(|card| {
                        let key = card.id.clone();
                        html! {
                            <TaskCard key={key} card={card} on_action={on_action.clone()} />
                        }
                    })}
                </div>
            }

            <div class="footer">
                {format!("{} tasks • {} open tabs", tasks.tasks.len(), open_count)}
            </div>
        </div>
    }
}

/// Enumerate tabs, gather page info for each, and publish the result
///
/// Completion is driven by `TabInfoBatch`: each tab settles once, and a
/// timer expires whatever is still pending. Results from a refresh that
/// was superseded by a newer one are dropped.
async fn refresh(session: Rc<Session>, handles: Handles) {
    let generation = session.next_generation();

    let tabs = match bridge::query_tabs().await {
        Ok(tabs) => tabs,
        Err(e) => {
            log::error!("{}", e);
            handles.set_state(ViewState::Error(format!("Failed to get tabs: {}", e)));
            return;
        }
    };

    match session.repo.refresh().await {
        Ok(list) => handles.tasks.set(list),
        Err(e) => handles.report_error(e),
    }

    let batch = Rc::new(RefCell::new(TabInfoBatch::new(generation, tabs)));
    let targets = batch.borrow().targets();
    log::debug!("Refresh {}: requesting page info for {} tab(s)", generation, targets.len());

    let done = batch.borrow_mut().try_complete();
    if let Some(report) = done {
        publish(&session, &handles, report);
        return;
    }

    for tab in targets {
        let session = session.clone();
        let handles = handles.clone();
        let batch = batch.clone();

        spawn_local(async move {
            let outcome = bridge::fetch_page_info(&tab).await;
            let done = batch.borrow_mut().resolve(tab.id, outcome);
            if let Some(report) = done {
                publish(&session, &handles, report);
            }
        });
    }

    let timeout_ms = session.config.extraction_timeout_ms;
    bridge::sleep_ms(timeout_ms).await;
    let done = batch.borrow_mut().expire();
    if let Some(report) = done {
        publish(&session, &handles, report);
    }
}

fn publish(session: &Session, handles: &Handles, report: BatchReport) {
    if !session.is_current(report.generation) {
        log::debug!("Dropping results of superseded refresh {}", report.generation);
        return;
    }

    log::info!(
        "Refresh {}: {} open, {} skipped, {} failed, {} timed out",
        report.generation,
        report.open_tabs.len(),
        report.skipped,
        report.failed,
        report.timed_out
    );
    handles.open_tabs.set(report.open_tabs);
    let next = handles.status.borrow().after_refresh();
    if *handles.status.borrow() != next {
        handles.set_state(next);
    }
}

fn focus_element(id: &str) {
    let element = web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.get_element_by_id(id))
        .and_then(|element| element.dyn_into::<web_sys::HtmlElement>().ok());

    match element {
        Some(element) => {
            if let Err(e) = element.focus() {
                log::warn!("Could not focus {}: {:?}", id, e);
            }
        }
        None => log::debug!("No element {} to focus", id),
    }
}
