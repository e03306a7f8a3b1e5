/// Task cards and checklist components

use crate::reconcile::CardView;
use crate::tab_data::Note;
use patternfly_yew::prelude::*;
use web_sys::HtmlInputElement;
use yew::prelude::*;

/// Everything a card can ask the sidebar to do
#[derive(Debug, Clone, PartialEq)]
pub enum CardAction {
    ToggleBookmark(CardView),
    Open(String),
    Close(i32),
    NoteInput { task_id: String, index: usize, text: String },
    NoteToggle { task_id: String, index: usize, checked: bool },
    NoteCommit { task_id: String, index: usize, text: String },
    NoteDelete { task_id: String, index: usize, text: String },
}

/// DOM id of a checklist input, used to move focus after structural edits
pub fn note_input_id(task_id: &str, index: usize) -> String {
    format!("note-{}-{}", task_id, index)
}

#[derive(Properties, PartialEq)]
pub struct TaskCardProps {
    pub card: CardView,
    pub on_action: Callback<CardAction>,
}

#[function_component(TaskCard)]
pub fn task_card(props: &TaskCardProps) -> Html {
    let card = &props.card;

    let on_bookmark = props.on_action.reform({
        let card = card.clone();
        move |_: MouseEvent| CardAction::ToggleBookmark(card.clone())
    });
    let on_open = props.on_action.reform({
        let url = card.url.clone();
        move |_: MouseEvent| CardAction::Open(url.clone())
    });

    html! {
        <div class={classes!(
            "task-card",
            card.closed.then_some("closed"),
            card.bookmarked.then_some("selected")
        )}>
            <div class="card-header">
                <div class="card-details">
                    <h3 class="card-title">{&card.title}</h3>
                    <p class="card-summary">{&card.summary}</p>
                    if card.closed {
                        <span class="card-badge">{"Closed"}</span>
                    }
                </div>

                <div class="card-actions">
                    <Button
                        onclick={on_bookmark}
                        variant={if card.bookmarked { ButtonVariant::Secondary } else { ButtonVariant::Primary }}
                        size={ButtonSize::Small}
                    >
                        {if card.bookmarked { "− Remove" } else { "+ Add" }}
                    </Button>
                    <Button onclick={on_open} variant={ButtonVariant::Secondary} size={ButtonSize::Small}>
                        {"↗"}
                    </Button>
                    if let Some(tab_id) = card.tab_id {
                        <Button
                            onclick={props.on_action.reform(move |_: MouseEvent| CardAction::Close(tab_id))}
                            variant={ButtonVariant::Danger}
                            size={ButtonSize::Small}
                        >
                            {"✗"}
                        </Button>
                    }
                </div>
            </div>

            if !card.notes.is_empty() {
                <NoteList
                    task_id={card.id.clone()}
                    notes={card.notes.clone()}
                    on_action={props.on_action.clone()}
                />
            }
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct NoteListProps {
    pub task_id: String,
    /// Display notes; only a trailing placeholder can be blank
    pub notes: Vec<Note>,
    pub on_action: Callback<CardAction>,
}

#[function_component(NoteList)]
pub fn note_list(props: &NoteListProps) -> Html {
    html! {
        <ul class="note-list">
            {for props.notes.iter().enumerate().map(|(index, note)| {
                let task_id = props.task_id.clone();
                let is_placeholder = note.is_blank();

                let on_toggle = {
                    let task_id = task_id.clone();
                    props.on_action.reform(move |e: Event| CardAction::NoteToggle {
                        task_id: task_id.clone(),
                        index,
                        checked: e
                            .target_dyn_into::<HtmlInputElement>()
                            .map(|input| input.checked())
                            .unwrap_or(false),
                    })
                };

                let on_input = {
                    let task_id = task_id.clone();
                    let on_action = props.on_action.clone();
                    Callback::from(move |e: InputEvent| {
                        if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                            on_action.emit(CardAction::NoteInput {
                                task_id: task_id.clone(),
                                index,
                                text: input.value(),
                            });
                        }
                    })
                };

                let on_keydown = {
                    let task_id = task_id.clone();
                    let on_action = props.on_action.clone();
                    Callback::from(move |e: KeyboardEvent| {
                        let Some(input) = e.target_dyn_into::<HtmlInputElement>() else {
                            return;
                        };
                        let text = input.value();
                        let blank = text.trim().is_empty();

                        match e.key().as_str() {
                            "Enter" if !blank => {
                                e.prevent_default();
                                on_action.emit(CardAction::NoteCommit {
                                    task_id: task_id.clone(),
                                    index,
                                    text,
                                });
                            }
                            "Backspace" if text.is_empty() => {
                                e.prevent_default();
                                on_action.emit(CardAction::NoteDelete {
                                    task_id: task_id.clone(),
                                    index,
                                    text,
                                });
                            }
                            _ => {}
                        }
                    })
                };

                html! {
                    <li key={index} class={classes!("note-item", note.checked.then_some("checked"))}>
                        <input
                            type="checkbox"
                            checked={note.checked}
                            disabled={is_placeholder}
                            onchange={on_toggle}
                        />
                        <input
                            type="text"
                            id={note_input_id(&task_id, index)}
                            class="note-text"
                            value={note.text.clone()}
                            placeholder={if is_placeholder { "Add an item" } else { "" }}
                            oninput={on_input}
                            onkeydown={on_keydown}
                        />
                    </li>
                }
            })}
        </ul>
    }
}
