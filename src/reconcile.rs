/// Merge open tabs with persisted tasks into the sidebar view model

use crate::config::Features;
use crate::identity::resolve_id;
use crate::notes::display_notes;
use crate::tab_data::{is_extractable_url, Note, OpenTab, Task};
use std::collections::HashSet;

/// One card in the sidebar
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub closed: bool,
    pub bookmarked: bool,
    /// Live tab handle; `None` for closed tasks
    pub tab_id: Option<i32>,
    pub display_index: Option<i32>,
    /// Display notes; empty unless bookmarked with notes enabled
    pub notes: Vec<Note>,
}

impl CardView {
    /// The task captured when this card gets bookmarked
    pub fn to_task(&self) -> Task {
        Task {
            id: self.id.clone(),
            title: self.title.clone(),
            summary: self.summary.clone(),
            url: self.url.clone(),
            tab_id: self.tab_id,
            notes: Vec::new(),
        }
    }
}

/// Explicit summary, else meta description, else title
pub fn display_summary(summary: &str, description: &str, title: &str) -> String {
    [summary, description, title]
        .into_iter()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Build the render order: closed tasks (persisted order), then open tabs by tab index
///
/// An open tab is bookmarked when a task has its id. Failing that, an
/// unclaimed task with the same url is attached, so a page whose title
/// changed after bookmarking stays bookmarked. Open tabs resolving to the
/// same id are shown once. A task left without a tab is shown as closed,
/// even when its url is open under another task.
pub fn reconcile(open_tabs: &[OpenTab], tasks: &[Task], features: Features) -> Vec<CardView> {
    let mut open: Vec<&OpenTab> = open_tabs
        .iter()
        .filter(|open| is_extractable_url(open.url()))
        .collect();
    open.sort_by_key(|open| open.tab.index);

    let open_urls: HashSet<&str> = open.iter().map(|open| open.url()).collect();
    let candidates: Vec<&Task> = tasks
        .iter()
        .filter(|task| open_urls.contains(task.url.as_str()))
        .collect();

    // Unique open tabs with their resolved ids
    let mut seen = HashSet::new();
    let entries: Vec<(&OpenTab, String)> = open
        .into_iter()
        .map(|open| (open, resolve_id(open.title(), open.url())))
        .filter(|(_, id)| seen.insert(id.clone()))
        .collect();

    // Exact id matches first, then url fallback among what is left
    let mut claimed: HashSet<&str> = HashSet::new();
    let mut matches: Vec<Option<&Task>> = entries
        .iter()
        .map(|(_, id)| {
            let task = candidates.iter().copied().find(|task| task.id == *id)?;
            claimed.insert(task.id.as_str());
            Some(task)
        })
        .collect();
    for ((open, _), matched) in entries.iter().zip(matches.iter_mut()) {
        if matched.is_some() {
            continue;
        }
        if let Some(task) = candidates
            .iter()
            .copied()
            .find(|task| task.url == open.url() && !claimed.contains(task.id.as_str()))
        {
            claimed.insert(task.id.as_str());
            *matched = Some(task);
        }
    }

    let mut cards = Vec::new();

    // Every task no open tab claimed, including ones sharing a url with a claimed tab
    if features.closed_tasks {
        cards.extend(
            tasks
                .iter()
                .filter(|task| !claimed.contains(task.id.as_str()))
                .map(|task| CardView {
                    id: task.id.clone(),
                    title: task.title.clone(),
                    summary: display_summary(&task.summary, "", &task.title),
                    url: task.url.clone(),
                    closed: true,
                    bookmarked: true,
                    tab_id: None,
                    display_index: None,
                    notes: card_notes(task, features),
                }),
        );
    }

    cards.extend(entries.iter().zip(matches).map(|((open, id), matched)| match matched {
        Some(task) => CardView {
            id: task.id.clone(),
            title: task.title.clone(),
            summary: display_summary(&task.summary, &open.page.description, &task.title),
            url: task.url.clone(),
            closed: false,
            bookmarked: true,
            tab_id: Some(open.tab.id),
            display_index: Some(open.tab.index),
            notes: card_notes(task, features),
        },
        None => CardView {
            id: id.clone(),
            title: open.title().to_string(),
            summary: display_summary("", &open.page.description, open.title()),
            url: open.url().to_string(),
            closed: false,
            bookmarked: false,
            tab_id: Some(open.tab.id),
            display_index: Some(open.tab.index),
            notes: Vec::new(),
        },
    }));

    log::debug!("Reconciled {} card(s) from {} task(s)", cards.len(), tasks.len());
    cards
}

fn card_notes(task: &Task, features: Features) -> Vec<Note> {
    if features.notes {
        display_notes(&task.notes)
    } else {
        Vec::new()
    }
}
