/// Checklist editing for task notes
///
/// Every operation takes the stored list, returns a new list, and never
/// touches storage itself. Indices address the display list: the stored
/// list after normalization, or a lone placeholder when that is empty.
/// A placeholder only appears through a commit, so typing into it does
/// not open another row.
use crate::tab_data::Note;
use serde::Deserialize;
use serde_json::Value;

/// Shapes a stored note may take
#[derive(Deserialize)]
#[serde(untagged)]
enum NoteRecord {
    Plain(String),
    Item {
        text: String,
        #[serde(default)]
        checked: bool,
    },
    Unknown(Value),
}

/// Result of a structural edit: the new list and the index the shell should focus
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEdit {
    pub notes: Vec<Note>,
    pub focus: usize,
}

/// Parse stored notes, accepting legacy plain-string entries
pub fn notes_from_value(value: &Value) -> Vec<Note> {
    let records: Vec<NoteRecord> = match serde_json::from_value(value.clone()) {
        Ok(records) => records,
        Err(_) => {
            if !value.is_null() {
                log::warn!("Dropping notes that are not a list: {}", value);
            }
            return Vec::new();
        }
    };

    let notes = records
        .into_iter()
        .filter_map(|record| match record {
            NoteRecord::Plain(text) => Some(Note::new(text)),
            NoteRecord::Item { text, checked } => Some(Note { text, checked }),
            NoteRecord::Unknown(other) => {
                log::warn!("Dropping malformed note: {}", other);
                None
            }
        })
        .collect();

    normalize(notes)
}

/// Drop blank entries except a trailing placeholder, which is forced unchecked
pub fn normalize(notes: Vec<Note>) -> Vec<Note> {
    let last = notes.len().saturating_sub(1);
    let mut normalized: Vec<Note> = notes
        .into_iter()
        .enumerate()
        .filter(|(i, note)| *i == last || !note.is_blank())
        .map(|(_, note)| note)
        .collect();

    if let Some(tail) = normalized.last_mut() {
        if tail.is_blank() {
            *tail = Note::placeholder();
        }
    }

    normalized
}

/// Drop every blank entry, placeholder included
pub fn compact(notes: &[Note]) -> Vec<Note> {
    notes.iter().filter(|note| !note.is_blank()).cloned().collect()
}

/// Stored notes as shown; an empty list shows a single placeholder
pub fn display_notes(notes: &[Note]) -> Vec<Note> {
    let mut display = normalize(notes.to_vec());
    if display.is_empty() {
        display.push(Note::placeholder());
    }
    display
}

/// Write `text` at `index`
///
/// Writing into the placeholder turns it into a real item; editing an
/// existing item keeps its checked flag. Blank text is never stored, and
/// no new placeholder is created.
pub fn set_text(notes: &[Note], index: usize, text: &str) -> Option<Vec<Note>> {
    if text.trim().is_empty() {
        return None;
    }

    let mut notes = normalize(notes.to_vec());
    if let Some(note) = notes.get_mut(index) {
        note.text = text.to_string();
    } else if index == notes.len() {
        notes.push(Note::new(text));
    } else {
        return None;
    }

    Some(notes)
}

pub fn toggle_checked(notes: &[Note], index: usize, checked: bool) -> Option<Vec<Note>> {
    let mut notes = normalize(notes.to_vec());
    match notes.get_mut(index) {
        Some(note) if !note.is_blank() => {
            note.checked = checked;
            Some(notes)
        }
        _ => None,
    }
}

/// Accept gesture (Enter) on a non-blank item: store it and open a new placeholder
pub fn commit_new_line(notes: &[Note], index: usize, current_text: &str) -> Option<NoteEdit> {
    if current_text.trim().is_empty() {
        return None;
    }

    let edited = set_text(notes, index, current_text).unwrap_or_else(|| notes.to_vec());
    let mut notes = compact(&edited);
    notes.push(Note::placeholder());
    let focus = notes.len() - 1;

    Some(NoteEdit { notes, focus })
}

/// Delete-back gesture (Backspace) on a blank item: remove it and focus the previous one
pub fn delete_at(notes: &[Note], index: usize, current_text: &str) -> Option<NoteEdit> {
    if !current_text.trim().is_empty() || display_notes(notes).len() <= 1 {
        return None;
    }

    let mut notes = normalize(notes.to_vec());
    if index < notes.len() {
        notes.remove(index);
    }

    Some(NoteEdit {
        notes,
        focus: index.saturating_sub(1),
    })
}
