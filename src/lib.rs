/// Tab Tasks - Chrome Extension sidebar for turning tabs into tasks
/// Built with Rust + WASM + Yew

pub mod batch;
pub mod config;
pub mod error;
pub mod identity;
pub mod notes;
pub mod reconcile;
pub mod storage;
pub mod tab_data;
pub mod ui;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export task identity for JavaScript access
#[wasm_bindgen]
pub fn resolve_task_id(title: &str, url: &str) -> String {
    identity::resolve_id(title, url)
}

// Start the Yew app for the sidebar
#[wasm_bindgen]
pub fn start_sidebar() {
    yew::Renderer::<ui::sidebar::Sidebar>::new().render();
}
