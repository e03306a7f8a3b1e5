/// Bindings to the chrome.* APIs exposed by sidebar.js

use crate::batch::TabOutcome;
use crate::error::{Result, SidebarError};
use crate::storage::{BoxFuture, KeyValueStore};
use crate::tab_data::{PageInfo, TabInfo};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/sidebar.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn queryTabs() -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn requestPageInfo(tab_id: i32) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getStorage(key: &str) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(key: &str, value: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeStorage(key: &str) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn openTab(url: &str) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn closeTab(tab_id: i32) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn sleep(ms: u32) -> std::result::Result<(), JsValue>;

    fn onTabsChanged(callback: &js_sys::Function);
}

fn js_error(err: JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

/// chrome.storage.local
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStore;

impl KeyValueStore for ChromeStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move {
            let value_js = getStorage(key)
                .await
                .map_err(|e| SidebarError::Storage(js_error(e)))?;

            if value_js.is_null() || value_js.is_undefined() {
                return Ok(None);
            }
            serde_wasm_bindgen::from_value(value_js)
                .map(Some)
                .map_err(|e| SidebarError::Serialization(e.to_string()))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            // Plain objects rather than JS Maps, so chrome.storage keeps them
            let value_js = value
                .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
                .map_err(|e| SidebarError::Serialization(e.to_string()))?;

            setStorage(key, value_js)
                .await
                .map_err(|e| SidebarError::Storage(js_error(e)))
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            removeStorage(key)
                .await
                .map_err(|e| SidebarError::Storage(js_error(e)))
        })
    }
}

pub async fn query_tabs() -> Result<Vec<TabInfo>> {
    let tabs_js = queryTabs()
        .await
        .map_err(|e| SidebarError::MessageDelivery(js_error(e)))?;

    serde_wasm_bindgen::from_value(tabs_js)
        .map_err(|e| SidebarError::Serialization(format!("Failed to parse tabs: {}", e)))
}

/// Ask the tab's content script for its page info
pub async fn fetch_page_info(tab: &TabInfo) -> TabOutcome {
    if !tab.is_extractable() {
        return TabOutcome::Skipped;
    }

    let page_js = match requestPageInfo(tab.id).await {
        Ok(page_js) => page_js,
        Err(e) => return TabOutcome::Failed(SidebarError::MessageDelivery(js_error(e))),
    };

    match serde_wasm_bindgen::from_value::<PageInfo>(page_js) {
        Ok(page) => TabOutcome::Resolved(page.normalized()),
        Err(e) => TabOutcome::Failed(SidebarError::ExtractionSkipped {
            tab_id: tab.id,
            reason: e.to_string(),
        }),
    }
}

pub async fn open_tab(url: &str) -> Result<()> {
    openTab(url)
        .await
        .map_err(|e| SidebarError::MessageDelivery(js_error(e)))
}

pub async fn close_tab(tab_id: i32) -> Result<()> {
    closeTab(tab_id).await.map_err(|e| {
        log::warn!("Closing tab {} failed: {}", tab_id, js_error(e));
        SidebarError::StaleReference { tab_id }
    })
}

pub async fn sleep_ms(ms: u32) {
    if let Err(e) = sleep(ms).await {
        log::warn!("Timer failed: {}", js_error(e));
    }
}

/// Run `callback` on tab created, removed, and updated-to-complete events
pub fn on_tabs_changed(callback: impl Fn() + 'static) {
    let closure = Closure::wrap(Box::new(callback) as Box<dyn Fn()>);
    onTabsChanged(closure.as_ref().unchecked_ref());
    // Listeners live as long as the sidebar page
    closure.forget();
}
