/// Data structures for Tab Tasks
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Information about a browser tab, as reported by tab enumeration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabInfo {
    pub id: i32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub index: i32,
}

impl TabInfo {
    pub fn new(id: i32, url: String, title: String, index: i32) -> TabInfo {
        TabInfo {
            id,
            url,
            title,
            index,
        }
    }

    /// Whether a content script may be injected into this tab
    pub fn is_extractable(&self) -> bool {
        is_extractable_url(&self.url)
    }
}

/// Page details extracted by the content script
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PageInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "meta")]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

impl PageInfo {
    /// Trim the title and collapse runs of whitespace in the description
    pub fn normalized(self) -> PageInfo {
        PageInfo {
            title: self.title.trim().to_string(),
            description: WHITESPACE
                .replace_all(self.description.trim(), " ")
                .into_owned(),
            url: self.url,
        }
    }
}

/// An open tab whose page info was extracted
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTab {
    pub tab: TabInfo,
    pub page: PageInfo,
}

impl OpenTab {
    /// Page URL, falling back to the tab URL
    pub fn url(&self) -> &str {
        if self.page.url.is_empty() {
            &self.tab.url
        } else {
            &self.page.url
        }
    }

    /// Page title, falling back to the tab title
    pub fn title(&self) -> &str {
        if self.page.title.is_empty() {
            &self.tab.title
        } else {
            &self.page.title
        }
    }
}

/// A checklist item within a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Note {
    pub text: String,
    pub checked: bool,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Note {
        Note {
            text: text.into(),
            checked: false,
        }
    }

    pub fn placeholder() -> Note {
        Note::default()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A bookmarked page, persisted independently of its tab
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i32>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// Only http(s) pages accept content scripts; the Chrome Web Store refuses them too
pub fn is_extractable_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && !is_web_store(&parsed),
        Err(_) => false,
    }
}

fn is_web_store(url: &Url) -> bool {
    match url.host_str() {
        Some("chromewebstore.google.com") => true,
        Some("chrome.google.com") => url.path().starts_with("/webstore"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_info_creation() {
        let tab = TabInfo::new(1, "https://google.com".to_string(), "Google".to_string(), 0);

        assert_eq!(tab.id, 1);
        assert_eq!(tab.url, "https://google.com");
        assert_eq!(tab.title, "Google");
        assert_eq!(tab.index, 0);
        assert!(tab.is_extractable());
    }

    #[test]
    fn test_tab_info_from_chrome_json() {
        let json = r#"{"id": 5, "index": 2, "url": "https://a.com", "title": "A", "pinned": true, "active": false}"#;
        let tab: TabInfo = serde_json::from_str(json).unwrap();
        assert_eq!(tab, TabInfo::new(5, "https://a.com".to_string(), "A".to_string(), 2));

        // Tabs without host permission carry no url/title
        let tab: TabInfo = serde_json::from_str(r#"{"id": 6}"#).unwrap();
        assert_eq!(tab.url, "");
        assert!(!tab.is_extractable());
    }

    #[test]
    fn test_extractable_urls() {
        assert!(is_extractable_url("https://www.google.com/search?q=rust"));
        assert!(is_extractable_url("http://localhost:3000"));
        assert!(is_extractable_url("https://chrome.google.com/search"));

        assert!(!is_extractable_url("chrome://extensions"));
        assert!(!is_extractable_url("chrome-extension://abcdef/sidebar.html"));
        assert!(!is_extractable_url("devtools://devtools/bundled/inspector.html"));
        assert!(!is_extractable_url("edge://settings"));
        assert!(!is_extractable_url("about:blank"));
        assert!(!is_extractable_url("file:///home/user/index.html"));
        assert!(!is_extractable_url("https://chromewebstore.google.com/detail/x"));
        assert!(!is_extractable_url("https://chrome.google.com/webstore/category"));
        assert!(!is_extractable_url(""));
        assert!(!is_extractable_url("not a url"));
    }

    #[test]
    fn test_page_info_accepts_meta_alias() {
        let json = r#"{"title": "Docs", "meta": "Read the docs", "url": "https://docs.rs"}"#;
        let page: PageInfo = serde_json::from_str(json).unwrap();
        assert_eq!(page.description, "Read the docs");
    }

    #[test]
    fn test_page_info_normalized() {
        let page = PageInfo {
            title: "  Title \n".to_string(),
            description: " line one\n\n   line\ttwo ".to_string(),
            url: "https://a.com".to_string(),
        }
        .normalized();

        assert_eq!(page.title, "Title");
        assert_eq!(page.description, "line one line two");
    }

    #[test]
    fn test_open_tab_fallbacks() {
        let open = OpenTab {
            tab: TabInfo::new(1, "https://a.com/".to_string(), "Tab title".to_string(), 0),
            page: PageInfo::default(),
        };
        assert_eq!(open.url(), "https://a.com/");
        assert_eq!(open.title(), "Tab title");
    }

    #[test]
    fn test_task_serialization() {
        let task = Task {
            id: "task-1".to_string(),
            title: "Google".to_string(),
            summary: "Search".to_string(),
            url: "https://google.com".to_string(),
            tab_id: Some(3),
            notes: vec![Note::new("buy milk"), Note::placeholder()],
        };

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["tabId"], 3);
        assert_eq!(json["notes"][0]["text"], "buy milk");

        let deserialized: Task = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, task);
    }
}
