/// One round of page-info requests, joined per tab
///
/// Every tab in the batch contributes exactly one outcome. Disallowed tabs
/// are settled as skipped up front; the rest stay pending until they
/// resolve, fail, or the batch expires. The batch reports completion once.
use crate::error::SidebarError;
use crate::tab_data::{OpenTab, PageInfo, TabInfo};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub enum TabOutcome {
    Resolved(PageInfo),
    Skipped,
    Failed(SidebarError),
    TimedOut,
}

/// Summary handed to the reconciler when the batch completes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    pub generation: u64,
    pub open_tabs: Vec<OpenTab>,
    pub skipped: usize,
    pub failed: usize,
    pub timed_out: usize,
}

#[derive(Debug)]
pub struct TabInfoBatch {
    generation: u64,
    tabs: HashMap<i32, TabInfo>,
    outcomes: BTreeMap<i32, TabOutcome>,
    completed: bool,
}

impl TabInfoBatch {
    pub fn new(generation: u64, tabs: Vec<TabInfo>) -> TabInfoBatch {
        let mut outcomes = BTreeMap::new();
        for tab in tabs.iter().filter(|tab| !tab.is_extractable()) {
            log::debug!("Skipping tab {} ({})", tab.id, tab.url);
            outcomes.insert(tab.id, TabOutcome::Skipped);
        }

        TabInfoBatch {
            generation,
            tabs: tabs.into_iter().map(|tab| (tab.id, tab)).collect(),
            outcomes,
            completed: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Tabs that still need a page-info request, in tab order
    pub fn targets(&self) -> Vec<TabInfo> {
        let mut targets: Vec<TabInfo> = self
            .tabs
            .values()
            .filter(|tab| !self.outcomes.contains_key(&tab.id))
            .cloned()
            .collect();
        targets.sort_by_key(|tab| tab.index);
        targets
    }

    pub fn pending(&self) -> usize {
        self.tabs.len() - self.outcomes.len()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Record the outcome for one tab
    ///
    /// Outcomes for unknown tabs, already settled tabs, or after completion
    /// are ignored. Returns the report when this outcome completes the batch.
    pub fn resolve(&mut self, tab_id: i32, outcome: TabOutcome) -> Option<BatchReport> {
        if self.completed || !self.tabs.contains_key(&tab_id) {
            return None;
        }
        if self.outcomes.contains_key(&tab_id) {
            log::debug!("Ignoring duplicate outcome for tab {}", tab_id);
            return None;
        }

        if let TabOutcome::Failed(err) = &outcome {
            log::warn!("{}", err);
        }
        self.outcomes.insert(tab_id, outcome);
        self.try_complete()
    }

    /// Complete the batch when nothing is pending (e.g. only disallowed tabs)
    pub fn try_complete(&mut self) -> Option<BatchReport> {
        if self.completed || self.pending() > 0 {
            return None;
        }
        self.completed = true;
        Some(self.report())
    }

    /// Give up on pending tabs; returns the report unless the batch already completed
    pub fn expire(&mut self) -> Option<BatchReport> {
        if self.completed {
            return None;
        }

        let pending: Vec<i32> = self
            .tabs
            .keys()
            .filter(|id| !self.outcomes.contains_key(id))
            .copied()
            .collect();
        if !pending.is_empty() {
            log::warn!("Page info timed out for {} tab(s)", pending.len());
        }
        for tab_id in pending {
            self.outcomes.insert(tab_id, TabOutcome::TimedOut);
        }

        self.try_complete()
    }

    fn report(&self) -> BatchReport {
        let mut report = BatchReport {
            generation: self.generation,
            ..BatchReport::default()
        };

        for (tab_id, outcome) in &self.outcomes {
            match outcome {
                TabOutcome::Resolved(page) => {
                    if let Some(tab) = self.tabs.get(tab_id) {
                        report.open_tabs.push(OpenTab {
                            tab: tab.clone(),
                            page: page.clone(),
                        });
                    }
                }
                TabOutcome::Skipped => report.skipped += 1,
                TabOutcome::Failed(_) => report.failed += 1,
                TabOutcome::TimedOut => report.timed_out += 1,
            }
        }

        report.open_tabs.sort_by_key(|open| open.tab.index);
        report
    }
}
