use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::{Clock, PersistencePort, persist, restore, system_clock};

pub(crate) const STORE_NAME: &str = "searchHistory";
pub(crate) const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SearchTerm {
    pub(crate) term: String,
    pub(crate) timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SearchHistoryState {
    search_history: Vec<SearchTerm>,
}

pub(crate) struct SearchHistoryStore {
    port: Rc<dyn PersistencePort>,
    clock: Clock,
    state: SearchHistoryState,
}

impl SearchHistoryStore {
    pub(crate) fn open(port: Rc<dyn PersistencePort>) -> Self {
        Self::with_clock(port, system_clock())
    }

    pub(crate) fn with_clock(port: Rc<dyn PersistencePort>, clock: Clock) -> Self {
        let state = restore(port.as_ref(), STORE_NAME);
        Self { port, clock, state }
    }

    /// Puts `term` at the front. Blank terms are ignored.
    pub(crate) fn add(&mut self, term: &str) -> bool {
        if term.trim().is_empty() {
            return false;
        }
        let history = &mut self.state.search_history;
        history.retain(|item| item.term != term);
        history.insert(
            0,
            SearchTerm {
                term: term.to_string(),
                timestamp: (self.clock)(),
            },
        );
        history.truncate(SEARCH_LIMIT);
        persist(self.port.as_ref(), STORE_NAME, &self.state);
        true
    }

    pub(crate) fn remove(&mut self, term: &str) -> bool {
        let before = self.state.search_history.len();
        self.state.search_history.retain(|item| item.term != term);
        if self.state.search_history.len() == before {
            return false;
        }
        persist(self.port.as_ref(), STORE_NAME, &self.state);
        true
    }

    pub(crate) fn clear(&mut self) {
        self.state.search_history.clear();
        persist(self.port.as_ref(), STORE_NAME, &self.state);
    }

    pub(crate) fn terms(&self) -> &[SearchTerm] {
        &self.state.search_history
    }
}
