mod history;
mod search;


use anyhow::Result;
use chrono::Utc;
use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub(crate) use history::{
    HistoryRecord, PROGRESS_CEILING_RATIO, PlayHistoryStore, ProgressUpdate, SortOrder,
};
pub(crate) use history::STORE_NAME as HISTORY_STORE;
pub(crate) use search::SearchHistoryStore;

/// Durable storage for whole store states, keyed by store name.
pub(crate) trait PersistencePort {
    fn load(&self, store: &str) -> Result<Option<String>>;
    fn save(&self, store: &str, payload: &str) -> Result<()>;
}

/// Milliseconds since the Unix epoch.
pub(crate) type Clock = Box<dyn Fn() -> i64>;

pub(crate) fn system_clock() -> Clock {
    Box::new(|| Utc::now().timestamp_millis())
}

/// Reads a persisted state, falling back to the default when it is missing,
/// unreadable or corrupt.
fn restore<T>(port: &dyn PersistencePort, store: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match port.load(store) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(err) => {
            warn!("failed to load {store} store: {err:#}");
            return T::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!("discarding corrupt {store} store: {err}");
        T::default()
    })
}

fn persist<T: Serialize>(port: &dyn PersistencePort, store: &str, state: &T) {
    let payload = match serde_json::to_string(state) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("failed to encode {store} store: {err}");
            return;
        }
    };
    if let Err(err) = port.save(store, &payload) {
        warn!("failed to save {store} store: {err:#}");
    }
}
