//! State written by the single-context predecessor of the event log.
//!
//! The predecessor kept one JSON document under the `system` key of a key/value
//! table:
//!
//! ```json
//! { "lastRun": "2-second", "migrations": [{ "title": "1-first" }, { "title": "2-second" }] }
//! ```
//!
//! It is converted once, when the event table is created, into one `up` event
//! per entry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::LEGACY_INTERVAL_MS,
    error::Result,
    event::{Event, Provenance, WriteEvent},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyMigration {
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyState {
    #[serde(default)]
    pub migrations: Vec<LegacyMigration>,
}

impl LegacyState {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Entry `i` is stamped `base + i` milliseconds so time ordering keeps the
    /// original sequence.
    pub fn to_events(
        &self,
        context: &str,
        provenance: &Provenance,
        base: DateTime<Utc>,
    ) -> Vec<Event> {
        self.migrations
            .iter()
            .zip(0i64..)
            .map(|(migration, index)| {
                WriteEvent::up(migration.title.to_owned()).to_event_at(
                    context,
                    provenance,
                    base + Duration::milliseconds(index * LEGACY_INTERVAL_MS),
                )
            })
            .collect()
    }
}
