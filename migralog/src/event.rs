use std::{env, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Up,
    Down,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Up => "up",
            EventType::Down => "down",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "up" => Ok(EventType::Up),
            "down" => Ok(EventType::Down),
            other => Err(StoreError::InvalidEventType(other.to_owned())),
        }
    }
}

/// Host and user recorded next to every event. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub host: Option<String>,
    pub user: Option<String>,
}

impl Provenance {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            user: Some(user.into()),
        }
    }

    /// Host name of this machine and the user from `USER`/`USERNAME`.
    ///
    /// Falls back to `HOSTNAME`/`COMPUTERNAME` when the host name can't be
    /// resolved or isn't valid unicode.
    pub fn from_env() -> Self {
        Self {
            host: hostname().or_else(|| first_var(&["HOSTNAME", "COMPUTERNAME"])),
            user: first_var(&["USER", "USERNAME"]),
        }
    }
}

fn hostname() -> Option<String> {
    gethostname::gethostname()
        .into_string()
        .ok()
        .filter(|host| !host.is_empty())
}

fn first_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEvent {
    pub kind: EventType,
    pub name: String,
}

impl WriteEvent {
    pub fn up<N: Into<String>>(name: N) -> Self {
        Self {
            kind: EventType::Up,
            name: name.into(),
        }
    }

    pub fn down<N: Into<String>>(name: N) -> Self {
        Self {
            kind: EventType::Down,
            name: name.into(),
        }
    }

    pub fn to_event(&self, context: impl Into<String>, provenance: &Provenance) -> Event {
        self.to_event_at(context, provenance, Utc::now())
    }

    pub fn to_event_at(
        &self,
        context: impl Into<String>,
        provenance: &Provenance,
        time: DateTime<Utc>,
    ) -> Event {
        Event {
            id: None,
            time,
            context: context.into(),
            kind: self.kind,
            name: self.name.to_owned(),
            host: provenance.host.clone(),
            user: provenance.user.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: Option<i64>,
    pub time: DateTime<Utc>,
    pub context: String,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub name: String,
    pub host: Option<String>,
    pub user: Option<String>,
}

impl Event {
    pub fn is_up(&self) -> bool {
        self.kind == EventType::Up
    }
}

/// Row shape shared by the sql engines, `type` is kept as text until validated.
#[cfg(any(feature = "pg", feature = "sqlite"))]
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EventRow {
    pub id: i64,
    pub time: DateTime<Utc>,
    pub context: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub name: String,
    pub host: Option<String>,
    pub user: Option<String>,
}

#[cfg(any(feature = "pg", feature = "sqlite"))]
impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self> {
        Ok(Event {
            id: Some(row.id),
            time: row.time,
            context: row.context,
            kind: row.kind.parse()?,
            name: row.name,
            host: row.host,
            user: row.user,
        })
    }
}

/// A struct carrying the migration name, the shape newer runners pass around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub name: String,
}

/// Every shape accepted by `log_migration`/`unlog_migration`.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationRef {
    Name(String),
    Value(Value),
}

impl MigrationRef {
    pub fn into_name(self) -> Result<String> {
        match self {
            MigrationRef::Name(name) => Ok(name),
            MigrationRef::Value(Value::String(name)) => Ok(name),
            MigrationRef::Value(Value::Object(mut object)) => match object.remove("name") {
                Some(Value::String(name)) => Ok(name),
                _ => Err(invalid_name()),
            },
            MigrationRef::Value(_) => Err(invalid_name()),
        }
    }
}

fn invalid_name() -> StoreError {
    StoreError::Validation("The parameter 'name' must be a string.".to_owned())
}

impl From<&str> for MigrationRef {
    fn from(name: &str) -> Self {
        MigrationRef::Name(name.to_owned())
    }
}

impl From<String> for MigrationRef {
    fn from(name: String) -> Self {
        MigrationRef::Name(name)
    }
}

impl From<&String> for MigrationRef {
    fn from(name: &String) -> Self {
        MigrationRef::Name(name.to_owned())
    }
}

impl From<Migration> for MigrationRef {
    fn from(migration: Migration) -> Self {
        MigrationRef::Name(migration.name)
    }
}

impl From<&Migration> for MigrationRef {
    fn from(migration: &Migration) -> Self {
        MigrationRef::Name(migration.name.to_owned())
    }
}

impl From<Value> for MigrationRef {
    fn from(value: Value) -> Self {
        MigrationRef::Value(value)
    }
}
