//! Defaults and construction of a [`Store`].
//!
//! A store is built either programmatically through [`StoreBuilder`] or from a
//! loose JSON options object as found in a runner's config file:
//!
//! ```rust,ignore
//! let store = Store::builder()
//!     .engine(SqliteEngine::new(&pool))
//!     .options(&serde_json::json!({ "tableName": "schema_log", "context": "tenant" }))?
//!     .build()?;
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::{
    engine::Engine,
    error::{Result, StoreError},
    event::Provenance,
    store::Store,
};

/// Table holding the event log when none is configured.
pub const DEFAULT_TABLE_NAME: &str = "migrations";

/// Context used when none is configured.
pub const DEFAULT_CONTEXT: &str = "default";

/// Key/value table the predecessor format stored its state in.
pub const DEFAULT_LEGACY_TABLE: &str = "migrate_state";

/// Key of the legacy row carrying the JSON state.
pub const LEGACY_STATE_KEY: &str = "system";

/// Gap in milliseconds between two imported legacy events.
pub const LEGACY_INTERVAL_MS: i64 = 1;

/// Options a runner may read from its own configuration.
///
/// Both `camelCase` and `snake_case` keys are accepted. Unknown keys, such as
/// a `connection` entry the engine was built from, are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOptions {
    #[serde(default, alias = "table_name")]
    pub table_name: Option<String>,

    #[serde(default)]
    pub context: Option<String>,

    #[serde(default, alias = "legacy_table")]
    pub legacy_table: Option<String>,
}

impl StoreOptions {
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(StoreError::Config("options must be an object".to_owned()));
        }

        serde_json::from_value(value.clone())
            .map_err(|err| StoreError::Config(format!("invalid options: {err}")))
    }
}

#[derive(Default)]
pub struct StoreBuilder {
    engine: Option<Box<dyn Engine>>,
    table_name: Option<String>,
    context: Option<String>,
    legacy_table: Option<Option<String>>,
    provenance: Option<Provenance>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine<E: Engine + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// `None` turns the legacy import off.
    pub fn legacy_table<T: Into<String>>(mut self, legacy_table: Option<T>) -> Self {
        self.legacy_table = Some(legacy_table.map(Into::into));
        self
    }

    pub fn provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn options(mut self, options: &Value) -> Result<Self> {
        let options = StoreOptions::from_value(options)?;

        if let Some(table_name) = options.table_name {
            self.table_name = Some(table_name);
        }

        if let Some(context) = options.context {
            self.context = Some(context);
        }

        if let Some(legacy_table) = options.legacy_table {
            self.legacy_table = Some(Some(legacy_table));
        }

        Ok(self)
    }

    pub fn build(self) -> Result<Store> {
        let Some(engine) = self.engine else {
            return Err(StoreError::Config(
                "The option 'connection' is required.".to_owned(),
            ));
        };

        let table_name = or_default(self.table_name, DEFAULT_TABLE_NAME);
        validate_identifier("tableName", &table_name)?;

        let legacy_table = match self.legacy_table {
            Some(Some(table)) if !table.is_empty() => Some(table),
            Some(_) => None,
            None => Some(DEFAULT_LEGACY_TABLE.to_owned()),
        };

        if let Some(table) = &legacy_table {
            validate_identifier("legacyTable", table)?;
        }

        Ok(Store {
            engine,
            table_name,
            context: or_default(self.context, DEFAULT_CONTEXT),
            legacy_table,
            provenance: self.provenance.unwrap_or_else(Provenance::from_env),
        })
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    match value {
        Some(value) if !value.is_empty() => value,
        _ => default.to_owned(),
    }
}

/// Table names end up inside statements, only plain identifiers are allowed.
fn validate_identifier(option: &str, value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Ok(());
    }

    Err(StoreError::Config(format!(
        "The option '{option}' must be a plain identifier, got `{value}`."
    )))
}
