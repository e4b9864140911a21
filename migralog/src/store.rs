use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::{
    aggregate::AppliedSet,
    config::{StoreBuilder, LEGACY_INTERVAL_MS, LEGACY_STATE_KEY},
    engine::Engine,
    error::{Result, StoreError},
    event::{Event, MigrationRef, Provenance, WriteEvent},
    legacy::LegacyState,
};

/// Event log of applied migrations for one context of one table.
///
/// The table is created on first use. Several stores with different contexts
/// may share the same table without seeing each other's events.
#[derive(Clone)]
pub struct Store {
    pub(crate) engine: Box<dyn Engine>,
    pub(crate) table_name: String,
    pub(crate) context: String,
    pub(crate) legacy_table: Option<String>,
    pub(crate) provenance: Provenance,
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Store with the default table name and context.
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self {
            engine: Box::new(engine),
            table_name: crate::config::DEFAULT_TABLE_NAME.to_owned(),
            context: crate::config::DEFAULT_CONTEXT.to_owned(),
            legacy_table: Some(crate::config::DEFAULT_LEGACY_TABLE.to_owned()),
            provenance: Provenance::from_env(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn legacy_table(&self) -> Option<&str> {
        self.legacy_table.as_deref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub async fn log_migration<M: Into<MigrationRef>>(&self, migration: M) -> Result<()> {
        let name = migration.into().into_name()?;

        self.write(WriteEvent::up(name)).await
    }

    pub async fn unlog_migration<M: Into<MigrationRef>>(&self, migration: M) -> Result<()> {
        let name = migration.into().into_name()?;

        self.write(WriteEvent::down(name)).await
    }

    /// Names currently applied, in the order they were applied.
    pub async fn executed(&self) -> Result<Vec<String>> {
        let events = self.history().await?;

        Ok(AppliedSet::from_events(self.context.as_str(), &events).into_names())
    }

    /// Every event of this context, oldest first.
    pub async fn history(&self) -> Result<Vec<Event>> {
        match self.read().await {
            Err(err) if err.is_table_absent() => {
                self.bootstrap().await?;
                self.engine.read(&self.table_name, &self.context).await
            }
            res => res,
        }
    }

    async fn read(&self) -> Result<Vec<Event>> {
        if !self.engine.table_exists(&self.table_name).await? {
            return Err(StoreError::TableAbsent(self.table_name.to_owned()));
        }

        if !self.engine.has_identity(&self.table_name).await? {
            info!(table = %self.table_name, "adding missing identity column");
            self.engine.add_identity(&self.table_name).await?;
        }

        self.engine.read(&self.table_name, &self.context).await
    }

    async fn write(&self, event: WriteEvent) -> Result<()> {
        debug!(
            table = %self.table_name,
            context = %self.context,
            name = %event.name,
            kind = %event.kind,
            "logging migration event"
        );

        let res = self
            .engine
            .insert(
                &self.table_name,
                vec![event.to_event(self.context.as_str(), &self.provenance)],
            )
            .await;

        match res {
            Err(err) if err.is_table_absent() => {
                self.bootstrap().await?;

                // stamped again so it sorts after any imported legacy event
                self.engine
                    .insert(
                        &self.table_name,
                        vec![event.to_event(self.context.as_str(), &self.provenance)],
                    )
                    .await
            }
            res => res,
        }
    }

    async fn bootstrap(&self) -> Result<()> {
        // legacy state is read first so a failure leaves the table absent
        let events = self.legacy_events().await?;

        info!(table = %self.table_name, "creating migration table");

        self.engine.create_table(&self.table_name).await?;

        if events.is_empty() {
            return Ok(());
        }

        info!(
            table = %self.table_name,
            context = %self.context,
            count = events.len(),
            "importing legacy migrations"
        );

        self.engine.insert(&self.table_name, events).await
    }

    async fn legacy_events(&self) -> Result<Vec<Event>> {
        let Some(legacy_table) = &self.legacy_table else {
            return Ok(Vec::new());
        };

        let Some(raw) = self
            .engine
            .read_legacy(legacy_table, LEGACY_STATE_KEY)
            .await?
        else {
            debug!(table = %legacy_table, "no legacy state found");
            return Ok(Vec::new());
        };

        let state = LegacyState::parse(&raw)?;

        // the last imported event lands before anything logged from now on
        let span = i64::try_from(state.migrations.len())
            .map_err(anyhow::Error::from)?
            .saturating_mul(LEGACY_INTERVAL_MS);
        let base = Utc::now() - Duration::milliseconds(span);

        Ok(state.to_events(&self.context, &self.provenance, base))
    }
}
