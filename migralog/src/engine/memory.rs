use async_trait::async_trait;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

use crate::{
    engine::Engine,
    error::{Result, StoreError},
    event::Event,
};

#[derive(Debug, Default)]
struct Table {
    events: Vec<Event>,
    identity: bool,
    next_id: i64,
}

impl Table {
    fn with_identity() -> Self {
        Self {
            identity: true,
            ..Self::default()
        }
    }

    fn push(&mut self, mut event: Event) {
        event.id = if self.identity {
            self.next_id += 1;
            Some(self.next_id)
        } else {
            None
        };

        self.events.push(event);
    }
}

/// In-process engine, tables live as long as one of its clones.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    legacy: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a legacy key/value table.
    pub fn with_legacy_state(
        self,
        table: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.legacy
            .write()
            .entry(table.into())
            .or_default()
            .insert(key.into(), value.into());

        self
    }

    /// Seeds an event table, `identity: false` mimics tables created before
    /// the identity column existed.
    pub fn with_table(self, table: impl Into<String>, events: Vec<Event>, identity: bool) -> Self {
        {
            let mut tables = self.tables.write();
            let table = tables.entry(table.into()).or_insert_with(|| Table {
                identity,
                ..Table::default()
            });

            for event in events {
                table.push(event);
            }
        }

        self
    }

    /// Raw rows of every context, in insertion order.
    pub fn rows(&self, table: &str) -> Option<Vec<Event>> {
        self.tables.read().get(table).map(|t| t.events.clone())
    }
}

#[async_trait]
impl Engine for Memory {
    async fn table_exists(&self, table: &'_ str) -> Result<bool> {
        Ok(self.tables.read().contains_key(table))
    }

    async fn create_table(&self, table: &'_ str) -> Result<()> {
        self.tables
            .write()
            .entry(table.to_owned())
            .or_insert_with(Table::with_identity);

        Ok(())
    }

    async fn has_identity(&self, table: &'_ str) -> Result<bool> {
        match self.tables.read().get(table) {
            Some(table) => Ok(table.identity),
            _ => Err(StoreError::TableAbsent(table.to_owned())),
        }
    }

    async fn add_identity(&self, table: &'_ str) -> Result<()> {
        let mut tables = self.tables.write();
        let Some(table) = tables.get_mut(table) else {
            return Err(StoreError::TableAbsent(table.to_owned()));
        };

        if table.identity {
            return Ok(());
        }

        table.identity = true;

        for event in table.events.iter_mut() {
            table.next_id += 1;
            event.id = Some(table.next_id);
        }

        Ok(())
    }

    async fn insert(&self, table: &'_ str, events: Vec<Event>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write();
        let Some(table) = tables.get_mut(table) else {
            return Err(StoreError::TableAbsent(table.to_owned()));
        };

        for event in events {
            table.push(event);
        }

        Ok(())
    }

    async fn read(&self, table: &'_ str, context: &'_ str) -> Result<Vec<Event>> {
        let tables = self.tables.read();
        let Some(table) = tables.get(table) else {
            return Err(StoreError::TableAbsent(table.to_owned()));
        };

        let mut events = table
            .events
            .iter()
            .filter(|event| event.context == context)
            .cloned()
            .collect::<Vec<_>>();

        // stable, equal times keep insertion order
        events.sort_by_key(|event| event.time);

        Ok(events)
    }

    async fn read_legacy(&self, table: &'_ str, key: &'_ str) -> Result<Option<String>> {
        Ok(self
            .legacy
            .read()
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned())
    }
}
