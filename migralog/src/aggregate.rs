use std::collections::{BTreeMap, HashMap};

use crate::event::Event;

/// State rebuilt by replaying events in order.
pub trait Aggregate: Default {
    fn apply(&mut self, event: &'_ Event);

    fn replay<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a Event>,
    {
        events.into_iter().fold(Self::default(), |mut state, event| {
            state.apply(event);
            state
        })
    }
}

/// Insertion-ordered set of applied migration names for one context.
///
/// An `up` appends a name that is not yet present, a `down` removes it. A name
/// that goes down and up again lands at the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AppliedSet {
    context: Option<String>,
    next: u64,
    by_name: HashMap<String, u64>,
    by_seq: BTreeMap<u64, String>,
}

impl AppliedSet {
    pub fn for_context(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
            ..Self::default()
        }
    }

    pub fn from_events<'a, I>(context: impl Into<String>, events: I) -> Self
    where
        I: IntoIterator<Item = &'a Event>,
    {
        events
            .into_iter()
            .fold(Self::for_context(context), |mut state, event| {
                state.apply(event);
                state
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_seq.values().map(String::as_str)
    }

    pub fn into_names(self) -> Vec<String> {
        self.by_seq.into_values().collect()
    }

    fn insert(&mut self, name: &str) {
        if self.by_name.contains_key(name) {
            return;
        }

        self.by_name.insert(name.to_owned(), self.next);
        self.by_seq.insert(self.next, name.to_owned());
        self.next += 1;
    }

    fn remove(&mut self, name: &str) {
        if let Some(seq) = self.by_name.remove(name) {
            self.by_seq.remove(&seq);
        }
    }
}

impl Aggregate for AppliedSet {
    fn apply(&mut self, event: &'_ Event) {
        if let Some(context) = &self.context {
            if context != &event.context {
                return;
            }
        }

        if event.is_up() {
            self.insert(&event.name);
        } else {
            self.remove(&event.name);
        }
    }
}
