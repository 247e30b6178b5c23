//! Attributes that acquire a value on first access.
//!
//! Field definitions expose a few derived attributes that are only computed
//! when something asks for them. Until then they serialize as `null`, after
//! that as the computed value, so any serialization taken for hashing must
//! force them first (see [`crate::domain::entities::FormDefinition::canonical`]).

use std::fmt;

use once_cell::sync::OnceCell;
use serde::{Serialize, Serializer};

#[derive(Clone, Default)]
pub struct LazyAttribute<T> {
    cell: OnceCell<T>,
}

impl<T> LazyAttribute<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the value, computing and storing it on first access.
    pub fn get_or_init<F>(&self, init: F) -> &T
    where
        F: FnOnce() -> T,
    {
        self.cell.get_or_init(init)
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_materialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for LazyAttribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => f.debug_tuple("LazyAttribute").field(value).finish(),
            None => f.write_str("LazyAttribute(<pending>)"),
        }
    }
}

// Derived values follow their source fields, so materialization state never
// makes two owners unequal.
impl<T> PartialEq for LazyAttribute<T> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T: Serialize> Serialize for LazyAttribute<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.cell.get() {
            Some(value) => value.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}
