// Copyright 2025 Cowboy AI, LLC.

//! # Persistence Layer
//!
//! Managers persist their records through a [`PersistenceProvider`], a small
//! load/store/delete contract keyed by string ids. The crate ships
//! [`InMemoryPersistence`]; file system or database back-ends are supplied by
//! the embedding application.

mod in_memory;

pub use in_memory::InMemoryPersistence;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::errors::TradeResult;

/// Durable storage for one record type
pub trait PersistenceProvider<T>: Send + Sync
where
    T: Serialize + DeserializeOwned,
{
    /// Load a record; [`TradeError::NotFound`](crate::TradeError::NotFound)
    /// when absent
    fn load(&self, id: &str) -> TradeResult<T>;

    /// Insert or replace a record
    fn store(&self, id: &str, record: &T) -> TradeResult<()>;

    /// Remove a record; removing an absent record is not an error
    fn delete(&self, id: &str) -> TradeResult<()>;

    /// Load the given records, or every record when `ids` is `None`
    ///
    /// Unknown ids are skipped.
    fn load_all(&self, ids: Option<&[String]>) -> TradeResult<BTreeMap<String, T>>;
}
