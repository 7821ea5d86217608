// ============================================================================
// Pipevault Library
// ============================================================================

//! Transactional persistence layer for data-pipeline workloads.
//!
//! Pipevault moves tabular data between a relational store and an in-memory
//! [`TabularResult`], without owning any particular database driver. A
//! dialect supplies the connection and the parameter escaping (the
//! [`SafeRenderer`] capability); this crate supplies everything above that
//! line: transaction scoping, chunked id queries, `union all` keyed queries,
//! and pre-run table existence checks.
//!
//! # Examples
//!
//! ```ignore
//! use pipevault::{Params, Persistor, Value};
//!
//! // `MyPersistor` implements `SafeRenderer` and `Persistor` over a driver.
//! let persistor = MyPersistor::new(config)?;
//!
//! let scores = persistor.with_rollback(|cur| {
//!     persistor.check(cur, |err| matches!(err, pipevault::PersistError::Driver(_)))?;
//!     persistor.table_from_query_by_ids(
//!         cur,
//!         "select id, score from runs.scores where id = any(%(ids)s)",
//!         &ids,
//!         &Default::default(),
//!         pipevault::CHUNK_SIZE,
//!     )
//! })?;
//! ```

pub mod asset;
pub mod connection;
pub mod core;
pub mod persistor;
pub mod result;
pub mod utils;

// Re-export main types for convenience
pub use crate::core::{Params, PersistError, Result, Row, Value};
pub use asset::Asset;
pub use connection::{
    Connection, Cursor,
    config::{DialectConfig, PersistorConfig},
};
pub use persistor::{CHUNK_SIZE, Persistor, SafeRenderer, events};
pub use result::TabularResult;
