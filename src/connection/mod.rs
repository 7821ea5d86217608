pub mod config;

use crate::core::{Params, Result, Row};

/// Cursor capability contract.
///
/// A cursor executes statements and fetches their results. How parameters
/// are bound — placeholder syntax, array binding for `ids` chunks — is the
/// dialect's concern; the persistence layer only hands them over.
pub trait Cursor {
    fn execute(&mut self, statement: &str, params: &Params) -> Result<()>;

    /// Fetch all rows produced by the last execution.
    fn fetchall(&mut self) -> Result<Vec<Row>>;

    /// Column names of the last executed statement.
    fn description(&self) -> Result<Vec<String>>;
}

/// Connection capability contract.
///
/// Scoped and released by the transaction scope manager; a connection is
/// never held beyond the scope that acquired it. Implementations must roll
/// back any open transaction when dropped, so that panic unwinding cannot
/// leak a held transaction.
pub trait Connection {
    type Cursor: Cursor;

    fn cursor(&mut self) -> Result<Self::Cursor>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}
