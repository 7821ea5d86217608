//! Stable structured log event keys.
//!
//! Consumed by external log infrastructure; defined once here so call
//! sites cannot drift. Emitted as the `key` field of `tracing` events.

pub const OPEN: &str = "persistor.open";
pub const CLOSE: &str = "persistor.close";
pub const COMMIT: &str = "persistor.commit";
pub const ROLLBACK: &str = "persistor.rollback";
pub const CHECK_ON: &str = "persistor.check.on";
pub const CHECK_END: &str = "persistor.check.end";
pub const EXTANT: &str = "persistor.sql.extant";
pub const TABLE_ERROR: &str = "persistor.table.error";
pub const TABLES_ERROR: &str = "persistor.tables.error";
pub const ARTIFACT: &str = "persistor.sql.artifact";
