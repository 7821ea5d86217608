pub mod events;

use std::collections::BTreeMap;
use std::io::Write;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::asset::Asset;
use crate::connection::{Connection, Cursor};
use crate::core::{Params, PersistError, Result, Value};
use crate::result::TabularResult;

/// Default chunk size for id-based queries.
pub const CHUNK_SIZE: usize = 10_000;

lazy_static! {
    static ref SQL_IDENTIFIER: Regex = Regex::new("^[A-Za-z_][A-Za-z0-9_.]*$").unwrap();
    static ref KEY_PLACEHOLDER: Regex = Regex::new(r"\{[A-Za-z_][A-Za-z0-9_]*\}").unwrap();
}

/// Whether `name` is safe to interpolate into generated sql as a
/// table or schema identifier.
pub fn is_sql_identifier(name: &str) -> bool {
    SQL_IDENTIFIER.is_match(name)
}

/// Safe parameter renderer, implemented per dialect.
///
/// Escapes and substitutes `params` into `fragment` using the target
/// database's native escaping rules, returning the exact bytes that would
/// be sent to the server. The generic query-building in [`Persistor`] is
/// composed against this capability; it never escapes anything itself.
pub trait SafeRenderer {
    type Cursor: Cursor;

    fn render(
        &self,
        cur: &mut Self::Cursor,
        fragment: &str,
        params: &Params,
    ) -> Result<Vec<u8>>;
}

/// Transactional persistence over a dialect-supplied connection.
///
/// A dialect provides `connect` and the [`SafeRenderer`] capability; the
/// provided methods supply transaction scoping, existence checks, and the
/// dynamic query builders on top.
pub trait Persistor: SafeRenderer {
    type Connection: Connection<Cursor = Self::Cursor>;

    fn connect(&self) -> Result<Self::Connection>;

    /// Named sql templates for this persistor.
    fn sql(&self) -> &Asset;

    /// Governed table names checked before a pipeline run.
    fn tables(&self) -> &[String];

    /// Build the existence-probe statement for `table`.
    ///
    /// The table name must match the strict identifier pattern before it
    /// is interpolated; anything else is a caller error.
    fn extant(&self, table: &str) -> Result<String> {
        if !is_sql_identifier(table) {
            return Err(PersistError::InvalidIdentifier(table.to_string()));
        }
        let template = self.sql().get("extant")?;
        Ok(template.replace("{table}", table))
    }

    /// Probe every governed table, aggregating failures.
    ///
    /// `recoverable` classifies which errors mark a table failed while the
    /// scan continues — typically driver errors. Anything else propagates
    /// immediately. One bad table must not mask problems in the others, so
    /// the scan always finishes before reporting
    /// [`PersistError::TablesError`] with exactly the failed names.
    fn check<F>(&self, cur: &mut Self::Cursor, recoverable: F) -> Result<()>
    where
        F: Fn(&PersistError) -> bool,
    {
        info!(key = events::CHECK_ON);
        let mut errors: Vec<String> = Vec::new();
        for table in self.tables() {
            let probed = (|| {
                let statement = self.extant(table)?;
                info!(key = events::EXTANT, table = %table);
                debug!(key = events::EXTANT, statement = %statement);
                cur.execute(&statement, &Params::None)?;
                let rows = cur.fetchall()?;
                if rows.is_empty() {
                    return Err(PersistError::ExtantMismatch(table.clone()));
                }
                for row in &rows {
                    match row.first() {
                        Some(Value::Integer(1)) => {}
                        _ => return Err(PersistError::ExtantMismatch(table.clone())),
                    }
                }
                Ok(())
            })();
            match probed {
                Ok(()) => {}
                Err(err) if recoverable(&err) => {
                    warn!(key = events::TABLE_ERROR, table = %table);
                    errors.push(table.clone());
                }
                Err(err) => return Err(err),
            }
        }
        if !errors.is_empty() {
            warn!(key = events::TABLES_ERROR, tables = ?errors);
            return Err(PersistError::TablesError(errors));
        }
        info!(key = events::CHECK_END);
        Ok(())
    }

    /// Render a `union all select %s ...` clause, one fragment per key.
    fn union_all(&self, cur: &mut Self::Cursor, keys: &[Value]) -> Result<String> {
        let fragment = vec!["union all select %s"; keys.len()].join("\n    ");
        let rendered = self.render(cur, &fragment, &Params::Positional(keys.to_vec()))?;
        String::from_utf8(rendered).map_err(|err| PersistError::Render(err.to_string()))
    }

    /// Execute `query` with `parameters` bound and assemble the result.
    fn table_from_query(
        &self,
        cur: &mut Self::Cursor,
        query: &str,
        parameters: &Params,
    ) -> Result<TabularResult> {
        cur.execute(query, parameters)?;
        let rows = cur.fetchall()?;
        let columns = cur.description()?;
        Ok(TabularResult::new(columns, rows))
    }

    /// Execute `query` once per id chunk and assemble a combined result.
    ///
    /// Each chunk is bound as the `ids` parameter over `parameters`.
    /// Bounded chunks trade round-trips for planner stability: a naive
    /// `in (...)` with a large id list degrades planning and can hit
    /// driver parameter-count limits. Column names come from the cursor's
    /// description after the final chunk.
    fn table_from_query_by_ids(
        &self,
        cur: &mut Self::Cursor,
        query: &str,
        ids: &[Value],
        parameters: &BTreeMap<String, Value>,
        size: usize,
    ) -> Result<TabularResult> {
        if ids.is_empty() {
            // An empty id set used to fall through to the sql layer and
            // come back as a confusing no-rows-no-columns result.
            return Err(PersistError::EmptyIds);
        }
        if size == 0 {
            return Err(PersistError::InvalidArgument(
                "chunk size must be positive".to_string(),
            ));
        }
        let mut rows = Vec::new();
        for chunk in ids.chunks(size) {
            let mut bound = parameters.clone();
            bound.insert("ids".to_string(), Value::Array(chunk.to_vec()));
            cur.execute(query, &Params::Named(bound))?;
            rows.extend(cur.fetchall()?);
        }
        let columns = cur.description()?;
        Ok(TabularResult::new(columns, rows))
    }

    /// Substitute union-all clauses for each named key group, render the
    /// whole statement against `parameters`, and execute the resulting
    /// text directly.
    ///
    /// `query` uses `{name}` slots for key-group clauses and the dialect's
    /// placeholder syntax for `parameters`. Rendering happens in two
    /// passes: fragments first, then the substituted statement. A value
    /// whose rendered literal contains a placeholder-looking substring
    /// could in principle be reinterpreted by the second pass; the
    /// supported dialects' escaping keeps such substrings inside string
    /// literals, where their drivers do not interpolate.
    ///
    /// The fully rendered statement is written to a `.sql` tempfile for
    /// offline inspection before execution.
    fn table_from_query_by_keys(
        &self,
        cur: &mut Self::Cursor,
        query: &str,
        keys: &[(String, Vec<Value>)],
        parameters: &BTreeMap<String, Value>,
    ) -> Result<TabularResult> {
        let mut clauses: BTreeMap<&str, String> = BTreeMap::new();
        for (name, sequence) in keys {
            clauses.insert(name.as_str(), self.union_all(cur, sequence)?);
        }
        let substituted = substitute_key_clauses(query, &clauses)?;
        let rendered = self.render(cur, &substituted, &Params::Named(parameters.clone()))?;
        let statement =
            String::from_utf8(rendered).map_err(|err| PersistError::Render(err.to_string()))?;
        write_statement_artifact(&statement)?;
        cur.execute(&statement, &Params::None)?;
        let rows = cur.fetchall()?;
        let columns = cur.description()?;
        Ok(TabularResult::new(columns, rows))
    }

    /// Run `f` against a scoped cursor, committing on success.
    ///
    /// Any error from `f` or from the commit itself triggers a rollback
    /// and comes back unchanged;
    /// rollback or close failures on that path are logged and suppressed
    /// so the caller's error is never substituted. The connection is
    /// released on every exit path.
    fn with_commit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Cursor) -> Result<T>,
    {
        let mut con = self.connect()?;
        info!(key = events::OPEN);
        let mut cur = con.cursor()?;
        match f(&mut cur) {
            Ok(value) => {
                drop(cur);
                match con.commit() {
                    Ok(()) => {
                        info!(key = events::COMMIT);
                        con.close()?;
                        info!(key = events::CLOSE);
                        Ok(value)
                    }
                    Err(err) => {
                        match con.rollback() {
                            Ok(()) => info!(key = events::ROLLBACK),
                            Err(rollback_err) => {
                                warn!(key = events::ROLLBACK, error = %rollback_err);
                            }
                        }
                        release(&mut con);
                        Err(err)
                    }
                }
            }
            Err(err) => {
                drop(cur);
                match con.rollback() {
                    Ok(()) => info!(key = events::ROLLBACK),
                    Err(rollback_err) => {
                        warn!(key = events::ROLLBACK, error = %rollback_err);
                    }
                }
                release(&mut con);
                Err(err)
            }
        }
    }

    /// Run `f` against a scoped cursor, always rolling back on exit.
    ///
    /// For read-only or exploratory access where no durable effect is
    /// wanted regardless of outcome.
    fn with_rollback<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Cursor) -> Result<T>,
    {
        let mut con = self.connect()?;
        info!(key = events::OPEN);
        let mut cur = con.cursor()?;
        let result = f(&mut cur);
        drop(cur);
        match con.rollback() {
            Ok(()) => info!(key = events::ROLLBACK),
            Err(rollback_err) => {
                warn!(key = events::ROLLBACK, error = %rollback_err);
                if result.is_ok() {
                    release(&mut con);
                    return Err(rollback_err);
                }
            }
        }
        match result {
            Ok(value) => {
                con.close()?;
                info!(key = events::CLOSE);
                Ok(value)
            }
            Err(err) => {
                release(&mut con);
                Err(err)
            }
        }
    }
}

/// Close on an error path: the caller's error must survive, so a close
/// failure is logged instead of raised.
fn release<C: Connection>(con: &mut C) {
    match con.close() {
        Ok(()) => info!(key = events::CLOSE),
        Err(close_err) => warn!(key = events::CLOSE, error = %close_err),
    }
}

/// Replace each `{name}` slot in `query` with its union clause.
fn substitute_key_clauses(query: &str, clauses: &BTreeMap<&str, String>) -> Result<String> {
    let mut out = String::with_capacity(query.len());
    let mut last = 0;
    for slot in KEY_PLACEHOLDER.find_iter(query) {
        let name = &query[slot.start() + 1..slot.end() - 1];
        let clause = clauses
            .get(name)
            .ok_or_else(|| PersistError::MissingKeyClause(name.to_string()))?;
        out.push_str(&query[last..slot.start()]);
        out.push_str(clause);
        last = slot.end();
    }
    out.push_str(&query[last..]);
    Ok(out)
}

/// Write the fully rendered statement somewhere a human can find it.
fn write_statement_artifact(statement: &str) -> Result<()> {
    let mut file = tempfile::Builder::new()
        .prefix("statement-")
        .suffix(".sql")
        .tempfile()
        .map_err(|err| PersistError::Io(err.to_string()))?;
    file.write_all(statement.as_bytes())
        .map_err(|err| PersistError::Io(err.to_string()))?;
    let (_, path) = file
        .keep()
        .map_err(|err| PersistError::Io(err.to_string()))?;
    debug!(key = events::ARTIFACT, path = %path.display());
    Ok(())
}
