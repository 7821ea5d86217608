//! Scripted mock dialect shared by the integration suites.
//!
//! The mock records every execution and transaction transition in a shared
//! state block, so tests can assert exact call counts and statement text.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use pipevault::{
    Asset, Connection, Cursor, Params, PersistError, Persistor, Result, Row, SafeRenderer, Value,
};

#[derive(Debug, Clone)]
pub struct Executed {
    pub statement: String,
    pub params: Params,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub executed: Vec<Executed>,
    pub commits: usize,
    pub rollbacks: usize,
    pub closes: usize,
    pub cursors_opened: usize,
    /// Substrings that make `execute` fail with a driver error.
    pub fail_statements: Vec<String>,
    /// Queued results consumed in order, ahead of the default behaviors.
    pub scripted: VecDeque<(Vec<String>, Vec<Row>)>,
    pub fail_commit: bool,
    last_columns: Vec<String>,
    last_rows: Vec<Row>,
}

pub struct MockCursor {
    state: Arc<Mutex<MockState>>,
}

impl Cursor for MockCursor {
    fn execute(&mut self, statement: &str, params: &Params) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(Executed {
            statement: statement.to_string(),
            params: params.clone(),
        });

        for marker in &state.fail_statements {
            if statement.contains(marker.as_str()) {
                return Err(PersistError::Driver(format!("relation not found: {marker}")));
            }
        }

        if let Some((columns, rows)) = state.scripted.pop_front() {
            state.last_columns = columns;
            state.last_rows = rows;
            return Ok(());
        }

        if let Params::Named(named) = params {
            if let Some(Value::Array(ids)) = named.get("ids") {
                state.last_columns = vec!["id".to_string()];
                state.last_rows = ids.iter().map(|id| vec![id.clone()]).collect();
                return Ok(());
            }
        }

        if statement.contains("select 1") {
            state.last_columns = vec!["n".to_string()];
            state.last_rows = vec![vec![Value::Integer(1)]];
            return Ok(());
        }

        state.last_columns = Vec::new();
        state.last_rows = Vec::new();
        Ok(())
    }

    fn fetchall(&mut self) -> Result<Vec<Row>> {
        let mut state = self.state.lock().unwrap();
        Ok(std::mem::take(&mut state.last_rows))
    }

    fn description(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.last_columns.clone())
    }
}

pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    finalized: bool,
}

impl Connection for MockConnection {
    type Cursor = MockCursor;

    fn cursor(&mut self) -> Result<MockCursor> {
        let mut state = self.state.lock().unwrap();
        state.cursors_opened += 1;
        Ok(MockCursor {
            state: Arc::clone(&self.state),
        })
    }

    fn commit(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_commit {
            return Err(PersistError::Driver("commit refused".to_string()));
        }
        state.commits += 1;
        self.finalized = true;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.rollbacks += 1;
        self.finalized = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.closes += 1;
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        if !self.finalized {
            let mut state = self.state.lock().unwrap();
            state.rollbacks += 1;
        }
    }
}

/// Render a value as a sql literal with single quotes doubled. Stands in
/// for a driver's escaping in tests.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Array(items) => items
            .iter()
            .map(literal)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

pub struct MockPersistor {
    pub state: Arc<Mutex<MockState>>,
    sql: Asset,
    tables: Vec<String>,
    _dir: TempDir,
}

impl MockPersistor {
    pub fn new(tables: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("extant.sql"),
            "select 1 as n where exists (select 1 as n from {table})\n",
        )
        .unwrap();
        let sql = Asset::build(dir.path(), ".sql").unwrap();
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            sql,
            tables: tables.iter().map(|t| t.to_string()).collect(),
            _dir: dir,
        }
    }

    pub fn cursor(&self) -> MockCursor {
        MockCursor {
            state: Arc::clone(&self.state),
        }
    }
}

impl SafeRenderer for MockPersistor {
    type Cursor = MockCursor;

    fn render(&self, _cur: &mut MockCursor, fragment: &str, params: &Params) -> Result<Vec<u8>> {
        match params {
            Params::None => Ok(fragment.as_bytes().to_vec()),
            Params::Positional(values) => {
                let mut out = String::new();
                let mut rest = fragment;
                for value in values {
                    let Some(idx) = rest.find("%s") else {
                        return Err(PersistError::Render(
                            "more values than placeholders".to_string(),
                        ));
                    };
                    out.push_str(&rest[..idx]);
                    out.push_str(&literal(value));
                    rest = &rest[idx + 2..];
                }
                out.push_str(rest);
                Ok(out.into_bytes())
            }
            Params::Named(entries) => {
                let mut out = fragment.to_string();
                for (name, value) in entries {
                    out = out.replace(&format!("%({name})s"), &literal(value));
                }
                Ok(out.into_bytes())
            }
        }
    }
}

impl Persistor for MockPersistor {
    type Connection = MockConnection;

    fn connect(&self) -> Result<MockConnection> {
        Ok(MockConnection {
            state: Arc::clone(&self.state),
            finalized: false,
        })
    }

    fn sql(&self) -> &Asset {
        &self.sql
    }

    fn tables(&self) -> &[String] {
        &self.tables
    }
}

/// The usual recoverable-error set for `check`: driver failures only.
pub fn driver_only(err: &PersistError) -> bool {
    matches!(err, PersistError::Driver(_))
}

/// Named parameters shorthand.
pub fn named(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
