use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::core::{PersistError, Result};
use crate::persistor::is_sql_identifier;

/// Persistor connection parameters.
///
/// Immutable once handed to a persistor. Round-trippable through serde;
/// the sql asset serializes as its directory reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistorConfig {
    /// Database name
    pub database: String,

    /// Database host
    pub host: String,

    /// Password for authentication
    pub password: String,

    /// Database port
    pub port: u16,

    /// Named sql templates, notably the `extant` probe
    pub sql: Asset,

    /// Governed table names checked before a pipeline run
    pub tables: Vec<String>,

    /// Username for authentication
    pub username: String,
}

impl PersistorConfig {
    pub fn new(username: &str, password: &str, sql: Asset) -> Self {
        Self {
            database: "pipeline".to_string(),
            host: "localhost".to_string(),
            password: password.to_string(),
            port: 5432,
            sql,
            tables: Vec::new(),
            username: username.to_string(),
        }
    }

    /// Set the database name
    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    /// Set the host
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the governed table list
    pub fn tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(PersistError::InvalidArgument(
                "username cannot be empty".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(PersistError::InvalidArgument(
                "password cannot be empty".to_string(),
            ));
        }
        if self.database.is_empty() {
            return Err(PersistError::InvalidArgument(
                "database cannot be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(PersistError::InvalidArgument(
                "port must be nonzero".to_string(),
            ));
        }
        for table in &self.tables {
            if !is_sql_identifier(table) {
                return Err(PersistError::InvalidIdentifier(table.clone()));
            }
        }
        Ok(())
    }
}

/// Persistor configuration under a distinct tag per concrete dialect.
///
/// The tag keeps serialized configurations self-describing: loaders pick
/// the dialect from the document instead of from out-of-band knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dialect", rename_all = "lowercase")]
pub enum DialectConfig {
    Postgres(PersistorConfig),
    Mssql(PersistorConfig),
}

impl DialectConfig {
    pub fn config(&self) -> &PersistorConfig {
        match self {
            Self::Postgres(config) | Self::Mssql(config) => config,
        }
    }
}
