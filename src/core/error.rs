use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Not a sql identifier: '{0}'")]
    InvalidIdentifier(String),

    #[error("Parameter ids must not be empty")]
    EmptyIds,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Tables failed existence check: {0:?}")]
    TablesError(Vec<String>),

    #[error("Existence check for table '{0}' did not return a single 1")]
    ExtantMismatch(String),

    #[error("Sql template '{0}' not found")]
    TemplateNotFound(String),

    #[error("No union clause for placeholder '{0}'")]
    MissingKeyClause(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, PersistError>;

impl From<std::io::Error> for PersistError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
