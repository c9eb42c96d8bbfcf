//! Database access for the batch flow
//!
//! Ingestion reads through each dialect's native driver so every column type
//! the server knows can be decoded. Write-back goes through sqlx's `Any`
//! driver, which only ever binds integers, floats, booleans and text. Values
//! are always bound as statement parameters; table and column names cannot be
//! bound, so they are validated as plain identifiers instead.

pub mod ingest;

pub use ingest::ingest;

use predictor_common::{Error, Result};
use reqwest::Url;
use serde::Deserialize;
use sqlx::{AnyConnection, Connection};
use std::fmt;
use std::sync::Once;

/// SQL dialect selected by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// `"postgres"` and `"sqlite"` select those dialects; any other name is MySQL
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Dialect::Postgres,
            "sqlite" => Dialect::Sqlite,
            _ => Dialect::MySql,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Bind placeholder for the `n`th (1-based) parameter
    fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Server coordinates and credentials
///
/// For SQLite, `database` is the database file path and the rest is ignored.
#[derive(Clone, Default, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub port: Option<u16>,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

impl ConnectionParams {
    /// Connection URL for `dialect`, with credentials percent-encoded
    pub fn url(&self, dialect: Dialect) -> Result<String> {
        if dialect == Dialect::Sqlite {
            if self.database.trim().is_empty() {
                return Err(Error::Validation(
                    "sqlite requires the database file path".to_string(),
                ));
            }
            return Ok(format!("sqlite://{}?mode=rw", self.database));
        }

        if self.host.trim().is_empty() {
            return Err(Error::Validation(format!("{} requires a host", dialect)));
        }

        let scheme = match dialect {
            Dialect::Postgres => "postgres",
            _ => "mysql",
        };
        let invalid = |what: &str| Error::Validation(format!("invalid {} for {}", what, dialect));

        let mut url = Url::parse(&format!("{}://localhost", scheme)).map_err(|_| invalid("url"))?;
        url.set_host(Some(self.host.trim()))
            .map_err(|_| invalid("host"))?;
        if !self.username.is_empty() {
            url.set_username(&self.username)
                .map_err(|_| invalid("username"))?;
        }
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| invalid("password"))?;
        }
        url.set_port(self.port).map_err(|_| invalid("port"))?;
        if !self.database.is_empty() {
            url.set_path(&self.database);
        }

        Ok(url.to_string())
    }
}

/// Table and columns a database batch operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTarget {
    table: String,
    id_column: String,
    target_column: String,
}

impl BatchTarget {
    /// Validate the names; the table may be schema-qualified (`schema.table`)
    pub fn new(
        table: impl Into<String>,
        id_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Result<Self> {
        let target = Self {
            table: table.into().trim().to_string(),
            id_column: id_column.into().trim().to_string(),
            target_column: target_column.into().trim().to_string(),
        };

        for part in target.table.split('.') {
            validate_identifier("table", part)?;
        }
        if target.table.split('.').count() > 2 {
            return Err(Error::Validation(format!(
                "table name '{}' has too many qualifiers",
                target.table
            )));
        }
        validate_identifier("identifier column", &target.id_column)?;
        validate_identifier("target column", &target.target_column)?;

        Ok(target)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// MySQL tables are qualified with the database name when one is given
    fn qualified_table(&self, dialect: Dialect, params: &ConnectionParams) -> String {
        let database = params.database.trim();
        if dialect == Dialect::MySql && !database.is_empty() && !self.table.contains('.') {
            format!("{}.{}", database, self.table)
        } else {
            self.table.clone()
        }
    }

    /// Rows whose target column still needs a prediction
    pub fn select_missing_sql(&self, dialect: Dialect, params: &ConnectionParams) -> String {
        format!(
            "SELECT * FROM {} WHERE {} IS NULL",
            self.qualified_table(dialect, params),
            self.target_column
        )
    }

    /// Write one prediction; binds (prediction, id)
    pub fn update_sql(&self, dialect: Dialect, params: &ConnectionParams) -> String {
        format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            self.qualified_table(dialect, params),
            self.target_column,
            dialect.placeholder(1),
            self.id_column,
            dialect.placeholder(2)
        )
    }
}

/// Accept `[A-Za-z_][A-Za-z0-9_]*` only
///
/// MySQL database names are validated too because they end up qualifying the
/// table name.
pub fn validate_identifier(what: &str, ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} '{}' is not a valid SQL identifier",
            what, ident
        )))
    }
}

pub(crate) fn ingestion_error(dialect: Dialect, cause: impl fmt::Display) -> Error {
    Error::Ingestion {
        dialect: dialect.name().to_string(),
        cause: cause.to_string(),
    }
}

static INSTALL_DRIVERS: Once = Once::new();

/// Connection URL for `dialect`, with the MySQL database name validated
pub(crate) fn connection_url(dialect: Dialect, params: &ConnectionParams) -> Result<String> {
    if dialect == Dialect::MySql && !params.database.trim().is_empty() {
        validate_identifier("database", params.database.trim())?;
    }

    params.url(dialect)
}

/// Open a write-back connection for `dialect`
pub async fn connect(dialect: Dialect, params: &ConnectionParams) -> Result<AnyConnection> {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

    let url = connection_url(dialect, params)?;
    AnyConnection::connect(&url)
        .await
        .map_err(|e| ingestion_error(dialect, e))
}
