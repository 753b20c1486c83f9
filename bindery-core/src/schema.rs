//! Schema metadata: tables, columns, and DDL generation.
//!
//! [`Metadata`] is a single owned registry of tables, passed explicitly to
//! every registration call. There is no ambient global table map.

use std::collections::BTreeMap;

/// SQL dialect, affecting identifier quoting and type rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Generic ANSI-ish SQL (default).
    Generic,
    Sqlite,
    MySql,
    Postgres,
}

impl Dialect {
    /// Infer the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Dialect {
        let scheme = url.split(':').next().unwrap_or("");
        match scheme {
            "sqlite" => Dialect::Sqlite,
            "postgres" | "postgresql" => Dialect::Postgres,
            s if s.starts_with("mysql") || s.starts_with("mariadb") => Dialect::MySql,
            _ => Dialect::Generic,
        }
    }

    fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Generic | Dialect::Sqlite | Dialect::Postgres => '"',
        }
    }

    fn quote(self, ident: &str) -> String {
        let q = self.quote_char();
        format!("{q}{ident}{q}")
    }
}

/// Column type, rendered per dialect when generating DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    BigInt,
    Real,
    Text,
    Varchar(u32),
    Boolean,
    Timestamp,
    Blob,
}

impl SqlType {
    fn render(&self, dialect: Dialect) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => match dialect {
                Dialect::Sqlite => "REAL".to_string(),
                Dialect::MySql => "DOUBLE".to_string(),
                Dialect::Generic | Dialect::Postgres => "DOUBLE PRECISION".to_string(),
            },
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({len})"),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Blob => match dialect {
                Dialect::Postgres => "BYTEA".to_string(),
                _ => "BLOB".to_string(),
            },
        }
    }
}

/// A column declaration.
///
/// Columns are nullable by default; marking one as a primary key makes it
/// `NOT NULL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub nullable: bool,
    pub unique: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Column {
            name: name.into(),
            sql_type,
            primary_key: false,
            nullable: true,
            unique: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn render(&self, dialect: Dialect) -> String {
        let mut out = format!("{} {}", dialect.quote(&self.name), self.sql_type.render(dialect));
        if !self.nullable {
            out.push_str(" NOT NULL");
        }
        if self.unique {
            out.push_str(" UNIQUE");
        }
        out
    }
}

/// A storage table: name, columns, and the bind key routing it to an engine.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    bind_key: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Table {
            name: name.into(),
            columns,
            bind_key: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The bind key routing this table to an engine; `None` is the default
    /// bind.
    pub fn bind_key(&self) -> Option<&str> {
        self.bind_key.as_deref()
    }

    pub fn set_bind_key(&mut self, key: Option<String>) {
        self.bind_key = key;
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    /// Add columns not already present; existing declarations win.
    pub fn merge_columns(&mut self, columns: Vec<Column>) {
        for column in columns {
            if self.column(&column.name).is_none() {
                self.columns.push(column);
            }
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table.
    pub fn create_sql(&self, dialect: Dialect) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(|c| c.render(dialect)).collect();
        let pk: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| dialect.quote(&c.name))
            .collect();
        if !pk.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            dialect.quote(&self.name),
            parts.join(", ")
        )
    }

    /// `DROP TABLE IF EXISTS` statement for this table.
    pub fn drop_sql(&self, dialect: Dialect) -> String {
        format!("DROP TABLE IF EXISTS {}", dialect.quote(&self.name))
    }
}

/// The owned table registry shared by all models of one facade.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    tables: BTreeMap<String, Table>,
}

impl Metadata {
    pub fn new() -> Self {
        Metadata::default()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub(crate) fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Insert a table, replacing any previous table of the same name.
    ///
    /// Registration goes through the model pipeline, which checks for an
    /// existing table first; direct inserts are for reflected/pre-existing
    /// tables.
    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Tables routed to the given bind key.
    pub fn tables_for_bind(&self, bind: Option<&str>) -> Vec<&Table> {
        self.tables
            .values()
            .filter(|t| t.bind_key() == bind)
            .collect()
    }
}
