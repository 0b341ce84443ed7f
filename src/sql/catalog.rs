//! DDL table catalog.
//!
//! The linter needs to know which columns physically exist. DDL arrives as
//! one `ddl.sql` file whose first comment names the dialect (`-- mysql`,
//! `-- postgres`, ...); the file is parsed with the matching sqlparser
//! dialect and exposed through the [`TableCatalog`] trait so the linter
//! never sees parser details.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use sqlparser::ast as sp;
use sqlparser::dialect::{
    BigQueryDialect, Dialect as SpDialect, DuckDbDialect, GenericDialect, MsSqlDialect,
    MySqlDialect, PostgreSqlDialect, SQLiteDialect, SnowflakeDialect,
};
use sqlparser::parser::Parser;
use thiserror::Error;

/// Dialect markers accepted at the top of ddl.sql.
pub const SUPPORTED_DDL_DIALECTS: &[&str] = &[
    "mysql",
    "postgres",
    "postgresql",
    "sqlite",
    "oracle",
    "tsql",
    "mssql",
    "bigquery",
    "snowflake",
    "duckdb",
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("DDL file not found: {0}")]
    NotFound(String),

    #[error(
        "ddl.sql must start with a dialect comment such as '-- mysql'; \
         supported dialects: {supported}"
    )]
    MissingDialect { supported: String },

    #[error("unsupported DDL dialect '{dialect}'; supported dialects: {supported}")]
    UnsupportedDialect { dialect: String, supported: String },

    #[error("failed to parse ddl.sql: {0}")]
    Parse(String),

    #[error("failed to read DDL: {0}")]
    Io(#[from] std::io::Error),
}

/// A column extracted from DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub comment: Option<String>,
}

/// A table extracted from DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// The typed table-column model the linter consumes.
pub trait TableCatalog {
    fn tables(&self) -> &[TableInfo];

    /// Column-name sets keyed by fully-qualified (database, schema, table).
    fn qualified_columns(&self) -> BTreeMap<(String, String, String), BTreeSet<String>> {
        let mut map = BTreeMap::new();
        for table in self.tables() {
            let key = (
                table.database.clone().unwrap_or_default(),
                table.schema.clone().unwrap_or_default(),
                table.name.clone(),
            );
            let entry: &mut BTreeSet<String> = map.entry(key).or_default();
            entry.extend(table.columns.iter().map(|c| c.name.clone()));
        }
        map
    }

    /// Column-name sets keyed by bare table name.
    fn short_columns(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut map = BTreeMap::new();
        for table in self.tables() {
            let entry: &mut BTreeSet<String> = map.entry(table.name.clone()).or_default();
            entry.extend(table.columns.iter().map(|c| c.name.clone()));
        }
        map
    }
}

/// sqlparser-backed catalog provider.
#[derive(Debug, Clone, Default)]
pub struct DdlCatalog {
    tables: Vec<TableInfo>,
}

impl TableCatalog for DdlCatalog {
    fn tables(&self) -> &[TableInfo] {
        &self.tables
    }
}

impl DdlCatalog {
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_sql(&text)
    }

    pub fn from_sql(ddl: &str) -> Result<Self, CatalogError> {
        let marker = parse_dialect_comment(ddl)?;
        let dialect = sqlparser_dialect_for(&marker);
        tracing::debug!(dialect = %marker, "parsing DDL");

        let statements = Parser::parse_sql(dialect.as_ref(), ddl)
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut tables = Vec::new();
        for statement in statements {
            if let sp::Statement::CreateTable(create) = statement {
                tables.push(lower_create_table(create));
            }
        }
        Ok(Self { tables })
    }
}

/// Read the dialect marker from the first comment lines of the DDL.
pub fn parse_dialect_comment(ddl: &str) -> Result<String, CatalogError> {
    let supported = SUPPORTED_DDL_DIALECTS.join(", ");
    for line in ddl.lines().take(10) {
        let stripped = line.trim();
        if let Some(rest) = stripped.strip_prefix("--") {
            let candidate = rest.trim().to_ascii_lowercase();
            if candidate.is_empty() {
                continue;
            }
            if SUPPORTED_DDL_DIALECTS.contains(&candidate.as_str()) {
                return Ok(candidate);
            }
            return Err(CatalogError::UnsupportedDialect {
                dialect: candidate,
                supported,
            });
        }
    }
    Err(CatalogError::MissingDialect { supported })
}

fn sqlparser_dialect_for(marker: &str) -> Box<dyn SpDialect> {
    match marker {
        "mysql" => Box::new(MySqlDialect {}),
        "postgres" | "postgresql" => Box::new(PostgreSqlDialect {}),
        "sqlite" => Box::new(SQLiteDialect {}),
        "duckdb" => Box::new(DuckDbDialect {}),
        "bigquery" => Box::new(BigQueryDialect {}),
        "snowflake" => Box::new(SnowflakeDialect {}),
        "mssql" | "tsql" => Box::new(MsSqlDialect {}),
        // Oracle DDL mostly parses under the generic dialect.
        _ => Box::new(GenericDialect {}),
    }
}

fn lower_create_table(create: sp::CreateTable) -> TableInfo {
    let mut parts: Vec<String> = create
        .name
        .0
        .iter()
        .filter_map(|p| p.as_ident())
        .map(|i| i.value.clone())
        .collect();
    let name = parts.pop().unwrap_or_default();
    let schema = parts.pop();
    let database = parts.pop();

    let columns = create
        .columns
        .iter()
        .map(|col| {
            let mut nullable = true;
            let mut comment = None;
            for option in &col.options {
                match &option.option {
                    sp::ColumnOption::NotNull => nullable = false,
                    sp::ColumnOption::Unique { is_primary, .. } if *is_primary => nullable = false,
                    sp::ColumnOption::Comment(text) => comment = Some(text.clone()),
                    _ => {}
                }
            }
            ColumnInfo {
                name: col.name.value.clone(),
                data_type: col.data_type.to_string(),
                nullable,
                comment,
            }
        })
        .collect();

    TableInfo {
        database,
        schema,
        name,
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DDL: &str = "-- mysql\nCREATE TABLE orders (\n  id BIGINT NOT NULL,\n  amount DECIMAL(18, 2),\n  region VARCHAR(32)\n);\n";

    #[test]
    fn test_parse_dialect_comment() {
        assert_eq!(parse_dialect_comment(DDL).unwrap(), "mysql");
        assert!(matches!(
            parse_dialect_comment("CREATE TABLE t (a INT);"),
            Err(CatalogError::MissingDialect { .. })
        ));
        assert!(matches!(
            parse_dialect_comment("-- teradata\nCREATE TABLE t (a INT);"),
            Err(CatalogError::UnsupportedDialect { .. })
        ));
    }

    #[test]
    fn test_parse_create_table() {
        let catalog = DdlCatalog::from_sql(DDL).unwrap();
        assert_eq!(catalog.tables().len(), 1);
        let table = &catalog.tables()[0];
        assert_eq!(table.name, "orders");
        assert_eq!(table.columns.len(), 3);
        assert!(!table.columns[0].nullable);
        assert!(table.columns[1].nullable);
    }

    #[test]
    fn test_short_columns_map() {
        let catalog = DdlCatalog::from_sql(DDL).unwrap();
        let short = catalog.short_columns();
        let cols = short.get("orders").unwrap();
        assert!(cols.contains("amount"));
        assert!(cols.contains("region"));
    }
}
