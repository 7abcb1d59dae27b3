//! Declarative model bases.
//!
//! A [`Base`] collects the table definitions of an application. Database
//! handles use it to create and drop those tables, and the registry remembers
//! which base belongs to which alias.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{DbError, DbResult};
use crate::manager::DbManager;
use crate::models::DriverType;

/// A column definition. The SQL type is passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: String,
    pub primary_key: bool,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            primary_key: false,
            nullable: true,
            unique: false,
            default: None,
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

    /// Default value as a raw SQL expression.
    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    fn definition(&self, driver: DriverType, inline_primary_key: bool) -> String {
        let mut def = format!("{} {}", driver.quote_ident(&self.name), self.sql_type);
        if self.primary_key && inline_primary_key {
            def.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if self.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        def
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// `CREATE TABLE` statement for the given dialect.
    ///
    /// A single primary key column is declared inline; composite keys become a
    /// table constraint.
    pub fn create_sql(&self, driver: DriverType, checkfirst: bool) -> String {
        let primary: Vec<&Column> = self.columns.iter().filter(|c| c.primary_key).collect();
        let inline = primary.len() == 1;

        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.definition(driver, inline))
            .collect();
        if primary.len() > 1 {
            let keys: Vec<String> = primary
                .iter()
                .map(|c| driver.quote_ident(&c.name))
                .collect();
            defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        format!(
            "CREATE TABLE {}{} ({})",
            if checkfirst { "IF NOT EXISTS " } else { "" },
            driver.quote_ident(&self.name),
            defs.join(", ")
        )
    }

    /// `DROP TABLE` statement for the given dialect.
    pub fn drop_sql(&self, driver: DriverType, checkfirst: bool) -> String {
        format!(
            "DROP TABLE {}{}",
            if checkfirst { "IF EXISTS " } else { "" },
            driver.quote_ident(&self.name)
        )
    }
}

/// Root of a set of table definitions.
#[derive(Debug)]
pub struct Base {
    name: String,
    tables: RwLock<Vec<Table>>,
}

impl Base {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a table. Table names are unique within a base.
    pub fn add_table(&self, table: Table) -> DbResult<()> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if tables.iter().any(|t| t.name == table.name) {
            return Err(DbError::invalid_input(format!(
                "Table '{}' is already defined for base '{}'",
                table.name, self.name
            )));
        }
        tables.push(table);
        Ok(())
    }

    /// All tables in declaration order.
    pub fn tables(&self) -> Vec<Table> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables().into_iter().map(|t| t.name).collect()
    }

    /// Tables restricted to `names` (all tables when `None`), in declaration order.
    pub fn select_tables(&self, names: Option<&[&str]>) -> DbResult<Vec<Table>> {
        let tables = self.tables();
        let Some(names) = names else {
            return Ok(tables);
        };
        if let Some(unknown) = names
            .iter()
            .find(|name| !tables.iter().any(|t| t.name == **name))
        {
            return Err(DbError::invalid_input(format!(
                "Table '{}' is not defined for base '{}'",
                unknown, self.name
            )));
        }
        Ok(tables
            .into_iter()
            .filter(|t| names.contains(&t.name.as_str()))
            .collect())
    }
}

/// Create a base and make it the process-wide default if none is set yet.
pub fn declarative_base(name: impl Into<String>) -> Arc<Base> {
    let base = Arc::new(Base::new(name));
    DbManager::global().set_default_base_if_unset(Arc::clone(&base));
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tclass() -> Table {
        Table::new("tclass").column(Column::new("id", "INTEGER").primary_key())
    }

    #[test]
    fn test_create_sql_single_key() {
        assert_eq!(
            tclass().create_sql(DriverType::Sqlite3, true),
            "CREATE TABLE IF NOT EXISTS \"tclass\" (\"id\" INTEGER PRIMARY KEY)"
        );
    }

    #[test]
    fn test_create_sql_composite_key_mysql() {
        let table = Table::new("link")
            .column(Column::new("a", "INT").primary_key())
            .column(Column::new("b", "INT").primary_key())
            .column(Column::new("note", "VARCHAR(20)").default_value("''"));
        assert_eq!(
            table.create_sql(DriverType::MySql, false),
            "CREATE TABLE `link` (`a` INT NOT NULL, `b` INT NOT NULL, `note` VARCHAR(20) DEFAULT '', PRIMARY KEY (`a`, `b`))"
        );
    }

    #[test]
    fn test_drop_sql() {
        assert_eq!(
            tclass().drop_sql(DriverType::NoSpecific, true),
            "DROP TABLE IF EXISTS \"tclass\""
        );
    }

    #[test]
    fn test_base_rejects_duplicate_tables() {
        let base = Base::new("Base");
        base.add_table(tclass()).unwrap();
        assert!(base.add_table(tclass()).is_err());
        assert_eq!(base.table_names(), vec!["tclass".to_string()]);
    }

    #[test]
    fn test_select_tables() {
        let base = Base::new("Base");
        base.add_table(tclass()).unwrap();
        base.add_table(Table::new("other").column(Column::new("x", "TEXT")))
            .unwrap();
        let selected = base.select_tables(Some(&["other"][..])).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(base.select_tables(None).unwrap().len(), 2);
        assert!(base.select_tables(Some(&["missing"][..])).is_err());
    }
}
