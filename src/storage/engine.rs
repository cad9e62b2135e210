//! Storage engine interface
//!
//! The engine executes table operations against compiled `TableDef`s and
//! hands back rows of native `DbValue`s. It knows nothing about warehouses,
//! validation or wire formats.

use super::errors::StorageResult;
use super::table::TableDef;
use super::value::{DbValue, Row};

/// Equality predicate on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFilter {
    pub column: String,
    pub value: DbValue,
}

impl KeyFilter {
    pub fn new(column: impl Into<String>, value: impl Into<DbValue>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Window over a table scan. Rows come back in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Every row.
    pub fn all() -> Self {
        Self {
            offset: 0,
            limit: usize::MAX,
        }
    }
}

/// Physical table operations.
///
/// Implementations must be safe to share across request handlers.
pub trait StorageEngine: Send + Sync {
    /// Creates a table. Fails with `TableExists` if the name is taken.
    fn create_table(&self, def: &TableDef) -> StorageResult<()>;

    /// Creates a table unless one with the same name exists.
    /// Returns `true` if the table was created.
    fn create_table_if_not_exists(&self, def: &TableDef) -> StorageResult<bool>;

    /// Drops a table. Fails with `TableNotFound` if it is absent.
    fn drop_table(&self, name: &str) -> StorageResult<()>;

    fn table_exists(&self, name: &str) -> bool;

    /// Definition the table was created with.
    fn table_def(&self, name: &str) -> StorageResult<TableDef>;

    /// Inserts one row. Omitted columns receive their literal default or the
    /// next autoincrement value; the stored row is returned in full.
    fn insert(&self, table: &str, row: Row) -> StorageResult<Row>;

    /// Returns rows matching the optional filter within the page.
    fn select(&self, table: &str, filter: Option<&KeyFilter>, page: Page) -> StorageResult<Vec<Row>>;

    /// Applies `changes` to the rows matching `filter` and returns them.
    fn update(&self, table: &str, filter: &KeyFilter, changes: Row) -> StorageResult<Vec<Row>>;

    /// Deletes rows matching `filter`; returns the number removed.
    fn delete(&self, table: &str, filter: &KeyFilter) -> StorageResult<u64>;

    /// First row matching `filter`, if any.
    fn select_one(&self, table: &str, filter: &KeyFilter) -> StorageResult<Option<Row>> {
        Ok(self
            .select(table, Some(filter), Page::new(0, 1))?
            .into_iter()
            .next())
    }
}
