//! Schema store client: the catalog the DDL operator reads and writes.
//!
//! The store holds table schema records keyed by name and the catalog-wide
//! `max_used_table_id` counter. It offers no multi-step transactions and its
//! writes may not be immediately visible to later reads, so callers verify
//! every write by reading it back.

pub mod file;
pub mod lock;
pub mod memory;

pub use file::FileSchemaStore;
pub use memory::{Faults, MemorySchemaStore};

use crate::error::StoreError;
use crate::types::{AlterTableSchema, TableId, TableSchema};

/// Abstraction over a remote schema catalog.
///
/// Lookups return `Ok(None)` when the entry does not exist; `Err` means the
/// store could not answer.
pub trait SchemaStore: Send + Sync {
    fn get_max_used_table_id(&self) -> Result<TableId, StoreError>;
    fn set_max_used_table_id(&self, table_id: TableId) -> Result<(), StoreError>;

    /// Persist a new table. The schema's `table_id` must be assigned.
    fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError>;
    fn drop_table(&self, table_name: &str) -> Result<(), StoreError>;

    fn get_table_id(&self, table_name: &str) -> Result<Option<TableId>, StoreError>;
    fn get_table_name(&self, table_id: TableId) -> Result<Option<String>, StoreError>;
    fn get_table_schema(&self, table_name: &str) -> Result<Option<TableSchema>, StoreError>;

    /// Apply a validated change-set, failing with `VersionConflict` when the
    /// stored `schema_version` is no longer `expected_version`.
    fn alter_table(
        &self,
        alter: &AlterTableSchema,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    /// Move `schema` (looked up by name) to `new_table_id`.
    fn modify_table_id(&self, schema: &TableSchema, new_table_id: TableId)
    -> Result<(), StoreError>;
}

/// Catalog contents shared by the bundled store implementations.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct CatalogImage {
    pub(crate) max_used_table_id: TableId,
    pub(crate) tables: std::collections::BTreeMap<String, TableSchema>,
}

impl CatalogImage {
    pub(crate) fn new(max_used_table_id: TableId) -> Self {
        Self {
            max_used_table_id,
            tables: Default::default(),
        }
    }

    pub(crate) fn name_of(&self, table_id: TableId) -> Option<&str> {
        self.tables
            .values()
            .find(|t| t.table_id == Some(table_id))
            .map(|t| t.table_name.as_str())
    }

    pub(crate) fn insert(&mut self, schema: &TableSchema) -> Result<(), StoreError> {
        let table_id = schema.table_id.ok_or_else(|| {
            StoreError::Corrupted(format!("table '{}' has no table id", schema.table_name))
        })?;
        if self.tables.contains_key(&schema.table_name) {
            return Err(StoreError::TableAlreadyExists(schema.table_name.clone()));
        }
        if self.name_of(table_id).is_some() {
            return Err(StoreError::TableIdInUse(table_id));
        }
        self.tables.insert(schema.table_name.clone(), schema.clone());
        Ok(())
    }

    pub(crate) fn remove(&mut self, table_name: &str) -> Result<TableSchema, StoreError> {
        self.tables
            .remove(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))
    }

    pub(crate) fn alter(
        &mut self,
        alter: &AlterTableSchema,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let schema = self
            .tables
            .get_mut(&alter.table_name)
            .ok_or_else(|| StoreError::TableNotFound(alter.table_name.clone()))?;
        if schema.schema_version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: schema.schema_version,
            });
        }
        schema.apply_alter(alter);
        Ok(())
    }

    pub(crate) fn modify_id(
        &mut self,
        table_name: &str,
        new_table_id: TableId,
    ) -> Result<(), StoreError> {
        if self.name_of(new_table_id).is_some() {
            return Err(StoreError::TableIdInUse(new_table_id));
        }
        let schema = self
            .tables
            .get_mut(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        schema.table_id = Some(new_table_id);
        for join in &mut schema.join_info {
            join.left_table_id = new_table_id;
        }
        Ok(())
    }
}
