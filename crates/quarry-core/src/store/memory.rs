//! In-memory schema store with fault injection. Used for testing.

use parking_lot::Mutex;

use super::{CatalogImage, SchemaStore};
use crate::error::StoreError;
use crate::types::{AlterTableSchema, TableId, TableSchema};

/// Misbehaviours the in-memory store can be told to exhibit.
///
/// Each fault models a store whose writes are not immediately (or not
/// reliably) visible to subsequent reads.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// `set_max_used_table_id` reports success without storing anything.
    pub drop_max_id_writes: bool,
    /// `get_table_name` answers with this name for every id.
    pub name_readback_override: Option<String>,
    /// `get_table_name` fails.
    pub fail_name_reads: bool,
    /// `get_table_id` answers `None` for a newly created table this many times.
    pub hide_new_tables_for: u32,
    /// `drop_table` reports success but the row stays visible.
    pub keep_dropped_rows: bool,
    /// `create_table` applies the write but reports an error.
    pub fail_after_create: bool,
    /// The next mutating call fails without touching the catalog.
    pub fail_next_write: bool,
}

struct MemoryState {
    catalog: CatalogImage,
    faults: Faults,
    hidden_lookups_left: u32,
    lookups: u64,
}

/// Schema store backed by a `BTreeMap`.
pub struct MemorySchemaStore {
    state: Mutex<MemoryState>,
}

impl MemorySchemaStore {
    /// Create an empty catalog whose table-id high-water-mark starts at `max_used_table_id`.
    pub fn new(max_used_table_id: TableId) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                catalog: CatalogImage::new(max_used_table_id),
                faults: Faults::default(),
                hidden_lookups_left: 0,
                lookups: 0,
            }),
        }
    }

    pub fn set_faults(&self, faults: Faults) {
        self.state.lock().faults = faults;
    }

    pub fn table_count(&self) -> usize {
        self.state.lock().catalog.tables.len()
    }

    /// Number of `get_table_id` calls served so far.
    pub fn lookup_count(&self) -> u64 {
        self.state.lock().lookups
    }

    /// Bump a table's version behind the operator's back, as a racing
    /// coordinator would.
    pub fn bump_schema_version(&self, table_name: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let schema = state
            .catalog
            .tables
            .get_mut(table_name)
            .ok_or_else(|| StoreError::TableNotFound(table_name.to_string()))?;
        schema.schema_version += 1;
        Ok(())
    }

    fn take_write_fault(state: &mut MemoryState) -> Result<(), StoreError> {
        if std::mem::take(&mut state.faults.fail_next_write) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

impl Default for MemorySchemaStore {
    fn default() -> Self {
        Self::new(crate::types::DEFAULT_MAX_RESERVED_TABLE_ID)
    }
}

impl SchemaStore for MemorySchemaStore {
    fn get_max_used_table_id(&self) -> Result<TableId, StoreError> {
        Ok(self.state.lock().catalog.max_used_table_id)
    }

    fn set_max_used_table_id(&self, table_id: TableId) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        Self::take_write_fault(&mut state)?;
        if !state.faults.drop_max_id_writes {
            state.catalog.max_used_table_id = table_id;
        }
        Ok(())
    }

    fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        Self::take_write_fault(&mut state)?;
        state.catalog.insert(schema)?;
        state.hidden_lookups_left = state.faults.hide_new_tables_for;
        if state.faults.fail_after_create {
            return Err(StoreError::Unavailable("create acknowledgement lost".to_string()));
        }
        Ok(())
    }

    fn drop_table(&self, table_name: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        Self::take_write_fault(&mut state)?;
        if state.faults.keep_dropped_rows {
            return Ok(());
        }
        state.catalog.remove(table_name).map(|_| ())
    }

    fn get_table_id(&self, table_name: &str) -> Result<Option<TableId>, StoreError> {
        let mut state = self.state.lock();
        state.lookups += 1;
        if state.hidden_lookups_left > 0 {
            state.hidden_lookups_left -= 1;
            return Ok(None);
        }
        Ok(state
            .catalog
            .tables
            .get(table_name)
            .and_then(|t| t.table_id))
    }

    fn get_table_name(&self, table_id: TableId) -> Result<Option<String>, StoreError> {
        let state = self.state.lock();
        if state.faults.fail_name_reads {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }
        if let Some(name) = &state.faults.name_readback_override {
            return Ok(Some(name.clone()));
        }
        Ok(state.catalog.name_of(table_id).map(str::to_string))
    }

    fn get_table_schema(&self, table_name: &str) -> Result<Option<TableSchema>, StoreError> {
        Ok(self.state.lock().catalog.tables.get(table_name).cloned())
    }

    fn alter_table(
        &self,
        alter: &AlterTableSchema,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        Self::take_write_fault(&mut state)?;
        state.catalog.alter(alter, expected_version)
    }

    fn modify_table_id(
        &self,
        schema: &TableSchema,
        new_table_id: TableId,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        Self::take_write_fault(&mut state)?;
        state.catalog.modify_id(&schema.table_name, new_table_id)
    }
}
