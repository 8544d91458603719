//! Tablet bootstrapper: creates and removes the physical partitions of a table.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::error::TabletError;
use crate::types::{StorageNode, TableId, TableSchema};

/// Coordinator-side tablet placement, consumed by the DDL operator.
pub trait TabletBootstrapper: Send + Sync {
    /// Select storage nodes and create the initial empty tablets for `schema`.
    fn create_empty_tablets(&self, schema: &TableSchema) -> Result<Vec<StorageNode>, TabletError>;

    /// Remove every tablet of the given tables and record the removal in the
    /// commit log. `synchronous` waits for storage nodes to acknowledge.
    fn delete_tables(&self, synchronous: bool, table_ids: &[TableId]) -> Result<(), TabletError>;
}

/// A delete request as recorded in the commit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRecord {
    pub synchronous: bool,
    pub table_ids: Vec<TableId>,
}

#[derive(Default)]
struct BootstrapState {
    tablets: BTreeMap<TableId, Vec<StorageNode>>,
    commit_log: Vec<DeleteRecord>,
    fail_creates: bool,
    fail_deletes: bool,
}

/// In-memory bootstrapper placing every table on a fixed node list. Used for testing.
pub struct MemoryTabletBootstrapper {
    nodes: Vec<StorageNode>,
    state: Mutex<BootstrapState>,
}

impl MemoryTabletBootstrapper {
    pub fn new(nodes: Vec<StorageNode>) -> Self {
        Self {
            nodes,
            state: Mutex::new(BootstrapState::default()),
        }
    }

    pub fn fail_creates(&self, fail: bool) {
        self.state.lock().fail_creates = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().fail_deletes = fail;
    }

    pub fn has_tablets(&self, table_id: TableId) -> bool {
        self.state.lock().tablets.contains_key(&table_id)
    }

    pub fn tablet_tables(&self) -> Vec<TableId> {
        self.state.lock().tablets.keys().copied().collect()
    }

    pub fn commit_log(&self) -> Vec<DeleteRecord> {
        self.state.lock().commit_log.clone()
    }
}

impl Default for MemoryTabletBootstrapper {
    fn default() -> Self {
        Self::new(vec![
            StorageNode {
                addr: "10.0.0.1:2600".to_string(),
            },
            StorageNode {
                addr: "10.0.0.2:2600".to_string(),
            },
        ])
    }
}

impl TabletBootstrapper for MemoryTabletBootstrapper {
    fn create_empty_tablets(&self, schema: &TableSchema) -> Result<Vec<StorageNode>, TabletError> {
        let table_id = schema
            .table_id
            .ok_or_else(|| TabletError::Failed(format!("'{}' has no table id", schema.table_name)))?;
        let mut state = self.state.lock();
        if state.fail_creates {
            return Err(TabletError::Failed("injected create failure".to_string()));
        }
        if self.nodes.is_empty() {
            return Err(TabletError::NoStorageNode(table_id));
        }
        state.tablets.insert(table_id, self.nodes.clone());
        Ok(self.nodes.clone())
    }

    fn delete_tables(&self, synchronous: bool, table_ids: &[TableId]) -> Result<(), TabletError> {
        let mut state = self.state.lock();
        if state.fail_deletes {
            return Err(TabletError::Failed("injected delete failure".to_string()));
        }
        for table_id in table_ids {
            state.tablets.remove(table_id);
        }
        state.commit_log.push(DeleteRecord {
            synchronous,
            table_ids: table_ids.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, ColumnType};

    #[test]
    fn test_create_then_delete_logs_removal() {
        let bootstrapper = MemoryTabletBootstrapper::default();
        let mut schema = TableSchema::new(
            "users",
            16,
            vec![ColumnSchema::new("id", ColumnType::Int).with_rowkey(1)],
        );
        schema.table_id = Some(1001);

        let nodes = bootstrapper.create_empty_tablets(&schema).unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(bootstrapper.has_tablets(1001));

        bootstrapper.delete_tables(false, &[1001]).unwrap();
        assert!(!bootstrapper.has_tablets(1001));
        assert_eq!(
            bootstrapper.commit_log(),
            vec![DeleteRecord {
                synchronous: false,
                table_ids: vec![1001],
            }]
        );
    }

    #[test]
    fn test_no_nodes_is_an_error() {
        let bootstrapper = MemoryTabletBootstrapper::new(Vec::new());
        let mut schema = TableSchema::new("users", 16, Vec::new());
        schema.table_id = Some(1001);

        let err = bootstrapper.create_empty_tablets(&schema).unwrap_err();
        assert!(matches!(err, TabletError::NoStorageNode(1001)));
    }
}
