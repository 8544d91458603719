use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::DdlConfig;
use crate::error::{Error, SchemaError, StoreError, VerifyError};
use crate::store::SchemaStore;
use crate::tablet::TabletBootstrapper;
use crate::types::{AlterTableSchema, TableId, TableSchema};

use super::allocator::{allocate_table_id, update_max_table_id};
use super::alter::validate_alter;

/// Collaborators bound by [`DdlOperator::init`].
#[derive(Clone)]
struct Bound {
    store: Arc<dyn SchemaStore>,
    tablets: Arc<dyn TabletBootstrapper>,
}

struct OperatorInner {
    config: DdlConfig,
    bound: RwLock<Option<Bound>>,
    /// Serializes DDL operations (single-writer model).
    ddl_lock: Mutex<()>,
    index_immediate_effect: AtomicBool,
}

/// The coordinator's DDL operator.
///
/// Every operation runs its store reads and writes under one exclusive lock,
/// so id allocation, the max-table-id update and the verification reads of
/// concurrent requests never interleave. Slow store or bootstrapper calls
/// stall other DDL on the same operator.
///
/// `DdlOperator` is cheaply clonable (`Arc`-based) and `Send + Sync`.
#[derive(Clone)]
pub struct DdlOperator {
    inner: Arc<OperatorInner>,
}

impl DdlOperator {
    /// Create an operator. It rejects every request with `NotReady` until
    /// [`init`](Self::init) binds a store and a tablet bootstrapper.
    pub fn new(config: DdlConfig) -> Self {
        let index_immediate_effect = AtomicBool::new(config.index_immediate_effect);
        Self {
            inner: Arc::new(OperatorInner {
                config,
                bound: RwLock::new(None),
                ddl_lock: Mutex::new(()),
                index_immediate_effect,
            }),
        }
    }

    pub fn init(&self, store: Arc<dyn SchemaStore>, tablets: Arc<dyn TabletBootstrapper>) {
        *self.inner.bound.write() = Some(Bound { store, tablets });
    }

    pub fn is_ready(&self) -> bool {
        self.inner.bound.read().is_some()
    }

    pub fn config(&self) -> &DdlConfig {
        &self.inner.config
    }

    /// Whether secondary index tables get their tablets at creation time.
    pub fn index_immediate_effect(&self) -> bool {
        self.inner.index_immediate_effect.load(Ordering::Acquire)
    }

    pub fn set_index_immediate_effect(&self, enabled: bool) {
        self.inner
            .index_immediate_effect
            .store(enabled, Ordering::Release);
    }

    fn bound(&self) -> Result<Bound, Error> {
        match self.inner.bound.read().as_ref() {
            Some(bound) => Ok(bound.clone()),
            None => {
                warn!("DDL operator used before init");
                Err(Error::NotReady)
            }
        }
    }

    /// Create a table.
    ///
    /// On success `schema.table_id` holds the allocated id and the table is
    /// discoverable by name.
    pub fn create_table(&self, schema: &mut TableSchema) -> Result<TableId, Error> {
        let Bound { store, tablets } = self.bound()?;
        let _guard = self.inner.ddl_lock.lock();

        // 1. Allocate the id and advance the catalog high-water-mark.
        let table_id = allocate_table_id(
            store.as_ref(),
            self.inner.config.max_reserved_table_id,
            schema,
        )
        .inspect_err(|e| {
            warn!(table = %schema.table_name, error = %e, "allocate table id failed");
        })?;
        update_max_table_id(store.as_ref(), table_id).inspect_err(|e| {
            warn!(table = %schema.table_name, table_id, error = %e, "update max used table id failed");
        })?;

        // 2. Tablets for secondary indexes may be deferred to the index build.
        let tablets_created = !schema.is_index() || self.index_immediate_effect();
        if tablets_created {
            let nodes = tablets.create_empty_tablets(schema).inspect_err(|e| {
                warn!(table = %schema.table_name, table_id, error = %e, "create empty tablets failed");
            })?;
            debug!(table = %schema.table_name, table_id, nodes = nodes.len(), "empty tablets created");
        } else {
            debug!(table = %schema.table_name, table_id, "tablet creation deferred for index table");
        }

        // 3. Persist and read the name back by id.
        self.insert_schema(store.as_ref(), schema, table_id)
            .inspect_err(|e| {
                if tablets_created {
                    warn!(table = %schema.table_name, table_id, error = %e, "schema not persisted, tablets orphaned");
                }
            })?;
        info!(table = %schema.table_name, table_id, "table schema persisted");

        // 4. Wait until the table resolves by name.
        self.confirm_discoverable(store.as_ref(), &schema.table_name, table_id)?;
        Ok(table_id)
    }

    fn insert_schema(
        &self,
        store: &dyn SchemaStore,
        schema: &TableSchema,
        table_id: TableId,
    ) -> Result<(), Error> {
        let write = match store.create_table(schema) {
            Ok(()) => Ok(()),
            Err(e) if e.is_outcome_unknown() => {
                warn!(table = %schema.table_name, table_id, error = %e, "insert table schema failed, reading back");
                Err(e)
            }
            Err(e) => {
                warn!(table = %schema.table_name, table_id, error = %e, "insert table schema rejected");
                return Err(e.into());
            }
        };

        let read_back = match store.get_table_name(table_id) {
            Ok(name) => name,
            Err(source) => {
                error!(
                    table = %schema.table_name,
                    table_id,
                    error = %source,
                    "table name read-back failed, manual check required"
                );
                return Err(VerifyError::ManualCheckRequired {
                    table_name: schema.table_name.clone(),
                    source,
                }
                .into());
            }
        };

        match (write, read_back) {
            (_, Some(name)) if name == schema.table_name => Ok(()),
            (Err(e), None) => Err(e.into()),
            (_, actual) => {
                error!(
                    table = %schema.table_name,
                    table_id,
                    actual = ?actual,
                    "table name read-back does not match"
                );
                Err(VerifyError::NameMismatch {
                    table_id,
                    expected: schema.table_name.clone(),
                    actual,
                }
                .into())
            }
        }
    }

    fn confirm_discoverable(
        &self,
        store: &dyn SchemaStore,
        table_name: &str,
        table_id: TableId,
    ) -> Result<(), Error> {
        let policy = self.inner.config.confirm_retry;
        for attempt in 1..=policy.max_attempts {
            match store.get_table_id(table_name) {
                Ok(Some(found)) if found == table_id => {
                    debug!(table = %table_name, table_id, attempt, "table discoverable by name");
                    return Ok(());
                }
                Ok(Some(found)) => {
                    error!(table = %table_name, expected = table_id, actual = found, "table name resolves to another id");
                    return Err(VerifyError::IdMismatch {
                        table_name: table_name.to_string(),
                        expected: table_id,
                        actual: found,
                    }
                    .into());
                }
                Ok(None) => {}
                Err(e) => debug!(table = %table_name, attempt, error = %e, "table id lookup failed"),
            }
            if attempt < policy.max_attempts
                && let Some(delay) = policy.delay()
            {
                std::thread::sleep(delay);
            }
        }
        error!(table = %table_name, table_id, attempts = policy.max_attempts, "create table failed: table not discoverable");
        Err(VerifyError::NotDiscoverable {
            table_name: table_name.to_string(),
            attempts: policy.max_attempts,
        }
        .into())
    }

    /// Drop a table and then its tablets.
    ///
    /// The schema record is deleted and verified under the DDL lock; tablet
    /// deletion happens afterwards. If it fails the schema is not restored and
    /// `Error::OrphanedTablets` names the table whose tablets need cleanup.
    pub fn drop_table(&self, table_name: &str) -> Result<TableId, Error> {
        let Bound { store, tablets } = self.bound()?;

        let table_id = {
            let _guard = self.inner.ddl_lock.lock();
            self.delete_schema(store.as_ref(), table_name)?
        };
        info!(table = %table_name, table_id, "table schema deleted");

        tablets
            .delete_tables(false, &[table_id])
            .map_err(|source| {
                warn!(table = %table_name, table_id, error = %source, "delete tablets failed, tablets orphaned");
                Error::OrphanedTablets { table_id, source }
            })?;
        info!(table = %table_name, table_id, "table tablets deleted");
        Ok(table_id)
    }

    fn delete_schema(&self, store: &dyn SchemaStore, table_name: &str) -> Result<TableId, Error> {
        let table_id = store
            .get_table_id(table_name)?
            .ok_or_else(|| SchemaError::TableNotFound(table_name.to_string()))?;

        let delete = store.drop_table(table_name);
        if let Err(e) = &delete {
            warn!(table = %table_name, table_id, error = %e, "delete table schema failed");
        }

        match store.get_table_id(table_name) {
            Ok(None) => Ok(table_id),
            Ok(Some(still)) => {
                error!(table = %table_name, table_id = still, "table still present after drop");
                Err(VerifyError::StillPresent {
                    table_name: table_name.to_string(),
                    table_id: still,
                }
                .into())
            }
            Err(source) => {
                error!(table = %table_name, error = %source, "drop read-back failed, manual check required");
                Err(VerifyError::ManualCheckRequired {
                    table_name: table_name.to_string(),
                    source,
                }
                .into())
            }
        }
    }

    /// Add or drop columns of an existing table.
    ///
    /// Column ids are resolved into `alter` in place. The write is conditional
    /// on the schema version observed at fetch time; a concurrent alter that
    /// landed first surfaces as a `VersionConflict` store error.
    pub fn alter_table(&self, alter: &mut AlterTableSchema) -> Result<(), Error> {
        let Bound { store, .. } = self.bound()?;
        let _guard = self.inner.ddl_lock.lock();

        let old_schema = store
            .get_table_schema(&alter.table_name)?
            .ok_or_else(|| SchemaError::TableNotFound(alter.table_name.clone()))?;
        let table_id = old_schema
            .table_id
            .ok_or_else(|| StoreError::Corrupted(format!("table '{}' has no id", alter.table_name)))?;
        if table_id < self.inner.config.min_alterable_table_id {
            warn!(table = %alter.table_name, table_id, "system tables cannot be altered");
            return Err(SchemaError::SystemTable { table_id }.into());
        }

        alter.table_id = Some(table_id);
        validate_alter(&old_schema, alter, self.inner.config.min_user_column_id)?;

        store
            .alter_table(alter, old_schema.schema_version)
            .inspect_err(|e| {
                warn!(table = %alter.table_name, table_id, error = %e, "alter table failed");
            })?;
        info!(
            table = %alter.table_name,
            table_id,
            changes = alter.columns.len(),
            "table altered"
        );
        Ok(())
    }

    /// Move a table to `new_table_id` (restore / migration).
    ///
    /// Like an explicit create id, the new id must already be reserved, i.e.
    /// not above `max_used_table_id`.
    pub fn modify_table_id(&self, schema: &TableSchema, new_table_id: TableId) -> Result<(), Error> {
        let Bound { store, .. } = self.bound()?;
        let _guard = self.inner.ddl_lock.lock();

        let max_used = store.get_max_used_table_id()?;
        if new_table_id > max_used {
            warn!(table = %schema.table_name, new_table_id, max_used, "new table id is above the max used table id");
            return Err(SchemaError::TableIdNotReserved {
                requested: new_table_id,
                max_used,
            }
            .into());
        }
        if let Some(table_name) = store.get_table_name(new_table_id)? {
            warn!(table_id = new_table_id, used_by = %table_name, "table id already in use");
            return Err(SchemaError::TableIdAlreadyReserved {
                table_id: new_table_id,
                table_name,
            }
            .into());
        }
        store
            .modify_table_id(schema, new_table_id)
            .inspect_err(|e| {
                warn!(table = %schema.table_name, new_table_id, error = %e, "modify table id failed");
            })?;
        info!(table = %schema.table_name, new_table_id, "table id modified");
        Ok(())
    }
}
