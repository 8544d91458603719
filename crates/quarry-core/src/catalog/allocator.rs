//! Table id allocation and the table-id high-water-mark protocol.
//!
//! The store's `max_used_table_id` is the only source of truth; nothing here
//! caches it. Callers must hold the operator's DDL lock across
//! [`allocate_table_id`] and [`update_max_table_id`] so that the
//! read / write / re-read sequence cannot interleave with another DDL.

use tracing::{debug, error, info, warn};

use crate::error::{Error, SchemaError, VerifyError};
use crate::store::SchemaStore;
use crate::types::{TableId, TableSchema};

/// Assign (or validate) the table id of `schema` against the store's
/// high-water-mark, then stamp it on every join entry.
///
/// An unassigned id becomes `max_used + 1`, which must exceed
/// `max_reserved_table_id`. An explicit id is only accepted if it was already
/// reserved, i.e. does not exceed `max_used`. Nothing is written to the store.
pub fn allocate_table_id(
    store: &dyn SchemaStore,
    max_reserved_table_id: TableId,
    schema: &mut TableSchema,
) -> Result<TableId, Error> {
    let max_used = store.get_max_used_table_id()?;

    let table_id = match schema.table_id {
        None => {
            let Some(candidate) = max_used.checked_add(1) else {
                error!(table = %schema.table_name, max_used, "table ids exhausted");
                return Err(SchemaError::TableIdExhausted { max_used }.into());
            };
            if candidate <= max_reserved_table_id {
                warn!(
                    table = %schema.table_name,
                    candidate,
                    min = max_reserved_table_id,
                    "user table id must be above the reserved range"
                );
                return Err(SchemaError::TableIdBelowMinimum {
                    candidate,
                    min: max_reserved_table_id,
                }
                .into());
            }
            candidate
        }
        Some(requested) => {
            if requested > max_used {
                warn!(
                    table = %schema.table_name,
                    requested,
                    max_used,
                    "explicit table id is above the max used table id"
                );
                return Err(SchemaError::TableIdNotReserved {
                    requested,
                    max_used,
                }
                .into());
            }
            requested
        }
    };

    schema.table_id = Some(table_id);
    for join in &mut schema.join_info {
        join.left_table_id = table_id;
    }
    debug!(table = %schema.table_name, table_id, "table id allocated");
    Ok(table_id)
}

/// Advance the store's `max_used_table_id` to `table_id` if it is higher, and
/// confirm the write by reading it back.
pub fn update_max_table_id(store: &dyn SchemaStore, table_id: TableId) -> Result<(), Error> {
    let max_used = store.get_max_used_table_id()?;
    if table_id <= max_used {
        return Ok(());
    }

    store.set_max_used_table_id(table_id)?;

    let actual = store.get_max_used_table_id()?;
    if actual != table_id {
        error!(
            expected = table_id,
            actual,
            "max used table id re-read does not match write"
        );
        return Err(VerifyError::MaxTableIdMismatch {
            expected: table_id,
            actual,
        }
        .into());
    }
    info!(max_used_table_id = actual, "max used table id advanced");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::{Faults, MemorySchemaStore};
    use crate::types::{ColumnSchema, ColumnType, JoinInfo};

    fn make_schema(name: &str) -> TableSchema {
        TableSchema::new(
            name,
            16,
            vec![ColumnSchema::new("id", ColumnType::Int).with_rowkey(1)],
        )
    }

    #[test]
    fn test_unassigned_id_is_max_plus_one() {
        let store = MemorySchemaStore::new(50000);
        let mut schema = make_schema("orders");

        let table_id = allocate_table_id(&store, 50000, &mut schema).unwrap();

        assert_eq!(table_id, 50001);
        assert_eq!(schema.table_id, Some(50001));
        // Allocation alone never touches the store.
        assert_eq!(store.get_max_used_table_id().unwrap(), 50000);
    }

    #[test]
    fn test_candidate_inside_reserved_range_rejected() {
        let store = MemorySchemaStore::new(9999);
        let mut schema = make_schema("orders");

        let err = allocate_table_id(&store, 10000, &mut schema).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(schema.table_id.is_none());
    }

    #[test]
    fn test_exhausted_id_space_rejected() {
        let store = MemorySchemaStore::new(TableId::MAX);
        let mut schema = make_schema("orders");

        let err = allocate_table_id(&store, 1000, &mut schema).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(matches!(
            err,
            Error::Schema(SchemaError::TableIdExhausted { max_used }) if max_used == TableId::MAX
        ));
        assert!(schema.table_id.is_none());
    }

    #[test]
    fn test_explicit_id_must_be_reserved() {
        let store = MemorySchemaStore::new(2000);

        let mut above = make_schema("restored");
        above.table_id = Some(2001);
        let err = allocate_table_id(&store, 1000, &mut above).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let mut at_max = make_schema("restored");
        at_max.table_id = Some(2000);
        assert_eq!(allocate_table_id(&store, 1000, &mut at_max).unwrap(), 2000);

        let mut below = make_schema("restored");
        below.table_id = Some(1500);
        assert_eq!(allocate_table_id(&store, 1000, &mut below).unwrap(), 1500);
    }

    #[test]
    fn test_join_info_stamped_with_owner() {
        let store = MemorySchemaStore::new(1000);
        let mut schema = make_schema("orders");
        schema.join_info = vec![
            JoinInfo {
                left_table_id: 0,
                left_column_id: 16,
                right_table_id: 900,
                right_column_id: 16,
            },
            JoinInfo {
                left_table_id: 77,
                left_column_id: 17,
                right_table_id: 901,
                right_column_id: 16,
            },
        ];

        allocate_table_id(&store, 1000, &mut schema).unwrap();

        assert!(schema.join_info.iter().all(|j| j.left_table_id == 1001));
        assert_eq!(schema.join_info[1].right_table_id, 901);
    }

    #[test]
    fn test_update_max_only_advances() {
        let store = MemorySchemaStore::new(1005);

        update_max_table_id(&store, 1003).unwrap();
        assert_eq!(store.get_max_used_table_id().unwrap(), 1005);

        update_max_table_id(&store, 1010).unwrap();
        assert_eq!(store.get_max_used_table_id().unwrap(), 1010);
    }

    #[test]
    fn test_update_max_detects_lost_write() {
        let store = MemorySchemaStore::new(1000);
        store.set_faults(Faults {
            drop_max_id_writes: true,
            ..Faults::default()
        });

        let err = update_max_table_id(&store, 1001).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConsistencyViolation);
        assert!(matches!(
            err,
            Error::Verify(VerifyError::MaxTableIdMismatch {
                expected: 1001,
                actual: 1000
            })
        ));
    }
}
