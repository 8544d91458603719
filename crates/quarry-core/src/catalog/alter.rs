//! Column diff validation for alter requests.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::{Error, SchemaError};
use crate::types::{AlterColumn, AlterKind, AlterTableSchema, ColumnId, TableSchema};

/// Reject changes to system timestamp columns and primary-key columns.
pub fn check_alter_column(old_schema: &TableSchema, change: &AlterColumn) -> Result<(), Error> {
    let column = &change.column;
    let reason = if column.data_type.is_system_timestamp() {
        "create/modify time columns cannot be altered"
    } else if column.is_rowkey() {
        "primary key columns cannot be altered"
    } else {
        return Ok(());
    };
    warn!(
        table = %old_schema.table_name,
        column = %column.column_name,
        rowkey_id = column.rowkey_id,
        reason,
        "alter column not allowed"
    );
    Err(SchemaError::OperationNotAllowed {
        column: column.column_name.clone(),
        reason,
    }
    .into())
}

/// Resolve the id of one changed column.
///
/// A dropped column keeps its existing id; an added column takes
/// `++max_column_id`.
pub fn resolve_column_id(
    old_schema: &TableSchema,
    max_column_id: &mut ColumnId,
    change: &mut AlterColumn,
) -> Result<ColumnId, Error> {
    let name = &change.column.column_name;
    let column_id = match (old_schema.column(name), change.kind) {
        (Some(_), AlterKind::Add) => {
            return Err(SchemaError::ColumnAlreadyExists(name.clone()).into());
        }
        (Some(existing), AlterKind::Drop) => existing.column_id,
        (Some(_), AlterKind::Modify) => {
            return Err(SchemaError::ColumnModifyUnsupported(name.clone()).into());
        }
        (None, AlterKind::Add) => {
            *max_column_id += 1;
            *max_column_id
        }
        (None, AlterKind::Drop | AlterKind::Modify) => {
            return Err(SchemaError::ColumnNotFound(name.clone()).into());
        }
    };
    change.column.column_id = column_id;
    Ok(column_id)
}

/// Reject a second change to a column name already changed earlier in the
/// same request.
fn check_repeated_column(
    changed: &BTreeMap<String, AlterKind>,
    change: &AlterColumn,
) -> Result<(), Error> {
    let name = &change.column.column_name;
    match (changed.get(name), change.kind) {
        (None, _) => Ok(()),
        (Some(AlterKind::Add), AlterKind::Add) => {
            Err(SchemaError::ColumnAlreadyExists(name.clone()).into())
        }
        (Some(AlterKind::Drop), AlterKind::Drop) => {
            Err(SchemaError::ColumnNotFound(name.clone()).into())
        }
        (Some(_), _) => Err(SchemaError::ColumnChangedTwice(name.clone()).into()),
    }
}

/// Validate every column change of `alter` against `old_schema`, in order,
/// resolving column ids in place.
///
/// A column name may appear at most once per request. The first failing
/// column aborts the request. The column high-water-mark is written back to
/// `alter` only when every change passed.
pub fn validate_alter(
    old_schema: &TableSchema,
    alter: &mut AlterTableSchema,
    min_user_column_id: ColumnId,
) -> Result<(), Error> {
    let mut max_column_id = old_schema.max_used_column_id;
    if max_column_id < min_user_column_id {
        warn!(
            table = %old_schema.table_name,
            max_used_column_id = max_column_id,
            min = min_user_column_id,
            "stored max used column id is below the user column range"
        );
        return Err(SchemaError::ColumnIdBelowMinimum {
            table: old_schema.table_name.clone(),
            max_used: max_column_id,
            min: min_user_column_id,
        }
        .into());
    }

    let mut changed = BTreeMap::new();
    for change in &mut alter.columns {
        check_alter_column(old_schema, change)?;
        let resolved = check_repeated_column(&changed, change)
            .and_then(|()| resolve_column_id(old_schema, &mut max_column_id, change));
        if let Err(e) = resolved {
            warn!(
                table = %old_schema.table_name,
                column = %change.column.column_name,
                error = %e,
                "resolve column id failed"
            );
            return Err(e);
        }
        changed.insert(change.column.column_name.clone(), change.kind);
    }

    alter.max_used_column_id = max_column_id;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{ColumnSchema, ColumnType};

    /// Helper: `orders(order_id PK, amount, note, created)` with ids 16..=19.
    fn make_schema() -> TableSchema {
        let mut schema = TableSchema::new(
            "orders",
            16,
            vec![
                ColumnSchema::new("order_id", ColumnType::Int).with_rowkey(1),
                ColumnSchema::new("amount", ColumnType::Decimal),
                ColumnSchema::new("note", ColumnType::Varchar),
                ColumnSchema::new("created", ColumnType::CreateTime),
            ],
        );
        schema.table_id = Some(1001);
        schema
    }

    fn alter(columns: Vec<AlterColumn>) -> AlterTableSchema {
        AlterTableSchema::new("orders", columns)
    }

    #[test]
    fn test_add_existing_column_fails() {
        let mut request = alter(vec![AlterColumn::add(ColumnSchema::new(
            "note",
            ColumnType::Varchar,
        ))]);
        let err = validate_alter(&make_schema(), &mut request, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_drop_missing_column_fails() {
        let mut request = alter(vec![AlterColumn::drop(ColumnSchema::new(
            "ghost",
            ColumnType::Varchar,
        ))]);
        let err = validate_alter(&make_schema(), &mut request, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_drop_keeps_original_id() {
        let mut request = alter(vec![AlterColumn::drop(ColumnSchema::new(
            "note",
            ColumnType::Varchar,
        ))]);
        validate_alter(&make_schema(), &mut request, 16).unwrap();
        assert_eq!(request.columns[0].column.column_id, 18);
        assert_eq!(request.max_used_column_id, 19);
    }

    #[test]
    fn test_modify_existing_column_unsupported() {
        let mut request = alter(vec![AlterColumn {
            kind: AlterKind::Modify,
            column: ColumnSchema::new("amount", ColumnType::Double),
        }]);
        let err = validate_alter(&make_schema(), &mut request, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_rowkey_and_timestamp_columns_forbidden_for_any_kind() {
        for kind in [AlterKind::Add, AlterKind::Drop, AlterKind::Modify] {
            let mut rowkey = alter(vec![AlterColumn {
                kind,
                column: ColumnSchema::new("order_id", ColumnType::Int).with_rowkey(1),
            }]);
            let err = validate_alter(&make_schema(), &mut rowkey, 16).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::OperationNotAllowed, "{kind:?}");

            for data_type in [ColumnType::CreateTime, ColumnType::ModifyTime] {
                let mut stamp = alter(vec![AlterColumn {
                    kind,
                    column: ColumnSchema::new("touched", data_type),
                }]);
                let err = validate_alter(&make_schema(), &mut stamp, 16).unwrap_err();
                assert_eq!(err.kind(), ErrorKind::OperationNotAllowed, "{kind:?}");
            }
        }
    }

    #[test]
    fn test_added_ids_strictly_increase_from_old_max() {
        let mut request = alter(vec![
            AlterColumn::add(ColumnSchema::new("status", ColumnType::Varchar)),
            AlterColumn::drop(ColumnSchema::new("note", ColumnType::Varchar)),
            AlterColumn::add(ColumnSchema::new("shipped", ColumnType::Bool)),
            AlterColumn::add(ColumnSchema::new("weight", ColumnType::Double)),
        ]);
        validate_alter(&make_schema(), &mut request, 16).unwrap();

        let ids: Vec<ColumnId> = request.columns.iter().map(|c| c.column.column_id).collect();
        assert_eq!(ids, vec![20, 18, 21, 22]);
        assert_eq!(request.max_used_column_id, 22);
    }

    #[test]
    fn test_failure_short_circuits_and_keeps_request_max() {
        let mut request = alter(vec![
            AlterColumn::add(ColumnSchema::new("status", ColumnType::Varchar)),
            AlterColumn::add(ColumnSchema::new("amount", ColumnType::Decimal)),
            AlterColumn::add(ColumnSchema::new("never", ColumnType::Int)),
        ]);
        let err = validate_alter(&make_schema(), &mut request, 16).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(request.max_used_column_id, 0);
        assert_eq!(request.columns[2].column.column_id, 0);
    }

    #[test]
    fn test_same_column_added_twice_rejected() {
        let mut request = alter(vec![
            AlterColumn::add(ColumnSchema::new("status", ColumnType::Varchar)),
            AlterColumn::add(ColumnSchema::new("status", ColumnType::Int)),
        ]);
        let err = validate_alter(&make_schema(), &mut request, 16).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert!(matches!(
            err,
            Error::Schema(SchemaError::ColumnAlreadyExists(ref name)) if name == "status"
        ));
        assert_eq!(request.max_used_column_id, 0);
    }

    #[test]
    fn test_column_changed_twice_in_one_request_rejected() {
        let note = || ColumnSchema::new("note", ColumnType::Varchar);

        let mut drop_twice = alter(vec![AlterColumn::drop(note()), AlterColumn::drop(note())]);
        let err = validate_alter(&make_schema(), &mut drop_twice, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut drop_then_add = alter(vec![AlterColumn::drop(note()), AlterColumn::add(note())]);
        let err = validate_alter(&make_schema(), &mut drop_then_add, 16).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::ColumnChangedTwice(ref name)) if name == "note"
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let status = || ColumnSchema::new("status", ColumnType::Varchar);
        let mut add_then_drop = alter(vec![AlterColumn::add(status()), AlterColumn::drop(status())]);
        let err = validate_alter(&make_schema(), &mut add_then_drop, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(add_then_drop.max_used_column_id, 0);
    }

    #[test]
    fn test_old_max_below_user_range_rejected() {
        let mut old = make_schema();
        old.max_used_column_id = 3;
        let mut request = alter(vec![AlterColumn::add(ColumnSchema::new(
            "status",
            ColumnType::Varchar,
        ))]);
        let err = validate_alter(&old, &mut request, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
