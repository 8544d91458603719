//! Core types: table and column ids, table schemas, alter change-sets.

use serde::{Deserialize, Serialize};

/// Table identifier, unique across the catalog once persisted.
pub type TableId = u64;

/// Column identifier, unique within a table.
pub type ColumnId = u64;

/// Default upper bound of the reserved (system/internal) table id range.
/// User tables are allocated strictly above it.
pub const DEFAULT_MAX_RESERVED_TABLE_ID: TableId = 1000;

/// Default lowest column id a user table's columns start from.
pub const DEFAULT_MIN_USER_COLUMN_ID: ColumnId = 16;

/// The type of a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Null,
    Int,
    Float,
    Double,
    DateTime,
    PreciseDateTime,
    Varchar,
    Bool,
    Decimal,
    /// Row creation timestamp, maintained by the system.
    CreateTime,
    /// Row modification timestamp, maintained by the system.
    ModifyTime,
}

impl ColumnType {
    pub fn is_system_timestamp(self) -> bool {
        matches!(self, ColumnType::CreateTime | ColumnType::ModifyTime)
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub column_id: ColumnId,
    pub column_name: String,
    pub data_type: ColumnType,
    /// Position in the primary key (1-based). `0` means not a key column.
    #[serde(default)]
    pub rowkey_id: u32,
}

impl ColumnSchema {
    /// A non-key column with an unresolved id.
    pub fn new(column_name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            column_id: 0,
            column_name: column_name.into(),
            data_type,
            rowkey_id: 0,
        }
    }

    pub fn with_id(mut self, column_id: ColumnId) -> Self {
        self.column_id = column_id;
        self
    }

    pub fn with_rowkey(mut self, rowkey_id: u32) -> Self {
        self.rowkey_id = rowkey_id;
        self
    }

    pub fn is_rowkey(&self) -> bool {
        self.rowkey_id > 0
    }
}

/// Join metadata owned by a table. `left_table_id` always refers to the
/// owning table and is stamped when the table id is allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinInfo {
    pub left_table_id: TableId,
    pub left_column_id: ColumnId,
    pub right_table_id: TableId,
    pub right_column_id: ColumnId,
}

/// Schema definition for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// `None` until an id is allocated; `Some` up front for restore/import.
    pub table_id: Option<TableId>,
    pub table_name: String,
    /// Base table of a secondary index table. `None` for ordinary tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_table_id: Option<TableId>,
    pub max_used_column_id: ColumnId,
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub join_info: Vec<JoinInfo>,
    /// Bumped by every persisted alter; used as an optimistic-concurrency token.
    #[serde(default)]
    pub schema_version: u64,
}

impl TableSchema {
    /// Build a schema, numbering columns from `first_column_id` in order.
    pub fn new(
        table_name: impl Into<String>,
        first_column_id: ColumnId,
        columns: Vec<ColumnSchema>,
    ) -> Self {
        let columns: Vec<ColumnSchema> = columns
            .into_iter()
            .zip(first_column_id..)
            .map(|(column, id)| column.with_id(id))
            .collect();
        let max_used_column_id = columns
            .last()
            .map_or(first_column_id.saturating_sub(1), |c| c.column_id);
        Self {
            table_id: None,
            table_name: table_name.into(),
            original_table_id: None,
            max_used_column_id,
            columns,
            join_info: Vec::new(),
            schema_version: 0,
        }
    }

    pub fn is_index(&self) -> bool {
        self.original_table_id.is_some()
    }

    pub fn column(&self, column_name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.column_name == column_name)
    }

    /// Fold a validated change-set into this schema and bump its version.
    ///
    /// Drops remove the column by id, adds are appended in request order, and
    /// the column high-water-mark never moves backwards.
    pub fn apply_alter(&mut self, alter: &AlterTableSchema) {
        for change in &alter.columns {
            match change.kind {
                AlterKind::Add => self.columns.push(change.column.clone()),
                AlterKind::Drop => self
                    .columns
                    .retain(|c| c.column_id != change.column.column_id),
                AlterKind::Modify => {}
            }
        }
        let highest = self.columns.iter().map(|c| c.column_id).max().unwrap_or(0);
        self.max_used_column_id = self
            .max_used_column_id
            .max(alter.max_used_column_id)
            .max(highest);
        self.schema_version += 1;
    }
}

/// The kind of change applied to one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlterKind {
    Add,
    Drop,
    /// In-place modification. Always rejected for existing columns.
    Modify,
}

/// A single column change within an alter request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterColumn {
    pub kind: AlterKind,
    /// Target column. `column_id` is resolved during validation.
    pub column: ColumnSchema,
}

impl AlterColumn {
    pub fn add(column: ColumnSchema) -> Self {
        Self {
            kind: AlterKind::Add,
            column,
        }
    }

    pub fn drop(column: ColumnSchema) -> Self {
        Self {
            kind: AlterKind::Drop,
            column,
        }
    }
}

/// A change-set against an existing table. Never persisted as such.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterTableSchema {
    pub table_name: String,
    /// Filled in from the stored schema before validation.
    pub table_id: Option<TableId>,
    /// Column high-water-mark after validation allocated ids for added columns.
    pub max_used_column_id: ColumnId,
    pub columns: Vec<AlterColumn>,
}

impl AlterTableSchema {
    pub fn new(table_name: impl Into<String>, columns: Vec<AlterColumn>) -> Self {
        Self {
            table_name: table_name.into(),
            table_id: None,
            max_used_column_id: 0,
            columns,
        }
    }
}

/// A storage node selected to host tablets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageNode {
    pub addr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_schema() -> TableSchema {
        TableSchema::new(
            "orders",
            16,
            vec![
                ColumnSchema::new("order_id", ColumnType::Int).with_rowkey(1),
                ColumnSchema::new("amount", ColumnType::Decimal),
                ColumnSchema::new("note", ColumnType::Varchar),
            ],
        )
    }

    #[test]
    fn test_new_numbers_columns_in_order() {
        let schema = make_schema();
        let ids: Vec<ColumnId> = schema.columns.iter().map(|c| c.column_id).collect();
        assert_eq!(ids, vec![16, 17, 18]);
        assert_eq!(schema.max_used_column_id, 18);
        assert!(schema.table_id.is_none());
        assert!(!schema.is_index());
    }

    #[test]
    fn test_apply_alter_add_and_drop() {
        let mut schema = make_schema();
        let mut alter = AlterTableSchema::new(
            "orders",
            vec![
                AlterColumn::add(ColumnSchema::new("status", ColumnType::Varchar).with_id(19)),
                AlterColumn::drop(ColumnSchema::new("note", ColumnType::Varchar).with_id(18)),
            ],
        );
        alter.max_used_column_id = 19;

        schema.apply_alter(&alter);

        assert!(schema.column("note").is_none());
        assert_eq!(schema.column("status").map(|c| c.column_id), Some(19));
        assert_eq!(schema.max_used_column_id, 19);
        assert_eq!(schema.schema_version, 1);
    }

    #[test]
    fn test_apply_alter_never_lowers_column_high_water_mark() {
        let mut schema = make_schema();
        let mut alter = AlterTableSchema::new(
            "orders",
            vec![AlterColumn::drop(
                ColumnSchema::new("note", ColumnType::Varchar).with_id(18),
            )],
        );
        alter.max_used_column_id = 18;

        schema.apply_alter(&alter);

        assert_eq!(schema.columns.len(), 2);
        assert_eq!(schema.max_used_column_id, 18);
    }

    #[test]
    fn test_schema_json_round_trip_skips_missing_index_base() {
        let schema = make_schema();
        let json = serde_json::to_string(&schema).unwrap();
        assert!(!json.contains("original_table_id"));
        let back: TableSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
