//! # quarry-core
//!
//! The DDL core of the QuarryDB cluster coordinator.
//!
//! [`DdlOperator`](catalog::DdlOperator) creates, alters and drops table
//! definitions in a shared schema catalog and bootstraps the tablets of new
//! tables. The catalog store has no multi-step transactions, so the operator
//! serializes DDL behind one lock and verifies each write by reading it back.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use quarry_core::catalog::DdlOperator;
//! use quarry_core::config::DdlConfig;
//! use quarry_core::store::{MemorySchemaStore, SchemaStore};
//! use quarry_core::tablet::MemoryTabletBootstrapper;
//! use quarry_core::types::{AlterColumn, AlterTableSchema, ColumnSchema, ColumnType, TableSchema};
//!
//! let store = Arc::new(MemorySchemaStore::new(1000));
//! let operator = DdlOperator::new(DdlConfig::default());
//! operator.init(store.clone(), Arc::new(MemoryTabletBootstrapper::default()));
//!
//! let mut orders = TableSchema::new(
//!     "orders",
//!     16,
//!     vec![
//!         ColumnSchema::new("order_id", ColumnType::Int).with_rowkey(1),
//!         ColumnSchema::new("amount", ColumnType::Decimal),
//!     ],
//! );
//! let table_id = operator.create_table(&mut orders).unwrap();
//! assert_eq!(table_id, 1001);
//!
//! let mut alter = AlterTableSchema::new(
//!     "orders",
//!     vec![AlterColumn::add(ColumnSchema::new("status", ColumnType::Varchar))],
//! );
//! operator.alter_table(&mut alter).unwrap();
//! assert_eq!(alter.columns[0].column.column_id, 18);
//!
//! operator.drop_table("orders").unwrap();
//! assert_eq!(store.get_table_id("orders").unwrap(), None);
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod store;
pub mod tablet;
pub mod types;
