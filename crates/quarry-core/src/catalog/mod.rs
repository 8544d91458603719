//! DDL on the schema catalog: id allocation, alter validation, and the
//! operator that sequences create / drop / alter / modify-id.

pub mod allocator;
pub mod alter;
pub mod operator;

pub use operator::DdlOperator;
