//! Pre-validation (C3, SPEC_FULL.md §4.3): zip unwrap, filename
//! convention, schema-driven CSV validation, and fixed-size batching.
//! This crate is pure file-and-data work; it never opens a database
//! connection.

pub mod batching;
pub mod errors;
pub mod filename;
pub mod schema;
pub mod zip_unwrap;

pub use batching::split_into_batches;
pub use errors::PreValidationError;
pub use filename::{check_operator_filename, OperatorFileWindow};
pub use schema::{
    validate_csv, ColumnSpec, CsvSchema, BARRED_LIST_SCHEMA, GSMA_SCHEMA, OPERATOR_DATA_V1_SCHEMA,
    OPERATOR_DATA_V2_SCHEMA, PAIRING_LIST_SCHEMA, REGISTRATION_LIST_SCHEMA, STOLEN_LIST_SCHEMA,
};
pub use zip_unwrap::unwrap_zip;
