//! Type definitions for the fraud classifier

pub mod transaction;

pub use transaction::{LabeledTransaction, TransactionRecord, CATEGORICAL_COLUMNS};
