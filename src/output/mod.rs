//! Output module
//!
//! Tabular export of proxy attributes as Arrow `RecordBatch`es.
//!
//! # Overview
//!
//! - Declared fields get a fixed column type (strings, booleans, integers,
//!   lists of ids)
//! - Free-form fields and extras get a type inferred from their values
//! - Batches convert back to JSON rows for inspection

mod batch;

pub use batch::{batch_to_records, records_to_batch};
