//! Append-only CSV sinks for telemetry and emergency records.

pub mod error;
pub mod record;
pub mod sink;

pub use error::SinkError;
pub use record::SinkRecord;
pub use sink::CsvSink;
