use std::{fs::OpenOptions, path::{Path, PathBuf}};

use snafu::ResultExt;

use crate::{
	error::{CsvSnafu, IoSnafu, JoinSnafu, SinkError},
	record::SinkRecord,
};

/// An append-only CSV store, buffered in memory until [`CsvSink::flush`] is
/// called. One sink owns one file and is only ever touched from the session
/// that created it — flush opens, writes, and closes the handle in a single
/// call, so no cross-session lock is needed even when several sessions
/// append to the same path.
pub struct CsvSink<T> {
	path: PathBuf,
	buffer: Vec<T>,
}

impl<T: SinkRecord + Send + 'static> CsvSink<T> {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into(), buffer: Vec::new() }
	}

	pub fn push(&mut self, record: T) {
		self.buffer.push(record);
	}

	pub fn is_empty(&self) -> bool {
		self.buffer.is_empty()
	}

	pub fn buffered_len(&self) -> usize {
		self.buffer.len()
	}

	/// Append every buffered record to the file, writing the header row
	/// first if the file is new or empty. A failed flush leaves the buffer
	/// untouched so records aren't lost — the caller retries on next flush.
	pub async fn flush(&mut self) -> Result<(), SinkError> {
		if self.buffer.is_empty() {
			return Ok(());
		}

		let path = self.path.clone();
		let rows: Vec<Vec<String>> = self.buffer.iter().map(SinkRecord::to_row).collect();
		let header = T::HEADER;

		tokio::task::spawn_blocking(move || write_rows(&path, header, rows)).await.context(JoinSnafu)??;

		self.buffer.clear();
		Ok(())
	}
}

fn write_rows(path: &Path, header: &'static [&'static str], rows: Vec<Vec<String>>) -> Result<(), SinkError> {
	let needs_header = std::fs::metadata(path).map(|meta| meta.len() == 0).unwrap_or(true);

	let file = OpenOptions::new()
		.create(true)
		.append(true)
		.open(path)
		.with_context(|_| IoSnafu { path: path.display().to_string() })?;

	let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
	if needs_header {
		writer.write_record(header).context(CsvSnafu)?;
	}
	for row in rows {
		writer.write_record(&row).context(CsvSnafu)?;
	}
	writer.flush().with_context(|_| IoSnafu { path: path.display().to_string() })?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use wtcp_codec::{EmergencyRecord, TelemetryRecord};

	use super::*;

	#[tokio::test]
	async fn writes_header_once_then_appends() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("telemetry.csv");

		let mut sink = CsvSink::<TelemetryRecord>::new(&path);
		sink.push(TelemetryRecord { timestamp: 1, latitude: 1.0, longitude: 2.0, activity: 0, battery: 90, diag_flags: 0 });
		sink.flush().await.unwrap();
		sink.push(TelemetryRecord { timestamp: 2, latitude: 1.5, longitude: 2.5, activity: 1, battery: 89, diag_flags: 0 });
		sink.flush().await.unwrap();

		let contents = std::fs::read_to_string(&path).unwrap();
		let mut lines = contents.lines();
		assert_eq!(lines.next().unwrap(), "timestamp,latitude,longitude,activity,battery,diag_flags");
		assert_eq!(lines.count(), 2);
	}

	#[tokio::test]
	async fn empty_flush_is_a_no_op() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("emergency.csv");
		let mut sink = CsvSink::<EmergencyRecord>::new(&path);
		sink.flush().await.unwrap();
		assert!(!path.exists());
	}

	#[tokio::test]
	async fn failed_flush_keeps_buffer() {
		let mut sink = CsvSink::<EmergencyRecord>::new("/nonexistent-dir-wtcp-q/emergency.csv");
		sink.push(EmergencyRecord { timestamp: 1, alert_code: 3, details: "fall".into() });
		assert!(sink.flush().await.is_err());
		assert_eq!(sink.buffered_len(), 1);
	}
}
