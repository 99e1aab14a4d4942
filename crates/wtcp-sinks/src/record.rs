use wtcp_codec::{EmergencyRecord, TelemetryRecord};

/// A record type that knows its own CSV header and row rendering.
pub trait SinkRecord {
	const HEADER: &'static [&'static str];
	fn to_row(&self) -> Vec<String>;
}

impl SinkRecord for TelemetryRecord {
	const HEADER: &'static [&'static str] = &["timestamp", "latitude", "longitude", "activity", "battery", "diag_flags"];

	fn to_row(&self) -> Vec<String> {
		vec![
			self.timestamp.to_string(),
			self.latitude.to_string(),
			self.longitude.to_string(),
			self.activity.to_string(),
			self.battery.to_string(),
			self.diag_flags.to_string(),
		]
	}
}

impl SinkRecord for EmergencyRecord {
	const HEADER: &'static [&'static str] = &["timestamp", "alert_code", "details"];

	fn to_row(&self) -> Vec<String> {
		vec![self.timestamp.to_string(), self.alert_code.to_string(), self.details.clone()]
	}
}
