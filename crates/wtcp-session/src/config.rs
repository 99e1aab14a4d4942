use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwap;

/// Parameters a CONTROL PDU can adjust at runtime. Shared between the
/// session owner (which applies incoming CONTROL TLVs) and the telemetry
/// producer task (which reads the current sampling rate on every tick)
/// without a mailbox round-trip.
#[derive(Debug, Clone, Copy)]
pub struct ControlParams {
	pub sampling_rate_ms: u32,
	pub geofence_radius_m: f32,
}

impl Default for ControlParams {
	fn default() -> Self {
		Self { sampling_rate_ms: 1000, geofence_radius_m: 100.0 }
	}
}

/// Runtime-tunable client behavior, readable from any task via clone of the
/// `Arc`, updatable in place by the session owner.
#[derive(Clone)]
pub struct SharedControlParams(Arc<ArcSwap<ControlParams>>);

impl SharedControlParams {
	pub fn new(initial: ControlParams) -> Self {
		Self(Arc::new(ArcSwap::from_pointee(initial)))
	}

	pub fn load(&self) -> ControlParams {
		**self.0.load()
	}

	pub fn store(&self, params: ControlParams) {
		self.0.store(Arc::new(params));
	}

	pub fn sampling_interval(&self) -> Duration {
		Duration::from_millis(self.load().sampling_rate_ms as u64)
	}
}

impl Default for SharedControlParams {
	fn default() -> Self {
		Self::new(ControlParams::default())
	}
}

/// Static timing knobs for a session engine, analogous to the `heartbeat`/
/// `gc_interval`/`gc_lifetime` fields of a transport-layer config: unlike
/// [`ControlParams`] these aren't mutated by the wire protocol, only by the
/// operator's configuration file.
#[derive(Debug, Clone, Copy)]
pub struct SessionTimings {
	/// How long a session may receive nothing before the idle watchdog
	/// terminates it.
	pub idle_timeout: Duration,
	/// How often the server nudges a sleeping client back awake.
	pub wake_interval: Duration,
	/// Emit a CONTROL PDU after this many accepted TELEMETRY PDUs.
	pub control_every: u32,
}

impl Default for SessionTimings {
	fn default() -> Self {
		Self {
			idle_timeout: Duration::from_secs(30),
			wake_interval: Duration::from_secs(60),
			control_every: 10,
		}
	}
}
