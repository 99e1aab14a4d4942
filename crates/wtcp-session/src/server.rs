use std::sync::{Arc, atomic::{AtomicBool, Ordering}};

use snafu::{OptionExt, ResultExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wtcp_codec::{ControlTlv, EmergencyRecord, Payload, Pdu, TelemetryRecord};
use wtcp_proto::{CONTROL_STREAM, ServerFsm, ServerInput, ServerState, validate_inbound};
use wtcp_sinks::CsvSink;

use crate::{
	config::{ControlParams, SessionTimings, SharedControlParams},
	error::{ClosedDuringHandshakeSnafu, SessionError, SinkSnafu},
	id::SessionIdAllocator,
	transport::Transport,
};

enum ServerCommand {
	WakeTick,
	SleepClient,
}

/// A handle external callers use to trigger server-initiated events — putting
/// a client to sleep out of band — into a session running elsewhere.
#[derive(Clone)]
pub struct ServerHandle {
	cmd_tx: mpsc::UnboundedSender<ServerCommand>,
}

impl ServerHandle {
	pub fn put_client_to_sleep(&self) {
		let _ = self.cmd_tx.send(ServerCommand::SleepClient);
	}
}

/// Drives one WTCP-Q server-side session over `T`: accepts the AUTH
/// handshake, persists incoming telemetry/emergency records, periodically
/// re-pushes CONTROL parameters, and sends the client to sleep and nudges it
/// awake again.
pub struct ServerSession<T: Transport> {
	transport: T,
	fsm: ServerFsm,
	session_id: u32,
	control: SharedControlParams,
	timings: SessionTimings,
	telemetry_sink: CsvSink<TelemetryRecord>,
	emergency_sink: CsvSink<EmergencyRecord>,
	telemetry_count: u32,
	client_sleeping: Arc<AtomicBool>,
	cmd_tx: mpsc::UnboundedSender<ServerCommand>,
	cmd_rx: mpsc::UnboundedReceiver<ServerCommand>,
}

impl<T: Transport> ServerSession<T> {
	pub fn new(
		transport: T,
		ids: SessionIdAllocator,
		timings: SessionTimings,
		telemetry_sink: CsvSink<TelemetryRecord>,
		emergency_sink: CsvSink<EmergencyRecord>,
	) -> (Self, ServerHandle) {
		let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
		let session = Self {
			transport,
			fsm: ServerFsm::default(),
			session_id: ids.next(),
			control: SharedControlParams::default(),
			timings,
			telemetry_sink,
			emergency_sink,
			telemetry_count: 0,
			client_sleeping: Arc::new(AtomicBool::new(false)),
			cmd_tx: cmd_tx.clone(),
			cmd_rx,
		};
		(session, ServerHandle { cmd_tx })
	}

	pub async fn run(mut self) -> Result<(), SessionError> {
		self.handshake().await?;

		let cancel = CancellationToken::new();
		tokio::spawn(wake_emitter(self.client_sleeping.clone(), self.timings, self.cmd_tx.clone(), cancel.clone()));

		let result = self.drive().await;
		cancel.cancel();
		let _ = self.telemetry_sink.flush().await;
		let _ = self.emergency_sink.flush().await;
		result
	}

	async fn handshake(&mut self) -> Result<(), SessionError> {
		let (stream_id, pdu) = self.transport.recv().await?.context(ClosedDuringHandshakeSnafu)?;
		validate_inbound(stream_id, pdu.payload.pdu_type())?;

		let kind = pdu.payload.pdu_type();
		let Payload::AuthRequest { sampling_rate, geofence_radius, .. } = pdu.payload else {
			warn!(?kind, "expected AUTH_REQUEST to open a session");
			return ClosedDuringHandshakeSnafu.fail();
		};
		self.fsm.apply(ServerInput::AuthRequestReceived)?;
		self.control.store(ControlParams { sampling_rate_ms: sampling_rate, geofence_radius_m: geofence_radius });

		let response = Pdu::new(0, Payload::AuthResponse { status: 0, assigned_session_id: self.session_id });
		self.transport.send(CONTROL_STREAM, response).await?;
		self.fsm.apply(ServerInput::AuthResponseSent)?;
		info!(session_id = self.session_id, "client authenticated");
		Ok(())
	}

	async fn drive(&mut self) -> Result<(), SessionError> {
		loop {
			if self.fsm.state() == ServerState::Terminated {
				return Ok(());
			}

			tokio::select! {
				inbound = self.transport.recv() => {
					match inbound? {
						Some((stream_id, pdu)) => self.handle_inbound(stream_id, pdu).await?,
						None => return Ok(()),
					}
				}
				Some(cmd) = self.cmd_rx.recv() => {
					self.handle_command(cmd).await?;
				}
			}
		}
	}

	async fn handle_inbound(&mut self, stream_id: u64, pdu: Pdu) -> Result<(), SessionError> {
		let pdu_type = pdu.payload.pdu_type();
		if let Err(err) = validate_inbound(stream_id, pdu_type) {
			warn!(?err, "dropping misrouted PDU");
			return Ok(());
		}

		match pdu.payload {
			Payload::Telemetry(record) => {
				self.client_sleeping.store(false, Ordering::Relaxed);
				self.telemetry_sink.push(record);
				self.telemetry_sink.flush().await.context(SinkSnafu)?;
				self.fsm.apply(ServerInput::TelemetryReceived)?;

				self.telemetry_count += 1;
				if self.telemetry_count % self.timings.control_every == 0 {
					self.send_control().await?;
				}
			}
			Payload::Emergency(record) => {
				self.emergency_sink.push(record);
				self.emergency_sink.flush().await.context(SinkSnafu)?;
				self.fsm.apply(ServerInput::EmergencyReceived)?;
				self.transport.send(CONTROL_STREAM, Pdu::new(self.session_id, Payload::Terminate)).await?;
				self.fsm.apply(ServerInput::Terminate)?;
			}
			Payload::Sleep { .. } => {
				self.client_sleeping.store(true, Ordering::Relaxed);
			}
			Payload::Terminate => {
				self.fsm.apply(ServerInput::Terminate)?;
			}
			other => warn!(?other, "ignoring PDU type not expected inbound on a server"),
		}
		Ok(())
	}

	async fn handle_command(&mut self, cmd: ServerCommand) -> Result<(), SessionError> {
		match cmd {
			ServerCommand::WakeTick => {
				if self.client_sleeping.load(Ordering::Relaxed) {
					self.transport.send(CONTROL_STREAM, Pdu::new(self.session_id, Payload::Wake)).await?;
				}
			}
			ServerCommand::SleepClient => {
				self.transport.send(CONTROL_STREAM, Pdu::new(self.session_id, Payload::Sleep { wake: false })).await?;
				self.client_sleeping.store(true, Ordering::Relaxed);
			}
		}
		Ok(())
	}

	async fn send_control(&mut self) -> Result<(), SessionError> {
		let params = self.control.load();
		let tlvs = vec![ControlTlv::SamplingRate(params.sampling_rate_ms), ControlTlv::GeofenceRadius(params.geofence_radius_m)];
		self.transport.send(CONTROL_STREAM, Pdu::new(self.session_id, Payload::Control(tlvs))).await?;
		self.fsm.apply(ServerInput::ControlSent)?;
		Ok(())
	}
}

async fn wake_emitter(client_sleeping: Arc<AtomicBool>, timings: SessionTimings, cmd_tx: mpsc::UnboundedSender<ServerCommand>, cancel: CancellationToken) {
	loop {
		tokio::select! {
			_ = tokio::time::sleep(timings.wake_interval) => {
				if client_sleeping.load(Ordering::Relaxed) && cmd_tx.send(ServerCommand::WakeTick).is_err() {
					return;
				}
			}
			_ = cancel.cancelled() => return,
		}
	}
}

#[cfg(test)]
mod tests {
	use wtcp_proto::{EMERGENCY_STREAM, TELEMETRY_STREAM};

	use super::*;
	use crate::transport::ChannelTransport;

	fn new_pair() -> (ServerSession<ChannelTransport>, ServerHandle, ChannelTransport, tempfile::TempDir) {
		let (server_transport, client_transport) = ChannelTransport::pair();
		let dir = tempfile::tempdir().unwrap();
		let telemetry_sink = CsvSink::new(dir.path().join("telemetry.csv"));
		let emergency_sink = CsvSink::new(dir.path().join("emergency.csv"));
		let timings = SessionTimings { control_every: 2, ..Default::default() };
		let (server, handle) = ServerSession::new(server_transport, SessionIdAllocator::new(), timings, telemetry_sink, emergency_sink);
		(server, handle, client_transport, dir)
	}

	#[tokio::test(start_paused = true)]
	async fn accepts_handshake_and_persists_telemetry() {
		let (server, _handle, mut client, dir) = new_pair();

		client
			.send(CONTROL_STREAM, Pdu::new(0, Payload::AuthRequest { device_uuid: [0; 16], sampling_rate: 1000, geofence_radius: 5.0 }))
			.await
			.unwrap();

		let run = tokio::spawn(server.run());

		let (stream_id, pdu) = client.recv().await.unwrap().unwrap();
		assert_eq!(stream_id, CONTROL_STREAM);
		let Payload::AuthResponse { status: 0, assigned_session_id } = pdu.payload else { panic!("expected accept") };

		client
			.send(
				TELEMETRY_STREAM,
				Pdu::new(assigned_session_id, Payload::Telemetry(TelemetryRecord { timestamp: 1, latitude: 1.0, longitude: 2.0, activity: 0, battery: 80, diag_flags: 0 })),
			)
			.await
			.unwrap();
		client
			.send(
				TELEMETRY_STREAM,
				Pdu::new(assigned_session_id, Payload::Telemetry(TelemetryRecord { timestamp: 2, latitude: 1.0, longitude: 2.0, activity: 0, battery: 79, diag_flags: 0 })),
			)
			.await
			.unwrap();

		let (stream_id, pdu) = client.recv().await.unwrap().unwrap();
		assert_eq!(stream_id, CONTROL_STREAM);
		assert!(matches!(pdu.payload, Payload::Control(_)), "expected a periodic CONTROL after control_every telemetry PDUs");

		client.send(CONTROL_STREAM, Pdu::new(assigned_session_id, Payload::Terminate)).await.unwrap();
		run.await.unwrap().unwrap();

		let contents = std::fs::read_to_string(dir.path().join("telemetry.csv")).unwrap();
		assert_eq!(contents.lines().count(), 3); // header + 2 rows
	}

	#[tokio::test(start_paused = true)]
	async fn emergency_drives_server_to_terminate_the_client() {
		let (server, _handle, mut client, dir) = new_pair();
		client
			.send(CONTROL_STREAM, Pdu::new(0, Payload::AuthRequest { device_uuid: [0; 16], sampling_rate: 1000, geofence_radius: 5.0 }))
			.await
			.unwrap();
		let run = tokio::spawn(server.run());

		let (_, pdu) = client.recv().await.unwrap().unwrap();
		let Payload::AuthResponse { assigned_session_id, .. } = pdu.payload else { panic!() };

		client
			.send(EMERGENCY_STREAM, Pdu::new(assigned_session_id, Payload::Emergency(EmergencyRecord { timestamp: 9, alert_code: 1, details: "fall".into() })))
			.await
			.unwrap();

		let (stream_id, pdu) = client.recv().await.unwrap().unwrap();
		assert_eq!(stream_id, CONTROL_STREAM);
		assert!(matches!(pdu.payload, Payload::Terminate));

		run.await.unwrap().unwrap();
		let contents = std::fs::read_to_string(dir.path().join("emergency.csv")).unwrap();
		assert_eq!(contents.lines().count(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn handle_puts_client_to_sleep_and_wake_emitter_nudges_it_awake() {
		let (mut server, handle, mut client, _dir) = new_pair();
		server.timings.wake_interval = std::time::Duration::from_millis(10);
		client
			.send(CONTROL_STREAM, Pdu::new(0, Payload::AuthRequest { device_uuid: [0; 16], sampling_rate: 1000, geofence_radius: 5.0 }))
			.await
			.unwrap();
		let run = tokio::spawn(server.run());

		let (_, pdu) = client.recv().await.unwrap().unwrap();
		let Payload::AuthResponse { assigned_session_id, .. } = pdu.payload else { panic!() };

		handle.put_client_to_sleep();
		let (stream_id, pdu) = client.recv().await.unwrap().unwrap();
		assert_eq!(stream_id, CONTROL_STREAM);
		assert!(matches!(pdu.payload, Payload::Sleep { wake: false }));

		let (stream_id, pdu) = client.recv().await.unwrap().unwrap();
		assert_eq!(stream_id, CONTROL_STREAM);
		assert!(matches!(pdu.payload, Payload::Wake));

		client.send(CONTROL_STREAM, Pdu::new(assigned_session_id, Payload::Terminate)).await.unwrap();
		run.await.unwrap().unwrap();
	}
}
