use std::{sync::Arc, time::Instant};

use arc_swap::ArcSwap;
use snafu::OptionExt;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wtcp_codec::{ControlTlv, Payload, Pdu, TelemetryRecord};
use wtcp_proto::{CONTROL_STREAM, ClientFsm, ClientInput, ClientState, EMERGENCY_STREAM, TELEMETRY_STREAM, validate_inbound};

use crate::{
	config::{SessionTimings, SharedControlParams},
	error::{AuthRejectedSnafu, ClosedDuringHandshakeSnafu, SessionError},
	transport::Transport,
};

/// Commands background tasks and external callers hand back to the session
/// owner. The owner holds the only `&mut` reference to the transport, so
/// every outbound send is funneled through this mailbox instead of racing
/// for it.
enum ClientCommand {
	EmitTelemetry,
	IdleTimeout,
	ReportEmergency { alert_code: u8, details: String },
	ResumeFromSleep,
}

/// A handle external callers use to trigger client-initiated events — an
/// emergency button press, a motion sensor waking the device — into a
/// session running elsewhere.
#[derive(Clone)]
pub struct ClientHandle {
	cmd_tx: mpsc::UnboundedSender<ClientCommand>,
}

impl ClientHandle {
	pub fn report_emergency(&self, alert_code: u8, details: impl Into<String>) {
		let _ = self.cmd_tx.send(ClientCommand::ReportEmergency { alert_code, details: details.into() });
	}

	pub fn resume_from_sleep(&self) {
		let _ = self.cmd_tx.send(ClientCommand::ResumeFromSleep);
	}
}

/// State a handful of background tasks read without round-tripping through
/// the session owner's mailbox: the FSM's current state (so a task knows
/// whether it should be doing anything at all) and the clock of last wire
/// activity (so the idle watchdog can compute a precise deadline).
struct ClientShared {
	state: ArcSwap<ClientState>,
	last_activity: ArcSwap<Instant>,
	state_changed: Notify,
	control: SharedControlParams,
}

impl ClientShared {
	fn new(control: SharedControlParams) -> Self {
		Self {
			state: ArcSwap::from_pointee(ClientState::Initial),
			last_activity: ArcSwap::from_pointee(Instant::now()),
			state_changed: Notify::new(),
			control,
		}
	}

	fn set_state(&self, state: ClientState) {
		self.state.store(Arc::new(state));
		self.state_changed.notify_waiters();
	}

	fn touch(&self) {
		self.last_activity.store(Arc::new(Instant::now()));
	}
}

/// Drives one WTCP-Q client session over `T` to completion: performs the
/// AUTH handshake, then runs the telemetry/idle/sleep orchestration until the
/// server sends TERMINATE or the transport closes.
pub struct ClientSession<T: Transport> {
	transport: T,
	fsm: ClientFsm,
	device_uuid: Uuid,
	session_id: u32,
	timings: SessionTimings,
	shared: Arc<ClientShared>,
	cmd_tx: mpsc::UnboundedSender<ClientCommand>,
	cmd_rx: mpsc::UnboundedReceiver<ClientCommand>,
}

impl<T: Transport> ClientSession<T> {
	/// Builds a new session together with the [`ClientHandle`] used to
	/// trigger emergency/resume events once [`run`](Self::run) is underway.
	pub fn new(transport: T, device_uuid: Uuid, control: SharedControlParams, timings: SessionTimings) -> (Self, ClientHandle) {
		let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
		let session = Self {
			transport,
			fsm: ClientFsm::default(),
			device_uuid,
			session_id: 0,
			timings,
			shared: Arc::new(ClientShared::new(control)),
			cmd_tx: cmd_tx.clone(),
			cmd_rx,
		};
		(session, ClientHandle { cmd_tx })
	}

	/// Run the session to completion, returning once TERMINATE is processed
	/// or the transport closes unexpectedly.
	pub async fn run(mut self) -> Result<(), SessionError> {
		self.handshake().await?;

		let cancel = CancellationToken::new();
		tokio::spawn(telemetry_producer(self.shared.clone(), self.cmd_tx.clone(), cancel.clone()));
		tokio::spawn(idle_watchdog(self.shared.clone(), self.timings, self.cmd_tx.clone(), cancel.clone()));

		let result = self.drive().await;
		cancel.cancel();
		result
	}

	async fn handshake(&mut self) -> Result<(), SessionError> {
		let params = self.shared.control.load();
		let request = Pdu::new(
			0,
			Payload::AuthRequest {
				device_uuid: *self.device_uuid.as_bytes(),
				sampling_rate: params.sampling_rate_ms,
				geofence_radius: params.geofence_radius_m,
			},
		);
		self.transport.send(CONTROL_STREAM, request).await?;
		self.fsm.apply(ClientInput::AuthRequestSent)?;

		let (stream_id, pdu) = self.transport.recv().await?.context(ClosedDuringHandshakeSnafu)?;
		validate_inbound(stream_id, pdu.payload.pdu_type())?;

		match pdu.payload {
			Payload::AuthResponse { status: 0, assigned_session_id } => {
				self.session_id = assigned_session_id;
				self.fsm.apply(ClientInput::AuthResponseAccepted)?;
				self.shared.set_state(ClientState::Operational);
				self.shared.touch();
				info!(session_id = assigned_session_id, "authenticated");
				Ok(())
			}
			Payload::AuthResponse { status, .. } => {
				self.fsm.apply(ClientInput::AuthResponseRejected)?;
				self.shared.set_state(ClientState::Terminating);
				AuthRejectedSnafu { status }.fail()
			}
			other => {
				warn!(?other, "unexpected PDU during handshake");
				ClosedDuringHandshakeSnafu.fail()
			}
		}
	}

	async fn drive(&mut self) -> Result<(), SessionError> {
		loop {
			if self.fsm.state() == ClientState::Terminated {
				return Ok(());
			}

			tokio::select! {
				inbound = self.transport.recv() => {
					match inbound? {
						Some((stream_id, pdu)) => self.handle_inbound(stream_id, pdu)?,
						None => {
							debug!("transport closed by peer");
							return Ok(());
						}
					}
				}
				Some(cmd) = self.cmd_rx.recv() => {
					self.handle_command(cmd).await?;
				}
			}
		}
	}

	fn handle_inbound(&mut self, stream_id: u64, pdu: Pdu) -> Result<(), SessionError> {
		let pdu_type = pdu.payload.pdu_type();
		if let Err(err) = validate_inbound(stream_id, pdu_type) {
			warn!(?err, "dropping misrouted PDU");
			return Ok(());
		}
		self.shared.touch();

		match pdu.payload {
			Payload::Control(tlvs) => {
				self.apply_control(&tlvs);
				self.apply_fsm(ClientInput::Control);
			}
			Payload::Wake => {
				self.apply_fsm(ClientInput::Wake);
				self.shared.set_state(self.fsm.state());
			}
			Payload::Terminate => {
				self.apply_fsm(ClientInput::Terminate);
				self.shared.set_state(self.fsm.state());
			}
			Payload::Sleep { wake } => {
				self.apply_fsm(if wake { ClientInput::SleepResume } else { ClientInput::SleepEnter });
				self.shared.set_state(self.fsm.state());
			}
			other => warn!(?other, "ignoring PDU type not expected inbound on a client"),
		}
		Ok(())
	}

	async fn handle_command(&mut self, cmd: ClientCommand) -> Result<(), SessionError> {
		match cmd {
			ClientCommand::EmitTelemetry => {
				let record = self.sample_telemetry();
				let pdu = Pdu::new(self.session_id, Payload::Telemetry(record));
				self.transport.send(TELEMETRY_STREAM, pdu).await?;
				self.apply_fsm(ClientInput::TelemetrySent);
				self.shared.touch();
			}
			ClientCommand::IdleTimeout => {
				let pdu = Pdu::new(self.session_id, Payload::Terminate);
				self.transport.send(CONTROL_STREAM, pdu).await?;
				self.apply_fsm(ClientInput::Terminate);
				self.shared.set_state(self.fsm.state());
			}
			ClientCommand::ResumeFromSleep => {
				if self.fsm.state() == ClientState::Sleeping {
					self.apply_fsm(ClientInput::SleepResume);
					self.shared.set_state(self.fsm.state());
					self.shared.touch();
				}
			}
			ClientCommand::ReportEmergency { alert_code, details } => {
				let record = wtcp_codec::EmergencyRecord { timestamp: unix_millis(), alert_code, details };
				let pdu = Pdu::new(self.session_id, Payload::Emergency(record));
				self.transport.send(EMERGENCY_STREAM, pdu).await?;
				self.apply_fsm(ClientInput::EmergencySent);
				self.shared.set_state(self.fsm.state());
			}
		}
		Ok(())
	}

	fn apply_control(&self, tlvs: &[ControlTlv]) {
		let mut params = self.shared.control.load();
		for tlv in tlvs {
			match tlv {
				ControlTlv::SamplingRate(rate) => params.sampling_rate_ms = *rate,
				ControlTlv::GeofenceRadius(radius) => params.geofence_radius_m = *radius,
				ControlTlv::Unknown { tag, .. } => debug!(tag, "ignoring unknown control TLV"),
			}
		}
		self.shared.control.store(params);
		self.shared.state_changed.notify_waiters();
	}

	fn apply_fsm(&mut self, input: ClientInput) {
		if let Err(err) = self.fsm.apply(input) {
			warn!(?err, "ignoring PDU that does not fit the current session state");
		}
	}

	fn sample_telemetry(&self) -> TelemetryRecord {
		let params = self.shared.control.load();
		TelemetryRecord {
			timestamp: unix_millis(),
			latitude: 0.0,
			longitude: 0.0,
			activity: 0,
			battery: 100,
			diag_flags: (params.geofence_radius_m > 0.0) as u8,
		}
	}
}

fn unix_millis() -> u64 {
	std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

async fn telemetry_producer(shared: Arc<ClientShared>, cmd_tx: mpsc::UnboundedSender<ClientCommand>, cancel: CancellationToken) {
	loop {
		while *shared.state.load().as_ref() != ClientState::Operational {
			tokio::select! {
				_ = shared.state_changed.notified() => {}
				_ = cancel.cancelled() => return,
			}
		}

		tokio::select! {
			_ = tokio::time::sleep(shared.control.sampling_interval()) => {
				if cmd_tx.send(ClientCommand::EmitTelemetry).is_err() {
					return;
				}
			}
			_ = shared.state_changed.notified() => {}
			_ = cancel.cancelled() => return,
		}
	}
}

async fn idle_watchdog(shared: Arc<ClientShared>, timings: SessionTimings, cmd_tx: mpsc::UnboundedSender<ClientCommand>, cancel: CancellationToken) {
	loop {
		while *shared.state.load().as_ref() != ClientState::Operational {
			tokio::select! {
				_ = shared.state_changed.notified() => {}
				_ = cancel.cancelled() => return,
			}
		}

		let elapsed = shared.last_activity.load().elapsed();
		if elapsed < timings.idle_timeout {
			tokio::select! {
				_ = tokio::time::sleep(timings.idle_timeout - elapsed) => {}
				_ = shared.state_changed.notified() => { continue; }
				_ = cancel.cancelled() => return,
			}
			continue;
		}

		if cmd_tx.send(ClientCommand::IdleTimeout).is_err() {
			return;
		}
		tokio::select! {
			_ = shared.state_changed.notified() => {}
			_ = cancel.cancelled() => return,
		}
	}
}

#[cfg(test)]
mod tests {
	use wtcp_codec::EmergencyRecord;

	use super::*;
	use crate::{config::ControlParams, transport::ChannelTransport};

	fn new_pair() -> (ClientSession<ChannelTransport>, ClientHandle, ChannelTransport) {
		let (client_transport, server_transport) = ChannelTransport::pair();
		let control = SharedControlParams::new(ControlParams { sampling_rate_ms: 50, geofence_radius_m: 10.0 });
		let timings = SessionTimings { idle_timeout: std::time::Duration::from_millis(500), ..Default::default() };
		let (session, handle) = ClientSession::new(client_transport, Uuid::nil(), control, timings);
		(session, handle, server_transport)
	}

	#[tokio::test(start_paused = true)]
	async fn handshake_accepted_reaches_operational() {
		let (mut session, _handle, mut server) = new_pair();

		let (stream_id, pdu) = server.recv().await.unwrap().unwrap();
		assert_eq!(stream_id, CONTROL_STREAM);
		assert!(matches!(pdu.payload, Payload::AuthRequest { .. }));

		server.send(CONTROL_STREAM, Pdu::new(0, Payload::AuthResponse { status: 0, assigned_session_id: 7 })).await.unwrap();
		server.send(CONTROL_STREAM, Pdu::new(7, Payload::Terminate)).await.unwrap();

		session.run().await.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn handshake_rejected_surfaces_error() {
		let (mut session, _handle, mut server) = new_pair();
		server.recv().await.unwrap().unwrap();
		server.send(CONTROL_STREAM, Pdu::new(0, Payload::AuthResponse { status: 3, assigned_session_id: 0 })).await.unwrap();

		let err = session.run().await.unwrap_err();
		assert!(matches!(err, SessionError::AuthRejected { status: 3 }));
	}

	#[tokio::test(start_paused = true)]
	async fn emergency_report_transitions_to_terminating_and_sends_pdu() {
		let (mut session, handle, mut server) = new_pair();
		server.recv().await.unwrap().unwrap();
		server.send(CONTROL_STREAM, Pdu::new(0, Payload::AuthResponse { status: 0, assigned_session_id: 1 })).await.unwrap();

		handle.report_emergency(5, "fall detected");

		let run = tokio::spawn(session_run_until_terminate(session));
		let (stream_id, pdu) = server.recv().await.unwrap().unwrap();
		assert_eq!(stream_id, EMERGENCY_STREAM);
		match pdu.payload {
			Payload::Emergency(EmergencyRecord { alert_code, details, .. }) => {
				assert_eq!(alert_code, 5);
				assert_eq!(details, "fall detected");
			}
			other => panic!("unexpected payload {other:?}"),
		}

		server.send(CONTROL_STREAM, Pdu::new(1, Payload::Terminate)).await.unwrap();
		run.await.unwrap();
	}

	async fn session_run_until_terminate(session: ClientSession<ChannelTransport>) {
		session.run().await.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn idle_timeout_sends_terminate_instead_of_sleep() {
		let (mut session, _handle, mut server) = new_pair();
		server.recv().await.unwrap().unwrap();
		server.send(CONTROL_STREAM, Pdu::new(0, Payload::AuthResponse { status: 0, assigned_session_id: 1 })).await.unwrap();

		// no further traffic; the idle watchdog (500ms in `new_pair`) should fire.
		session.run().await.unwrap();

		let (stream_id, pdu) = server.recv().await.unwrap().unwrap();
		assert_eq!(stream_id, CONTROL_STREAM);
		assert!(matches!(pdu.payload, Payload::Terminate));
	}

	#[tokio::test(start_paused = true)]
	async fn inbound_sleep_halts_telemetry_and_wake_resumes_it() {
		let (mut session, _handle, mut server) = new_pair();
		server.recv().await.unwrap().unwrap();
		server.send(CONTROL_STREAM, Pdu::new(0, Payload::AuthResponse { status: 0, assigned_session_id: 1 })).await.unwrap();

		let run = tokio::spawn(session.run());

		let (stream_id, pdu) = server.recv().await.unwrap().unwrap();
		assert_eq!(stream_id, TELEMETRY_STREAM);
		assert!(matches!(pdu.payload, Payload::Telemetry(_)));

		server.send(CONTROL_STREAM, Pdu::new(1, Payload::Sleep { wake: false })).await.unwrap();

		let sampling_interval = std::time::Duration::from_millis(50);
		let further_traffic = tokio::time::timeout(sampling_interval * 3, server.recv()).await;
		assert!(further_traffic.is_err(), "telemetry producer should be halted while sleeping");

		server.send(CONTROL_STREAM, Pdu::new(1, Payload::Wake)).await.unwrap();

		let (stream_id, pdu) = server.recv().await.unwrap().unwrap();
		assert_eq!(stream_id, TELEMETRY_STREAM);
		assert!(matches!(pdu.payload, Payload::Telemetry(_)), "telemetry producer should resume after WAKE");

		server.send(CONTROL_STREAM, Pdu::new(1, Payload::Terminate)).await.unwrap();
		run.await.unwrap().unwrap();
	}
}
