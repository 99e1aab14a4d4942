//! Session state machines.
//!
//! Each machine is a dense `match` over `(state, input)` — the compiler
//! lowers it to a jump table, giving O(1) dispatch without needing a runtime
//! hash map. A missing arm is a protocol violation: the state is left
//! untouched and [`ProtoError::InvalidTransition`] is returned.

use crate::error::{InvalidTransitionSnafu, ProtoError};

/// Client session lifecycle. `Sleeping` is a first-class sibling of
/// `Operational`, not a flag layered on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
	Initial,
	AuthPending,
	Operational,
	Sleeping,
	Terminating,
	Terminated,
}

/// Events that drive the client FSM. Conditional PDU fields (AUTH_RESPONSE
/// status, SLEEP's wake bit) are pre-split into distinct inputs so the table
/// stays a plain `(state, input) -> state` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientInput {
	AuthRequestSent,
	AuthResponseAccepted,
	AuthResponseRejected,
	Control,
	TelemetrySent,
	SleepEnter,
	SleepResume,
	Wake,
	EmergencySent,
	Terminate,
}

#[derive(Debug, Clone)]
pub struct ClientFsm {
	state: ClientState,
}

impl Default for ClientFsm {
	fn default() -> Self {
		Self { state: ClientState::Initial }
	}
}

impl ClientFsm {
	pub fn state(&self) -> ClientState {
		self.state
	}

	pub fn apply(&mut self, input: ClientInput) -> Result<(ClientState, ClientState), ProtoError> {
		use ClientInput as I;
		use ClientState as S;

		let next = match (self.state, input) {
			(S::Initial, I::AuthRequestSent) => S::AuthPending,
			(S::AuthPending, I::AuthResponseAccepted) => S::Operational,
			(S::AuthPending, I::AuthResponseRejected) => S::Terminating,
			(S::Operational, I::Control) => S::Operational,
			(S::Operational, I::TelemetrySent) => S::Operational,
			(S::Operational, I::SleepEnter) => S::Sleeping,
			(S::Sleeping, I::SleepResume) => S::Operational,
			(S::Sleeping, I::Wake) => S::Operational,
			(S::Operational, I::EmergencySent) => S::Terminating,
			(S::Sleeping, I::EmergencySent) => S::Terminating,
			(S::Operational, I::Terminate) => S::Terminated,
			(S::Sleeping, I::Terminate) => S::Terminated,
			(S::Terminating, I::Terminate) => S::Terminated,
			_ => return InvalidTransitionSnafu { state: format!("{:?}", self.state), input: format!("{input:?}") }.fail(),
		};

		let old = self.state;
		self.state = next;
		Ok((old, next))
	}
}

/// Server session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerState {
	Listening,
	Authorizing,
	Operational,
	Terminating,
	Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerInput {
	AuthRequestReceived,
	AuthResponseSent,
	TelemetryReceived,
	ControlSent,
	EmergencyReceived,
	Terminate,
}

#[derive(Debug, Clone)]
pub struct ServerFsm {
	state: ServerState,
}

impl Default for ServerFsm {
	fn default() -> Self {
		Self { state: ServerState::Listening }
	}
}

impl ServerFsm {
	pub fn state(&self) -> ServerState {
		self.state
	}

	pub fn apply(&mut self, input: ServerInput) -> Result<(ServerState, ServerState), ProtoError> {
		use ServerInput as I;
		use ServerState as S;

		let next = match (self.state, input) {
			(S::Listening, I::AuthRequestReceived) => S::Authorizing,
			(S::Authorizing, I::AuthResponseSent) => S::Operational,
			(S::Operational, I::TelemetryReceived) => S::Operational,
			(S::Operational, I::ControlSent) => S::Operational,
			(S::Operational, I::EmergencyReceived) => S::Terminating,
			(S::Operational, I::Terminate) => S::Terminated,
			(S::Terminating, I::Terminate) => S::Terminated,
			_ => return InvalidTransitionSnafu { state: format!("{:?}", self.state), input: format!("{input:?}") }.fail(),
		};

		let old = self.state;
		self.state = next;
		Ok((old, next))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn client_reaches_terminated_from_every_non_terminal_state() {
		let mut fsm = ClientFsm::default();
		assert_eq!(fsm.apply(ClientInput::AuthRequestSent).unwrap(), (ClientState::Initial, ClientState::AuthPending));
		assert_eq!(fsm.apply(ClientInput::AuthResponseAccepted).unwrap().1, ClientState::Operational);
		assert_eq!(fsm.apply(ClientInput::Terminate).unwrap().1, ClientState::Terminated);

		let mut fsm = ClientFsm::default();
		fsm.apply(ClientInput::AuthRequestSent).unwrap();
		fsm.apply(ClientInput::AuthResponseAccepted).unwrap();
		fsm.apply(ClientInput::SleepEnter).unwrap();
		assert_eq!(fsm.state(), ClientState::Sleeping);
		assert_eq!(fsm.apply(ClientInput::Terminate).unwrap().1, ClientState::Terminated);

		let mut fsm = ClientFsm::default();
		fsm.apply(ClientInput::AuthRequestSent).unwrap();
		assert_eq!(fsm.apply(ClientInput::AuthResponseRejected).unwrap().1, ClientState::Terminating);
		assert_eq!(fsm.apply(ClientInput::Terminate).unwrap().1, ClientState::Terminated);
	}

	#[test]
	fn terminated_is_absorbing() {
		let mut fsm = ClientFsm::default();
		fsm.apply(ClientInput::AuthRequestSent).unwrap();
		fsm.apply(ClientInput::AuthResponseAccepted).unwrap();
		fsm.apply(ClientInput::Terminate).unwrap();

		let err = fsm.apply(ClientInput::Wake).unwrap_err();
		assert!(matches!(err, ProtoError::InvalidTransition { .. }));
		assert_eq!(fsm.state(), ClientState::Terminated);
	}

	#[test]
	fn invalid_transition_does_not_mutate_state() {
		let mut fsm = ClientFsm::default();
		let before = fsm.state();
		assert!(fsm.apply(ClientInput::Control).is_err());
		assert_eq!(fsm.state(), before);
	}

	#[test]
	fn server_nominal_handshake_and_telemetry() {
		let mut fsm = ServerFsm::default();
		assert_eq!(fsm.apply(ServerInput::AuthRequestReceived).unwrap().1, ServerState::Authorizing);
		assert_eq!(fsm.apply(ServerInput::AuthResponseSent).unwrap().1, ServerState::Operational);
		assert_eq!(fsm.apply(ServerInput::TelemetryReceived).unwrap().1, ServerState::Operational);
		assert_eq!(fsm.apply(ServerInput::ControlSent).unwrap().1, ServerState::Operational);
	}

	#[test]
	fn server_emergency_then_terminate() {
		let mut fsm = ServerFsm::default();
		fsm.apply(ServerInput::AuthRequestReceived).unwrap();
		fsm.apply(ServerInput::AuthResponseSent).unwrap();
		assert_eq!(fsm.apply(ServerInput::EmergencyReceived).unwrap().1, ServerState::Terminating);
		assert_eq!(fsm.apply(ServerInput::Terminate).unwrap().1, ServerState::Terminated);
	}
}
